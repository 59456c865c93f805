//! In-memory TTL session store for diagnosis follow-ups.
//!
//! Sessions hold the conversational context carried between diagnosis
//! requests: a bounded message history, the last clinical form, and the
//! last worker result. Nothing is persisted; a restart clears all
//! sessions. Entries expire after 30 minutes of inactivity and a periodic
//! sweeper removes them.
//!
//! # Example
//!
//! ```rust,ignore
//! use iris_session::{SessionStore, StoreConfig};
//!
//! let store = SessionStore::new(StoreConfig::default());
//! let sweeper = store.spawn_sweeper();
//! let session = store.get_or_create(None);
//! store.add_message(&session.id, Role::User, "e agora?");
//! sweeper.shutdown();
//! ```

mod config;
mod session;
mod store;

pub use config::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, StoreConfig};
pub use session::{ChatMessage, MAX_HISTORY, Role, Session};
pub use store::{SessionPatch, SessionStore, SweeperHandle};
