//! Request body validation for the diagnosis endpoint.
//!
//! Mirrors the clinical form constraints: at least one of SDMA or
//! creatinine must be present, numeric fields have physiological bounds,
//! free-text fields have length caps. All violations are collected, not
//! just the first.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Maximum length for short text fields (name, breed).
const MAX_NAME_LEN: usize = 100;
/// Maximum length for symptom/comorbidity lists.
const MAX_LIST_LEN: usize = 500;
/// Maximum length for the free-text question.
const MAX_FREE_TEXT_LEN: usize = 1000;

/// Body of `POST /api/diagnosis`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosisRequest {
    /// Structured clinical form.
    pub formulario: ClinicalForm,

    /// Free-text question from the user.
    #[serde(default)]
    pub texto_livre: String,

    /// Session to resume; omitted on the first request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The structured clinical form. Field names follow the worker's wire
/// format.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClinicalForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raca: Option<String>,
    /// SDMA in µg/dL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdma: Option<f64>,
    /// Creatinine in mg/dL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creatinina: Option<f64>,
    /// Age in years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idade: Option<u32>,
    /// Weight in kg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peso: Option<f64>,
    /// Systolic pressure in mmHg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressao: Option<f64>,
    /// Urine protein/creatinine ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sintomas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comorbidades: Option<String>,
}

/// Validate and normalize a request in place.
///
/// Returns every violation found; an empty error list means the request
/// is ready to forward to the worker.
pub fn validate(request: &mut DiagnosisRequest) -> std::result::Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let form = &mut request.formulario;

    if form.sdma.is_none() && form.creatinina.is_none() {
        errors.push(FieldError::new(
            "formulario",
            "either sdma or creatinina is required",
        ));
    }

    check_positive(&mut errors, "formulario.sdma", form.sdma, None);
    check_positive(&mut errors, "formulario.creatinina", form.creatinina, None);
    check_positive(&mut errors, "formulario.peso", form.peso, Some(50.0));
    check_positive(&mut errors, "formulario.pressao", form.pressao, Some(300.0));

    if let Some(upc) = form.upc {
        if !(0.0..=50.0).contains(&upc) {
            errors.push(FieldError::new("formulario.upc", "must be between 0 and 50"));
        }
    }
    if let Some(idade) = form.idade {
        if idade > 30 {
            errors.push(FieldError::new("formulario.idade", "must be at most 30"));
        }
    }

    check_len(&mut errors, "formulario.nome", form.nome.as_deref(), MAX_NAME_LEN);
    check_len(&mut errors, "formulario.raca", form.raca.as_deref(), MAX_NAME_LEN);
    check_len(
        &mut errors,
        "formulario.sintomas",
        form.sintomas.as_deref(),
        MAX_LIST_LEN,
    );
    check_len(
        &mut errors,
        "formulario.comorbidades",
        form.comorbidades.as_deref(),
        MAX_LIST_LEN,
    );
    check_len(
        &mut errors,
        "texto_livre",
        Some(request.texto_livre.as_str()),
        MAX_FREE_TEXT_LEN,
    );

    if let Some(sexo) = &mut form.sexo {
        let normalized = sexo.trim().to_uppercase();
        if normalized.is_empty() || normalized == "M" || normalized == "F" {
            *sexo = normalized;
        } else {
            errors.push(FieldError::new("formulario.sexo", "must be M or F"));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_positive(errors: &mut Vec<FieldError>, field: &str, value: Option<f64>, max: Option<f64>) {
    let Some(value) = value else { return };
    if value <= 0.0 {
        errors.push(FieldError::new(field, "must be positive"));
    } else if let Some(max) = max {
        if value > max {
            errors.push(FieldError::new(field, format!("must be at most {max}")));
        }
    }
}

fn check_len(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>, max: usize) {
    if value.is_some_and(|v| v.chars().count() > max) {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}
