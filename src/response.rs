// Mapping of transition results onto the REST boundary shapes

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::case_lifecycle::{StorageError, TransitionError, TransitionReceipt};
use crate::config::Locale;

/// Status code and JSON body the HTTP layer should send back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub code: u16,
    pub body: Value,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            code: 200,
            body: json!({ "status": "success" }),
        }
    }

    pub fn from_result(result: &Result<TransitionReceipt, TransitionError>, locale: Locale) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(e) => Self::from_error(e, locale),
        }
    }

    pub fn from_error(error: &TransitionError, locale: Locale) -> Self {
        match error {
            TransitionError::Forbidden { .. } => Self {
                code: 403,
                body: json!({ "result": [] }),
            },
            TransitionError::InvalidTarget { .. } | TransitionError::StepsRequired { .. } => Self {
                code: 400,
                body: json!({ "non_field_errors": [localized_message(error, locale)] }),
            },
            TransitionError::CaseNotFound(_) => Self::detail(404, localized_message(error, locale)),
            TransitionError::Busy(_) => Self::detail(409, localized_message(error, locale)),
            TransitionError::Storage(StorageError::VersionConflict { .. }) => {
                Self::detail(409, error.to_string())
            }
            TransitionError::Storage(_) | TransitionError::PermissionLookup(_) => {
                Self::detail(500, error.to_string())
            }
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn detail(code: u16, message: String) -> Self {
        Self {
            code,
            body: json!({ "detail": message }),
        }
    }
}

/// User-facing message for a client error
pub fn localized_message(error: &TransitionError, locale: Locale) -> String {
    match (error, locale) {
        (TransitionError::StepsRequired { .. }, Locale::En) => "Steps are missing".to_string(),
        (TransitionError::StepsRequired { .. }, Locale::Ru) => "Отсутствуют шаги".to_string(),
        (TransitionError::InvalidTarget { requested: None }, Locale::En) => {
            "Status is missing".to_string()
        }
        (TransitionError::InvalidTarget { requested: None }, Locale::Ru) => {
            "Отсутствует статус".to_string()
        }
        (TransitionError::InvalidTarget { requested: Some(name) }, Locale::En) => {
            format!("Unknown status '{name}'")
        }
        (TransitionError::InvalidTarget { requested: Some(name) }, Locale::Ru) => {
            format!("Неизвестный статус '{name}'")
        }
        (TransitionError::CaseNotFound(id), Locale::Ru) => format!("Кейс {id} не найден"),
        (TransitionError::Busy(id), Locale::Ru) => {
            format!("Статус кейса {id} уже изменяется, повторите запрос")
        }
        (other, _) => other.to_string(),
    }
}
