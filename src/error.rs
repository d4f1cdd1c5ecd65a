use thiserror::Error;

use crate::domain::extraction::DiagnosisTrace;

/// Request-terminal failures. Everything softer than these degrades into a
/// partially populated record plus trace entries instead of an error.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error("could not find a place id in the given input: {input}")]
    InvalidIdentifier { input: String },

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailure { url: String, reason: String },

    #[error("exhausted frame discovery cascade for place {place_id}")]
    NoContentHandle {
        place_id: String,
        trace: DiagnosisTrace,
    },
}

impl DiagnoseError {
    /// Only identifier and navigation failures surface to the caller as
    /// request failures; NoContentHandle downgrades to best-effort
    /// outer-page extraction upstream and should rarely escape.
    pub fn user_message(&self) -> String {
        match self {
            DiagnoseError::InvalidIdentifier { .. } => {
                "입력하신 주소에서 업체 ID를 찾지 못했습니다".to_string()
            }
            DiagnoseError::NavigationFailure { .. } => {
                "업체 페이지에 접속하지 못했습니다. 잠시 후 다시 시도해주세요".to_string()
            }
            DiagnoseError::NoContentHandle { .. } => {
                "업체 페이지 구조를 해석하지 못했습니다".to_string()
            }
        }
    }
}
