//! API error type and its HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::http::header::RETRY_AFTER;
use actix_web::{HttpResponse, ResponseError};
use domain_probe_toolbox::ToolboxError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or missing field.
    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    Toolbox(#[from] ToolboxError),
}

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_type: &'static str,
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "validation",
            Self::RateLimited { .. } => "rate_limited",
            Self::Toolbox(e) => e.error_type(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Toolbox(ToolboxError::ValidationError(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Toolbox(ToolboxError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Toolbox(ToolboxError::DnsServerFailure(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Toolbox(ToolboxError::NetworkError(_) | ToolboxError::NoCertificate(_)) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Toolbox(e) if !e.is_expected() => tracing::error!(error = %e, "Probe failed"),
            _ => tracing::warn!(error = %self, "Request rejected"),
        }

        let mut response = HttpResponse::build(self.status_code());
        if let Self::RateLimited { retry_after_secs } = self {
            response.insert_header((RETRY_AFTER, retry_after_secs.to_string()));
        }
        response.json(ErrorBody {
            error: self.to_string(),
            error_type: self.error_type(),
        })
    }
}
