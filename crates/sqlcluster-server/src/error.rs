// HTTP error responses
// Handlers return AppError; the wrapped ClusterError decides the status code

use std::fmt::{Display, Formatter};

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use sqlcluster_common::ClusterError;

// Wrapper for application errors to implement actix-web error handling
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl AppError {
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        self.inner.downcast_ref::<ClusterError>()
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<ClusterError> for AppError {
    fn from(value: ClusterError) -> Self {
        AppError {
            inner: anyhow::Error::new(value),
        }
    }
}

pub fn status_for(err: &ClusterError) -> StatusCode {
    match err {
        ClusterError::InvalidRequest(_) | ClusterError::NoLeader { .. } => {
            StatusCode::BAD_REQUEST
        }
        ClusterError::Conflict(_) => StatusCode::CONFLICT,
        ClusterError::NotLeader { .. }
        | ClusterError::Unavailable(_)
        | ClusterError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        ClusterError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ClusterError::Remote { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ClusterError::Config(_)
        | ClusterError::Fatal(_)
        | ClusterError::Storage(_)
        | ClusterError::Serialization(_)
        | ClusterError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.cluster_error()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        // A peer's error body is relayed as-is so forwarding is transparent.
        let body = match self.cluster_error() {
            Some(ClusterError::Remote { message, .. }) => message.clone(),
            Some(e) => e.to_string(),
            None => self.inner.to_string(),
        };
        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(body)
    }
}
