use std::fmt;

use axum::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, RequestParts};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};

use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::ValidationErrors;

use crate::credential::CredentialFailure;
use crate::models::{Branch, RequestStatus};

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// `Json<T>` whose rejections (bad syntax, wrong types, missing content
/// type) are reported as [`Error::InvalidPayload`] on the `body` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for JsonBody<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                log::info!("rejected request body: {}", rejection);
                Err(Error::invalid("body", rejection.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    NotFound {
        message: String,
    },
    InvalidPayload {
        field: String,
        message: String,
    },
    DuplicatePending {
        message: String,
    },
    NoAdminForBranch {
        branch: Branch,
        message: String,
    },
    Unauthenticated {
        reason: CredentialFailure,
        message: String,
    },
    AuthenticationFailure {
        message: String,
    },
    AccessDenied {
        message: String,
    },
    InvalidStateTransition {
        current: RequestStatus,
        message: String,
    },
    UserAlreadyExists {
        message: String,
    },
    BranchAdminExists {
        branch: Branch,
        message: String,
    },
    InternalError {
        kind: &'static str,
        message: String,
    },
}

impl Error {
    pub fn invalid<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Error {
        Error::InvalidPayload {
            field: field.into(),
            message: msg.into(),
        }
    }

    pub fn access_denied() -> Error {
        Error::AccessDenied {
            message: "Access denied".to_string(),
        }
    }

    pub fn request_not_found() -> Error {
        Error::NotFound {
            message: "Request not found".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::DuplicatePending { .. } => StatusCode::CONFLICT,
            Error::NoAdminForBranch { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            Error::UserAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::BranchAdminExists { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::NotFound { message }
            | Error::InvalidPayload { message, .. }
            | Error::DuplicatePending { message }
            | Error::NoAdminForBranch { message, .. }
            | Error::Unauthenticated { message, .. }
            | Error::AuthenticationFailure { message }
            | Error::AccessDenied { message }
            | Error::InvalidStateTransition { message, .. }
            | Error::UserAlreadyExists { message }
            | Error::BranchAdminExists { message, .. }
            | Error::InternalError { message, .. } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPayload { field, message } => write!(f, "{}: {}", field, message),
            Error::InternalError { kind, message } => write!(f, "{}: {}", kind, message),
            other => f.write_str(other.message()),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{:?}", self);
        }
        (status, Json(self)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        match fields.first() {
            Some((field, failures)) => {
                let message = failures
                    .first()
                    .and_then(|failure| failure.message.as_ref())
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("`{}` is invalid", field));
                Error::invalid(*field, message)
            }
            None => Error::invalid("body", errors.to_string()),
        }
    }
}
