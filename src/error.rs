use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::Debug;

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    /// Conflict errors signal that the bid's state changed concurrently.
    /// Callers are expected to re-query and retry against another bid.
    pub fn is_conflict(&self) -> bool {
        (110..=113).contains(&self.code)
    }
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        authorization_engine_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            110..=113 => (StatusCode::CONFLICT, self.message.as_str()),
            120 => (StatusCode::FORBIDDEN, self.message.as_str()),
            121 => (StatusCode::NOT_FOUND, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(_: T) -> Error {
    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn reqwest_error(_: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: "reqwest error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn authorization_engine_error<T: Debug>(_: T) -> Error {
    Error {
        code: 6,
        message: "authorization engine error".into(),
    }
}

pub fn invalid_config_error() -> Error {
    Error {
        code: 7,
        message: "invalid configuration".into(),
    }
}

pub fn invalid_transition_error() -> Error {
    Error {
        code: 100,
        message: "invalid transition".into(),
    }
}

pub fn invalid_request_error() -> Error {
    Error {
        code: 101,
        message: "invalid request".into(),
    }
}

pub fn invalid_offer_error() -> Error {
    Error {
        code: 102,
        message: "invalid offer".into(),
    }
}

pub fn too_soon_error() -> Error {
    Error {
        code: 103,
        message: "scheduled time is too soon".into(),
    }
}

pub fn bid_not_open_error() -> Error {
    Error {
        code: 110,
        message: "bid is not open".into(),
    }
}

pub fn bid_expired_error() -> Error {
    Error {
        code: 111,
        message: "bid has expired".into(),
    }
}

pub fn bid_already_closed_error() -> Error {
    Error {
        code: 112,
        message: "bid is already closed".into(),
    }
}

pub fn bid_already_cancelled_error() -> Error {
    Error {
        code: 113,
        message: "bid is already cancelled".into(),
    }
}

pub fn unauthorized_error() -> Error {
    Error {
        code: 120,
        message: "unauthorized".into(),
    }
}

pub fn offer_not_found_error() -> Error {
    Error {
        code: 121,
        message: "offer not found".into(),
    }
}
