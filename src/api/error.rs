use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::borrow::Cow;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Bad Gateway: {0}")]
    BadGateway(Cow<'static, str>),
    #[error("Internal Server Error")]
    InternalServer,
}

#[derive(serde::Serialize)]
pub struct ErrorBody {
    pub message: Cow<'static, str>,
}

impl Error {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match *self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Error::InternalServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());

        match self {
            // Has Message
            Error::NotFound(msg) | Error::BadRequest(msg) | Error::BadGateway(msg) => {
                res.json(ErrorBody { message: msg.clone() })
            }
            // No Message
            Error::InternalServer => {
                res.json(ErrorBody { message: "Internal Server Error".into() })
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SystemError {
    // client faults
    #[error("Invalid input: {0}")]
    InvalidInput(Cow<'static, str>),
    #[error("File not found: {0}")]
    FileNotFound(Cow<'static, str>),
    // storage provider
    #[error("Storage provider error: {0}")]
    Provider(Cow<'static, str>),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    // startup configuration
    #[error("Configuration error: {0}")]
    Config(Cow<'static, str>),
    // io errors
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    // serde errors
    #[error("JSON Serialization/Deserialization Error")]
    JsonError(#[from] serde_json::Error),
}

impl From<SystemError> for Error {
    fn from(value: SystemError) -> Self {
        match value {
            SystemError::InvalidInput(msg) => Error::BadRequest(msg),
            SystemError::FileNotFound(msg) => Error::NotFound(msg),
            SystemError::Provider(msg) => Error::BadGateway(msg),
            SystemError::Http(err) => {
                log::error!("Storage request failed: {:?}", err);
                Error::BadGateway("Storage provider unreachable".into())
            }
            _ => {
                log::error!("Internal Server Error: {:?}", value);
                Error::InternalServer
            }
        }
    }
}

impl SystemError {
    pub fn invalid_input(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn file_not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound(msg.into())
    }

    pub fn provider(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn config(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(msg.into())
    }
}
