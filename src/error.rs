use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::{json, Json},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Input the caller can fix, or a business rule that currently forbids the operation.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    /// The named entity does not exist.
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, message.into())
    }

    /// Another request changed the same state first.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, message.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Status(status, _) => *status,
            Self::Db(_) | Self::Bson(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = match self {
            Self::Status(_, message) => message,
            Self::Db(err) => {
                error!("Database failure: {err}");
                "Internal server error".to_string()
            }
            Self::Bson(err) => {
                error!("Failed to serialise document: {err}");
                "Internal server error".to_string()
            }
            Self::Jwt(err) => {
                warn!("Rejected auth token: {err}");
                err.to_string()
            }
        };
        debug!("Responding {status}: {message}");
        let body = json!({
            "success": false,
            "message": message,
        });
        Custom(status, Json(body)).respond_to(req)
    }
}
