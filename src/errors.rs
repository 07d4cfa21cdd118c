use http::StatusCode;
use sea_orm::error::DbErr;
use serde::Serialize;

use crate::cache::CacheError;

/// Error kinds surfaced by the basket, discount and checkout services.
///
/// Every variant is recoverable per request: client errors map to 4xx,
/// backing-store failures map to 5xx so callers can decide whether to retry.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Duplicate line: product {0} is already in the basket")]
    DuplicateLine(i32),

    #[error("Line not found: product {0} is not in the basket")]
    LineNotFound(i32),

    #[error("Discount already used for this basket")]
    DiscountAlreadyUsed,

    #[error("Invalid discount code: {0}")]
    InvalidCode(String),

    #[error("Discount code not found: {0}")]
    CodeNotFound(String),

    #[error("Incomplete basket: {0}")]
    IncompleteBasket(String),

    #[error("Address {address_id} does not belong to user {user_id}")]
    AddressOwnershipMismatch { address_id: i32, user_id: i32 },

    #[error("No basket for user {0}")]
    BasketNotFound(i32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Serialization(msg) => {
                tracing::error!(error = %msg, "Corrupt record in basket/payment store");
                ServiceError::SerializationError(msg)
            }
            other => {
                tracing::error!(error = %other, "Basket/payment store operation failed");
                ServiceError::StoreUnavailable(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code a handler should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::OutOfStock(_)
            | Self::DuplicateLine(_)
            | Self::DiscountAlreadyUsed
            | Self::InvalidCode(_)
            | Self::IncompleteBasket(_) => StatusCode::BAD_REQUEST,
            Self::AddressOwnershipMismatch { .. } => StatusCode::FORBIDDEN,
            Self::LineNotFound(_)
            | Self::CodeNotFound(_)
            | Self::BasketNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for a response body.
    /// Store and database failures return generic messages.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::StoreUnavailable(_) => "Basket store temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// True for failures a client can fix by correcting its request.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}
