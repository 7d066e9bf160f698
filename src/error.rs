use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::actor::ActorRole;
use crate::models::delivery::{DeliveryStatus, VehicleType};
use crate::repository::StoreError;

/// Failures of the delivery lifecycle engine.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no couriers available")]
    NoAvailableCourier,

    #[error("courier {courier_id} is not eligible: {reason}")]
    CourierNotEligible { courier_id: Uuid, reason: String },

    #[error("assignment conflict: {0}")]
    AssignmentConflict(String),

    #[error("version conflict on {entity} {id}")]
    VersionConflict { entity: String, id: Uuid },

    #[error("{role:?} may not move delivery from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
        role: ActorRole,
    },

    #[error("no pricing entry for vehicle type {0}")]
    InvalidVehicleType(VehicleType),

    #[error("location {0} has no coordinates")]
    MissingCoordinates(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl DeliveryError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DeliveryError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Lost a race; the caller may re-read and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DeliveryError::AssignmentConflict(_) | DeliveryError::VersionConflict { .. }
        )
    }
}

impl From<StoreError> for DeliveryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                DeliveryError::NotFound(format!("{entity} {id} not found"))
            }
            StoreError::VersionConflict { entity, id, .. } => DeliveryError::VersionConflict {
                entity: entity.to_string(),
                id,
            },
            StoreError::CourierUnavailable(id) => {
                DeliveryError::AssignmentConflict(format!("courier {id} was taken concurrently"))
            }
            StoreError::Backend(msg) => DeliveryError::Persistence(msg),
        }
    }
}

/// Errors surfaced by the binary and the HTTP adapter.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Delivery(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Delivery(err) => match err {
                DeliveryError::Validation { .. }
                | DeliveryError::InvalidVehicleType(_)
                | DeliveryError::MissingCoordinates(_) => StatusCode::BAD_REQUEST,
                DeliveryError::NotFound(_) => StatusCode::NOT_FOUND,
                DeliveryError::CourierNotEligible { .. }
                | DeliveryError::AssignmentConflict(_)
                | DeliveryError::VersionConflict { .. } => StatusCode::CONFLICT,
                DeliveryError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DeliveryError::NoAvailableCourier => StatusCode::SERVICE_UNAVAILABLE,
                DeliveryError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
