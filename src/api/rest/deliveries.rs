use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::creation::CreateDeliveryRequest;
use crate::engine::response::DeliveryResponse;
use crate::engine::service::DropoffUpdate;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::delivery::DeliveryStatus;
use crate::models::location::GeoPoint;
use crate::models::tracking::TrackingEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/tracking", get(get_tracking))
        .route("/deliveries/:id/assign", post(assign_delivery))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/dropoff", patch(update_dropoff))
        .route("/deliveries/:id/location", post(record_location))
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub client_id: Uuid,
    #[serde(flatten)]
    pub delivery: CreateDeliveryRequest,
}

#[derive(Deserialize, Default)]
pub struct AssignRequest {
    #[serde(default)]
    pub courier_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    pub actor: Actor,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct UpdateDropoffRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub dropoff: DropoffUpdate,
}

#[derive(Deserialize)]
pub struct RecordLocationRequest {
    pub actor: Actor,
    pub location: GeoPoint,
    #[serde(default)]
    pub note: Option<String>,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state
        .service
        .create_delivery(payload.client_id, payload.delivery)
        .await?;
    Ok(Json(delivery))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryResponse>, AppError> {
    Ok(Json(state.service.get_delivery(id).await?))
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrackingEntry>>, AppError> {
    Ok(Json(state.service.tracking(id).await?))
}

async fn assign_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<AssignRequest>>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let delivery = state
        .service
        .assign_delivery(id, payload.courier_id)
        .await?;
    Ok(Json(delivery))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state
        .service
        .update_status(
            id,
            payload.status,
            payload.actor,
            payload.note,
            payload.location,
        )
        .await?;
    Ok(Json(delivery))
}

async fn update_dropoff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDropoffRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state
        .service
        .update_dropoff(id, payload.actor, payload.dropoff)
        .await?;
    Ok(Json(delivery))
}

async fn record_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordLocationRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state
        .service
        .record_location(id, payload.actor, payload.location, payload.note)
        .await?;
    Ok(Json(delivery))
}
