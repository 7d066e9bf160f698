//! Delivery creation for the four service variants.
//!
//! Each variant module turns a request into a [`Draft`] without touching the
//! store: every check runs before the first write, so a rejected request
//! leaves nothing behind. [`DeliveryCreator::persist`] then writes the draft.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::response::DeliveryResponse;
use crate::error::DeliveryError;
use crate::geo::{distance_between, estimate_duration, DistanceEstimator, TravelProfile};
use crate::models::actor::ActorRole;
use crate::models::delivery::{
    Delivery, DeliveryStatus, DeliveryType, PaymentMethod, PriceBreakdown, VehicleType,
};
use crate::models::location::Location;
use crate::models::tracking::TrackingEntry;
use crate::models::variant::{GroupedZone, MovingDetails, Package};
use crate::pricing::{PricingEngine, VariantExtras};
use crate::repository::Repository;

mod grouped;
mod moving;
mod package;

pub const MAX_WAITING_MIN: u32 = 600;
const MAX_ADDRESS_LEN: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub weight_kg: f64,
    pub description: Option<String>,
    #[serde(default)]
    pub fragile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRequest {
    pub zone_number: u32,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub pickup_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_address: String,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedInfo {
    pub zones: Vec<ZoneRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingInfo {
    pub helpers: u32,
    pub floors: u32,
    #[serde(default)]
    pub has_elevator: bool,
    #[serde(default)]
    pub additional_services: Vec<String>,
    pub estimated_volume_m3: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryRequest {
    pub delivery_type: DeliveryType,
    pub pickup_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_address: String,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
    pub vehicle_type: VehicleType,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub waiting_min: u32,
    /// Already-validated promo amount; promo rules live elsewhere.
    #[serde(default)]
    pub promo_discount: f64,
    pub package_info: Option<PackageInfo>,
    pub grouped_info: Option<GroupedInfo>,
    pub moving_info: Option<MovingInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct CreationSettings {
    /// Distance priced when a route endpoint has no coordinates.
    pub default_distance_km: f64,
    pub max_grouped_zones: usize,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            default_distance_km: 5.0,
            max_grouped_zones: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    pub distance_km: Option<f64>,
    pub duration_min: Option<u32>,
}

impl Route {
    pub fn pricing_distance(&self, default_km: f64) -> f64 {
        self.distance_km.unwrap_or(default_km)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum DraftDetails {
    Package(Package),
    Zones(Vec<GroupedZone>),
    Moving(MovingDetails),
}

#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub delivery: Delivery,
    pub pickup: Location,
    pub dropoff: Location,
    pub zone_locations: Vec<Location>,
    pub details: DraftDetails,
}

pub struct DeliveryCreator {
    repository: Arc<dyn Repository>,
    estimator: Arc<dyn DistanceEstimator>,
    pricing: Arc<PricingEngine>,
    settings: CreationSettings,
}

impl DeliveryCreator {
    pub fn new(
        repository: Arc<dyn Repository>,
        estimator: Arc<dyn DistanceEstimator>,
        pricing: Arc<PricingEngine>,
        settings: CreationSettings,
    ) -> Self {
        Self {
            repository,
            estimator,
            pricing,
            settings,
        }
    }

    pub async fn create(
        &self,
        client_id: Uuid,
        request: &CreateDeliveryRequest,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let draft = self.plan(client_id, request)?;
        self.persist(draft).await
    }

    /// Validates and prices a request without writing anything.
    pub(crate) fn plan(
        &self,
        client_id: Uuid,
        request: &CreateDeliveryRequest,
    ) -> Result<Draft, DeliveryError> {
        validate_common(request)?;

        match request.delivery_type {
            DeliveryType::Standard | DeliveryType::Express => {
                package::plan(self, client_id, request)
            }
            DeliveryType::Grouped => grouped::plan(self, client_id, request),
            DeliveryType::Moving => moving::plan(self, client_id, request),
        }
    }

    /// Writes the variant records, locations and the first tracking entry
    /// before the delivery row itself. A failure anywhere leaves no readable
    /// delivery behind.
    pub(crate) async fn persist(&self, draft: Draft) -> Result<DeliveryResponse, DeliveryError> {
        let Draft {
            delivery,
            pickup,
            dropoff,
            zone_locations,
            details,
        } = draft;

        let pickup = self.repository.save_location(pickup).await?;
        let dropoff = self.repository.save_location(dropoff).await?;
        for location in zone_locations {
            self.repository.save_location(location).await?;
        }

        let (package, zones, moving) = match details {
            DraftDetails::Package(package) => {
                self.repository.save_package(package.clone()).await?;
                (Some(package), Vec::new(), None)
            }
            DraftDetails::Zones(zones) => {
                self.repository.save_zones(delivery.id, zones.clone()).await?;
                (None, zones, None)
            }
            DraftDetails::Moving(details) => {
                self.repository.save_moving_details(details.clone()).await?;
                (None, Vec::new(), Some(details))
            }
        };

        let mut entry = TrackingEntry::new(delivery.id, DeliveryStatus::Pending);
        entry.actor_id = Some(delivery.client_id);
        entry.actor_role = Some(ActorRole::Client);
        self.repository.append_tracking(entry).await?;

        let delivery = self.repository.save_delivery(delivery, 0).await?;

        info!(
            delivery_id = %delivery.id,
            client_id = %delivery.client_id,
            variant = delivery.delivery_type.as_str(),
            distance_km = ?delivery.distance_km,
            final_price = delivery.final_price,
            "delivery created"
        );

        let mut response = DeliveryResponse::new(delivery, pickup, dropoff);
        response.package = package;
        response.zones = zones;
        response.moving = moving;
        Ok(response)
    }

    /// Recomputes route and price after the dropoff moved. Grouped deliveries
    /// are priced per zone and cannot be repriced from their outer route.
    pub async fn reprice(
        &self,
        delivery: &Delivery,
        pickup: &Location,
        dropoff: &Location,
    ) -> Result<(Route, PriceBreakdown), DeliveryError> {
        let route = self.route(pickup, dropoff, delivery.delivery_type);
        let distance = route.pricing_distance(self.settings.default_distance_km);

        let extras = match delivery.delivery_type {
            DeliveryType::Standard => VariantExtras::Standard,
            DeliveryType::Express => VariantExtras::Express,
            DeliveryType::Moving => {
                let details = self
                    .repository
                    .load_moving_details(delivery.id)
                    .await?
                    .ok_or_else(|| {
                        DeliveryError::NotFound(format!("moving details for {}", delivery.id))
                    })?;
                VariantExtras::Moving(moving::inputs(&details))
            }
            DeliveryType::Grouped => {
                return Err(DeliveryError::validation(
                    "dropoff",
                    "grouped deliveries are routed through their zones",
                ));
            }
        };

        let price = self.pricing.calculate(
            delivery.vehicle_type,
            distance,
            delivery.waiting_min,
            extras,
            delivery.price.promo_discount,
        )?;

        Ok((route, price))
    }

    pub(crate) fn route(&self, pickup: &Location, dropoff: &Location, variant: DeliveryType) -> Route {
        match distance_between(self.estimator.as_ref(), pickup, dropoff) {
            Ok(distance_km) => Route {
                distance_km: Some(distance_km),
                duration_min: Some(estimate_duration(
                    distance_km,
                    TravelProfile::for_variant(variant),
                )),
            },
            Err(_) => Route {
                distance_km: None,
                duration_min: None,
            },
        }
    }

    pub(crate) fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub(crate) fn settings(&self) -> CreationSettings {
        self.settings
    }
}

/// Builds the pending delivery shared by every variant.
pub(crate) fn new_delivery(
    client_id: Uuid,
    request: &CreateDeliveryRequest,
    pickup: &Location,
    dropoff: &Location,
    route: Route,
    payload_kg: Option<f64>,
    price: PriceBreakdown,
) -> Delivery {
    let now = Utc::now();
    let mut delivery = Delivery {
        id: Uuid::new_v4(),
        client_id,
        courier_id: None,
        delivery_type: request.delivery_type,
        status: DeliveryStatus::Pending,
        pickup_location_id: pickup.id,
        dropoff_location_id: dropoff.id,
        distance_km: route.distance_km,
        duration_min: route.duration_min,
        vehicle_type: request.vehicle_type,
        payload_kg,
        waiting_min: request.waiting_min,
        base_price: 0.0,
        final_price: 0.0,
        price: PriceBreakdown::default(),
        payment_method: request.payment_method,
        cancellation_note: None,
        created_at: now,
        updated_at: now,
        assigned_at: None,
        closed_at: None,
        version: 0,
    };
    delivery.apply_price(price);
    delivery
}

pub(crate) fn endpoints(request: &CreateDeliveryRequest) -> (Location, Location) {
    (
        Location::new(
            request.pickup_address.trim(),
            request.pickup_lat,
            request.pickup_lng,
        ),
        Location::new(
            request.dropoff_address.trim(),
            request.dropoff_lat,
            request.dropoff_lng,
        ),
    )
}

fn validate_common(request: &CreateDeliveryRequest) -> Result<(), DeliveryError> {
    validate_address("pickup_address", &request.pickup_address)?;
    validate_address("dropoff_address", &request.dropoff_address)?;
    validate_coordinates("pickup", request.pickup_lat, request.pickup_lng)?;
    validate_coordinates("dropoff", request.dropoff_lat, request.dropoff_lng)?;

    if request.waiting_min > MAX_WAITING_MIN {
        return Err(DeliveryError::validation(
            "waiting_min",
            format!("must be at most {MAX_WAITING_MIN}"),
        ));
    }

    if !request.promo_discount.is_finite() || request.promo_discount < 0.0 {
        return Err(DeliveryError::validation(
            "promo_discount",
            "must be a non-negative amount",
        ));
    }

    Ok(())
}

pub(crate) fn validate_address(field: &str, address: &str) -> Result<(), DeliveryError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(DeliveryError::validation(field, "cannot be empty"));
    }
    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(DeliveryError::validation(
            field,
            format!("must be at most {MAX_ADDRESS_LEN} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_coordinates(
    prefix: &str,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<(), DeliveryError> {
    if let Some(lat) = lat {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DeliveryError::validation(
                format!("{prefix}_lat"),
                "must be between -90 and 90",
            ));
        }
    }
    if let Some(lng) = lng {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(DeliveryError::validation(
                format!("{prefix}_lng"),
                "must be between -180 and 180",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::{CreateDeliveryRequest, CreationSettings, DeliveryCreator, PackageInfo};
    use crate::geo::Haversine;
    use crate::models::delivery::{DeliveryType, PaymentMethod, VehicleType};
    use crate::pricing::{PricingConfig, PricingEngine};
    use crate::repository::InMemoryRepository;

    pub fn creator() -> (Arc<InMemoryRepository>, DeliveryCreator) {
        let repository = Arc::new(InMemoryRepository::new());
        let creator = DeliveryCreator::new(
            repository.clone(),
            Arc::new(Haversine),
            Arc::new(PricingEngine::new(PricingConfig::default())),
            CreationSettings::default(),
        );
        (repository, creator)
    }

    pub fn request(delivery_type: DeliveryType) -> CreateDeliveryRequest {
        CreateDeliveryRequest {
            delivery_type,
            pickup_address: "Rue Joss, Douala".to_string(),
            pickup_lat: Some(4.0511),
            pickup_lng: Some(9.7679),
            dropoff_address: "Bonapriso, Douala".to_string(),
            dropoff_lat: Some(4.0300),
            dropoff_lng: Some(9.6950),
            vehicle_type: VehicleType::Motorcycle,
            payment_method: PaymentMethod::Cash,
            waiting_min: 0,
            promo_discount: 0.0,
            package_info: Some(PackageInfo {
                weight_kg: 4.0,
                description: Some("documents".to_string()),
                fragile: false,
            }),
            grouped_info: None,
            moving_info: None,
        }
    }
}
