use uuid::Uuid;

use super::{endpoints, new_delivery, CreateDeliveryRequest, DeliveryCreator, Draft, DraftDetails};
use crate::error::DeliveryError;
use crate::models::delivery::{DeliveryType, VehicleType};
use crate::models::variant::MovingDetails;
use crate::pricing::{MovingInputs, VariantExtras};

const MAX_HELPERS: u32 = 10;
const MAX_FLOORS: u32 = 60;
const MAX_VOLUME_M3: f64 = 200.0;
const MAX_SERVICES: usize = 20;

pub(super) fn plan(
    creator: &DeliveryCreator,
    client_id: Uuid,
    request: &CreateDeliveryRequest,
) -> Result<Draft, DeliveryError> {
    let info = request
        .moving_info
        .as_ref()
        .ok_or_else(|| DeliveryError::validation("moving_info", "required for moving deliveries"))?;

    if !matches!(request.vehicle_type, VehicleType::Van | VehicleType::Truck) {
        return Err(DeliveryError::validation(
            "vehicle_type",
            "moving deliveries need a van or a truck",
        ));
    }
    if !(1..=MAX_HELPERS).contains(&info.helpers) {
        return Err(DeliveryError::validation(
            "moving_info.helpers",
            format!("must be between 1 and {MAX_HELPERS}"),
        ));
    }
    if !(1..=MAX_FLOORS).contains(&info.floors) {
        return Err(DeliveryError::validation(
            "moving_info.floors",
            format!("must be between 1 and {MAX_FLOORS}"),
        ));
    }
    if !info.estimated_volume_m3.is_finite()
        || info.estimated_volume_m3 <= 0.0
        || info.estimated_volume_m3 > MAX_VOLUME_M3
    {
        return Err(DeliveryError::validation(
            "moving_info.estimated_volume_m3",
            format!("must be greater than 0 and at most {MAX_VOLUME_M3}"),
        ));
    }

    let services: Vec<String> = info
        .additional_services
        .iter()
        .map(|service| service.trim().to_string())
        .collect();
    if services.iter().any(String::is_empty) {
        return Err(DeliveryError::validation(
            "moving_info.additional_services",
            "service names cannot be empty",
        ));
    }
    if services.len() > MAX_SERVICES {
        return Err(DeliveryError::validation(
            "moving_info.additional_services",
            format!("at most {MAX_SERVICES} services"),
        ));
    }

    let (pickup, dropoff) = endpoints(request);
    let route = creator.route(&pickup, &dropoff, DeliveryType::Moving);

    let delivery_id = Uuid::new_v4();
    let details = MovingDetails {
        id: Uuid::new_v4(),
        delivery_id,
        helpers: info.helpers,
        floors: info.floors,
        has_elevator: info.has_elevator,
        additional_services: services,
        estimated_volume_m3: info.estimated_volume_m3,
    };

    let price = creator.pricing().calculate(
        request.vehicle_type,
        route.pricing_distance(creator.settings().default_distance_km),
        request.waiting_min,
        VariantExtras::Moving(inputs(&details)),
        request.promo_discount,
    )?;

    let mut delivery = new_delivery(client_id, request, &pickup, &dropoff, route, None, price);
    delivery.id = delivery_id;

    Ok(Draft {
        delivery,
        pickup,
        dropoff,
        zone_locations: Vec::new(),
        details: DraftDetails::Moving(details),
    })
}

pub(super) fn inputs(details: &MovingDetails) -> MovingInputs {
    MovingInputs {
        helpers: details.helpers,
        floors: details.floors,
        has_elevator: details.has_elevator,
        services: details.additional_services.len(),
        volume_m3: details.estimated_volume_m3,
    }
}
