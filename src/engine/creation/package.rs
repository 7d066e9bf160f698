use uuid::Uuid;

use super::{endpoints, new_delivery, CreateDeliveryRequest, DeliveryCreator, Draft, DraftDetails};
use crate::error::DeliveryError;
use crate::models::delivery::DeliveryType;
use crate::models::variant::Package;
use crate::pricing::VariantExtras;

pub const STANDARD_MAX_WEIGHT_KG: f64 = 50.0;
pub const EXPRESS_MAX_WEIGHT_KG: f64 = 30.0;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Standard and Express deliveries carry one package and differ only in
/// weight ceiling, speed and rate table.
pub(super) fn plan(
    creator: &DeliveryCreator,
    client_id: Uuid,
    request: &CreateDeliveryRequest,
) -> Result<Draft, DeliveryError> {
    let variant = request.delivery_type;
    let info = request.package_info.as_ref().ok_or_else(|| {
        DeliveryError::validation(
            "package_info",
            format!("required for {} deliveries", variant.as_str()),
        )
    })?;

    let (ceiling, extras) = match variant {
        DeliveryType::Express => (EXPRESS_MAX_WEIGHT_KG, VariantExtras::Express),
        _ => (STANDARD_MAX_WEIGHT_KG, VariantExtras::Standard),
    };

    if !info.weight_kg.is_finite() || info.weight_kg <= 0.0 {
        return Err(DeliveryError::validation(
            "package_info.weight_kg",
            "must be greater than zero",
        ));
    }
    if info.weight_kg > ceiling {
        return Err(DeliveryError::validation(
            "package_info.weight_kg",
            format!("{} deliveries accept at most {ceiling} kg", variant.as_str()),
        ));
    }

    let vehicle_limit = request.vehicle_type.max_payload_kg();
    if info.weight_kg > vehicle_limit {
        return Err(DeliveryError::validation(
            "package_info.weight_kg",
            format!("a {} carries at most {vehicle_limit} kg", request.vehicle_type),
        ));
    }

    let description = info
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    if description
        .as_ref()
        .is_some_and(|text| text.len() > MAX_DESCRIPTION_LEN)
    {
        return Err(DeliveryError::validation(
            "package_info.description",
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }

    let (pickup, dropoff) = endpoints(request);
    let route = creator.route(&pickup, &dropoff, variant);
    let price = creator.pricing().calculate(
        request.vehicle_type,
        route.pricing_distance(creator.settings().default_distance_km),
        request.waiting_min,
        extras,
        request.promo_discount,
    )?;

    let delivery = new_delivery(
        client_id,
        request,
        &pickup,
        &dropoff,
        route,
        Some(info.weight_kg),
        price,
    );
    let package = Package {
        id: Uuid::new_v4(),
        delivery_id: delivery.id,
        weight_kg: info.weight_kg,
        description,
        fragile: info.fragile,
    };

    Ok(Draft {
        delivery,
        pickup,
        dropoff,
        zone_locations: Vec::new(),
        details: DraftDetails::Package(package),
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::engine::creation::fixtures::{creator, request};
    use crate::engine::creation::DraftDetails;
    use crate::error::DeliveryError;
    use crate::models::delivery::{DeliveryType, VehicleType};

    fn field_of(err: DeliveryError) -> String {
        match err {
            DeliveryError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn standard_accepts_fifty_kilograms_on_a_car() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Standard);
        req.vehicle_type = VehicleType::Car;
        req.package_info.as_mut().unwrap().weight_kg = 50.0;

        let draft = creator.plan(Uuid::new_v4(), &req).unwrap();
        assert_eq!(draft.delivery.payload_kg, Some(50.0));
        assert!(matches!(draft.details, DraftDetails::Package(ref p) if p.weight_kg == 50.0));
    }

    #[test]
    fn express_rejects_more_than_thirty_kilograms() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Express);
        req.vehicle_type = VehicleType::Car;
        req.package_info.as_mut().unwrap().weight_kg = 31.0;

        let err = creator.plan(Uuid::new_v4(), &req).unwrap_err();
        assert_eq!(field_of(err), "package_info.weight_kg");
    }

    #[test]
    fn zero_weight_is_rejected() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Standard);
        req.package_info.as_mut().unwrap().weight_kg = 0.0;

        let err = creator.plan(Uuid::new_v4(), &req).unwrap_err();
        assert_eq!(field_of(err), "package_info.weight_kg");
    }

    #[test]
    fn motorcycle_payload_limit_applies() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Standard);
        req.package_info.as_mut().unwrap().weight_kg = 25.0;

        let err = creator.plan(Uuid::new_v4(), &req).unwrap_err();
        assert_eq!(field_of(err), "package_info.weight_kg");
    }

    #[test]
    fn package_is_required() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Express);
        req.package_info = None;

        let err = creator.plan(Uuid::new_v4(), &req).unwrap_err();
        assert_eq!(field_of(err), "package_info");
    }

    #[test]
    fn express_on_a_truck_has_no_rate() {
        let (_, creator) = creator();
        let mut req = request(DeliveryType::Express);
        req.vehicle_type = VehicleType::Truck;

        let err = creator.plan(Uuid::new_v4(), &req).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidVehicleType(VehicleType::Truck)));
    }

    #[test]
    fn express_is_faster_and_dearer_than_standard() {
        let (_, creator) = creator();
        let standard = creator
            .plan(Uuid::new_v4(), &request(DeliveryType::Standard))
            .unwrap();
        let express = creator
            .plan(Uuid::new_v4(), &request(DeliveryType::Express))
            .unwrap();

        assert!(express.delivery.final_price > standard.delivery.final_price);
        assert!(express.delivery.duration_min <= standard.delivery.duration_min);
        assert_eq!(express.delivery.distance_km, standard.delivery.distance_km);
    }
}
