use uuid::Uuid;

use super::{
    endpoints, new_delivery, validate_address, validate_coordinates, CreateDeliveryRequest,
    DeliveryCreator, Draft, DraftDetails, Route, ZoneRequest,
};
use crate::error::DeliveryError;
use crate::geo::{estimate_duration, TravelProfile};
use crate::models::delivery::DeliveryType;
use crate::models::location::Location;
use crate::models::variant::GroupedZone;
use crate::pricing::{VariantExtras, ZoneLeg};

const MIN_ZONES: usize = 2;

pub(super) fn plan(
    creator: &DeliveryCreator,
    client_id: Uuid,
    request: &CreateDeliveryRequest,
) -> Result<Draft, DeliveryError> {
    let info = request
        .grouped_info
        .as_ref()
        .ok_or_else(|| DeliveryError::validation("grouped_info", "required for grouped deliveries"))?;

    let max_zones = creator.settings().max_grouped_zones;
    if info.zones.len() < MIN_ZONES || info.zones.len() > max_zones {
        return Err(DeliveryError::validation(
            "grouped_info.zones",
            format!("between {MIN_ZONES} and {max_zones} zones are required"),
        ));
    }

    let mut zones: Vec<&ZoneRequest> = info.zones.iter().collect();
    zones.sort_by_key(|zone| zone.zone_number);
    for (index, zone) in zones.iter().enumerate() {
        if zone.zone_number as usize != index + 1 {
            return Err(DeliveryError::validation(
                "grouped_info.zones",
                "zone numbers must be unique and contiguous from 1",
            ));
        }
        validate_zone(zone)?;
    }

    let default_km = creator.settings().default_distance_km;
    let mut legs = Vec::with_capacity(zones.len());
    let mut zone_routes = Vec::with_capacity(zones.len());
    let mut zone_locations = Vec::with_capacity(zones.len() * 2);

    for zone in &zones {
        let pickup = Location::new(zone.pickup_address.trim(), zone.pickup_lat, zone.pickup_lng);
        let dropoff = Location::new(
            zone.dropoff_address.trim(),
            zone.dropoff_lat,
            zone.dropoff_lng,
        );
        let route = creator.route(&pickup, &dropoff, DeliveryType::Grouped);

        legs.push(ZoneLeg {
            zone_number: zone.zone_number,
            distance_km: route.pricing_distance(default_km),
        });
        zone_routes.push((route, pickup.id, dropoff.id));
        zone_locations.push(pickup);
        zone_locations.push(dropoff);
    }

    let total_km: Option<f64> = zone_routes
        .iter()
        .map(|(route, _, _)| route.distance_km)
        .sum();
    let route = Route {
        distance_km: total_km,
        duration_min: total_km
            .map(|km| estimate_duration(km, TravelProfile::for_variant(DeliveryType::Grouped))),
    };

    let price = creator.pricing().calculate(
        request.vehicle_type,
        route.pricing_distance(default_km),
        request.waiting_min,
        VariantExtras::Grouped(&legs),
        request.promo_discount,
    )?;

    let (pickup, dropoff) = endpoints(request);
    let zone_prices = price.zones.clone();
    let delivery = new_delivery(client_id, request, &pickup, &dropoff, route, None, price);

    let records = zones
        .iter()
        .zip(zone_routes)
        .map(|(zone, (route, pickup_id, dropoff_id))| GroupedZone {
            id: Uuid::new_v4(),
            delivery_id: delivery.id,
            zone_number: zone.zone_number,
            recipient_name: zone.recipient_name.trim().to_string(),
            recipient_phone: zone.recipient_phone.trim().to_string(),
            pickup_location_id: pickup_id,
            dropoff_location_id: dropoff_id,
            distance_km: route.distance_km,
            price: zone_prices
                .iter()
                .find(|priced| priced.zone_number == zone.zone_number)
                .map(|priced| priced.price)
                .unwrap_or_default(),
        })
        .collect();

    Ok(Draft {
        delivery,
        pickup,
        dropoff,
        zone_locations,
        details: DraftDetails::Zones(records),
    })
}

fn validate_zone(zone: &ZoneRequest) -> Result<(), DeliveryError> {
    let field = |name: &str| format!("grouped_info.zones[{}].{name}", zone.zone_number);

    if zone.recipient_name.trim().is_empty() {
        return Err(DeliveryError::validation(field("recipient_name"), "cannot be empty"));
    }
    if !is_plausible_phone(&zone.recipient_phone) {
        return Err(DeliveryError::validation(
            field("recipient_phone"),
            "must contain 6 to 15 digits",
        ));
    }

    validate_address(&field("pickup_address"), &zone.pickup_address)?;
    validate_address(&field("dropoff_address"), &zone.dropoff_address)?;
    validate_coordinates(&field("pickup"), zone.pickup_lat, zone.pickup_lng)?;
    validate_coordinates(&field("dropoff"), zone.dropoff_lat, zone.dropoff_lng)
}

fn is_plausible_phone(raw: &str) -> bool {
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    allowed && (6..=15).contains(&digits)
}
