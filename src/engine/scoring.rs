use std::cmp::Ordering;

use crate::geo::DistanceEstimator;
use crate::models::courier::Courier;
use crate::models::location::GeoPoint;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub courier: Courier,
    pub distance_km: f64,
}

/// Orders couriers by distance to the pickup, nearest first. Equal distances
/// go to the courier whose position was reported most recently. Couriers
/// with no known position cannot be ranked and are left out.
pub fn rank_candidates(
    couriers: Vec<Courier>,
    pickup: &GeoPoint,
    estimator: &dyn DistanceEstimator,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = couriers
        .into_iter()
        .filter_map(|courier| {
            let position = courier.location?;
            let distance_km = estimator.distance_km(&position, pickup);
            Some(Candidate {
                courier,
                distance_km,
            })
        })
        .collect();

    candidates.sort_by(compare_candidates);
    candidates
}

pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| b.courier.location_updated_at.cmp(&a.courier.location_updated_at))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::rank_candidates;
    use crate::geo::{haversine_km, Haversine};
    use crate::models::courier::{Courier, DriverStatus};
    use crate::models::delivery::VehicleType;
    use crate::models::location::GeoPoint;

    const PICKUP: GeoPoint = GeoPoint {
        lat: 4.0511,
        lng: 9.7679,
    };

    fn courier(id_seed: u128, location: Option<GeoPoint>, seconds_ago: i64) -> Courier {
        let now = Utc::now();
        Courier {
            id: Uuid::from_u128(id_seed),
            name: "test-courier".to_string(),
            status: DriverStatus::Available,
            vehicle_type: VehicleType::Motorcycle,
            location,
            location_updated_at: Some(now - Duration::seconds(seconds_ago)),
            profile_complete: true,
            vehicle_documents_complete: true,
            version: 1,
            updated_at: now,
        }
    }

    /// A point `km` kilometres due north of the pickup.
    fn north_of_pickup(km: f64) -> GeoPoint {
        GeoPoint {
            lat: PICKUP.lat + km / 111.195,
            lng: PICKUP.lng,
        }
    }

    #[test]
    fn nearest_courier_ranks_first() {
        let one_km = north_of_pickup(1.0);
        let three_km = north_of_pickup(3.0);
        assert!((haversine_km(&one_km, &PICKUP) - 1.0).abs() < 0.01);

        let ranked = rank_candidates(
            vec![courier(3, Some(three_km), 0), courier(1, Some(one_km), 0)],
            &PICKUP,
            &Haversine,
        );

        assert_eq!(ranked[0].courier.id, Uuid::from_u128(1));
        assert!(ranked[0].distance_km < ranked[1].distance_km);
    }

    #[test]
    fn tie_goes_to_freshest_position() {
        let spot = north_of_pickup(2.0);

        let ranked = rank_candidates(
            vec![courier(1, Some(spot), 300), courier(2, Some(spot), 5)],
            &PICKUP,
            &Haversine,
        );

        assert_eq!(ranked[0].courier.id, Uuid::from_u128(2));
    }

    #[test]
    fn couriers_without_position_are_skipped() {
        let ranked = rank_candidates(
            vec![courier(1, None, 0), courier(2, Some(north_of_pickup(9.0)), 0)],
            &PICKUP,
            &Haversine,
        );

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].courier.id, Uuid::from_u128(2));
    }
}
