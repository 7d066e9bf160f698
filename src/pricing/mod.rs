use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::models::delivery::{PriceBreakdown, VehicleType, ZonePrice};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateCard {
    pub base: f64,
    pub per_km: f64,
    pub per_minute: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GroupedRates {
    /// Discount added per zone after the first, e.g. 0.10 for 10%.
    pub step: f64,
    /// Last zone number that receives a stepped discount.
    pub stepped_zones: u32,
    /// Flat discount for every zone past `stepped_zones`.
    pub floor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MovingRates {
    pub helper_fee: f64,
    pub extra_floor_fee: f64,
    pub service_fee: f64,
    pub free_volume_m3: f64,
    pub per_m3_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    pub standard: HashMap<VehicleType, RateCard>,
    pub express: HashMap<VehicleType, RateCard>,
    pub express_multiplier: f64,
    pub grouped: GroupedRates,
    pub moving: MovingRates,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let standard = HashMap::from([
            (VehicleType::Motorcycle, rate(500.0, 100.0, 10.0)),
            (VehicleType::Car, rate(800.0, 150.0, 15.0)),
            (VehicleType::Van, rate(1_500.0, 250.0, 20.0)),
            (VehicleType::Truck, rate(3_000.0, 400.0, 30.0)),
        ]);
        let express = HashMap::from([
            (VehicleType::Motorcycle, rate(700.0, 150.0, 15.0)),
            (VehicleType::Car, rate(1_000.0, 200.0, 20.0)),
            (VehicleType::Van, rate(2_000.0, 300.0, 25.0)),
        ]);

        Self {
            standard,
            express,
            express_multiplier: 1.5,
            grouped: GroupedRates {
                step: 0.10,
                stepped_zones: 5,
                floor: 0.50,
            },
            moving: MovingRates {
                helper_fee: 2_000.0,
                extra_floor_fee: 1_000.0,
                service_fee: 1_500.0,
                free_volume_m3: 10.0,
                per_m3_fee: 500.0,
            },
        }
    }
}

fn rate(base: f64, per_km: f64, per_minute: f64) -> RateCard {
    RateCard {
        base,
        per_km,
        per_minute,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLeg {
    pub zone_number: u32,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingInputs {
    pub helpers: u32,
    pub floors: u32,
    pub has_elevator: bool,
    pub services: usize,
    pub volume_m3: f64,
}

/// Variant-specific pricing inputs.
#[derive(Debug, Clone, Copy)]
pub enum VariantExtras<'a> {
    Standard,
    Express,
    Grouped(&'a [ZoneLeg]),
    Moving(MovingInputs),
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn calculate(
        &self,
        vehicle_type: VehicleType,
        distance_km: f64,
        waiting_min: u32,
        extras: VariantExtras<'_>,
        promo_discount: f64,
    ) -> Result<PriceBreakdown, DeliveryError> {
        let mut breakdown = match extras {
            VariantExtras::Standard => {
                let card = self.card(&self.config.standard, vehicle_type)?;
                linear(card, distance_km, waiting_min)
            }
            VariantExtras::Express => {
                let card = self.card(&self.config.express, vehicle_type)?;
                let mut breakdown = linear(card, distance_km, waiting_min);
                let raw = breakdown.base_price + breakdown.distance_price + breakdown.waiting_price;
                breakdown.variant_adjustment = raw * (self.config.express_multiplier - 1.0);
                breakdown
            }
            VariantExtras::Grouped(legs) => {
                let card = self.card(&self.config.standard, vehicle_type)?;
                self.grouped(card, legs, waiting_min)
            }
            VariantExtras::Moving(inputs) => {
                let card = self.card(&self.config.standard, vehicle_type)?;
                let mut breakdown = linear(card, distance_km, waiting_min);
                breakdown.variant_adjustment = self.moving_surcharge(inputs);
                breakdown
            }
        };

        breakdown.base_price = round_currency(breakdown.base_price);
        breakdown.distance_price = round_currency(breakdown.distance_price);
        breakdown.waiting_price = round_currency(breakdown.waiting_price);
        breakdown.variant_adjustment = round_currency(breakdown.variant_adjustment);
        breakdown.subtotal = round_currency(
            breakdown.base_price
                + breakdown.distance_price
                + breakdown.waiting_price
                + breakdown.variant_adjustment,
        );

        let promo = promo_discount.max(0.0);
        breakdown.promo_discount = round_currency(promo);
        breakdown.final_price = round_currency((breakdown.subtotal - promo).max(0.0));

        Ok(breakdown)
    }

    /// Discount rate for a grouped zone: zone 1 pays full price, each
    /// following zone up to the stepped limit adds one step, the rest share
    /// the floor.
    pub fn zone_discount_rate(&self, zone_number: u32) -> f64 {
        let rates = &self.config.grouped;
        if zone_number <= 1 {
            0.0
        } else if zone_number <= rates.stepped_zones {
            rates.step * f64::from(zone_number - 1)
        } else {
            rates.floor
        }
    }

    fn card(
        &self,
        table: &HashMap<VehicleType, RateCard>,
        vehicle_type: VehicleType,
    ) -> Result<RateCard, DeliveryError> {
        table
            .get(&vehicle_type)
            .copied()
            .ok_or(DeliveryError::InvalidVehicleType(vehicle_type))
    }

    fn grouped(&self, card: RateCard, legs: &[ZoneLeg], waiting_min: u32) -> PriceBreakdown {
        let mut breakdown = PriceBreakdown::default();
        let mut discounts = 0.0;

        for leg in legs {
            let waiting = if leg.zone_number == 1 { waiting_min } else { 0 };
            let zone = linear(card, leg.distance_km, waiting);
            let gross = zone.base_price + zone.distance_price + zone.waiting_price;
            let discount_rate = self.zone_discount_rate(leg.zone_number);
            let price = round_currency(gross * (1.0 - discount_rate));

            breakdown.base_price += zone.base_price;
            breakdown.distance_price += zone.distance_price;
            breakdown.waiting_price += zone.waiting_price;
            discounts += gross - price;
            breakdown.zones.push(ZonePrice {
                zone_number: leg.zone_number,
                gross: round_currency(gross),
                discount_rate,
                price,
            });
        }

        breakdown.variant_adjustment = -discounts;
        breakdown
    }

    fn moving_surcharge(&self, inputs: MovingInputs) -> f64 {
        let rates = &self.config.moving;

        let helpers = rates.helper_fee * f64::from(inputs.helpers);
        let floors = if inputs.has_elevator {
            0.0
        } else {
            rates.extra_floor_fee * f64::from(inputs.floors.saturating_sub(1))
        };
        let services = rates.service_fee * inputs.services as f64;
        let volume = (inputs.volume_m3 - rates.free_volume_m3).max(0.0) * rates.per_m3_fee;

        helpers + floors + services + volume
    }
}

fn linear(card: RateCard, distance_km: f64, waiting_min: u32) -> PriceBreakdown {
    PriceBreakdown {
        base_price: card.base,
        distance_price: card.per_km * distance_km.max(0.0),
        waiting_price: card.per_minute * f64::from(waiting_min),
        ..PriceBreakdown::default()
    }
}

pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{MovingInputs, PricingConfig, PricingEngine, VariantExtras, ZoneLeg};
    use crate::error::DeliveryError;
    use crate::models::delivery::VehicleType;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default())
    }

    #[test]
    fn standard_motorcycle_five_km() {
        let engine = engine();
        let card = engine.config().standard[&VehicleType::Motorcycle];

        let price = engine
            .calculate(VehicleType::Motorcycle, 5.0, 0, VariantExtras::Standard, 0.0)
            .unwrap();

        assert_eq!(price.final_price, card.base + 5.0 * card.per_km);
        assert_eq!(price.variant_adjustment, 0.0);
    }

    #[test]
    fn express_applies_multiplier_on_express_table() {
        let engine = engine();
        let card = engine.config().express[&VehicleType::Motorcycle];

        let price = engine
            .calculate(VehicleType::Motorcycle, 5.0, 0, VariantExtras::Express, 0.0)
            .unwrap();

        assert_eq!(price.final_price, 1.5 * (card.base + 5.0 * card.per_km));
        assert_eq!(price.base_price, card.base);
    }

    #[test]
    fn express_without_table_entry_is_rejected() {
        let err = engine()
            .calculate(VehicleType::Truck, 5.0, 0, VariantExtras::Express, 0.0)
            .unwrap_err();

        assert!(matches!(err, DeliveryError::InvalidVehicleType(VehicleType::Truck)));
    }

    #[test]
    fn waiting_time_is_charged_per_minute() {
        let engine = engine();
        let card = engine.config().standard[&VehicleType::Car];

        let price = engine
            .calculate(VehicleType::Car, 0.0, 12, VariantExtras::Standard, 0.0)
            .unwrap();

        assert_eq!(price.waiting_price, 12.0 * card.per_minute);
    }

    #[test]
    fn grouped_three_zones_at_800() {
        let legs: Vec<ZoneLeg> = (1..=3)
            .map(|zone_number| ZoneLeg {
                zone_number,
                distance_km: 0.0,
            })
            .collect();

        let price = engine()
            .calculate(VehicleType::Car, 0.0, 0, VariantExtras::Grouped(&legs), 0.0)
            .unwrap();

        let zone_prices: Vec<f64> = price.zones.iter().map(|z| z.price).collect();
        assert_eq!(zone_prices, vec![800.0, 720.0, 640.0]);
        assert_eq!(price.final_price, 2_160.0);
        assert_eq!(price.variant_adjustment, -240.0);
    }

    #[test]
    fn grouped_discount_is_degressive_then_floors() {
        let legs: Vec<ZoneLeg> = (1..=8)
            .map(|zone_number| ZoneLeg {
                zone_number,
                distance_km: 2.0,
            })
            .collect();

        let price = engine()
            .calculate(VehicleType::Motorcycle, 0.0, 0, VariantExtras::Grouped(&legs), 0.0)
            .unwrap();

        for pair in price.zones[..5].windows(2) {
            assert!(pair[1].price < pair[0].price);
        }
        assert_eq!(price.zones[5].price, price.zones[6].price);
        assert_eq!(price.zones[6].price, price.zones[7].price);
        assert_eq!(price.zones[5].discount_rate, 0.5);
    }

    #[test]
    fn moving_surcharges_add_up() {
        let engine = engine();
        let card = engine.config().standard[&VehicleType::Van];
        let inputs = MovingInputs {
            helpers: 2,
            floors: 4,
            has_elevator: false,
            services: 1,
            volume_m3: 14.0,
        };

        let price = engine
            .calculate(VehicleType::Van, 0.0, 0, VariantExtras::Moving(inputs), 0.0)
            .unwrap();

        // 2 helpers, 3 extra floors, 1 service, 4 m3 over the free volume
        let surcharge = 2.0 * 2_000.0 + 3.0 * 1_000.0 + 1_500.0 + 4.0 * 500.0;
        assert_eq!(price.variant_adjustment, surcharge);
        assert_eq!(price.final_price, card.base + surcharge);
    }

    #[test]
    fn elevator_waives_floor_fee() {
        let inputs = MovingInputs {
            helpers: 1,
            floors: 6,
            has_elevator: true,
            services: 0,
            volume_m3: 5.0,
        };

        let price = engine()
            .calculate(VehicleType::Truck, 0.0, 0, VariantExtras::Moving(inputs), 0.0)
            .unwrap();

        assert_eq!(price.variant_adjustment, 2_000.0);
    }

    #[test]
    fn promo_never_drives_price_negative() {
        let price = engine()
            .calculate(VehicleType::Motorcycle, 1.0, 0, VariantExtras::Standard, 10_000.0)
            .unwrap();

        assert_eq!(price.final_price, 0.0);
        assert_eq!(price.subtotal, 600.0);
    }

    #[test]
    fn price_does_not_decrease_with_distance() {
        let engine = engine();
        let mut previous = 0.0;

        for step in 0..50 {
            let distance = f64::from(step) * 0.7;
            let price = engine
                .calculate(VehicleType::Car, distance, 0, VariantExtras::Express, 0.0)
                .unwrap();
            assert!(price.final_price >= previous);
            previous = price.final_price;
        }
    }
}
