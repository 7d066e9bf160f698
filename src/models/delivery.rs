use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeliveryType {
    Standard,
    Express,
    Grouped,
    Moving,
}

impl DeliveryType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryType::Standard => "standard",
            DeliveryType::Express => "express",
            DeliveryType::Grouped => "grouped",
            DeliveryType::Moving => "moving",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    InProgress,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle classes, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleType {
    Motorcycle,
    Car,
    Van,
    Truck,
}

impl VehicleType {
    pub fn max_payload_kg(self) -> f64 {
        match self {
            VehicleType::Motorcycle => 20.0,
            VehicleType::Car => 50.0,
            VehicleType::Van => 800.0,
            VehicleType::Truck => 3_000.0,
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZonePrice {
    pub zone_number: u32,
    pub gross: f64,
    pub discount_rate: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub distance_price: f64,
    pub waiting_price: f64,
    pub variant_adjustment: f64,
    pub subtotal: f64,
    pub promo_discount: f64,
    pub final_price: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<ZonePrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub client_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub delivery_type: DeliveryType,
    pub status: DeliveryStatus,
    pub pickup_location_id: Uuid,
    pub dropoff_location_id: Uuid,
    pub distance_km: Option<f64>,
    pub duration_min: Option<u32>,
    pub vehicle_type: VehicleType,
    pub payload_kg: Option<f64>,
    pub waiting_min: u32,
    pub base_price: f64,
    pub final_price: f64,
    pub price: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub cancellation_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token. Zero until the first save.
    pub version: u64,
}

impl Delivery {
    pub fn apply_price(&mut self, price: PriceBreakdown) {
        self.base_price = price.base_price;
        self.final_price = price.final_price;
        self.price = price;
    }
}
