use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;
pub type CartId = u64;

/// 承運商登入後取得的 bearer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CarrierSession {
    pub fn new(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Order fulfillment state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFulfillmentState {
    #[default]
    Placed,
    AwbGenerated,
    InTransit,
    Delivered,
    Returned,
}

impl OrderFulfillmentState {
    pub fn rank(self) -> u8 {
        match self {
            OrderFulfillmentState::Placed => 0,
            OrderFulfillmentState::AwbGenerated => 1,
            OrderFulfillmentState::InTransit => 2,
            OrderFulfillmentState::Delivered | OrderFulfillmentState::Returned => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderFulfillmentState::Delivered | OrderFulfillmentState::Returned
        )
    }

    /// `self` 是否為相對 `current` 的前進
    pub fn is_progress_from(self, current: OrderFulfillmentState) -> bool {
        !current.is_terminal() && self.rank() > current.rank()
    }
}

impl fmt::Display for OrderFulfillmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderFulfillmentState::Placed => "placed",
            OrderFulfillmentState::AwbGenerated => "awb_generated",
            OrderFulfillmentState::InTransit => "in_transit",
            OrderFulfillmentState::Delivered => "delivered",
            OrderFulfillmentState::Returned => "returned",
        };
        f.write_str(name)
    }
}

/// Shipment description derived from a cart, used for quoting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub total_weight_kg: f64,
    pub is_locker_delivery: bool,
    pub has_oversized_item: bool,
}

impl ShipmentRequest {
    pub fn new(total_weight_kg: f64, is_locker_delivery: bool, has_oversized_item: bool) -> Self {
        Self {
            total_weight_kg: total_weight_kg.max(0.0),
            is_locker_delivery,
            has_oversized_item,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingTier {
    /// up to 15 kg
    Base,
    /// (15, 31] kg
    Extra,
    /// (31, 50] kg
    Bulk,
    /// over 50 kg
    Pallet,
}

impl PricingTier {
    pub fn classify(weight_kg: f64) -> Self {
        if weight_kg <= 15.0 {
            PricingTier::Base
        } else if weight_kg <= 31.0 {
            PricingTier::Extra
        } else if weight_kg <= 50.0 {
            PricingTier::Bulk
        } else {
            PricingTier::Pallet
        }
    }

    /// Bulk 與 Pallet 已含大件處理費
    pub fn includes_bulk_handling(self) -> bool {
        matches!(self, PricingTier::Bulk | PricingTier::Pallet)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: u64,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<u64>,
    pub unit_weight_kg: f64,
    pub quantity: u32,
    #[serde(default)]
    pub additional_shipping_cost: f64,
}

impl LineItem {
    pub fn line_weight_kg(&self) -> f64 {
        self.unit_weight_kg * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    pub city: String,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_mobile: Option<String>,
}

impl DeliveryAddress {
    pub fn street(&self) -> String {
        format!("{} {}", self.address1, self.address2).trim().to_string()
    }

    /// Landline first, mobile as fallback.
    pub fn contact_phone(&self) -> Option<String> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.phone_mobile.as_deref().filter(|p| !p.trim().is_empty()))
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwbRecord {
    pub order_id: OrderId,
    pub awb_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference: String,
    pub cart_id: CartId,
    pub customer: Customer,
    pub address: DeliveryAddress,
    pub lines: Vec<LineItem>,
    pub payment_module: String,
    pub total_paid: f64,
    #[serde(default)]
    pub state: OrderFulfillmentState,
    #[serde(default)]
    pub awb: Option<AwbRecord>,
}

impl Order {
    pub fn total_weight_kg(&self) -> f64 {
        self.lines.iter().map(LineItem::line_weight_kg).sum()
    }

    /// 空字串視同未產生
    pub fn awb_number(&self) -> Option<&str> {
        self.awb
            .as_ref()
            .map(|awb| awb.awb_number.as_str())
            .filter(|number| !number.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnAwbRecord {
    pub order_id: OrderId,
    pub awb_number: String,
    pub created_at: DateTime<Utc>,
}

/// Order history entry, written once per real transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub order_id: OrderId,
    pub from: OrderFulfillmentState,
    pub to: OrderFulfillmentState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PudoLocation {
    pub external_id: String,
    pub name: String,
    pub city: String,
    pub county: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_active: bool,
}

/// Carrier locality with its lookup key precomputed by `geo::normalize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub locality_id: String,
    pub name: String,
    pub county: String,
    pub normalized_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPudoSelection {
    pub cart_id: CartId,
    pub pudo_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub processed: usize,
    pub deactivated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unmapped: usize,
    pub failed: usize,
}

/// Smart split recommendation. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitAdvice {
    pub can_split: bool,
    pub recommend_split: bool,
    pub scenario_a_cost: f64,
    pub scenario_b_cost: Option<f64>,
    pub standard_weight_kg: f64,
    pub oversized_weight_kg: f64,
    pub message: String,
}

/// One tracking event from the carrier's trace endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_id: String,
    pub description: Option<String>,
    pub date: Option<String>,
}

/// Account lookup entry (pickup location, price table, service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: i64,
    pub name: String,
}
