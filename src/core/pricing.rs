use crate::config::toml_config::PricingConfig;
use crate::core::carrier::CarrierApiClient;
use crate::domain::model::{LineItem, Order, PricingTier, ShipmentRequest, SplitAdvice};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// 31–50 kg 的固定安全費率
pub const BULK_FLAT_PRICE: f64 = 85.0;
/// 50 kg 以上 (棧板)
pub const PALLET_FLAT_PRICE: f64 = 150.0;
/// A single line heavier than this ships as its own oversized parcel.
pub const SPLIT_LINE_LIMIT_KG: f64 = 15.0;

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Decides which cart lines count as oversized ("agabaritic").
#[derive(Debug, Clone, Default)]
pub struct OversizePolicy {
    categories: HashSet<u64>,
}

impl OversizePolicy {
    pub fn new(categories: impl IntoIterator<Item = u64>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
        }
    }

    pub fn is_oversized(&self, line: &LineItem) -> bool {
        line.additional_shipping_cost > 0.0
            || line
                .category_id
                .is_some_and(|category| self.categories.contains(&category))
    }

    pub fn shipment_for(&self, lines: &[LineItem], is_locker_delivery: bool) -> ShipmentRequest {
        let weight = lines.iter().map(LineItem::line_weight_kg).sum();
        let oversized = lines.iter().any(|line| self.is_oversized(line));
        ShipmentRequest::new(weight, is_locker_delivery, oversized)
    }
}

struct RemotePricing {
    client: Arc<CarrierApiClient>,
    price_table_id: i64,
    sender_location_id: i64,
}

/// Hybrid shipping-cost calculator: carrier quote first, local tiered table
/// as the fallback. Remote failures never reach the caller.
pub struct RateCalculator {
    config: PricingConfig,
    policy: OversizePolicy,
    remote: Option<RemotePricing>,
}

impl RateCalculator {
    pub fn new(config: PricingConfig) -> Self {
        let policy = OversizePolicy::new(config.oversized_categories.iter().copied());

        let top_of_extra = config.base_price_standard.max(config.base_price_locker)
            + 16.0 * config.extra_kg_price;
        if top_of_extra > BULK_FLAT_PRICE {
            tracing::warn!(
                "⚠️ A 31 kg parcel prices at {:.2}, above the {:.2} flat rate for heavier parcels",
                top_of_extra,
                BULK_FLAT_PRICE
            );
        }

        Self {
            config,
            policy,
            remote: None,
        }
    }

    /// Enables remote quotes when the client has both a price table and a
    /// pickup location configured.
    pub fn with_remote(mut self, client: Arc<CarrierApiClient>) -> Self {
        let carrier = client.config();
        match (carrier.price_table_id, carrier.sender_location_id) {
            (Some(price_table_id), Some(sender_location_id)) => {
                self.remote = Some(RemotePricing {
                    client,
                    price_table_id,
                    sender_location_id,
                });
            }
            _ => tracing::debug!("Remote pricing disabled: price table or pickup location not set"),
        }
        self
    }

    pub fn shipment_for_lines(&self, lines: &[LineItem], is_locker_delivery: bool) -> ShipmentRequest {
        self.policy.shipment_for(lines, is_locker_delivery)
    }

    /// Checkout price for a shipment.
    pub async fn quote(&self, shipment: &ShipmentRequest) -> f64 {
        if let Some(price) = self.remote_quote(shipment).await {
            return price;
        }
        self.local_price(shipment)
    }

    async fn remote_quote(&self, shipment: &ShipmentRequest) -> Option<f64> {
        let remote = self.remote.as_ref()?;
        let weight = billable_weight(shipment.total_weight_kg);
        let budget = Duration::from_millis(self.config.quote_timeout_ms);

        let lookup = remote.client.calculate_price(
            weight,
            remote.price_table_id,
            remote.sender_location_id,
            shipment.is_locker_delivery,
        );

        // 遠端費率表不知道哪些商品是大件，附加費由本地補上
        match tokio::time::timeout(budget, lookup).await {
            Ok(Ok(Some(price))) if price > 0.0 => {
                let tier = PricingTier::classify(shipment.total_weight_kg);
                Some(round_cents(price + self.oversize_surcharge(shipment, tier)))
            }
            Ok(Ok(other)) => {
                tracing::debug!("Remote quote unusable ({:?}), using local table", other);
                None
            }
            Ok(Err(e)) => {
                tracing::debug!("Remote quote failed, using local table: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!("Remote quote exceeded {}ms, using local table", budget.as_millis());
                None
            }
        }
    }

    /// 本地分級費率
    pub fn local_price(&self, shipment: &ShipmentRequest) -> f64 {
        let weight = shipment.total_weight_kg;
        let base = if shipment.is_locker_delivery {
            self.config.base_price_locker
        } else {
            self.config.base_price_standard
        };

        let tier = PricingTier::classify(weight);
        let mut cost = match tier {
            PricingTier::Base => base,
            PricingTier::Extra => base + (weight - 15.0) * self.config.extra_kg_price,
            PricingTier::Bulk => BULK_FLAT_PRICE,
            PricingTier::Pallet => PALLET_FLAT_PRICE,
        };

        cost += self.oversize_surcharge(shipment, tier);
        round_cents(cost.max(0.0))
    }

    fn oversize_surcharge(&self, shipment: &ShipmentRequest, tier: PricingTier) -> f64 {
        // Bulk 與 Pallet 已含大件處理
        if shipment.has_oversized_item && !tier.includes_bulk_handling() {
            self.config.oversize_surcharge
        } else {
            0.0
        }
    }

    /// Compares one consolidated parcel against a standard + oversized pair.
    /// Advisory only, priced with the local table for address delivery.
    pub fn analyze_split(&self, order: &Order) -> SplitAdvice {
        let mut standard_weight = 0.0;
        let mut oversized_weight = 0.0;

        for line in &order.lines {
            let weight = line.line_weight_kg();
            if weight > SPLIT_LINE_LIMIT_KG || self.policy.is_oversized(line) {
                oversized_weight += weight;
            } else {
                standard_weight += weight;
            }
        }

        let has_oversized = oversized_weight > 0.0;
        let total = ShipmentRequest::new(standard_weight + oversized_weight, false, has_oversized);
        let scenario_a = self.local_price(&total);

        if standard_weight <= 0.0 || oversized_weight <= 0.0 {
            return SplitAdvice {
                can_split: false,
                recommend_split: false,
                scenario_a_cost: scenario_a,
                scenario_b_cost: None,
                standard_weight_kg: standard_weight,
                oversized_weight_kg: oversized_weight,
                message: "Order holds a single kind of parcel, nothing to split.".to_string(),
            };
        }

        let standard = self.local_price(&ShipmentRequest::new(standard_weight, false, false));
        let oversized = self.local_price(&ShipmentRequest::new(oversized_weight, false, true));
        let scenario_b = round_cents(standard + oversized);
        let recommend_split = scenario_b < scenario_a;

        let message = if recommend_split {
            format!(
                "Split recommended: two parcels cost {:.2} instead of {:.2}.",
                scenario_b, scenario_a
            )
        } else {
            format!(
                "Keep one parcel: {:.2} consolidated vs {:.2} split.",
                scenario_a, scenario_b
            )
        };

        SplitAdvice {
            can_split: true,
            recommend_split,
            scenario_a_cost: scenario_a,
            scenario_b_cost: Some(scenario_b),
            standard_weight_kg: standard_weight,
            oversized_weight_kg: oversized_weight,
            message,
        }
    }
}

/// Whole kilograms, minimum 1, as the carrier bills them.
pub fn billable_weight(weight_kg: f64) -> u32 {
    let ceiled = weight_kg.max(0.0).ceil();
    if ceiled < 1.0 {
        1
    } else if ceiled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ceiled as u32
    }
}
