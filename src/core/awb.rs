use crate::config::toml_config::{default_status_map, AwbConfig};
use crate::core::carrier::{AwbCreation, AwbPayload, CarrierApiClient, Party};
use crate::core::pricing::{billable_weight, round_cents};
use crate::domain::model::{AwbRecord, Order, OrderFulfillmentState, OrderId, ReconcileStats};
use crate::domain::ports::{AwbAssignment, OrderRepository};
use crate::utils::error::{Result, ShipError};
use crate::utils::validation::require_setting;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Carrier tracking event code → local fulfillment state.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMap {
    entries: HashMap<String, OrderFulfillmentState>,
}

impl StatusMap {
    /// 啟動時驗證：不可為空，目標只能是運送中之後的狀態
    pub fn from_entries(entries: &BTreeMap<String, OrderFulfillmentState>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ShipError::ConfigValidationError {
                field: "tracking.status_map".to_string(),
                message: "At least one carrier event code must be mapped".to_string(),
            });
        }

        let mut mapped = HashMap::with_capacity(entries.len());
        for (code, state) in entries {
            let code = code.trim();
            if code.is_empty() {
                return Err(ShipError::InvalidConfigValueError {
                    field: "tracking.status_map".to_string(),
                    value: String::new(),
                    reason: "Event codes cannot be blank".to_string(),
                });
            }
            if !matches!(
                state,
                OrderFulfillmentState::InTransit
                    | OrderFulfillmentState::Delivered
                    | OrderFulfillmentState::Returned
            ) {
                return Err(ShipError::InvalidConfigValueError {
                    field: format!("tracking.status_map.{}", code),
                    value: state.to_string(),
                    reason: "Tracking may only move orders to in_transit, delivered or returned"
                        .to_string(),
                });
            }
            mapped.insert(code.to_string(), *state);
        }

        Ok(Self { entries: mapped })
    }

    pub fn resolve(&self, event_code: &str) -> Option<OrderFulfillmentState> {
        self.entries.get(event_code.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Same codes a config file without `[tracking.status_map]` gets.
impl Default for StatusMap {
    fn default() -> Self {
        Self {
            entries: default_status_map().into_iter().collect(),
        }
    }
}

/// Operator overrides for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AwbOptions {
    pub parcels: Option<u32>,
    pub weight_kg: Option<f64>,
}

/// Outbound AWB generation and status reconciliation.
pub struct AwbLifecycleManager<R: OrderRepository> {
    client: Arc<CarrierApiClient>,
    orders: Arc<R>,
    config: AwbConfig,
    status_map: StatusMap,
}

impl<R: OrderRepository> AwbLifecycleManager<R> {
    pub fn new(
        client: Arc<CarrierApiClient>,
        orders: Arc<R>,
        config: AwbConfig,
        status_map: StatusMap,
    ) -> Self {
        Self {
            client,
            orders,
            config,
            status_map,
        }
    }

    pub fn status_map(&self) -> &StatusMap {
        &self.status_map
    }

    pub async fn generate(&self, order_id: OrderId) -> Result<String> {
        self.generate_with(order_id, AwbOptions::default()).await
    }

    /// Issues the outbound AWB. Rejected with `AlreadyGenerated` once an order
    /// carries one, even when two calls race.
    pub async fn generate_with(&self, order_id: OrderId, options: AwbOptions) -> Result<String> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(ShipError::OrderNotFound { order_id })?;

        if let Some(existing) = order.awb_number() {
            return Err(ShipError::AlreadyGenerated {
                order_id,
                awb_number: existing.to_string(),
            });
        }

        let sender_location_id = *require_setting(
            "carrier.sender_location_id",
            &self.client.config().sender_location_id,
        )?;
        let pudo_id = self.orders.selected_pudo(order.cart_id).await?;

        let weight_kg = options
            .weight_kg
            .filter(|w| *w > 0.0)
            .unwrap_or_else(|| order.total_weight_kg());
        let parcels = options
            .parcels
            .filter(|p| *p > 0)
            .unwrap_or(self.config.default_parcels);

        let payload = self.build_payload(&order, sender_location_id, pudo_id, weight_kg, parcels);
        tracing::info!(
            "📦 Requesting AWB for order {}: {} kg, {} parcel(s), COD {:.2}",
            order_id,
            payload.total_weight,
            payload.parcels,
            payload.cash_on_delivery
        );

        let barcode = match self.client.create_awb(&payload).await? {
            AwbCreation::Created(barcode) => barcode,
            AwbCreation::Rejected(reason) => {
                tracing::error!("❌ Carrier rejected AWB for order {}: {}", order_id, reason);
                return Err(ShipError::ApiValidation { message: reason });
            }
        };

        let record = AwbRecord {
            order_id,
            awb_number: barcode.clone(),
            created_at: Utc::now(),
        };

        if let AwbAssignment::AlreadyAssigned(existing) =
            self.orders.assign_awb_if_empty(record).await?
        {
            tracing::warn!(
                "⚠️ Order {} got AWB {} from a concurrent request, carrier AWB {} is orphaned",
                order_id,
                existing.awb_number,
                barcode
            );
            return Err(ShipError::AlreadyGenerated {
                order_id,
                awb_number: existing.awb_number,
            });
        }

        if self.config.transition_on_generate {
            if let Err(e) = self
                .orders
                .transition_state(order_id, OrderFulfillmentState::AwbGenerated)
                .await
            {
                tracing::error!("❌ AWB {} saved but state change failed: {}", barcode, e);
            }
        }

        tracing::info!("✅ AWB {} generated for order {}", barcode, order_id);
        Ok(barcode)
    }

    fn cash_on_delivery(&self, order: &Order) -> f64 {
        let module = order.payment_module.trim();
        let is_cod = self
            .config
            .cod_payment_modules
            .iter()
            .any(|m| m.eq_ignore_ascii_case(module));
        if is_cod {
            round_cents(order.total_paid.max(0.0))
        } else {
            0.0
        }
    }

    fn build_payload(
        &self,
        order: &Order,
        sender_location_id: i64,
        pudo_id: Option<String>,
        weight_kg: f64,
        parcels: u32,
    ) -> AwbPayload {
        let full_name = order.customer.full_name();
        let address_text = match &pudo_id {
            Some(id) => format!("Pickup point delivery: {}", id),
            None => order.address.street(),
        };

        let recipient = Party {
            location_id: None,
            name: full_name.clone(),
            contact_person: full_name,
            phone: order.address.contact_phone().unwrap_or_default(),
            email: order.customer.email.clone(),
            county_name: order.address.county.clone().unwrap_or_default(),
            locality_name: order.address.city.clone(),
            address_text,
        };

        let carrier = self.client.config();
        AwbPayload {
            sender: Party::location(sender_location_id),
            recipient,
            parcels,
            envelopes: 0,
            total_weight: billable_weight(weight_kg),
            declared_value: 0.0,
            cash_on_delivery: self.cash_on_delivery(order),
            observations: format!("Order #{}", order.reference),
            service_id: carrier.service_id,
            price_table_id: carrier.price_table_id,
            delivery_pudo_point: pudo_id,
            pickup_pudo_point: None,
        }
    }

    /// Scheduled tracking pass over every shipped, non-terminal order.
    ///
    /// One login serves the whole batch. A tracking failure on one order is
    /// counted and skipped.
    pub async fn reconcile_statuses(&self) -> Result<ReconcileStats> {
        let orders = self.orders.orders_in_flight().await?;
        let mut stats = ReconcileStats::default();

        if orders.is_empty() {
            tracing::info!("📦 No shipments in flight, nothing to reconcile");
            return Ok(stats);
        }

        self.client.authenticate().await?;
        tracing::info!("📡 Reconciling {} shipment(s)", orders.len());

        for order in orders {
            let Some(awb_number) = order.awb_number() else {
                continue;
            };
            stats.checked += 1;

            let events = match self.client.trace_awb(awb_number).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Tracking failed for order {} (AWB {}): {}",
                        order.id,
                        awb_number,
                        e
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            // 最新事件在第一筆
            let Some(latest) = events.first() else {
                tracing::debug!("AWB {} has no tracking events yet", awb_number);
                stats.unchanged += 1;
                continue;
            };

            let Some(target) = self.status_map.resolve(&latest.event_id) else {
                tracing::warn!(
                    "⚠️ Unmapped carrier event '{}' for AWB {} (order {})",
                    latest.event_id,
                    awb_number,
                    order.id
                );
                stats.unmapped += 1;
                continue;
            };

            if !target.is_progress_from(order.state) {
                stats.unchanged += 1;
                continue;
            }

            match self.orders.transition_state(order.id, target).await {
                Ok(true) => stats.updated += 1,
                Ok(false) => stats.unchanged += 1,
                Err(e) => {
                    tracing::error!("❌ Could not update order {}: {}", order.id, e);
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            "✅ Reconciled {} shipment(s): {} updated, {} unchanged, {} unmapped, {} failed",
            stats.checked,
            stats.updated,
            stats.unchanged,
            stats.unmapped,
            stats.failed
        );
        Ok(stats)
    }
}
