use crate::config::toml_config::ShopConfig;
use crate::core::carrier::{AwbCreation, AwbPayload, CarrierApiClient, Party};
use crate::domain::model::{Order, OrderId, ReturnAwbRecord};
use crate::domain::ports::OrderRepository;
use crate::utils::error::{Result, ShipError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Where a return parcel is handed over or delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    #[default]
    Address,
    Locker,
}

impl FromStr for ReturnMode {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "address" | "home" => Ok(ReturnMode::Address),
            "locker" | "pudo" => Ok(ReturnMode::Locker),
            other => Err(ShipError::InvalidConfigValueError {
                field: "return_mode".to_string(),
                value: other.to_string(),
                reason: "Expected 'address' or 'locker'".to_string(),
            }),
        }
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnMode::Address => f.write_str("address"),
            ReturnMode::Locker => f.write_str("locker"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub order_id: OrderId,
    pub pickup_mode: ReturnMode,
    pub delivery_mode: ReturnMode,
    pub pickup_pudo_id: Option<String>,
    pub delivery_pudo_id: Option<String>,
}

impl ReturnRequest {
    /// Customer address to store location.
    pub fn to_store(order_id: OrderId) -> Self {
        Self {
            order_id,
            ..Self::default()
        }
    }
}

/// Locker id to use, only when the mode asks for a locker and one was given.
fn locker_id(mode: ReturnMode, pudo_id: &Option<String>) -> Option<String> {
    match mode {
        ReturnMode::Locker => pudo_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        ReturnMode::Address => None,
    }
}

/// 退貨運單：寄件人是客戶，收件人是商店
pub struct ReturnAwbManager<R: OrderRepository> {
    client: Arc<CarrierApiClient>,
    orders: Arc<R>,
    shop: ShopConfig,
}

impl<R: OrderRepository> ReturnAwbManager<R> {
    pub fn new(client: Arc<CarrierApiClient>, orders: Arc<R>, shop: ShopConfig) -> Self {
        Self {
            client,
            orders,
            shop,
        }
    }

    /// Issues a return AWB. Orders may collect any number of them; the
    /// outbound AWB is left alone.
    pub async fn generate_return(&self, request: &ReturnRequest) -> Result<String> {
        let order = self
            .orders
            .find_order(request.order_id)
            .await?
            .ok_or(ShipError::OrderNotFound {
                order_id: request.order_id,
            })?;

        let payload = self.build_payload(&order, request);
        tracing::info!(
            "📦 Requesting return AWB for order {} ({} → {})",
            order.id,
            request.pickup_mode,
            request.delivery_mode
        );

        let barcode = match self.client.create_awb(&payload).await? {
            AwbCreation::Created(barcode) => barcode,
            AwbCreation::Rejected(reason) => {
                tracing::error!(
                    "❌ Carrier rejected return AWB for order {}: {}",
                    order.id,
                    reason
                );
                return Err(ShipError::ApiValidation { message: reason });
            }
        };

        self.orders
            .add_return_awb(ReturnAwbRecord {
                order_id: order.id,
                awb_number: barcode.clone(),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!("✅ Return AWB {} generated for order {}", barcode, order.id);
        Ok(barcode)
    }

    pub async fn return_awbs(&self, order_id: OrderId) -> Result<Vec<ReturnAwbRecord>> {
        self.orders.return_awbs(order_id).await
    }

    fn build_payload(&self, order: &Order, request: &ReturnRequest) -> AwbPayload {
        let pickup_pudo = locker_id(request.pickup_mode, &request.pickup_pudo_id);
        let delivery_pudo = locker_id(request.delivery_mode, &request.delivery_pudo_id);

        let customer_name = order.customer.full_name();
        let sender = Party {
            location_id: None,
            name: customer_name.clone(),
            contact_person: customer_name,
            phone: order.address.contact_phone().unwrap_or_default(),
            email: order.customer.email.clone(),
            county_name: order.address.county.clone().unwrap_or_default(),
            locality_name: order.address.city.clone(),
            address_text: match &pickup_pudo {
                Some(id) => format!("Return from pickup point: {}", id),
                None => order.address.street(),
            },
        };

        let mut recipient = Party {
            location_id: None,
            name: self.shop.name.clone(),
            contact_person: self.shop.name.clone(),
            phone: self.shop.phone.clone(),
            email: self.shop.email.clone(),
            county_name: self.shop.county.clone(),
            locality_name: self.shop.city.clone(),
            address_text: self.shop.address.clone(),
        };
        match &delivery_pudo {
            Some(id) => recipient.address_text = format!("Store pickup point delivery: {}", id),
            None => {
                recipient.location_id = self.client.config().sender_location_id.filter(|id| *id > 0)
            }
        }

        AwbPayload {
            sender,
            recipient,
            parcels: 1,
            envelopes: 0,
            // 實際重量於倉庫秤重
            total_weight: 1,
            declared_value: 0.0,
            cash_on_delivery: 0.0,
            observations: format!("Return for order #{}", order.reference),
            service_id: self.client.config().service_id,
            price_table_id: self.client.config().price_table_id,
            delivery_pudo_point: delivery_pudo,
            pickup_pudo_point: pickup_pudo,
        }
    }
}
