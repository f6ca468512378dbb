#![allow(dead_code)]

use httpmock::prelude::*;
use httpmock::Mock;
use shipbridge::adapters::MemoryStorage;
use shipbridge::config::{BridgeConfig, CarrierConfig};
use shipbridge::domain::model::{
    AwbRecord, Customer, DeliveryAddress, LineItem, Order, OrderFulfillmentState, OrderId,
};
use shipbridge::Services;

pub const TOKEN: &str = "token-1";
pub const CRON_TOKEN: &str = "cron-secret";

pub fn carrier_config(base_url: String) -> CarrierConfig {
    CarrierConfig {
        api_url: base_url,
        subscription_key: "sub-key".to_string(),
        username: "shop".to_string(),
        password: "secret".to_string(),
        sender_location_id: Some(201),
        ..CarrierConfig::default()
    }
}

pub fn bridge_config(server: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig {
        carrier: carrier_config(server.base_url()),
        ..BridgeConfig::default()
    };
    config.jobs.cron_token = CRON_TOKEN.to_string();
    config.shop.name = "Magazin Demo".to_string();
    config.shop.phone = "0310000000".to_string();
    config.shop.email = "shop@example.com".to_string();
    config.shop.address = "Str. Depozitului 5".to_string();
    config
}

pub async fn services(config: BridgeConfig) -> Services<MemoryStorage> {
    Services::with_storage(config, MemoryStorage::new())
        .await
        .expect("services should wire")
}

pub async fn mock_login<'a>(server: &'a MockServer, token: &str) -> Mock<'a> {
    let body = format!("\"{}\"", token);
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/LoginUser")
                .header("ocp-apim-subscription-key", "sub-key")
                .json_body(serde_json::json!({ "UserName": "shop", "Password": "secret" }));
            then.status(200).body(body);
        })
        .await
}

pub fn line(weight: f64, quantity: u32) -> LineItem {
    LineItem {
        product_id: 1,
        name: "Produs".to_string(),
        category_id: None,
        unit_weight_kg: weight,
        quantity,
        additional_shipping_cost: 0.0,
    }
}

pub fn order(id: OrderId, payment_module: &str) -> Order {
    Order {
        id,
        reference: format!("REF{}", id),
        cart_id: id * 10,
        customer: Customer {
            first_name: "Ion".to_string(),
            last_name: "Popescu".to_string(),
            email: "ion@example.com".to_string(),
        },
        address: DeliveryAddress {
            address1: "Bd. Unirii 1".to_string(),
            address2: String::new(),
            city: "Bucuresti".to_string(),
            county: Some("Bucuresti".to_string()),
            phone: Some("0211234567".to_string()),
            phone_mobile: None,
        },
        lines: vec![line(1.2, 2)],
        payment_module: payment_module.to_string(),
        total_paid: 150.5,
        state: OrderFulfillmentState::Placed,
        awb: None,
    }
}

pub fn shipped_order(id: OrderId, awb: &str, state: OrderFulfillmentState) -> Order {
    Order {
        state,
        awb: Some(AwbRecord {
            order_id: id,
            awb_number: awb.to_string(),
            created_at: chrono::Utc::now(),
        }),
        ..order(id, "bankwire")
    }
}
