mod common;

use common::{bridge_config, mock_login, services, TOKEN};
use httpmock::prelude::*;
use serde_json::json;
use shipbridge::config::BridgeConfig;
use shipbridge::domain::model::ShipmentRequest;
use std::time::Duration;

const LOCAL_20_KG: f64 = 39.5;

fn remote_config(server: &MockServer) -> BridgeConfig {
    let mut config = bridge_config(server);
    config.carrier.price_table_id = Some(5);
    config
}

#[tokio::test]
async fn test_remote_grand_total_wins() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    let calc = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/ShippingCalculation")
                .body_contains("\"TotalWeight\":20")
                .body_contains("\"PriceTableId\":5")
                .body_contains("\"PudoDelivery\":true");
            then.status(200)
                .json_body(json!({ "BaseCost": 20.0, "GrandTotal": 27.354 }));
        })
        .await;

    let services = services(remote_config(&server)).await;
    let price = services
        .rates
        .quote(&ShipmentRequest::new(19.2, true, false))
        .await;

    assert_eq!(price, 27.35);
    calc.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_remote_total_gets_oversize_surcharge_up_to_31_kg() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ShippingCalculation");
            then.status(200).json_body(json!({ "GrandTotal": 20.0 }));
        })
        .await;

    let services = services(remote_config(&server)).await;
    let rates = &services.rates;

    assert_eq!(rates.quote(&ShipmentRequest::new(20.0, false, false)).await, 20.0);
    assert_eq!(rates.quote(&ShipmentRequest::new(20.0, false, true)).await, 120.0);
    assert_eq!(rates.quote(&ShipmentRequest::new(31.0, true, true)).await, 120.0);
    // 40 kg 屬 Bulk，已含大件處理
    assert_eq!(rates.quote(&ShipmentRequest::new(40.0, false, true)).await, 20.0);
}

#[tokio::test]
async fn test_carrier_error_falls_back_to_local_table() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ShippingCalculation");
            then.status(500).json_body(json!({ "Message": "Calculation failed" }));
        })
        .await;

    let services = services(remote_config(&server)).await;
    let price = services
        .rates
        .quote(&ShipmentRequest::new(20.0, false, false))
        .await;
    assert_eq!(price, LOCAL_20_KG);
}

#[tokio::test]
async fn test_zero_total_falls_back_to_local_table() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ShippingCalculation");
            then.status(200).json_body(json!({ "GrandTotal": 0 }));
        })
        .await;

    let services = services(remote_config(&server)).await;
    let price = services
        .rates
        .quote(&ShipmentRequest::new(20.0, false, false))
        .await;
    assert_eq!(price, LOCAL_20_KG);
}

#[tokio::test]
async fn test_slow_quote_is_abandoned() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ShippingCalculation");
            then.status(200)
                .json_body(json!({ "GrandTotal": 10.0 }))
                .delay(Duration::from_millis(1500));
        })
        .await;

    let mut config = remote_config(&server);
    config.pricing.quote_timeout_ms = 200;
    let services = services(config).await;

    let started = std::time::Instant::now();
    let price = services
        .rates
        .quote(&ShipmentRequest::new(20.0, false, false))
        .await;

    assert_eq!(price, LOCAL_20_KG);
    assert!(started.elapsed() < Duration::from_millis(1200));
}

#[tokio::test]
async fn test_without_price_table_no_remote_call_is_made() {
    let server = MockServer::start_async().await;
    let login = mock_login(&server, TOKEN).await;
    let calc = server
        .mock_async(|when, then| {
            when.method(POST).path("/ShippingCalculation");
            then.status(200).json_body(json!({ "GrandTotal": 10.0 }));
        })
        .await;

    let services = services(bridge_config(&server)).await;
    assert!(!services.config.remote_pricing_enabled());

    let price = services
        .rates
        .quote(&ShipmentRequest::new(20.0, false, true))
        .await;
    assert_eq!(price, LOCAL_20_KG + 100.0);
    calc.assert_hits_async(0).await;
    login.assert_hits_async(0).await;
}
