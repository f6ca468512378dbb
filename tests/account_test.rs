mod common;

use common::{bridge_config, mock_login, services, TOKEN};
use httpmock::prelude::*;
use serde_json::json;
use shipbridge::core::LabelFormat;
use shipbridge::domain::model::CatalogOption;
use shipbridge::ShipError;

#[tokio::test]
async fn test_account_lookups_map_to_options() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/PickupLocations");
            then.status(200).json_body(json!([
                { "LocationId": 201, "Name": "Depozit", "LocalityName": "Ploiesti" },
                { "LocationId": 202 },
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/PriceTables");
            then.status(200)
                .json_body(json!([{ "PriceTableId": 5, "Name": "Contract 2024" }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/Services");
            then.status(200).json_body(json!([]));
        })
        .await;

    let services = services(bridge_config(&server)).await;

    assert_eq!(
        services.account.pickup_locations().await.unwrap(),
        vec![CatalogOption {
            id: 201,
            name: "Depozit (Ploiesti)".to_string()
        }]
    );
    assert_eq!(
        services.account.price_tables().await.unwrap(),
        vec![CatalogOption {
            id: 5,
            name: "Contract 2024".to_string()
        }]
    );
    assert!(services.account.services().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_label_download() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    let documents = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/AwbDocuments")
                .query_param("type", "PDF")
                .query_param("format", "0")
                .query_param("barCodes", "900001")
                .header("accept", "application/pdf");
            then.status(200)
                .header("content-type", "application/pdf")
                .body("%PDF-1.4 label");
        })
        .await;

    let services = services(bridge_config(&server)).await;
    let pdf = services
        .account
        .awb_pdf(" 900001 ", LabelFormat::A4)
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF"));
    documents.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_label_errors() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/AwbDocuments");
            then.status(404);
        })
        .await;

    let services = services(bridge_config(&server)).await;

    let err = services
        .account
        .awb_pdf("  ", LabelFormat::A6)
        .await
        .unwrap_err();
    assert!(matches!(err, ShipError::ApiValidation { .. }));

    let err = services
        .account
        .awb_pdf("123", LabelFormat::A6)
        .await
        .unwrap_err();
    assert!(matches!(err, ShipError::NotFound { .. }));
}
