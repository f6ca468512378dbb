mod common;

use common::{bridge_config, mock_login, services, TOKEN};
use httpmock::prelude::*;
use serde_json::{json, Value};
use shipbridge::core::PudoRepository;
use shipbridge::domain::model::SyncStats;
use shipbridge::ShipError;
use std::collections::BTreeSet;

fn point(id: &str, name: &str, city: &str) -> Value {
    json!({
        "Id": id,
        "Name": name,
        "City": city,
        "County": "Cluj",
        "Address": "Str. Exemplu 1",
        "Latitude": 46.77,
        "Longitude": 23.6,
        "PointType": "LOCKER"
    })
}

async fn active_ids(services: &shipbridge::Services<shipbridge::MemoryStorage>) -> BTreeSet<String> {
    services
        .store
        .active_pudos()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.external_id)
        .collect()
}

#[tokio::test]
async fn test_active_set_follows_each_snapshot() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo").query_param("countryId", "1");
            then.status(200).json_body(json!([
                point("A", "Locker Centru", "Cluj-Napoca"),
                point("B", "Locker Gara", "Cluj-Napoca"),
                point("C", "Locker Mall", "Iași"),
            ]));
        })
        .await;

    let services = services(bridge_config(&server)).await;
    let stats = services.sync.sync().await.unwrap();
    assert_eq!(
        stats,
        SyncStats {
            processed: 3,
            deactivated: 0
        }
    );
    first.assert_hits_async(1).await;
    first.delete_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(200).json_body(json!([
                point("B", "Locker Gara Renovat", "Cluj-Napoca"),
                point("D", "Locker Nou", "Brașov"),
                { "Name": "fara id" },
            ]));
        })
        .await;

    let stats = services.sync.sync().await.unwrap();
    assert_eq!(
        stats,
        SyncStats {
            processed: 2,
            deactivated: 2
        }
    );

    let expected: BTreeSet<String> = ["B", "D"].iter().map(|s| s.to_string()).collect();
    assert_eq!(active_ids(&services).await, expected);

    let renamed = services.store.find_pudo("B").await.unwrap().unwrap();
    assert_eq!(renamed.name, "Locker Gara Renovat");
    let gone = services.store.find_pudo("A").await.unwrap().unwrap();
    assert!(!gone.is_active);
    assert!(services.directory.last_sync().await.unwrap().is_some());
}

#[tokio::test]
async fn test_empty_snapshot_keeps_cache() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    let seed = server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(200)
                .json_body(json!([point("A", "Locker Centru", "Cluj-Napoca")]));
        })
        .await;

    let services = services(bridge_config(&server)).await;
    services.sync.sync().await.unwrap();
    let synced_at = services.directory.last_sync().await.unwrap();
    seed.delete_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(200).json_body(json!([]));
        })
        .await;

    let err = services.sync.sync().await.unwrap_err();
    assert!(matches!(err, ShipError::EmptySnapshot { .. }));
    assert_eq!(active_ids(&services).await.len(), 1);
    assert_eq!(services.directory.last_sync().await.unwrap(), synced_at);
}

#[tokio::test]
async fn test_failed_fetch_writes_nothing() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(500).json_body(json!({ "Message": "Upstream down" }));
        })
        .await;

    let services = services(bridge_config(&server)).await;
    let err = services.sync.sync().await.unwrap_err();

    assert!(matches!(err, ShipError::Api { http_code: 500, .. }));
    assert!(active_ids(&services).await.is_empty());
    assert!(services.directory.last_sync().await.unwrap().is_none());
}

#[tokio::test]
async fn test_large_snapshot_is_written_in_batches() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    let points: Vec<Value> = (0..25)
        .map(|i| point(&format!("P{:02}", i), &format!("Locker {}", i), "Timișoara"))
        .collect();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(200).json_body(Value::Array(points));
        })
        .await;

    let mut config = bridge_config(&server);
    config.sync.batch_size = 10;
    let services = services(config).await;

    let stats = services.sync.sync().await.unwrap();
    assert_eq!(stats.processed, 25);
    assert_eq!(active_ids(&services).await.len(), 25);
}

#[tokio::test]
async fn test_directory_search_and_selection_after_sync() {
    let server = MockServer::start_async().await;
    mock_login(&server, TOKEN).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/Pudo");
            then.status(200).json_body(json!([
                point("A", "Locker Copou", "Iași"),
                point("B", "Locker Palas", "IASI"),
                point("C", "Locker Centru", "Cluj-Napoca"),
            ]));
        })
        .await;

    let services = services(bridge_config(&server)).await;
    services.sync.sync().await.unwrap();

    let hits = services.directory.search("  iasi ").await.unwrap();
    let names: Vec<&str> = hits.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Locker Copou", "Locker Palas"]);
    assert!(services.directory.search("i").await.unwrap().is_empty());

    let chosen = services.directory.select(77, "C").await.unwrap();
    assert_eq!(chosen.city, "Cluj-Napoca");
    assert_eq!(
        services.directory.selection(77).await.unwrap().map(|p| p.external_id),
        Some("C".to_string())
    );

    let err = services.directory.select(77, "missing").await.unwrap_err();
    assert!(matches!(err, ShipError::PudoNotFound { .. }));
}
