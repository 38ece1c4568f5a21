//! End-to-end service runs on the standalone election backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api_item, api_page, FakeIndex};
use yt_indexer::config::{Config, ElectionBackendKind};
use yt_indexer::election::StandaloneBackend;
use yt_indexer::error::Error;
use yt_indexer::ingest::IngestError;
use yt_indexer::keystore::InMemoryKeyStore;
use yt_indexer::service;

const SEARCH_PATH: &str = "/youtube/v3/search";
const ELECTION_KEY: &str = "test/leader";

fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.fetch.base_url = format!("{}{SEARCH_PATH}", server.uri());
    config.fetch.interval_secs = 1;
    config.fetch.request_timeout_secs = 5;
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.search.bulk_workers = Some(2);
    config.election.backend = ElectionBackendKind::Standalone;
    config.election.election_key = ELECTION_KEY.to_string();
    config.election.candidate_id = Some("replica-1".to_string());
    config.election.lease_check_interval_ms = 20;
    config
}

fn keys() -> Arc<InMemoryKeyStore> {
    Arc::new(InMemoryKeyStore::new(vec!["key-a".to_string()]).unwrap())
}

#[tokio::test]
async fn test_leader_ingests_until_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_page(vec![
            api_item("v1", "One"),
            api_item("v2", "Two"),
        ])))
        .mount(&server)
        .await;

    let index = Arc::new(FakeIndex::default());
    let backend = Arc::new(StandaloneBackend::new());

    let watched = index.clone();
    let stop = async move {
        while watched.bulk_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        service::run_with(config(&server), keys(), index.clone(), backend.clone(), stop),
    )
    .await
    .expect("service did not stop in time")
    .unwrap();

    let docs = index.indexed_documents();
    assert!(docs.len() >= 2);
    assert_eq!(docs[0]["videoId"], "v1");
    assert_eq!(backend.leader(ELECTION_KEY), None);
}

#[tokio::test]
async fn test_failed_cycle_stops_service_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let index = Arc::new(FakeIndex::default());
    let backend = Arc::new(StandaloneBackend::new());

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        service::run_with(
            config(&server),
            keys(),
            index.clone(),
            backend.clone(),
            std::future::pending(),
        ),
    )
    .await
    .expect("service did not stop in time");

    assert!(matches!(
        result,
        Err(Error::Ingest(IngestError::Transport { status: 500 }))
    ));
    assert_eq!(index.bulk_calls(), 0);
    assert_eq!(backend.leader(ELECTION_KEY), None);
}
