//! Mirror synchronisation
//!
//! Spiders running on mirrors expose `GET /synchronise`, which answers with the
//! number of catalog records scanned in the last two days. The synchronise
//! housekeeping task polls the configured mirrors with [`poll_mirrors`].

use crate::state::{StoreKind, DAY};
use crate::storage::{Cmp, Filter, SqliteStorage, Storage, StorageResult};
use crate::SpiderError;
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use reqwest::Client;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

/// How far back the synchronise count looks
pub const SYNC_WINDOW: i64 = 2 * DAY;

/// Catalog records scanned within [`SYNC_WINDOW`] of `now`
pub fn synchronise_count<S: Storage + ?Sized>(storage: &S, now: i64) -> StorageResult<u64> {
    storage.count(
        StoreKind::Catalog,
        &Filter::all().last_scanned(Cmp::Ge(now - SYNC_WINDOW)),
    )
}

/// Shared state of the synchronisation server
#[derive(Clone)]
pub struct SyncState {
    pub storage: Arc<Mutex<SqliteStorage>>,
    /// Peer addresses allowed to query
    pub allow: Vec<String>,
}

impl SyncState {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, allow: Vec<String>) -> Self {
        Self { storage, allow }
    }

    fn is_allowed(&self, peer: IpAddr) -> bool {
        self.allow
            .iter()
            .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
            .any(|allowed| allowed == peer)
    }
}

pub fn router(state: Arc<SyncState>) -> Router {
    Router::new()
        .route("/synchronise", get(synchronise))
        .with_state(state)
}

async fn synchronise(
    State(state): State<Arc<SyncState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    if !state.is_allowed(addr.ip()) {
        tracing::warn!("Refused synchronise request from {}", addr);
        return (StatusCode::UNAUTHORIZED, "Unauthorised".to_string());
    }

    let Ok(storage) = state.storage.lock() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable".to_string());
    };
    match synchronise_count(&*storage, crate::state::now()) {
        Ok(count) => {
            tracing::debug!("Synchronise from {}: {}", addr, count);
            (StatusCode::OK, count.to_string())
        }
        Err(e) => {
            tracing::error!("Synchronise count failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
        }
    }
}

/// Serves the synchronisation endpoint on `listen` until the task is dropped
pub async fn serve(listen: &str, state: Arc<SyncState>) -> Result<(), SpiderError> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("Synchronisation endpoint listening on {}", listener.local_addr()?);
    serve_on(listener, state).await
}

/// Serves on an already bound listener
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    state: Arc<SyncState>,
) -> Result<(), SpiderError> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// A mirror's answer to `/synchronise`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCount {
    pub mirror: String,
    /// None when the mirror was unreachable or refused
    pub count: Option<u64>,
}

/// Asks every mirror for its recent catalog count
pub async fn poll_mirrors(client: &Client, mirrors: &[String]) -> Vec<MirrorCount> {
    let mut counts = Vec::with_capacity(mirrors.len());
    for mirror in mirrors {
        let count = query_mirror(client, mirror).await;
        match count {
            Some(n) => tracing::info!("Mirror {} reports {} recent records", mirror, n),
            None => tracing::warn!("Mirror {} did not answer", mirror),
        }
        counts.push(MirrorCount {
            mirror: mirror.clone(),
            count,
        });
    }
    counts
}

async fn query_mirror(client: &Client, mirror: &str) -> Option<u64> {
    let url = format!("{}/synchronise", mirror.trim_end_matches('/'));
    let response = client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, PageRecord};
    use crate::state::UrlRecord;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_300_000_000;

    fn catalogued(storage: &mut SqliteStorage, url: &str, last_scanned: i64) {
        let entry = CatalogEntry::Page(PageRecord::default());
        let record = UrlRecord::for_catalog(url, entry, last_scanned, last_scanned + DAY);
        storage.insert(StoreKind::Catalog, &record).unwrap();
    }

    #[test]
    fn test_count_covers_two_days() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        catalogued(&mut storage, "http://a.org/1", NOW);
        catalogued(&mut storage, "http://a.org/2", NOW - SYNC_WINDOW);
        catalogued(&mut storage, "http://a.org/3", NOW - SYNC_WINDOW - 1);

        assert_eq!(synchronise_count(&storage, NOW).unwrap(), 2);
    }

    #[test]
    fn test_allow_list() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let state = SyncState::new(storage, vec!["127.0.0.1".to_string(), "bogus".to_string()]);

        assert!(state.is_allowed("127.0.0.1".parse().unwrap()));
        assert!(!state.is_allowed("10.0.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_endpoint_answers_allowed_peer() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        catalogued(&mut storage, "http://a.org/1", crate::state::now());
        let state = Arc::new(SyncState::new(
            Arc::new(Mutex::new(storage)),
            vec!["127.0.0.1".to_string()],
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_on(listener, state));

        let body = reqwest::get(format!("http://{}/synchronise", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "1");
    }

    #[tokio::test]
    async fn test_endpoint_refuses_unknown_peer() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let state = Arc::new(SyncState::new(storage, vec!["10.1.2.3".to_string()]));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_on(listener, state));

        let response = reqwest::get(format!("http://{}/synchronise", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(response.text().await.unwrap(), "Unauthorised");
    }

    #[tokio::test]
    async fn test_poll_mirrors() {
        let up = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/synchronise"))
            .respond_with(ResponseTemplate::new(200).set_body_string("42\n"))
            .mount(&up)
            .await;
        let refusing = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/synchronise"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorised"))
            .mount(&refusing)
            .await;

        let mirrors = vec![format!("{}/", up.uri()), refusing.uri()];
        let counts = poll_mirrors(&Client::new(), &mirrors).await;

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].count, Some(42));
        assert_eq!(counts[1].count, None);
    }
}
