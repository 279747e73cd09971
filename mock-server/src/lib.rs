use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub lookups: usize,
}

#[derive(Clone, Default)]
pub struct AppState {
    items: Arc<RwLock<HashMap<Uuid, Item>>>,
    counter: Arc<AtomicI64>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
}

pub fn app() -> Router {
    Router::new()
        .route("/text", get(text))
        .route("/counter", get(read_counter).post(bump_counter))
        .route("/items", get(list_items).post(create_item))
        .route("/items/lookup", get(lookup_items))
        .route("/bytes/{len}", get(bytes))
        .route("/slow/{millis}", get(slow))
        .route("/status/{code}", get(status))
        .route("/stats", get(stats))
        .with_state(AppState::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn text() -> impl IntoResponse {
    ([("x-mock-server", "1")], "hello from mock-server")
}

async fn read_counter(State(state): State<AppState>) -> String {
    state.counter.load(Ordering::SeqCst).to_string()
}

async fn bump_counter(State(state): State<AppState>) -> String {
    (state.counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
}

async fn list_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    let items = state.items.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
    };
    state.items.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

/// Returns the items named by every `id` query value. Accepts both repeated
/// keys (`?id=a&id=b`) and comma-joined values (`?id=a,b`).
async fn lookup_items(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Item>>, StatusCode> {
    state.lookups.fetch_add(1, Ordering::SeqCst);
    let mut ids = Vec::new();
    for pair in query.unwrap_or_default().split('&') {
        let Some(("id", value)) = pair.split_once('=') else {
            continue;
        };
        for raw in value.split(',').flat_map(|v| v.split("%2C")) {
            ids.push(Uuid::parse_str(raw).map_err(|_| StatusCode::BAD_REQUEST)?);
        }
    }
    let items = state.items.read().await;
    Ok(Json(ids.iter().filter_map(|id| items.get(id).cloned()).collect()))
}

async fn bytes(Path(len): Path<usize>) -> impl IntoResponse {
    let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], body)
}

async fn slow(State(state): State<AppState>, Path(millis): Path<u64>) -> &'static str {
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    "done"
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(Stats {
        in_flight: state.in_flight.load(Ordering::SeqCst),
        max_in_flight: state.max_in_flight.load(Ordering::SeqCst),
        lookups: state.lookups.load(Ordering::SeqCst),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_to_json() {
        let item = Item {
            id: Uuid::nil(),
            name: "Test".to_string(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Test");
    }

    #[test]
    fn create_item_rejects_missing_name() {
        let result: Result<CreateItem, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
    }

    #[test]
    fn stats_default_to_zero() {
        let stats = Stats::default();
        assert_eq!(stats.max_in_flight, 0);
        assert_eq!(stats.lookups, 0);
    }
}
