use std::net::SocketAddr;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use importer::{FeedApi, FeedError, HttpFeedClient, open_feed};
use ledger_types::feed::{FeedCreate, FeedGet, FeedUpdate, TransactionQuery};
use serde_json::{Value, json};

fn error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"code": code, "message": message})))
}

async fn create(Json(body): Json<FeedCreate>) -> (StatusCode, Json<Value>) {
    if body.alias == "taken" {
        return error(StatusCode::BAD_REQUEST, "CH050", "alias already exists");
    }
    (
        StatusCode::OK,
        Json(json!({"id": "f-new", "alias": body.alias, "filter": body.filter, "after": ""})),
    )
}

async fn get(headers: HeaderMap, Json(body): Json<FeedGet>) -> (StatusCode, Json<Value>) {
    if !headers.contains_key(AUTHORIZATION) {
        return error(StatusCode::UNAUTHORIZED, "CH009", "missing credentials");
    }
    if body.alias == "missing" {
        return error(StatusCode::NOT_FOUND, "CH002", "no such feed");
    }
    (
        StatusCode::OK,
        Json(json!({"id": "f-1", "alias": body.alias, "filter": "", "after": "12:3"})),
    )
}

async fn list(Json(body): Json<TransactionQuery>) -> (StatusCode, Json<Value>) {
    if body.after == "idle" {
        return error(StatusCode::REQUEST_TIMEOUT, "CH001", "request timed out");
    }
    (
        StatusCode::OK,
        Json(json!({
            "items": [{
                "id": "tx1",
                "block_height": 3,
                "timestamp": "2024-03-01T10:00:00Z",
                "position": 0,
                "is_local": "yes",
                "reference_data": {"tx_id": "XYZ"}
            }],
            "next": {"after": "3:0"},
            "last_page": false
        })),
    )
}

async fn update(Json(body): Json<FeedUpdate>) -> (StatusCode, Json<Value>) {
    if body.previous_after != "12:3" {
        return error(StatusCode::BAD_REQUEST, "CH051", "previous_after does not match");
    }
    (
        StatusCode::OK,
        Json(json!({"id": body.id, "alias": "warehouse", "filter": "", "after": body.after})),
    )
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/create-transaction-feed", post(create))
        .route("/get-transaction-feed", post(get))
        .route("/list-transactions", post(list))
        .route("/update-transaction-feed", post(update));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn client() -> HttpFeedClient {
    let addr = serve().await;
    HttpFeedClient::new(&format!("http://{addr}"), Some("client:secret")).unwrap()
}

fn query(after: &str) -> TransactionQuery {
    TransactionQuery {
        filter: String::new(),
        after: after.to_string(),
        timeout: 1000,
        ascending_with_long_poll: true,
    }
}

#[tokio::test]
async fn open_feed_creates_or_resumes() {
    let client = client().await;

    let created = open_feed(&client, "warehouse", "asset_alias='gold'")
        .await
        .unwrap();
    assert_eq!(created.id, "f-new");
    assert_eq!(created.filter, "asset_alias='gold'");

    let resumed = open_feed(&client, "taken", "").await.unwrap();
    assert_eq!(resumed.id, "f-1");
    assert_eq!(resumed.after, "12:3");
}

#[tokio::test]
async fn list_transactions_decodes_page() {
    let client = client().await;
    let page = client.list_transactions(&query("")).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.items[0].is_local);
    assert_eq!(page.items[0].reference_data["tx_id"], "XYZ");
    assert_eq!(page.next.after, "3:0");
}

#[tokio::test]
async fn error_codes_map_to_feed_errors() {
    let client = client().await;

    assert!(matches!(
        client.list_transactions(&query("idle")).await,
        Err(FeedError::Timeout)
    ));
    assert!(matches!(
        client.get_feed("missing").await,
        Err(FeedError::NotFound(_))
    ));
    let rejected = client
        .update_feed(&FeedUpdate {
            id: "f-1".to_string(),
            previous_after: "0:0".to_string(),
            after: "13:0".to_string(),
        })
        .await;
    assert!(matches!(rejected, Err(FeedError::Rejected(_))));

    let advanced = client
        .update_feed(&FeedUpdate {
            id: "f-1".to_string(),
            previous_after: "12:3".to_string(),
            after: "13:0".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(advanced.after, "13:0");
}

#[tokio::test]
async fn missing_credentials_surface_as_server_error() {
    let addr = serve().await;
    let anonymous = HttpFeedClient::new(&format!("http://{addr}"), None).unwrap();
    match anonymous.get_feed("warehouse").await {
        Err(FeedError::Server { status, code, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(code, "CH009");
        }
        other => panic!("unexpected {other:?}"),
    }
}
