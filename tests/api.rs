use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use denorm_db::routes::create_router;
use denorm_db::{Engine, MemoryIndex, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// Test client wrapper driving the router in process
struct TestClient {
    app: Router,
}

impl TestClient {
    fn new() -> Self {
        let engine = Engine::new(Arc::new(MemoryStore::new()), Arc::new(MemoryIndex::new()));
        Self {
            app: create_router::<MemoryStore>().with_state(Arc::new(engine)),
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-user-id", "api-tester");
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, json: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(json)).await
    }

    async fn put(&self, path: &str, json: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, Some(json)).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }
}

async fn with_judges_and_orders() -> TestClient {
    let client = TestClient::new();

    let (status, judges) = client
        .post(
            "/templates",
            json!({
                "id": "judges",
                "name": "Judge",
                "properties": [
                    {"id": "country", "name": "country", "type": "select", "content": "countries"},
                    {"id": "bio", "name": "bio", "type": "text"}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(judges["created_by"], "api-tester");

    let (status, _) = client
        .put(
            "/thesauri/countries",
            json!({"id": "countries", "name": "Countries", "values": [{"id": "co", "label": "Colombia"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = client
        .post(
            "/templates",
            json!({
                "id": "orders",
                "name": "Order",
                "properties": [{
                    "id": "judge", "name": "judge", "type": "relationship",
                    "content": "judges", "inherit": {"property": "country"}
                }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for body in [
        json!({
            "sharedId": "J1", "language": "en", "template": "judges", "title": "Judge One",
            "metadata": {"country": [{"value": "co"}], "bio": [{"value": "born in Bogotá"}]}
        }),
        json!({
            "sharedId": "O1", "language": "en", "template": "orders", "title": "Order One",
            "metadata": {"judge": [{"value": "J1"}]}
        }),
    ] {
        let (status, _) = client.post("/entities", body).await;
        assert_eq!(status, StatusCode::OK);
    }
    client
}

#[tokio::test]
async fn test_health_check() {
    let client = TestClient::new();
    let (status, body) = client.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_entity_round_trip_through_api() {
    let client = with_judges_and_orders().await;

    let (status, order) = client.get("/entities/O1?language=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        order["metadata"]["judge"],
        json!([{
            "value": "J1",
            "label": "Judge One",
            "inheritedValue": [{"value": "co", "label": "Colombia"}],
            "inheritedType": "select"
        }])
    );

    let (status, _) = client.get("/entities/O1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = client.get("/entities/O1?language=fr").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_thesaurus_update_reports_propagation() {
    let client = with_judges_and_orders().await;

    let (status, outcome) = client
        .put(
            "/thesauri/countries",
            json!({"id": "ignored", "name": "Countries", "values": [{"id": "co", "label": "Colombia (CO)"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["saved"]["id"], "countries");
    assert_eq!(
        outcome["propagation"]["updated"],
        json!([
            {"sharedId": "J1", "language": "en", "property": "country"},
            {"sharedId": "O1", "language": "en", "property": "judge"}
        ])
    );

    let (_, order) = client.get("/entities/O1?language=en").await;
    assert_eq!(
        order["metadata"]["judge"][0]["inheritedValue"][0]["label"],
        "Colombia (CO)"
    );
}

#[tokio::test]
async fn test_configuration_errors_are_unprocessable() {
    let client = with_judges_and_orders().await;

    let (status, body) = client
        .put(
            "/templates/orders",
            json!({
                "name": "Order",
                "properties": [{
                    "id": "judge", "name": "judge", "type": "relationship",
                    "content": "judges", "inherit": {"property": "missing"}
                }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = client
        .post(
            "/templates",
            json!({"name": "Bad", "properties": [{"id": "title", "name": "title", "type": "text"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forged_inherited_value_is_rejected_by_shape() {
    let client = with_judges_and_orders().await;

    let (status, outcome) = client
        .post(
            "/entities",
            json!({
                "sharedId": "O2", "language": "en", "template": "orders", "title": "Order Two",
                "metadata": {"judge": [{"value": "J1", "inheritedValue": [{"value": "ar"}]}]}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        outcome["saved"]["metadata"]["judge"][0]["inheritedValue"],
        json!([{"value": "co", "label": "Colombia"}])
    );
}

#[tokio::test]
async fn test_delete_and_repair_via_propagate() {
    let client = with_judges_and_orders().await;

    let (status, outcome) = client.delete("/entities/J1?language=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["saved"], json!(["en"]));
    assert_eq!(outcome["propagation"]["dangling"], 1);

    let (_, order) = client.get("/entities/O1?language=en").await;
    assert_eq!(order["metadata"]["judge"][0]["label"], "Judge One");
    assert_eq!(order["metadata"]["judge"][0]["inheritedValue"], json!([]));

    let (status, _) = client.delete("/entities/J1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = client.post("/entities/O1/propagate?language=en", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["updated"], json!([]));
}

#[tokio::test]
async fn test_search_and_mapping() {
    let client = with_judges_and_orders().await;

    let (status, mapping) = client.get("/mapping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mapping["judge"]["type"], "keyword");

    let (status, results) = client
        .post(
            "/search",
            json!({"template": "orders", "filters": {"judge": ["co"]}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["total"], 1);
    assert_eq!(results["items"][0]["sharedId"], "O1");
    assert_eq!(results["items"][0]["metadata"]["judge"][0]["value"], "J1");

    let (status, _) = client
        .post("/search", json!({"filters": {"judge": {"from": 1.0}}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, report) = client.post("/reindex", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["indexed"], 2);
}
