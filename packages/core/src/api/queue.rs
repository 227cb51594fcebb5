//! HTTP handlers for the opening queue.
//!
//! Routes:
//! - `POST  /queue`          — enqueue a new intake request
//! - `GET   /queue`          — list all items with live positions
//! - `PATCH /queue/:id/open` — open a pending item (operator only, gated by
//!   the `X-Api-Key` middleware in [`super::auth`])

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::{self, OperatorKey};
use super::headers::{cache_control, compute_etag, if_none_match_matches, last_modified};
use crate::metrics::AppMetrics;
use crate::queue::types::{EnqueueInput, QueueStatus};
use crate::queue::{QueueEngine, QueueError};

/// Shared state for the queue routes.
pub type QueueState = Arc<QueueApiState>;

pub struct QueueApiState {
    pub engine: Arc<QueueEngine>,
    pub metrics: Option<Arc<AppMetrics>>,
}

const QUEUE_LIST_MAX_AGE: u32 = 5;
const QUEUE_LIST_SWR: u32 = 10;

// ---- Request shapes ----

/// Required fields are `Option` so a missing field surfaces as a field-level
/// 400 from the engine's validation rather than a deserialization reject.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub contact_phone: Option<String>,
    pub equipment_type: Option<String>,
    pub equipment_description: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl EnqueueRequest {
    fn into_input(self) -> EnqueueInput {
        EnqueueInput {
            client_id: self.client_id,
            client_name: self.client_name.unwrap_or_default(),
            contact_phone: self.contact_phone.unwrap_or_default(),
            equipment_type: self.equipment_type.unwrap_or_default(),
            equipment_description: self.equipment_description,
            arrival_date: self.arrival_date,
            notes: self.notes,
        }
    }
}

// ---- Error mapping ----

fn error_response(err: QueueError) -> (StatusCode, Json<Value>) {
    match err {
        QueueError::Validation(errors) => {
            let mut fields = serde_json::Map::new();
            for error in errors {
                fields.insert(error.field.to_string(), Value::String(error.message));
            }
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "errors": fields })),
            )
        }
        QueueError::NotFound => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "not_found" })),
        ),
        QueueError::AlreadyOpened => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "already_opened" })),
        ),
        QueueError::Storage(err) => {
            tracing::error!("Queue storage error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": "internal" })),
            )
        }
    }
}

// ---- Handlers ----

/// `POST /queue` — admit a new intake request.
pub async fn enqueue(
    State(state): State<QueueState>,
    Json(body): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let item = state
        .engine
        .enqueue(body.into_input())
        .await
        .map_err(error_response)?;

    if let Some(metrics) = &state.metrics {
        metrics.enqueued_total.inc();
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "item": item })),
    ))
}

/// `GET /queue` — all items, pending first by arrival order, with positions
/// derived on read.
pub async fn list_queue(
    State(state): State<QueueState>,
    request_headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let items = state.engine.list().await.map_err(error_response)?;

    if let Some(metrics) = &state.metrics {
        let pending = items
            .iter()
            .filter(|item| item.status == QueueStatus::Pending)
            .count();
        metrics.pending_items.set(pending as f64);
    }

    let last_modified_value = last_modified(
        items
            .iter()
            .map(|item| item.updated_at)
            .max()
            .unwrap_or_else(Utc::now),
    );

    let payload = json!({ "ok": true, "items": items });
    let body = serde_json::to_vec(&payload).map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": format!("Failed to serialize queue: {}", err) })),
        )
    })?;
    let etag = compute_etag(&body);

    if if_none_match_matches(&request_headers, &etag) {
        let response = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(
                header::CACHE_CONTROL,
                cache_control(QUEUE_LIST_MAX_AGE, QUEUE_LIST_SWR),
            )
            .header(header::ETAG, etag)
            .header(header::LAST_MODIFIED, last_modified_value)
            .body(Body::empty())
            .expect("304 response should be valid");
        return Ok(response);
    }

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::CACHE_CONTROL,
            cache_control(QUEUE_LIST_MAX_AGE, QUEUE_LIST_SWR),
        )
        .header(header::ETAG, etag)
        .header(header::LAST_MODIFIED, last_modified_value)
        .body(Body::from(body))
        .expect("queue list response should be valid");

    Ok(response)
}

/// `PATCH /queue/:id/open` — open a pending item.
pub async fn open_item(
    State(state): State<QueueState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let item = state.engine.open(id).await.map_err(error_response)?;

    if let Some(metrics) = &state.metrics {
        metrics.opened_total.inc();
    }

    Ok(Json(json!({ "ok": true, "item": item })))
}

/// Assemble the queue routes; the open route sits behind the operator key.
pub fn create_queue_router(state: QueueState, operator_key: OperatorKey) -> Router {
    let open_routes = Router::new()
        .route("/queue/:id/open", patch(open_item))
        .route_layer(middleware::from_fn_with_state(
            operator_key,
            auth::require_operator,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/queue", post(enqueue).get(list_queue))
        .with_state(state)
        .merge(open_routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::db::create_pool;
    use crate::notify::NotificationGateway;
    use crate::repository::QueueRepository;

    #[derive(Clone, Default)]
    struct SilentGateway;

    #[async_trait]
    impl NotificationGateway for SilentGateway {
        async fn notify_waiting(
            &self,
            _phone: &str,
            _client_name: &str,
            _equipment_type: &str,
            _ahead_count: i64,
        ) -> bool {
            true
        }

        async fn notify_opened(
            &self,
            _phone: &str,
            _client_name: &str,
            _equipment_description: &str,
        ) -> bool {
            true
        }
    }

    async fn make_app() -> Router {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repository = Arc::new(QueueRepository::new(pool));
        let engine = Arc::new(QueueEngine::new(
            repository,
            Arc::new(SilentGateway::default()),
        ));
        let state = Arc::new(QueueApiState {
            engine,
            metrics: None,
        });
        create_queue_router(state, OperatorKey("op-key".to_string()))
    }

    async fn body_json(body: Body) -> Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn enqueue_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/queue")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn post_creates_item_with_position() {
        let app = make_app().await;
        let resp = app
            .oneshot(enqueue_request(
                r#"{"client_name":"Ada","contact_phone":"+34600123456","equipment_type":"laptop"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["item"]["position_index"], 0);
        assert_eq!(json["item"]["status"], "PENDING");
    }

    #[tokio::test]
    async fn post_missing_fields_returns_field_errors() {
        let app = make_app().await;
        let resp = app
            .oneshot(enqueue_request(r#"{"equipment_type":"laptop"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["errors"]["client_name"], "is required");
        assert_eq!(json["errors"]["contact_phone"], "is required");
    }

    #[tokio::test]
    async fn get_lists_items_in_queue_order() {
        let app = make_app().await;
        app.clone()
            .oneshot(enqueue_request(
                r#"{"client_name":"Ada","contact_phone":"+1","equipment_type":"laptop","arrival_date":"2024-03-01T10:00:00Z"}"#,
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(enqueue_request(
                r#"{"client_name":"Grace","contact_phone":"+2","equipment_type":"printer","arrival_date":"2024-03-01T09:00:00Z"}"#,
            ))
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        let items = json["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        // Grace arrived first, so she holds position 0 despite enqueueing second.
        assert_eq!(items[0]["client_name"], "Grace");
        assert_eq!(items[0]["position_index"], 0);
        assert_eq!(items[1]["client_name"], "Ada");
        assert_eq!(items[1]["position_index"], 1);
    }

    #[tokio::test]
    async fn get_returns_304_when_etag_matches() {
        let app = make_app().await;
        app.clone()
            .oneshot(enqueue_request(
                r#"{"client_name":"Ada","contact_phone":"+1","equipment_type":"laptop"}"#,
            ))
            .await
            .unwrap();

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let etag = first
            .headers()
            .get("etag")
            .expect("missing etag header")
            .to_str()
            .unwrap()
            .to_string();

        let second = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/queue")
                    .header("if-none-match", etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn patch_without_key_is_unauthorized() {
        let app = make_app().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/queue/1/open")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn patch_opens_pending_item() {
        let app = make_app().await;
        let created = app
            .clone()
            .oneshot(enqueue_request(
                r#"{"client_name":"Ada","contact_phone":"+1","equipment_type":"laptop"}"#,
            ))
            .await
            .unwrap();
        let created_json = body_json(created.into_body()).await;
        let id = created_json["item"]["id"].as_i64().unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri(format!("/queue/{}/open", id))
                    .header("x-api-key", "op-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["item"]["status"], "OPENED");
    }

    #[tokio::test]
    async fn patch_unknown_id_returns_error_code() {
        let app = make_app().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/queue/9999/open")
                    .header("x-api-key", "op-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn patch_already_opened_returns_error_code() {
        let app = make_app().await;
        let created = app
            .clone()
            .oneshot(enqueue_request(
                r#"{"client_name":"Ada","contact_phone":"+1","equipment_type":"laptop"}"#,
            ))
            .await
            .unwrap();
        let created_json = body_json(created.into_body()).await;
        let id = created_json["item"]["id"].as_i64().unwrap();

        let open = |app: Router| {
            let uri = format!("/queue/{}/open", id);
            async move {
                app.oneshot(
                    Request::builder()
                        .method(Method::PATCH)
                        .uri(uri)
                        .header("x-api-key", "op-key")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
            }
        };

        let first = open(app.clone()).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = open(app).await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let json = body_json(second.into_body()).await;
        assert_eq!(json["error"], "already_opened");
    }
}
