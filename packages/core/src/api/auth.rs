//! Operator authentication middleware.
//!
//! Opening an item is an operator action; the session/identity provider is
//! external to this service, so the boundary check is a shared API key in
//! the `X-Api-Key` header. Read-only queue routes stay open.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Key the operator must present. Cheap to clone into the middleware state.
#[derive(Clone)]
pub struct OperatorKey(pub String);

pub async fn require_operator(
    State(key): State<OperatorKey>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if provided == Some(key.0.as_str()) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error": "unauthorized" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request as HttpRequest},
        middleware,
        routing::patch,
        Router,
    };
    use tower::ServiceExt;

    fn make_app() -> Router {
        Router::new()
            .route("/protected", patch(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(
                OperatorKey("secret".to_string()),
                require_operator,
            ))
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let app = make_app();
        let req = HttpRequest::builder()
            .method(Method::PATCH)
            .uri("/protected")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let app = make_app();
        let req = HttpRequest::builder()
            .method(Method::PATCH)
            .uri("/protected")
            .header("x-api-key", "nope")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_passes_through() {
        let app = make_app();
        let req = HttpRequest::builder()
            .method(Method::PATCH)
            .uri("/protected")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
