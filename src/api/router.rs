use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::proxy;
use super::state::AppState;

/// Health endpoints plus the two catch-all proxy surfaces
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .route("/semantic", any(proxy::proxy_semantic))
        .route("/semantic/{*path}", any(proxy::proxy_semantic))
        .route("/", any(proxy::proxy_exact))
        .route("/{*path}", any(proxy::proxy_exact))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use tower::ServiceExt;

    use crate::api::state::ComponentInfo;
    use crate::domain::cache::{DefaultKeyGenerator, MockResponseStore};
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::proxy::MockOriginClient;
    use crate::domain::semantic_cache::SemanticCacheConfig;
    use crate::infrastructure::services::{ProxyConfig, ProxyService, SemanticCacheService};
    use crate::infrastructure::vector_index::InMemoryVectorIndex;

    struct TestApp {
        router: Router,
        origin: Arc<MockOriginClient>,
        store: Arc<MockResponseStore>,
        embeddings: Arc<MockEmbeddingProvider>,
    }

    fn app(origin: MockOriginClient) -> TestApp {
        let origin = Arc::new(origin);
        let store = Arc::new(MockResponseStore::new());
        let embeddings = Arc::new(
            MockEmbeddingProvider::new(3)
                .with_vector("capital of France?", vec![1.0, 0.0, 0.0])
                .with_vector("France capital?", vec![0.99, 0.05, 0.0])
                .with_vector("capital of France", vec![0.0, 1.0, 0.0])
                .with_vector("France capital", vec![0.05, 0.99, 0.0]),
        );
        let semantic = Arc::new(SemanticCacheService::new(
            Arc::new(InMemoryVectorIndex::default()),
            embeddings.clone(),
            store.clone(),
            SemanticCacheConfig::default().with_randomize_selection(false),
        ));
        let service = ProxyService::new(
            store.clone(),
            Arc::new(DefaultKeyGenerator::new().with_ignored_params(["no-cache", "token"])),
            semantic,
            origin.clone(),
            ProxyConfig::default(),
        );
        let state = AppState::new(
            Arc::new(service),
            ComponentInfo {
                store: "mock",
                vector_index: "in_memory",
                embedding: "mock",
                semantic_enabled: true,
            },
        )
        .with_max_body_bytes(1024);

        TestApp {
            router: create_router_with_state(state),
            origin,
            store,
            embeddings,
        }
    }

    async fn wait_for_puts(store: &MockResponseStore, count: usize) {
        for _ in 0..100 {
            if store.put_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} store writes", count);
    }

    fn chat(uri: &str, text: &str) -> Request<Body> {
        let body = serde_json::json!({"messages": [{"role": "user", "content": text}]});
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn x_cache(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get("x-cache")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_health_reports_components() {
        let app = app(MockOriginClient::json("{}"));

        let response = app
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["vector_index"], "in_memory");
        assert_eq!(app.origin.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exact_route_hits_after_population() {
        let app = app(MockOriginClient::json(r#"{"value":42}"#));
        let request = || Request::builder().uri("/answer?b=2&a=1").body(Body::empty()).unwrap();

        let first = app.router.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(x_cache(&first), "MISS");
        assert!(first.headers().contains_key("x-request-id"));
        wait_for_puts(&app.store, 1).await;

        let second = app.router.clone().oneshot(request()).await.unwrap();
        assert_eq!(x_cache(&second), "HIT");
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from(r#"{"value":42}"#));
        assert_eq!(app.origin.forwarded_uris(), vec!["/answer?b=2&a=1".to_string()]);
    }

    #[tokio::test]
    async fn test_semantic_route_strips_prefix_and_hits() {
        let app = app(MockOriginClient::json(r#"{"content":"Paris"}"#));

        let first = app
            .router
            .clone()
            .oneshot(chat("/semantic/v1/chat?x=1", "capital of France?"))
            .await
            .unwrap();
        assert_eq!(x_cache(&first), "MISS");
        assert_eq!(app.origin.forwarded_uris(), vec!["/v1/chat?x=1".to_string()]);
        wait_for_puts(&app.store, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = app
            .router
            .clone()
            .oneshot(chat("/semantic/v1/chat?x=1", "France capital?"))
            .await
            .unwrap();

        assert_eq!(x_cache(&second), "SEMANTIC-HIT");
        assert!(second.headers().contains_key("x-semantic-similarity"));
        assert!(second.headers().contains_key("x-semantic-cache-key"));
        assert_eq!(app.origin.call_count(), 1);
    }

    #[tokio::test]
    async fn test_encoded_path_is_embedded_decoded_and_forwarded_raw() {
        let app = app(MockOriginClient::json(r#"{"content":"Paris"}"#));
        let request =
            |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let first = app
            .router
            .clone()
            .oneshot(request("/semantic/capital%20of%20France"))
            .await
            .unwrap();
        assert_eq!(x_cache(&first), "MISS");
        wait_for_puts(&app.store, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = app
            .router
            .clone()
            .oneshot(request("/semantic/France%20capital"))
            .await
            .unwrap();

        assert_eq!(x_cache(&second), "SEMANTIC-HIT");
        assert_eq!(
            app.origin.forwarded_uris(),
            vec!["/capital%20of%20France".to_string()]
        );
        let calls = app.embeddings.calls();
        assert!(calls.contains(&"capital of France".to_string()));
        assert!(calls.contains(&"France capital".to_string()));
        assert!(calls.iter().all(|text| !text.contains('%')));
    }

    #[tokio::test]
    async fn test_exact_route_never_consults_semantic_tier() {
        let app = app(MockOriginClient::json(r#"{"content":"Paris"}"#));

        app.router
            .clone()
            .oneshot(chat("/v1/chat", "capital of France?"))
            .await
            .unwrap();
        wait_for_puts(&app.store, 1).await;

        let second = app
            .router
            .clone()
            .oneshot(chat("/v1/chat", "France capital?"))
            .await
            .unwrap();

        assert_eq!(x_cache(&second), "MISS");
        assert_eq!(app.origin.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_bad_gateway() {
        let app = app(MockOriginClient::transport_error());

        let response = app
            .router
            .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn test_origin_timeout_is_gateway_timeout() {
        let app = app(MockOriginClient::timeout());

        let response = app
            .router
            .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_origin_error_status_passes_through() {
        let app = app(MockOriginClient::with_response(
            StatusCode::NOT_FOUND,
            Some("text/plain"),
            "no such model",
        ));

        let response = app
            .router
            .oneshot(Request::builder().uri("/models/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from("no such model"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let app = app(MockOriginClient::json("{}"));

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/big")
                    .body(Body::from(vec![b'a'; 4096]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(app.origin.call_count(), 0);
    }

    #[tokio::test]
    async fn test_streamed_response_reaches_client() {
        let app = app(MockOriginClient::with_stream(vec!["data: 1\n\n", "data: 2\n\n"]));

        let response = app
            .router
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from("data: 1\n\ndata: 2\n\n"));
    }
}
