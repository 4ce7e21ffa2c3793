use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::engine::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/agents", get(handlers::list_agents))
        .route("/emotions/:id", get(handlers::get_emotions))
        .route("/route", post(handlers::explain_route))
        .route("/ask", post(handlers::ask))
        .route("/fusion", post(handlers::start_fusion))
        .route("/fusion/:id", get(handlers::get_fusion))
        .route("/messages", get(handlers::list_messages))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    log::info!("chorus API listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::providers::MockCompletion;
    use crate::registry::AgentRegistry;
    use crate::storage::InMemoryBackupStore;
    use crate::types::Participant;

    async fn create_test_app(dir: &std::path::Path) -> (Router, Arc<Dispatcher>) {
        let mut config = Config::default();
        config.storage.state_dir = dir.to_path_buf();
        config.fusion.timeout_ms = 1_000;
        let dispatcher = Arc::new(
            Dispatcher::assemble(
                config,
                AgentRegistry::builtin().unwrap(),
                Arc::new(
                    MockCompletion::new()
                        .reply("lumina", "It feels considerate.")
                        .reply("nova", "It is technically sound."),
                ),
                Arc::new(InMemoryBackupStore::new()),
            )
            .await
            .unwrap(),
        );
        let app = create_router(AppState {
            dispatcher: dispatcher.clone(),
        });
        (app, dispatcher)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["agents"]["nova"]["status"], "Healthy");
    }

    #[tokio::test]
    async fn test_list_agents() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_emotions_unknown_agent_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/emotions/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::builder().uri("/emotions/lumina").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["emotions"]["values"]["joy"], 0.5);
    }

    #[tokio::test]
    async fn test_route_explains_fusion() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .oneshot(post(
                "/route",
                r#"{"text": "Compare the emotional and technical tradeoffs of this design"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["decision"]["mode"], "fusion");
        assert_eq!(json["decision"]["agent_ids"], serde_json::json!(["lumina", "nova"]));
    }

    #[tokio::test]
    async fn test_ask_then_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .clone()
            .oneshot(post("/ask", r#"{"text": "hi", "agent_id": "nova"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["text"], "It is technically sound.");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/messages?a=user&b=nova&limit=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let messages = json.as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["intent"], "response");
    }

    #[tokio::test]
    async fn test_fusion_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (app, dispatcher) = create_test_app(dir.path()).await;

        let response = app
            .clone()
            .oneshot(post("/fusion", r#"{"agent_ids": ["lumina", "nova"], "query": "compare"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let fusion_id: crate::types::FusionId =
            serde_json::from_value(json["fusion_id"].clone()).unwrap();

        dispatcher.fusion().wait(&fusion_id).await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/fusion/{}", fusion_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "complete");
        assert_eq!(json["responses"]["nova"], "It is technically sound.");

        let mut logged = Vec::new();
        for _ in 0..50 {
            logged = dispatcher
                .bridge()
                .history(&Participant::User, &Participant::agent("nova"), 10);
            if logged.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let intents: Vec<&str> = logged.iter().map(|m| m.intent.as_str()).collect();
        assert_eq!(intents, vec!["fusion_response", "fusion_query"]);
    }

    #[tokio::test]
    async fn test_fusion_with_one_agent_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .oneshot(post("/fusion", r#"{"agent_ids": ["nova"], "query": "q"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_fusion_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fusion/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
