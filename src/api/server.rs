//! API server lifecycle: bind → spawn background task → return handle
//! with a shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Handle to a running API server.
pub struct ApiServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Address the listener actually bound, with the ephemeral port resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

/// Bind `addr`, mount the API router and serve it in a background task.
///
/// Port 0 picks an ephemeral port; see [`ApiServer::local_addr`].
pub async fn start_api_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(ctx);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        local_addr: addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::assistant::MedicalAssistant;
    use crate::pipeline::extraction::{DocumentNormalizer, LazyExtractors};
    use crate::pipeline::structuring::mock::MockModel;
    use crate::pipeline::structuring::StructuredExecutor;

    fn test_ctx(model: MockModel) -> ApiContext {
        let extractors = Arc::new(LazyExtractors::builtin(Duration::from_secs(5)));
        let assistant = MedicalAssistant::new(
            StructuredExecutor::new(Arc::new(model)),
            DocumentNormalizer::new(extractors),
        );
        ApiContext::new(Arc::new(assistant), 1024 * 1024)
    }

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let server = start_api_server(test_ctx(MockModel::new()), localhost())
            .await
            .expect("server should start");

        assert!(server.local_addr().ip().is_loopback());
        assert!(server.local_addr().port() > 0);

        let url = format!("http://{}/api/health", server.local_addr());
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        server.stop().await;
    }

    #[tokio::test]
    async fn serves_feature_routes() {
        let model = MockModel::replying(r#"{"answer": "Stay hydrated."}"#);
        let server = start_api_server(test_ctx(model), localhost())
            .await
            .expect("server should start");
        let port = server.local_addr().port();

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/nonexistent"))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/api/query"))
            .json(&serde_json::json!({"query": "How do I treat a cold?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "Stay hydrated.");

        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut server = start_api_server(test_ctx(MockModel::new()), localhost())
            .await
            .expect("server should start");

        server.shutdown();
        server.shutdown();
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_reported() {
        let first = start_api_server(test_ctx(MockModel::new()), localhost())
            .await
            .unwrap();
        let taken = first.local_addr();

        let err = start_api_server(test_ctx(MockModel::new()), taken)
            .await
            .err()
            .unwrap();
        assert!(err.contains("Failed to bind"));

        first.stop().await;
    }
}
