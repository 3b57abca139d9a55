//! HTTP API server.
//!
//! One task per accepted connection, each served by hyper's HTTP/1 stack.
//! All handlers share a single immutable [`AppState`].

mod routes;

pub use routes::{handle_request, route};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use opswatch_adapters::QueryEngine;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::data::{LiveMetricsQuery, MetricRowShaper, NarrativeFetcher, ThresholdProvider};
use crate::settings::Settings;

/// Everything a request handler needs, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<dyn QueryEngine>,
    pub thresholds: ThresholdProvider,
    pub shaper: MetricRowShaper,
    pub live_metrics: LiveMetricsQuery,
    pub narratives: NarrativeFetcher,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        thresholds: ThresholdProvider,
        settings: &Settings,
    ) -> Self {
        Self {
            engine,
            thresholds,
            shaper: settings.shaper(),
            live_metrics: settings.live_metrics_query(),
            narratives: settings.narrative_fetcher(),
        }
    }
}

/// Serve the API on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down API server");
                return;
            }
        };

        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, &state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%peer, "connection error: {}", e);
            }
        });
    }
}
