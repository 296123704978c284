//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Build the Axum app around the gateway router (timeout, tracing)
//! - Run the accept loop with per-connection HTTP/1.1 and HTTP/2 support
//! - Attach the peer address to every request
//! - Close connections that stay idle for `idle_timeout` (HTTP/1.1 and HTTP/2)
//! - Drain connections on shutdown, bounded by the grace timeout
//!
//! # States
//! ```text
//! Created → Started → Draining → Stopped
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::Response;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::routing::{Handler, Router as GatewayRouter};

/// Observable server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Started,
    Draining,
    Stopped,
}

/// Timeouts applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub grace_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for ServerSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            idle_timeout: config.idle_timeout(),
            grace_timeout: config.grace_timeout(),
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    app: axum::Router,
    settings: ServerSettings,
    state: Arc<watch::Sender<ServerState>>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(router: Arc<GatewayRouter>, settings: ServerSettings) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            app: Self::build_app(router, settings.write_timeout),
            settings,
            state: Arc::new(state),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(router: Arc<GatewayRouter>, write_timeout: Duration) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch)
            .with_state(router)
            .layer(TimeoutLayer::new(write_timeout))
            .layer(TraceLayer::new_for_http())
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn settings(&self) -> ServerSettings {
        self.settings
    }

    fn connection_builder(&self) -> auto::Builder<TokioExecutor> {
        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.settings.read_timeout)
            .keep_alive(true);
        builder
            .http2()
            .timer(TokioTimer::new())
            .keep_alive_interval(self.settings.idle_timeout)
            .keep_alive_timeout(self.settings.idle_timeout);
        builder
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }
        self.state.send_replace(ServerState::Started);

        let builder = self.connection_builder();
        let mut connections = JoinSet::new();

        loop {
            while connections.try_join_next().is_some() {}

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        connections.spawn(self.serve(builder.clone(), stream, peer, permit));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        // transient (e.g. fd exhaustion): back off briefly
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, draining connections");
                    break;
                }
            }
        }

        drop(listener);
        self.state.send_replace(ServerState::Draining);
        self.tracker.drain();

        let grace = self.settings.grace_timeout;
        if tokio::time::timeout(grace, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                grace_timeout = ?grace,
                remaining = self.tracker.active_count(),
                "Grace period exceeded, aborting connections"
            );
            connections.abort_all();
        }
        while connections.join_next().await.is_some() {}

        self.state.send_replace(ServerState::Stopped);
        tracing::info!("HTTP server stopped");
    }

    fn serve(
        &self,
        builder: auto::Builder<TokioExecutor>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let app = self.app.clone();
        let guard = self.tracker.track();
        let mut drain = self.tracker.drain_signal();
        let idle_timeout = self.settings.idle_timeout;

        async move {
            let _permit = permit;
            let (in_flight, mut activity) = watch::channel(0usize);
            let in_flight = Arc::new(in_flight);

            let service = service_fn(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer));
                let app = app.clone();
                let in_flight = in_flight.clone();
                in_flight.send_modify(|n| *n += 1);
                async move {
                    let res = app.oneshot(req).await;
                    in_flight.send_modify(|n| *n = n.saturating_sub(1));
                    res
                }
            });

            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = drain.recv() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
                _ = idle_for(&mut activity, idle_timeout) => {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Idle connection closed");
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };

            if let Err(e) = result {
                tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
            }
        }
    }
}

/// Resolve once no request has been in flight for `timeout`.
async fn idle_for(activity: &mut watch::Receiver<usize>, timeout: Duration) {
    loop {
        if activity.wait_for(|n| *n == 0).await.is_err() {
            return std::future::pending().await;
        }
        match tokio::time::timeout(timeout, activity.changed()).await {
            Err(_) => return,
            Ok(Ok(())) => continue,
            Ok(Err(_)) => return std::future::pending().await,
        }
    }
}

/// Fallback handler: every request goes through the gateway router.
async fn dispatch(State(router): State<Arc<GatewayRouter>>, req: Request<Body>) -> Response {
    router.call(req).await
}
