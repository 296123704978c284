//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from the validated configuration
//! - Start the listener, then load service routes while it serves
//! - Own the cleaner and shutdown coordinator for the process lifetime
//!
//! # Design Decisions
//! - Fail fast: listener, metrics and definition errors are fatal
//! - Requests arriving before routes are loaded get 404
//! - Waiting for the gateway ends with a short delay so logs can flush

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::http::{HttpServer, RequestIdMiddleware, ServerSettings, ServerState};
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::plugins::rate_limit::cleaner::{Cleaner, DEFAULT_CLEANUP_PERIOD};
use crate::plugins::PluginRegistry;
use crate::proxy::ProxyRegister;
use crate::routing::Router;
use crate::service::{LoadReport, LoaderError, ServiceLoader};

pub const DEFAULT_POST_SHUTDOWN_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("could not read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("invalid metrics address `{address}`: {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// The gateway before it is started.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: GatewayConfig,
    definitions: PathBuf,
    cleanup_period: Duration,
    post_shutdown_delay: Duration,
}

impl Gateway {
    pub fn new(config: GatewayConfig, definitions: impl Into<PathBuf>) -> Self {
        Self {
            config,
            definitions: definitions.into(),
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
            post_shutdown_delay: DEFAULT_POST_SHUTDOWN_DELAY,
        }
    }

    pub fn with_cleanup_period(mut self, period: Duration) -> Self {
        self.cleanup_period = period;
        self
    }

    pub fn with_post_shutdown_delay(mut self, delay: Duration) -> Self {
        self.post_shutdown_delay = delay;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn start(self) -> Result<RunningGateway, StartupError> {
        let config = self.config;

        if let Some(parsed) = config.metrics_socket() {
            let addr = parsed.map_err(|source| StartupError::MetricsAddress {
                address: config.metrics_address.clone().unwrap_or_default(),
                source,
            })?;
            metrics::init_metrics(addr)?;
        }

        let shutdown = Shutdown::new();
        let cleaner = Cleaner::with_period(self.cleanup_period);
        let plugins = PluginRegistry::new(cleaner.clone());

        let mut router = Router::new();
        if config.add_request_id {
            router.use_middleware(Arc::new(RequestIdMiddleware));
        }
        let router = Arc::new(router);

        let listener = Listener::bind(&config.bind_address(), config.max_connections).await?;
        let local_addr = listener.local_addr().map_err(StartupError::LocalAddr)?;

        let server = HttpServer::new(router.clone(), ServerSettings::from(&config));
        let state = server.state();
        let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));
        cleaner.start(shutdown.subscribe());

        tracing::info!(
            address = %local_addr,
            global_middlewares = router.global_middleware_count(),
            definitions = %self.definitions.display(),
            "Gateway started, loading services"
        );

        let loader = ServiceLoader::new(ProxyRegister::new(router.clone()), plugins);
        let report = match loader.load_and_register(&self.definitions).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Failed loading services, shutting down");
                shutdown.trigger();
                let _ = server_task.await;
                cleaner.stop();
                return Err(e.into());
            }
        };

        Ok(RunningGateway {
            local_addr,
            router,
            report,
            shutdown,
            state,
            server_task,
            cleaner,
            post_shutdown_delay: self.post_shutdown_delay,
        })
    }
}

/// A started gateway.
pub struct RunningGateway {
    local_addr: SocketAddr,
    router: Arc<Router>,
    report: LoadReport,
    shutdown: Shutdown,
    state: watch::Receiver<ServerState>,
    server_task: JoinHandle<()>,
    cleaner: Cleaner,
    post_shutdown_delay: Duration,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn cleaner(&self) -> &Cleaner {
        &self.cleaner
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }

    /// Handle that can stop the gateway from elsewhere.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start draining. Returns immediately; use [`wait`](Self::wait).
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait until the server has stopped, then stop the cleaner.
    pub async fn wait(mut self) {
        let _ = self.state.wait_for(|s| *s == ServerState::Stopped).await;
        if let Err(e) = self.server_task.await {
            tracing::error!(error = %e, "Server task failed");
        }
        self.cleaner.stop();

        tokio::time::sleep(self.post_shutdown_delay).await;
        tracing::info!("Gateway stopped");
    }
}
