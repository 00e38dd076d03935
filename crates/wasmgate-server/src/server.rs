//! HTTP server lifecycle.
//!
//! [`GatewayServer`] binds the listener, drives the background epoch
//! ticker that enforces guest execution deadlines, and serves until
//! shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use wasmgate_common::{ConfigFile, GatewayError, ServerConfigFile};

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            request_timeout_secs: 30,
            graceful_shutdown: true,
        }
    }
}

impl ServerConfig {
    /// Build from the config file section.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address does not parse.
    pub fn from_file(config: &ServerConfigFile) -> Result<Self, GatewayError> {
        let bind_addr = config.bind_addr.parse().map_err(|_| {
            GatewayError::invalid_config(format!(
                "Invalid bind address '{}'. Expected 'host:port' (e.g., '0.0.0.0:8080')",
                config.bind_addr
            ))
        })?;

        Ok(Self {
            bind_addr,
            request_timeout_secs: config.request_timeout_secs,
            graceful_shutdown: config.graceful_shutdown,
        })
    }

    /// Create a new server config with custom bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Create a new server config with custom timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Get the request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The wasmgate HTTP server.
///
/// # Example
///
/// ```ignore
/// use wasmgate_common::ConfigFile;
/// use wasmgate_server::GatewayServer;
///
/// let config = ConfigFile::default();
/// let server = GatewayServer::new(&config)?;
/// server.run().await?;
/// ```
pub struct GatewayServer {
    /// Application state.
    state: AppState,
    /// Server configuration.
    config: ServerConfig,
}

impl GatewayServer {
    /// Create a new server instance from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the runtime
    /// cannot be initialized.
    pub fn new(config: &ConfigFile) -> Result<Self, GatewayError> {
        let server_config = ServerConfig::from_file(&config.server)?;
        let state = AppState::new(&config.runtime, &config.modules)?;

        Ok(Self {
            state,
            config: server_config,
        })
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown.
    ///
    /// This will block until the server is shut down via signal
    /// (SIGTERM/SIGINT) if graceful shutdown is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the address.
    pub async fn run(self) -> Result<(), GatewayError> {
        let ticker = spawn_epoch_ticker(self.state.clone());
        let app = build_router(self.state, self.config.request_timeout());

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| GatewayError::invalid_config(format!("Failed to bind: {e}")))?;

        info!(addr = %self.config.bind_addr, "Starting HTTP server");

        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        if self.config.graceful_shutdown {
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|e| GatewayError::invalid_config(format!("Server error: {e}")))?;
        } else {
            axum::serve(listener, service)
                .await
                .map_err(|e| GatewayError::invalid_config(format!("Server error: {e}")))?;
        }

        ticker.abort();
        info!("Server shutdown complete");
        Ok(())
    }

    /// Start the server and return a handle for testing.
    ///
    /// The server binds to an ephemeral port (127.0.0.1:0) and
    /// returns a handle that can be used to get the actual address
    /// and shut down the server.
    pub async fn start_test(config: &ConfigFile) -> Result<TestHandle, GatewayError> {
        let state = AppState::new(&config.runtime, &config.modules)?;
        let ticker = spawn_epoch_ticker(state.clone());
        let app = build_router(state.clone(), Duration::from_secs(30));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| GatewayError::invalid_config(format!("Failed to bind: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::invalid_config(format!("Failed to get addr: {e}")))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
        });

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
            ticker,
        })
    }
}

/// Handle for a test server instance.
pub struct TestHandle {
    /// The address the server is bound to.
    addr: SocketAddr,
    /// Application state.
    state: AppState,
    /// Shutdown signal sender.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Server task handle.
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
    /// Background epoch ticker.
    ticker: tokio::task::JoinHandle<()>,
}

impl TestHandle {
    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shutdown the server gracefully.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
        self.ticker.abort();
    }
}

/// Drive the engine epoch forward, one tick per millisecond.
///
/// Guest deadlines are expressed in epoch ticks, so without this task
/// `set_epoch_deadline` would never fire. No-op when epoch interruption
/// is disabled.
fn spawn_epoch_ticker(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !state.engine().config().epoch_interruption {
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_millis(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            state.engine().increment_epoch();
        }
    })
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
