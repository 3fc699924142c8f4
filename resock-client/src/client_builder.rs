//! Client builder for configuring timing, transport and observability
//!
//! The `ClientBuilder` provides a fluent API for configuring a
//! [`SocketClient`] before it starts. It allows you to:
//! - Tune heartbeat, backoff and buffering through [`ClientConfig`]
//! - Replace the reconnection strategy
//! - Plug in a custom transport or codec
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use resock_client::{ClientBuilder, ClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> resock_core::Result<()> {
//! // Tighter liveness checking
//! let client = ClientBuilder::new("wss://stream.example.com/feed")
//!     .with_config(
//!         ClientConfig::default()
//!             .with_heartbeat_interval(Duration::from_secs(2))
//!             .with_heartbeat_timeout(Duration::from_secs(4)),
//!     )
//!     .connect()
//!     .await?;
//!
//! // With observability
//! let client2 = ClientBuilder::new("ws://localhost:8080")
//!     .with_default_observability()
//!     .service_name("my-client")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::controller::{self, ControllerOptions};
use crate::metrics::ClientMetrics;
use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use crate::transport::TransportFactory;
use crate::ws::WebSocketFactory;
use crate::SocketClient;
use resock_core::{Codec, Error, JsonCodec, ObservabilityConfig, Result};
use std::sync::Arc;

/// Builder for configuring and creating a SocketClient
pub struct ClientBuilder {
    url: String,
    config: ClientConfig,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    transport: Option<Arc<dyn TransportFactory>>,
    codec: Option<Arc<dyn Codec>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    enable_metrics: bool,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ClientConfig::default(),
            reconnect_strategy: None,
            transport: None,
            codec: None,
            observability_config: None,
            service_name: None,
            enable_metrics: false,
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom reconnection strategy
    ///
    /// Without one, an [`ExponentialBackoff`] is derived from the config.
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Open connections through `factory` instead of WebSockets
    pub fn with_transport(mut self, factory: impl TransportFactory) -> Self {
        self.transport = Some(Arc::new(factory));
        self
    }

    /// Encode and decode with `codec` instead of JSON
    pub fn with_codec(mut self, codec: impl Codec) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    ///
    /// Installs the global tracing subscriber on `build()`, so at most one
    /// client per process should ask for it.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Record metrics on the global meter without installing anything
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Validate the configuration and start the controller
    ///
    /// Does not connect. Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<SocketClient> {
        self.config.validate()?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            resock_core::init_observability(config.clone()).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else if self.enable_metrics {
            let name = self.service_name.unwrap_or_else(|| "resock".to_string());
            Some(Arc::new(ClientMetrics::new(name)))
        } else {
            None
        };

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::from_config(&self.config)));
        let factory = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketFactory));
        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));

        tracing::debug!(url = %self.url, config = ?self.config, "Starting client");

        let handle = controller::spawn(ControllerOptions {
            url: self.url.clone(),
            config: self.config,
            factory,
            codec: codec.clone(),
            strategy,
            metrics,
        })?;

        Ok(SocketClient::from_parts(self.url, handle, codec))
    }

    /// Build the client and connect it
    pub async fn connect(self) -> Result<SocketClient> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("custom_reconnect", &self.reconnect_strategy.is_some())
            .field("custom_transport", &self.transport.is_some())
            .field("observability", &self.observability_config.is_some())
            .finish()
    }
}
