//! Client metrics definitions
//!
//! OpenTelemetry instruments describing the health of a [`SocketClient`].
//! They are exported through whatever meter provider is installed globally,
//! which `ClientBuilder::with_observability()` takes care of.
//!
//! # Metrics Collected
//!
//! - **connection.state**: current [`ConnectionState`] as a number (gauge)
//! - **frames.sent**: frames handed to the transport (counter)
//! - **frames.buffered**: frames queued while offline (counter)
//! - **messages.received**: inbound messages, by event name (counter)
//! - **errors.total**: transport and encoding errors, by type (counter)
//! - **reconnection.attempts**: retries scheduled (counter)
//! - **reconnection.success**: connections opened after a retry (counter)
//! - **reconnection.exhausted**: times the retry budget ran out (counter)
//! - **heartbeat.timeouts**: connections declared dead by the heartbeat (counter)
//!
//! [`SocketClient`]: crate::SocketClient

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    InstrumentationScope, KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=idle, 1=connecting, 2=open, 3=reconnecting, 4=closed)
    pub connection_state: Gauge<i64>,
    pub frames_sent: Counter<u64>,
    pub frames_buffered: Counter<u64>,
    pub messages_received: Counter<u64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub reconnection_exhausted: Counter<u64>,
    pub heartbeat_timeouts: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider, scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into()).build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("resock.client.connection.state")
                .with_description(
                    "Connection state (0=idle, 1=connecting, 2=open, 3=reconnecting, 4=closed)",
                )
                .build(),
            frames_sent: meter
                .u64_counter("resock.client.frames.sent")
                .with_description("Total number of frames handed to the transport")
                .build(),
            frames_buffered: meter
                .u64_counter("resock.client.frames.buffered")
                .with_description("Total number of frames queued while disconnected")
                .build(),
            messages_received: meter
                .u64_counter("resock.client.messages.received")
                .with_description("Total number of inbound messages")
                .build(),
            errors_total: meter
                .u64_counter("resock.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("resock.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts scheduled")
                .build(),
            reconnection_success: meter
                .u64_counter("resock.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            reconnection_exhausted: meter
                .u64_counter("resock.client.reconnection.exhausted")
                .with_description("Times the reconnection budget was exhausted")
                .build(),
            heartbeat_timeouts: meter
                .u64_counter("resock.client.heartbeat.timeouts")
                .with_description("Connections declared dead by a missing pong")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric(), &[]);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.add(1, &[]);
    }

    pub fn record_frame_buffered(&self) {
        self.frames_buffered.add(1, &[]);
    }

    /// Record an inbound message; `event` is `"raw"` for non-JSON frames
    pub fn record_message(&self, event: &str) {
        let attributes = &[KeyValue::new("event", event.to_string())];
        self.messages_received.add(1, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_reconnection_exhausted(&self) {
        self.reconnection_exhausted.add(1, &[]);
    }

    pub fn record_heartbeat_timeout(&self) {
        self.heartbeat_timeouts.add(1, &[]);
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("test-client");

        // Without an installed provider these are no-ops; they must not panic
        metrics.update_connection_state(ConnectionState::Open);
        metrics.record_frame_sent();
        metrics.record_frame_buffered();
        metrics.record_message("trade");
        metrics.record_error("transport");
    }

    #[test]
    fn test_connection_state_metrics() {
        let metrics = ClientMetrics::new("test-client-state");

        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Reconnecting,
            ConnectionState::Closed,
        ] {
            metrics.update_connection_state(state);
        }
    }

    #[test]
    fn test_reconnection_metrics() {
        let metrics = ClientMetrics::new("test-client-reconnect");

        metrics.record_reconnection_attempt();
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_success();
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_exhausted();
        metrics.record_heartbeat_timeout();
    }
}
