//! Endpoint and timing configuration.

use crate::error::{Error, Result};
use std::time::Duration;
use url::Url;

/// Environment variable naming the synchronization service endpoint.
pub const ENDPOINT_ENV: &str = "LOCKSTEP_ENDPOINT";

/// Runtime configuration: where the room service lives and how the
/// session paces itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP(S) endpoint of the room service. Room allocation POSTs here;
    /// room channels attach under `/<room id>` with the scheme mapped to
    /// ws(s).
    pub endpoint: Url,
    /// Maximum silence before the connection is presumed dead.
    pub liveness_timeout: Duration,
    /// Cadence of outbound keep-alive frames while the transport is open.
    pub heartbeat_interval: Duration,
    /// Fixed delay before reopening after a transport-level failure.
    pub reconnect_backoff: Duration,
}

impl Config {
    /// Creates a configuration for the given endpoint with default pacing.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            liveness_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(1),
        }
    }

    /// Reads the endpoint from the `LOCKSTEP_ENDPOINT` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(ENDPOINT_ENV)
            .map_err(|_| Error::Config(format!("{ENDPOINT_ENV} is not set")))?;
        let endpoint = Url::parse(&raw)
            .map_err(|e| Error::Config(format!("invalid {ENDPOINT_ENV} '{raw}': {e}")))?;
        Ok(Self::new(endpoint))
    }

    /// Returns the WebSocket URL for a room channel: the endpoint with
    /// its scheme mapped http→ws / https→wss and the room id as path.
    pub fn room_url(&self, room_id: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(Error::Config(format!("unsupported endpoint scheme '{other}'")));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config("endpoint scheme is not settable".into()))?;
        url.set_path(room_id);
        Ok(url)
    }
}
