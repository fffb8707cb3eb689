//! Builder for [`FemtoTcpBackend`](crate::tcp_backend::FemtoTcpBackend).
//!
//! Exposes the server list, capacity and the fixed timings used by the
//! monitor loop. Every duration is given in milliseconds and must be
//! positive.

use std::{sync::Arc, time::Duration};

use crate::{
    endpoint::Endpoint,
    error::BuildError,
    tcp_backend::{Dialer, FemtoTcpBackend, TcpBackendConfig},
    tick::Clock,
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Check a configuration before a backend is created from it.
pub(crate) fn validate_config(config: &TcpBackendConfig) -> Result<(), BuildError> {
    ensure_positive!(config.max_servers, "max_servers")?;
    ensure_positive!(config.retry_interval.as_millis(), "retry_interval_ms")?;
    ensure_positive!(config.poll_timeout.as_millis(), "poll_timeout_ms")?;
    ensure_positive!(config.connect_timeout.as_millis(), "connect_timeout_ms")?;
    if config.servers.len() > config.max_servers {
        return Err(BuildError::InvalidConfig(format!(
            "{} servers configured but max_servers is {}",
            config.servers.len(),
            config.max_servers
        )));
    }
    for (index, endpoint) in config.servers.iter().enumerate() {
        if config.servers[..index].contains(endpoint) {
            return Err(BuildError::InvalidConfig(format!(
                "server {endpoint} is listed more than once"
            )));
        }
    }
    Ok(())
}

/// Builder for constructing [`FemtoTcpBackend`] instances.
#[derive(Clone, Debug, Default)]
pub struct TcpBackendBuilder {
    max_servers: Option<usize>,
    retry_interval_ms: Option<u64>,
    poll_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    servers: Vec<Endpoint>,
}

impl TcpBackendBuilder {
    /// Create a new builder with default timings and no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collector to connect to once the backend is built.
    pub fn with_server(mut self, endpoint: impl Into<Endpoint>) -> Self {
        self.servers.push(endpoint.into());
        self
    }

    option_setter!(
        #[doc = "Set the maximum number of collectors."]
        with_max_servers,
        max_servers,
        usize
    );
    option_setter!(
        #[doc = "Set the fixed delay between reconnect attempts."]
        with_retry_interval_ms,
        retry_interval_ms,
        u64
    );
    option_setter!(with_poll_timeout_ms, poll_timeout_ms, u64);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    pub fn servers(&self) -> &[Endpoint] {
        &self.servers
    }

    /// Produce the validated configuration without creating a backend.
    pub fn build_config(&self) -> Result<TcpBackendConfig, BuildError> {
        let mut config = TcpBackendConfig::default();
        if let Some(max) = self.max_servers {
            config.max_servers = max;
        }
        if let Some(ms) = self.retry_interval_ms {
            config.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(ms);
        }
        config.servers = self.servers.clone();
        validate_config(&config)?;
        Ok(config)
    }

    /// Build the backend, issuing a connect to every configured server.
    pub fn build(&self) -> Result<FemtoTcpBackend, BuildError> {
        FemtoTcpBackend::with_config(self.build_config()?)
    }

    /// Build the backend around a custom dialer and tick source.
    pub fn build_with(
        &self,
        dialer: Box<dyn Dialer>,
        clock: Arc<dyn Clock>,
    ) -> Result<FemtoTcpBackend, BuildError> {
        FemtoTcpBackend::with_parts(self.build_config()?, dialer, clock)
    }
}
