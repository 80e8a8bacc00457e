//! Liveness probing of a service instance over its health endpoint.

use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::rpc::HealthClient;

const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Probes one instance by port.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    attempts: u32,
    delay: Duration,
}

impl Default for HealthProbe {
    fn default() -> Self {
        HealthProbe {
            attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl HealthProbe {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        HealthProbe { attempts, delay }
    }

    /// One bounded liveness round-trip.
    pub async fn ping(&self, port: u16) -> Result<()> {
        HealthClient::new(&base_url(port)).ping(PING_TIMEOUT).await
    }

    /// Retries [`ping`](Self::ping) up to the configured attempt count.
    /// Returns `true` as soon as one attempt succeeds.
    pub async fn wait_healthy(&self, port: u16) -> bool {
        for attempt in 1..=self.attempts {
            match self.ping(port).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!(port, attempt, error = %e, "health probe failed");
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.delay).await;
            }
        }
        false
    }
}

/// Base URL of the instance listening on `port`.
pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_targets_loopback() {
        assert_eq!(base_url(8080), "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn probing_a_closed_port_reports_unhealthy() {
        // Reserved port with nothing listening.
        let probe = HealthProbe::new(2, Duration::from_millis(10));
        assert!(!probe.wait_healthy(1).await);
    }
}
