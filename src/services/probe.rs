//! Secure-port reachability probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::models::{NormalizedDomain, ProbeConfig};
use crate::services::MxValidator;

/// Outcome of probing a site domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// TCP connect to the secure web port succeeded
    pub secure_reachable: bool,
    /// The site domain itself has MX records (informational)
    pub mail_capable: bool,
}

/// Reachability check seam used by the scheduler.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, domain: &NormalizedDomain) -> ProbeResult;
}

/// Probe doing a timed TCP connect plus an MX check of the site domain.
pub struct TcpProber {
    port: u16,
    timeout: Duration,
    mx: Option<Arc<MxValidator>>,
}

impl TcpProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            port: config.port,
            timeout: config.timeout(),
            mx: None,
        }
    }

    /// Also report whether the site domain can receive mail.
    pub fn with_mx(mut self, mx: Arc<MxValidator>) -> Self {
        self.mx = Some(mx);
        self
    }

    /// Connect to `host:port`, closing the socket as soon as the outcome is known.
    pub async fn check_port(&self, host: &str) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect((host, self.port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                log::debug!("Connect to {host}:{} failed: {e}", self.port);
                false
            }
            Err(_) => {
                log::debug!(
                    "Connect to {host}:{} timed out after {:?}",
                    self.port,
                    self.timeout
                );
                false
            }
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProber {
    async fn probe(&self, domain: &NormalizedDomain) -> ProbeResult {
        if domain.is_empty() {
            return ProbeResult::default();
        }

        let secure_reachable = self.check_port(domain.as_str()).await;
        let mail_capable = match &self.mx {
            Some(mx) => mx.is_mail_capable(domain.as_str()).await,
            None => false,
        };

        ProbeResult {
            secure_reachable,
            mail_capable,
        }
    }
}
