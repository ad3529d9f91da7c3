use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use ipmi_transport::{BindConfig, DEFAULT_RMCP_PORT};

/// IPMI server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, all interfaces by default.
    pub address: IpAddr,
    /// UDP port, 623 by default.
    pub port: u16,
    /// BMC GUID reported in RAKP2. A random v4 UUID is generated at
    /// startup when absent.
    pub bmc_uuid: Option<[u8; 16]>,
    /// BMC integrity key (Kg) override. When absent each session uses its
    /// user key, which is how most deployments run.
    pub kg: Option<Vec<u8>>,
    /// Idle time after which the sweep collects a session.
    pub inactivity_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            port: DEFAULT_RMCP_PORT,
            bmc_uuid: None,
            kg: None,
            inactivity_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn bind_config(&self) -> BindConfig {
        BindConfig {
            address: self.address,
            port: self.port,
        }
    }
}
