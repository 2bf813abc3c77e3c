use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::allocator::AddressPool;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub pool_start: Ipv4Addr,
    pub pool_end: Ipv4Addr,
    pub router: Ipv4Addr,
    pub dns_server: Ipv4Addr,
    pub lease_duration_seconds: u32,
    pub leases_file: String,
    #[serde(default = "default_receive_timeout_millis")]
    pub receive_timeout_millis: u64,
}

fn default_receive_timeout_millis() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(172, 20, 0, 2),
            subnet_mask: Ipv4Addr::new(255, 255, 0, 0),
            pool_start: Ipv4Addr::new(172, 20, 0, 100),
            pool_end: Ipv4Addr::new(172, 20, 0, 200),
            router: Ipv4Addr::new(172, 20, 0, 1),
            dns_server: Ipv4Addr::new(8, 8, 8, 8),
            lease_duration_seconds: 3600,
            leases_file: "dhcp_leases.txt".to_string(),
            receive_timeout_millis: default_receive_timeout_millis(),
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if u32::from(self.pool_start) > u32::from(self.pool_end) {
            return Err(Error::InvalidConfig(
                "pool_start must be less than or equal to pool_end".to_string(),
            ));
        }

        if self.ip_in_pool(self.server_ip) {
            return Err(Error::InvalidConfig(
                "server_ip must not be within the pool range".to_string(),
            ));
        }

        if self.lease_duration_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.receive_timeout_millis == 0 {
            return Err(Error::InvalidConfig(
                "receive_timeout_millis must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The configured address pool as an inclusive range.
    pub fn pool(&self) -> AddressPool {
        AddressPool::new(self.pool_start, self.pool_end)
    }

    pub fn ip_in_pool(&self, ip: Ipv4Addr) -> bool {
        self.pool().contains(ip)
    }

    pub fn pool_size(&self) -> u64 {
        self.pool().len()
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_millis)
    }
}
