//! Dashboard configuration.

use std::net::SocketAddr;

use rsm_engine::EngineConfig;
use rsm_types::{RsmError, RsmResult};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub addr: SocketAddr,
    pub engine: EngineConfig,
}

impl DashboardConfig {
    /// Engine settings from `RSM_*` plus the listen address from
    /// `RSM_DASHBOARD_ADDR`.
    pub fn from_env() -> RsmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> RsmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup("RSM_DASHBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw
            .trim()
            .parse()
            .map_err(|e| RsmError::Config(format!("RSM_DASHBOARD_ADDR={raw:?}: {e}")))?;
        Ok(Self {
            addr,
            engine: EngineConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_address() {
        let config = DashboardConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn address_override_and_validation() {
        let config = DashboardConfig::from_lookup(|key| {
            (key == "RSM_DASHBOARD_ADDR").then(|| "127.0.0.1:9090".to_string())
        })
        .unwrap();
        assert_eq!(config.addr.port(), 9090);

        let err = DashboardConfig::from_lookup(|key| {
            (key == "RSM_DASHBOARD_ADDR").then(|| "localhost".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, RsmError::Config(_)));
    }
}
