use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the central collector. Required at startup; optional
    /// here so config parsing can report it as missing cleanly.
    pub collector_base_url: Option<String>,
    /// Minimum spacing between cycle starts.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Tick granularity for evaluating cycle admission.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Per-request SNMP timeout.
    #[serde(default = "default_snmp_timeout")]
    pub snmp_timeout_secs: u64,
    /// Upper bound on concurrently polled devices.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_polls: usize,
    /// Whether RouterOS API sessions use TLS (api-ssl, port 8729).
    #[serde(default = "default_api_tls")]
    pub routeros_api_tls: bool,
    #[serde(default = "default_api_connect_timeout")]
    pub routeros_connect_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_tick() -> u64 {
    1
}

fn default_snmp_timeout() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    64
}

fn default_api_tls() -> bool {
    true
}

fn default_api_connect_timeout() -> u64 {
    5
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Diagnostic mode: write the submission payload to a local artifact
    /// instead of posting it, and halt after the first completed cycle.
    pub fn debug_mode() -> bool {
        std::env::var("FLEETPOLL_DEBUG_MODE")
            .map(|v| v == "1")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config: AgentConfig =
            toml::from_str("collector_base_url = \"https://collector.example\"").unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.tick_secs, 1);
        assert_eq!(config.snmp_timeout_secs, 10);
        assert!(config.routeros_api_tls);
    }

    #[test]
    fn collector_url_may_be_absent() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert!(config.collector_base_url.is_none());
    }
}
