//! Test data builders for creating test objects

use envdash_rs::config::{BrokerConfig, DashboardConfig};
use envdash_rs::registry::Channel;

/// Builder for dashboard configs used in tests
pub struct ConfigBuilder {
    config: DashboardConfig,
}

impl ConfigBuilder {
    /// Simulated-mode config with the campus channels and a fixed seed
    pub fn new() -> Self {
        let mut config = DashboardConfig::default();
        config.simulation.seed = Some(7);
        Self { config }
    }

    /// Point the config at a broker so the dashboard starts live
    pub fn broker(mut self, host: &str, port: u16) -> Self {
        self.config.broker = Some(BrokerConfig {
            host: host.to_string(),
            port,
            ..BrokerConfig::default()
        });
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.history.capacity = capacity;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.fallback.failure_threshold = threshold;
        self
    }

    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn refresh_ms(mut self, value_ms: u64, chart_ms: u64) -> Self {
        self.config.refresh.value_interval_ms = value_ms;
        self.config.refresh.chart_interval_ms = chart_ms;
        self
    }

    pub fn sim_tick_ms(mut self, tick_ms: u64) -> Self {
        self.config.simulation.tick_ms = tick_ms;
        self
    }

    pub fn build(self) -> DashboardConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The single-channel table used by the end-to-end scenarios
pub fn temp_only() -> Vec<Channel> {
    vec![Channel::numeric("temp", "siot/环境温度")
        .with_unit("°C")
        .with_walk(-10.0, 45.0, 0.5, 22.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .broker("localhost", 1883)
            .capacity(3)
            .failure_threshold(2)
            .channels(temp_only())
            .build();

        assert!(config.broker.is_some());
        assert_eq!(config.history.capacity, 3);
        assert_eq!(config.fallback.failure_threshold, 2);
        assert_eq!(config.channels.len(), 1);
        assert!(config.validate().is_ok());
    }
}
