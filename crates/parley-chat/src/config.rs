//! Chat broadcaster configuration.

use std::time::Duration;

use parley_tick::TickConfig;

/// Configuration for a [`ChatBroadcaster`](crate::ChatBroadcaster).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How many messages the log retains. Clients further behind than
    /// this lose the oldest part of their backlog.
    pub log_capacity: usize,

    /// Interval between catch-up delivery passes.
    pub tick_interval: Duration,

    /// Pending inbound messages allowed before read tasks block.
    pub inbound_capacity: usize,

    /// Pending control commands (register, stats, ...) before callers wait.
    pub command_capacity: usize,

    /// Longest a single delivery write may take before the client is
    /// considered gone.
    pub send_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            log_capacity: 20,
            tick_interval: Duration::from_millis(500),
            inbound_capacity: 20,
            command_capacity: 64,
            send_timeout: Duration::from_secs(1),
        }
    }
}

impl ChatConfig {
    /// Clamp values that would make the actor unusable.
    ///
    /// Capacities are raised to at least 1 (Tokio channels reject 0).
    pub fn validated(mut self) -> Self {
        if self.log_capacity == 0 {
            tracing::warn!("log_capacity of 0 raised to 1");
            self.log_capacity = 1;
        }
        self.inbound_capacity = self.inbound_capacity.max(1);
        self.command_capacity = self.command_capacity.max(1);
        self
    }

    pub(crate) fn tick_config(&self) -> TickConfig {
        TickConfig::every(self.tick_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_config_default() {
        let config = ChatConfig::default();
        assert_eq!(config.log_capacity, 20);
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.inbound_capacity, 20);
    }

    #[test]
    fn test_validated_raises_zero_capacities() {
        let config = ChatConfig {
            log_capacity: 0,
            inbound_capacity: 0,
            command_capacity: 0,
            ..ChatConfig::default()
        }
        .validated();
        assert_eq!(config.log_capacity, 1);
        assert_eq!(config.inbound_capacity, 1);
        assert_eq!(config.command_capacity, 1);
    }
}
