//! Coordinator configuration.

use std::time::Duration;

pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_millis(9);
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;
/// Largest accepted signal bus capacity; larger values are clamped.
pub const MAX_SIGNAL_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long a handshake waits for confirmations before abandoning.
    pub activation_timeout: Duration,
    /// How often the readiness gate re-checks the document's ready state.
    pub ready_poll_interval: Duration,
    /// Per-subscriber buffer of the signal bus, at most
    /// [`MAX_SIGNAL_CAPACITY`].
    ///
    /// Handshakes recover from a lagging subscription with a claim pass;
    /// revocations travel on their own unbounded path and are never dropped.
    pub signal_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "Ignoring invalid config override");
            None
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by `DOM_PERMIT_ACTIVATION_TIMEOUT_MS`,
    /// `DOM_PERMIT_READY_POLL_MS` and `DOM_PERMIT_SIGNAL_CAPACITY`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            activation_timeout: env_u64("DOM_PERMIT_ACTIVATION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.activation_timeout),
            ready_poll_interval: env_u64("DOM_PERMIT_READY_POLL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ready_poll_interval),
            signal_capacity: env_u64("DOM_PERMIT_SIGNAL_CAPACITY")
                .and_then(|n| match usize::try_from(n) {
                    Ok(capacity) if (1..=MAX_SIGNAL_CAPACITY).contains(&capacity) => Some(capacity),
                    _ => {
                        tracing::warn!(
                            var = "DOM_PERMIT_SIGNAL_CAPACITY",
                            value = n,
                            max = MAX_SIGNAL_CAPACITY,
                            "Ignoring out-of-range config override"
                        );
                        None
                    }
                })
                .unwrap_or(defaults.signal_capacity),
        }
    }

    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    pub fn with_signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.activation_timeout, Duration::from_secs(5));
        assert_eq!(config.ready_poll_interval, Duration::from_millis(9));
        assert_eq!(config.signal_capacity, 256);
    }

    #[test]
    fn builder_pattern() {
        let config = CoordinatorConfig::default()
            .with_activation_timeout(Duration::from_millis(50))
            .with_ready_poll_interval(Duration::from_millis(1))
            .with_signal_capacity(8);

        assert_eq!(config.activation_timeout, Duration::from_millis(50));
        assert_eq!(config.ready_poll_interval, Duration::from_millis(1));
        assert_eq!(config.signal_capacity, 8);
    }

    const VARS: [&str; 3] = [
        "DOM_PERMIT_ACTIVATION_TIMEOUT_MS",
        "DOM_PERMIT_READY_POLL_MS",
        "DOM_PERMIT_SIGNAL_CAPACITY",
    ];

    fn set_env(values: [&str; 3]) {
        for (name, value) in VARS.into_iter().zip(values) {
            // SAFETY: only this test touches these variables.
            unsafe { std::env::set_var(name, value) };
        }
    }

    // Env vars are process-wide, so every override case runs in this one test.
    #[test]
    fn from_env_overrides_and_fallbacks() {
        set_env(["1200", "20", "32"]);
        assert_eq!(
            CoordinatorConfig::from_env(),
            CoordinatorConfig::default()
                .with_activation_timeout(Duration::from_millis(1200))
                .with_ready_poll_interval(Duration::from_millis(20))
                .with_signal_capacity(32)
        );

        set_env(["soon", "-5", "lots"]);
        assert_eq!(CoordinatorConfig::from_env(), CoordinatorConfig::default());

        set_env([" 750 ", "9", "18446744073709551615"]);
        let config = CoordinatorConfig::from_env();
        assert_eq!(config.activation_timeout, Duration::from_millis(750));
        assert_eq!(config.signal_capacity, DEFAULT_SIGNAL_CAPACITY);

        set_env(["5000", "9", "0"]);
        assert_eq!(CoordinatorConfig::from_env().signal_capacity, DEFAULT_SIGNAL_CAPACITY);

        for name in VARS {
            // SAFETY: see above.
            unsafe { std::env::remove_var(name) };
        }
        assert_eq!(CoordinatorConfig::from_env(), CoordinatorConfig::default());
    }
}
