//! Scheduler configuration.

use std::str::FromStr;

/// What happens when a goroutine other than main exits with a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Log the fault and end the run with [`crate::VmError::GoroutinePanicked`].
    #[default]
    Abort,
    /// Log the fault and keep scheduling the remaining goroutines.
    Log,
}

impl FromStr for PanicPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown goroutine panic policy {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub goroutine_panic: PanicPolicy,
    /// Seed for the select tie-break. `None` keeps the thread's random state.
    pub select_seed: Option<u64>,
}

impl RuntimeConfig {
    /// Read overrides from the environment:
    /// - `TERN_GOROUTINE_PANIC`: `abort` (default) or `log`
    /// - `TERN_SELECT_SEED`: seed for select's random choice among ready cases
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let goroutine_panic = match var("TERN_GOROUTINE_PANIC") {
            Some(s) => s.parse().unwrap_or_else(|err| {
                tracing::warn!("TERN_GOROUTINE_PANIC: {}, using abort", err);
                PanicPolicy::Abort
            }),
            None => PanicPolicy::default(),
        };
        let select_seed = var("TERN_SELECT_SEED").and_then(|s| s.trim().parse().ok());
        Self { goroutine_panic, select_seed }
    }

    pub fn with_goroutine_panic(mut self, policy: PanicPolicy) -> Self {
        self.goroutine_panic = policy;
        self
    }

    pub fn with_select_seed(mut self, seed: u64) -> Self {
        self.select_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_vars(vars(&[]));
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.goroutine_panic, PanicPolicy::Abort);
        assert_eq!(config.select_seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = RuntimeConfig::from_vars(vars(&[("TERN_GOROUTINE_PANIC", "Log"), ("TERN_SELECT_SEED", "42")]));
        assert_eq!(config.goroutine_panic, PanicPolicy::Log);
        assert_eq!(config.select_seed, Some(42));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config =
            RuntimeConfig::from_vars(vars(&[("TERN_GOROUTINE_PANIC", "ignore"), ("TERN_SELECT_SEED", "x")]));
        assert_eq!(config.goroutine_panic, PanicPolicy::Abort);
        assert_eq!(config.select_seed, None);
    }
}
