use std::time::Duration;

use thiserror::Error;

const DEFAULT_POOL_SIZE: usize = 16;
const DEFAULT_MAX_OUTSTANDING: usize = 8;
const DEFAULT_SESSION_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_MESSAGE_DEADLINE_MS: u64 = 60_000;
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 100;

// Session tuning, sourced from defaults and `SUBRUNNER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    // Number of dispatch workers.
    pub pool_size: usize,
    // Max messages dispatched but not yet settled.
    pub max_outstanding: usize,
    // Overall session deadline; pulling stops when it elapses.
    pub session_timeout: Duration,
    // Per-message ack deadline.
    pub message_deadline: Duration,
    // How long to wait for in-flight work once pulling stops.
    pub drain_timeout: Duration,
    // Expiry sweep period.
    pub sweep_interval: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?} as {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
            session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
            message_deadline: Duration::from_millis(DEFAULT_MESSAGE_DEADLINE_MS),
            drain_timeout: Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var::<u64>(&lookup, var, "milliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let config = Self {
            pool_size: parse_var(&lookup, "SUBRUNNER_POOL_SIZE", "integer")?
                .unwrap_or(defaults.pool_size),
            max_outstanding: parse_var(&lookup, "SUBRUNNER_MAX_OUTSTANDING", "integer")?
                .unwrap_or(defaults.max_outstanding),
            session_timeout: millis("SUBRUNNER_SESSION_TIMEOUT_MS", defaults.session_timeout)?,
            message_deadline: millis("SUBRUNNER_MESSAGE_DEADLINE_MS", defaults.message_deadline)?,
            drain_timeout: millis("SUBRUNNER_DRAIN_TIMEOUT_MS", defaults.drain_timeout)?,
            sweep_interval: millis("SUBRUNNER_SWEEP_INTERVAL_MS", defaults.sweep_interval)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("pool_size", self.pool_size == 0),
            ("max_outstanding", self.max_outstanding == 0),
            ("session_timeout", self.session_timeout.is_zero()),
            ("message_deadline", self.message_deadline.is_zero()),
            ("sweep_interval", self.sweep_interval.is_zero()),
        ];
        match checks.into_iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(ConfigError::Zero(field)),
            None => Ok(()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| vars.get(k).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.pool_size, 16);
        assert_eq!(config.max_outstanding, 8);
    }

    #[test]
    fn variables_override_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("SUBRUNNER_POOL_SIZE", "4"),
            ("SUBRUNNER_MAX_OUTSTANDING", " 2 "),
            ("SUBRUNNER_MESSAGE_DEADLINE_MS", "1500"),
            ("SUBRUNNER_DRAIN_TIMEOUT_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.pool_size, 4);
        assert_eq!(config.max_outstanding, 2);
        assert_eq!(config.message_deadline, Duration::from_millis(1500));
        assert_eq!(config.drain_timeout, Duration::ZERO);
        assert_eq!(config.session_timeout, Duration::from_secs(300));
    }

    #[rstest]
    #[case::not_a_number("SUBRUNNER_POOL_SIZE", "many")]
    #[case::negative("SUBRUNNER_MAX_OUTSTANDING", "-1")]
    #[case::fractional("SUBRUNNER_SESSION_TIMEOUT_MS", "1.5")]
    fn unparsable_values_are_errors(#[case] var: &str, #[case] value: &str) {
        let err = SessionConfig::from_lookup(lookup(&[(var, value)])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var));
    }

    #[rstest]
    #[case::pool("SUBRUNNER_POOL_SIZE", "pool_size")]
    #[case::outstanding("SUBRUNNER_MAX_OUTSTANDING", "max_outstanding")]
    #[case::deadline("SUBRUNNER_MESSAGE_DEADLINE_MS", "message_deadline")]
    #[case::sweep("SUBRUNNER_SWEEP_INTERVAL_MS", "sweep_interval")]
    fn zero_is_rejected(#[case] var: &str, #[case] field: &str) {
        let err = SessionConfig::from_lookup(lookup(&[(var, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Zero(f) if f == field));
    }
}
