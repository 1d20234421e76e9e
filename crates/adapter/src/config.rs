use std::env;
use std::time::Duration;

/// Bot bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// How long to wait for each suggestion.
    pub timeout: Duration,
    /// Extra suggestion requests before the piece is forfeited.
    pub retries: u32,
    pub disabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            retries: 1,
            disabled: false,
        }
    }
}

impl BotConfig {
    /// Create from environment variables
    ///
    /// - `BLOCKSTACK_BOT_TIMEOUT_MS`: suggestion timeout (default 1000)
    /// - `BLOCKSTACK_BOT_RETRIES`: retries before forfeiting (default 1)
    /// - `BLOCKSTACK_BOT_DISABLED`: "1" or "true" disables bots
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = lookup("BLOCKSTACK_BOT_TIMEOUT_MS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);
        let retries = lookup("BLOCKSTACK_BOT_RETRIES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.retries);
        let disabled = lookup("BLOCKSTACK_BOT_DISABLED")
            .map(|v| {
                let v = v.trim();
                v == "1" || v.eq_ignore_ascii_case("true")
            })
            .unwrap_or(false);

        Self {
            timeout,
            retries,
            disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_give_defaults() {
        assert_eq!(BotConfig::from_lookup(|_| None), BotConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = BotConfig::from_lookup(|key| match key {
            "BLOCKSTACK_BOT_TIMEOUT_MS" => Some("250".into()),
            "BLOCKSTACK_BOT_RETRIES" => Some(" 3 ".into()),
            "BLOCKSTACK_BOT_DISABLED" => Some("TRUE".into()),
            _ => None,
        });
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.retries, 3);
        assert!(config.disabled);
    }

    #[test]
    fn garbage_values_fall_back() {
        let config = BotConfig::from_lookup(|_| Some("soon".into()));
        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert_eq!(config.retries, 1);
        assert!(!config.disabled);
    }
}
