use crate::fetcher::BatchLimits;
use crate::geometry::{DEFAULT_REFERENCE_LATITUDE, DEFAULT_REFERENCE_LONGITUDE, PlanarProjection};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api-v3.mbta.com";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub api_key: Option<String>,
    pub refresh_interval: Duration,
    pub prediction_interval: Duration,
    /// How old a report, and how far off a prediction, must be before a
    /// vehicle's position is estimated.
    pub position_time_tolerance: Duration,
    /// Age at which a vehicle marker has faded out completely.
    pub timestamp_fade: Duration,
    pub batch_limits: BatchLimits,
    pub reference_latitude: f64,
    pub reference_longitude: f64,
    pub settings_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            refresh_interval: Duration::from_secs(5),
            prediction_interval: Duration::from_secs(2),
            position_time_tolerance: Duration::from_secs(10),
            timestamp_fade: Duration::from_secs(120),
            batch_limits: BatchLimits::default(),
            reference_latitude: DEFAULT_REFERENCE_LATITUDE,
            reference_longitude: DEFAULT_REFERENCE_LONGITUDE,
            settings_path: PathBuf::from("transit_layers_settings.json"),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a variable lookup, keeping defaults for unset or
    /// unparsable variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(api_base) = lookup("TRANSIT_API_BASE").filter(|v| !v.is_empty()) {
            config.api_base = api_base;
        }

        config.api_key = lookup("TRANSIT_API_KEY").filter(|v| !v.is_empty());

        if let Some(secs) = parse_secs(&lookup, "TRANSIT_REFRESH_SECS") {
            config.refresh_interval = secs;
        }

        if let Some(secs) = parse_secs(&lookup, "TRANSIT_PREDICTION_SECS") {
            config.prediction_interval = secs;
        }

        if let Some(path) = lookup("TRANSIT_SETTINGS_PATH").filter(|v| !v.is_empty()) {
            config.settings_path = PathBuf::from(path);
        }

        config
    }

    pub fn projection(&self) -> PlanarProjection {
        PlanarProjection::new(self.reference_latitude, self.reference_longitude)
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let value = lookup(key)?;
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            warn!("{} is not a positive number of seconds: '{}'", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.batch_limits.stops, 50);
        assert_eq!(config.batch_limits.routes, 5);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TRANSIT_API_BASE", "http://localhost:4000"),
            ("TRANSIT_API_KEY", "secret"),
            ("TRANSIT_REFRESH_SECS", "15"),
            ("TRANSIT_PREDICTION_SECS", "zero"),
        ]);

        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_base, "http://localhost:4000");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert_eq!(config.prediction_interval, Duration::from_secs(2));
    }
}
