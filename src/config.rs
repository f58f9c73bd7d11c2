//! Settings loaded from a TOML file and the environment.
//!
//! ```toml
//! [gas]
//! max_allowed_ppm = 50
//! sustained_limit = "15m"
//! spike_ppm = 200
//!
//! [dispatch]
//! max_batch = 256
//! channel_capacity = 1024
//! ```
//!
//! Every key can also be set through `TWINWATCH__<SECTION>__<KEY>`, for
//! example `TWINWATCH__GAS__SPIKE_PPM=300`. Environment values win over the
//! file.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use twinwatch_core::GasLimits;
use twinwatch_host::DEFAULT_MAX_BATCH;

use crate::duration::{format_duration, parse_duration};

/// Default capacity of the channel between the reader and the dispatcher.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gas: GasSettings,
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasSettings {
    pub max_allowed_ppm: u32,
    /// Duration string, e.g. `"15m"`.
    pub sustained_limit: String,
    pub spike_ppm: u32,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            max_allowed_ppm: GasLimits::DEFAULT_MAX_ALLOWED_PPM,
            sustained_limit: format_duration(GasLimits::DEFAULT_SUSTAINED_LIMIT),
            spike_ppm: GasLimits::DEFAULT_SPIKE_PPM,
        }
    }
}

impl GasSettings {
    /// Convert to reducer limits, checking the combination is usable.
    pub fn limits(&self) -> Result<GasLimits> {
        let limits = GasLimits {
            max_allowed_ppm: self.max_allowed_ppm,
            sustained_limit: parse_duration(&self.sustained_limit)
                .context("invalid gas.sustained_limit")?,
            spike_ppm: self.spike_ppm,
        };
        limits.validate()?;
        Ok(limits)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_batch: usize,
    pub channel_capacity: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix("TWINWATCH"))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(env.separator("__").try_parsing(true))
            .build()
            .context("failed to load configuration")?;

        config
            .try_deserialize()
            .context("failed to parse configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn empty_env() -> Environment {
        Environment::with_prefix("TWINWATCH").source(Some(HashMap::new()))
    }

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::load_with_env(None, empty_env()).unwrap();
        assert_eq!(settings.gas.limits().unwrap(), GasLimits::default());
        assert_eq!(settings.dispatch.max_batch, DEFAULT_MAX_BATCH);
        assert_eq!(settings.dispatch.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[gas]\nsustained_limit = \"15ms\"\nspike_ppm = 500\n\n[dispatch]\nmax_batch = 8"
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(file.path()), empty_env()).unwrap();
        let limits = settings.gas.limits().unwrap();
        assert_eq!(limits.sustained_limit, Duration::from_millis(15));
        assert_eq!(limits.spike_ppm, 500);
        assert_eq!(limits.max_allowed_ppm, 50);
        assert_eq!(settings.dispatch.max_batch, 8);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[gas]\nspike_ppm = 500").unwrap();

        let env = Environment::with_prefix("TWINWATCH").source(Some(HashMap::from([(
            "TWINWATCH__GAS__SPIKE_PPM".to_string(),
            "300".to_string(),
        )])));
        let settings = Settings::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(settings.gas.spike_ppm, 300);
    }

    #[test]
    fn bad_duration_is_reported() {
        let settings = GasSettings {
            sustained_limit: "soon".to_string(),
            ..Default::default()
        };
        let err = settings.limits().unwrap_err();
        assert!(err.to_string().contains("sustained_limit"));
    }

    #[test]
    fn spike_below_limit_is_rejected() {
        let settings = GasSettings {
            spike_ppm: 40,
            ..Default::default()
        };
        assert!(settings.limits().is_err());
    }
}
