//! # Run Configuration
//!
//! Settings for a run are layered: command-line flags and `APICHECK_*`
//! environment variables win over the suite file, which wins over the
//! built-in defaults. The merged result is validated once into a
//! [`HarnessConfig`] and then passed around explicitly.

use std::time::Duration;

use reqwest::Url;

use crate::collections::SuiteFile;
use crate::error::ConfigError;
use crate::testing::orchestrator::RunSettings;
use crate::testing::report::{ReportGenerator, VerdictBands};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub delay: Duration,
    pub pass_threshold: f64,
    pub bands: VerdictBands,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            pass_threshold: DEFAULT_THRESHOLD,
            bands: VerdictBands::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|err| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(ConfigError::InvalidThreshold(self.pass_threshold));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.bands.validate()
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            base_url: Some(self.base_url.clone()),
            delay: self.delay,
        }
    }

    pub fn report_generator(&self) -> ReportGenerator {
        ReportGenerator::new(self.pass_threshold, self.bands)
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub delay_ms: Option<u64>,
    pub threshold: Option<f64>,
}

impl ConfigOverrides {
    pub fn resolve(&self, suite: Option<&SuiteFile>) -> Result<HarnessConfig, ConfigError> {
        let defaults = HarnessConfig::default();

        let base_url = self
            .base_url
            .clone()
            .or_else(|| suite.and_then(|file| file.base_url.clone()))
            .unwrap_or(defaults.base_url);
        let timeout = self
            .timeout_secs
            .or_else(|| suite.and_then(|file| file.timeout_secs))
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let delay = self
            .delay_ms
            .or_else(|| suite.and_then(|file| file.delay_ms))
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay);
        let pass_threshold = self
            .threshold
            .or_else(|| suite.and_then(|file| file.pass_threshold))
            .unwrap_or(defaults.pass_threshold);
        let bands = suite
            .and_then(|file| file.verdict_bands)
            .unwrap_or(defaults.bands);

        let config = HarnessConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            delay,
            pass_threshold,
            bands,
        };
        config.validate()?;
        Ok(config)
    }
}
