use crate::classifier::ClassifierPolicy;
use crate::config::error::{ConfigError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory by [`ConfigLoader::load_default`].
pub const DEFAULT_CONFIG_FILE: &str = "disclosure.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DISCLOSURE_CONFIG";

/// Root disclosure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosureConfig {
    /// Delays of every armed action
    #[serde(default)]
    pub timing: TimingConfig,

    /// Origin of the scanner iframe; messages from anywhere else are
    /// untrusted. `None` trusts nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_origin: Option<String>,

    /// DOM id of the lead-capture form whose submission triggers the CTA
    #[serde(default = "default_contact_form_id")]
    pub contact_form_id: String,

    /// Show the CTA banner after the contact form is submitted
    #[serde(default = "default_true")]
    pub enable_cta: bool,

    /// Classifier thresholds
    #[serde(default)]
    pub classifier: ClassifierPolicy,

    /// Startup wait for the gateway and scan engine
    #[serde(default)]
    pub attach: AttachConfig,
}

/// Delays, in milliseconds, measured from the signal that arms them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Scan submitted → "analyzing" placeholder
    #[serde(default = "default_analyzing_delay_ms")]
    pub analyzing_delay_ms: u64,

    /// Placeholder → form, added on top of `analyzing_delay_ms`
    #[serde(default = "default_form_after_analyzing_ms")]
    pub form_after_analyzing_ms: u64,

    /// Results received → form
    #[serde(default = "default_results_form_delay_ms")]
    pub results_form_delay_ms: u64,

    /// Trusted iframe message → form
    #[serde(default = "default_message_form_delay_ms")]
    pub message_form_delay_ms: u64,

    /// Scan submitted → forced form if nothing else fired
    #[serde(default = "default_failsafe_ms")]
    pub failsafe_ms: u64,

    /// Contact form submitted → CTA banner
    #[serde(default = "default_cta_after_submit_ms")]
    pub cta_after_submit_ms: u64,
}

/// How long to wait for collaborators at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_attach_timeout_ms")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_contact_form_id() -> String {
    "contactForm".to_string()
}
fn default_true() -> bool {
    true
}
fn default_analyzing_delay_ms() -> u64 {
    5_000
}
fn default_form_after_analyzing_ms() -> u64 {
    2_000
}
fn default_results_form_delay_ms() -> u64 {
    1_000
}
fn default_message_form_delay_ms() -> u64 {
    3_000
}
fn default_failsafe_ms() -> u64 {
    10_000
}
fn default_cta_after_submit_ms() -> u64 {
    3_000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_attach_timeout_ms() -> u64 {
    30_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            analyzing_delay_ms: default_analyzing_delay_ms(),
            form_after_analyzing_ms: default_form_after_analyzing_ms(),
            results_form_delay_ms: default_results_form_delay_ms(),
            message_form_delay_ms: default_message_form_delay_ms(),
            failsafe_ms: default_failsafe_ms(),
            cta_after_submit_ms: default_cta_after_submit_ms(),
        }
    }
}

impl TimingConfig {
    pub fn analyzing_delay(&self) -> Duration {
        Duration::from_millis(self.analyzing_delay_ms)
    }

    /// Absolute delay of the scan-track form step.
    pub fn scan_form_delay(&self) -> Duration {
        Duration::from_millis(
            self.analyzing_delay_ms
                .saturating_add(self.form_after_analyzing_ms),
        )
    }

    pub fn results_form_delay(&self) -> Duration {
        Duration::from_millis(self.results_form_delay_ms)
    }

    pub fn message_form_delay(&self) -> Duration {
        Duration::from_millis(self.message_form_delay_ms)
    }

    pub fn failsafe(&self) -> Duration {
        Duration::from_millis(self.failsafe_ms)
    }

    pub fn cta_after_submit(&self) -> Duration {
        Duration::from_millis(self.cta_after_submit_ms)
    }

    fn named(&self) -> [(&'static str, u64); 6] {
        [
            ("analyzing_delay_ms", self.analyzing_delay_ms),
            ("form_after_analyzing_ms", self.form_after_analyzing_ms),
            ("results_form_delay_ms", self.results_form_delay_ms),
            ("message_form_delay_ms", self.message_form_delay_ms),
            ("failsafe_ms", self.failsafe_ms),
            ("cta_after_submit_ms", self.cta_after_submit_ms),
        ]
    }
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_attach_timeout_ms(),
        }
    }
}

impl AttachConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            trusted_origin: None,
            contact_form_id: default_contact_form_id(),
            enable_cta: default_true(),
            classifier: ClassifierPolicy::default(),
            attach: AttachConfig::default(),
        }
    }
}

impl DisclosureConfig {
    /// Reject values the state machine cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.timing.named() {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "timing.{name} must be greater than zero"
                )));
            }
        }

        if self.timing.failsafe_ms < self.timing.analyzing_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "timing.failsafe_ms ({}) must not be earlier than timing.analyzing_delay_ms ({})",
                self.timing.failsafe_ms, self.timing.analyzing_delay_ms
            )));
        }

        if !(0.0..=100.0).contains(&self.classifier.compliant_score) {
            return Err(ConfigError::ValidationError(format!(
                "classifier.compliant_score must be within 0-100, got {}",
                self.classifier.compliant_score
            )));
        }

        if self.contact_form_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "contact_form_id must not be empty".to_string(),
            ));
        }

        if let Some(origin) = &self.trusted_origin {
            url::Url::parse(origin).map_err(|e| {
                ConfigError::ValidationError(format!("trusted_origin {origin:?} is not a URL: {e}"))
            })?;
        }

        if self.attach.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "attach.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration loader with layered merging support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (DISCLOSURE_ prefix)
    pub fn load(&self) -> Result<DisclosureConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults (serialize defaults to JSON and load as base)
        let defaults_json = serde_json::to_string(&DisclosureConfig::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        // Layer 2: Config file (if provided)
        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Layer 3: Environment variables, double underscore for nesting
        // Example: DISCLOSURE_TIMING__FAILSAFE_MS=8000
        builder = builder.add_source(
            Environment::with_prefix("DISCLOSURE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: DisclosureConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            file = ?self.config_path,
            trusted_origin = ?config.trusted_origin,
            "Disclosure configuration loaded"
        );
        Ok(config)
    }

    /// Load from the default location:
    /// 1. `$DISCLOSURE_CONFIG`, if set
    /// 2. `./disclosure.toml`, if present
    ///
    /// Falls back to defaults plus environment overrides when neither exists.
    pub fn load_default() -> Result<DisclosureConfig> {
        let loader = match Self::find_default_config() {
            Some(path) => Self::new().with_file(path),
            None => Self::new(),
        };
        loader.load()
    }

    fn find_default_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }
}
