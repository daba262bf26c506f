use std::path::Path;

use superhelfer_core::Tier;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Like [`Config::load`], but a missing file yields the built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Self::default())
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_tiers()?;
        self.validate_analyzer()?;
        self.validate_monitor()?;
        self.validate_session()?;
        self.validate_calibration()?;
        Ok(())
    }

    /// Tiers must get strictly more expensive from fast to heavy
    fn validate_tiers(&self) -> anyhow::Result<()> {
        for tier in Tier::ALL {
            let config = self.tiers.get(tier);

            if config.model.trim().is_empty() {
                anyhow::bail!("tiers.{tier}.model must not be empty");
            }

            if config.timeout.is_zero() {
                anyhow::bail!("tiers.{tier}.timeout must be greater than 0");
            }

            if let Some(cheaper) = tier.cheaper() {
                let lower = self.tiers.get(cheaper);
                if lower.footprint_mb >= config.footprint_mb {
                    anyhow::bail!(
                        "tiers.{tier}.footprint_mb ({}) must exceed tiers.{cheaper}.footprint_mb ({})",
                        config.footprint_mb,
                        lower.footprint_mb
                    );
                }
            }
        }

        if self.lifecycle.sweep_interval.is_zero() {
            anyhow::bail!("lifecycle.sweep_interval must be greater than 0");
        }

        Ok(())
    }

    fn validate_analyzer(&self) -> anyhow::Result<()> {
        let analyzer = &self.analyzer;

        for (name, value) in [
            ("override_threshold", analyzer.override_threshold),
            ("heavy_bonus_threshold", analyzer.heavy_bonus_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("analyzer.{name} must be within [0, 1], got {value}");
            }
        }

        for (name, value) in analyzer.weights.values() {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("analyzer.weights.{name} must be a non-negative number, got {value}");
            }
        }

        if analyzer.weights.token_saturation == 0 {
            anyhow::bail!("analyzer.weights.token_saturation must be greater than 0");
        }

        Ok(())
    }

    fn validate_monitor(&self) -> anyhow::Result<()> {
        let threshold = self.monitor.warning_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("monitor.warning_threshold must be within (0, 1], got {threshold}");
        }

        if let crate::ReporterConfig::Static { total_mb, used_mb } = self.monitor.reporter
            && used_mb > total_mb
        {
            anyhow::bail!("monitor.reporter used_mb ({used_mb}) exceeds total_mb ({total_mb})");
        }

        Ok(())
    }

    fn validate_session(&self) -> anyhow::Result<()> {
        if self.session.ttl.is_zero() || self.session.sweep_interval.is_zero() {
            anyhow::bail!("session.ttl and session.sweep_interval must be greater than 0");
        }

        if self.session.max_turns == 0 {
            anyhow::bail!("session.max_turns must be greater than 0");
        }

        Ok(())
    }

    fn validate_calibration(&self) -> anyhow::Result<()> {
        let calibration = &self.calibration;

        if calibration.batch_size == 0 {
            anyhow::bail!("calibration.batch_size must be greater than 0");
        }

        if calibration.rolling_window == 0 {
            anyhow::bail!("calibration.rolling_window must be greater than 0");
        }

        if calibration.interval.is_zero() {
            anyhow::bail!("calibration.interval must be greater than 0");
        }

        let fraction = calibration.hard_negative_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            anyhow::bail!("calibration.hard_negative_fraction must be within [0, 1], got {fraction}");
        }

        // A perfect cycle must be the only way to reach a cost score of 100
        for (name, cost) in calibration.costs.entries() {
            if !cost.is_finite() || cost <= 0.0 {
                anyhow::bail!("calibration.costs.{name} must be greater than 0, got {cost}");
            }
        }

        Ok(())
    }
}
