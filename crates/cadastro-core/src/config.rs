//! Validation settings.
//!
//! Loaded from an optional TOML file, then `CADASTRO_*` environment
//! variables (e.g. `CADASTRO_AGE_MONTH_RULE=calendar`), over built-in
//! defaults.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How elapsed months are counted for age thresholds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgeMonthRule {
    /// floor(elapsed days / 30.44), the rule existing records were validated with
    #[default]
    Legacy,
    /// Whole calendar months, counting a month only once its day-of-month is reached
    Calendar,
}

/// Thresholds used by the document policy, the newborn tracker and search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub age_month_rule: AgeMonthRule,
    /// Age in months from which a CPF is mandatory
    pub cpf_required_from_months: u32,
    /// Patients younger than this (in months) are newborns
    pub newborn_until_months: u32,
    /// Length of the newborn record update window
    pub update_window_days: i64,
    /// Quiet period before a search-as-you-type lookup fires
    pub search_debounce_ms: u64,
    /// Minimum characters before a name search is issued
    pub search_min_chars: usize,
    /// Maximum results per search
    pub search_limit: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            age_month_rule: AgeMonthRule::Legacy,
            cpf_required_from_months: 6,
            newborn_until_months: 12,
            update_window_days: 15,
            search_debounce_ms: 300,
            search_min_chars: 3,
            search_limit: 20,
        }
    }
}

impl ValidationConfig {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("CADASTRO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("failed to read validation settings")?;
        let config: ValidationConfig = settings
            .try_deserialize()
            .context("invalid validation settings")?;
        config.validate()?;

        debug!(?config, "validation settings loaded");
        Ok(config)
    }

    /// Check threshold consistency.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cpf_required_from_months <= self.newborn_until_months,
            "cpf_required_from_months ({}) must not exceed newborn_until_months ({})",
            self.cpf_required_from_months,
            self.newborn_until_months
        );
        ensure!(
            self.update_window_days > 0,
            "update_window_days must be positive"
        );
        ensure!(self.search_limit > 0, "search_limit must be positive");
        Ok(())
    }
}
