use std::path::Path;

use rel_fabric::FabricConfig;
use rel_store::SyncMode;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::LoanType;

/// Amount and term bounds for one loan product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanLimits {
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_term_months: u32,
    pub max_term_months: u32,
}

impl LoanLimits {
    const fn new(min_amount: f64, max_amount: f64, min_term_months: u32, max_term_months: u32) -> Self {
        Self {
            min_amount,
            max_amount,
            min_term_months,
            max_term_months,
        }
    }
}

/// Per-product loan limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanProducts {
    pub mortgage: LoanLimits,
    pub personal: LoanLimits,
    pub auto: LoanLimits,
    pub business: LoanLimits,
}

impl LoanProducts {
    pub fn limits(&self, loan_type: LoanType) -> &LoanLimits {
        match loan_type {
            LoanType::Mortgage => &self.mortgage,
            LoanType::Personal => &self.personal,
            LoanType::Auto => &self.auto,
            LoanType::Business => &self.business,
        }
    }
}

impl Default for LoanProducts {
    fn default() -> Self {
        Self {
            mortgage: LoanLimits::new(10_000.0, 5_000_000.0, 60, 360),
            personal: LoanLimits::new(1_000.0, 100_000.0, 6, 84),
            auto: LoanLimits::new(5_000.0, 150_000.0, 12, 96),
            business: LoanLimits::new(10_000.0, 10_000_000.0, 12, 300),
        }
    }
}

/// Write-ahead log settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sync_mode: SyncMode,
}

/// Engine configuration, loadable from TOML.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node identifier stamped into history IDs.
    pub node_id: u16,
    /// Highest interest rate (percent per year) an approval may carry.
    pub max_interest_rate: f64,
    /// AML risk scores at or above this value flag the case (0-100).
    pub aml_risk_threshold: f64,
    /// Youngest age, in years, at which a customer may be onboarded.
    pub min_customer_age: u32,
    pub loans: LoanProducts,
    pub events: FabricConfig,
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            max_interest_rate: 25.0,
            aml_risk_threshold: 70.0,
            min_customer_age: 18,
            loans: LoanProducts::default(),
            events: FabricConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |message: String| Err(EngineError::Config(message));

        for loan_type in LoanType::ALL {
            let limits = self.loans.limits(loan_type);
            if !(limits.min_amount > 0.0 && limits.min_amount <= limits.max_amount) {
                return invalid(format!(
                    "{loan_type} amount bounds must satisfy 0 < min <= max, got {}..{}",
                    limits.min_amount, limits.max_amount
                ));
            }
            if limits.min_term_months == 0 || limits.min_term_months > limits.max_term_months {
                return invalid(format!(
                    "{loan_type} term bounds must satisfy 0 < min <= max, got {}..{}",
                    limits.min_term_months, limits.max_term_months
                ));
            }
        }
        if !(self.max_interest_rate > 0.0 && self.max_interest_rate <= 100.0) {
            return invalid(format!(
                "max_interest_rate must be in (0, 100], got {}",
                self.max_interest_rate
            ));
        }
        if !(0.0..=100.0).contains(&self.aml_risk_threshold) {
            return invalid(format!(
                "aml_risk_threshold must be in [0, 100], got {}",
                self.aml_risk_threshold
            ));
        }
        if self.events.channel_capacity == 0 {
            return invalid("events.channel_capacity must be positive".into());
        }
        if self.events.max_payload_bytes == 0 {
            return invalid("events.max_payload_bytes must be positive".into());
        }
        Ok(())
    }
}
