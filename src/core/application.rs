//! Loan application model

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loan application a pipeline is run against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Identifier assigned by whoever owns applications, 0 when unassigned
    #[serde(default)]
    pub id: i64,
    pub applicant_name: String,
    pub amount: f64,
    pub monthly_income: f64,
    pub declared_debts: f64,
    /// Country code, e.g. "DE"
    pub country: String,
    pub loan_purpose: String,
}

impl Application {
    /// Load an application from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read application {}", path.display()))?;
        let application: Application = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        application.validate()?;
        Ok(application)
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.applicant_name.trim().is_empty() {
            anyhow::bail!("applicant_name must not be empty");
        }
        if self.loan_purpose.trim().is_empty() {
            anyhow::bail!("loan_purpose must not be empty");
        }
        if !(self.amount > 0.0) {
            anyhow::bail!("amount must be greater than 0, got {}", self.amount);
        }
        if !(self.monthly_income > 0.0) {
            anyhow::bail!("monthly_income must be greater than 0, got {}", self.monthly_income);
        }
        if !(self.declared_debts >= 0.0) {
            anyhow::bail!("declared_debts must not be negative, got {}", self.declared_debts);
        }
        let country_len = self.country.chars().count();
        if !(2..=10).contains(&country_len) {
            anyhow::bail!("country must be 2 to 10 characters, got '{}'", self.country);
        }
        Ok(())
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
