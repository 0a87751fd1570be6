//! Pipeline definitions from YAML or JSON files

use crate::core::application::is_json;
use crate::core::PipelineDefinition;
use anyhow::{Context, Result};
use std::path::Path;

impl PipelineDefinition {
    /// Load a definition from a file; `.json` is read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline {}", path.display()))?;
        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse a definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: PipelineDefinition = serde_yaml::from_str(yaml)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Parse a definition from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: PipelineDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the definition back in the format its extension implies
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            self.to_yaml()?
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write pipeline {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{
        condition::{ComparisonOperator, RuleCondition},
        rule::Outcome,
        step::{StepParams, StepType},
        PipelineDefinition,
    };

    const STANDARD: &str = r#"
name: "Standard Loan Check"
description: "DTI, caps and risk"
steps:
  - step_type: dti_rule
    order: 1
    params:
      max_dti: 0.4
  - step_type: amount_policy
    order: 2
    params:
      DE: 35000
      ES: 30000
      OTHER: 20000
  - step_type: risk_scoring
    order: 3
terminal_rules:
  - order: 1
    condition:
      type: step_failed
      step_types: [dti_rule, amount_policy]
    outcome: REJECTED
  - order: 2
    condition:
      type: risk_threshold
      operator: "<="
      value: 45
    outcome: APPROVED
  - order: 3
    condition:
      type: default
    outcome: NEEDS_REVIEW
"#;

    #[test]
    fn test_parse_yaml_definition() {
        let def = PipelineDefinition::from_yaml(STANDARD).unwrap();

        assert_eq!(def.name, "Standard Loan Check");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.steps[2].step_type(), StepType::RiskScoring);
        assert_eq!(def.steps[2].params, StepParams::defaults_for(StepType::RiskScoring));

        match &def.steps[1].params {
            StepParams::AmountPolicy(p) => {
                assert_eq!(p.caps.get("DE"), Some(&35000.0));
                assert_eq!(p.caps.len(), 3);
            }
            other => panic!("Expected amount policy params, got {:?}", other),
        }

        assert_eq!(
            def.terminal_rules[1].condition,
            RuleCondition::risk_threshold(ComparisonOperator::LessOrEqual, 45.0)
        );
        assert_eq!(def.terminal_rules[2].outcome, Outcome::NeedsReview);
        assert!(def.check_executable().is_ok());
    }

    #[test]
    fn test_duplicate_orders_fail_to_load() {
        let yaml = r#"
name: "Broken"
steps:
  - step_type: dti_rule
    order: 1
  - step_type: amount_policy
    order: 1
"#;
        let err = PipelineDefinition::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("appears more than once"), "{}", err);
    }

    #[test]
    fn test_unknown_step_type_fails_to_load() {
        let yaml = r#"
name: "Broken"
steps:
  - step_type: credit_bureau
    order: 1
"#;
        assert!(PipelineDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_file_round_trip_yaml_and_json() {
        let def = PipelineDefinition::from_yaml(STANDARD).unwrap();
        let dir = tempfile::tempdir().unwrap();

        for name in ["pipeline.yaml", "pipeline.json"] {
            let path = dir.path().join(name);
            def.write_file(&path).unwrap();
            let loaded = PipelineDefinition::from_file(&path).unwrap();
            assert_eq!(loaded, def, "round trip through {}", name);
        }
    }
}
