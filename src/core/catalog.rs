//! Step catalog: display metadata, defaults and parameter schema per step type

use crate::core::step::{AmountPolicyParams, StepParams, StepType};
use serde::Serialize;

/// How a parameter is edited and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Number,
    Keywords,
}

/// One field of a step type's parameter schema
#[derive(Debug, Clone, Serialize)]
pub struct ParamField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

/// Everything the builder and editors need to know about a step type
#[derive(Debug, Clone, Serialize)]
pub struct StepDefinition {
    pub step_type: StepType,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(serialize_with = "serialize_params")]
    pub default_params: StepParams,
    pub param_schema: Vec<ParamField>,
    /// Kind of any further top-level keys the params accept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_params: Option<ParamKind>,
}

fn serialize_params<S: serde::Serializer>(params: &StepParams, s: S) -> Result<S::Ok, S::Error> {
    params.to_value().serialize(s)
}

/// Look up the catalog entry for a step type
pub fn step_definition(step_type: StepType) -> StepDefinition {
    let default_params = StepParams::defaults_for(step_type);
    match step_type {
        StepType::DtiRule => StepDefinition {
            step_type,
            name: "DTI Rule",
            description: "Debt-to-Income ratio validation",
            default_params,
            param_schema: vec![ParamField {
                name: "max_dti",
                label: "Maximum DTI",
                kind: ParamKind::Number,
                required: true,
                description: "Maximum allowed debt-to-income ratio (0.0 - 1.0)",
            }],
            additional_params: None,
        },
        StepType::AmountPolicy => StepDefinition {
            step_type,
            name: "Amount Policy",
            description: "Country-specific loan amount caps",
            default_params,
            param_schema: country_cap_fields(),
            additional_params: Some(ParamKind::Number),
        },
        StepType::RiskScoring => StepDefinition {
            step_type,
            name: "Risk Scoring",
            description: "Calculate risk score based on DTI and amount",
            default_params,
            param_schema: vec![ParamField {
                name: "approve_threshold",
                label: "Approve Threshold",
                kind: ParamKind::Number,
                required: true,
                description: "Maximum risk score for auto-approval",
            }],
            additional_params: None,
        },
        StepType::SentimentCheck => StepDefinition {
            step_type,
            name: "Sentiment Check",
            description: "Loan purpose screening against risky keywords",
            default_params,
            param_schema: vec![ParamField {
                name: "risky_keywords",
                label: "Risky Keywords",
                kind: ParamKind::Keywords,
                required: true,
                description: "Keywords that indicate risky loan purposes",
            }],
            additional_params: None,
        },
    }
}

/// Amount caps travel as a flat `{ COUNTRY: cap }` map; the known
/// countries are listed, other country codes are accepted as extra keys
fn country_cap_fields() -> Vec<ParamField> {
    const COUNTRIES: [(&str, &str); 4] = [
        ("DE", "Germany"),
        ("ES", "Spain"),
        ("FR", "France"),
        (AmountPolicyParams::FALLBACK_KEY, "Other countries"),
    ];
    COUNTRIES
        .into_iter()
        .map(|(code, label)| ParamField {
            name: code,
            label,
            kind: ParamKind::Number,
            required: false,
            description: if code == AmountPolicyParams::FALLBACK_KEY {
                "Cap for countries without their own entry"
            } else {
                "Maximum loan amount"
            },
        })
        .collect()
}

/// Every registered step type, in catalog order
pub fn all_step_types() -> Vec<StepType> {
    StepType::ALL.to_vec()
}
