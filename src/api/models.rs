//! Octopus Deploy API resource documents
//!
//! Field names follow the server's PascalCase JSON. Every document keeps the
//! fields it does not model in `extra` so a read-modify-write round trip
//! never drops server data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Flat property bag understood by the server
pub type PropertyBag = BTreeMap<String, String>;

/// A project; only the link to its deployment process matters here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub deployment_process_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The ordered list of steps executed during a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentProcess {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub steps: Vec<DeploymentStep>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentProcess {
    /// Find a step by its server-assigned id
    pub fn step(&self, step_id: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find(|s| s.id.as_deref() == Some(step_id))
    }
}

/// When a step runs relative to the outcome of earlier steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepCondition {
    #[default]
    Success,
    Failure,
    Always,
    Variable,
}

impl StepCondition {
    /// Lower-case spelling used in configuration
    pub fn as_config_str(&self) -> &'static str {
        match self {
            StepCondition::Success => "success",
            StepCondition::Failure => "failure",
            StepCondition::Always => "always",
            StepCondition::Variable => "variable",
        }
    }
}

impl FromStr for StepCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(StepCondition::Success),
            "failure" => Ok(StepCondition::Failure),
            "always" => Ok(StepCondition::Always),
            "variable" => Ok(StepCondition::Variable),
            other => Err(format!("unknown step condition '{}'", other)),
        }
    }
}

/// Whether a step waits for the previous one or runs in parallel with it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStartTrigger {
    #[default]
    StartAfterPrevious,
    StartWithPrevious,
}

impl fmt::Display for StepStartTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStartTrigger::StartAfterPrevious => write!(f, "StartAfterPrevious"),
            StepStartTrigger::StartWithPrevious => write!(f, "StartWithPrevious"),
        }
    }
}

impl FromStr for StepStartTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "StartAfterPrevious" => Ok(StepStartTrigger::StartAfterPrevious),
            "StartWithPrevious" => Ok(StepStartTrigger::StartWithPrevious),
            other => Err(format!("unknown start trigger '{}'", other)),
        }
    }
}

/// A named unit of work within a deployment process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub package_requirement: String,
    #[serde(default)]
    pub condition: StepCondition,
    #[serde(default)]
    pub start_trigger: StepStartTrigger,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub actions: Vec<DeploymentAction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentStep {
    /// Properties of the first action, where step types keep their settings
    pub fn action_properties(&self) -> Option<&PropertyBag> {
        self.actions.first().map(|a| &a.properties)
    }

    /// Look up a property on the first action
    pub fn action_property(&self, key: &str) -> Option<&str> {
        self.action_properties()
            .and_then(|p| p.get(key))
            .map(String::as_str)
    }
}

/// An action carried by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub action_type: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Write-only secret; the server only ever reports whether it is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensitiveValue {
    #[serde(default)]
    pub has_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl SensitiveValue {
    /// A value to send to the server
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            has_value: true,
            new_value: Some(value.into()),
        }
    }
}

/// A package feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Feed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub feed_type: String,
    #[serde(default)]
    pub feed_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SensitiveValue>,
    #[serde(default)]
    pub enhanced_mode: bool,
    #[serde(default)]
    pub download_attempts: i64,
    #[serde(default)]
    pub download_retry_backoff_seconds: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A credential account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub account_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SensitiveValue>,
    #[serde(default)]
    pub tenant_tags: Vec<String>,
    #[serde(default)]
    pub tenanted_deployment_participation: String,
    #[serde(default)]
    pub environment_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
