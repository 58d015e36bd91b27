//! `octopusdeploy_deployment_step_inline_script`: run a script stored in the step

use super::common::{
    action_properties_mut, add_default_schema, build_basic_step, set_basic_schema, ScriptSyntax,
};
use super::StepKind;
use crate::api::DeploymentStep;
use crate::error::ProviderError;
use crate::schema::{Attribute, ResourceData, Schema};

const SCRIPT_SYNTAX: &str = "Octopus.Action.Script.Syntax";
const SCRIPT_BODY: &str = "Octopus.Action.Script.ScriptBody";
const SCRIPT_SOURCE: &str = "Octopus.Action.Script.ScriptSource";

pub struct InlineScriptStep;

impl StepKind for InlineScriptStep {
    const TYPE_NAME: &'static str = "octopusdeploy_deployment_step_inline_script";
    const ACTION_TYPE: &'static str = "Octopus.Script";
    const TARGET_ROLES_REQUIRED: bool = false;

    fn schema() -> Schema {
        let mut schema = Schema::new()
            .with(
                "script_type",
                Attribute::string()
                    .required()
                    .one_of(ScriptSyntax::NAMES)
                    .description("The scripting language of the deployment step."),
            )
            .with(
                "script_body",
                Attribute::string()
                    .required()
                    .description("The script body."),
            );
        add_default_schema(&mut schema, Self::TARGET_ROLES_REQUIRED);
        schema
    }

    fn build(data: &ResourceData) -> Result<DeploymentStep, ProviderError> {
        let mut step = build_basic_step(data, Self::ACTION_TYPE)?;

        let properties = action_properties_mut(&mut step);
        properties.insert(
            SCRIPT_SYNTAX.to_string(),
            data.get_str("script_type").to_string(),
        );
        properties.insert(
            SCRIPT_BODY.to_string(),
            data.get_str("script_body").to_string(),
        );
        properties.insert(SCRIPT_SOURCE.to_string(), "Inline".to_string());

        Ok(step)
    }

    fn set_schema(data: &mut ResourceData, step: &DeploymentStep) {
        set_basic_schema(data, step, Self::TARGET_ROLES_REQUIRED);

        if let Some(syntax) = step.action_property(SCRIPT_SYNTAX) {
            data.set("script_type", syntax);
        }
        if let Some(body) = step.action_property(SCRIPT_BODY) {
            data.set("script_body", body);
        }
    }
}
