//! `octopusdeploy_deployment_step_package`: deploy a package to tentacles

use super::common::{
    add_default_schema, add_package_properties, add_package_schema, build_basic_step,
    set_basic_schema, set_package_schema,
};
use super::StepKind;
use crate::api::DeploymentStep;
use crate::error::ProviderError;
use crate::schema::{ResourceData, Schema};

pub struct PackageStep;

impl StepKind for PackageStep {
    const TYPE_NAME: &'static str = "octopusdeploy_deployment_step_package";
    const ACTION_TYPE: &'static str = "Octopus.TentaclePackage";
    const TARGET_ROLES_REQUIRED: bool = true;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        add_default_schema(&mut schema, Self::TARGET_ROLES_REQUIRED);
        add_package_schema(&mut schema);
        schema
    }

    fn build(data: &ResourceData) -> Result<DeploymentStep, ProviderError> {
        let mut step = build_basic_step(data, Self::ACTION_TYPE)?;
        add_package_properties(data, &mut step);
        Ok(step)
    }

    fn set_schema(data: &mut ResourceData, step: &DeploymentStep) {
        set_basic_schema(data, step, Self::TARGET_ROLES_REQUIRED);
        set_package_schema(data, step);
    }
}
