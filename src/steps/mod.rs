//! Deployment step resources
//!
//! Every step type shares one lifecycle (fetch the whole deployment process,
//! splice the step in or out, push the process back) and differs only in how
//! its configuration maps onto the step's property bag. `StepKind` captures
//! that difference; `StepResource` turns any kind into a `Resource`.

pub mod common;
pub mod handler;
pub mod iis_website;
pub mod inline_script;
pub mod package;
pub mod placement;

use async_trait::async_trait;
use std::marker::PhantomData;

use crate::api::{DeploymentStep, OctopusApi};
use crate::error::ProviderError;
use crate::provider::Resource;
use crate::schema::{ResourceData, Schema};

pub use iis_website::IisWebsiteStep;
pub use inline_script::InlineScriptStep;
pub use package::PackageStep;
pub use placement::Placement;

/// A step type: its schema and its property-bag mapping
pub trait StepKind: Send + Sync + 'static {
    /// Resource type name in configuration
    const TYPE_NAME: &'static str;
    /// Action type understood by the server
    const ACTION_TYPE: &'static str;
    /// Whether the step targets machines by role (otherwise it may run on the server)
    const TARGET_ROLES_REQUIRED: bool;

    fn schema() -> Schema;

    /// Build a new step from validated configuration
    fn build(data: &ResourceData) -> Result<DeploymentStep, ProviderError>;

    /// Refresh configuration from a step read back from the server
    fn set_schema(data: &mut ResourceData, step: &DeploymentStep);
}

/// Adapts a `StepKind` to the generic resource lifecycle
pub struct StepResource<K: StepKind> {
    schema: Schema,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StepKind> StepResource<K> {
    pub fn new() -> Self {
        Self {
            schema: K::schema(),
            _kind: PhantomData,
        }
    }
}

impl<K: StepKind> Default for StepResource<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: StepKind> Resource for StepResource<K> {
    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn create(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        handler::create_step::<K>(api, data).await
    }

    async fn read(&self, api: &dyn OctopusApi, data: &mut ResourceData) -> Result<(), ProviderError> {
        handler::read_step::<K>(api, data).await
    }

    async fn update(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        handler::update_step::<K>(api, data).await
    }

    async fn delete(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        handler::delete_step::<K>(api, data).await
    }
}
