//! Resource registry
//!
//! The provider owns the API backend and every registered resource type.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::OctopusApi;
use crate::error::ProviderError;
use crate::resources::{AccountResource, FeedResource};
use crate::schema::{ResourceData, Schema};
use crate::steps::{IisWebsiteStep, InlineScriptStep, PackageStep, StepResource};

/// Lifecycle of one resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in configuration (e.g. "octopusdeploy_feed")
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> &Schema;

    /// Create the remote object and record its id
    async fn create(&self, api: &dyn OctopusApi, data: &mut ResourceData)
        -> Result<(), ProviderError>;

    /// Refresh state; clears the id when the remote object is gone
    async fn read(&self, api: &dyn OctopusApi, data: &mut ResourceData) -> Result<(), ProviderError>;

    async fn update(&self, api: &dyn OctopusApi, data: &mut ResourceData)
        -> Result<(), ProviderError>;

    /// Delete the remote object and clear the id
    async fn delete(&self, api: &dyn OctopusApi, data: &mut ResourceData)
        -> Result<(), ProviderError>;
}

pub struct Provider {
    api: Arc<dyn OctopusApi>,
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl Provider {
    /// A provider with every built-in resource type registered
    pub fn new(api: Arc<dyn OctopusApi>) -> Self {
        let mut provider = Self {
            api,
            resources: BTreeMap::new(),
        };
        provider.register(Box::new(StepResource::<IisWebsiteStep>::new()));
        provider.register(Box::new(StepResource::<PackageStep>::new()));
        provider.register(Box::new(StepResource::<InlineScriptStep>::new()));
        provider.register(Box::new(FeedResource::new()));
        provider.register(Box::new(AccountResource::new()));
        provider
    }

    pub fn register(&mut self, resource: Box<dyn Resource>) {
        self.resources.insert(resource.type_name(), resource);
    }

    pub fn api(&self) -> &dyn OctopusApi {
        self.api.as_ref()
    }

    pub fn resource(&self, type_name: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Registered type names, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    /// Every schema keyed by type name
    pub fn schemas(&self) -> BTreeMap<&'static str, &Schema> {
        self.resources
            .iter()
            .map(|(name, resource)| (*name, resource.schema()))
            .collect()
    }

    /// Validate `config` and create a resource of `type_name`
    pub async fn create(
        &self,
        type_name: &str,
        config: &serde_json::Value,
    ) -> Result<ResourceData, ProviderError> {
        let resource = self.resource(type_name)?;
        let mut data = ResourceData::from_config(resource.schema(), config)?;
        resource.create(self.api(), &mut data).await?;
        Ok(data)
    }

    pub async fn read(
        &self,
        type_name: &str,
        state: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        self.resource(type_name)?.read(self.api(), state).await
    }

    /// Apply new configuration to an existing resource
    ///
    /// Refuses changes to attributes that can only be set at creation.
    pub async fn update(
        &self,
        type_name: &str,
        config: &serde_json::Value,
        prior: &ResourceData,
    ) -> Result<ResourceData, ProviderError> {
        let resource = self.resource(type_name)?;
        let mut planned = ResourceData::plan(resource.schema(), config, prior)?;

        let replaced = resource.schema().force_new_changes(prior, &planned);
        if !replaced.is_empty() {
            return Err(ProviderError::RequiresReplacement(replaced));
        }

        resource.update(self.api(), &mut planned).await?;
        Ok(planned)
    }

    pub async fn delete(
        &self,
        type_name: &str,
        state: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        self.resource(type_name)?.delete(self.api(), state).await
    }
}
