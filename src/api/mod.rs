//! Octopus Deploy API access
//!
//! This module provides:
//! - The `OctopusApi` trait resource handlers are written against
//! - `OctopusClient`, the reqwest-backed implementation
//! - `InMemoryApi`, a server stand-in for tests and offline runs
//! - Error handling with a not-found sentinel

pub mod client;
pub mod error;
pub mod memory;
pub mod models;

pub use client::OctopusClient;
pub use error::ApiError;
pub use memory::InMemoryApi;
pub use models::{
    Account, DeploymentAction, DeploymentProcess, DeploymentStep, Feed, Project, PropertyBag,
    SensitiveValue, StepCondition, StepStartTrigger,
};

use async_trait::async_trait;

/// Operations against the Octopus server used by the resource handlers
#[async_trait]
pub trait OctopusApi: Send + Sync {
    /// Get the backend name (e.g., "octopus", "memory")
    fn name(&self) -> &str;

    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError>;

    async fn get_deployment_process(&self, process_id: &str)
        -> Result<DeploymentProcess, ApiError>;

    /// Replace the whole deployment process, returning the server's copy
    /// with ids assigned to any new steps and actions
    async fn update_deployment_process(
        &self,
        process: &DeploymentProcess,
    ) -> Result<DeploymentProcess, ApiError>;

    async fn create_feed(&self, feed: &Feed) -> Result<Feed, ApiError>;

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, ApiError>;

    async fn update_feed(&self, feed: &Feed) -> Result<Feed, ApiError>;

    async fn delete_feed(&self, feed_id: &str) -> Result<(), ApiError>;

    async fn create_account(&self, account: &Account) -> Result<Account, ApiError>;

    async fn get_account(&self, account_id: &str) -> Result<Account, ApiError>;

    async fn update_account(&self, account: &Account) -> Result<Account, ApiError>;

    async fn delete_account(&self, account_id: &str) -> Result<(), ApiError>;
}
