//! In-memory stand-in for an Octopus server
//!
//! Behaves like the server for the calls the handlers make: it assigns ids to
//! new steps, actions, feeds and accounts, bumps the process version on every
//! write, hides secrets on read, and answers `NotFound` for unknown ids.
//! The whole store can be saved to a JSON file and loaded again, which is how
//! the CLI's offline mode keeps resources between runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::ApiError;
use super::models::{Account, DeploymentProcess, Feed, Project, SensitiveValue};
use super::OctopusApi;

const BACKEND_NAME: &str = "memory";

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct Store {
    projects: HashMap<String, Project>,
    processes: HashMap<String, DeploymentProcess>,
    feeds: HashMap<String, Feed>,
    accounts: HashMap<String, Account>,
    next_feed: u64,
    next_account: u64,
}

/// Thread-safe in-memory server
#[derive(Default)]
pub struct InMemoryApi {
    store: Mutex<Store>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a saved store; a missing file gives an empty server
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read offline store {}", path.display()))?;
        let store: Store = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse offline store {}", path.display()))?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Write the whole store, secrets included
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create offline store directory")?;
        }
        let contents = serde_json::to_string_pretty(&*self.store())?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write offline store {}", path.display()))
    }

    /// Register a project unless it already exists; its process is left alone
    pub fn ensure_project(&self, project_id: &str) -> Project {
        if let Some(project) = self.store().projects.get(project_id) {
            return project.clone();
        }
        self.add_project(project_id, project_id)
    }

    /// Register a project with an empty deployment process
    pub fn add_project(&self, project_id: &str, name: &str) -> Project {
        let process_id = format!("deploymentprocess-{}", project_id);
        let project = Project {
            id: project_id.to_string(),
            name: name.to_string(),
            deployment_process_id: process_id.clone(),
            ..Default::default()
        };

        let mut store = self.store();
        store.projects.insert(project.id.clone(), project.clone());
        store.processes.insert(
            process_id.clone(),
            DeploymentProcess {
                id: process_id,
                project_id: project_id.to_string(),
                version: 1,
                ..Default::default()
            },
        );
        project
    }

    /// Snapshot of a stored deployment process
    pub fn process(&self, process_id: &str) -> Option<DeploymentProcess> {
        self.store().processes.get(process_id).cloned()
    }

    /// Delete a deployment process, as happens when its project is deleted
    pub fn remove_process(&self, process_id: &str) {
        self.store().processes.remove(process_id);
    }

    /// Snapshot of a stored feed, including its secret
    pub fn stored_feed(&self, feed_id: &str) -> Option<Feed> {
        self.store().feeds.get(feed_id).cloned()
    }

    /// Snapshot of a stored account, including its secrets
    pub fn stored_account(&self, account_id: &str) -> Option<Account> {
        self.store().accounts.get(account_id).cloned()
    }
}

fn redact(secret: Option<SensitiveValue>) -> Option<SensitiveValue> {
    secret.map(|s| SensitiveValue {
        has_value: s.has_value,
        new_value: None,
    })
}

/// Keep the stored secret when a write carries no new value
fn merge_secret(
    incoming: Option<SensitiveValue>,
    stored: Option<&SensitiveValue>,
) -> Option<SensitiveValue> {
    match incoming {
        Some(SensitiveValue {
            new_value: Some(value),
            ..
        }) => Some(SensitiveValue::new(value)),
        _ => stored.cloned(),
    }
}

fn redact_feed(mut feed: Feed) -> Feed {
    feed.password = redact(feed.password);
    feed
}

fn redact_account(mut account: Account) -> Account {
    account.password = redact(account.password);
    account
}

#[async_trait]
impl OctopusApi for InMemoryApi {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.store()
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("projects/{}", project_id)))
    }

    async fn get_deployment_process(
        &self,
        process_id: &str,
    ) -> Result<DeploymentProcess, ApiError> {
        self.process(process_id)
            .ok_or_else(|| ApiError::not_found(format!("deploymentprocesses/{}", process_id)))
    }

    async fn update_deployment_process(
        &self,
        process: &DeploymentProcess,
    ) -> Result<DeploymentProcess, ApiError> {
        let mut store = self.store();
        let stored = store
            .processes
            .get_mut(&process.id)
            .ok_or_else(|| ApiError::not_found(format!("deploymentprocesses/{}", process.id)))?;

        let mut updated = process.clone();
        for step in &mut updated.steps {
            step.id
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
            for action in &mut step.actions {
                action
                    .id
                    .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
            }
        }
        updated.version = stored.version + 1;

        *stored = updated.clone();
        Ok(updated)
    }

    async fn create_feed(&self, feed: &Feed) -> Result<Feed, ApiError> {
        let mut store = self.store();
        if store.feeds.values().any(|f| f.name == feed.name) {
            return Err(ApiError::validation(
                400,
                "There was a problem with your request.",
                vec![format!("A feed with the name '{}' already exists", feed.name)],
            ));
        }

        store.next_feed += 1;
        let mut created = feed.clone();
        created.id = Some(format!("Feeds-{}", store.next_feed));
        created.password = merge_secret(feed.password.clone(), None);

        let id = created.id.clone().unwrap_or_default();
        store.feeds.insert(id, created.clone());
        Ok(redact_feed(created))
    }

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, ApiError> {
        self.store()
            .feeds
            .get(feed_id)
            .cloned()
            .map(redact_feed)
            .ok_or_else(|| ApiError::not_found(format!("feeds/{}", feed_id)))
    }

    async fn update_feed(&self, feed: &Feed) -> Result<Feed, ApiError> {
        let id = feed.id.clone().unwrap_or_default();
        let mut store = self.store();
        let stored = store
            .feeds
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found(format!("feeds/{}", id)))?;

        let mut updated = feed.clone();
        updated.password = merge_secret(feed.password.clone(), stored.password.as_ref());
        *stored = updated.clone();
        Ok(redact_feed(updated))
    }

    async fn delete_feed(&self, feed_id: &str) -> Result<(), ApiError> {
        self.store()
            .feeds
            .remove(feed_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("feeds/{}", feed_id)))
    }

    async fn create_account(&self, account: &Account) -> Result<Account, ApiError> {
        let mut store = self.store();
        store.next_account += 1;

        let mut created = account.clone();
        created.id = Some(format!("Accounts-{}", store.next_account));
        created.password = merge_secret(account.password.clone(), None);

        let id = created.id.clone().unwrap_or_default();
        store.accounts.insert(id, created.clone());
        Ok(redact_account(created))
    }

    async fn get_account(&self, account_id: &str) -> Result<Account, ApiError> {
        self.store()
            .accounts
            .get(account_id)
            .cloned()
            .map(redact_account)
            .ok_or_else(|| ApiError::not_found(format!("accounts/{}", account_id)))
    }

    async fn update_account(&self, account: &Account) -> Result<Account, ApiError> {
        let id = account.id.clone().unwrap_or_default();
        let mut store = self.store();
        let stored = store
            .accounts
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found(format!("accounts/{}", id)))?;

        let mut updated = account.clone();
        updated.password = merge_secret(account.password.clone(), stored.password.as_ref());
        *stored = updated.clone();
        Ok(redact_account(updated))
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), ApiError> {
        self.store()
            .accounts
            .remove(account_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("accounts/{}", account_id)))
    }
}
