//! Offline mode across separate runs
//!
//! Each run loads the saved in-memory server, seeds the configured projects,
//! executes one command and saves the server again, as `--offline` does.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use octoform::api::InMemoryApi;
use octoform::config::Config;
use octoform::state::StateFile;
use octoform::Provider;

const SCRIPT: &str = "octopusdeploy_deployment_step_inline_script";
const FEED: &str = "octopusdeploy_feed";

struct OfflineContext {
    _temp_dir: TempDir,
    config: Config,
    state_dir: PathBuf,
}

impl OfflineContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.offline.store = Some(
            temp_dir
                .path()
                .join("offline.json")
                .to_string_lossy()
                .to_string(),
        );
        config.offline.projects = vec!["Projects-1".to_string()];
        let state_dir = temp_dir.path().join("state");
        Self {
            _temp_dir: temp_dir,
            config,
            state_dir,
        }
    }

    fn state_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }

    /// One CLI invocation: a fresh provider over the saved store
    async fn run<F, Fut, T>(&self, command: F) -> T
    where
        F: FnOnce(Provider) -> Fut,
        Fut: Future<Output = T>,
    {
        let path = self.config.offline_store_path();
        let memory = Arc::new(InMemoryApi::load(&path).unwrap());
        for project_id in &self.config.offline.projects {
            memory.ensure_project(project_id);
        }

        let output = command(Provider::new(memory.clone())).await;
        memory.save(&path).unwrap();
        output
    }
}

fn load(path: &Path, resource_type: &str) -> StateFile {
    StateFile::load_for(path, resource_type).unwrap()
}

#[tokio::test]
async fn test_step_created_in_one_run_is_read_in_the_next() {
    let ctx = OfflineContext::new();
    let state_path = ctx.state_path("notify.json");
    let config = json!({
        "project_id": "Projects-1",
        "step_name": "Notify",
        "run_on_server": true,
        "script_type": "Bash",
        "script_body": "echo ok"
    });

    let created = ctx
        .run(|provider| async move { provider.create(SCRIPT, &config).await.unwrap() })
        .await;
    StateFile::new(SCRIPT, created.clone()).save(&state_path).unwrap();

    let mut state = load(&state_path, SCRIPT);
    let read = ctx
        .run(|provider| async move {
            provider.read(SCRIPT, &mut state.data).await.unwrap();
            state.data
        })
        .await;

    assert_eq!(read.id(), created.id());
    assert_eq!(read.get_str("script_body"), "echo ok");
    assert!(read.get_bool("first_step"));
}

#[tokio::test]
async fn test_feed_lifecycle_across_runs() {
    let ctx = OfflineContext::new();
    let state_path = ctx.state_path("feed.json");
    let config = json!({
        "name": "Internal",
        "feed_uri": "https://nuget.internal.example.com/v3/index.json"
    });

    let created = ctx
        .run(|provider| {
            let config = config.clone();
            async move { provider.create(FEED, &config).await.unwrap() }
        })
        .await;
    StateFile::new(FEED, created).save(&state_path).unwrap();

    let mut changed = config.clone();
    changed["download_attempts"] = json!(2);
    let prior = load(&state_path, FEED).data;
    let updated = ctx
        .run(|provider| async move { provider.update(FEED, &changed, &prior).await.unwrap() })
        .await;
    assert_eq!(updated.id(), Some("Feeds-1"));
    StateFile::new(FEED, updated).save(&state_path).unwrap();

    let mut state = load(&state_path, FEED);
    let read = ctx
        .run(|provider| async move {
            provider.read(FEED, &mut state.data).await.unwrap();
            state.data
        })
        .await;
    assert_eq!(read.id(), Some("Feeds-1"));
    assert_eq!(read.get_i64("download_attempts"), 2);

    let mut doomed = read;
    ctx.run(|provider| async move {
        provider.delete(FEED, &mut doomed).await.unwrap();
    })
    .await;

    let store = InMemoryApi::load(&ctx.config.offline_store_path()).unwrap();
    assert!(store.stored_feed("Feeds-1").is_none());
}
