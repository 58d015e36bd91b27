//! Acceptance tests against a real Octopus server
//!
//! ## Environment Variables
//!
//! - `OCTOFORM_ACCEPTANCE=true` - Required to run these tests
//! - `OCTOPUS_URL` - Server address
//! - `OCTOPUS_APIKEY` - API key with permission to edit the test project
//! - `OCTOFORM_TEST_PROJECT` - Id of a project whose deployment process may be modified
//!
//! ## Running Tests
//!
//! ```bash
//! OCTOFORM_ACCEPTANCE=true OCTOPUS_URL=https://octopus.example.com \
//!   OCTOPUS_APIKEY=API-XXXX OCTOFORM_TEST_PROJECT=Projects-1 \
//!   cargo test --test acceptance -- --nocapture --test-threads=1
//! ```

use std::env;
use std::sync::Arc;

use serde_json::json;

use octoform::api::OctopusClient;
use octoform::config::Config;
use octoform::Provider;

/// Check if acceptance tests are enabled
fn acceptance_enabled() -> bool {
    env::var("OCTOFORM_ACCEPTANCE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Macro to skip tests if not configured
macro_rules! skip_if_not_configured {
    () => {
        if !acceptance_enabled() {
            eprintln!("Skipping test: OCTOFORM_ACCEPTANCE not set to true");
            return;
        }
    };
}

fn provider() -> Provider {
    let mut config = Config::default();
    config.apply_env_overrides(|name| env::var(name).ok());
    let client = OctopusClient::from_config(&config).expect("OCTOPUS_URL and OCTOPUS_APIKEY must be set");
    Provider::new(Arc::new(client))
}

fn test_project() -> String {
    env::var("OCTOFORM_TEST_PROJECT").expect("OCTOFORM_TEST_PROJECT must be set")
}

#[tokio::test]
async fn test_inline_script_step() {
    skip_if_not_configured!();

    let provider = provider();
    let resource = "octopusdeploy_deployment_step_inline_script";
    let config = json!({
        "project_id": test_project(),
        "step_name": format!("octoform acceptance {}", chrono::Utc::now().timestamp()),
        "run_on_server": true,
        "script_type": "PowerShell",
        "script_body": "Write-Host 'octoform'"
    });

    let mut state = provider.create(resource, &config).await.unwrap();
    assert!(state.id().is_some());

    provider.read(resource, &mut state).await.unwrap();
    assert_eq!(state.get_str("script_body"), "Write-Host 'octoform'");
    assert!(state.get_bool("run_on_server"));

    provider.delete(resource, &mut state).await.unwrap();
    assert!(state.id().is_none());
}

#[tokio::test]
async fn test_feed() {
    skip_if_not_configured!();

    let provider = provider();
    let resource = "octopusdeploy_feed";
    let config = json!({
        "name": format!("octoform acceptance {}", chrono::Utc::now().timestamp()),
        "feed_type": "NuGet",
        "feed_uri": "http://test.com",
        "username": "username",
        "password": "password",
        "enhanced_mode": true
    });

    let mut state = provider.create(resource, &config).await.unwrap();
    provider.read(resource, &mut state).await.unwrap();
    assert_eq!(state.get_str("feed_uri"), "http://test.com");
    assert_eq!(state.get_str("password"), "password");

    provider.delete(resource, &mut state).await.unwrap();
    assert!(state.id().is_none());
}
