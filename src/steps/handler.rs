//! Create, read, update and delete for any step kind
//!
//! Steps have no endpoint of their own. Each operation loads the project's
//! deployment process, changes the step list, and writes the whole process
//! back. Concurrent edits to the same process are last-write-wins.

use crate::api::{ApiError, DeploymentProcess, OctopusApi};
use crate::error::{ApiResultExt, ProviderError};
use crate::schema::ResourceData;

use super::common::ENABLED_FEATURES;
use super::placement::{insert_step, position_of, remove_step, replace_step, Placement};
use super::StepKind;

/// Load a process; `Ok(None)` when the server no longer has it
async fn load_process(
    api: &dyn OctopusApi,
    process_id: &str,
) -> Result<Option<DeploymentProcess>, ProviderError> {
    tracing::debug!(process_id, "Loading deployment process");

    match api.get_deployment_process(process_id).await {
        Ok(process) => Ok(Some(process)),
        Err(ApiError::NotFound { .. }) => Ok(None),
        Err(e) => Err(ProviderError::api(
            format!("error loading deployment process '{}'", process_id),
            e,
        )),
    }
}

async fn save_process(
    api: &dyn OctopusApi,
    process: &DeploymentProcess,
) -> Result<DeploymentProcess, ProviderError> {
    tracing::debug!(
        process_id = %process.id,
        version = process.version,
        steps = process.steps.len(),
        "Updating deployment process"
    );

    api.update_deployment_process(process)
        .await
        .context_with(|| format!("error updating deployment process '{}'", process.id))
}

fn process_id(data: &ResourceData) -> Result<String, ProviderError> {
    data.get_str_ok("deployment_process_id")
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidState("deployment_process_id is not set".to_string()))
}

fn step_id(data: &ResourceData) -> Result<String, ProviderError> {
    data.id()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidState("resource has no id".to_string()))
}

fn mark_gone(data: &mut ResourceData, what: &str) {
    tracing::warn!(id = ?data.id(), "{} no longer exists, removing from state", what);
    data.clear_id();
}

/// Record server-assigned values after a process write
fn apply_saved<K: StepKind>(
    data: &mut ResourceData,
    process: &DeploymentProcess,
    index: usize,
) -> Result<(), ProviderError> {
    let step = process.steps.get(index).ok_or_else(|| {
        ProviderError::InvalidState(format!(
            "deployment process '{}' has no step at position {}",
            process.id, index
        ))
    })?;
    let id = step.id.clone().ok_or_else(|| {
        ProviderError::InvalidState(format!(
            "deployment process '{}' returned step '{}' without an id",
            process.id, step.name
        ))
    })?;

    data.set_id(id);
    data.set("deployment_process_id", process.id.clone());
    data.set(
        "enabled_features",
        step.action_property(ENABLED_FEATURES).unwrap_or(""),
    );
    K::set_schema(data, step);
    Ok(())
}

/// Add the step to its project's deployment process
pub async fn create_step<K: StepKind>(
    api: &dyn OctopusApi,
    data: &mut ResourceData,
) -> Result<(), ProviderError> {
    let project_id = data.get_str("project_id").to_string();

    tracing::info!(project_id = %project_id, resource = K::TYPE_NAME, "Loading project");
    let project = api
        .get_project(&project_id)
        .await
        .context_with(|| format!("error loading project '{}'", project_id))?;

    let mut process = api
        .get_deployment_process(&project.deployment_process_id)
        .await
        .context_with(|| {
            format!(
                "error loading deployment process '{}'",
                project.deployment_process_id
            )
        })?;

    let step = K::build(data)?;
    tracing::debug!(step = ?step, "Built deployment step");

    let placement = Placement::from_data(data);
    let index = insert_step(&mut process.steps, step, &placement);

    let saved = save_process(api, &process).await?;
    apply_saved::<K>(data, &saved, index)?;

    tracing::info!(
        step_id = ?data.id(),
        process_id = %saved.id,
        index,
        "Created deployment step"
    );
    Ok(())
}

/// Refresh state from the server
pub async fn read_step<K: StepKind>(
    api: &dyn OctopusApi,
    data: &mut ResourceData,
) -> Result<(), ProviderError> {
    let step_id = step_id(data)?;
    let process_id = process_id(data)?;

    let Some(process) = load_process(api, &process_id).await? else {
        mark_gone(data, "deployment process");
        return Ok(());
    };
    let Some(index) = position_of(&process.steps, &step_id) else {
        mark_gone(data, "deployment step");
        return Ok(());
    };
    let step = &process.steps[index];
    tracing::debug!(step = ?step, "Read deployment step");

    let by_successor = data.get_str_ok("before_step_id").is_some();
    let tracks_predecessor = !by_successor && data.get_str_ok("after_step_id").is_some();
    let observed = Placement::observed(&process.steps, index, by_successor);

    data.set("first_step", observed.first_step);
    if by_successor {
        match observed.before_step_id {
            Some(id) => data.set("before_step_id", id),
            None => data.remove("before_step_id"),
        }
    } else if tracks_predecessor {
        match observed.after_step_id {
            Some(id) => data.set("after_step_id", id),
            None => data.remove("after_step_id"),
        }
    }

    data.set(
        "enabled_features",
        step.action_property(ENABLED_FEATURES).unwrap_or(""),
    );
    K::set_schema(data, step);
    Ok(())
}

/// Rebuild the step from configuration and place it again
pub async fn update_step<K: StepKind>(
    api: &dyn OctopusApi,
    data: &mut ResourceData,
) -> Result<(), ProviderError> {
    let step_id = step_id(data)?;
    let process_id = process_id(data)?;

    let Some(mut process) = load_process(api, &process_id).await? else {
        mark_gone(data, "deployment process");
        return Ok(());
    };

    let mut step = K::build(data)?;
    step.id = Some(step_id.clone());

    // Edit the stored action in place and keep whatever the portal set on it
    if let Some(existing) = process.step(&step_id) {
        step.extra = existing.extra.clone();
        if let (Some(action), Some(existing_action)) =
            (step.actions.first_mut(), existing.actions.first())
        {
            action.id = existing_action.id.clone();
            action.is_disabled = existing_action.is_disabled;
            action.extra = existing_action.extra.clone();
        }
    }
    tracing::debug!(step = ?step, "Built deployment step");

    let placement = Placement::from_data(data);
    let index = replace_step(&mut process.steps, &step_id, step, &placement);

    let saved = save_process(api, &process).await?;
    apply_saved::<K>(data, &saved, index)?;

    tracing::info!(step_id = %step_id, process_id = %saved.id, index, "Updated deployment step");
    Ok(())
}

/// Remove the step from its deployment process
pub async fn delete_step<K: StepKind>(
    api: &dyn OctopusApi,
    data: &mut ResourceData,
) -> Result<(), ProviderError> {
    let step_id = step_id(data)?;
    let process_id = process_id(data)?;

    let Some(mut process) = load_process(api, &process_id).await? else {
        mark_gone(data, "deployment process");
        return Ok(());
    };

    if remove_step(&mut process.steps, &step_id) {
        save_process(api, &process).await?;
        tracing::info!(step_id = %step_id, process_id = %process_id, "Deleted deployment step");
    } else {
        tracing::debug!(step_id = %step_id, "Step already absent from deployment process");
    }

    data.clear_id();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryApi;
    use crate::steps::{InlineScriptStep, PackageStep};
    use serde_json::{json, Value};

    const PROCESS: &str = "deploymentprocess-Projects-1";

    fn api() -> InMemoryApi {
        let api = InMemoryApi::new();
        api.add_project("Projects-1", "Acme");
        api
    }

    fn script(name: &str, extra: Value) -> ResourceData {
        let mut config = json!({
            "project_id": "Projects-1",
            "step_name": name,
            "run_on_server": true,
            "script_type": "Bash",
            "script_body": format!("echo {}", name)
        });
        if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            config.extend(extra.clone());
        }
        ResourceData::from_config(&InlineScriptStep::schema(), &config).unwrap()
    }

    async fn create(api: &InMemoryApi, name: &str, extra: Value) -> ResourceData {
        let mut data = script(name, extra);
        create_step::<InlineScriptStep>(api, &mut data).await.unwrap();
        data
    }

    fn step_names(api: &InMemoryApi) -> Vec<String> {
        api.process(PROCESS)
            .unwrap()
            .steps
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_create_sets_computed_values() {
        let api = api();
        let data = create(&api, "Notify", json!({})).await;

        let process = api.process(PROCESS).unwrap();
        assert_eq!(data.id(), process.steps[0].id.as_deref());
        assert_eq!(data.get_str("deployment_process_id"), PROCESS);
        assert_eq!(data.get_str("enabled_features"), "");
        assert_eq!(process.version, 2);
    }

    #[tokio::test]
    async fn test_create_unknown_project() {
        let api = InMemoryApi::new();
        let mut data = script("Notify", json!({}));
        let err = create_step::<InlineScriptStep>(&api, &mut data)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("error loading project 'Projects-1'"));
        assert!(err.api_error().is_some_and(ApiError::is_not_found));
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn test_create_with_placement() {
        let api = api();
        let a = create(&api, "a", json!({})).await;
        let c = create(&api, "c", json!({})).await;

        create(&api, "b", json!({ "after_step_id": a.id().unwrap() })).await;
        create(&api, "first", json!({ "first_step": true })).await;
        create(&api, "before-c", json!({ "before_step_id": c.id().unwrap() })).await;

        assert_eq!(step_names(&api), ["first", "a", "b", "before-c", "c"]);
    }

    #[tokio::test]
    async fn test_read_refreshes_position_references() {
        let api = api();
        let a = create(&api, "a", json!({})).await;
        let b = create(&api, "b", json!({})).await;
        let mut c = create(&api, "c", json!({ "before_step_id": b.id().unwrap() })).await;
        let mut d = create(&api, "d", json!({ "after_step_id": a.id().unwrap() })).await;
        // order: a, d, c, b

        read_step::<InlineScriptStep>(&api, &mut c).await.unwrap();
        assert_eq!(c.get_str("before_step_id"), b.id().unwrap());
        assert!(!c.get_bool("first_step"));

        read_step::<InlineScriptStep>(&api, &mut d).await.unwrap();
        assert_eq!(d.get_str("after_step_id"), a.id().unwrap());

        // With c gone, a is still at the head
        let mut c_copy = c.clone();
        delete_step::<InlineScriptStep>(&api, &mut c_copy).await.unwrap();
        let mut a = a;
        read_step::<InlineScriptStep>(&api, &mut a).await.unwrap();
        assert!(a.get_bool("first_step"));
        assert!(a.get("before_step_id").is_none());
        assert!(a.get("after_step_id").is_none());
    }

    #[tokio::test]
    async fn test_read_restores_step_settings() {
        let api = api();
        let mut data = create(&api, "Notify", json!({ "step_condition": "failure" })).await;

        // Someone edits the script in the portal
        let mut process = api.process(PROCESS).unwrap();
        process.steps[0].actions[0]
            .properties
            .insert("Octopus.Action.Script.ScriptBody".to_string(), "echo edited".to_string());
        api.update_deployment_process(&process).await.unwrap();

        read_step::<InlineScriptStep>(&api, &mut data).await.unwrap();
        assert_eq!(data.get_str("script_body"), "echo edited");
        assert_eq!(data.get_str("step_condition"), "failure");
        assert!(data.get_bool("run_on_server"));
    }

    #[tokio::test]
    async fn test_read_missing_step_clears_id() {
        let api = api();
        let mut data = create(&api, "Notify", json!({})).await;

        let mut process = api.process(PROCESS).unwrap();
        process.steps.clear();
        api.update_deployment_process(&process).await.unwrap();

        read_step::<InlineScriptStep>(&api, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn test_missing_process_clears_id() {
        let api = api();
        let data = create(&api, "Notify", json!({})).await;
        api.remove_process(PROCESS);

        let mut read = data.clone();
        read_step::<InlineScriptStep>(&api, &mut read).await.unwrap();
        assert_eq!(read.id(), None);

        let mut update = data.clone();
        update_step::<InlineScriptStep>(&api, &mut update).await.unwrap();
        assert_eq!(update.id(), None);

        let mut delete = data;
        delete_step::<InlineScriptStep>(&api, &mut delete).await.unwrap();
        assert_eq!(delete.id(), None);
    }

    #[tokio::test]
    async fn test_update_keeps_ids_and_moves_step() {
        let api = api();
        let a = create(&api, "a", json!({})).await;
        create(&api, "b", json!({})).await;
        let c = create(&api, "c", json!({})).await;
        let action_id = api.process(PROCESS).unwrap().steps[2].actions[0].id.clone();

        let mut planned = ResourceData::plan(
            &InlineScriptStep::schema(),
            &json!({
                "project_id": "Projects-1",
                "step_name": "c renamed",
                "script_type": "PowerShell",
                "script_body": "Write-Host hi",
                "before_step_id": a.id().unwrap()
            }),
            &c,
        )
        .unwrap();
        update_step::<InlineScriptStep>(&api, &mut planned).await.unwrap();

        assert_eq!(step_names(&api), ["c renamed", "a", "b"]);
        let process = api.process(PROCESS).unwrap();
        assert_eq!(process.steps[0].id.as_deref(), c.id());
        assert_eq!(process.steps[0].actions[0].id, action_id);
        assert_eq!(planned.id(), c.id());
        assert_eq!(planned.get_str("script_type"), "PowerShell");
    }

    #[tokio::test]
    async fn test_update_preserves_unmanaged_step_fields() {
        let api = api();
        let data = create(&api, "Notify", json!({})).await;

        // Scoping and notes set in the portal
        let mut process = api.process(PROCESS).unwrap();
        process.steps[0]
            .extra
            .insert("Notes".to_string(), json!("Talk to ops first"));
        let action = &mut process.steps[0].actions[0];
        action.is_disabled = true;
        action
            .extra
            .insert("Environments".to_string(), json!(["Environments-1"]));
        action
            .extra
            .insert("Channels".to_string(), json!(["Channels-2"]));
        api.update_deployment_process(&process).await.unwrap();

        let mut planned = ResourceData::plan(
            &InlineScriptStep::schema(),
            &json!({
                "project_id": "Projects-1",
                "step_name": "Notify",
                "run_on_server": true,
                "script_type": "Bash",
                "script_body": "echo changed"
            }),
            &data,
        )
        .unwrap();
        update_step::<InlineScriptStep>(&api, &mut planned).await.unwrap();

        let step = &api.process(PROCESS).unwrap().steps[0];
        let action = &step.actions[0];
        assert_eq!(
            step.action_property("Octopus.Action.Script.ScriptBody"),
            Some("echo changed")
        );
        assert_eq!(step.extra.get("Notes"), Some(&json!("Talk to ops first")));
        assert_eq!(action.extra.get("Environments"), Some(&json!(["Environments-1"])));
        assert_eq!(action.extra.get("Channels"), Some(&json!(["Channels-2"])));
        assert!(action.is_disabled);
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_step() {
        let api = api();
        create(&api, "a", json!({})).await;
        let mut b = create(&api, "b", json!({})).await;
        create(&api, "c", json!({})).await;

        delete_step::<InlineScriptStep>(&api, &mut b).await.unwrap();
        assert_eq!(step_names(&api), ["a", "c"]);
        assert_eq!(b.id(), None);
    }

    #[tokio::test]
    async fn test_package_step_lifecycle() {
        let api = api();
        let config = json!({
            "project_id": "Projects-1",
            "step_name": "Deploy",
            "target_roles": ["web"],
            "feed_id": "feeds-builtin",
            "package": "Acme.Web",
            "json_file_variable_replacement": "appsettings.json"
        });
        let mut data = ResourceData::from_config(&PackageStep::schema(), &config).unwrap();
        create_step::<PackageStep>(&api, &mut data).await.unwrap();

        assert_eq!(
            data.get_str("enabled_features"),
            "Octopus.Features.JsonConfigurationVariables,Octopus.Features.ConfigurationTransforms,Octopus.Features.ConfigurationVariables"
        );

        read_step::<PackageStep>(&api, &mut data).await.unwrap();
        assert_eq!(data.get_str("json_file_variable_replacement"), "appsettings.json");
        assert_eq!(data.get_string_list("target_roles"), vec!["web"]);
    }

    #[tokio::test]
    async fn test_state_without_process_id_is_invalid() {
        let api = api();
        let mut data = script("Notify", json!({}));
        data.set_id("step-1");
        let err = read_step::<InlineScriptStep>(&api, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidState(_)));
    }
}
