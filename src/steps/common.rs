//! Schema, builders and setters shared by every step type
//!
//! Builders map configuration onto the property bag of a step's first
//! action; setters do the reverse on read.

use serde_json::{json, Map, Value};

use crate::api::{DeploymentAction, DeploymentStep, PropertyBag, StepCondition, StepStartTrigger};
use crate::error::ProviderError;
use crate::schema::{block_bool, block_str, Attribute, ResourceData, Schema};

pub const ENABLED_FEATURES: &str = "Octopus.Action.EnabledFeatures";
pub const TARGET_ROLES: &str = "Octopus.Action.TargetRoles";
pub const RUN_ON_SERVER: &str = "Octopus.Action.RunOnServer";

const PACKAGE_DOWNLOAD_ON_TENTACLE: &str = "Octopus.Action.Package.DownloadOnTentacle";
const PACKAGE_FEED_ID: &str = "Octopus.Action.Package.FeedId";
const PACKAGE_ID: &str = "Octopus.Action.Package.PackageId";
const JSON_VARIABLES_TARGETS: &str = "Octopus.Action.Package.JsonConfigurationVariablesTargets";
const JSON_VARIABLES_ENABLED: &str = "Octopus.Action.Package.JsonConfigurationVariablesEnabled";
const SUBSTITUTE_TARGETS: &str = "Octopus.Action.SubstituteInFiles.TargetFiles";
const SUBSTITUTE_ENABLED: &str = "Octopus.Action.SubstituteInFiles.Enabled";
const CONFIGURATION_TRANSFORMS: &str =
    "Octopus.Action.Package.AutomaticallyRunConfigurationTransformationFiles";
const CONFIGURATION_VARIABLES: &str =
    "Octopus.Action.Package.AutomaticallyUpdateAppSettingsAndConnectionStrings";
const START_APP_POOL: &str = "Octopus.Action.IISWebSite.StartApplicationPool";

pub const FEATURE_CUSTOM_SCRIPTS: &str = "Octopus.Features.CustomScripts";
pub const FEATURE_JSON_VARIABLES: &str = "Octopus.Features.JsonConfigurationVariables";
pub const FEATURE_SUBSTITUTE_IN_FILES: &str = "Octopus.Features.SubstituteInFiles";
pub const FEATURE_CONFIGURATION_TRANSFORMS: &str = "Octopus.Features.ConfigurationTransforms";
pub const FEATURE_CONFIGURATION_VARIABLES: &str = "Octopus.Features.ConfigurationVariables";

/// Server spelling of booleans
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Case-insensitive boolean parse
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Properties of the step's first action, creating the action if needed
pub fn action_properties_mut(step: &mut DeploymentStep) -> &mut PropertyBag {
    if step.actions.is_empty() {
        step.actions.push(DeploymentAction {
            name: step.name.clone(),
            ..Default::default()
        });
    }
    &mut step.actions[0].properties
}

/// Add a feature to the comma-separated enabled features list
pub fn enable_feature(properties: &mut PropertyBag, feature: &str) {
    let current = properties.get(ENABLED_FEATURES).map(String::as_str).unwrap_or("");
    let mut features: Vec<&str> = current
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    if !features.contains(&feature) {
        features.push(feature);
    }

    let joined = features.join(",");
    properties.insert(ENABLED_FEATURES.to_string(), joined);
}

// ─── Scripts ─────────────────────────────────────────────────────────────────

/// Languages a custom script can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSyntax {
    PowerShell,
    CSharp,
    Bash,
    FSharp,
}

impl ScriptSyntax {
    pub const NAMES: &'static [&'static str] = &["PowerShell", "CSharp", "Bash", "FSharp"];

    pub fn all() -> [ScriptSyntax; 4] {
        [
            ScriptSyntax::PowerShell,
            ScriptSyntax::CSharp,
            ScriptSyntax::Bash,
            ScriptSyntax::FSharp,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptSyntax::PowerShell => "PowerShell",
            ScriptSyntax::CSharp => "CSharp",
            ScriptSyntax::Bash => "Bash",
            ScriptSyntax::FSharp => "FSharp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|s| s.name() == name)
    }

    /// File extension the server keys script bodies by
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptSyntax::PowerShell => "ps1",
            ScriptSyntax::CSharp => "csx",
            ScriptSyntax::Bash => "sh",
            ScriptSyntax::FSharp => "fsx",
        }
    }
}

/// Package deployment phases that accept a custom script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStage {
    PreDeploy,
    Deploy,
    PostDeploy,
}

impl ScriptStage {
    pub fn all() -> [ScriptStage; 3] {
        [
            ScriptStage::PreDeploy,
            ScriptStage::Deploy,
            ScriptStage::PostDeploy,
        ]
    }

    /// Configuration attribute holding the script block
    pub fn attribute(&self) -> &'static str {
        match self {
            ScriptStage::PreDeploy => "pre_deploy_script",
            ScriptStage::Deploy => "deploy_script",
            ScriptStage::PostDeploy => "post_deploy_script",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScriptStage::PreDeploy => "Pre-deployment",
            ScriptStage::Deploy => "Deployment",
            ScriptStage::PostDeploy => "Post-deployment",
        }
    }

    /// Property key for this stage's script in the given language
    pub fn property(&self, syntax: ScriptSyntax) -> String {
        let stage = match self {
            ScriptStage::PreDeploy => "PreDeploy",
            ScriptStage::Deploy => "Deploy",
            ScriptStage::PostDeploy => "PostDeploy",
        };
        format!("Octopus.Action.CustomScripts.{}.{}", stage, syntax.extension())
    }
}

fn script_block(stage: ScriptStage) -> Attribute {
    let label = stage.label().to_lowercase();
    Attribute::block_set(
        Schema::new()
            .with(
                "type",
                Attribute::string()
                    .required()
                    .description(&format!("The scripting language of the {} script", label))
                    .one_of(ScriptSyntax::NAMES),
            )
            .with(
                "body",
                Attribute::string().required().description("The script body."),
            ),
    )
    .single()
    .description(&format!("Custom {} Script", stage.label()))
}

// ─── Application pools ───────────────────────────────────────────────────────

/// Which IIS object an application pool is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPoolScope {
    WebSite,
    WebApplication,
}

impl AppPoolScope {
    /// Prefix of the application pool property keys
    pub fn prefix(&self) -> &'static str {
        match self {
            AppPoolScope::WebSite => "Octopus.Action.IISWebSite",
            AppPoolScope::WebApplication => "Octopus.Action.IISWebSite.WebApplication",
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.prefix(), suffix)
    }
}

// ─── Schema builders ─────────────────────────────────────────────────────────

/// Attributes every step type carries
pub fn add_default_schema(schema: &mut Schema, target_roles_required: bool) {
    schema.insert("project_id", Attribute::string().required().force_new());
    schema.insert("deployment_process_id", Attribute::string().computed());
    schema.insert("enabled_features", Attribute::string().computed());
    schema.insert(
        "first_step",
        Attribute::bool()
            .default(false)
            .description("Define as the first step"),
    );
    schema.insert(
        "before_step_id",
        Attribute::string().description("Define the Step this should precede"),
    );
    schema.insert(
        "after_step_id",
        Attribute::string().description(
            "Define Step this should follow, else will be added to the end at time of creation",
        ),
    );
    schema.insert(
        "step_name",
        Attribute::string()
            .required()
            .description("The name of the deployment step."),
    );
    schema.insert(
        "step_condition",
        Attribute::string()
            .default("success")
            .one_of(&["success", "failure", "always", "variable"])
            .description("Limit when this step will run by setting this condition."),
    );
    schema.insert("required", Attribute::bool().default(false));
    schema.insert(
        "step_start_trigger",
        Attribute::string()
            .default("StartAfterPrevious")
            .one_of(&["StartAfterPrevious", "StartWithPrevious"])
            .description(
                "Control whether the step waits for the previous step to complete, or runs parallel with it.",
            ),
    );
    schema.insert(
        "target_roles",
        Attribute::string_list().required_if(target_roles_required),
    );

    if !target_roles_required {
        schema.insert(
            "run_on_server",
            Attribute::bool()
                .default(false)
                .description("Whether the script runs on the server (true) or target (false)"),
        );
    }
}

/// Attributes for steps that deploy a package
pub fn add_package_schema(schema: &mut Schema) {
    schema.insert(
        "feed_id",
        Attribute::string()
            .required()
            .description("The ID of the feed a package will be found in."),
    );
    schema.insert(
        "package",
        Attribute::string()
            .required()
            .description("ID / Name of the package to be deployed."),
    );
    schema.insert(
        "configuration_transforms",
        Attribute::bool()
            .default(true)
            .description("Enables XML configuration transformations."),
    );
    schema.insert(
        "configuration_variables",
        Attribute::bool()
            .default(true)
            .description("Enables replacing appSettings and connectionString entries in any .config file."),
    );
    schema.insert(
        "json_file_variable_replacement",
        Attribute::string().description(
            "A comma-separated list of file names to replace settings in, relative to the package contents.",
        ),
    );
    schema.insert(
        "variable_substitution_in_files",
        Attribute::string_list().description(
            "Array of file names to transform, relative to the package contents. Extended wildcard syntax is supported.",
        ),
    );

    for stage in ScriptStage::all() {
        schema.insert(stage.attribute(), script_block(stage));
    }
}

/// The `application_pool` block of IIS steps
pub fn add_iis_app_pool_schema(schema: &mut Schema) {
    let pool = Schema::new()
        .with(
            "name",
            Attribute::string()
                .required()
                .description("Name of the application pool in IIS to create or reconfigure."),
        )
        .with(
            "framework",
            Attribute::string()
                .default("v4.0")
                .one_of(&["v2.0", "v4.0"])
                .description("The version of the .NET common language runtime that this application pool will use."),
        )
        .with(
            "identity",
            Attribute::string()
                .default("ApplicationPoolIdentity")
                .description("Which account will the application pool run under."),
        )
        .with(
            "username",
            Attribute::string().description("Application Pool Identity Username"),
        )
        .with(
            "password",
            Attribute::string()
                .sensitive()
                .description("Application Pool Identity Password"),
        )
        .with(
            "start",
            Attribute::bool()
                .default(true)
                .description("Start Application Pool"),
        );

    schema.insert(
        "application_pool",
        Attribute::block_set(pool)
            .single()
            .required()
            .description("Application Pool Settings"),
    );
}

// ─── Step builders ───────────────────────────────────────────────────────────

/// A step with one action of `action_type` and the shared settings applied
pub fn build_basic_step(
    data: &ResourceData,
    action_type: &str,
) -> Result<DeploymentStep, ProviderError> {
    let step_name = data.get_str("step_name").to_string();

    let condition: StepCondition = data
        .get_str_ok("step_condition")
        .unwrap_or("success")
        .parse()
        .map_err(ProviderError::InvalidState)?;
    let start_trigger: StepStartTrigger = data
        .get_str_ok("step_start_trigger")
        .unwrap_or("StartAfterPrevious")
        .parse()
        .map_err(ProviderError::InvalidState)?;

    let mut step = DeploymentStep {
        id: None,
        name: step_name.clone(),
        package_requirement: "LetOctopusDecide".to_string(),
        condition,
        start_trigger,
        properties: PropertyBag::new(),
        actions: vec![DeploymentAction {
            id: None,
            name: step_name,
            action_type: action_type.to_string(),
            is_required: data.get_bool("required"),
            ..Default::default()
        }],
        ..Default::default()
    };

    if data.get_ok("run_on_server").is_some() {
        action_properties_mut(&mut step).insert(RUN_ON_SERVER.to_string(), "true".to_string());
    }

    let target_roles = data.get_string_list("target_roles");
    if !target_roles.is_empty() {
        step.properties
            .insert(TARGET_ROLES.to_string(), target_roles.join(","));
    }

    Ok(step)
}

/// Write the script block for one stage, if configured
pub fn add_deploy_script(data: &ResourceData, step: &mut DeploymentStep, stage: ScriptStage) {
    let Some(script) = data.get_block(stage.attribute()) else {
        return;
    };
    let Some(syntax) = ScriptSyntax::from_name(block_str(script, "type")) else {
        return;
    };

    let properties = action_properties_mut(step);
    properties.insert(stage.property(syntax), block_str(script, "body").to_string());
    enable_feature(properties, FEATURE_CUSTOM_SCRIPTS);
}

/// Package selection, file transforms and custom scripts
pub fn add_package_properties(data: &ResourceData, step: &mut DeploymentStep) {
    let properties = action_properties_mut(step);

    properties.insert(PACKAGE_DOWNLOAD_ON_TENTACLE.to_string(), "False".to_string());
    properties.insert(PACKAGE_FEED_ID.to_string(), data.get_str("feed_id").to_string());
    properties.insert(PACKAGE_ID.to_string(), data.get_str("package").to_string());

    if let Some(targets) = data.get_str_ok("json_file_variable_replacement") {
        properties.insert(JSON_VARIABLES_TARGETS.to_string(), targets.to_string());
        properties.insert(JSON_VARIABLES_ENABLED.to_string(), "True".to_string());
        enable_feature(properties, FEATURE_JSON_VARIABLES);
    }

    let substitutions = data.get_string_list("variable_substitution_in_files");
    if !substitutions.is_empty() {
        properties.insert(SUBSTITUTE_TARGETS.to_string(), substitutions.join("\n"));
        properties.insert(SUBSTITUTE_ENABLED.to_string(), "True".to_string());
        enable_feature(properties, FEATURE_SUBSTITUTE_IN_FILES);
    }

    if data.get_bool("configuration_transforms") {
        properties.insert(CONFIGURATION_TRANSFORMS.to_string(), format_bool(true).to_string());
        enable_feature(properties, FEATURE_CONFIGURATION_TRANSFORMS);
    }

    if data.get_bool("configuration_variables") {
        properties.insert(CONFIGURATION_VARIABLES.to_string(), format_bool(true).to_string());
        enable_feature(properties, FEATURE_CONFIGURATION_VARIABLES);
    }

    for stage in ScriptStage::all() {
        add_deploy_script(data, step, stage);
    }
}

/// Application pool settings from the `application_pool` block
pub fn add_iis_app_pool_properties(
    data: &ResourceData,
    step: &mut DeploymentStep,
    scope: AppPoolScope,
) {
    let Some(pool) = data.get_block("application_pool") else {
        return;
    };
    let properties = action_properties_mut(step);

    properties.insert(
        scope.key("ApplicationPoolName"),
        block_str(pool, "name").to_string(),
    );
    properties.insert(
        scope.key("ApplicationPoolFrameworkVersion"),
        block_str(pool, "framework").to_string(),
    );
    properties.insert(
        scope.key("ApplicationPoolIdentityType"),
        block_str(pool, "identity").to_string(),
    );

    if let Some(username) = pool.get("username").and_then(Value::as_str) {
        properties.insert(scope.key("ApplicationPoolUsername"), username.to_string());
    }
    if let Some(password) = pool.get("password").and_then(Value::as_str) {
        properties.insert(scope.key("ApplicationPoolPassword"), password.to_string());
    }

    properties.insert(
        START_APP_POOL.to_string(),
        format_bool(block_bool(pool, "start")).to_string(),
    );
}

// ─── Schema setters ──────────────────────────────────────────────────────────

/// Set a bool attribute from a property, leaving it alone when unparseable
pub fn set_bool_from(data: &mut ResourceData, key: &str, value: Option<&str>) {
    if let Some(parsed) = value.and_then(parse_bool) {
        data.set(key, parsed);
    }
}

/// Restore the shared settings
pub fn set_basic_schema(data: &mut ResourceData, step: &DeploymentStep, target_roles_required: bool) {
    data.set("step_name", step.name.clone());
    data.set("step_condition", step.condition.as_config_str());
    data.set("step_start_trigger", step.start_trigger.to_string());
    data.set(
        "required",
        step.actions.first().map(|a| a.is_required).unwrap_or(false),
    );

    match step.properties.get(TARGET_ROLES).map(String::as_str) {
        Some(roles) if !roles.is_empty() => {
            let roles: Vec<&str> = roles.split(',').map(str::trim).collect();
            data.set("target_roles", json!(roles));
        }
        _ => data.remove("target_roles"),
    }

    if !target_roles_required {
        let run_on_server = step
            .action_property(RUN_ON_SERVER)
            .and_then(parse_bool)
            .unwrap_or(false);
        data.set("run_on_server", run_on_server);
    }
}

/// Restore one stage's script block
pub fn set_deploy_script(data: &mut ResourceData, step: &DeploymentStep, stage: ScriptStage) {
    let found = ScriptSyntax::all().into_iter().find_map(|syntax| {
        step.action_property(&stage.property(syntax))
            .map(|body| (syntax, body.to_string()))
    });

    match found {
        Some((syntax, body)) => {
            data.set(
                stage.attribute(),
                json!([{ "type": syntax.name(), "body": body }]),
            );
        }
        None => data.remove(stage.attribute()),
    }
}

/// Restore package selection, transforms and scripts
pub fn set_package_schema(data: &mut ResourceData, step: &DeploymentStep) {
    data.set("feed_id", step.action_property(PACKAGE_FEED_ID).unwrap_or(""));
    data.set("package", step.action_property(PACKAGE_ID).unwrap_or(""));

    if let Some(targets) = step.action_property(JSON_VARIABLES_TARGETS) {
        data.set("json_file_variable_replacement", targets);
    }

    if let Some(targets) = step.action_property(SUBSTITUTE_TARGETS) {
        if !targets.is_empty() {
            let files: Vec<&str> = targets.split('\n').collect();
            data.set("variable_substitution_in_files", json!(files));
        }
    }

    set_bool_from(
        data,
        "configuration_transforms",
        step.action_property(CONFIGURATION_TRANSFORMS),
    );
    set_bool_from(
        data,
        "configuration_variables",
        step.action_property(CONFIGURATION_VARIABLES),
    );

    for stage in ScriptStage::all() {
        set_deploy_script(data, step, stage);
    }
}

/// Restore the `application_pool` block
pub fn set_iis_app_pool_schema(data: &mut ResourceData, step: &DeploymentStep, scope: AppPoolScope) {
    let Some(name) = step.action_property(&scope.key("ApplicationPoolName")) else {
        return;
    };

    let mut pool = Map::new();
    pool.insert("name".to_string(), Value::from(name));

    for (field, suffix) in [
        ("framework", "ApplicationPoolFrameworkVersion"),
        ("identity", "ApplicationPoolIdentityType"),
        ("username", "ApplicationPoolUsername"),
        ("password", "ApplicationPoolPassword"),
    ] {
        if let Some(value) = step.action_property(&scope.key(suffix)) {
            pool.insert(field.to_string(), Value::from(value));
        }
    }

    if let Some(start) = step.action_property(START_APP_POOL).and_then(parse_bool) {
        pool.insert("start".to_string(), Value::Bool(start));
    }

    data.set("application_pool", Value::Array(vec![Value::Object(pool)]));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_schema() -> Schema {
        let mut schema = Schema::new();
        add_default_schema(&mut schema, true);
        add_package_schema(&mut schema);
        add_iis_app_pool_schema(&mut schema);
        schema
    }

    fn package_data(config: Value) -> ResourceData {
        ResourceData::from_config(&package_schema(), &config).unwrap()
    }

    fn minimal() -> Value {
        json!({
            "project_id": "Projects-1",
            "step_name": "Deploy web",
            "target_roles": ["web", "api"],
            "feed_id": "feeds-builtin",
            "package": "Acme.Web",
            "application_pool": [{ "name": "AcmePool" }]
        })
    }

    #[test]
    fn test_enable_feature_dedupes() {
        let mut props = PropertyBag::new();
        enable_feature(&mut props, FEATURE_CUSTOM_SCRIPTS);
        enable_feature(&mut props, FEATURE_JSON_VARIABLES);
        enable_feature(&mut props, FEATURE_CUSTOM_SCRIPTS);
        assert_eq!(
            props[ENABLED_FEATURES],
            "Octopus.Features.CustomScripts,Octopus.Features.JsonConfigurationVariables"
        );

        let mut props = PropertyBag::new();
        props.insert(ENABLED_FEATURES.to_string(), ",Octopus.Features.IISWebSite,".to_string());
        enable_feature(&mut props, FEATURE_SUBSTITUTE_IN_FILES);
        assert_eq!(
            props[ENABLED_FEATURES],
            "Octopus.Features.IISWebSite,Octopus.Features.SubstituteInFiles"
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_basic_step() {
        let mut config = minimal();
        config["step_condition"] = json!("always");
        config["required"] = json!(true);
        config["step_start_trigger"] = json!("StartWithPrevious");

        let step = build_basic_step(&package_data(config), "Octopus.IIS").unwrap();

        assert_eq!(step.name, "Deploy web");
        assert_eq!(step.package_requirement, "LetOctopusDecide");
        assert_eq!(step.condition, StepCondition::Always);
        assert_eq!(step.start_trigger, StepStartTrigger::StartWithPrevious);
        assert_eq!(step.properties[TARGET_ROLES], "web,api");
        assert_eq!(step.actions.len(), 1);
        assert_eq!(step.actions[0].action_type, "Octopus.IIS");
        assert!(step.actions[0].is_required);
        assert!(!step.actions[0].properties.contains_key(RUN_ON_SERVER));
    }

    #[test]
    fn test_package_properties_defaults() {
        let data = package_data(minimal());
        let mut step = build_basic_step(&data, "Octopus.TentaclePackage").unwrap();
        add_package_properties(&data, &mut step);

        let props = &step.actions[0].properties;
        assert_eq!(props[PACKAGE_DOWNLOAD_ON_TENTACLE], "False");
        assert_eq!(props[PACKAGE_FEED_ID], "feeds-builtin");
        assert_eq!(props[PACKAGE_ID], "Acme.Web");
        assert_eq!(props[CONFIGURATION_TRANSFORMS], "True");
        assert_eq!(props[CONFIGURATION_VARIABLES], "True");
        assert_eq!(
            props[ENABLED_FEATURES],
            "Octopus.Features.ConfigurationTransforms,Octopus.Features.ConfigurationVariables"
        );
        assert!(!props.contains_key(JSON_VARIABLES_TARGETS));
        assert!(!props.contains_key(SUBSTITUTE_TARGETS));
    }

    #[test]
    fn test_package_properties_transforms_and_scripts() {
        let mut config = minimal();
        config["configuration_transforms"] = json!(false);
        config["json_file_variable_replacement"] = json!("appsettings.json,config/*.json");
        config["variable_substitution_in_files"] = json!(["web.config", "**/*.xml"]);
        config["pre_deploy_script"] = json!([{ "type": "PowerShell", "body": "Stop-Service x" }]);
        config["post_deploy_script"] = json!([{ "type": "Bash", "body": "echo done" }]);

        let data = package_data(config);
        let mut step = build_basic_step(&data, "Octopus.TentaclePackage").unwrap();
        add_package_properties(&data, &mut step);

        let props = &step.actions[0].properties;
        assert_eq!(props[JSON_VARIABLES_TARGETS], "appsettings.json,config/*.json");
        assert_eq!(props[JSON_VARIABLES_ENABLED], "True");
        assert_eq!(props[SUBSTITUTE_TARGETS], "web.config\n**/*.xml");
        assert!(!props.contains_key(CONFIGURATION_TRANSFORMS));
        assert_eq!(
            props["Octopus.Action.CustomScripts.PreDeploy.ps1"],
            "Stop-Service x"
        );
        assert_eq!(props["Octopus.Action.CustomScripts.PostDeploy.sh"], "echo done");

        let features: Vec<&str> = props[ENABLED_FEATURES].split(',').collect();
        assert_eq!(
            features
                .iter()
                .filter(|f| **f == FEATURE_CUSTOM_SCRIPTS)
                .count(),
            1
        );
        assert!(!features.contains(&FEATURE_CONFIGURATION_TRANSFORMS));
    }

    #[test]
    fn test_every_script_language_maps_back_to_itself() {
        for syntax in ScriptSyntax::all() {
            let mut config = minimal();
            config["deploy_script"] = json!([{ "type": syntax.name(), "body": "run()" }]);

            let data = package_data(config);
            let mut step = build_basic_step(&data, "Octopus.TentaclePackage").unwrap();
            add_package_properties(&data, &mut step);

            let mut read = ResourceData::default();
            set_package_schema(&mut read, &step);
            assert_eq!(
                read.get("deploy_script"),
                Some(&json!([{ "type": syntax.name(), "body": "run()" }])),
                "{:?}",
                syntax
            );
            assert!(read.get("pre_deploy_script").is_none());
        }
    }

    #[test]
    fn test_app_pool_properties() {
        let mut config = minimal();
        config["application_pool"] = json!([{
            "name": "AcmePool",
            "framework": "v2.0",
            "identity": "SpecificUser",
            "username": "svc-acme",
            "password": "s3cret",
            "start": false
        }]);

        let data = package_data(config);
        let mut step = build_basic_step(&data, "Octopus.IIS").unwrap();
        add_iis_app_pool_properties(&data, &mut step, AppPoolScope::WebSite);

        let props = &step.actions[0].properties;
        assert_eq!(props["Octopus.Action.IISWebSite.ApplicationPoolName"], "AcmePool");
        assert_eq!(
            props["Octopus.Action.IISWebSite.ApplicationPoolFrameworkVersion"],
            "v2.0"
        );
        assert_eq!(
            props["Octopus.Action.IISWebSite.ApplicationPoolIdentityType"],
            "SpecificUser"
        );
        assert_eq!(props["Octopus.Action.IISWebSite.ApplicationPoolUsername"], "svc-acme");
        assert_eq!(props["Octopus.Action.IISWebSite.ApplicationPoolPassword"], "s3cret");
        assert_eq!(props[START_APP_POOL], "False");

        let mut read = ResourceData::default();
        set_iis_app_pool_schema(&mut read, &step, AppPoolScope::WebSite);
        let pool = read.get_block("application_pool").unwrap();
        assert_eq!(block_str(pool, "identity"), "SpecificUser");
        assert_eq!(pool.get("start"), Some(&json!(false)));
        assert_eq!(block_str(pool, "password"), "s3cret");
    }

    #[test]
    fn test_app_pool_defaults_and_web_application_prefix() {
        let data = package_data(minimal());
        let mut step = build_basic_step(&data, "Octopus.IIS").unwrap();
        add_iis_app_pool_properties(&data, &mut step, AppPoolScope::WebApplication);

        let props = &step.actions[0].properties;
        assert_eq!(
            props["Octopus.Action.IISWebSite.WebApplication.ApplicationPoolFrameworkVersion"],
            "v4.0"
        );
        assert_eq!(
            props["Octopus.Action.IISWebSite.WebApplication.ApplicationPoolIdentityType"],
            "ApplicationPoolIdentity"
        );
        assert!(!props.contains_key("Octopus.Action.IISWebSite.WebApplication.ApplicationPoolUsername"));
        assert_eq!(props[START_APP_POOL], "True");
    }

    #[test]
    fn test_set_basic_schema() {
        let mut step = DeploymentStep {
            name: "Run migrations".to_string(),
            condition: StepCondition::Variable,
            start_trigger: StepStartTrigger::StartWithPrevious,
            ..Default::default()
        };
        step.properties.insert(TARGET_ROLES.to_string(), "db, worker".to_string());
        step.actions.push(DeploymentAction {
            name: "Run migrations".to_string(),
            is_required: true,
            ..Default::default()
        });
        action_properties_mut(&mut step).insert(RUN_ON_SERVER.to_string(), "True".to_string());

        let mut data = ResourceData::default();
        set_basic_schema(&mut data, &step, false);

        assert_eq!(data.get_str("step_name"), "Run migrations");
        assert_eq!(data.get_str("step_condition"), "variable");
        assert_eq!(data.get_str("step_start_trigger"), "StartWithPrevious");
        assert!(data.get_bool("required"));
        assert_eq!(data.get_string_list("target_roles"), vec!["db", "worker"]);
        assert!(data.get_bool("run_on_server"));

        // Roles cleared on the server are cleared in state
        step.properties.insert(TARGET_ROLES.to_string(), String::new());
        set_basic_schema(&mut data, &step, false);
        assert!(data.get("target_roles").is_none());
    }

    #[test]
    fn test_set_bool_ignores_garbage() {
        let mut data = ResourceData::default();
        data.set("configuration_variables", true);
        set_bool_from(&mut data, "configuration_variables", Some("maybe"));
        assert!(data.get_bool("configuration_variables"));
        set_bool_from(&mut data, "configuration_variables", Some("False"));
        assert!(!data.get_bool("configuration_variables"));
    }
}
