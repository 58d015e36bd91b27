//! `octopusdeploy_deployment_step_iis_website`: deploy a package as an IIS website

use serde_json::{json, Map, Value};

use super::common::{
    action_properties_mut, add_default_schema, add_iis_app_pool_properties,
    add_iis_app_pool_schema, add_package_properties, add_package_schema, build_basic_step,
    format_bool, set_basic_schema, set_bool_from, set_iis_app_pool_schema, set_package_schema,
    AppPoolScope, ENABLED_FEATURES,
};
use super::StepKind;
use crate::api::{DeploymentStep, PropertyBag};
use crate::error::ProviderError;
use crate::schema::{block_bool, block_str, Attribute, ResourceData, Schema};

const FEATURE_IIS_WEBSITE: &str = "Octopus.Features.IISWebSite";

const DEPLOYMENT_TYPE: &str = "Octopus.Action.IISWebSite.DeploymentType";
const CREATE_OR_UPDATE_WEBSITE: &str = "Octopus.Action.IISWebSite.CreateOrUpdateWebSite";
const CREATE_OR_UPDATE_WEB_APPLICATION: &str =
    "Octopus.Action.IISWebSite.WebApplication.CreateOrUpdate";
const CREATE_OR_UPDATE_VIRTUAL_DIRECTORY: &str =
    "Octopus.Action.IISWebSite.VirtualDirectory.CreateOrUpdate";
const PHYSICAL_PATH: &str = "Octopus.Action.IISWebSite.PhysicalPath";
const WEB_ROOT_TYPE: &str = "Octopus.Action.IISWebSite.WebRootType";
const START_WEB_SITE: &str = "Octopus.Action.IISWebSite.StartWebSite";
const WEB_SITE_NAME: &str = "Octopus.Action.IISWebSite.WebSiteName";
const ANONYMOUS_AUTH: &str = "Octopus.Action.IISWebSite.EnableAnonymousAuthentication";
const BASIC_AUTH: &str = "Octopus.Action.IISWebSite.EnableBasicAuthentication";
const WINDOWS_AUTH: &str = "Octopus.Action.IISWebSite.EnableWindowsAuthentication";
const BINDINGS: &str = "Octopus.Action.IISWebSite.Bindings";

const WEB_SITE: &str = "webSite";
const RELATIVE_TO_PACKAGE_ROOT: &str = "relativeToPackageRoot";
const PACKAGE_ROOT: &str = "packageRoot";

pub struct IisWebsiteStep;

impl StepKind for IisWebsiteStep {
    const TYPE_NAME: &'static str = "octopusdeploy_deployment_step_iis_website";
    const ACTION_TYPE: &'static str = "Octopus.IIS";
    const TARGET_ROLES_REQUIRED: bool = true;

    fn schema() -> Schema {
        let mut schema = Schema::new()
            .with(
                "website_name",
                Attribute::string()
                    .required()
                    .description("The name of the Website to be created"),
            )
            .with("deployment_type", Attribute::string().computed())
            .with("path_type", Attribute::string().computed())
            .with(
                "relative_path",
                Attribute::string().description("Relative Path to package Root for the physical Path"),
            )
            .with(
                "start_web_site",
                Attribute::bool().default(true).description("Start Web Site"),
            )
            .with(
                "anonymous_authentication",
                Attribute::bool()
                    .default(false)
                    .description("Whether IIS should allow anonymous authentication."),
            )
            .with(
                "basic_authentication",
                Attribute::bool()
                    .default(false)
                    .description("Whether IIS should allow basic authentication with a 401 challenge."),
            )
            .with(
                "windows_authentication",
                Attribute::bool().default(true).description(
                    "Whether IIS should allow integrated Windows authentication with a 401 challenge.",
                ),
            )
            .with("binding", Attribute::block_list(binding_schema()));

        add_default_schema(&mut schema, Self::TARGET_ROLES_REQUIRED);
        add_package_schema(&mut schema);
        add_iis_app_pool_schema(&mut schema);
        schema
    }

    fn build(data: &ResourceData) -> Result<DeploymentStep, ProviderError> {
        let mut step = build_basic_step(data, Self::ACTION_TYPE)?;

        action_properties_mut(&mut step)
            .insert(ENABLED_FEATURES.to_string(), FEATURE_IIS_WEBSITE.to_string());

        add_package_properties(data, &mut step);
        add_iis_app_pool_properties(data, &mut step, AppPoolScope::WebSite);

        let properties = action_properties_mut(&mut step);
        set(properties, DEPLOYMENT_TYPE, WEB_SITE);
        set(properties, CREATE_OR_UPDATE_WEBSITE, "True");
        set(properties, CREATE_OR_UPDATE_WEB_APPLICATION, "False");
        set(properties, CREATE_OR_UPDATE_VIRTUAL_DIRECTORY, "False");

        let path_type = match data.get_str_ok("relative_path") {
            Some(relative_path) => {
                set(properties, PHYSICAL_PATH, relative_path);
                RELATIVE_TO_PACKAGE_ROOT
            }
            None => PACKAGE_ROOT,
        };
        set(properties, WEB_ROOT_TYPE, path_type);

        set(properties, START_WEB_SITE, format_bool(data.get_bool("start_web_site")));
        set(properties, WEB_SITE_NAME, data.get_str("website_name"));
        set(
            properties,
            ANONYMOUS_AUTH,
            format_bool(data.get_bool("anonymous_authentication")),
        );
        set(properties, BASIC_AUTH, format_bool(data.get_bool("basic_authentication")));
        set(
            properties,
            WINDOWS_AUTH,
            format_bool(data.get_bool("windows_authentication")),
        );

        let bindings = bindings_json(data);
        tracing::debug!(bindings = %bindings, "IIS bindings");
        properties.insert(BINDINGS.to_string(), bindings.to_string());

        Ok(step)
    }

    fn set_schema(data: &mut ResourceData, step: &DeploymentStep) {
        set_basic_schema(data, step, Self::TARGET_ROLES_REQUIRED);
        set_package_schema(data, step);
        set_iis_app_pool_schema(data, step, AppPoolScope::WebSite);

        data.set(
            "deployment_type",
            step.action_property(DEPLOYMENT_TYPE).unwrap_or(WEB_SITE),
        );
        if let Some(path_type) = step.action_property(WEB_ROOT_TYPE) {
            data.set("path_type", path_type);
        }
        if let Some(relative_path) = step.action_property(PHYSICAL_PATH) {
            data.set("relative_path", relative_path);
        }
        if let Some(name) = step.action_property(WEB_SITE_NAME) {
            data.set("website_name", name);
        }

        set_bool_from(data, "start_web_site", step.action_property(START_WEB_SITE));
        set_bool_from(
            data,
            "anonymous_authentication",
            step.action_property(ANONYMOUS_AUTH),
        );
        set_bool_from(data, "basic_authentication", step.action_property(BASIC_AUTH));
        set_bool_from(
            data,
            "windows_authentication",
            step.action_property(WINDOWS_AUTH),
        );

        if let Some(raw) = step.action_property(BINDINGS) {
            set_bindings(data, raw);
        }
    }
}

fn set(properties: &mut PropertyBag, key: &str, value: &str) {
    properties.insert(key.to_string(), value.to_string());
}

fn binding_schema() -> Schema {
    Schema::new()
        .with(
            "protocol",
            Attribute::string()
                .default("https")
                .one_of(&["http", "https"])
                .description("Protocol to bind to"),
        )
        .with(
            "ip",
            Attribute::string().default("*").description("IP Address to bind to"),
        )
        .with(
            "port",
            Attribute::string().default("*").description("Port to bind to"),
        )
        .with(
            "host",
            Attribute::string().default("").description("Host Name to bind to"),
        )
        .with(
            "enable",
            Attribute::bool().default(true).description("Enable the binding"),
        )
        .with(
            "thumbprint",
            Attribute::string()
                .default("")
                .description("Thumbprint for the SSL Binding"),
        )
        .with(
            "cert_var",
            Attribute::string()
                .default("")
                .description("Certificate Variable Name for the SSL Binding"),
        )
        .with(
            "require_sni",
            Attribute::bool()
                .default(false)
                .description("Require Server Name Indication for the SSL binding"),
        )
}

/// Empty strings are sent as null
fn nullable(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::from(value)
    }
}

fn binding_json(block: &Map<String, Value>) -> Value {
    json!({
        "protocol": nullable(block_str(block, "protocol")),
        "ipAddress": nullable(block_str(block, "ip")),
        "port": nullable(block_str(block, "port")),
        "host": nullable(block_str(block, "host")),
        "thumbprint": nullable(block_str(block, "thumbprint")),
        "certificateVariable": nullable(block_str(block, "cert_var")),
        "requireSni": block_bool(block, "require_sni"),
        "enabled": block_bool(block, "enable"),
    })
}

/// Written when no binding is configured: plain http on port 80
fn default_bindings() -> Value {
    json!([{
        "protocol": "http",
        "ipAddress": "*",
        "port": "80",
        "host": null,
        "thumbprint": null,
        "certificateVariable": null,
        "requireSni": false,
        "enabled": true,
    }])
}

fn bindings_json(data: &ResourceData) -> Value {
    let blocks = data.get_blocks("binding");
    if blocks.is_empty() {
        return default_bindings();
    }
    Value::Array(blocks.into_iter().map(binding_json).collect())
}

fn field_str(binding: &Value, key: &str) -> String {
    match binding.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn field_bool(binding: &Value, key: &str, default: bool) -> bool {
    match binding.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => super::common::parse_bool(s).unwrap_or(default),
        _ => default,
    }
}

/// Expand the bindings JSON back into `binding` blocks
fn set_bindings(data: &mut ResourceData, raw: &str) {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable IIS bindings");
            return;
        }
    };
    let Some(bindings) = parsed.as_array() else {
        return;
    };

    // The implicit http binding stays implicit
    if data.get_blocks("binding").is_empty() && parsed == default_bindings() {
        return;
    }

    let blocks: Vec<Value> = bindings
        .iter()
        .map(|binding| {
            let protocol = field_str(binding, "protocol");
            json!({
                "protocol": if protocol.is_empty() { "https".to_string() } else { protocol },
                "ip": field_str(binding, "ipAddress"),
                "port": field_str(binding, "port"),
                "host": field_str(binding, "host"),
                "enable": field_bool(binding, "enabled", true),
                "thumbprint": field_str(binding, "thumbprint"),
                "cert_var": field_str(binding, "certificateVariable"),
                "require_sni": field_bool(binding, "requireSni", false),
            })
        })
        .collect();

    data.set("binding", Value::Array(blocks));
}
