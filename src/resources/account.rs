//! `octopusdeploy_account`: credentials used by deployments

use async_trait::async_trait;
use serde_json::json;

use crate::api::{Account, ApiError, OctopusApi, SensitiveValue};
use crate::error::{ApiResultExt, ProviderError};
use crate::provider::Resource;
use crate::schema::{Attribute, ResourceData, Schema, SchemaError};

use super::require_id;

pub const TYPE_NAME: &str = "octopusdeploy_account";

const AZURE_SERVICE_PRINCIPAL: &str = "AzureServicePrincipal";
const USERNAME_PASSWORD: &str = "UsernamePassword";

pub struct AccountResource {
    schema: Schema,
}

impl AccountResource {
    pub fn new() -> Self {
        Self {
            schema: account_schema(),
        }
    }
}

impl Default for AccountResource {
    fn default() -> Self {
        Self::new()
    }
}

fn account_schema() -> Schema {
    Schema::new()
        .with("name", Attribute::string().required())
        .with(
            "account_type",
            Attribute::string()
                .required()
                .force_new()
                .one_of(&[AZURE_SERVICE_PRINCIPAL, USERNAME_PASSWORD]),
        )
        .with("description", Attribute::string())
        .with("client_id", Attribute::string().description("Azure application id"))
        .with("tenant_id", Attribute::string().description("Azure Active Directory tenant id"))
        .with("subscription_id", Attribute::string().description("Azure subscription id"))
        .with("client_secret", Attribute::string().sensitive())
        .with("username", Attribute::string())
        .with("password", Attribute::string().sensitive())
        .with("tenant_tags", Attribute::string_list())
        .with(
            "tenanted_deployment_participation",
            Attribute::string()
                .default("Untenanted")
                .one_of(&["Untenanted", "TenantedOrUntenanted", "Tenanted"]),
        )
        .with("environments", Attribute::string_list())
}

/// Attributes each account type cannot do without
fn check_required(data: &ResourceData) -> Result<(), ProviderError> {
    let required: &[&str] = match data.get_str("account_type") {
        AZURE_SERVICE_PRINCIPAL => &["client_id", "tenant_id", "subscription_id", "client_secret"],
        USERNAME_PASSWORD => &["username"],
        _ => &[],
    };

    let missing: Vec<SchemaError> = required
        .iter()
        .filter(|name| data.get_str_ok(name).is_none())
        .map(|name| SchemaError::MissingRequired((*name).to_string()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::InvalidConfig(missing))
    }
}

fn optional(data: &ResourceData, key: &str) -> Option<String> {
    data.get_str_ok(key).map(str::to_string)
}

fn build_account(data: &ResourceData) -> Result<Account, ProviderError> {
    check_required(data)?;

    let account_type = data.get_str("account_type").to_string();
    let mut account = Account {
        id: data.id().map(str::to_string),
        name: data.get_str("name").to_string(),
        description: optional(data, "description"),
        tenant_tags: data.get_string_list("tenant_tags"),
        tenanted_deployment_participation: data
            .get_str_ok("tenanted_deployment_participation")
            .unwrap_or("Untenanted")
            .to_string(),
        environment_ids: data.get_string_list("environments"),
        ..Default::default()
    };

    match account_type.as_str() {
        AZURE_SERVICE_PRINCIPAL => {
            account.client_id = optional(data, "client_id");
            account.tenant_id = optional(data, "tenant_id");
            account.subscription_number = optional(data, "subscription_id");
            account.password = data.get_str_ok("client_secret").map(SensitiveValue::new);
        }
        USERNAME_PASSWORD => {
            account.username = optional(data, "username");
            account.password = data.get_str_ok("password").map(SensitiveValue::new);
        }
        _ => {}
    }
    account.account_type = account_type;

    Ok(account)
}

fn set_optional(data: &mut ResourceData, key: &str, value: &Option<String>) {
    match value {
        Some(v) if !v.is_empty() => data.set(key, v.clone()),
        _ => data.remove(key),
    }
}

/// Refresh state; secrets keep their configured values
fn set_account(data: &mut ResourceData, account: &Account) {
    data.set("name", account.name.clone());
    data.set("account_type", account.account_type.clone());
    set_optional(data, "description", &account.description);

    if account.account_type == AZURE_SERVICE_PRINCIPAL {
        set_optional(data, "client_id", &account.client_id);
        set_optional(data, "tenant_id", &account.tenant_id);
        set_optional(data, "subscription_id", &account.subscription_number);
    } else {
        set_optional(data, "username", &account.username);
    }

    if account.tenant_tags.is_empty() {
        data.remove("tenant_tags");
    } else {
        data.set("tenant_tags", json!(account.tenant_tags));
    }
    data.set(
        "tenanted_deployment_participation",
        account.tenanted_deployment_participation.clone(),
    );
    if account.environment_ids.is_empty() {
        data.remove("environments");
    } else {
        data.set("environments", json!(account.environment_ids));
    }
}

#[async_trait]
impl Resource for AccountResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn create(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let account = build_account(data)?;
        tracing::info!(name = %account.name, account_type = %account.account_type, "Creating account");

        let created = api
            .create_account(&account)
            .await
            .context_with(|| format!("error creating account '{}'", account.name))?;

        let id = created.id.clone().ok_or_else(|| {
            ProviderError::InvalidState("server returned an account without an id".to_string())
        })?;
        data.set_id(id);
        set_account(data, &created);
        Ok(())
    }

    async fn read(&self, api: &dyn OctopusApi, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = require_id(data)?;

        match api.get_account(&id).await {
            Ok(account) => {
                set_account(data, &account);
                Ok(())
            }
            Err(ApiError::NotFound { .. }) => {
                tracing::warn!(account_id = %id, "Account no longer exists, removing from state");
                data.clear_id();
                Ok(())
            }
            Err(e) => Err(ProviderError::api(format!("error reading account '{}'", id), e)),
        }
    }

    async fn update(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = require_id(data)?;
        let account = build_account(data)?;

        let updated = api
            .update_account(&account)
            .await
            .context_with(|| format!("error updating account '{}'", id))?;
        set_account(data, &updated);
        Ok(())
    }

    async fn delete(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = require_id(data)?;

        match api.delete_account(&id).await {
            Ok(()) => tracing::info!(account_id = %id, "Deleted account"),
            Err(ApiError::NotFound { .. }) => {
                tracing::debug!(account_id = %id, "Account already deleted");
            }
            Err(e) => {
                return Err(ProviderError::api(
                    format!("error deleting account '{}'", id),
                    e,
                ))
            }
        }

        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryApi;

    fn azure_config() -> serde_json::Value {
        json!({
            "name": "Testing one two three",
            "account_type": "AzureServicePrincipal",
            "client_id": "18eb006b-c3c8-4a72-93cd-fe4b293f82e1",
            "tenant_id": "18eb006b-c3c8-4a72-93cd-fe4b293f82e2",
            "subscription_id": "18eb006b-c3c8-4a72-93cd-fe4b293f82e3",
            "client_secret": "18eb006b-c3c8-4a72-93cd-fe4b293f82e4",
            "tenant_tags": ["TagSet/Tag"],
            "tenanted_deployment_participation": "TenantedOrUntenanted"
        })
    }

    fn data(config: serde_json::Value) -> ResourceData {
        ResourceData::from_config(&account_schema(), &config).unwrap()
    }

    #[test]
    fn test_azure_account_fields() {
        let account = build_account(&data(azure_config())).unwrap();

        assert_eq!(account.account_type, "AzureServicePrincipal");
        assert_eq!(
            account.subscription_number.as_deref(),
            Some("18eb006b-c3c8-4a72-93cd-fe4b293f82e3")
        );
        assert_eq!(
            account.password,
            Some(SensitiveValue::new("18eb006b-c3c8-4a72-93cd-fe4b293f82e4"))
        );
        assert_eq!(account.tenant_tags, vec!["TagSet/Tag"]);
        assert_eq!(account.tenanted_deployment_participation, "TenantedOrUntenanted");
        assert!(account.username.is_none());
    }

    #[test]
    fn test_type_specific_requirements() {
        let mut config = azure_config();
        config.as_object_mut().unwrap().remove("client_secret");
        config.as_object_mut().unwrap().remove("tenant_id");

        let err = build_account(&data(config)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: tenant_id: required attribute is missing; client_secret: required attribute is missing"
        );

        let err = build_account(&data(json!({
            "name": "Deployer",
            "account_type": "UsernamePassword"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_username_password_account() {
        let account = build_account(&data(json!({
            "name": "Deployer",
            "account_type": "UsernamePassword",
            "username": "deploy",
            "password": "hunter2",
            "client_id": "ignored"
        })))
        .unwrap();

        assert_eq!(account.username.as_deref(), Some("deploy"));
        assert_eq!(account.password, Some(SensitiveValue::new("hunter2")));
        assert!(account.client_id.is_none());
        assert_eq!(account.tenanted_deployment_participation, "Untenanted");
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let api = InMemoryApi::new();
        let resource = AccountResource::new();
        let mut state = data(azure_config());

        resource.create(&api, &mut state).await.unwrap();
        let id = state.id().unwrap().to_string();
        assert!(id.starts_with("Accounts-"));

        resource.read(&api, &mut state).await.unwrap();
        assert_eq!(state.get_str("subscription_id"), "18eb006b-c3c8-4a72-93cd-fe4b293f82e3");
        assert_eq!(state.get_str("client_secret"), "18eb006b-c3c8-4a72-93cd-fe4b293f82e4");
        assert_eq!(state.get_string_list("tenant_tags"), vec!["TagSet/Tag"]);

        state.set("description", "Production subscription");
        resource.update(&api, &mut state).await.unwrap();
        assert_eq!(
            api.stored_account(&id).unwrap().description.as_deref(),
            Some("Production subscription")
        );

        resource.delete(&api, &mut state).await.unwrap();
        assert_eq!(state.id(), None);
        assert!(api.stored_account(&id).is_none());
    }
}
