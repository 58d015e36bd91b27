//! `octopusdeploy_feed`: an external package feed

use async_trait::async_trait;

use crate::api::{ApiError, Feed, OctopusApi, SensitiveValue};
use crate::error::{ApiResultExt, ProviderError};
use crate::provider::Resource;
use crate::schema::{Attribute, ResourceData, Schema};

use super::require_id;

pub const TYPE_NAME: &str = "octopusdeploy_feed";

const FEED_TYPES: &[&str] = &["NuGet", "Docker", "Maven", "GitHub", "Helm"];

pub struct FeedResource {
    schema: Schema,
}

impl FeedResource {
    pub fn new() -> Self {
        Self {
            schema: feed_schema(),
        }
    }
}

impl Default for FeedResource {
    fn default() -> Self {
        Self::new()
    }
}

fn feed_schema() -> Schema {
    Schema::new()
        .with("name", Attribute::string().required())
        .with(
            "feed_type",
            Attribute::string().default("NuGet").one_of(FEED_TYPES),
        )
        .with("feed_uri", Attribute::string().required())
        .with("username", Attribute::string())
        .with("password", Attribute::string().sensitive())
        .with("enhanced_mode", Attribute::bool().default(false))
        .with("download_attempts", Attribute::int().default(5))
        .with("download_retry_backoff_seconds", Attribute::int().default(10))
}

fn build_feed(data: &ResourceData) -> Feed {
    Feed {
        id: data.id().map(str::to_string),
        name: data.get_str("name").to_string(),
        feed_type: data.get_str_ok("feed_type").unwrap_or("NuGet").to_string(),
        feed_uri: data.get_str("feed_uri").to_string(),
        username: data.get_str_ok("username").map(str::to_string),
        password: data.get_str_ok("password").map(SensitiveValue::new),
        enhanced_mode: data.get_bool("enhanced_mode"),
        download_attempts: data.get_i64("download_attempts"),
        download_retry_backoff_seconds: data.get_i64("download_retry_backoff_seconds"),
        ..Default::default()
    }
}

/// Refresh state from the server's copy; the password is never returned
fn set_feed(data: &mut ResourceData, feed: &Feed) {
    data.set("name", feed.name.clone());
    data.set("feed_type", feed.feed_type.clone());
    data.set("feed_uri", feed.feed_uri.clone());
    match &feed.username {
        Some(username) if !username.is_empty() => data.set("username", username.clone()),
        _ => data.remove("username"),
    }
    data.set("enhanced_mode", feed.enhanced_mode);
    data.set("download_attempts", feed.download_attempts);
    data.set(
        "download_retry_backoff_seconds",
        feed.download_retry_backoff_seconds,
    );
}

#[async_trait]
impl Resource for FeedResource {
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
        let feed = build_feed(data);
        tracing::info!(name = %feed.name, feed_type = %feed.feed_type, "Creating feed");

        let created = api
            .create_feed(&feed)
            .await
            .context_with(|| format!("error creating feed '{}'", feed.name))?;

        let id = created
            .id
            .clone()
            .ok_or_else(|| ProviderError::InvalidState("server returned a feed without an id".to_string()))?;
        data.set_id(id);
        set_feed(data, &created);
        Ok(())
    }

    async fn read(&self, api: &dyn OctopusApi, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = require_id(data)?;

        match api.get_feed(&id).await {
            Ok(feed) => {
                set_feed(data, &feed);
                Ok(())
            }
            Err(ApiError::NotFound { .. }) => {
                tracing::warn!(feed_id = %id, "Feed no longer exists, removing from state");
                data.clear_id();
                Ok(())
            }
            Err(e) => Err(ProviderError::api(format!("error reading feed '{}'", id), e)),
        }
    }

    async fn update(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = require_id(data)?;
        let feed = build_feed(data);

        let updated = api
            .update_feed(&feed)
            .await
            .context_with(|| format!("error updating feed '{}'", id))?;
        set_feed(data, &updated);
        Ok(())
    }

    async fn delete(
        &self,
        api: &dyn OctopusApi,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = require_id(data)?;

        match api.delete_feed(&id).await {
            Ok(()) => tracing::info!(feed_id = %id, "Deleted feed"),
            Err(ApiError::NotFound { .. }) => {
                tracing::debug!(feed_id = %id, "Feed already deleted");
            }
            Err(e) => return Err(ProviderError::api(format!("error deleting feed '{}'", id), e)),
        }

        data.clear_id();
        Ok(())
    }
}
