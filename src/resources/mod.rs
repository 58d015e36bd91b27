//! Resources backed by their own API endpoints

pub mod account;
pub mod feed;

pub use account::AccountResource;
pub use feed::FeedResource;

use crate::error::ProviderError;
use crate::schema::ResourceData;

fn require_id(data: &ResourceData) -> Result<String, ProviderError> {
    data.id()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidState("resource has no id".to_string()))
}
