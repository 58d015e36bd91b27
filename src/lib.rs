//! Octoform - declarative Octopus Deploy resources
//!
//! Manages deployment steps (spliced into a project's deployment process),
//! package feeds and accounts against the Octopus REST API.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod state;
pub mod steps;

pub use error::ProviderError;
pub use provider::{Provider, Resource};
