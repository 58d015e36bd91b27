//! API error types for the Octopus Deploy REST client

use std::fmt;

/// Errors that can occur when talking to the Octopus server
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 404 - the item no longer exists on the server
    NotFound { path: String },
    /// 401 Unauthorized - API key invalid or expired
    Unauthorized,
    /// 403 Forbidden - API key lacks required permissions
    Forbidden { path: String },
    /// 429 Rate Limited
    RateLimited { retry_after_secs: Option<u64> },
    /// 400/409/422 - the server rejected the payload
    Validation {
        status: u16,
        message: String,
        details: Vec<String>,
    },
    /// Network or timeout error
    NetworkError { message: String },
    /// Other HTTP errors
    HttpError { status: u16, message: String },
    /// Response body could not be decoded
    Decode { message: String },
    /// Client not configured (missing address or API key)
    NotConfigured { setting: String },
}

impl ApiError {
    /// Check if this is the "item not found" case handlers treat as deletion
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Check if a request that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError { .. } | ApiError::RateLimited { .. } => true,
            ApiError::HttpError { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Get retry-after seconds if rate limited
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Create a not found error for a request path
    pub fn not_found(path: impl Into<String>) -> Self {
        ApiError::NotFound { path: path.into() }
    }

    /// Create a forbidden error for a request path
    pub fn forbidden(path: impl Into<String>) -> Self {
        ApiError::Forbidden { path: path.into() }
    }

    /// Create a rate limited error
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        ApiError::RateLimited {
            retry_after_secs: retry_after,
        }
    }

    /// Create a validation error from the server's error document
    pub fn validation(status: u16, message: impl Into<String>, details: Vec<String>) -> Self {
        ApiError::Validation {
            status,
            message: message.into(),
            details,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode {
            message: message.into(),
        }
    }

    /// Create a not configured error for a missing setting
    pub fn not_configured(setting: impl Into<String>) -> Self {
        ApiError::NotConfigured {
            setting: setting.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound { path } => write!(f, "item not found: {}", path),
            ApiError::Unauthorized => write!(f, "unauthorized (401) - check the API key"),
            ApiError::Forbidden { path } => {
                write!(f, "forbidden (403) - insufficient permissions for {}", path)
            }
            ApiError::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited - retry after {}s", secs)
                } else {
                    write!(f, "rate limited")
                }
            }
            ApiError::Validation {
                status,
                message,
                details,
            } => {
                if details.is_empty() {
                    write!(f, "HTTP {} - {}", status, message)
                } else {
                    write!(f, "HTTP {} - {}: {}", status, message, details.join("; "))
                }
            }
            ApiError::NetworkError { message } => write!(f, "network error - {}", message),
            ApiError::HttpError { status, message } => write!(f, "HTTP {} - {}", status, message),
            ApiError::Decode { message } => write!(f, "could not decode response - {}", message),
            ApiError::NotConfigured { setting } => {
                write!(f, "client not configured: missing {}", setting)
            }
        }
    }
}

impl std::error::Error for ApiError {}
