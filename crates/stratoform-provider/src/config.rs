//! Provider configuration
//!
//! Connection settings come from the environment; timeouts are per
//! operation kind, each with an independent default and override.

use std::time::Duration;

use stratoform_api::ApiConfig;

use crate::error::Result;

/// Top-level provider settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api: ApiConfig,

    pub region: Option<String>,

    pub timeouts: OperationTimeouts,
}

impl ProviderConfig {
    /// Read settings from `STRATO_API_ENDPOINT`, `STRATO_API_TOKEN` and the
    /// optional `STRATO_REGION`
    pub fn from_env() -> Result<Self> {
        let api = ApiConfig::from_env()?;
        let region = std::env::var("STRATO_REGION").ok();

        Ok(Self {
            api,
            region,
            timeouts: OperationTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Deadline budget per operation kind
///
/// Every resource operation derives its overall deadline from the matching
/// field; expiry aborts polling promptly with a timeout-class failure.
#[derive(Debug, Clone, Copy)]
pub struct OperationTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(10 * 60),
        }
    }
}

impl OperationTimeouts {
    pub fn with_create(mut self, timeout: Duration) -> Self {
        self.create = timeout;
        self
    }

    pub fn with_read(mut self, timeout: Duration) -> Self {
        self.read = timeout;
        self
    }

    pub fn with_update(mut self, timeout: Duration) -> Self {
        self.update = timeout;
        self
    }

    pub fn with_delete(mut self, timeout: Duration) -> Self {
        self.delete = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_overrides() {
        let timeouts = OperationTimeouts::default()
            .with_create(Duration::from_secs(60))
            .with_delete(Duration::from_secs(120));

        assert_eq!(timeouts.create, Duration::from_secs(60));
        assert_eq!(timeouts.delete, Duration::from_secs(120));
        // Untouched kinds keep their defaults.
        assert_eq!(timeouts.read, Duration::from_secs(300));
        assert_eq!(timeouts.update, Duration::from_secs(1800));
    }
}
