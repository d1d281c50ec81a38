//! Keypair lifecycle operations
//!
//! Keypairs are synchronous on the remote side; no convergence polling.

use std::sync::Arc;

use stratoform_api::{ComputeApi, ImportKeypairRequest, Keypair};

use crate::error::{ProviderError, Result};

/// Declared configuration for one keypair
#[derive(Debug, Clone)]
pub struct KeypairConfig {
    pub name: String,

    pub public_key: String,
}

/// CRUD surface for keypairs (no update; replace by name)
pub struct KeypairResource {
    api: Arc<dyn ComputeApi>,
}

impl KeypairResource {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, config: &KeypairConfig) -> Result<Keypair> {
        let mut messages = Vec::new();
        if config.name.is_empty() {
            messages.push("keypair name must not be empty".to_string());
        }
        if config.public_key.is_empty() {
            messages.push("keypair public_key must not be empty".to_string());
        }
        if !messages.is_empty() {
            return Err(ProviderError::Validation { messages });
        }

        let request = ImportKeypairRequest {
            name: config.name.clone(),
            public_key: config.public_key.clone(),
        };
        let keypair = self.api.import_keypair(&request).await?;
        tracing::info!("imported keypair {}", keypair.name);
        Ok(keypair)
    }

    pub async fn read(&self, name: &str) -> Result<Option<Keypair>> {
        match self.api.get_keypair(name).await {
            Ok(keypair) => Ok(Some(keypair)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.api.delete_keypair(name).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_compute::mock::MockCompute;

    #[tokio::test]
    async fn test_round_trip() {
        let mock = Arc::new(MockCompute::new());
        let res = KeypairResource::new(Arc::clone(&mock) as Arc<dyn ComputeApi>);

        let keypair = res
            .create(&KeypairConfig {
                name: "deploy".to_string(),
                public_key: "ssh-ed25519 AAAA...".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(keypair.name, "deploy");

        assert!(res.read("deploy").await.unwrap().is_some());
        res.delete("deploy").await.unwrap();
        assert!(res.read("deploy").await.unwrap().is_none());
        // Idempotent delete.
        res.delete("deploy").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let mock = Arc::new(MockCompute::new());
        let res = KeypairResource::new(Arc::clone(&mock) as Arc<dyn ComputeApi>);

        let err = res
            .create(&KeypairConfig {
                name: String::new(),
                public_key: String::new(),
            })
            .await
            .unwrap_err();
        match err {
            ProviderError::Validation { messages } => assert_eq!(messages.len(), 2),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(mock.calls().is_empty());
    }
}
