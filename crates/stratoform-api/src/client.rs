//! Strato Cloud compute API client
//!
//! `ComputeApi` is the seam the reconciliation engine is written against;
//! `HttpComputeApi` is the production implementation speaking the REST API
//! with bearer token authentication.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{
    AttachVolumeOptions, CreateInstanceRequest, CreateSnapshotRequest, CreateVolumeRequest,
    ImportKeypairRequest, Instance, InterfaceAttachment, Keypair, Snapshot, Volume,
};

/// Compute API surface consumed by the reconciliation engine
///
/// All calls are synchronous request/response against the cloud; long-running
/// operations (boot, attach, resize) complete asynchronously on the remote
/// side and are observed through subsequent `get_*` calls.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_instance(&self, id: &str) -> Result<Instance>;
    async fn create_instance(&self, req: &CreateInstanceRequest) -> Result<Instance>;
    async fn delete_instance(&self, id: &str) -> Result<()>;

    async fn start_instance(&self, id: &str) -> Result<()>;
    async fn stop_instance(&self, id: &str) -> Result<()>;
    async fn shelve_instance(&self, id: &str) -> Result<()>;
    async fn unshelve_instance(&self, id: &str) -> Result<()>;

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        opts: &AttachVolumeOptions,
    ) -> Result<()>;
    async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<()>;
    /// Flip the delete-on-termination flag on an existing attachment
    async fn update_volume_attachment(
        &self,
        instance_id: &str,
        volume_id: &str,
        delete_on_termination: bool,
    ) -> Result<()>;

    async fn attach_interface(&self, instance_id: &str, port_id: &str) -> Result<()>;
    async fn detach_interface(&self, instance_id: &str, port_id: &str) -> Result<()>;
    async fn list_interfaces(&self, instance_id: &str) -> Result<Vec<InterfaceAttachment>>;
    async fn get_interface(&self, port_id: &str) -> Result<InterfaceAttachment>;

    async fn create_volume(&self, req: &CreateVolumeRequest) -> Result<Volume>;
    async fn get_volume(&self, id: &str) -> Result<Volume>;
    async fn extend_volume(&self, id: &str, new_size_gb: i64) -> Result<()>;
    async fn delete_volume(&self, id: &str) -> Result<()>;

    async fn create_snapshot(&self, req: &CreateSnapshotRequest) -> Result<Snapshot>;
    async fn get_snapshot(&self, id: &str) -> Result<Snapshot>;
    async fn delete_snapshot(&self, id: &str) -> Result<()>;

    async fn import_keypair(&self, req: &ImportKeypairRequest) -> Result<Keypair>;
    async fn get_keypair(&self, name: &str) -> Result<Keypair>;
    async fn delete_keypair(&self, name: &str) -> Result<()>;
}

/// Connection settings for the HTTP client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.strato.cloud/v2`
    pub endpoint: String,
    pub api_token: String,
}

impl ApiConfig {
    /// Read connection settings from `STRATO_API_ENDPOINT` / `STRATO_API_TOKEN`
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("STRATO_API_ENDPOINT")
            .map_err(|_| ApiError::MissingEnvVar("STRATO_API_ENDPOINT".to_string()))?;
        let api_token = std::env::var("STRATO_API_TOKEN")
            .map_err(|_| ApiError::MissingEnvVar("STRATO_API_TOKEN".to_string()))?;

        Ok(Self {
            endpoint,
            api_token,
        })
    }
}

/// HTTP implementation of [`ComputeApi`]
///
/// Every request runs under the transport retry policy: connection errors
/// and 5xx responses are retried with backoff, everything else passes
/// through untouched.
pub struct HttpComputeApi {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct InstanceAction<'a> {
    action: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachVolumeBody<'a> {
    volume_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    delete_on_termination: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAttachmentBody {
    delete_on_termination: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachInterfaceBody<'a> {
    port_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtendVolumeBody {
    new_size_gb: i64,
}

impl HttpComputeApi {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the transport retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Map non-success responses into the error taxonomy. 404 becomes the
    /// dedicated `NotFound` variant so callers can treat it specially.
    async fn check(
        &self,
        response: reqwest::Response,
        resource: &'static str,
        id: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 404 {
            return Err(ApiError::NotFound {
                resource,
                id: id.to_string(),
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiError::Auth(format!(
                "HTTP {} for {} {}",
                status.as_u16(),
                resource,
                id
            )));
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &'static str,
        id: &str,
    ) -> Result<T> {
        with_retry(&self.retry, path, || async move {
            tracing::debug!("GET {}", path);
            let response = self
                .client
                .get(self.url(path))
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            let response = self.check(response, resource, id).await?;
            Ok(response.json().await?)
        })
        .await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        resource: &'static str,
        id: &str,
    ) -> Result<T> {
        with_retry(&self.retry, path, || async move {
            tracing::debug!("POST {}", path);
            let response = self
                .client
                .post(self.url(path))
                .bearer_auth(&self.api_token)
                .json(body)
                .send()
                .await?;
            let response = self.check(response, resource, id).await?;
            Ok(response.json().await?)
        })
        .await
    }

    async fn post_no_content<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        resource: &'static str,
        id: &str,
    ) -> Result<()> {
        with_retry(&self.retry, path, || async move {
            tracing::debug!("POST {}", path);
            let response = self
                .client
                .post(self.url(path))
                .bearer_auth(&self.api_token)
                .json(body)
                .send()
                .await?;
            self.check(response, resource, id).await?;
            Ok(())
        })
        .await
    }

    async fn patch_no_content<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        resource: &'static str,
        id: &str,
    ) -> Result<()> {
        with_retry(&self.retry, path, || async move {
            tracing::debug!("PATCH {}", path);
            let response = self
                .client
                .patch(self.url(path))
                .bearer_auth(&self.api_token)
                .json(body)
                .send()
                .await?;
            self.check(response, resource, id).await?;
            Ok(())
        })
        .await
    }

    async fn delete_no_content(
        &self,
        path: &str,
        resource: &'static str,
        id: &str,
    ) -> Result<()> {
        with_retry(&self.retry, path, || async move {
            tracing::debug!("DELETE {}", path);
            let response = self
                .client
                .delete(self.url(path))
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            self.check(response, resource, id).await?;
            Ok(())
        })
        .await
    }

    async fn instance_action(&self, id: &str, action: &str) -> Result<()> {
        self.post_no_content(
            &format!("/compute/instances/{}/action", id),
            &InstanceAction { action },
            "instance",
            id,
        )
        .await
    }
}

#[async_trait]
impl ComputeApi for HttpComputeApi {
    async fn get_instance(&self, id: &str) -> Result<Instance> {
        self.get_json(&format!("/compute/instances/{}", id), "instance", id)
            .await
    }

    async fn create_instance(&self, req: &CreateInstanceRequest) -> Result<Instance> {
        self.post_json("/compute/instances", req, "instance", &req.name)
            .await
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.delete_no_content(&format!("/compute/instances/{}", id), "instance", id)
            .await
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        self.instance_action(id, "start").await
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        self.instance_action(id, "stop").await
    }

    async fn shelve_instance(&self, id: &str) -> Result<()> {
        self.instance_action(id, "shelve").await
    }

    async fn unshelve_instance(&self, id: &str) -> Result<()> {
        self.instance_action(id, "unshelve").await
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        opts: &AttachVolumeOptions,
    ) -> Result<()> {
        self.post_no_content(
            &format!("/compute/instances/{}/volumes", instance_id),
            &AttachVolumeBody {
                volume_id,
                device: opts.device.as_deref(),
                delete_on_termination: opts.delete_on_termination,
            },
            "volume",
            volume_id,
        )
        .await
    }

    async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<()> {
        self.delete_no_content(
            &format!("/compute/instances/{}/volumes/{}", instance_id, volume_id),
            "volume",
            volume_id,
        )
        .await
    }

    async fn update_volume_attachment(
        &self,
        instance_id: &str,
        volume_id: &str,
        delete_on_termination: bool,
    ) -> Result<()> {
        self.patch_no_content(
            &format!("/compute/instances/{}/volumes/{}", instance_id, volume_id),
            &UpdateAttachmentBody {
                delete_on_termination,
            },
            "volume",
            volume_id,
        )
        .await
    }

    async fn attach_interface(&self, instance_id: &str, port_id: &str) -> Result<()> {
        self.post_no_content(
            &format!("/compute/instances/{}/interfaces", instance_id),
            &AttachInterfaceBody { port_id },
            "interface",
            port_id,
        )
        .await
    }

    async fn detach_interface(&self, instance_id: &str, port_id: &str) -> Result<()> {
        self.delete_no_content(
            &format!("/compute/instances/{}/interfaces/{}", instance_id, port_id),
            "interface",
            port_id,
        )
        .await
    }

    async fn list_interfaces(&self, instance_id: &str) -> Result<Vec<InterfaceAttachment>> {
        self.get_json(
            &format!("/compute/instances/{}/interfaces", instance_id),
            "instance",
            instance_id,
        )
        .await
    }

    async fn get_interface(&self, port_id: &str) -> Result<InterfaceAttachment> {
        self.get_json(&format!("/network/ports/{}", port_id), "interface", port_id)
            .await
    }

    async fn create_volume(&self, req: &CreateVolumeRequest) -> Result<Volume> {
        self.post_json(
            "/storage/volumes",
            req,
            "volume",
            req.name.as_deref().unwrap_or(""),
        )
        .await
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        self.get_json(&format!("/storage/volumes/{}", id), "volume", id)
            .await
    }

    async fn extend_volume(&self, id: &str, new_size_gb: i64) -> Result<()> {
        self.post_no_content(
            &format!("/storage/volumes/{}/extend", id),
            &ExtendVolumeBody { new_size_gb },
            "volume",
            id,
        )
        .await
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.delete_no_content(&format!("/storage/volumes/{}", id), "volume", id)
            .await
    }

    async fn create_snapshot(&self, req: &CreateSnapshotRequest) -> Result<Snapshot> {
        self.post_json("/storage/snapshots", req, "snapshot", &req.volume_id)
            .await
    }

    async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        self.get_json(&format!("/storage/snapshots/{}", id), "snapshot", id)
            .await
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.delete_no_content(&format!("/storage/snapshots/{}", id), "snapshot", id)
            .await
    }

    async fn import_keypair(&self, req: &ImportKeypairRequest) -> Result<Keypair> {
        self.post_json("/compute/keypairs", req, "keypair", &req.name)
            .await
    }

    async fn get_keypair(&self, name: &str) -> Result<Keypair> {
        self.get_json(&format!("/compute/keypairs/{}", name), "keypair", name)
            .await
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        self.delete_no_content(&format!("/compute/keypairs/{}", name), "keypair", name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            endpoint: "https://api.strato.cloud/v2/".to_string(),
            api_token: "token".to_string(),
        }
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let api = HttpComputeApi::new(config());
        assert_eq!(
            api.url("/compute/instances/i-1"),
            "https://api.strato.cloud/v2/compute/instances/i-1"
        );
    }

    #[test]
    fn test_retry_policy_defaults_and_override() {
        let api = HttpComputeApi::new(config());
        assert_eq!(api.retry.max_attempts, RetryPolicy::default().max_attempts);

        let api = api.with_retry_policy(RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        });
        assert_eq!(api.retry.max_attempts, 5);
    }
}
