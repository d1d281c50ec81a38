//! Stratoform API client
//!
//! Typed async client for the Strato Cloud compute API. The crate exposes
//! the [`ComputeApi`] trait as the seam the reconciliation engine is built
//! against, an HTTP implementation with bearer authentication, and a
//! transport-level retry decorator.
//!
//! Error discrimination matters to callers: transport failures, 404s and
//! other API failures are distinct [`ApiError`] variants, because the
//! reconciliation layer treats "not found" as meaningful state (a deleted
//! resource) rather than as a failure.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

// Re-exports
pub use client::{ApiConfig, ComputeApi, HttpComputeApi};
pub use error::{ApiError, Result};
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    AttachVolumeOptions, CreateInstanceRequest, CreateSnapshotRequest, CreateVolumeRequest,
    CreateVolumeSpec, ImportKeypairRequest, Instance, InterfaceAttachment, Keypair, Snapshot,
    Volume, VolumeAttachment,
};
