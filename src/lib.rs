//! PagerDuty Provider
//!
//! Manages PagerDuty users as declarative resources. A plugin host hands the
//! provider planned or stored state as JSON; the provider reconciles it
//! against the PagerDuty REST API and hands back the refreshed state.
//!
//! # Overview
//!
//! - **Client**: [`Client`] implements the [`UserApi`] CRUD surface over HTTP
//! - **Retry**: every remote call is bounded by a [`RetryPolicy`] (two minutes
//!   by default) and retried only while the failure is transient
//! - **Reconciler**: [`UserReconciler`] implements create, read, update,
//!   delete and import for a [`UserRecord`]
//! - **Provider**: [`UserProvider`] exposes the reconciler through the
//!   JSON-level [`ProviderService`] trait, with schema validation
//! - **Logging**: structured `tracing` output on stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use pagerduty_provider::{init_logging, ClientConfig, ProviderService, UserProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = UserProvider::from_config(ClientConfig::from_env()?)?;
//!     let state = provider
//!         .create(
//!             "pagerduty_user",
//!             json!({
//!                 "name": "Earline Greenholt",
//!                 "email": "125.greenholt.earline@graham.name",
//!                 "type": "user",
//!                 "role": "admin"
//!             }),
//!         )
//!         .await?;
//!
//!     tracing::info!(id = %state["id"], "user created");
//!     Ok(())
//! }
//! ```
//!
//! # Retry Behavior
//!
//! Timeouts, connection failures, HTTP 429 and 5xx responses are retried with
//! exponential backoff until the budget runs out. Every other failure,
//! including 404, is returned immediately. A 404 on read clears the resource
//! id instead of failing, and a 404 on delete counts as already deleted.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{Client, UserApi};
pub use config::ClientConfig;
pub use error::{ErrorClass, ProviderError, Result};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ImportedResource, ProviderService, UserProvider};
pub use resource::{ResourceState, UserReconciler, UserRecord, USER_RESOURCE};
pub use retry::{retry, RetryError, RetryPolicy};
pub use schema::ProviderSchema;
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
