//! Testing utilities for the user provider.
//!
//! [`ScriptedUserApi`] stands in for the PagerDuty API: each operation pops
//! its next response from a queue, and every call is recorded so tests can
//! assert on exactly what went over the wire. [`ProviderTester`] drives a
//! [`ProviderService`] through whole lifecycles without a plugin host.
//!
//! # Example
//!
//! ```ignore
//! use pagerduty_provider::testing::{ProviderTester, ScriptedUserApi};
//! use pagerduty_provider::{UserProvider, UserReconciler};
//! use serde_json::json;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_create_user() {
//!     let api = ScriptedUserApi::new();
//!     api.push_create(Ok(remote_alice()));
//!     api.push_get(Ok(remote_alice()));
//!
//!     let tester = ProviderTester::new(UserProvider::new(UserReconciler::new(api.clone())));
//!     let state = tester.create("pagerduty_user", json!({
//!         "name": "Alice", "email": "a@x.com", "type": "user", "role": "admin"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["id"], "PXPGF42");
//! }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::UserApi;
use crate::error::{ProviderError, Result};
use crate::provider::{ImportedResource, ProviderService};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::User;

/// A call received by [`ScriptedUserApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `create_user` with the payload sent.
    Create(User),
    /// `get_user` with the requested id.
    Get(String),
    /// `update_user` with the target id and payload sent.
    Update(String, User),
    /// `delete_user` with the target id.
    Delete(String),
}

#[derive(Debug, Default)]
struct Script {
    creates: VecDeque<Result<User>>,
    gets: VecDeque<Result<User>>,
    updates: VecDeque<Result<User>>,
    deletes: VecDeque<Result<()>>,
    calls: Vec<ApiCall>,
}

/// In-memory [`UserApi`] answering from per-operation response queues.
///
/// Clones share the same script, so a test can hand one clone to the code
/// under test and keep another to inspect calls.
#[derive(Debug, Clone, Default)]
pub struct ScriptedUserApi {
    script: Arc<Mutex<Script>>,
    fallback: Option<fn() -> ProviderError>,
}

impl ScriptedUserApi {
    /// Create an API with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `error()` whenever a queue is empty.
    ///
    /// Without a fallback an empty queue yields a terminal error.
    pub fn with_fallback_error(mut self, error: fn() -> ProviderError) -> Self {
        self.fallback = Some(error);
        self
    }

    /// Queue the next `create_user` response.
    pub fn push_create(&self, response: Result<User>) {
        self.lock().creates.push_back(response);
    }

    /// Queue the next `get_user` response.
    pub fn push_get(&self, response: Result<User>) {
        self.lock().gets.push_back(response);
    }

    /// Queue the next `update_user` response.
    pub fn push_update(&self, response: Result<User>) {
        self.lock().updates.push_back(response);
    }

    /// Queue the next `delete_user` response.
    pub fn push_delete(&self, response: Result<()>) {
        self.lock().deletes.push_back(response);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exhausted<T>(&self, operation: &str) -> Result<T> {
        match self.fallback {
            Some(error) => Err(error()),
            None => Err(ProviderError::InvalidRequest(format!(
                "no scripted response for {}",
                operation
            ))),
        }
    }

    fn respond<T>(
        &self,
        call: ApiCall,
        operation: &str,
        queue: impl FnOnce(&mut Script) -> &mut VecDeque<Result<T>>,
    ) -> Result<T> {
        let next = {
            let mut script = self.lock();
            script.calls.push(call);
            queue(&mut script).pop_front()
        };
        next.unwrap_or_else(|| self.exhausted(operation))
    }
}

#[async_trait]
impl UserApi for ScriptedUserApi {
    async fn create_user(&self, user: &User) -> Result<User> {
        self.respond(ApiCall::Create(user.clone()), "create_user", |s| {
            &mut s.creates
        })
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        self.respond(ApiCall::Get(id.to_string()), "get_user", |s| &mut s.gets)
    }

    async fn update_user(&self, user: &User, id: &str) -> Result<User> {
        self.respond(
            ApiCall::Update(id.to_string(), user.clone()),
            "update_user",
            |s| &mut s.updates,
        )
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.respond(ApiCall::Delete(id.to_string()), "delete_user", |s| {
            &mut s.deletes
        })
    }
}

/// A test harness for [`ProviderService`] implementations.
///
/// Wraps the provider and adds lifecycle helpers that chain the CRUD calls
/// the way a host would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.resource_types()
    }

    /// Validate a resource configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> std::result::Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Create, then read back. Returns the state after the read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value> {
        let created = self.create(resource_type, config).await?;
        self.read(resource_type, created).await
    }

    /// Update, then read back. Returns the state after the read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        let updated = self
            .update(resource_type, prior_state, planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Delete, then read back. Returns the state after the read, which
    /// should be absent.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value> {
        self.delete(resource_type, current_state.clone()).await?;
        let mut gone = current_state;
        if let Value::Object(map) = &mut gone {
            map.insert("id".to_string(), Value::String(String::new()));
        }
        self.read(resource_type, gone).await
    }

    /// Run create, update and delete in sequence.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a [`ProviderTester`] call that reports diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Validation returned error diagnostics.
    #[error("{} error diagnostic(s): {}", .0.len(), render(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The provider itself failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diag| {
            let mut line = diag.summary.clone();
            if let Some(detail) = &diag.detail {
                line = format!("{line}: {detail}");
            }
            if let Some(attr) = &diag.attribute {
                line = format!("{line} (at {attr})");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_error(diagnostic: &Diagnostic) -> bool {
    matches!(diagnostic.severity, DiagnosticSeverity::Error)
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> std::result::Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a state value describes an absent resource (empty `id`).
///
/// # Panics
///
/// Panics if the state carries a non-empty id.
pub fn assert_absent(state: &Value) {
    let id = state.get("id").and_then(Value::as_str).unwrap_or_default();
    assert!(id.is_empty(), "Expected absent resource, but id is '{}'", id);
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| is_error(d)).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error whose summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matched = diagnostics
        .iter()
        .any(|d| is_error(d) && d.summary.contains(substring));
    assert!(
        matched,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| is_error(d))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
