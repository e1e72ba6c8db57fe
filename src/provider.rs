//! Host-facing provider service.
//!
//! [`ProviderService`] is the surface a plugin host drives: schema lookup,
//! config validation, and CRUD plus import over JSON state. [`UserProvider`]
//! implements it for `pagerduty_user` by validating state once, decoding it
//! into a [`UserRecord`], and delegating to a [`UserReconciler`].
//!
//! Bridging to a concrete plugin protocol is left to the host adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::{Client, UserApi};
use crate::config::{diagnostics_error, provider_config_schema, ClientConfig};
use crate::error::{ProviderError, Result};
use crate::resource::{user_schema, UserReconciler, UserRecord, USER_RESOURCE};
use crate::retry::RetryPolicy;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::validation::{validate, validate_result};

/// A resource adopted through import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Operations a plugin host invokes on the provider.
///
/// State crosses this boundary as JSON; implementations decode it into typed
/// records before doing any work.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Names of the resource types this provider manages.
    fn resource_types(&self) -> Vec<String> {
        self.schema().resources.keys().cloned().collect()
    }

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let schema = self.schema();
        let resource = schema
            .resource(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validate(resource, &config))
    }

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>> {
        Err(ProviderError::UnknownResource(format!(
            "import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// Provider for the `pagerduty_user` resource.
#[derive(Debug, Clone)]
pub struct UserProvider<C> {
    reconciler: UserReconciler<C>,
}

impl UserProvider<Client> {
    /// Build a provider talking to PagerDuty over HTTP.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built from `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::from_config_with_policy(config, RetryPolicy::default())
    }

    /// Like [`from_config`](Self::from_config) with an explicit retry policy.
    pub fn from_config_with_policy(config: ClientConfig, policy: RetryPolicy) -> Result<Self> {
        let client = Client::new(config)?;
        Ok(Self::new(UserReconciler::with_policy(client, policy)))
    }

    /// Build a provider from the host's provider configuration block.
    pub fn from_value(config: &Value) -> Result<Self> {
        Self::from_config(ClientConfig::from_value(config)?)
    }
}

impl<C: UserApi> UserProvider<C> {
    /// Wrap an existing reconciler.
    pub fn new(reconciler: UserReconciler<C>) -> Self {
        Self { reconciler }
    }

    /// The wrapped reconciler.
    pub fn reconciler(&self) -> &UserReconciler<C> {
        &self.reconciler
    }
}

fn ensure_user_resource(resource_type: &str) -> Result<()> {
    if resource_type == USER_RESOURCE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

/// Decode configuration-derived state, checking it against the schema first.
fn decode_planned(state: Value) -> Result<UserRecord> {
    validate_result(&user_schema(), &state).map_err(diagnostics_error)?;
    decode_stored(state)
}

/// Decode state this provider produced earlier.
///
/// Hosts send `null` for unset attributes; those decode to their defaults.
fn decode_stored(state: Value) -> Result<UserRecord> {
    Ok(serde_json::from_value(without_nulls(state))?)
}

fn without_nulls(state: Value) -> Value {
    match state {
        Value::Object(mut map) => {
            map.retain(|_, value| !value.is_null());
            Value::Object(map)
        },
        other => other,
    }
}

fn encode(record: &UserRecord) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

#[async_trait::async_trait]
impl<C: UserApi + 'static> ProviderService for UserProvider<C> {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(USER_RESOURCE, user_schema())
    }

    #[instrument(skip_all, name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        ensure_user_resource(resource_type)?;
        let desired = decode_planned(planned_state)?;
        let record = self.reconciler.create(desired).await?;
        encode(&record)
    }

    #[instrument(skip_all, name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value> {
        ensure_user_resource(resource_type)?;
        let current = decode_stored(current_state)?;
        let record = self.reconciler.read(current).await?;
        encode(&record)
    }

    #[instrument(skip_all, name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        ensure_user_resource(resource_type)?;
        let prior = decode_stored(prior_state)?;
        let planned = decode_planned(planned_state)?;
        let record = self.reconciler.update(&prior, planned).await?;
        encode(&record)
    }

    #[instrument(skip_all, name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        ensure_user_resource(resource_type)?;
        let current = decode_stored(current_state)?;
        let record = self.reconciler.delete(current).await?;
        debug!(absent = record.id.is_empty(), "delete finished");
        Ok(())
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>> {
        ensure_user_resource(resource_type)?;
        let record = self.reconciler.import(id).await?;
        Ok(vec![ImportedResource::new(USER_RESOURCE, encode(&record)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiCall, ScriptedUserApi};
    use crate::types::User;
    use serde_json::json;

    fn provider(api: &ScriptedUserApi) -> UserProvider<ScriptedUserApi> {
        UserProvider::new(UserReconciler::new(api.clone()))
    }

    fn alice_remote(id: &str) -> User {
        User {
            id: Some(id.to_string()),
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            kind: "user".to_string(),
            role: "admin".to_string(),
            contact_methods: Vec::new(),
        }
    }

    #[test]
    fn test_schema_lists_user_resource() {
        let api = ScriptedUserApi::new();
        let provider = provider(&api);
        assert_eq!(provider.resource_types(), vec![USER_RESOURCE.to_string()]);
        let schema = provider.schema();
        assert!(schema.provider.attributes["token"].sensitive);
        assert!(schema.resources[USER_RESOURCE].attributes["name"].is_required());
    }

    #[test]
    fn test_from_value_builds_http_provider() {
        let provider = UserProvider::from_value(&json!({"token": "abc"})).unwrap();
        assert_eq!(
            provider.reconciler().policy().timeout,
            std::time::Duration::from_secs(120)
        );
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let api = ScriptedUserApi::new();
        let provider = provider(&api);

        let diags = provider
            .validate_resource_config(
                USER_RESOURCE,
                json!({"name": "Alice", "email": "a@x.com", "type": "user", "role": "admin"}),
            )
            .await
            .unwrap();
        assert!(diags.is_empty());

        let diags = provider
            .validate_resource_config(USER_RESOURCE, json!({"name": "Alice"}))
            .await
            .unwrap();
        assert_eq!(diags.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let api = ScriptedUserApi::new();
        let provider = provider(&api);

        let err = provider
            .validate_resource_config("pagerduty_team", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = provider.create("pagerduty_team", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_returns_state_with_id() {
        let api = ScriptedUserApi::new();
        api.push_create(Ok(alice_remote("U1")));
        api.push_get(Ok(alice_remote("U1")));

        let state = provider(&api)
            .create(
                USER_RESOURCE,
                json!({"name": "Alice", "email": "a@x.com", "type": "user", "role": "admin"}),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "U1");
        assert_eq!(state["contact_methods"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_accepts_null_unset_attributes() {
        let api = ScriptedUserApi::new();
        api.push_create(Ok(alice_remote("U1")));
        api.push_get(Ok(alice_remote("U1")));
        let provider = provider(&api);
        let planned = json!({
            "id": null,
            "name": "Alice",
            "email": "a@x.com",
            "type": "user",
            "role": "admin",
            "contact_methods": null,
            "last_updated": null
        });

        let diags = provider
            .validate_resource_config(USER_RESOURCE, planned.clone())
            .await
            .unwrap();
        assert!(diags.is_empty());

        let state = provider.create(USER_RESOURCE, planned).await.unwrap();
        assert_eq!(state["id"], "U1");
        assert_eq!(api.count(|c| matches!(c, ApiCall::Create(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_accepts_null_stored_attributes() {
        let api = ScriptedUserApi::new();
        api.push_get(Ok(alice_remote("U1")));

        let state = provider(&api)
            .read(
                USER_RESOURCE,
                json!({"id": "U1", "name": "Alice", "contact_methods": null, "last_updated": null}),
            )
            .await
            .unwrap();

        assert_eq!(state["email"], "a@x.com");
        assert_eq!(state["contact_methods"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_invalid_state_without_remote_call() {
        let api = ScriptedUserApi::new();

        let err = provider(&api)
            .create(USER_RESOURCE, json!({"name": "Alice", "email": 5}))
            .await
            .unwrap_err();

        match err {
            ProviderError::Validation(msg) => {
                assert!(msg.contains("email"), "{msg}");
                assert!(msg.contains("role"), "{msg}");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_remote_returns_empty_id() {
        let api = ScriptedUserApi::new();
        api.push_get(Err(ProviderError::NotFound("status 404".to_string())));

        let state = provider(&api)
            .read(
                USER_RESOURCE,
                json!({"id": "U404", "name": "Alice", "email": "a@x.com", "type": "user", "role": "admin"}),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_passes_prior_id() {
        let api = ScriptedUserApi::new();
        let mut updated = alice_remote("U1");
        updated.role = "observer".to_string();
        api.push_update(Ok(updated.clone()));
        api.push_get(Ok(updated));

        let state = provider(&api)
            .update(
                USER_RESOURCE,
                json!({"id": "U1", "name": "Alice", "email": "a@x.com", "type": "user", "role": "admin"}),
                json!({"name": "Alice", "email": "a@x.com", "type": "user", "role": "observer"}),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "U1");
        assert_eq!(state["role"], "observer");
        assert!(state["last_updated"].is_string());
        assert_eq!(api.count(|c| matches!(c, ApiCall::Update(id, _) if id == "U1")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let api = ScriptedUserApi::new();
        api.push_delete(Ok(()));

        provider(&api)
            .delete(USER_RESOURCE, json!({"id": "U1", "name": "Alice"}))
            .await
            .unwrap();

        assert_eq!(api.calls(), vec![ApiCall::Delete("U1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import() {
        let api = ScriptedUserApi::new();
        api.push_get(Ok(alice_remote("PXPGF42")));

        let imported = provider(&api)
            .import_resource(USER_RESOURCE, "PXPGF42")
            .await
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, USER_RESOURCE);
        assert_eq!(imported[0].state["id"], "PXPGF42");
        assert_eq!(imported[0].state["email"], "a@x.com");
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new(USER_RESOURCE, json!({"id": "U1"}));
        assert_eq!(imported.resource_type, "pagerduty_user");
        assert_eq!(imported.state["id"], "U1");
    }
}
