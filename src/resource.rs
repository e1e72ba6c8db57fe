//! The `pagerduty_user` resource: typed state and the reconciler.
//!
//! [`UserReconciler`] drives a [`UserRecord`] through its lifecycle against a
//! [`UserApi`]. Every remote call runs inside [`retry`] with the reconciler's
//! [`RetryPolicy`], so callers only ever see success or a terminal error.
//!
//! ```text
//!   Absent --create--> (Creating) --> Present
//!   Present --read--> Present | Absent   (remote gone: id cleared, no error)
//!   Present --update--> Present          (only if name/email/type/role changed)
//!   Present --delete--> (Deleting) --> Absent
//!   import(id) --> Present               (seeded purely from the remote)
//! ```

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::client::UserApi;
use crate::error::{ProviderError, Result};
use crate::retry::{retry, RetryError, RetryPolicy};
use crate::schema::{Attribute, AttributeType, Presence, Schema};
use crate::types::{ContactMethod, User};

/// Resource type name used at the host boundary.
pub const USER_RESOURCE: &str = "pagerduty_user";

/// RFC 850 layout used for `last_updated`.
const LAST_UPDATED_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Lifecycle state of a managed user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Never created, deleted, or found missing remotely.
    Absent,
    /// A create call is in flight.
    Creating,
    /// The remote object exists and `id` refers to it.
    Present,
    /// A delete call is in flight.
    Deleting,
}

/// Local state of a PagerDuty user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    /// Remote-assigned id; empty while absent.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Object type, usually `user`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Account role.
    pub role: String,
    /// Contact methods as last reported by the remote.
    pub contact_methods: Vec<ContactMethod>,
    /// Time of the last successful remote update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl UserRecord {
    /// Desired state for a user that does not exist yet.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        kind: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            kind: kind.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// A record that only knows its remote id, as used by import.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// `Present` when the record carries an id, `Absent` otherwise.
    pub fn state(&self) -> ResourceState {
        if self.id.is_empty() {
            ResourceState::Absent
        } else {
            ResourceState::Present
        }
    }

    /// Whether any writable attribute differs from `other`.
    pub fn has_changes(&self, other: &UserRecord) -> bool {
        self.name != other.name
            || self.email != other.email
            || self.kind != other.kind
            || self.role != other.role
    }

    /// The full writable payload; never a partial diff.
    pub fn payload(&self) -> User {
        User {
            id: None,
            name: self.name.clone(),
            email: self.email.clone(),
            kind: self.kind.clone(),
            role: self.role.clone(),
            contact_methods: Vec::new(),
        }
    }

    /// Overwrite every remote-observable attribute from `user`.
    ///
    /// The id is only taken from the response when it carries one.
    pub fn apply_remote(&mut self, user: User) {
        if let Some(id) = user.id.filter(|id| !id.is_empty()) {
            self.id = id;
        }
        self.name = user.name;
        self.email = user.email;
        self.kind = user.kind;
        self.role = user.role;
        self.contact_methods = user.contact_methods;
    }

    /// Mark the record as gone remotely.
    pub fn clear(&mut self) {
        self.id.clear();
        self.contact_methods.clear();
    }

    fn touch(&mut self) {
        self.last_updated = Some(chrono::Utc::now().format(LAST_UPDATED_FORMAT).to_string());
    }
}

/// Schema of the `pagerduty_user` resource.
pub fn user_schema() -> Schema {
    Schema::v0()
        .with_description("A PagerDuty user")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("email", Attribute::required_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("role", Attribute::required_string())
        .with_attribute(
            "last_updated",
            Attribute::new(AttributeType::String, Presence::OptionalComputed),
        )
        .with_attribute(
            "contact_methods",
            Attribute::new(
                AttributeType::list(AttributeType::object([
                    ("type", AttributeType::String),
                    ("summary", AttributeType::String),
                ])),
                Presence::OptionalComputed,
            )
            .with_description("Contact methods reported by PagerDuty"),
        )
}

/// Reconciles [`UserRecord`]s against the PagerDuty API.
///
/// Holds no mutable state; one instance can serve any number of sequential
/// operations.
#[derive(Debug, Clone)]
pub struct UserReconciler<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: UserApi> UserReconciler<C> {
    /// Create a reconciler with the default two-minute retry budget.
    pub fn new(client: C) -> Self {
        Self::with_policy(client, RetryPolicy::default())
    }

    /// Create a reconciler with an explicit retry policy.
    pub fn with_policy(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The retry policy applied to every remote call.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry(&self.policy, op, |err: &ProviderError| self.client.is_retry(err))
            .await
            .map_err(|err| {
                if let RetryError::TimedOut { attempts, .. } = &err {
                    warn!(operation, attempts, error = %err, "giving up on remote call");
                }
                err.into_inner()
            })
    }

    /// Create the remote user described by `desired`.
    ///
    /// On success the record carries the remote id and contact methods. On
    /// failure nothing is returned and the caller's record stays absent.
    #[instrument(skip_all, name = "user.create")]
    pub async fn create(&self, desired: UserRecord) -> Result<UserRecord> {
        if desired.state() == ResourceState::Present {
            return Err(ProviderError::Validation(format!(
                "user already has id '{}'; refusing to create",
                desired.id
            )));
        }

        debug!(state = ?ResourceState::Creating, "creating user");
        let payload = desired.payload();
        let created = self
            .call("create", || self.client.create_user(&payload))
            .await?;

        let mut record = desired;
        record.apply_remote(created);
        if record.id.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "create response did not include a user id".to_string(),
            ));
        }
        info!(user_id = %record.id, "user created");

        Ok(self.refresh_after_write(record).await)
    }

    /// Refresh `current` from the remote.
    ///
    /// A user that no longer exists remotely comes back with an empty id and
    /// no error.
    #[instrument(skip_all, fields(user_id = %current.id), name = "user.read")]
    pub async fn read(&self, current: UserRecord) -> Result<UserRecord> {
        if current.state() == ResourceState::Absent {
            debug!("record has no id, nothing to read");
            return Ok(current);
        }

        let mut record = current;
        let id = record.id.clone();
        match self.call("read", || self.client.get_user(&id)).await {
            Ok(user) => {
                record.apply_remote(user);
                Ok(record)
            },
            Err(err) if err.is_not_found() => {
                info!("user no longer exists remotely, removing from state");
                record.clear();
                Ok(record)
            },
            Err(err) => Err(err),
        }
    }

    /// Bring the remote user in line with `planned`.
    ///
    /// The remote is only written when name, email, type or role differ from
    /// `prior`; the write always sends the full attribute set. A refresh from
    /// the remote follows either way.
    #[instrument(skip_all, fields(user_id = %prior.id), name = "user.update")]
    pub async fn update(&self, prior: &UserRecord, planned: UserRecord) -> Result<UserRecord> {
        if prior.state() == ResourceState::Absent {
            return Err(ProviderError::Validation(
                "cannot update a user that has no id".to_string(),
            ));
        }

        let mut record = planned;
        record.id = prior.id.clone();
        if record.last_updated.is_none() {
            record.last_updated = prior.last_updated.clone();
        }

        if record.has_changes(prior) {
            let payload = record.payload();
            let id = record.id.clone();
            let updated = self
                .call("update", || self.client.update_user(&payload, &id))
                .await?;
            record.apply_remote(updated);
            record.touch();
            info!("user updated");
        } else {
            debug!("no writable attribute changed, skipping remote update");
        }

        Ok(self.refresh_after_write(record).await)
    }

    /// Delete the remote user and clear the record's id.
    ///
    /// A user that is already gone counts as deleted.
    #[instrument(skip_all, fields(user_id = %current.id), name = "user.delete")]
    pub async fn delete(&self, current: UserRecord) -> Result<UserRecord> {
        let mut record = current;
        if record.state() == ResourceState::Absent {
            debug!("record has no id, nothing to delete");
            return Ok(record);
        }

        debug!(state = ?ResourceState::Deleting, "deleting user");
        let id = record.id.clone();
        match self.call("delete", || self.client.delete_user(&id)).await {
            Ok(()) => info!("user deleted"),
            Err(err) if err.is_not_found() => info!("user was already deleted"),
            Err(err) => return Err(err),
        }

        record.clear();
        Ok(record)
    }

    /// Adopt an existing remote user into management.
    ///
    /// The record is built purely from the remote; an unknown id is an error
    /// because there is nothing to adopt.
    #[instrument(skip(self), name = "user.import")]
    pub async fn import(&self, id: &str) -> Result<UserRecord> {
        if id.trim().is_empty() {
            return Err(ProviderError::Validation(
                "import requires a non-empty user id".to_string(),
            ));
        }

        let user = self.call("import", || self.client.get_user(id)).await?;
        let mut record = UserRecord::with_id(id);
        record.apply_remote(user);
        info!("user imported");
        Ok(record)
    }

    // The write already succeeded, so no refresh outcome may clear the id.
    // A 404 here is read-after-write lag, not an out-of-band delete.
    async fn refresh_after_write(&self, record: UserRecord) -> UserRecord {
        let id = record.id.clone();
        match self.call("refresh", || self.client.get_user(&id)).await {
            Ok(user) => {
                let mut refreshed = record;
                refreshed.apply_remote(user);
                refreshed
            },
            Err(err) => {
                warn!(error = %err, "refresh after write failed, keeping write response");
                record
            },
        }
    }
}
