//! Wire types for the PagerDuty REST API.
//!
//! PagerDuty wraps every user payload in a `{"user": ...}` envelope and
//! reports failures as `{"error": {"message", "code", "errors"}}`.

use serde::{Deserialize, Serialize};

/// A contact method reference attached to a user.
///
/// The remote sends more fields (`id`, `self`, `html_url`); only the ones
/// tracked in state are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMethod {
    /// Contact method type, e.g. `email_contact_method_reference`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human-readable summary, usually the address or number.
    #[serde(default)]
    pub summary: String,
}

impl ContactMethod {
    /// Create a new contact method.
    pub fn new(kind: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            summary: summary.into(),
        }
    }
}

/// A PagerDuty user as sent to and received from the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Remote-assigned id; absent in create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Object type, `user` for regular users.
    #[serde(rename = "type")]
    pub kind: String,
    /// Account role, e.g. `admin`, `user`, `limited_user`.
    pub role: String,
    /// Contact methods; computed by the remote, never written.
    #[serde(default, skip_serializing)]
    pub contact_methods: Vec<ContactMethod>,
}

/// Request and response envelope for user endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEnvelope {
    /// The wrapped user.
    pub user: User,
}

impl From<User> for UserEnvelope {
    fn from(user: User) -> Self {
        Self { user }
    }
}

/// Error body returned by the API on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    /// The wrapped error.
    pub error: ApiErrorDetail,
}

/// Detail of an API error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetail {
    /// Top-level message, e.g. `Invalid Input Provided`.
    #[serde(default)]
    pub message: String,
    /// PagerDuty error code.
    #[serde(default)]
    pub code: Option<i64>,
    /// Field-level errors.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ApiErrorDetail {
    /// Flatten the message and field errors into a single line.
    pub fn describe(&self) -> String {
        let mut out = self.message.clone();
        if let Some(code) = self.code {
            out = format!("{out} (code {code})");
        }
        if !self.errors.is_empty() {
            out = format!("{out}: {}", self.errors.join("; "));
        }
        out
    }
}
