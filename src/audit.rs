/// Audit trail
///
/// Security relevant actions (logins, password changes, document writes)
/// are emitted as structured log entries so they can be filtered apart
/// from request logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Signup,
    Login,
    Logout,
    ForgotPassword,
    ResetPassword,
    UpdatePassword,
    UpdateProfile,
    Deactivate,
    Create,
    Update,
    Delete,
    Checkout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "SIGNUP",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::ForgotPassword => "FORGOT_PASSWORD",
            AuditAction::ResetPassword => "RESET_PASSWORD",
            AuditAction::UpdatePassword => "UPDATE_PASSWORD",
            AuditAction::UpdateProfile => "UPDATE_PROFILE",
            AuditAction::Deactivate => "DEACTIVATE",
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Checkout => "CHECKOUT",
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub log_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// user, tour, review, booking, ...
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub success: bool,
    pub message: String,
}

impl AuditLog {
    pub fn success(action: AuditAction, resource_type: &str, message: impl Into<String>) -> Self {
        Self::new(action, resource_type, true, message.into())
    }

    pub fn failure(action: AuditAction, resource_type: &str, message: impl Into<String>) -> Self {
        Self::new(action, resource_type, false, message.into())
    }

    fn new(action: AuditAction, resource_type: &str, success: bool, message: String) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: None,
            user_id: None,
            success,
            message,
        }
    }

    pub fn with_resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Emit the entry; failures are logged at warn level
    pub fn record(&self) {
        if self.success {
            tracing::info!(
                target: "audit",
                log_id = %self.log_id,
                action = self.action.as_str(),
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                user_id = ?self.user_id,
                status = "SUCCESS",
                message = %self.message,
                "Audit log entry"
            );
        } else {
            tracing::warn!(
                target: "audit",
                log_id = %self.log_id,
                action = self.action.as_str(),
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                user_id = ?self.user_id,
                status = "FAILURE",
                message = %self.message,
                "Audit log entry"
            );
        }
    }
}
