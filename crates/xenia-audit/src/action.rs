//! Classification enums for activity entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// The kind of administrative action an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// A resource was created
    Create,
    /// A resource was read or listed
    Read,
    /// A resource was modified
    Update,
    /// A resource was removed
    Delete,
    /// A sign-in attempt
    Login,
    /// A sign-out
    Logout,
    /// A booking operation
    Booking,
    /// A payment operation
    Payment,
    /// A refund operation
    Refund,
    /// An administrative/maintenance operation
    Admin,
    /// An HTTP method with no mapped action
    Other,
}

impl ActionType {
    /// Returns the canonical wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Booking => "BOOKING",
            Self::Payment => "PAYMENT",
            Self::Refund => "REFUND",
            Self::Admin => "ADMIN",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "READ" => Ok(Self::Read),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "LOGIN" => Ok(Self::Login),
            "LOGOUT" => Ok(Self::Logout),
            "BOOKING" => Ok(Self::Booking),
            "PAYMENT" => Ok(Self::Payment),
            "REFUND" => Ok(Self::Refund),
            "ADMIN" => Ok(Self::Admin),
            "OTHER" => Ok(Self::Other),
            other => Err(AuditError::UnknownVariant {
                kind: "action type",
                value: other.to_string(),
            }),
        }
    }
}

/// Retention category of an entry. Drives how long it is kept before the
/// two-phase delete reclaims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Financially or operationally critical actions (longest retention)
    Critical,
    /// Security-relevant actions such as failed sign-ins
    Security,
    /// Everything else (shortest retention)
    General,
}

impl Category {
    /// Returns the canonical wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Security => "SECURITY",
            Self::General => "GENERAL",
        }
    }

    /// All categories, in sweep order.
    pub fn all() -> [Self; 3] {
        [Self::Critical, Self::Security, Self::General]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICAL" => Ok(Self::Critical),
            "SECURITY" => Ok(Self::Security),
            "GENERAL" => Ok(Self::General),
            other => Err(AuditError::UnknownVariant {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of the recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// The request completed with a 2xx/3xx response
    #[default]
    Success,
    /// The request failed
    Failed,
}

impl EntryStatus {
    /// Returns the canonical wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(AuditError::UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}
