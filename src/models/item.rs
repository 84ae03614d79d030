use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record that goes through review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Beneficiary,
    Program,
    Activity,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Beneficiary, Variant::Program, Variant::Activity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Beneficiary => "beneficiary",
            Variant::Program => "program",
            Variant::Activity => "activity",
        }
    }

    /// Prefix used when minting item identifiers, e.g. `B-3f2a…`.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Variant::Beneficiary => "B",
            Variant::Program => "P",
            Variant::Activity => "A",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    /// Accepts singular or plural path segments (`program`, `programs`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beneficiary" | "beneficiaries" => Ok(Variant::Beneficiary),
            "program" | "programs" => Ok(Variant::Program),
            "activity" | "activities" => Ok(Variant::Activity),
            other => Err(format!("unknown item variant '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Draft,
    #[serde(rename = "Pending Approval", alias = "pending_approval")]
    PendingApproval,
    Active,
    Rejected,
    Inactive,
    Suspended,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::PendingApproval => "Pending Approval",
            Status::Active => "Active",
            Status::Rejected => "Rejected",
            Status::Inactive => "Inactive",
            Status::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "draft" => Ok(Status::Draft),
            "pending approval" | "pending" => Ok(Status::PendingApproval),
            "active" | "approved" => Ok(Status::Active),
            "rejected" => Ok(Status::Rejected),
            "inactive" => Ok(Status::Inactive),
            "suspended" => Ok(Status::Suspended),
            _ => Err(format!("unknown status '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "Approved",
            Outcome::Rejected => "Rejected",
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(Outcome::Approved),
            "Rejected" => Ok(Outcome::Rejected),
            other => Err(format!("unknown decision outcome '{}'", other)),
        }
    }
}

/// The recorded result of a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    pub notes: String,
    pub outcome: Outcome,
}

/// A beneficiary, program or activity as seen by the approval workflow.
///
/// `payload` holds the variant-specific fields and is never inspected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewableItem {
    pub id: String,
    pub variant: Variant,
    pub status: Status,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decision: Option<Decision>,
    pub payload: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewableItem {
    /// Build a fresh item, either as a `Draft` or already submitted for review.
    pub fn new(
        variant: Variant,
        payload: serde_json::Value,
        created_by: &str,
        submit: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let (status, submitted_at) = if submit {
            (Status::PendingApproval, Some(now))
        } else {
            (Status::Draft, None)
        };
        Self {
            id: format!("{}-{}", variant.id_prefix(), Uuid::new_v4().simple()),
            variant,
            status,
            submitted_at,
            decision: None,
            payload,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One entry in an item's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub item_id: String,
    pub variant: Variant,
    /// `None` for the creation event.
    pub from: Option<Status>,
    pub to: Status,
    pub actor_id: String,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_spelling() {
        let json = serde_json::to_value(Status::PendingApproval).unwrap();
        assert_eq!(json, "Pending Approval");
        let back: Status = serde_json::from_str("\"pending_approval\"").unwrap();
        assert_eq!(back, Status::PendingApproval);
    }

    #[test]
    fn test_status_from_str_is_lenient() {
        assert_eq!("Pending Approval".parse::<Status>(), Ok(Status::PendingApproval));
        assert_eq!("pending-approval".parse::<Status>(), Ok(Status::PendingApproval));
        assert_eq!(" ACTIVE ".parse::<Status>(), Ok(Status::Active));
        assert!("archived".parse::<Status>().is_err());
    }

    #[test]
    fn test_variant_accepts_plural_segments() {
        assert_eq!("beneficiaries".parse::<Variant>(), Ok(Variant::Beneficiary));
        assert_eq!("Program".parse::<Variant>(), Ok(Variant::Program));
        assert_eq!("activities".parse::<Variant>(), Ok(Variant::Activity));
        assert!("donors".parse::<Variant>().is_err());
    }

    #[test]
    fn test_new_item_submitted_gets_timestamp() {
        let now = Utc::now();
        let item = ReviewableItem::new(Variant::Program, serde_json::json!({}), "u-1", true, now);
        assert_eq!(item.status, Status::PendingApproval);
        assert_eq!(item.submitted_at, Some(now));
        assert!(item.id.starts_with("P-"));

        let draft = ReviewableItem::new(Variant::Beneficiary, serde_json::json!({}), "u-1", false, now);
        assert_eq!(draft.status, Status::Draft);
        assert!(draft.submitted_at.is_none());
        assert!(draft.decision.is_none());
    }
}
