//! # Audit Log Entries
//!
//! Write-once records of every state transition. The core only builds
//! entries; an [`crate::ports::AuditSink`] stores them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Quote,
    Booking,
    Wallet,
}

impl EntityType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Quote => "QUOTE",
            EntityType::Booking => "BOOKING",
            EntityType::Wallet => "WALLET",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Updated,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
    RevisionCreated,
    ConvertedToBooking,
    OperatorAssigned,
    OperatorAccepted,
    OperatorDeclined,
    DriverDetailsSet,
    StatusChanged,
    PaymentRecorded,
    WalletCredited,
    WalletDebited,
    MessagePosted,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::Updated => "UPDATED",
            AuditAction::Submitted => "SUBMITTED",
            AuditAction::Approved => "APPROVED",
            AuditAction::Rejected => "REJECTED",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::RevisionCreated => "REVISION_CREATED",
            AuditAction::ConvertedToBooking => "CONVERTED_TO_BOOKING",
            AuditAction::OperatorAssigned => "OPERATOR_ASSIGNED",
            AuditAction::OperatorAccepted => "OPERATOR_ACCEPTED",
            AuditAction::OperatorDeclined => "OPERATOR_DECLINED",
            AuditAction::DriverDetailsSet => "DRIVER_DETAILS_SET",
            AuditAction::StatusChanged => "STATUS_CHANGED",
            AuditAction::PaymentRecorded => "PAYMENT_RECORDED",
            AuditAction::WalletCredited => "WALLET_CREDITED",
            AuditAction::WalletDebited => "WALLET_DEBITED",
            AuditAction::MessagePosted => "MESSAGE_POSTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record with before/after JSON snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditLogEntry {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: AuditAction,
    pub previous_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub actor_id: String,
    pub actor_role: Role,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Builds an entry from before/after snapshots of any serializable record.
    pub fn snapshot<T: Serialize>(
        entity_type: EntityType,
        entity_id: &str,
        action: AuditAction,
        previous: Option<&T>,
        new: Option<&T>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        Ok(AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            previous_value: previous.map(to_json).transpose()?,
            new_value: new.map(to_json).transpose()?,
            actor_id: actor.user_id.clone(),
            actor_role: actor.role,
            timestamp: at,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> CoreResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| CoreError::Storage(format!("audit snapshot failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_quote, staff};
    use crate::types::QuoteStatus;

    #[test]
    fn test_snapshot_captures_before_and_after() {
        let before = sample_quote();
        let mut after = before.clone();
        after.status = QuoteStatus::Submitted;

        let entry = AuditLogEntry::snapshot(
            EntityType::Quote,
            &before.id,
            AuditAction::Submitted,
            Some(&before),
            Some(&after),
            &staff(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(entry.actor_role, Role::Staff);
        let prev = entry.previous_value.unwrap();
        let new = entry.new_value.unwrap();
        assert_eq!(prev["status"], "DRAFT");
        assert_eq!(new["status"], "SUBMITTED");
    }
}
