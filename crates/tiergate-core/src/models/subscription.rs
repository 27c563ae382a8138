//! Subscription intervals `[starts_at, expires_at)` owned by a user.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Stored status. An audit trail only: effectiveness is always computed from
/// timestamps, so a sweep that lags reality never changes the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// `active` or `pending`.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: UserId,
    pub plan_id: i64,
    pub source_card_id: Option<i64>,
    pub status: SubscriptionStatus,
    /// Plan priority captured at creation.
    pub priority: i32,
    /// Queue position among equal priorities: redemption time, then card id.
    pub redeemed_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.expires_at
    }

    /// Live status and not yet lapsed at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.expires_at > now
    }

    pub fn duration(&self) -> TimeDelta {
        self.expires_at - self.starts_at
    }

    /// Ordering key for equal-priority queues.
    pub fn queue_key(&self) -> (DateTime<Utc>, i64, i64) {
        (self.redeemed_at, self.source_card_id.unwrap_or(i64::MAX), self.id)
    }
}

/// Insert payload for a freshly scheduled subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub user_id: UserId,
    pub plan_id: i64,
    pub source_card_id: Option<i64>,
    pub status: SubscriptionStatus,
    pub priority: i32,
    pub redeemed_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub subscription: Subscription,
    pub plan_code: String,
    /// Pending subscriptions whose start moved to make room.
    pub deferred: Vec<i64>,
}

/// Counts from one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    pub expired_subscriptions: usize,
    pub activated_subscriptions: usize,
    pub expired_cards: usize,
}
