//! Activation cards: one-time codes bound to a plan.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};
use crate::models::UserId;
use crate::time;

/// Longest validity a card may carry: one hundred years.
pub const MAX_VALID_DAYS: i64 = 36_500;

/// Lifecycle: `new → redeemed`, `new → expired` (sweep), `new → disabled` (admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    New,
    Redeemed,
    Expired,
    Disabled,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "redeemed" => Some(Self::Redeemed),
            "expired" => Some(Self::Expired),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub code: String,
    pub plan_id: i64,
    pub status: CardStatus,
    /// Duration granted from the moment of use.
    pub valid_days: i64,
    /// Absolute redemption deadline.
    pub expires_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<UserId>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_by_admin: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Validate the card for redemption at `now` and return the duration it grants.
    ///
    /// `valid_days` always decides the duration; `expires_at` is only a deadline
    /// for using the card. A non-positive `valid_days` is a structurally invalid
    /// card and is reported as expired, as is one above `MAX_VALID_DAYS`.
    pub fn redemption_grant(&self, now: DateTime<Utc>) -> TierGateResult<TimeDelta> {
        match self.status {
            CardStatus::New => {}
            CardStatus::Redeemed | CardStatus::Disabled => {
                return Err(TierGateError::CardAlreadyRedeemed { code: self.code.clone() });
            }
            CardStatus::Expired => {
                return Err(TierGateError::CardExpired {
                    code: self.code.clone(),
                    reason: "card was retired after its deadline".to_string(),
                });
            }
        }
        if let Some(deadline) = self.expires_at {
            if now >= deadline {
                return Err(TierGateError::CardExpired {
                    code: self.code.clone(),
                    reason: format!("redemption deadline {} has passed", deadline.to_rfc3339()),
                });
            }
        }
        if self.valid_days <= 0 || self.valid_days > MAX_VALID_DAYS {
            return Err(TierGateError::CardExpired {
                code: self.code.clone(),
                reason: format!("validity is {} days", self.valid_days),
            });
        }
        time::days(self.valid_days).ok_or_else(|| TierGateError::CardExpired {
            code: self.code.clone(),
            reason: format!("validity of {} days is out of range", self.valid_days),
        })
    }
}

/// Admin request to mint a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueCardRequest {
    pub plan_code: String,
    pub valid_days: i64,
    /// Generated when absent.
    pub code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by_admin: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

impl IssueCardRequest {
    pub fn new(plan_code: impl Into<String>, valid_days: i64) -> Self {
        Self {
            plan_code: plan_code.into(),
            valid_days,
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_deadline(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Validated insert payload produced from an `IssueCardRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub code: String,
    pub plan_id: i64,
    pub valid_days: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by_admin: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{3,63}$").expect("card code pattern"))
}

/// Trim and upper-case a user-supplied code, rejecting anything outside the code alphabet.
pub fn normalize_code(raw: &str) -> TierGateResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code_pattern().is_match(&code) {
        Ok(code)
    } else {
        Err(TierGateError::MalformedCode { code: raw.to_string() })
    }
}

/// Fresh `XXXX-XXXX-XXXX-XXXX` code from a v4 UUID.
pub fn generate_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    hex.as_bytes()[..16]
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(valid_days: i64, expires_at: Option<DateTime<Utc>>) -> Card {
        Card {
            id: 1,
            code: "PRO-2024-0001".into(),
            plan_id: 3,
            status: CardStatus::New,
            valid_days,
            expires_at,
            redeemed_by: None,
            redeemed_at: None,
            created_by_admin: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn grant_uses_valid_days_even_with_deadline() {
        let now = Utc::now();
        let c = card(7, Some(now + TimeDelta::days(1)));
        assert_eq!(c.redemption_grant(now).unwrap(), TimeDelta::days(7));
    }

    #[test]
    fn zero_or_negative_validity_is_expired() {
        let now = Utc::now();
        for days in [0, -3] {
            let err = card(days, None).redemption_grant(now).unwrap_err();
            assert!(matches!(err, TierGateError::CardExpired { .. }), "{days}: {err}");
        }
    }

    #[test]
    fn oversized_validity_is_expired_not_a_panic() {
        let now = Utc::now();
        for days in [MAX_VALID_DAYS + 1, 200_000_000, i64::MAX] {
            let err = card(days, None).redemption_grant(now).unwrap_err();
            assert!(matches!(err, TierGateError::CardExpired { .. }), "{days}: {err}");
        }
        assert_eq!(
            card(MAX_VALID_DAYS, None).redemption_grant(now).unwrap(),
            TimeDelta::days(MAX_VALID_DAYS)
        );
    }

    #[test]
    fn deadline_is_exclusive() {
        let now = Utc::now();
        let err = card(5, Some(now)).redemption_grant(now).unwrap_err();
        assert!(matches!(err, TierGateError::CardExpired { .. }));
    }

    #[test]
    fn used_and_disabled_cards_report_already_redeemed() {
        let now = Utc::now();
        for status in [CardStatus::Redeemed, CardStatus::Disabled] {
            let mut c = card(5, None);
            c.status = status;
            assert!(matches!(
                c.redemption_grant(now),
                Err(TierGateError::CardAlreadyRedeemed { .. })
            ));
        }
    }

    #[test]
    fn normalize_accepts_mixed_case_and_padding() {
        assert_eq!(normalize_code("  pro-2024-0001 \n").unwrap(), "PRO-2024-0001");
    }

    #[test]
    fn normalize_rejects_garbage() {
        for raw in ["", "ab", "with space", "semi;colon", "-LEADING"] {
            assert!(normalize_code(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn generated_codes_are_well_formed_and_distinct() {
        let a = generate_code();
        let b = generate_code();
        assert_eq!(a.len(), 19);
        assert_eq!(normalize_code(&a).unwrap(), a);
        assert_ne!(a, b);
    }

    #[test]
    fn status_roundtrip() {
        for status in [CardStatus::New, CardStatus::Redeemed, CardStatus::Expired, CardStatus::Disabled] {
            assert_eq!(CardStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CardStatus::parse("bogus"), None);
    }
}
