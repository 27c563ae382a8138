pub mod card;
pub mod plan;
pub mod quota;
pub mod subscription;

pub use card::{Card, CardStatus, IssueCardRequest, NewCard, MAX_VALID_DAYS};
pub use plan::{Plan, PlanSeed};
pub use quota::{QuotaDecision, QuotaIncrement, QuotaWindow};
pub use subscription::{NewSubscription, Redemption, Subscription, SubscriptionStatus, SweepStats};

/// Opaque user identifier supplied by the caller.
pub type UserId = i64;
