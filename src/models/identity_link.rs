use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Association between one provider's subject and one local account.
///
/// Unique on `(provider_id, subject)`. Never updated; removed with its
/// provider or its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    /// The provider's `sub` claim
    pub subject: String,
    /// Email asserted by the provider when the link was created
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateIdentityLink {
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub subject: String,
    pub email: String,
}
