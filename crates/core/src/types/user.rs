//! User profile types.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Profile of the signed-in customer, as returned by the backend.
///
/// Cached in the credential store alongside the token pair so the UI can
/// render account state without a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID.
    pub id: UserId,
    /// Account email address.
    pub email: Email,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Company name, for business customers.
    pub company_name: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Whether the account is flagged as a business customer.
    pub is_business_customer: bool,
}

impl UserProfile {
    /// Full display name (`first_name last_name`).
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_profile() {
        let json = serde_json::json!({
            "id": 7,
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "company_name": null,
            "phone": "+4520123456",
            "is_business_customer": false
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.id, UserId::new(7));
        assert_eq!(profile.email.as_str(), "ada@example.com");
        assert_eq!(profile.full_name(), "Ada Lovelace");
        assert!(!profile.is_business_customer);
    }
}
