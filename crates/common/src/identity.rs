//! Caller identity handed to the core by the authentication layer.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Authorization level of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

/// An authenticated caller. The core trusts this value as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: UserId,
    pub role: Role,
}

impl Requester {
    /// An ordinary shopper.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// An administrator.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if the caller may read data owned by `owner`.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_only_access_their_own_data() {
        let me = UserId::new();
        let requester = Requester::customer(me);
        assert!(requester.can_access(me));
        assert!(!requester.can_access(UserId::new()));
    }

    #[test]
    fn admins_access_everything() {
        let requester = Requester::admin(UserId::new());
        assert!(requester.is_admin());
        assert!(requester.can_access(UserId::new()));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(Role::default(), Role::Customer);
    }
}
