//! Bookmark owners and the actor argument accepted by the facade.

use serde::{Deserialize, Serialize};

/// Store-assigned user identifier.
pub type UserId = i64;

/// Minimal user read model; the core only stores and compares `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// The user performing a bookmark action, given either as a raw id or as a
/// loaded user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    UserId(UserId),
    UserRef(User),
}

impl Actor {
    /// Normalizes the actor to the id that is stored on bookmark rows.
    pub fn user_id(&self) -> UserId {
        match self {
            Self::UserId(id) => *id,
            Self::UserRef(user) => user.id,
        }
    }
}

impl From<UserId> for Actor {
    fn from(value: UserId) -> Self {
        Self::UserId(value)
    }
}

impl From<User> for Actor {
    fn from(value: User) -> Self {
        Self::UserRef(value)
    }
}

impl From<&User> for Actor {
    fn from(value: &User) -> Self {
        Self::UserRef(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, User};

    #[test]
    fn both_actor_forms_normalize_to_the_same_id() {
        let homer = User {
            id: 7,
            name: "homer".to_string(),
        };
        assert_eq!(Actor::from(&homer).user_id(), 7);
        assert_eq!(Actor::from(7).user_id(), 7);
    }
}
