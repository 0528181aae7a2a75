use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Community role carried in the bearer token
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Moderator,
    Admin,
}

/// The signed-in user a request acts on behalf of.
///
/// Built once per request from the verified token claims and handed to
/// services explicitly, so nothing below the HTTP layer looks up the
/// current user on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub user_id: ObjectId,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
}

impl Viewer {
    pub fn new(user_id: ObjectId) -> Self {
        Viewer {
            user_id,
            display_name: None,
            avatar: None,
            role: Role::Member,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Moderators and admins may act on content they did not author
    pub fn can_moderate(&self) -> bool {
        matches!(self.role, Role::Moderator | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moderators_and_admins_moderate() {
        let id = ObjectId::new();
        assert!(!Viewer::new(id).can_moderate());
        assert!(Viewer::new(id).with_role(Role::Moderator).can_moderate());
        assert!(Viewer::new(id).with_role(Role::Admin).can_moderate());
    }

    #[test]
    fn role_defaults_to_member_when_missing() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            role: Role,
        }
        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(w.role, Role::Member);
        let w: Wrapper = serde_json::from_str(r#"{"role":"admin"}"#).unwrap();
        assert_eq!(w.role, Role::Admin);
    }
}
