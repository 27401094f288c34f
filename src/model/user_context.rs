use serde::{Deserialize, Serialize};

/// Caller identity taken from request headers, recorded on template audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_name: None,
        }
    }

    pub fn with_name(user_id: String, name: Option<String>) -> Self {
        Self {
            user_id,
            user_name: name,
        }
    }

    /// Context for internal operations such as seeding
    pub fn system() -> Self {
        Self::with_name("system".to_string(), Some("System".to_string()))
    }

    /// Context used when a request carries no user headers
    pub fn default_user() -> Self {
        Self::with_name("dev-user".to_string(), Some("Development User".to_string()))
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}
