//! The user record held by the store and persisted to settings storage.

use serde::{Deserialize, Serialize};

/// One user account.
///
/// `user_id` is the identity: two records with the same id are the same
/// user as far as the store is concerned. The password is kept as entered;
/// nothing in this crate hashes it before persisting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub password: String,
}

impl User {
    /// Build a record with a freshly generated UUID v4 id.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            username,
            password,
            email,
            is_admin,
        )
    }

    pub fn with_id(
        user_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            email: email.into(),
            is_admin,
            password: password.into(),
        }
    }

    /// Label shown next to the user in list views.
    pub fn role_label(&self) -> &'static str {
        if self.is_admin { "ADMINISTRATOR" } else { "USER" }
    }
}
