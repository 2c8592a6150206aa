use rocket::http::Status;
use serde::Serialize;

use super::{Permission, Role};

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub player_id: Option<i64>, // Set when the account is linked to a player profile
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub player_id: Option<i64>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            role: Role::from_str(&user.role.unwrap_or_default()).unwrap(),
            player_id: user.player_id,
        }
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    fn deny(&self, wanted: &[Permission]) -> Status {
        tracing::warn!(
            email = %self.email,
            role = %self.role.as_str(),
            wanted = ?wanted,
            "permission denied"
        );
        Status::Forbidden
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(self.deny(&[permission]))
        }
    }

    // Just in case this is useful later
    pub fn _require_any_permission(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().any(|p| self.has_permission(*p)) {
            Ok(())
        } else {
            Err(self.deny(permissions))
        }
    }

    pub fn require_all_permissions(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().all(|p| self.has_permission(*p)) {
            Ok(())
        } else {
            Err(self.deny(permissions))
        }
    }
}
