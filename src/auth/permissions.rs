use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    ViewResults,

    ViewAllPlayers,
    ManagePlayers,
    ManageTests,
    ImportScores,
    ProvisionAccounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Player,
    Coach,
}

static PLAYER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::ViewResults);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(PLAYER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllPlayers);
    permissions.insert(Permission::ManagePlayers);
    permissions.insert(Permission::ManageTests);
    permissions.insert(Permission::ImportScores);
    permissions.insert(Permission::ProvisionAccounts);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Player => &PLAYER_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Player => "player",
            Role::Coach => "coach",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "player" => Ok(Role::Player),
            "coach" => Ok(Role::Coach),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player => write!(f, "player"),
            Role::Coach => write!(f, "coach"),
        }
    }
}
