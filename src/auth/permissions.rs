use serde::{Deserialize, Serialize};

/// Single-letter permission aliases carried by the principal's permission string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
}

impl Permission {
    pub fn alias(self) -> char {
        match self {
            Permission::Create => 'c',
            Permission::Read => 'r',
            Permission::Update => 'u',
            Permission::Delete => 'd',
        }
    }

    pub fn from_alias(alias: char) -> Option<Self> {
        match alias {
            'c' => Some(Permission::Create),
            'r' => Some(Permission::Read),
            'u' => Some(Permission::Update),
            'd' => Some(Permission::Delete),
            _ => None,
        }
    }
}

/// Authenticated caller, as vouched for by the upstream gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: String,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(owner_id: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            owner_id: owner_id.into(),
            permissions,
        }
    }

    /// Parses a permission string such as `"crud"`. Unknown letters are ignored.
    pub fn from_aliases(owner_id: impl Into<String>, aliases: &str) -> Self {
        let mut permissions = Vec::new();
        for permission in aliases.chars().filter_map(Permission::from_alias) {
            if !permissions.contains(&permission) {
                permissions.push(permission);
            }
        }
        Self::new(owner_id, permissions)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
