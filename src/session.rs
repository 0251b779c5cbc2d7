//! Who is calling, and what they may do with the roadmap board.

use std::collections::HashMap;

use crate::config::AccessSection;

/// Permission flags carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub can_access_roadmap_board: bool,
    pub can_edit_roadmap_board: bool,
}

impl Permissions {
    pub const FULL: Permissions = Permissions {
        can_access_roadmap_board: true,
        can_edit_roadmap_board: true,
    };

    pub const READ_ONLY: Permissions = Permissions {
        can_access_roadmap_board: true,
        can_edit_roadmap_board: false,
    };

    /// Editing implies access; a flag set without the other is not enough.
    pub fn can_edit(&self) -> bool {
        self.can_access_roadmap_board && self.can_edit_roadmap_board
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `None` for an anonymous caller on an open board.
    pub email: Option<String>,
    pub permissions: Permissions,
}

/// Resolves a caller to a session.
pub trait SessionProvider: Send + Sync {
    /// Returns `None` when the caller is not signed in or not known.
    fn resolve(&self, email: Option<&str>) -> Option<Session>;
}

/// Session provider backed by the `[access]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    open: bool,
    users: HashMap<String, Permissions>,
}

impl StaticSessionProvider {
    /// Every caller, signed in or not, gets full permissions.
    pub fn open() -> Self {
        Self {
            open: true,
            users: HashMap::new(),
        }
    }

    /// Only listed users are recognised.
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn from_access(access: &AccessSection) -> Self {
        let mut provider = if access.open { Self::open() } else { Self::closed() };
        for user in &access.users {
            provider = provider.with_user(
                &user.email,
                Permissions {
                    can_access_roadmap_board: user.can_access_roadmap_board,
                    can_edit_roadmap_board: user.can_edit_roadmap_board,
                },
            );
        }
        provider
    }

    pub fn with_user(mut self, email: &str, permissions: Permissions) -> Self {
        self.users.insert(normalize(email), permissions);
        self
    }
}

impl SessionProvider for StaticSessionProvider {
    fn resolve(&self, email: Option<&str>) -> Option<Session> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if self.open {
            return Some(Session {
                email: email.map(str::to_string),
                permissions: Permissions::FULL,
            });
        }
        let email = email?;
        self.users.get(&normalize(email)).map(|permissions| Session {
            email: Some(email.to_string()),
            permissions: *permissions,
        })
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
