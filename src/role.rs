//! Role to capability mapping.

use crate::orm::users::Role;
use bitflags::bitflags;

bitflags! {
    /// What a signed-in account may do beyond reading and interacting.
    #[derive(Default)]
    pub struct Capabilities: u32 {
        /// Create, edit and delete articles and categories.
        const MANAGE_CONTENT = 0b0000_0001;
        /// Approve, reject and flag comments; delete anyone's comment.
        const MODERATE = 0b0000_0010;
        /// Read the dashboard and change site settings.
        const ADMINISTER = 0b0000_0100;
        /// Clear caches and run database maintenance.
        const MAINTAIN = 0b0000_1000;
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Developer => "developer",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::User => Capabilities::empty(),
            Role::Admin => {
                Capabilities::MANAGE_CONTENT | Capabilities::MODERATE | Capabilities::ADMINISTER
            }
            Role::Developer => Capabilities::all(),
        }
    }

    /// Admins and developers share the admin surface.
    pub fn is_admin(&self) -> bool {
        self.capabilities().contains(Capabilities::ADMINISTER)
    }

    pub fn is_developer(&self) -> bool {
        self.capabilities().contains(Capabilities::MAINTAIN)
    }
}
