//! Badge-based permission checks.

use super::types::Permission;
use crate::webhooks::Badge;

/// Roles derived from a sender's badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    /// Moderator or broadcaster.
    pub moderator: bool,
    pub subscriber: bool,
    pub vip: bool,
}

impl Roles {
    pub fn from_badges(badges: &[Badge]) -> Self {
        let mut roles = Roles::default();
        for badge in badges {
            match badge.set_id.as_str() {
                "moderator" | "broadcaster" => roles.moderator = true,
                "subscriber" | "founder" => roles.subscriber = true,
                "vip" => roles.vip = true,
                _ => {}
            }
        }
        roles
    }

    /// Whether these roles may run a command requiring `required`.
    ///
    /// Moderators and the broadcaster may run anything. Nothing else grants
    /// the `mod` tier; in particular a VIP or subscriber badge does not.
    pub fn permits(&self, required: Permission) -> bool {
        if self.moderator {
            return true;
        }
        match required {
            Permission::All => true,
            Permission::Sub => self.subscriber,
            Permission::Vip => self.vip,
            Permission::Mod => false,
        }
    }
}
