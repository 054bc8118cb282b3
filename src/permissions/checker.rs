//! Permission checker with caching.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::{Role, UserRepo};

/// Resolved role and ban state of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub role: Role,
    pub banned: bool,
}

impl Access {
    /// Owners and admins that are not banned.
    pub fn is_authorized(self) -> bool {
        matches!(self.role, Role::Owner | Role::Admin) && !self.banned
    }
}

/// Why a moderation action was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Refusal {
    #[error("You cannot ban the bot owner.")]
    TargetIsOwner,

    #[error("You cannot ban yourself.")]
    TargetIsSelf,

    #[error("Only the bot owner can manage admins.")]
    NotOwner,

    #[error("You cannot remove your own admin rights.")]
    RemoveSelf,

    #[error("The bot owner is always an admin.")]
    OwnerRole,
}

/// Permission checker with caching support.
///
/// Bot owners (from OWNER_ID) are never banned and always authorized.
#[derive(Clone)]
pub struct Permissions {
    users: Arc<UserRepo>,
    cache: TypedCache<u64, Access>,
    owner_ids: Arc<[u64]>,
}

impl Permissions {
    pub fn new(users: Arc<UserRepo>, owner_ids: &[u64]) -> Self {
        let cache = TypedCache::new(
            "access",
            CacheConfig::access(),
        );

        Self {
            users,
            cache,
            owner_ids: Arc::from(owner_ids),
        }
    }

    /// Check if a user is a bot owner.
    #[inline]
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }

    /// Resolve a user's role and ban state.
    pub async fn access(&self, user_id: u64) -> anyhow::Result<Access> {
        if self.is_owner(user_id) {
            return Ok(Access {
                role: Role::Owner,
                banned: false,
            });
        }

        if let Some(access) = self.cache.get(&user_id) {
            return Ok(access);
        }

        let access = match self.users.get(user_id).await? {
            Some(user) => Access {
                role: if user.is_admin { Role::Admin } else { Role::Regular },
                banned: user.is_banned,
            },
            None => Access {
                role: Role::Regular,
                banned: false,
            },
        };

        self.cache.insert(user_id, access);
        Ok(access)
    }

    pub async fn is_banned(&self, user_id: u64) -> anyhow::Result<bool> {
        Ok(self.access(user_id).await?.banned)
    }

    /// Owner or admin, and not banned.
    pub async fn is_authorized(&self, user_id: u64) -> anyhow::Result<bool> {
        Ok(self.access(user_id).await?.is_authorized())
    }

    /// Validate a ban issued by `actor` against `target`.
    pub fn check_ban(&self, actor: u64, target: u64) -> Result<(), Refusal> {
        if self.is_owner(target) {
            return Err(Refusal::TargetIsOwner);
        }
        if actor == target {
            return Err(Refusal::TargetIsSelf);
        }
        Ok(())
    }

    /// Validate an admin grant (`grant = true`) or revocation.
    pub fn check_admin_change(&self, actor: u64, target: u64, grant: bool) -> Result<(), Refusal> {
        if !self.is_owner(actor) {
            return Err(Refusal::NotOwner);
        }
        if !grant && actor == target {
            return Err(Refusal::RemoveSelf);
        }
        if self.is_owner(target) {
            return Err(Refusal::OwnerRole);
        }
        Ok(())
    }

    pub async fn set_banned(&self, target: u64, banned: bool) -> anyhow::Result<()> {
        self.users.set_banned(target, banned).await?;
        self.cache.invalidate(&target);
        debug!("Access cache invalidated for {} (banned = {})", target, banned);
        Ok(())
    }

    pub async fn set_admin(&self, target: u64, admin: bool) -> anyhow::Result<()> {
        self.users.set_admin(target, admin).await?;
        self.cache.invalidate(&target);
        debug!("Access cache invalidated for {} (admin = {})", target, admin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    const OWNER: u64 = 1;

    fn permissions() -> Permissions {
        let db = Database::in_memory().unwrap();
        Permissions::new(Arc::new(UserRepo::new(&db, "{title}")), &[OWNER])
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let perms = permissions();

        assert!(!perms.is_banned(10).await.unwrap());
        perms.set_banned(10, true).await.unwrap();
        assert!(perms.is_banned(10).await.unwrap());
        perms.set_banned(10, false).await.unwrap();
        assert!(!perms.is_banned(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_is_never_banned() {
        let perms = permissions();

        assert_eq!(perms.check_ban(20, OWNER), Err(Refusal::TargetIsOwner));
        assert_eq!(perms.check_ban(20, 20), Err(Refusal::TargetIsSelf));
        assert!(perms.check_ban(20, 21).is_ok());

        // Even a stray database flag does not lock the owner out.
        perms.set_banned(OWNER, true).await.unwrap();
        assert!(perms.is_authorized(OWNER).await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_rights() {
        let perms = permissions();

        assert!(!perms.is_authorized(30).await.unwrap());
        perms.set_admin(30, true).await.unwrap();
        assert_eq!(perms.access(30).await.unwrap().role, Role::Admin);
        assert!(perms.is_authorized(30).await.unwrap());

        perms.set_banned(30, true).await.unwrap();
        assert!(!perms.is_authorized(30).await.unwrap());
    }

    #[test]
    fn test_admin_change_rules() {
        let perms = permissions();

        assert_eq!(perms.check_admin_change(30, 31, true), Err(Refusal::NotOwner));
        assert_eq!(perms.check_admin_change(OWNER, OWNER, false), Err(Refusal::RemoveSelf));
        assert_eq!(perms.check_admin_change(OWNER, OWNER, true), Err(Refusal::OwnerRole));
        assert!(perms.check_admin_change(OWNER, 31, true).is_ok());
    }
}
