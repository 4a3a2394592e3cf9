//! Per-user mutual exclusion for ledger mutations.
//!
//! Mutations for a given user must be serialized so the version counter never
//! loses an update and cache invalidation happens in the same order as the
//! writes it reflects. A registry of per-user locks keeps users from
//! contending with each other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{Error, database_id::UserId};

/// A registry handing out one mutation lock per user.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Get the mutation lock for `user_id`, creating it on first use.
    ///
    /// The caller locks the returned mutex and holds the guard across the
    /// ledger write and the cache invalidation that follows it.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the registry lock is poisoned.
    pub fn lock_for(&self, user_id: UserId) -> Result<Arc<Mutex<()>>, Error> {
        let mut locks = self.locks.lock().map_err(|_| Error::DatabaseLockError)?;

        Ok(Arc::clone(locks.entry(user_id).or_default()))
    }
}
