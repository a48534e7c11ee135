use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use kernel::RepairReport;

use crate::domain::{Draft, Mirror, Storage, StoredResource};
use crate::error::ResourceError;
use crate::name;

/// Owns the commit order between the relational store and the filesystem mirror.
///
/// Callers never touch either store directly. Mutations of one name are
/// serialized by a per-name lock so the row and the file always end up holding
/// the same writer's payload.
pub struct ResourceService<S, M> {
    storage: S,
    mirror: M,
    locks: NameLocks,
}

impl<S: Storage, M: Mirror> ResourceService<S, M> {
    pub fn new(storage: S, mirror: M) -> Self {
        Self {
            storage,
            mirror,
            locks: NameLocks::default(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn create(
        &self,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<StoredResource, ResourceError> {
        check_name(name)?;
        self.locks.with(name, || {
            let draft = Draft {
                name,
                content,
                content_type,
                at: Utc::now(),
            };
            let created = self
                .storage
                .insert(&draft)
                .map_err(|e| ResourceError::from_store("insert", e))?;

            if let Err(e) = self.mirror.write(name, content) {
                tracing::error!("mirror write of '{name}' failed, rolling back row: {e}");
                if let Err(rollback) = self.storage.delete(name) {
                    tracing::error!(
                        "orphan row '{name}' (id {}) left behind, repair required: {rollback}",
                        created.id
                    );
                }
                return Err(ResourceError::from_mirror("mirror write", e));
            }

            tracing::info!(
                "resource: {name} created. id: {} size: {}",
                created.id,
                created.content.len()
            );
            Ok(created)
        })
    }

    pub fn read(&self, name: &str) -> Result<StoredResource, ResourceError> {
        check_name(name)?;
        self.storage
            .get(name)
            .map_err(|e| ResourceError::from_store("get", e))
    }

    pub fn update(
        &self,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<StoredResource, ResourceError> {
        check_name(name)?;
        self.locks.with(name, || {
            let draft = Draft {
                name,
                content,
                content_type,
                at: Utc::now(),
            };
            let updated = self
                .storage
                .update(&draft)
                .map_err(|e| ResourceError::from_store("update", e))?;

            if let Err(e) = self.mirror.write(name, content) {
                tracing::warn!("resource: {name} updated but mirror write failed: {e}");
                return Err(ResourceError::Inconsistent {
                    resource: Box::new(updated),
                    reason: e.to_string(),
                });
            }

            tracing::info!("resource: {name} updated. size: {}", updated.content.len());
            Ok(updated)
        })
    }

    pub fn delete(&self, name: &str) -> Result<(), ResourceError> {
        check_name(name)?;
        self.locks.with(name, || {
            let present = self
                .storage
                .contains(name)
                .map_err(|e| ResourceError::from_store("lookup", e))?;
            if !present {
                return Err(ResourceError::NotFound(name.to_owned()));
            }

            // file first: a crash in between leaves a row without a file, which repair can fix
            self.mirror
                .remove(name)
                .map_err(|e| ResourceError::from_mirror("mirror remove", e))?;
            self.storage
                .delete(name)
                .map_err(|e| ResourceError::from_store("delete", e))?;

            tracing::info!("resource: {name} deleted");
            Ok(())
        })
    }

    pub fn list(&self) -> Result<Vec<StoredResource>, ResourceError> {
        self.storage
            .list()
            .map_err(|e| ResourceError::from_store("list", e))
    }

    /// Rewrites every mirror file that is missing or whose content no longer
    /// matches the row.
    pub fn repair(&self) -> Result<RepairReport, ResourceError> {
        let mut report = RepairReport::default();
        for resource in self.list()? {
            report.checked += 1;
            let name = resource.name.as_str();
            self.locks.with(name, || {
                let stale = match self.mirror.digest(name) {
                    Ok(Some(digest)) => digest != resource.blake3_hash,
                    Ok(None) => true,
                    Err(e) => {
                        tracing::warn!("mirror of '{name}' unreadable: {e}");
                        true
                    }
                };
                if !stale {
                    return;
                }
                // the row may have changed since the listing
                let current = match self.storage.get(name) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("skip repair of '{name}': {e}");
                        return;
                    }
                };
                match self.mirror.write(name, &current.content) {
                    Ok(()) => {
                        tracing::info!("mirror of '{name}' repaired");
                        report.rewritten += 1;
                    }
                    Err(e) => {
                        tracing::error!("mirror of '{name}' cannot be repaired: {e}");
                        report.failed += 1;
                    }
                }
            });
        }
        Ok(report)
    }
}

fn check_name(name: &str) -> Result<(), ResourceError> {
    name::validate(name).map_err(|reason| ResourceError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

/// Table of per-name mutexes. Entries are dropped once nobody holds them.
#[derive(Default)]
struct NameLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    fn with<R>(&self, name: &str, action: impl FnOnce() -> R) -> R {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(name.to_owned()).or_default())
        };

        let result = {
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            action()
        };

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the table plus ours means no other waiter
        if Arc::strong_count(&entry) == 2 {
            table.remove(name);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
