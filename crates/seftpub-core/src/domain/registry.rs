//! Recent registry of published files
//!
//! The [`RecentRegistry`] records, for every file published during this
//! process lifetime, when it was first published and which delivery handle
//! the broker issued for it. The reconciliation loop consults it to:
//!
//! - skip files that were already published (no duplicate publish),
//! - find handles whose delivery is confirmed (safe to delete the source),
//! - evict entries older than the retention window.
//!
//! ## Invariants
//!
//! - A filename appears at most once; [`RecentRegistry::insert`] never
//!   overwrites an existing entry.
//! - Iteration order is insertion order (oldest first), which is what the
//!   status view reports.
//!
//! [`SharedRegistry`] is the cloneable handle the loop and the status
//! endpoint share. Readers only ever receive copies.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{DeliveryHandle, RemoteName};

// ============================================================================
// RegistryEntry
// ============================================================================

/// Bookkeeping for one published file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// When the file was first successfully published
    pub first_seen_at: DateTime<Utc>,
    /// Handle returned by the delivery port for the publish
    pub delivery_handle: DeliveryHandle,
}

impl RegistryEntry {
    pub fn new(first_seen_at: DateTime<Utc>, delivery_handle: DeliveryHandle) -> Self {
        Self {
            first_seen_at,
            delivery_handle,
        }
    }

    /// Time elapsed since the entry was created
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.first_seen_at
    }

    /// Returns true once the entry has outlived the retention window
    ///
    /// An entry exactly `retention` old is still retained; it becomes stale
    /// strictly after.
    pub fn is_stale(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.age(now) > retention
    }
}

// ============================================================================
// RecentRegistry
// ============================================================================

/// Insertion-ordered map from filename to [`RegistryEntry`]
#[derive(Debug, Clone, Default)]
pub struct RecentRegistry {
    entries: IndexMap<RemoteName, RegistryEntry>,
}

impl RecentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<&RegistryEntry> {
        self.entries.get(filename)
    }

    /// Registers a newly published file
    ///
    /// # Errors
    /// Returns `DomainError::AlreadyRegistered` if `filename` is present; the
    /// existing entry is left untouched.
    pub fn insert(&mut self, filename: RemoteName, entry: RegistryEntry) -> Result<(), DomainError> {
        if self.entries.contains_key(filename.as_str()) {
            return Err(DomainError::AlreadyRegistered(filename.into_inner()));
        }
        self.entries.insert(filename, entry);
        Ok(())
    }

    /// Removes an entry, preserving the order of the remaining ones
    pub fn remove(&mut self, filename: &str) -> Option<RegistryEntry> {
        self.entries.shift_remove(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of all entries, oldest first
    pub fn snapshot(&self) -> Vec<(RemoteName, RegistryEntry)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), *entry))
            .collect()
    }

    /// Numbered read-only view for status reporting, oldest first
    pub fn as_status_view(&self) -> StatusView {
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, (name, entry))| {
                (
                    index,
                    StatusEntry {
                        filename: name.as_str().to_string(),
                        first_seen_at: entry.first_seen_at,
                        delivery_handle: entry.delivery_handle,
                        confirmed: false,
                    },
                )
            })
            .collect();
        StatusView { entries }
    }
}

// ============================================================================
// Status view
// ============================================================================

/// One row of the status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub filename: String,
    pub first_seen_at: DateTime<Utc>,
    pub delivery_handle: DeliveryHandle,
    /// Whether the delivery port reports the handle as confirmed
    pub confirmed: bool,
}

/// Ordered mapping of index to [`StatusEntry`]
///
/// Serializes as a JSON object keyed by the integer index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusView {
    entries: BTreeMap<usize, StatusEntry>,
}

impl StatusView {
    /// Fills in `confirmed` for every row using `is_confirmed`
    pub fn annotate(mut self, is_confirmed: impl Fn(DeliveryHandle) -> bool) -> Self {
        for entry in self.entries.values_mut() {
            entry.confirmed = is_confirmed(entry.delivery_handle);
        }
        self
    }

    pub fn get(&self, index: usize) -> Option<&StatusEntry> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &StatusEntry)> {
        self.entries.iter()
    }
}

// ============================================================================
// SharedRegistry
// ============================================================================

/// Cloneable, thread-safe handle to a [`RecentRegistry`]
///
/// Locks are held only for the duration of a single operation, never across
/// an await point. A poisoned lock is recovered: the registry holds plain
/// data and every operation leaves it consistent.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<RecentRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.read(|registry| registry.contains(filename))
    }

    pub fn get(&self, filename: &str) -> Option<RegistryEntry> {
        self.read(|registry| registry.get(filename).copied())
    }

    pub fn insert(&self, filename: RemoteName, entry: RegistryEntry) -> Result<(), DomainError> {
        self.write(|registry| registry.insert(filename, entry))
    }

    pub fn remove(&self, filename: &str) -> Option<RegistryEntry> {
        self.write(|registry| registry.remove(filename))
    }

    pub fn len(&self) -> usize {
        self.read(RecentRegistry::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(RecentRegistry::is_empty)
    }

    pub fn snapshot(&self) -> Vec<(RemoteName, RegistryEntry)> {
        self.read(RecentRegistry::snapshot)
    }

    pub fn status_view(&self) -> StatusView {
        self.read(RecentRegistry::as_status_view)
    }

    fn read<T>(&self, f: impl FnOnce(&RecentRegistry) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut RecentRegistry) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
