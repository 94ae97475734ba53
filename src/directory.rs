//! Type-safe, attribute-tagged service directory.
//!
//! Design goals:
//! - Providers publish an instance once, tagged with string attributes.
//! - Consumers discover candidates by *interface type* plus an attribute
//!   filter, without knowing who published them.
//! - Discovery returns candidates in registration order; "first seen" is the
//!   explicit tie-break, never incidental map ordering.
//!
//! Typical flows:
//! - A provider module publishes a prepared handle with a marker attribute.
//! - A consumer runs `find` with that marker, resolves the first candidate,
//!   and keeps the `Arc` for the rest of its lifecycle.
//! - Resolution is a separate step from discovery: a `ServiceRef` can go
//!   stale if its provider unregisters in between, and `resolve` reports
//!   that instead of handing out a dead handle.
//!
//! Implementation details:
//! - Key = type name via `type_name::<T>()`, which works for `T = dyn Trait`.
//! - Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on
//!   resolve).
//! - Entries carry a monotonically increasing sequence number; `find` scans
//!   in sequence order.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{any::Any, fmt, sync::Arc};

/// Stable type key for trait objects and concrete types alike.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Equality filter over registration attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrFilter {
    key: String,
    value: String,
}

impl AttrFilter {
    /// Match registrations carrying `key=value`.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        attrs.get(&self.key).is_some_and(|v| v == &self.value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The referenced registration is gone (provider unregistered it).
    #[error("service no longer available: type={type_key:?}, seq={seq}")]
    Unavailable { type_key: TypeKey, seq: u64 },

    #[error("type mismatch in directory for type={type_key:?}, seq={seq}")]
    TypeMismatch { type_key: TypeKey, seq: u64 },
}

type Boxed = Box<dyn Any + Send + Sync>;

struct Entry {
    type_key: TypeKey,
    value: Boxed,
    attrs: HashMap<String, String>,
}

/// A discovered candidate: cheap, copyable, and possibly stale by the time
/// it is resolved.
pub struct ServiceRef<T: ?Sized> {
    seq: u64,
    type_key: TypeKey,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ?Sized> Clone for ServiceRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ServiceRef<T> {}

impl<T: ?Sized> fmt::Debug for ServiceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("seq", &self.seq)
            .field("type", &self.type_key)
            .finish()
    }
}

impl<T: ?Sized> ServiceRef<T> {
    /// Registration sequence number; lower means registered earlier.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Proof that an instance was published; unregistering consumes it.
pub struct Registration {
    inner: Arc<DirectoryInner>,
    seq: u64,
}

impl Registration {
    /// Remove the published instance from the directory.
    ///
    /// `ServiceRef`s already handed out for this entry become stale;
    /// `Arc`s already resolved remain valid.
    pub fn unregister(self) {
        self.inner.map.write().remove(&self.seq);
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("seq", &self.seq).finish()
    }
}

struct DirectoryInner {
    map: RwLock<BTreeMap<u64, Entry>>,
    next_seq: AtomicU64,
}

/// Registry of published instances keyed by interface type and attributes.
///
/// Shared state lives behind an internal `Arc` so a `Registration` can
/// outlive the handle that created it.
pub struct ServiceDirectory {
    inner: Arc<DirectoryInner>,
}

impl ServiceDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                map: RwLock::new(BTreeMap::new()),
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    /// Publish an instance under the interface type `T` with attributes.
    ///
    /// `T` can be a trait object or a concrete type; consumers must discover
    /// with the same `T`.
    pub fn register_with_attrs<T>(
        &self,
        instance: Arc<T>,
        attrs: HashMap<String, String>,
    ) -> Registration
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            type_key: TypeKey::of::<T>(),
            value: Box::new(instance),
            attrs,
        };
        self.inner.map.write().insert(seq, entry);
        Registration {
            inner: Arc::clone(&self.inner),
            seq,
        }
    }

    /// Discover candidates of type `T` whose attributes satisfy `filter`.
    ///
    /// Candidates come back ordered by registration sequence, oldest first.
    #[must_use]
    pub fn find<T>(&self, filter: &AttrFilter) -> Vec<ServiceRef<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<T>();
        let map = self.inner.map.read();
        map.iter()
            .filter(|(_, entry)| entry.type_key == type_key && filter.matches(&entry.attrs))
            .map(|(&seq, _)| ServiceRef {
                seq,
                type_key,
                _marker: PhantomData,
            })
            .collect()
    }

    /// Resolve a discovered candidate to a live handle.
    ///
    /// # Errors
    /// `DirectoryError::Unavailable` if the registration was removed since
    /// discovery; `DirectoryError::TypeMismatch` if the stored value is not
    /// an `Arc<T>` (cannot happen through this API, kept as a guard).
    pub fn resolve<T>(&self, service_ref: &ServiceRef<T>) -> Result<Arc<T>, DirectoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let map = self.inner.map.read();
        let entry = map
            .get(&service_ref.seq)
            .ok_or(DirectoryError::Unavailable {
                type_key: service_ref.type_key,
                seq: service_ref.seq,
            })?;

        if let Some(arc_t) = entry.value.downcast_ref::<Arc<T>>() {
            return Ok(arc_t.clone());
        }
        Err(DirectoryError::TypeMismatch {
            type_key: service_ref.type_key,
            seq: service_ref.seq,
        })
    }

    /// Attributes of a live registration, mainly for assertions and tooling.
    #[must_use]
    pub fn attrs_of(&self, seq: u64) -> Option<HashMap<String, String>> {
        self.inner.map.read().get(&seq).map(|e| e.attrs.clone())
    }

    /// Total number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.map.read().is_empty()
    }
}

impl Default for ServiceDirectory {
    fn default() -> Self {
        Self::new()
    }
}
