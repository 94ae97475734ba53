//! Module watch subsystem: delivers module state transitions to observers.
//!
//! A `WatchRegistration` is opened against a single state filter and a single
//! observer. Delivery guarantees, which the lifecycle controller depends on:
//!
//! - the registration is fully established before any callback can fire
//!   (insertion happens under the subscriber write lock);
//! - `WatchRegistration::close()` is synchronous: once it returns, no further
//!   callback for that registration is running or will run. Dispatch holds
//!   the subscriber read lock across callbacks, so `close()` blocks on any
//!   in-flight delivery before removing the subscription.
//!
//! Observers are told when a module *enters* the watched state and when a
//! previously seen module *leaves* it again; `close()` retires every module
//! still tracked so observers can release per-module state.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::contracts::ModuleObserver;

/// Lifecycle states a module moves through in the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Installed,
    Resolved,
    Active,
    Uninstalled,
}

/// A template resource a module advertises: a path relative to the module
/// root plus the template source.
#[derive(Debug, Clone)]
pub struct TemplateResource {
    pub path: String,
    pub source: Arc<str>,
}

/// Immutable description of a module as seen by observers.
#[derive(Debug)]
pub struct ModuleInfo {
    name: Arc<str>,
    templates: Vec<TemplateResource>,
}

impl ModuleInfo {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            templates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_template(mut self, path: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        self.templates.push(TemplateResource {
            path: path.into(),
            source: source.into(),
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn templates(&self) -> &[TemplateResource] {
        &self.templates
    }
}

struct Subscription {
    filter: ModuleState,
    observer: Arc<dyn ModuleObserver>,
    // Modules currently in the watched state for this subscription.
    tracked: Mutex<HashMap<Arc<str>, Arc<ModuleInfo>>>,
}

struct WatchInner {
    subs: RwLock<HashMap<u64, Arc<Subscription>>>,
    next_id: AtomicU64,
}

/// Fan-out point for module state transitions.
///
/// Subscription state lives behind an internal `Arc` so a
/// `WatchRegistration` can be closed independently of the handle that
/// opened it.
pub struct ModuleWatch {
    inner: Arc<WatchInner>,
}

impl ModuleWatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WatchInner {
                subs: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Open a watch over modules in `filter` state, delivering to `observer`.
    pub fn start(
        &self,
        filter: ModuleState,
        observer: Arc<dyn ModuleObserver>,
    ) -> WatchRegistration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let sub = Arc::new(Subscription {
            filter,
            observer,
            tracked: Mutex::new(HashMap::new()),
        });
        self.inner.subs.write().insert(id, sub);
        WatchRegistration {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Report a module state transition to all interested observers.
    ///
    /// Callable from any thread; callbacks run on the calling thread while
    /// the subscriber read lock is held.
    pub fn module_changed(&self, module: &Arc<ModuleInfo>, state: ModuleState) {
        let subs = self.inner.subs.read();
        for sub in subs.values() {
            if state == sub.filter {
                let newly_tracked = sub
                    .tracked
                    .lock()
                    .insert(module.name().clone(), Arc::clone(module))
                    .is_none();
                if newly_tracked {
                    sub.observer.module_arrived(module);
                }
            } else {
                let was_tracked = sub.tracked.lock().remove(module.name()).is_some();
                if was_tracked {
                    sub.observer.module_departed(module);
                }
            }
        }
    }

    /// Number of open registrations, mainly for assertions.
    #[must_use]
    pub fn open_registrations(&self) -> usize {
        self.inner.subs.read().len()
    }
}

impl Default for ModuleWatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Active subscription handle; closing it stops delivery synchronously.
pub struct WatchRegistration {
    inner: Arc<WatchInner>,
    id: u64,
}

impl WatchRegistration {
    /// Close the subscription.
    ///
    /// Blocks until any in-flight delivery completes, then retires every
    /// still-tracked module through `module_departed` so the observer can
    /// drop its per-module state. After return, no further notification is
    /// delivered for this registration.
    pub fn close(self) {
        let removed = self.inner.subs.write().remove(&self.id);
        if let Some(sub) = removed {
            let tracked: Vec<Arc<ModuleInfo>> =
                sub.tracked.lock().drain().map(|(_, m)| m).collect();
            for module in &tracked {
                sub.observer.module_departed(module);
            }
        }
    }
}
