//! Template tracker: populates a `TemplateConfig` from module contents as
//! modules resolve, and empties it again as they go away.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{TemplateConfig, TemplateSettings};
use crate::contracts::ModuleObserver;
use crate::watch::ModuleInfo;

/// Whether the tracker created its configuration or was handed one.
///
/// Teardown logic branches on this tag rather than inferring ownership from
/// surrounding state: an owned configuration is the tracker's to publish, a
/// borrowed one belongs to whoever prepared it.
pub enum ConfigOwnership {
    Owned(Arc<TemplateConfig>),
    Borrowed(Arc<TemplateConfig>),
}

impl ConfigOwnership {
    fn handle(&self) -> &Arc<TemplateConfig> {
        match self {
            Self::Owned(h) | Self::Borrowed(h) => h,
        }
    }
}

/// Stateful observer bound to exactly one configuration for its lifetime.
///
/// Created once per activation cycle and discarded on deactivation. The
/// bound configuration is never replaced mid-lifecycle.
pub struct TemplateTracker {
    config: ConfigOwnership,
    // Template names inserted per module, for removal on departure.
    registered: Mutex<HashMap<Arc<str>, Vec<String>>>,
}

impl TemplateTracker {
    /// Build a tracker around a newly created, locally owned configuration.
    #[must_use]
    pub fn new(settings: TemplateSettings) -> Self {
        Self {
            config: ConfigOwnership::Owned(Arc::new(TemplateConfig::new(settings))),
            registered: Mutex::new(HashMap::new()),
        }
    }

    /// Build a tracker around an externally prepared configuration, without
    /// taking ownership of it.
    #[must_use]
    pub fn with_config(config: Arc<TemplateConfig>) -> Self {
        Self {
            config: ConfigOwnership::Borrowed(config),
            registered: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this tracker populates.
    #[must_use]
    pub fn configuration(&self) -> Arc<TemplateConfig> {
        Arc::clone(self.config.handle())
    }

    #[must_use]
    pub fn owns_configuration(&self) -> bool {
        matches!(self.config, ConfigOwnership::Owned(_))
    }

    /// Number of modules currently contributing templates.
    #[must_use]
    pub fn tracked_modules(&self) -> usize {
        self.registered.lock().len()
    }
}

impl ModuleObserver for TemplateTracker {
    fn module_arrived(&self, module: &Arc<ModuleInfo>) {
        let config = self.config.handle();
        let mut names = Vec::with_capacity(module.templates().len());
        for resource in module.templates() {
            let name = format!("{}/{}", module.name(), resource.path);
            config.insert_template(name.clone(), Arc::clone(&resource.source));
            names.push(name);
        }
        if names.is_empty() {
            return;
        }
        tracing::debug!(
            module = %module.name(),
            templates = names.len(),
            "registered module templates"
        );
        self.registered.lock().insert(module.name().clone(), names);
    }

    fn module_departed(&self, module: &Arc<ModuleInfo>) {
        let Some(names) = self.registered.lock().remove(module.name()) else {
            return;
        };
        let config = self.config.handle();
        for name in &names {
            config.remove_template(name);
        }
        tracing::debug!(
            module = %module.name(),
            templates = names.len(),
            "removed module templates"
        );
    }
}
