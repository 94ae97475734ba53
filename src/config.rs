//! Template-engine configuration: the shared settings handle plus typed
//! settings loading.
//!
//! `TemplateConfig` is the one mutable object the whole capability revolves
//! around. It is deliberately opaque about concurrency to its consumers: all
//! reads and writes go through an internal `parking_lot::RwLock`, so the
//! tracker may keep inserting templates from a notification thread while
//! renderers elsewhere read concurrently. Readers get a consistent snapshot
//! per call, never a torn value.

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Settings error for typed settings operations.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid settings for module '{module}': {source}")]
    InvalidSettings {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Declarative settings for a template configuration.
///
/// Deserialized leniently from the module's settings section; every field has
/// a default so a module without a settings section gets a usable
/// configuration (caching on, no refresh, no extra loader roots).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Keep resolved templates cached after first load.
    pub cache_templates: bool,
    /// Seconds between cache refresh checks; `None` disables refresh.
    pub refresh_secs: Option<u64>,
    /// Additional loader roots consulted before module-provided templates.
    pub loader_roots: Vec<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            cache_templates: true,
            refresh_secs: None,
            loader_roots: Vec::new(),
        }
    }
}

/// Lenient settings loader: absent section means defaults.
///
/// Mirrors the behavior modules rely on at activation time:
/// - no section for the module → `Ok(T::default())`
/// - section present but invalid → `Err(ConfigError::InvalidSettings)`
pub fn settings_or_default<T: serde::de::DeserializeOwned + Default>(
    raw: Option<&serde_json::Value>,
    module_name: &str,
) -> Result<T, ConfigError> {
    let Some(raw) = raw else {
        return Ok(T::default());
    };
    serde_json::from_value(raw.clone()).map_err(|e| ConfigError::InvalidSettings {
        module: module_name.to_owned(),
        source: e,
    })
}

#[derive(Debug, Default)]
struct ConfigInner {
    settings: TemplateSettings,
    templates: BTreeMap<String, Arc<str>>,
}

/// The shared, mutable template-engine configuration handle.
///
/// Exactly one logical configuration is active per activation cycle; it is
/// either created by the tracker (owned) or supplied by another provider
/// (borrowed). Either way it is shared behind an `Arc` and mutated in place,
/// never replaced mid-lifecycle.
#[derive(Debug, Default)]
pub struct TemplateConfig {
    inner: RwLock<ConfigInner>,
}

impl TemplateConfig {
    #[must_use]
    pub fn new(settings: TemplateSettings) -> Self {
        Self {
            inner: RwLock::new(ConfigInner {
                settings,
                templates: BTreeMap::new(),
            }),
        }
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> TemplateSettings {
        self.inner.read().settings.clone()
    }

    /// Insert or replace a template source under `name`.
    pub fn insert_template(&self, name: impl Into<String>, source: Arc<str>) {
        self.inner.write().templates.insert(name.into(), source);
    }

    /// Remove a template; returns whether it was present.
    pub fn remove_template(&self, name: &str) -> bool {
        self.inner.write().templates.remove(name).is_some()
    }

    /// Resolve a template source by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<Arc<str>> {
        self.inner.read().templates.get(name).cloned()
    }

    /// Names of all currently registered templates, in sorted order.
    #[must_use]
    pub fn template_names(&self) -> Vec<String> {
        self.inner.read().templates.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().templates.is_empty()
    }
}
