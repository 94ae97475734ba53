use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{settings_or_default, ConfigError};
use crate::directory::ServiceDirectory;
use crate::watch::ModuleWatch;

/// Activation context: the capability object handed to lifecycle methods.
///
/// Provides everything a module may touch during `activate`/`deactivate`:
/// - **Discovery and publication** via `directory()`
/// - **Module state subscriptions** via `watch()`
/// - **Typed settings** via `settings()`
/// - **Shutdown coordination** via `cancellation_token()`
///
/// The context is cheap to clone; all members are shared handles.
#[derive(Clone)]
pub struct ActivationCtx {
    module_name: Arc<str>,
    directory: Arc<ServiceDirectory>,
    watch: Arc<ModuleWatch>,
    cancellation_token: CancellationToken,
    raw_settings: Option<Arc<serde_json::Value>>,
}

impl ActivationCtx {
    pub fn new(
        module_name: impl Into<Arc<str>>,
        directory: Arc<ServiceDirectory>,
        watch: Arc<ModuleWatch>,
        cancellation_token: CancellationToken,
        raw_settings: Option<serde_json::Value>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            directory,
            watch,
            cancellation_token,
            raw_settings: raw_settings.map(Arc::new),
        }
    }

    #[inline]
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The service directory for discovery and publication.
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Arc<ServiceDirectory> {
        &self.directory
    }

    /// The module watch subsystem.
    #[inline]
    #[must_use]
    pub fn watch(&self) -> &Arc<ModuleWatch> {
        &self.watch
    }

    /// Token cancelled when the host begins shutting down.
    #[inline]
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Deserialize this module's settings section into `T`, or defaults when
    /// the section is absent.
    ///
    /// # Errors
    /// `ConfigError::InvalidSettings` if a section exists but does not
    /// deserialize into `T`.
    pub fn settings<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        settings_or_default(self.raw_settings.as_deref(), &self.module_name)
    }
}
