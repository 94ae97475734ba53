//! Minimal host runner driving capability modules through their lifecycle.
//!
//! Phase order: **activate (registration order) → wait → deactivate
//! (reverse order)**. The host owns the service directory and the module
//! watch, builds a scoped `ActivationCtx` per module, and serializes
//! lifecycle calls per module instance. Shutdown is driven by an external
//! `CancellationToken`.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::context::ActivationCtx;
use crate::contracts::LifecycleModule;
use crate::directory::ServiceDirectory;
use crate::watch::{ModuleInfo, ModuleState, ModuleWatch};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("activation failed for module '{module}': {source}")]
    Activate {
        module: Arc<str>,
        #[source]
        source: anyhow::Error,
    },
    #[error("deactivation failed for module '{module}': {source}")]
    Deactivate {
        module: Arc<str>,
        #[source]
        source: anyhow::Error,
    },
}

struct HostedModule {
    name: Arc<str>,
    module: Arc<dyn LifecycleModule>,
}

/// In-process host for lifecycle modules.
pub struct Host {
    directory: Arc<ServiceDirectory>,
    watch: Arc<ModuleWatch>,
    modules: Vec<HostedModule>,
    settings: serde_json::Value,
    cancel: CancellationToken,
}

impl Host {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Create a host with per-module settings sections, shaped as
    /// `{ "<module-name>": { ... } }`.
    #[must_use]
    pub fn with_settings(settings: serde_json::Value) -> Self {
        Self {
            directory: Arc::new(ServiceDirectory::new()),
            watch: Arc::new(ModuleWatch::new()),
            modules: Vec::new(),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<ServiceDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn watch(&self) -> &Arc<ModuleWatch> {
        &self.watch
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Register a module; activation follows registration order.
    pub fn add_module(&mut self, name: impl Into<Arc<str>>, module: Arc<dyn LifecycleModule>) {
        self.modules.push(HostedModule {
            name: name.into(),
            module,
        });
    }

    /// Forward a module state transition to all open watches.
    pub fn module_changed(&self, module: &Arc<ModuleInfo>, state: ModuleState) {
        self.watch.module_changed(module, state);
    }

    fn ctx_for(&self, name: &Arc<str>) -> ActivationCtx {
        let raw = self.settings.get(name.as_ref()).cloned();
        ActivationCtx::new(
            Arc::clone(name),
            self.directory.clone(),
            self.watch.clone(),
            self.cancel.child_token(),
            raw,
        )
    }

    /// Activate all modules in registration order.
    ///
    /// # Errors
    /// Stops at the first failing module and propagates its error; modules
    /// activated before it stay active (no automatic rollback).
    pub async fn activate_all(&self) -> Result<(), HostError> {
        tracing::info!("Phase: activate");
        for hosted in &self.modules {
            let ctx = self.ctx_for(&hosted.name);
            hosted
                .module
                .activate(&ctx)
                .await
                .map_err(|e| HostError::Activate {
                    module: Arc::clone(&hosted.name),
                    source: e,
                })?;
            tracing::debug!(module = %hosted.name, "activated");
        }
        Ok(())
    }

    /// Deactivate all modules in reverse registration order.
    ///
    /// # Errors
    /// Stops at the first failing module and propagates its error.
    pub async fn deactivate_all(&self) -> Result<(), HostError> {
        tracing::info!("Phase: deactivate");
        for hosted in self.modules.iter().rev() {
            let ctx = self.ctx_for(&hosted.name);
            hosted
                .module
                .deactivate(&ctx)
                .await
                .map_err(|e| HostError::Deactivate {
                    module: Arc::clone(&hosted.name),
                    source: e,
                })?;
            tracing::debug!(module = %hosted.name, "deactivated");
        }
        Ok(())
    }

    /// Full cycle: activate → wait for cancellation → deactivate.
    ///
    /// # Errors
    /// Propagates the first lifecycle failure from either phase.
    pub async fn run(&self) -> Result<(), HostError> {
        self.activate_all().await?;
        self.cancel.cancelled().await;
        self.deactivate_all().await
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
