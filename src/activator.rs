//! Lifecycle controller for the template capability.
//!
//! On activation it either adopts a template configuration some other
//! provider already published, or creates a default one of its own, then
//! starts tracking resolved modules for template resources. A configuration
//! it created itself is published back to the directory so other consumers
//! can discover it; an adopted one is not published again. Deactivation
//! unwinds the watch and, when present, the publication.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{TemplateConfig, TemplateSettings};
use crate::context::ActivationCtx;
use crate::contracts::LifecycleModule;
use crate::directory::{AttrFilter, Registration, ServiceRef};
use crate::tracker::TemplateTracker;
use crate::watch::{ModuleState, WatchRegistration};

/// Marker attribute on configurations prepared by an external provider.
pub const PREPARED_CONFIGURATION_ATTR: &str = "preparedConfiguration";

/// Marker attribute on the configuration this controller publishes itself.
pub const DYNAMIC_CONFIGURATION_ATTR: &str = "dynamicConfiguration";

#[derive(Default)]
struct ActivatorState {
    tracker: Option<Arc<TemplateTracker>>,
    watch: Option<WatchRegistration>,
    publication: Option<Registration>,
}

/// Activator that:
/// 1. looks for a prepared `TemplateConfig` in the directory and adopts the
///    first one found,
/// 2. otherwise creates a default configuration of its own,
/// 3. tracks modules in `Resolved` state for template resources,
/// 4. publishes the configuration as dynamically produced, but only when it
///    created the configuration itself.
#[derive(Default)]
pub struct TemplateActivator {
    state: Mutex<ActivatorState>,
}

impl TemplateActivator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration in use, once activated.
    #[must_use]
    pub fn configuration(&self) -> Option<Arc<TemplateConfig>> {
        self.state.lock().tracker.as_ref().map(|t| t.configuration())
    }

    /// The tracker driving template discovery, once activated.
    #[must_use]
    pub fn tracker(&self) -> Option<Arc<TemplateTracker>> {
        self.state.lock().tracker.clone()
    }

    /// Whether the controller published its own configuration.
    #[must_use]
    pub fn published_configuration(&self) -> bool {
        self.state.lock().publication.is_some()
    }
}

#[async_trait]
impl LifecycleModule for TemplateActivator {
    async fn activate(&self, ctx: &ActivationCtx) -> anyhow::Result<()> {
        let prepared = AttrFilter::eq(PREPARED_CONFIGURATION_ATTR, "true");
        let candidates = ctx.directory().find::<TemplateConfig>(&prepared);

        let tracker = build_tracker(ctx, &candidates)?;

        let watch = ctx.watch().start(ModuleState::Resolved, tracker.clone());

        // A reused configuration is already published by its provider; only
        // one we created ourselves goes back into the directory.
        let publication = if candidates.is_empty() {
            tracing::trace!("publishing dynamic template configuration");
            let attrs = HashMap::from([(
                DYNAMIC_CONFIGURATION_ATTR.to_owned(),
                "true".to_owned(),
            )]);
            Some(
                ctx.directory()
                    .register_with_attrs(tracker.configuration(), attrs),
            )
        } else {
            None
        };

        let mut state = self.state.lock();
        state.tracker = Some(tracker);
        state.watch = Some(watch);
        state.publication = publication;
        Ok(())
    }

    async fn deactivate(&self, _ctx: &ActivationCtx) -> anyhow::Result<()> {
        let (watch, publication, _tracker) = {
            let mut state = self.state.lock();
            (
                state.watch.take(),
                state.publication.take(),
                state.tracker.take(),
            )
        };

        // Close before unregistering so no notification can touch a
        // configuration that is already gone from the directory. Each step
        // runs regardless of whether the other handle exists.
        if let Some(watch) = watch {
            watch.close();
        }
        if let Some(publication) = publication {
            publication.unregister();
        }
        Ok(())
    }
}

/// Bind a tracker to the first prepared candidate, or to a fresh default
/// configuration when there is none.
///
/// A candidate whose provider vanished between discovery and resolution is
/// an activation failure, not something to paper over; the error propagates
/// before any watch is opened.
fn build_tracker(
    ctx: &ActivationCtx,
    candidates: &[ServiceRef<TemplateConfig>],
) -> anyhow::Result<Arc<TemplateTracker>> {
    if let Some(first) = candidates.first() {
        let config = ctx.directory().resolve(first)?;
        Ok(Arc::new(TemplateTracker::with_config(config)))
    } else {
        tracing::trace!("creating our own default template configuration");
        let settings: TemplateSettings = ctx.settings()?;
        Ok(Arc::new(TemplateTracker::new(settings)))
    }
}
