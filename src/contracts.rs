use async_trait::async_trait;
use std::sync::Arc;

use crate::context::ActivationCtx;
use crate::watch::ModuleInfo;

/// Lifecycle seam between the host runtime and a capability module.
///
/// The host serializes `activate`/`deactivate` per module instance; neither
/// call is expected to run concurrently with the other. Errors propagate to
/// the host unchanged, which treats an `activate` failure as activation
/// failure for the capability; modules perform no local recovery here.
#[async_trait]
pub trait LifecycleModule: Send + Sync + 'static {
    async fn activate(&self, ctx: &ActivationCtx) -> anyhow::Result<()>;
    async fn deactivate(&self, ctx: &ActivationCtx) -> anyhow::Result<()>;
}

/// Receiver of module state transitions from the watch subsystem.
///
/// Callbacks may arrive on a notification thread distinct from the thread
/// that opened the watch, but never before `ModuleWatch::start` returns and
/// never after `WatchRegistration::close` returns.
pub trait ModuleObserver: Send + Sync + 'static {
    /// A module entered the watched state.
    fn module_arrived(&self, module: &Arc<ModuleInfo>);

    /// A previously seen module left the watched state.
    fn module_departed(&self, module: &Arc<ModuleInfo>);
}
