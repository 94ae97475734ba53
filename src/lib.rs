//! templatekit: lifecycle kit for a template-rendering capability hosted in
//! a modular runtime.
//!
//! The centerpiece is [`TemplateActivator`]: on activation it adopts a
//! template configuration already published by another provider, or creates
//! a default one of its own, starts tracking resolved modules for template
//! resources, and (only when the configuration is its own) publishes it
//! back into the [`ServiceDirectory`] as dynamically produced. Deactivation
//! unwinds the watch and the publication symmetrically.
//!
//! The collaborators around the activator are first-class pieces of the kit:
//!
//! - [`ServiceDirectory`]: type-keyed, attribute-tagged discovery with
//!   explicit registration-order tie-break and a separate resolve step.
//! - [`ModuleWatch`]: module state subscriptions with synchronous close.
//! - [`TemplateTracker`]: populates the shared [`TemplateConfig`] from
//!   module-advertised template resources.
//! - [`Host`]: a minimal runner driving activate/wait/deactivate.

pub mod activator;
pub mod config;
pub mod context;
pub mod contracts;
pub mod directory;
pub mod runtime;
pub mod tracker;
pub mod watch;

pub use activator::{
    TemplateActivator, DYNAMIC_CONFIGURATION_ATTR, PREPARED_CONFIGURATION_ATTR,
};
pub use config::{ConfigError, TemplateConfig, TemplateSettings};
pub use context::ActivationCtx;
pub use contracts::{LifecycleModule, ModuleObserver};
pub use directory::{AttrFilter, DirectoryError, Registration, ServiceDirectory, ServiceRef};
pub use runtime::{Host, HostError};
pub use tracker::{ConfigOwnership, TemplateTracker};
pub use watch::{ModuleInfo, ModuleState, ModuleWatch, TemplateResource, WatchRegistration};
