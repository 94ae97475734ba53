#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for the template capability lifecycle: discovery
//! outcomes, tracking behavior under module churn, and symmetric teardown.

use std::collections::HashMap;
use std::sync::Arc;

use templatekit::{
    ActivationCtx, AttrFilter, Host, LifecycleModule, ModuleInfo, ModuleState, ModuleWatch,
    ServiceDirectory, TemplateActivator, TemplateConfig, DYNAMIC_CONFIGURATION_ATTR,
    PREPARED_CONFIGURATION_ATTR,
};
use tokio_util::sync::CancellationToken;

fn activation_ctx(
    directory: &Arc<ServiceDirectory>,
    watch: &Arc<ModuleWatch>,
) -> ActivationCtx {
    ActivationCtx::new(
        "templates",
        directory.clone(),
        watch.clone(),
        CancellationToken::new(),
        None,
    )
}

fn prepared_attrs() -> HashMap<String, String> {
    HashMap::from([(PREPARED_CONFIGURATION_ATTR.to_owned(), "true".to_owned())])
}

fn dynamic_filter() -> AttrFilter {
    AttrFilter::eq(DYNAMIC_CONFIGURATION_ATTR, "true")
}

// Scenario: empty directory → own default configuration, published.
#[tokio::test]
async fn activation_with_empty_directory_publishes_dynamic_configuration() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let activator = TemplateActivator::new();

    activator
        .activate(&activation_ctx(&directory, &watch))
        .await
        .unwrap();

    let tracker = activator.tracker().expect("tracker bound after activate");
    assert!(tracker.owns_configuration());
    assert_eq!(watch.open_registrations(), 1);

    let dynamic = directory.find::<TemplateConfig>(&dynamic_filter());
    assert_eq!(dynamic.len(), 1, "exactly one publication record");
    let published = directory.resolve(&dynamic[0]).unwrap();
    assert!(Arc::ptr_eq(&published, &tracker.configuration()));
}

// Scenario: one prepared provider → adopt it, publish nothing.
#[tokio::test]
async fn activation_adopts_prepared_configuration() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let prepared = Arc::new(TemplateConfig::default());
    let _provider = directory.register_with_attrs(prepared.clone(), prepared_attrs());

    let activator = TemplateActivator::new();
    activator
        .activate(&activation_ctx(&directory, &watch))
        .await
        .unwrap();

    let bound = activator.configuration().unwrap();
    assert!(Arc::ptr_eq(&prepared, &bound));
    assert_eq!(watch.open_registrations(), 1);
    assert!(
        directory.find::<TemplateConfig>(&dynamic_filter()).is_empty(),
        "adopted configuration must not be re-published"
    );
}

// Scenario: two prepared providers → first registered wins, second ignored.
#[tokio::test]
async fn activation_binds_to_the_first_of_two_prepared_configurations() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let first = Arc::new(TemplateConfig::default());
    let second = Arc::new(TemplateConfig::default());
    let _r1 = directory.register_with_attrs(first.clone(), prepared_attrs());
    let _r2 = directory.register_with_attrs(second, prepared_attrs());

    let activator = TemplateActivator::new();
    activator
        .activate(&activation_ctx(&directory, &watch))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &activator.configuration().unwrap()));
}

// Scenario: activate with empty set, then deactivate → watch closed,
// publication gone, nothing deliverable afterwards.
#[tokio::test]
async fn deactivation_unwinds_watch_and_publication() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let activator = TemplateActivator::new();
    let ctx = activation_ctx(&directory, &watch);

    activator.activate(&ctx).await.unwrap();
    let config = activator.configuration().unwrap();

    activator.deactivate(&ctx).await.unwrap();

    assert_eq!(watch.open_registrations(), 0);
    assert!(directory.is_empty(), "publication record unregistered");

    // A late module transition must not reach the discarded tracker.
    let module = Arc::new(ModuleInfo::new("late").with_template("t.ftl", "late"));
    watch.module_changed(&module, ModuleState::Resolved);
    assert!(config.is_empty(), "no residual subscription deliverable");
}

#[tokio::test]
async fn deactivate_without_activate_is_a_noop() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let activator = TemplateActivator::new();

    activator
        .deactivate(&activation_ctx(&directory, &watch))
        .await
        .unwrap();

    assert_eq!(watch.open_registrations(), 0);
    assert!(directory.is_empty());
}

// Module churn end to end: resolved modules contribute templates, departed
// modules take them away again, all through the shared configuration other
// consumers hold on to.
#[tokio::test]
async fn resolved_modules_populate_the_shared_configuration() {
    let mut host = Host::new();
    host.add_module("templates", Arc::new(TemplateActivator::new()));
    host.activate_all().await.unwrap();

    let dynamic = host.directory().find::<TemplateConfig>(&dynamic_filter());
    let config = host.directory().resolve(&dynamic[0]).unwrap();

    let mail = Arc::new(
        ModuleInfo::new("mail")
            .with_template("welcome.ftl", "Hello ${user}!")
            .with_template("bye.ftl", "Bye."),
    );
    let web = Arc::new(ModuleInfo::new("web").with_template("index.ftl", "<html/>"));

    host.module_changed(&mail, ModuleState::Resolved);
    host.module_changed(&web, ModuleState::Resolved);
    assert_eq!(config.len(), 3);
    assert_eq!(
        config.template("mail/welcome.ftl").as_deref(),
        Some("Hello ${user}!")
    );

    host.module_changed(&mail, ModuleState::Uninstalled);
    assert_eq!(config.len(), 1);
    assert!(config.template("web/index.ftl").is_some());

    host.deactivate_all().await.unwrap();
    assert!(host.directory().is_empty());
}

// A full host cycle with a prepared provider module activated first: the
// template activator adopts its configuration and leaves it registered on
// shutdown.
#[tokio::test]
async fn host_cycle_with_prepared_provider() {
    struct PreparedProvider {
        config: Arc<TemplateConfig>,
        // Held for the provider's whole lifetime; a prepared configuration
        // stays registered even after the template capability goes away.
        registration: parking_lot::Mutex<Option<templatekit::Registration>>,
    }

    #[async_trait::async_trait]
    impl LifecycleModule for PreparedProvider {
        async fn activate(&self, ctx: &ActivationCtx) -> anyhow::Result<()> {
            let attrs =
                HashMap::from([(PREPARED_CONFIGURATION_ATTR.to_owned(), "true".to_owned())]);
            let registration = ctx.directory().register_with_attrs(self.config.clone(), attrs);
            *self.registration.lock() = Some(registration);
            Ok(())
        }
        async fn deactivate(&self, _ctx: &ActivationCtx) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let prepared = Arc::new(TemplateConfig::default());
    prepared.insert_template("prepared/base.ftl", Arc::from("base"));

    let activator = Arc::new(TemplateActivator::new());
    let mut host = Host::new();
    host.add_module(
        "prepared-provider",
        Arc::new(PreparedProvider {
            config: prepared.clone(),
            registration: parking_lot::Mutex::new(None),
        }),
    );
    host.add_module("templates", activator.clone());

    host.cancellation_token().cancel();
    host.run().await.unwrap();

    // The activator adopted the prepared configuration and did not publish.
    assert!(!activator.published_configuration());
    assert_eq!(
        host.directory().len(),
        1,
        "provider registration survives the activator's teardown"
    );
    assert!(prepared.template("prepared/base.ftl").is_some());
}

// Notifications may arrive from another thread while deactivation runs;
// after deactivate returns, the configuration no longer changes.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_notifications_are_delivered_after_deactivation() {
    let directory = Arc::new(ServiceDirectory::new());
    let watch = Arc::new(ModuleWatch::new());
    let activator = TemplateActivator::new();
    let ctx = activation_ctx(&directory, &watch);

    activator.activate(&ctx).await.unwrap();
    let config = activator.configuration().unwrap();

    let pump = {
        let watch = watch.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                let module =
                    Arc::new(ModuleInfo::new(format!("mod-{i}")).with_template("t.ftl", "x"));
                watch.module_changed(&module, ModuleState::Resolved);
            }
        })
    };

    activator.deactivate(&ctx).await.unwrap();
    let frozen = config.len();

    pump.join().unwrap();
    assert_eq!(
        config.len(),
        frozen,
        "close() must stop delivery synchronously"
    );
}
