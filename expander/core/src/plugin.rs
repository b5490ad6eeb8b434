//! Expander Plugin Lifecycle
//!
//! Wires the [`ExpansionTracker`] to an [`EventBus`].
//!
//! # Subscription Table
//!
//! | Event kind               | Listeners (in call order)            |
//! |--------------------------|--------------------------------------|
//! | `loaded-protyle-static`  | debug probe?, expand, reconcile      |
//! | `loaded-protyle-dynamic` | debug probe?, expand, reconcile      |
//! | `switch-protyle`         | debug probe?, reconcile              |
//! | `destroy-protyle`        | debug probe?, fold-all               |
//!
//! The listeners are built once per plugin and keep their identity for the
//! plugin's lifetime, so [`ExpanderPlugin::deactivate`] removes exactly what
//! [`ExpanderPlugin::activate`] added.
//!
//! # Handler Tasks
//!
//! Bus listeners are synchronous. Each tracker listener clones the event and
//! spawns the async handler into the plugin's [`HandlerTasks`] group, logging
//! a failed handler at `warn` and otherwise dropping the error. Deactivation
//! either lets in-flight handlers finish or aborts them, depending on
//! [`TrackerConfig::cancel_in_flight_on_deactivate`].
//!
//! Listeners must be invoked from within a tokio runtime.
//!
//! [`TrackerConfig::cancel_in_flight_on_deactivate`]: crate::config::TrackerConfig

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{EventBus, ViewEventListener};
use crate::config::ExpanderConfig;
use crate::debug::DebugProbe;
use crate::error::GatewayError;
use crate::events::{ViewEvent, ViewEventKind};
use crate::frontend::Frontend;
use crate::gateway::{AttributeGateway, CommandGateway, SiyuanGateway};
use crate::tasks::HandlerTasks;
use crate::tracker::ExpansionTracker;

// =============================================================================
// Tracker Listeners
// =============================================================================

/// Which tracker handler a listener drives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandlerRole {
    Expand,
    Reconcile,
    FoldAll,
}

impl HandlerRole {
    fn name(self) -> &'static str {
        match self {
            Self::Expand => "expand",
            Self::Reconcile => "reconcile",
            Self::FoldAll => "fold-all",
        }
    }

    async fn run(self, tracker: &ExpansionTracker, event: &ViewEvent) {
        match self {
            Self::Expand => {
                if let Err(e) = tracker.handle_view_loaded(event).await {
                    tracing::warn!(kind = %event.kind, error = %e, "Expand handler aborted");
                }
            }
            Self::Reconcile => match tracker.handle_view_switched(event).await {
                Ok(report) if !report.failed.is_empty() => {
                    tracing::warn!(
                        kind = %event.kind,
                        failed = report.failed.len(),
                        "Some blocks could not be folded back"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(kind = %event.kind, error = %e, "Reconcile handler aborted");
                }
            },
            Self::FoldAll => {
                let report = tracker.handle_view_destroyed(event).await;
                if !report.failed.is_empty() {
                    tracing::warn!(
                        failed = report.failed.len(),
                        "Some blocks could not be folded back on destroy"
                    );
                }
            }
        }
    }
}

/// Bus listener that spawns one tracker handler per event
struct TrackerListener {
    role: HandlerRole,
    tracker: Arc<ExpansionTracker>,
    tasks: HandlerTasks,
}

impl ViewEventListener for TrackerListener {
    fn name(&self) -> &'static str {
        self.role.name()
    }

    fn on_event(&self, event: &ViewEvent) {
        let role = self.role;
        let tracker = Arc::clone(&self.tracker);
        let event = event.clone();
        self.tasks.spawn(async move {
            role.run(&tracker, &event).await;
        });
    }
}

// =============================================================================
// Plugin
// =============================================================================

type Subscription = (ViewEventKind, Arc<dyn ViewEventListener>);

/// The adaptive expander
pub struct ExpanderPlugin {
    tracker: Arc<ExpansionTracker>,
    tasks: HandlerTasks,
    probe: Option<Arc<DebugProbe>>,
    subscriptions: Vec<Subscription>,
    frontend: Frontend,
    cancel_in_flight: bool,
    bus: Mutex<Option<EventBus>>,
    is_mobile: AtomicBool,
}

impl ExpanderPlugin {
    /// Create a plugin over the given gateways
    pub fn new(
        attributes: Arc<dyn AttributeGateway>,
        commands: Arc<dyn CommandGateway>,
        config: &ExpanderConfig,
    ) -> Self {
        let tracker = Arc::new(ExpansionTracker::new(attributes, commands, &config.tracker));
        let tasks = HandlerTasks::new();

        let probe = config
            .debug
            .enabled
            .then(|| Arc::new(DebugProbe::new(config.debug.path.clone())));

        let listener = |role| -> Arc<dyn ViewEventListener> {
            Arc::new(TrackerListener {
                role,
                tracker: Arc::clone(&tracker),
                tasks: tasks.clone(),
            })
        };
        let expand = listener(HandlerRole::Expand);
        let reconcile = listener(HandlerRole::Reconcile);
        let fold_all = listener(HandlerRole::FoldAll);

        let mut subscriptions: Vec<Subscription> = Vec::new();
        if let Some(ref probe) = probe {
            let probe: Arc<dyn ViewEventListener> = probe.clone();
            for kind in ViewEventKind::ALL {
                subscriptions.push((kind, probe.clone()));
            }
        }
        subscriptions.extend([
            (ViewEventKind::LoadedStatic, expand.clone()),
            (ViewEventKind::LoadedStatic, reconcile.clone()),
            (ViewEventKind::LoadedDynamic, expand),
            (ViewEventKind::LoadedDynamic, reconcile.clone()),
            (ViewEventKind::Switched, reconcile),
            (ViewEventKind::Destroyed, fold_all),
        ]);

        Self {
            tracker,
            tasks,
            probe,
            subscriptions,
            frontend: config.frontend,
            cancel_in_flight: config.tracker.cancel_in_flight_on_deactivate,
            bus: Mutex::new(None),
            is_mobile: AtomicBool::new(false),
        }
    }

    /// Create a plugin over one gateway that serves both roles
    pub fn with_gateway<G>(gateway: Arc<G>, config: &ExpanderConfig) -> Self
    where
        G: AttributeGateway + CommandGateway + 'static,
    {
        Self::new(gateway.clone(), gateway, config)
    }

    /// Create a plugin talking to the SiYuan kernel described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Client`] if the HTTP client cannot be built.
    pub fn connect(config: &ExpanderConfig) -> Result<Self, GatewayError> {
        let gateway = Arc::new(SiyuanGateway::from_config(&config.siyuan)?);
        Ok(Self::with_gateway(gateway, config))
    }

    /// Subscribe every listener to `bus`
    ///
    /// Returns false (and does nothing) if the plugin is already active.
    pub fn activate(&self, bus: &EventBus) -> bool {
        let mut active = self.bus.lock();
        if active.is_some() {
            tracing::warn!("Plugin already active, ignoring activation");
            return false;
        }

        for (kind, listener) in &self.subscriptions {
            bus.on(*kind, Arc::clone(listener));
        }
        *active = Some(bus.clone());

        let is_mobile = self.frontend.is_mobile();
        self.is_mobile.store(is_mobile, Ordering::SeqCst);

        tracing::info!(
            frontend = %self.frontend,
            is_mobile,
            debug = self.probe.is_some(),
            register_delay = ?self.tracker.register_delay(),
            subscriptions = self.subscriptions.len(),
            "Adaptive expander activated"
        );
        true
    }

    /// Unsubscribe every listener and drop the pending queue
    ///
    /// In-flight handlers are aborted when configured to, and otherwise left
    /// to finish. Returns false if the plugin was not active.
    pub fn deactivate(&self) -> bool {
        let Some(bus) = self.bus.lock().take() else {
            return false;
        };

        for (kind, listener) in &self.subscriptions {
            bus.off(*kind, listener);
        }

        let aborted = if self.cancel_in_flight {
            self.tasks.abort_all()
        } else {
            0
        };
        let dropped = self.tracker.clear();

        tracing::info!(
            aborted,
            dropped = dropped.len(),
            in_flight = self.tasks.in_flight(),
            "Adaptive expander deactivated"
        );
        true
    }

    /// Deactivate and wait for remaining handlers
    pub async fn shutdown(&self) {
        self.deactivate();
        self.tasks.settle().await;
    }

    /// Permanent removal
    ///
    /// Nothing is persisted, so this only deactivates.
    pub fn uninstall(&self) {
        self.deactivate();
        tracing::info!("Adaptive expander uninstalled");
    }

    /// Wait until every spawned handler has finished
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    /// Whether the plugin is subscribed to a bus
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bus.lock().is_some()
    }

    /// Whether the front-end was a mobile one at activation
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.is_mobile.load(Ordering::SeqCst)
    }

    /// The tracker driven by this plugin
    #[must_use]
    pub fn tracker(&self) -> &Arc<ExpansionTracker> {
        &self.tracker
    }

    /// The debug probe, when debugging is enabled
    #[must_use]
    pub fn probe(&self) -> Option<&Arc<DebugProbe>> {
        self.probe.as_ref()
    }

    /// Subscriptions as (kind, listener name), in registration order
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(ViewEventKind, &'static str)> {
        self.subscriptions
            .iter()
            .map(|(kind, listener)| (*kind, listener.name()))
            .collect()
    }
}

impl Drop for ExpanderPlugin {
    fn drop(&mut self) {
        self.deactivate();
    }
}
