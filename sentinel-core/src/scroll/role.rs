//! Role Controller
//!
//! A role controller owns the sensing subscription for one role and decides
//! which of its reports turn into callback invocations.
//!
//! # Locking
//!
//! Role state lives behind a `parking_lot::Mutex` shared with the report
//! sinks handed to the host. The lock is only held while reading or
//! updating state. Sensor calls and callbacks run without it, so a host may
//! deliver reports synchronously from `observe`, and a callback may rebind
//! the anchor it was fired for.
//!
//! # Stale reports
//!
//! Every subscription gets a fresh generation number and its sink remembers
//! it. Once the role disposes or replaces that subscription, the generation
//! moves on and anything the old sink still delivers is dropped.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::config::Suppression;
use super::reconcile::{rebind, reconcile, Plan, SensorAction};
use super::{Callback, Role};
use crate::error::{ScrollError, SensorError};
use crate::sensing::{
    ElementId, ReportSink, SensingOptions, Sensor, SubscriptionId, Threshold, VisibilityReport,
};

/// Lifecycle phase of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No callback, or no usable sensor. No subscription exists.
    Disabled,
    /// A subscription exists but no anchor is bound.
    Armed,
    /// A subscription exists and watches the bound anchor.
    Watching,
    /// The controller was disposed. Terminal.
    TornDown,
}

/// First-report gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    SkipNext,
}

impl Suppression {
    fn gate(self) -> Gate {
        match self {
            Suppression::SkipInitialReport => Gate::SkipNext,
            Suppression::FireImmediately => Gate::Open,
        }
    }
}

/// Desired configuration of a role for one render.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    /// `None` disables the role.
    pub callback: Option<Callback>,
    pub sensing: SensingOptions,
    pub suppression: Suppression,
}

/// The subscription a role currently owns.
#[derive(Debug, Clone, Copy)]
struct Subscription {
    options: SensingOptions,
    generation: u64,
    /// `None` while the host is still creating it.
    id: Option<SubscriptionId>,
}

#[derive(Debug)]
struct RoleState {
    role: Role,
    phase: Phase,
    callback: Option<Callback>,
    suppression: Suppression,
    subscription: Option<Subscription>,
    anchor: Option<ElementId>,
    gate: Gate,
    generation: u64,
    /// Set once the host reports that it cannot sense visibility at all.
    unsupported: bool,
}

impl RoleState {
    fn new(role: Role) -> Self {
        Self {
            role,
            phase: Phase::Disabled,
            callback: None,
            suppression: Suppression::default(),
            subscription: None,
            anchor: None,
            gate: Gate::Open,
            generation: 0,
            unsupported: false,
        }
    }

    fn settle(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }
        self.phase = match (&self.subscription, self.anchor) {
            (None, _) => Phase::Disabled,
            (Some(_), None) => Phase::Armed,
            (Some(_), Some(_)) => Phase::Watching,
        };
    }

    fn rearm(&mut self) {
        self.gate = self.suppression.gate();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.subscription
            .is_some_and(|sub| sub.generation == generation)
    }

    /// Decide whether a report fires the callback.
    fn admit(&mut self, generation: u64, report: &VisibilityReport) -> Option<Callback> {
        let Some(sub) = self.subscription.filter(|sub| sub.generation == generation) else {
            trace!(role = %self.role, element = %report.element, "report from retired subscription");
            return None;
        };

        if self.anchor != Some(report.element) {
            trace!(role = %self.role, element = %report.element, "report for unbound element");
            return None;
        }

        if self.gate == Gate::SkipNext {
            self.gate = Gate::Open;
            trace!(role = %self.role, element = %report.element, "initial report suppressed");
            return None;
        }

        if !report.is_intersecting || !sub.options.threshold.is_met_by(report.ratio) {
            return None;
        }

        self.callback.clone()
    }
}

/// Owns the sensing subscription for one role.
///
/// Clones share state.
#[derive(Clone)]
pub struct RoleController {
    role: Role,
    sensor: Option<Arc<dyn Sensor>>,
    state: Arc<Mutex<RoleState>>,
}

impl RoleController {
    /// Create a disabled role. With no sensor, the role never leaves
    /// `Phase::Disabled`.
    pub fn new(role: Role, sensor: Option<Arc<dyn Sensor>>) -> Self {
        Self {
            role,
            sensor,
            state: Arc::new(Mutex::new(RoleState::new(role))),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// The element currently bound to this role.
    pub fn anchor(&self) -> Option<ElementId> {
        self.state.lock().anchor
    }

    /// The host ID of the live subscription.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.state.lock().subscription.and_then(|sub| sub.id)
    }

    /// The threshold of the live subscription.
    pub fn threshold(&self) -> Option<Threshold> {
        self.state
            .lock()
            .subscription
            .map(|sub| sub.options.threshold)
    }

    /// Whether this role can sense visibility: a sensor was supplied and
    /// the host has not refused it as unsupported.
    pub fn is_supported(&self) -> bool {
        self.sensor.is_some() && !self.state.lock().unsupported
    }

    /// Whether both controllers share state.
    pub fn ptr_eq(&self, other: &RoleController) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Bring the subscription in line with `config`.
    ///
    /// Enabling creates a subscription and registers an already bound
    /// anchor with it. Disabling, or any change of root, margin or threshold,
    /// disposes the existing subscription first. A new callback alone is
    /// swapped in place. Unchanged input does nothing.
    pub fn configure(&self, config: RoleConfig) {
        let RoleConfig {
            callback,
            sensing,
            suppression,
        } = config;

        let (plan, retired, generation) = {
            let mut state = self.state.lock();
            if state.phase == Phase::TornDown {
                return;
            }
            state.callback = callback;
            state.suppression = suppression;

            if self.sensor.is_none() || state.unsupported {
                return;
            }

            let current = state.subscription.map(|sub| sub.options);
            let desired = state.callback.is_some().then_some(sensing);
            let plan = reconcile(current.as_ref(), desired.as_ref(), state.anchor);
            if plan.is_empty() {
                return;
            }

            let retired = state.subscription.take().and_then(|sub| sub.id);
            state.generation += 1;
            let generation = state.generation;
            if let Some(options) = desired {
                state.subscription = Some(Subscription {
                    options,
                    generation,
                    id: None,
                });
                state.rearm();
            }
            state.settle();

            (plan, retired, generation)
        };

        self.run(plan, retired, generation);
    }

    /// Bind `element` to this role, releasing whatever was bound before.
    ///
    /// The binding is stored even when no subscription exists, so a later
    /// `configure` can pick it up.
    pub fn bind_anchor(&self, element: Option<ElementId>) {
        let (subscription, previous) = {
            let mut state = self.state.lock();
            if state.phase == Phase::TornDown {
                return;
            }
            let previous = std::mem::replace(&mut state.anchor, element);
            state.rearm();
            state.settle();
            (state.subscription.and_then(|sub| sub.id), previous)
        };

        debug!(role = %self.role, ?previous, next = ?element, "rebinding anchor");

        let (Some(sensor), Some(id)) = (&self.sensor, subscription) else {
            return;
        };
        for action in rebind(previous, element) {
            match action {
                SensorAction::Unobserve(element) => sensor.unobserve(id, element),
                SensorAction::Observe(element) => sensor.observe(id, element),
                SensorAction::Dispose | SensorAction::Create(_) => {}
            }
        }
    }

    /// Release the anchor and the subscription. Idempotent; the role is
    /// `TornDown` afterwards and ignores every later call.
    pub fn dispose(&self) {
        let (plan, retired) = {
            let mut state = self.state.lock();
            if state.phase == Phase::TornDown {
                return;
            }
            let current = state.subscription.take();
            let plan = reconcile(current.map(|sub| sub.options).as_ref(), None, state.anchor);

            state.phase = Phase::TornDown;
            state.generation += 1;
            state.anchor = None;
            state.callback = None;

            (plan, current.and_then(|sub| sub.id))
        };

        debug!(role = %self.role, "disposing role");
        if retired.is_some() {
            self.run(plan, retired, 0);
        }
    }

    /// Execute a plan against the sensor.
    fn run(&self, plan: Plan, retired: Option<SubscriptionId>, generation: u64) {
        let Some(sensor) = &self.sensor else {
            return;
        };

        for action in plan {
            match action {
                SensorAction::Unobserve(element) => {
                    if let Some(id) = retired {
                        sensor.unobserve(id, element);
                    }
                }
                SensorAction::Dispose => {
                    if let Some(id) = retired {
                        debug!(role = %self.role, subscription = id.raw(), "disposing subscription");
                        sensor.dispose(id);
                    }
                }
                SensorAction::Create(options) => {
                    match sensor.create(&options, self.sink(generation)) {
                        Ok(id) => {
                            debug!(
                                role = %self.role,
                                subscription = id.raw(),
                                threshold = options.threshold.value(),
                                root = ?options.root,
                                "created subscription"
                            );
                            match self.adopt(id, generation) {
                                Some(Some(anchor)) => sensor.observe(id, anchor),
                                Some(None) => {}
                                None => {
                                    sensor.dispose(id);
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            warn!(role = %self.role, %err, "sensor refused subscription, role disabled");
                            self.abandon(generation, &err);
                            return;
                        }
                    }
                }
                // The anchor may have been rebound while the host was creating
                // the subscription. Adoption registers whatever is bound then.
                SensorAction::Observe(_) => {}
            }
        }
    }

    /// Record the host ID of a freshly created subscription and return the
    /// anchor bound at that moment. Returns `None` if the subscription was
    /// superseded while the host was creating it.
    fn adopt(&self, id: SubscriptionId, generation: u64) -> Option<Option<ElementId>> {
        let mut state = self.state.lock();
        match state.subscription.as_mut() {
            Some(sub) if sub.generation == generation => {
                sub.id = Some(id);
                state.settle();
                Some(state.anchor)
            }
            _ => None,
        }
    }

    fn abandon(&self, generation: u64, err: &SensorError) {
        let mut state = self.state.lock();
        if *err == SensorError::Unsupported {
            state.unsupported = true;
        }
        if state.is_current(generation) {
            state.subscription = None;
            state.settle();
        }
    }

    fn sink(&self, generation: u64) -> ReportSink {
        let state = Arc::downgrade(&self.state);
        ReportSink::new(move |batch| dispatch(&state, generation, batch))
    }
}

/// Filter a batch and invoke the callback for each qualifying report.
fn dispatch(
    state: &Weak<Mutex<RoleState>>,
    generation: u64,
    batch: &[VisibilityReport],
) -> Result<usize, ScrollError> {
    let Some(state) = state.upgrade() else {
        return Ok(0);
    };

    let mut fired = 0;
    for report in batch {
        let (role, callback) = {
            let mut state = state.lock();
            match state.admit(generation, report) {
                Some(callback) => (state.role, callback),
                None => continue,
            }
        };

        trace!(%role, element = %report.element, ratio = report.ratio, "firing callback");
        callback
            .invoke()
            .map_err(|source| ScrollError::Callback { role, source })?;
        fired += 1;
    }

    Ok(fired)
}

impl fmt::Debug for RoleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RoleController")
            .field("role", &self.role)
            .field("phase", &state.phase)
            .field("anchor", &state.anchor)
            .field("subscription", &state.subscription.and_then(|sub| sub.id))
            .field("supported", &(self.sensor.is_some() && !state.unsupported))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
