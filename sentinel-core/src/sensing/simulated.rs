//! Simulated Sensor
//!
//! An in-memory [`Sensor`] for hosts that have layout rects but no native
//! intersection observer, and for tests.
//!
//! Reports reach the controller in two ways:
//!
//! 1. Raw injection: [`SimulatedSensor::report`] and [`SimulatedSensor::push`]
//!    queue reports directly.
//! 2. Geometry: [`SimulatedSensor::recompute`] intersects each observed
//!    element's rect with its subscription's root. Like a browser observer,
//!    it queues an initial report for newly observed elements and after that
//!    only reports threshold crossings.
//!
//! Queued reports are only delivered by [`SimulatedSensor::flush`], which
//! plays the role of the host event loop. Delivery happens with no sensor
//! lock held, so callbacks may freely rebind anchors.
//!
//! Call recording is off by default. Enable it with
//! [`SimulatedSensor::recording`] to assert on the exact sequence of
//! [`SensorCall`]s.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::{
    ElementId, ReportSink, RootMargin, Sensor, SensingOptions, SubscriptionId, VisibilityReport,
};
use crate::error::{ScrollError, SensorError};

/// An axis-aligned layout rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Intersection with another rect. Edge-adjacent rects intersect with
    /// zero area.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        (right >= x && bottom >= y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    /// Grow (or shrink, for negative values) by a root margin.
    pub fn inflate(&self, margin: &RootMargin) -> Rect {
        Rect::new(
            self.x - margin.left,
            self.y - margin.top,
            (self.width + margin.left + margin.right).max(0.0),
            (self.height + margin.top + margin.bottom).max(0.0),
        )
    }
}

/// A call the controller made into the sensor, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorCall {
    Create {
        subscription: SubscriptionId,
        options: SensingOptions,
    },
    Observe {
        subscription: SubscriptionId,
        element: ElementId,
    },
    Unobserve {
        subscription: SubscriptionId,
        element: ElementId,
    },
    Dispose {
        subscription: SubscriptionId,
    },
}

/// Last state reported for an observed element: `(is_intersecting, ratio)`.
type LastReport = Option<(bool, f64)>;

struct Subscription {
    options: SensingOptions,
    sink: ReportSink,
    observed: IndexMap<ElementId, LastReport>,
}

struct SimState {
    supported: bool,
    next_id: u64,
    subscriptions: IndexMap<SubscriptionId, Subscription>,
    queue: VecDeque<(SubscriptionId, VisibilityReport)>,
    /// `None` unless recording was enabled.
    calls: Option<Vec<SensorCall>>,
    viewport: Rect,
    rects: HashMap<ElementId, Rect>,
}

impl SimState {
    fn record(&mut self, call: SensorCall) {
        if let Some(calls) = self.calls.as_mut() {
            calls.push(call);
        }
    }
}

/// An in-memory host sensor.
pub struct SimulatedSensor {
    state: Mutex<SimState>,
}

impl SimulatedSensor {
    /// Create a sensor with an empty default viewport.
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// Create a sensor that refuses every subscription, like a host without
    /// intersection support.
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            state: Mutex::new(SimState {
                supported,
                next_id: 0,
                subscriptions: IndexMap::new(),
                queue: VecDeque::new(),
                calls: None,
                viewport: Rect::default(),
                rects: HashMap::new(),
            }),
        }
    }

    /// Record every call the controller makes from now on.
    pub fn recording(mut self) -> Self {
        self.state.get_mut().calls.get_or_insert_with(Vec::new);
        self
    }

    /// Every call recorded so far, in order. Empty unless recording.
    pub fn calls(&self) -> Vec<SensorCall> {
        self.state.lock().calls.clone().unwrap_or_default()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        if let Some(calls) = self.state.lock().calls.as_mut() {
            calls.clear();
        }
    }

    /// Number of subscriptions not yet disposed.
    pub fn live_subscriptions(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Options a live subscription was created with.
    pub fn options(&self, subscription: SubscriptionId) -> Option<SensingOptions> {
        self.state
            .lock()
            .subscriptions
            .get(&subscription)
            .map(|sub| sub.options)
    }

    /// Elements a live subscription is watching.
    pub fn observed(&self, subscription: SubscriptionId) -> Vec<ElementId> {
        self.state
            .lock()
            .subscriptions
            .get(&subscription)
            .map(|sub| sub.observed.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any live subscription watches `element`.
    pub fn is_observed(&self, element: ElementId) -> bool {
        self.state
            .lock()
            .subscriptions
            .values()
            .any(|sub| sub.observed.contains_key(&element))
    }

    /// Queue a raw report for every subscription watching `element`.
    pub fn report(&self, element: ElementId, is_intersecting: bool, ratio: f64) {
        let mut state = self.state.lock();
        let targets: Vec<SubscriptionId> = state
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.observed.contains_key(&element))
            .map(|(id, _)| *id)
            .collect();

        for id in targets {
            state
                .queue
                .push_back((id, VisibilityReport::new(element, is_intersecting, ratio)));
        }
    }

    /// Queue a report for a specific subscription, whether or not it watches
    /// the element.
    pub fn push(&self, subscription: SubscriptionId, report: VisibilityReport) {
        self.state.lock().queue.push_back((subscription, report));
    }

    /// Number of queued, undelivered reports.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Set the default viewport used when a subscription has no root.
    pub fn set_viewport(&self, viewport: Rect) {
        self.state.lock().viewport = viewport;
    }

    /// Set the layout rect of an element (anchor or root).
    pub fn set_rect(&self, element: ElementId, rect: Rect) {
        self.state.lock().rects.insert(element, rect);
    }

    /// Recompute visibility from layout rects and queue the resulting reports.
    pub fn recompute(&self) {
        let mut state = self.state.lock();
        let SimState {
            subscriptions,
            queue,
            viewport,
            rects,
            ..
        } = &mut *state;

        for (id, sub) in subscriptions.iter_mut() {
            let root = match sub.options.root {
                Some(root) => match rects.get(&root) {
                    Some(rect) => *rect,
                    None => continue,
                },
                None => *viewport,
            };
            let root = root.inflate(&sub.options.margin);
            let threshold = sub.options.threshold;

            for (element, last) in sub.observed.iter_mut() {
                let Some(rect) = rects.get(element) else {
                    continue;
                };

                let intersection = rect.intersect(&root);
                let is_intersecting = intersection.is_some();
                let ratio = match intersection {
                    Some(visible) if rect.area() > 0.0 => visible.area() / rect.area(),
                    Some(_) => 1.0,
                    None => 0.0,
                };

                let crossed = match *last {
                    None => true,
                    Some((was_intersecting, last_ratio)) => {
                        was_intersecting != is_intersecting
                            || threshold.is_met_by(last_ratio) != threshold.is_met_by(ratio)
                    }
                };

                if crossed {
                    *last = Some((is_intersecting, ratio));
                    queue.push_back((*id, VisibilityReport::new(*element, is_intersecting, ratio)));
                }
            }
        }
    }

    /// Deliver queued reports, batched per subscription, in queue order.
    ///
    /// Reports queued for subscriptions that have since been disposed are
    /// dropped. Returns the total number of callbacks fired. On a callback
    /// error the remaining queue is kept for the next flush.
    pub fn flush(&self) -> Result<usize, ScrollError> {
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.state.lock();
                let Some((id, first)) = state.queue.pop_front() else {
                    break;
                };

                let mut batch = vec![first];
                while state.queue.front().is_some_and(|(next, _)| *next == id) {
                    if let Some((_, report)) = state.queue.pop_front() {
                        batch.push(report);
                    }
                }

                state
                    .subscriptions
                    .get(&id)
                    .map(|sub| (sub.sink.clone(), batch))
            };

            if let Some((sink, batch)) = next {
                trace!(reports = batch.len(), "delivering batch");
                fired += sink.deliver(&batch)?;
            }
        }

        Ok(fired)
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for SimulatedSensor {
    fn create(
        &self,
        options: &SensingOptions,
        sink: ReportSink,
    ) -> Result<SubscriptionId, SensorError> {
        let mut state = self.state.lock();
        if !state.supported {
            return Err(SensorError::Unsupported);
        }

        let id = SubscriptionId::new(state.next_id);
        state.next_id += 1;
        state.subscriptions.insert(
            id,
            Subscription {
                options: *options,
                sink,
                observed: IndexMap::new(),
            },
        );
        state.record(SensorCall::Create {
            subscription: id,
            options: *options,
        });

        Ok(id)
    }

    fn observe(&self, subscription: SubscriptionId, element: ElementId) {
        let mut state = self.state.lock();
        state.record(SensorCall::Observe {
            subscription,
            element,
        });
        if let Some(sub) = state.subscriptions.get_mut(&subscription) {
            sub.observed.insert(element, None);
        }
    }

    fn unobserve(&self, subscription: SubscriptionId, element: ElementId) {
        let mut state = self.state.lock();
        state.record(SensorCall::Unobserve {
            subscription,
            element,
        });
        if let Some(sub) = state.subscriptions.get_mut(&subscription) {
            sub.observed.shift_remove(&element);
        }
    }

    fn dispose(&self, subscription: SubscriptionId) {
        let mut state = self.state.lock();
        state.record(SensorCall::Dispose { subscription });
        state.subscriptions.shift_remove(&subscription);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::Threshold;
    use std::sync::Arc;

    fn counting_sink(seen: Arc<Mutex<Vec<VisibilityReport>>>) -> ReportSink {
        ReportSink::new(move |batch| {
            seen.lock().extend_from_slice(batch);
            Ok(batch.len())
        })
    }

    fn options(threshold: f64) -> SensingOptions {
        SensingOptions {
            root: None,
            margin: RootMargin::default(),
            threshold: Threshold::new(threshold).unwrap(),
        }
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));

        let far = Rect::new(20.0, 20.0, 1.0, 1.0);
        assert_eq!(a.intersect(&far), None);

        let touching = Rect::new(10.0, 0.0, 5.0, 5.0);
        assert_eq!(a.intersect(&touching).map(|r| r.area()), Some(0.0));
    }

    #[test]
    fn inflate_applies_margin() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0).inflate(&RootMargin {
            top: 10.0,
            right: 0.0,
            bottom: 50.0,
            left: 0.0,
        });
        assert_eq!(rect, Rect::new(0.0, -10.0, 100.0, 160.0));
    }

    #[test]
    fn records_calls_in_order() {
        let sensor = SimulatedSensor::new().recording();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = sensor.create(&options(1.0), counting_sink(seen)).unwrap();
        let el = ElementId::new(7);

        sensor.observe(id, el);
        sensor.unobserve(id, el);
        sensor.dispose(id);

        assert_eq!(
            sensor.calls(),
            vec![
                SensorCall::Create {
                    subscription: id,
                    options: options(1.0),
                },
                SensorCall::Observe {
                    subscription: id,
                    element: el,
                },
                SensorCall::Unobserve {
                    subscription: id,
                    element: el,
                },
                SensorCall::Dispose { subscription: id },
            ]
        );
        assert_eq!(sensor.live_subscriptions(), 0);
    }

    #[test]
    fn calls_are_not_kept_unless_recording() {
        let sensor = SimulatedSensor::new();
        let id = sensor.create(&options(1.0), ReportSink::new(|_| Ok(0))).unwrap();
        for raw in 0..100 {
            sensor.observe(id, ElementId::new(raw));
            sensor.unobserve(id, ElementId::new(raw));
        }

        assert!(sensor.calls().is_empty());
        assert!(sensor.state.lock().calls.is_none());
        assert!(sensor.observed(id).is_empty());
    }

    #[test]
    fn unsupported_refuses_subscriptions() {
        let sensor = SimulatedSensor::unsupported();
        let sink = ReportSink::new(|_| Ok(0));
        assert_eq!(
            sensor.create(&options(1.0), sink),
            Err(SensorError::Unsupported)
        );
    }

    #[test]
    fn report_only_reaches_watching_subscriptions() {
        let sensor = SimulatedSensor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = sensor.create(&options(1.0), counting_sink(seen.clone())).unwrap();
        let watched = ElementId::new(1);

        sensor.observe(id, watched);
        sensor.report(watched, true, 1.0);
        sensor.report(ElementId::new(2), true, 1.0);

        assert_eq!(sensor.pending(), 1);
        assert_eq!(sensor.flush().unwrap(), 1);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn flush_drops_reports_for_disposed_subscriptions() {
        let sensor = SimulatedSensor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = sensor.create(&options(1.0), counting_sink(seen.clone())).unwrap();
        let el = ElementId::new(1);

        sensor.observe(id, el);
        sensor.report(el, true, 1.0);
        sensor.dispose(id);

        assert_eq!(sensor.flush().unwrap(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn recompute_reports_initial_state_then_crossings() {
        let sensor = SimulatedSensor::new();
        sensor.set_viewport(Rect::new(0.0, 0.0, 100.0, 100.0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = sensor.create(&options(1.0), counting_sink(seen.clone())).unwrap();
        let el = ElementId::new(3);

        sensor.set_rect(el, Rect::new(0.0, 150.0, 100.0, 20.0));
        sensor.observe(id, el);
        sensor.recompute();
        sensor.flush().unwrap();
        assert_eq!(seen.lock().as_slice(), &[VisibilityReport::new(el, false, 0.0)]);

        // Partially visible: intersecting changes, threshold not met.
        sensor.set_rect(el, Rect::new(0.0, 90.0, 100.0, 20.0));
        sensor.recompute();
        sensor.flush().unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert!(seen.lock()[1].is_intersecting);
        assert!((seen.lock()[1].ratio - 0.5).abs() < 1e-9);

        // Still partial: no crossing, nothing queued.
        sensor.set_rect(el, Rect::new(0.0, 85.0, 100.0, 20.0));
        sensor.recompute();
        assert_eq!(sensor.pending(), 0);

        // Fully visible crosses the threshold.
        sensor.set_rect(el, Rect::new(0.0, 50.0, 100.0, 20.0));
        sensor.recompute();
        sensor.flush().unwrap();
        assert_eq!(seen.lock().last(), Some(&VisibilityReport::new(el, true, 1.0)));
    }

    #[test]
    fn recompute_uses_root_rect_and_margin() {
        let sensor = SimulatedSensor::new();
        let root = ElementId::new(100);
        let el = ElementId::new(1);
        sensor.set_rect(root, Rect::new(0.0, 0.0, 100.0, 100.0));
        sensor.set_rect(el, Rect::new(0.0, 110.0, 100.0, 10.0));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = sensor
            .create(
                &SensingOptions {
                    root: Some(root),
                    margin: RootMargin {
                        bottom: 50.0,
                        ..RootMargin::default()
                    },
                    threshold: Threshold::FULL,
                },
                counting_sink(seen.clone()),
            )
            .unwrap();

        sensor.observe(id, el);
        sensor.recompute();
        sensor.flush().unwrap();
        assert_eq!(seen.lock().as_slice(), &[VisibilityReport::new(el, true, 1.0)]);
    }
}
