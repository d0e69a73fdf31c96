//! Visibility Sensing
//!
//! The sensing primitive is a host capability: given a root viewport, a
//! margin and a visibility-ratio threshold, it watches target elements and
//! reports how much of each one is visible. Browsers call this an
//! intersection observer; native and terminal hosts usually compute it from
//! layout rects.
//!
//! This module defines the narrow contract the controller consumes:
//!
//! - [`Sensor`]: the host-implemented capability.
//! - [`ReportSink`]: the channel through which a host delivers
//!   [`VisibilityReport`] batches back to the controller.
//! - [`SimulatedSensor`]: an in-memory host used by tests and by hosts that
//!   only have layout rects to work with.
//!
//! # Identity
//!
//! Elements are never owned or touched by the controller. They are referred
//! to by an opaque [`ElementId`] assigned by the host, and only compared for
//! identity.

mod simulated;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ScrollError, SensorError};

pub use simulated::{Rect, SensorCall, SimulatedSensor};

/// Host-assigned identity of a rendered element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    /// Wrap a host identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-assigned identity of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a host identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A visibility ratio in `[0, 1]`.
///
/// 1 means the anchor must be fully visible, 0.25 means a quarter of it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    /// Fully visible.
    pub const FULL: Threshold = Threshold(1.0);

    /// Validate a raw ratio. Returns `None` for NaN or values outside `[0, 1]`.
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    /// Get the ratio.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether a reported ratio reaches this threshold.
    pub fn is_met_by(&self, ratio: f64) -> bool {
        ratio >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::FULL
    }
}

/// Margin around the root, in pixels, applied before computing ratios.
///
/// Positive values grow the root's sensing box, negative values shrink it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    /// The same margin on all four sides.
    pub fn uniform(px: f64) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

impl fmt::Display for RootMargin {
    /// CSS `rootMargin` syntax, e.g. `"0px 0px 0px 0px"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Immutable configuration of a subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensingOptions {
    /// Sensing root. `None` is the host's default viewport.
    pub root: Option<ElementId>,
    pub margin: RootMargin,
    pub threshold: Threshold,
}

/// A single visibility report for an observed element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityReport {
    pub element: ElementId,
    pub is_intersecting: bool,
    /// Visible fraction of the element within the (margin-adjusted) root.
    pub ratio: f64,
}

impl VisibilityReport {
    pub fn new(element: ElementId, is_intersecting: bool, ratio: f64) -> Self {
        Self {
            element,
            is_intersecting,
            ratio,
        }
    }
}

/// Delivery channel from a host sensor back to the subscription's owner.
///
/// A sink stays valid for as long as the host wants to hold it, but it goes
/// inert as soon as the subscription it was created for is disposed: late
/// reports are dropped rather than dispatched.
#[derive(Clone)]
pub struct ReportSink {
    deliver: Arc<dyn Fn(&[VisibilityReport]) -> Result<usize, ScrollError> + Send + Sync>,
}

impl ReportSink {
    /// Create a sink from a delivery function.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(&[VisibilityReport]) -> Result<usize, ScrollError> + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Deliver a batch of reports.
    ///
    /// Returns the number of callbacks fired. A callback error stops the
    /// batch and is returned to the host.
    pub fn deliver(&self, batch: &[VisibilityReport]) -> Result<usize, ScrollError> {
        (self.deliver)(batch)
    }
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink").finish_non_exhaustive()
    }
}

/// The host's visibility sensing capability.
///
/// A subscription's configuration is fixed at creation. To change the root,
/// margin or threshold the controller disposes the old subscription and
/// creates a new one.
///
/// Implementations may deliver reports from inside `observe`; the controller
/// never holds its own locks while calling into the sensor.
pub trait Sensor: Send + Sync {
    /// Create a subscription that delivers reports through `sink`.
    fn create(&self, options: &SensingOptions, sink: ReportSink)
        -> Result<SubscriptionId, SensorError>;

    /// Start watching an element.
    fn observe(&self, subscription: SubscriptionId, element: ElementId);

    /// Stop watching an element.
    fn unobserve(&self, subscription: SubscriptionId, element: ElementId);

    /// Release the subscription and everything it watches.
    fn dispose(&self, subscription: SubscriptionId);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
