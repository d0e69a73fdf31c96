//! Subscription Reconciliation
//!
//! Turning configuration changes into sensor calls is kept as a pure
//! function so the lifecycle can be checked without a host or a render
//! loop.
//!
//! # Rules
//!
//! 1. Identical configuration produces an empty plan.
//! 2. Sensing options are immutable once a subscription exists. Any change
//!    disposes the old subscription and creates a new one.
//! 3. A bound anchor is unobserved before its subscription is disposed, and
//!    observed again right after the replacement is created, so a migration
//!    never loses the binding.

use smallvec::SmallVec;

use crate::sensing::{ElementId, SensingOptions};

/// A single call into the host sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorAction {
    /// Stop watching an element on the existing subscription.
    Unobserve(ElementId),
    /// Release the existing subscription.
    Dispose,
    /// Create a replacement subscription.
    Create(SensingOptions),
    /// Watch an element on the subscription that is live after this plan.
    Observe(ElementId),
}

/// Ordered sensor calls. Never longer than four.
pub type Plan = SmallVec<[SensorAction; 4]>;

/// Plan the move from the `current` subscription to the `desired` one.
///
/// `None` on either side means "no subscription". `anchor` is the element
/// bound to the role, which must end up observed by whatever subscription
/// remains.
pub fn reconcile(
    current: Option<&SensingOptions>,
    desired: Option<&SensingOptions>,
    anchor: Option<ElementId>,
) -> Plan {
    let mut plan = Plan::new();
    if current == desired {
        return plan;
    }

    if current.is_some() {
        if let Some(anchor) = anchor {
            plan.push(SensorAction::Unobserve(anchor));
        }
        plan.push(SensorAction::Dispose);
    }

    if let Some(desired) = desired {
        plan.push(SensorAction::Create(*desired));
        if let Some(anchor) = anchor {
            plan.push(SensorAction::Observe(anchor));
        }
    }

    plan
}

/// Plan an anchor swap on a live subscription.
///
/// The previous element is always released first. Rebinding the same
/// element re-observes it.
pub fn rebind(previous: Option<ElementId>, next: Option<ElementId>) -> Plan {
    let mut plan = Plan::new();
    if let Some(previous) = previous {
        plan.push(SensorAction::Unobserve(previous));
    }
    if let Some(next) = next {
        plan.push(SensorAction::Observe(next));
    }
    plan
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{RootMargin, Threshold};

    fn opts(root: Option<u64>, threshold: f64) -> SensingOptions {
        SensingOptions {
            root: root.map(ElementId::new),
            margin: RootMargin::default(),
            threshold: Threshold::new(threshold).unwrap(),
        }
    }

    const A: ElementId = ElementId::new(1);

    #[test]
    fn unchanged_config_is_noop() {
        let o = opts(None, 1.0);
        assert!(reconcile(Some(&o), Some(&o), Some(A)).is_empty());
        assert!(reconcile(None, None, Some(A)).is_empty());
    }

    #[test]
    fn enabling_creates_and_picks_up_anchor() {
        let o = opts(None, 1.0);
        assert_eq!(
            reconcile(None, Some(&o), Some(A)).as_slice(),
            &[SensorAction::Create(o), SensorAction::Observe(A)]
        );
        assert_eq!(
            reconcile(None, Some(&o), None).as_slice(),
            &[SensorAction::Create(o)]
        );
    }

    #[test]
    fn disabling_releases_anchor_then_disposes() {
        let o = opts(None, 1.0);
        assert_eq!(
            reconcile(Some(&o), None, Some(A)).as_slice(),
            &[SensorAction::Unobserve(A), SensorAction::Dispose]
        );
    }

    #[test]
    fn threshold_change_migrates_binding() {
        let old = opts(None, 1.0);
        let new = opts(None, 0.5);
        assert_eq!(
            reconcile(Some(&old), Some(&new), Some(A)).as_slice(),
            &[
                SensorAction::Unobserve(A),
                SensorAction::Dispose,
                SensorAction::Create(new),
                SensorAction::Observe(A),
            ]
        );
    }

    #[test]
    fn root_change_recreates_without_anchor() {
        let old = opts(None, 1.0);
        let new = opts(Some(9), 1.0);
        assert_eq!(
            reconcile(Some(&old), Some(&new), None).as_slice(),
            &[SensorAction::Dispose, SensorAction::Create(new)]
        );
    }

    #[test]
    fn margin_change_recreates() {
        let old = opts(None, 1.0);
        let new = SensingOptions {
            margin: RootMargin::uniform(32.0),
            ..old
        };
        assert_eq!(reconcile(Some(&old), Some(&new), None).len(), 2);
    }

    #[test]
    fn rebind_releases_previous_first() {
        let b = ElementId::new(2);
        assert_eq!(
            rebind(Some(A), Some(b)).as_slice(),
            &[SensorAction::Unobserve(A), SensorAction::Observe(b)]
        );
        assert_eq!(rebind(Some(A), None).as_slice(), &[SensorAction::Unobserve(A)]);
        assert_eq!(rebind(None, Some(b)).as_slice(), &[SensorAction::Observe(b)]);
        assert!(rebind(None, None).is_empty());
    }
}
