//! Anchor and container handles.
//!
//! These are what the rendering layer holds on to. Both are cheap to clone
//! and keep a stable identity for the lifetime of the controller, so a UI
//! framework can pass them as ref callbacks without them changing between
//! renders.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Phase, Role, RoleController};
use crate::sensing::ElementId;

/// Stable setter that binds a rendered element to a role.
///
/// Call `bind(Some(element))` when the sentinel mounts or is replaced and
/// `bind(None)` when it unmounts. Handles stay safe to call after the
/// controller is disposed; they just do nothing.
#[derive(Clone)]
pub struct AnchorHandle {
    role: RoleController,
}

impl AnchorHandle {
    pub(crate) fn new(role: RoleController) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role.role()
    }

    /// Bind a new element (or none), unbinding the previous one first.
    pub fn bind(&self, element: Option<ElementId>) {
        self.role.bind_anchor(element);
    }

    pub fn attach(&self, element: ElementId) {
        self.bind(Some(element));
    }

    pub fn detach(&self) {
        self.bind(None);
    }

    /// The element currently bound through this handle.
    pub fn current(&self) -> Option<ElementId> {
        self.role.anchor()
    }

    pub fn phase(&self) -> Phase {
        self.role.phase()
    }
}

impl PartialEq for AnchorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.role.ptr_eq(&other.role)
    }
}

impl Eq for AnchorHandle {}

impl fmt::Debug for AnchorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorHandle")
            .field("role", &self.role())
            .field("current", &self.current())
            .finish()
    }
}

/// Handle the caller attaches to the scrollable container.
///
/// The controller only reads it, and only when resolving the sensing root
/// during `configure`. An explicit `ScrollOptions::container` takes
/// precedence.
#[derive(Clone, Default)]
pub struct ContainerRef {
    current: Arc<Mutex<Option<ElementId>>>,
}

impl ContainerRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the container element, or `None` when it unmounts.
    pub fn attach(&self, element: Option<ElementId>) {
        *self.current.lock() = element;
    }

    pub fn get(&self) -> Option<ElementId> {
        *self.current.lock()
    }
}

impl PartialEq for ContainerRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.current, &other.current)
    }
}

impl Eq for ContainerRef {}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerRef").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_ref_clones_share_state() {
        let a = ContainerRef::new();
        let b = a.clone();
        a.attach(Some(ElementId::new(5)));
        assert_eq!(b.get(), Some(ElementId::new(5)));
        assert_eq!(a, b);
        assert_ne!(a, ContainerRef::new());

        b.attach(None);
        assert_eq!(a.get(), None);
    }

    #[test]
    fn anchor_handle_identity_follows_role() {
        let load = RoleController::new(Role::Load, None);
        let refresh = RoleController::new(Role::Refresh, None);

        let first = AnchorHandle::new(load.clone());
        let second = AnchorHandle::new(load);
        let other = AnchorHandle::new(refresh);

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn anchor_handle_stores_binding_without_sensor() {
        let handle = AnchorHandle::new(RoleController::new(Role::Refresh, None));
        handle.attach(ElementId::new(3));
        assert_eq!(handle.current(), Some(ElementId::new(3)));
        assert_eq!(handle.phase(), Phase::Disabled);

        handle.detach();
        assert_eq!(handle.current(), None);
    }
}
