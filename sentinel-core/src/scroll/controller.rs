//! The InfiniteScroll controller.
//!
//! Composes the load and refresh roles under one container configuration
//! and exposes the handles the rendering layer attaches to its elements.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sentinel_core::scroll::{InfiniteScroll, Phase, Role, ScrollOptions};
//! use sentinel_core::sensing::{ElementId, SimulatedSensor};
//!
//! let sensor = Arc::new(SimulatedSensor::new());
//! let scroll = InfiniteScroll::new(sensor.clone());
//!
//! // Render: attach the container and the bottom sentinel.
//! scroll.container_ref().attach(Some(ElementId::new(1)));
//! scroll.on_load_anchor().attach(ElementId::new(42));
//!
//! // Effect: apply this render's options.
//! scroll
//!     .configure(&ScrollOptions::new().on_load_more(|| println!("next page")))
//!     .unwrap();
//!
//! assert_eq!(scroll.phase(Role::Load), Phase::Watching);
//! assert_eq!(scroll.phase(Role::Refresh), Phase::Disabled);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{
    AnchorHandle, ContainerRef, Phase, Role, RoleConfig, RoleController, ScrollOptions,
};
use crate::error::ScrollError;
use crate::sensing::{ElementId, SensingOptions, Sensor};

/// Visibility-triggered pagination and refresh controller.
///
/// Dropping the controller disposes both roles.
pub struct InfiniteScroll {
    container: ContainerRef,
    load: RoleController,
    refresh: RoleController,
}

impl InfiniteScroll {
    /// Create a controller backed by a host sensor.
    pub fn new(sensor: Arc<dyn Sensor>) -> Self {
        Self::from_sensor(Some(sensor))
    }

    /// Create a controller for a host without visibility sensing.
    ///
    /// Everything is accepted and nothing ever fires.
    pub fn unsupported() -> Self {
        Self::from_sensor(None)
    }

    /// Create a controller from an optional host sensor.
    pub fn from_sensor(sensor: Option<Arc<dyn Sensor>>) -> Self {
        if sensor.is_none() {
            debug!("no visibility sensor available, controller is inert");
        }
        Self {
            container: ContainerRef::new(),
            load: RoleController::new(Role::Load, sensor.clone()),
            refresh: RoleController::new(Role::Refresh, sensor),
        }
    }

    /// Whether visibility sensing is available. Turns `false` once the host
    /// refuses a subscription as unsupported.
    pub fn is_supported(&self) -> bool {
        self.load.is_supported() && self.refresh.is_supported()
    }

    /// Handle for the scrollable container element.
    pub fn container_ref(&self) -> ContainerRef {
        self.container.clone()
    }

    /// Binding handle for the near-bottom sentinel.
    pub fn on_load_anchor(&self) -> AnchorHandle {
        AnchorHandle::new(self.load.clone())
    }

    /// Binding handle for the near-top sentinel.
    pub fn on_refresh_anchor(&self) -> AnchorHandle {
        AnchorHandle::new(self.refresh.clone())
    }

    pub fn role(&self, role: Role) -> &RoleController {
        match role {
            Role::Load => &self.load,
            Role::Refresh => &self.refresh,
        }
    }

    pub fn phase(&self, role: Role) -> Phase {
        self.role(role).phase()
    }

    /// The sensing root `configure` would use right now.
    pub fn resolve_root(&self, options: &ScrollOptions) -> Option<ElementId> {
        options.container.or_else(|| self.container.get())
    }

    /// Apply one render's options.
    ///
    /// Both thresholds are validated before anything changes, so an invalid
    /// value leaves both roles exactly as they were. Root, margin or
    /// threshold changes migrate live subscriptions and keep bound anchors
    /// registered.
    pub fn configure(&self, options: &ScrollOptions) -> Result<(), ScrollError> {
        let load_threshold = options.threshold(Role::Load)?;
        let refresh_threshold = options.threshold(Role::Refresh)?;
        let root = self.resolve_root(options);

        for (role, threshold) in [(&self.load, load_threshold), (&self.refresh, refresh_threshold)] {
            role.configure(RoleConfig {
                callback: options.callback(role.role()).cloned(),
                sensing: SensingOptions {
                    root,
                    margin: options.root_margin,
                    threshold,
                },
                suppression: options.suppression,
            });
        }

        Ok(())
    }

    /// Tear down both roles. Idempotent.
    pub fn dispose(&self) {
        self.load.dispose();
        self.refresh.dispose();
    }
}

impl Drop for InfiniteScroll {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for InfiniteScroll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteScroll")
            .field("container", &self.container)
            .field("load", &self.load)
            .field("refresh", &self.refresh)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
