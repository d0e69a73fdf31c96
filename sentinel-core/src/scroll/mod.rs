//! Infinite Scroll Controller
//!
//! This module turns raw visibility reports into "load more" and "refresh"
//! callbacks. The caller renders a scrollable container with two sentinel
//! elements (one near the bottom, one near the top), hands their identities
//! to the controller, and gets called back when a sentinel becomes visible.
//!
//! # Structure
//!
//! - [`InfiniteScroll`] is the public surface. It composes two independent
//!   [`RoleController`]s that share one [`ContainerRef`].
//! - [`RoleController`] owns at most one sensing subscription and filters the
//!   reports it receives.
//! - [`AnchorHandle`] is the stable setter the caller attaches to a sentinel.
//! - [`reconcile`] is the pure planning step: given the current and desired
//!   subscription, it lists the sensor calls needed to get from one to the
//!   other.
//!
//! # Lifecycle
//!
//! Each role moves through an explicit [`Phase`]:
//!
//! ```text
//! Disabled --callback set--> Armed --anchor bound--> Watching
//!    ^                         ^  <--anchor unbound--   |
//!    +-------callback removed--+------------------------+
//!
//! any phase --dispose--> TornDown
//! ```

mod anchor;
mod callback;
mod config;
mod controller;
mod reconcile;
mod role;

use std::fmt;

pub use anchor::{AnchorHandle, ContainerRef};
pub use callback::Callback;
pub use config::{ScrollOptions, Suppression};
pub use controller::InfiniteScroll;
pub use reconcile::{reconcile, rebind, Plan, SensorAction};
pub use role::{Phase, RoleConfig, RoleController};

/// One of the two independent watch-and-callback channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Near-bottom sentinel; fires `on_load_more`.
    Load,
    /// Near-top sentinel; fires `on_refresh`.
    Refresh,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Load => "load",
            Role::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
