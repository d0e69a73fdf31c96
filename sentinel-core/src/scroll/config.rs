//! Controller Options
//!
//! [`ScrollOptions`] is the per-render configuration surface. Everything is
//! optional: a role without a callback is simply disabled, and thresholds
//! default to 1 (anchor fully visible).
//!
//! The non-callback fields can also be loaded from JSON, which is how hosts
//! that keep layout configuration in files feed the controller:
//!
//! ```rust
//! use sentinel_core::scroll::{ScrollOptions, Suppression};
//!
//! let options = ScrollOptions::from_json(
//!     r#"{ "on_load_threshold": 0.25, "suppression": "fire_immediately" }"#,
//! )
//! .unwrap()
//! .on_load_more(|| println!("load"));
//!
//! assert_eq!(options.on_load_threshold, 0.25);
//! assert_eq!(options.on_refresh_threshold, 1.0);
//! assert_eq!(options.suppression, Suppression::FireImmediately);
//! ```

use serde::{Deserialize, Serialize};

use super::{Callback, Role};
use crate::error::ScrollError;
use crate::sensing::{ElementId, RootMargin, Threshold};

/// Whether the first report after a (re)bind or (re)create is discarded.
///
/// A freshly created subscription reports the anchor's starting state right
/// away. With `SkipInitialReport`, an anchor that is already visible at mount
/// does not fire; only later crossings do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    #[default]
    SkipInitialReport,
    FireImmediately,
}

/// Configuration for one render of the controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    /// Explicit sensing root. Overrides the element attached to the
    /// container ref.
    pub container: Option<ElementId>,

    #[serde(skip)]
    pub on_load_more: Option<Callback>,

    /// Visibility ratio in `[0, 1]` for the load role.
    pub on_load_threshold: f64,

    #[serde(skip)]
    pub on_refresh: Option<Callback>,

    /// Visibility ratio in `[0, 1]` for the refresh role.
    pub on_refresh_threshold: f64,

    pub root_margin: RootMargin,

    pub suppression: Suppression,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            container: None,
            on_load_more: None,
            on_load_threshold: 1.0,
            on_refresh: None,
            on_refresh_threshold: 1.0,
            root_margin: RootMargin::default(),
            suppression: Suppression::default(),
        }
    }
}

impl ScrollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the non-callback options from JSON. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ScrollError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn container(mut self, container: ElementId) -> Self {
        self.container = Some(container);
        self
    }

    pub fn on_load_more(mut self, callback: impl Into<Callback>) -> Self {
        self.on_load_more = Some(callback.into());
        self
    }

    pub fn on_load_threshold(mut self, threshold: f64) -> Self {
        self.on_load_threshold = threshold;
        self
    }

    pub fn on_refresh(mut self, callback: impl Into<Callback>) -> Self {
        self.on_refresh = Some(callback.into());
        self
    }

    pub fn on_refresh_threshold(mut self, threshold: f64) -> Self {
        self.on_refresh_threshold = threshold;
        self
    }

    pub fn root_margin(mut self, margin: RootMargin) -> Self {
        self.root_margin = margin;
        self
    }

    pub fn suppression(mut self, suppression: Suppression) -> Self {
        self.suppression = suppression;
        self
    }

    /// The callback configured for a role.
    pub fn callback(&self, role: Role) -> Option<&Callback> {
        match role {
            Role::Load => self.on_load_more.as_ref(),
            Role::Refresh => self.on_refresh.as_ref(),
        }
    }

    /// The validated threshold for a role.
    pub fn threshold(&self, role: Role) -> Result<Threshold, ScrollError> {
        let value = match role {
            Role::Load => self.on_load_threshold,
            Role::Refresh => self.on_refresh_threshold,
        };
        Threshold::new(value).ok_or(ScrollError::InvalidThreshold { role, value })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
