//! Sentinel Core
//!
//! This crate provides a headless controller for visibility-triggered
//! pagination and refresh. A list view marks two sentinel elements, one near
//! the bottom and one near the top, and the controller calls "load more" or
//! "refresh" when a sentinel scrolls into view.
//!
//! It does not render anything, and it does not fetch data. Visibility
//! itself comes from the host (a browser intersection observer, a native
//! toolkit, or the bundled rect-based [`sensing::SimulatedSensor`]).
//!
//! The crate is designed to be used both as a native Rust library and as a
//! Python extension module via PyO3 (feature `python`).
//!
//! # Architecture
//!
//! - `sensing`: the host capability contract and the simulated host
//! - `scroll`: role controllers, reconciliation and the public controller
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use sentinel_core::scroll::{InfiniteScroll, ScrollOptions};
//! use sentinel_core::sensing::{ElementId, Rect, SimulatedSensor};
//!
//! let sensor = Arc::new(SimulatedSensor::new());
//! sensor.set_viewport(Rect::new(0.0, 0.0, 400.0, 600.0));
//!
//! let pages = Arc::new(AtomicUsize::new(0));
//! let pages_clone = pages.clone();
//!
//! let scroll = InfiniteScroll::new(sensor.clone());
//! let sentinel = ElementId::new(7);
//! sensor.set_rect(sentinel, Rect::new(0.0, 900.0, 400.0, 40.0));
//! scroll.on_load_anchor().attach(sentinel);
//! scroll
//!     .configure(&ScrollOptions::new().on_load_more(move || {
//!         pages_clone.fetch_add(1, Ordering::SeqCst);
//!     }))
//!     .unwrap();
//!
//! // Initial state snapshot: suppressed.
//! sensor.recompute();
//! sensor.flush().unwrap();
//! assert_eq!(pages.load(Ordering::SeqCst), 0);
//!
//! // The user scrolls the sentinel fully into view.
//! sensor.set_rect(sentinel, Rect::new(0.0, 500.0, 400.0, 40.0));
//! sensor.recompute();
//! sensor.flush().unwrap();
//! assert_eq!(pages.load(Ordering::SeqCst), 1);
//! ```

pub mod error;
pub mod scroll;
pub mod sensing;

#[cfg(feature = "python")]
mod python;

pub use error::{CallbackError, ScrollError, SensorError};
pub use scroll::{AnchorHandle, Callback, ContainerRef, InfiniteScroll, Phase, Role, ScrollOptions};
pub use sensing::{ElementId, ReportSink, Sensor, VisibilityReport};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyInfiniteScroll>()?;
    m.add_class::<python::PyReportSink>()?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
