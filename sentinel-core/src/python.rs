//! Python Bindings
//!
//! Exposes the controller to Python UI code. The Python side supplies the
//! sensing primitive as a plain object with four methods:
//!
//! ```python
//! class Sensor:
//!     def create(self, root, margin, threshold, sink) -> int: ...
//!     def observe(self, handle, element): ...
//!     def unobserve(self, handle, element): ...
//!     def dispose(self, handle): ...
//! ```
//!
//! `sink` is a [`PyReportSink`]; the host calls it with
//! `(element, is_intersecting, ratio)` whenever visibility changes.
//! Exceptions raised by Python callbacks come back out of that call
//! unchanged. Element and subscription identities are plain integers.

use std::sync::Arc;

use pyo3::exceptions::{PyNotImplementedError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use tracing::warn;

use crate::error::{CallbackError, ScrollError, SensorError};
use crate::scroll::{Callback, InfiniteScroll, Phase, Role, ScrollOptions, Suppression};
use crate::sensing::{
    ElementId, ReportSink, RootMargin, SensingOptions, Sensor, SubscriptionId, VisibilityReport,
};

/// Convert a controller error into the Python exception it stands for.
///
/// Callback failures hand back the exception the callback raised.
fn into_py_err(err: ScrollError) -> PyErr {
    match err {
        ScrollError::Callback { source, .. } => match source.into_inner().downcast::<PyErr>() {
            Ok(err) => *err,
            Err(other) => PyRuntimeError::new_err(other.to_string()),
        },
        other => PyValueError::new_err(other.to_string()),
    }
}

fn py_callback(callable: PyObject) -> Callback {
    Callback::fallible(move || {
        Python::with_gil(|py| {
            callable
                .call0(py)
                .map(|_| ())
                .map_err(CallbackError::new)
        })
    })
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Disabled => "disabled",
        Phase::Armed => "armed",
        Phase::Watching => "watching",
        Phase::TornDown => "torn_down",
    }
}

/// A host sensor implemented in Python.
struct PySensor {
    host: PyObject,
}

impl PySensor {
    fn call(&self, method: &str, subscription: SubscriptionId, element: Option<ElementId>) {
        Python::with_gil(|py| {
            let result = match element {
                Some(element) => self
                    .host
                    .call_method1(py, method, (subscription.raw(), element.raw())),
                None => self.host.call_method1(py, method, (subscription.raw(),)),
            };
            if let Err(err) = result {
                warn!(method, %err, "python sensor call failed");
            }
        });
    }
}

impl Sensor for PySensor {
    fn create(
        &self,
        options: &SensingOptions,
        sink: ReportSink,
    ) -> Result<SubscriptionId, SensorError> {
        Python::with_gil(|py| {
            let sink = Py::new(py, PyReportSink { sink })
                .map_err(|err| SensorError::Rejected(err.to_string()))?;

            let handle = self
                .host
                .call_method1(
                    py,
                    "create",
                    (
                        options.root.map(|root| root.raw()),
                        options.margin.to_string(),
                        options.threshold.value(),
                        sink,
                    ),
                )
                .and_then(|handle| handle.extract::<u64>(py))
                .map_err(|err| {
                    if err.is_instance_of::<PyNotImplementedError>(py) {
                        SensorError::Unsupported
                    } else {
                        SensorError::Rejected(err.to_string())
                    }
                })?;

            Ok(SubscriptionId::new(handle))
        })
    }

    fn observe(&self, subscription: SubscriptionId, element: ElementId) {
        self.call("observe", subscription, Some(element));
    }

    fn unobserve(&self, subscription: SubscriptionId, element: ElementId) {
        self.call("unobserve", subscription, Some(element));
    }

    fn dispose(&self, subscription: SubscriptionId) {
        self.call("dispose", subscription, None);
    }
}

/// Python-exposed report sink.
///
/// Handed to the Python sensor's `create`; the host calls it to deliver
/// visibility reports.
#[pyclass(name = "ReportSink")]
pub struct PyReportSink {
    sink: ReportSink,
}

#[pymethods]
impl PyReportSink {
    /// Deliver a single report. Returns the number of callbacks fired.
    fn __call__(&self, element: u64, is_intersecting: bool, ratio: f64) -> PyResult<usize> {
        self.sink
            .deliver(&[VisibilityReport::new(
                ElementId::new(element),
                is_intersecting,
                ratio,
            )])
            .map_err(into_py_err)
    }

    /// Deliver a batch of `(element, is_intersecting, ratio)` tuples.
    fn deliver(&self, batch: Vec<(u64, bool, f64)>) -> PyResult<usize> {
        let batch: Vec<VisibilityReport> = batch
            .into_iter()
            .map(|(element, is_intersecting, ratio)| {
                VisibilityReport::new(ElementId::new(element), is_intersecting, ratio)
            })
            .collect();
        self.sink.deliver(&batch).map_err(into_py_err)
    }

    fn __repr__(&self) -> String {
        "ReportSink()".to_string()
    }
}

/// Python-exposed InfiniteScroll controller.
#[pyclass(name = "InfiniteScroll")]
pub struct PyInfiniteScroll {
    inner: InfiniteScroll,
}

#[pymethods]
impl PyInfiniteScroll {
    /// Create a controller. Without a sensor the controller is inert.
    #[new]
    #[pyo3(signature = (sensor=None))]
    fn new(sensor: Option<PyObject>) -> Self {
        let sensor = sensor.map(|host| Arc::new(PySensor { host }) as Arc<dyn Sensor>);
        Self {
            inner: InfiniteScroll::from_sensor(sensor),
        }
    }

    /// Apply one render's options.
    #[pyo3(signature = (
        on_load_more=None,
        on_load_threshold=1.0,
        on_refresh=None,
        on_refresh_threshold=1.0,
        container=None,
        root_margin=0.0,
        skip_initial_report=true
    ))]
    #[allow(clippy::too_many_arguments)]
    fn configure(
        &self,
        on_load_more: Option<PyObject>,
        on_load_threshold: f64,
        on_refresh: Option<PyObject>,
        on_refresh_threshold: f64,
        container: Option<u64>,
        root_margin: f64,
        skip_initial_report: bool,
    ) -> PyResult<()> {
        let options = ScrollOptions {
            container: container.map(ElementId::new),
            on_load_more: on_load_more.map(py_callback),
            on_load_threshold,
            on_refresh: on_refresh.map(py_callback),
            on_refresh_threshold,
            root_margin: RootMargin::uniform(root_margin),
            suppression: if skip_initial_report {
                Suppression::SkipInitialReport
            } else {
                Suppression::FireImmediately
            },
        };
        self.inner.configure(&options).map_err(into_py_err)
    }

    #[pyo3(signature = (element=None))]
    fn attach_container(&self, element: Option<u64>) {
        self.inner
            .container_ref()
            .attach(element.map(ElementId::new));
    }

    #[pyo3(signature = (element=None))]
    fn bind_load_anchor(&self, element: Option<u64>) {
        self.inner.on_load_anchor().bind(element.map(ElementId::new));
    }

    #[pyo3(signature = (element=None))]
    fn bind_refresh_anchor(&self, element: Option<u64>) {
        self.inner
            .on_refresh_anchor()
            .bind(element.map(ElementId::new));
    }

    /// Phase of a role: `"load"` or `"refresh"`.
    fn phase(&self, role: &str) -> PyResult<&'static str> {
        let role = match role {
            "load" => Role::Load,
            "refresh" => Role::Refresh,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown role {other:?}, expected \"load\" or \"refresh\""
                )))
            }
        };
        Ok(phase_name(self.inner.phase(role)))
    }

    #[getter]
    fn supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn dispose(&self) {
        self.inner.dispose();
    }

    fn __repr__(&self) -> String {
        format!(
            "InfiniteScroll(load={}, refresh={})",
            phase_name(self.inner.phase(Role::Load)),
            phase_name(self.inner.phase(Role::Refresh)),
        )
    }
}
