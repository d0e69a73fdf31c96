//! Caller-supplied callbacks.

use std::fmt;
use std::sync::Arc;

use crate::error::CallbackError;

/// A zero-argument callback invoked on a qualifying visibility crossing.
///
/// Clones share the underlying function. A role swaps in whatever callback
/// the latest `configure` passed, so identity is never compared.
///
/// # Example
///
/// ```rust
/// use sentinel_core::scroll::Callback;
///
/// let load_more = Callback::new(|| println!("fetch next page"));
/// load_more.invoke().unwrap();
/// ```
#[derive(Clone)]
pub struct Callback {
    run: Arc<dyn Fn() -> Result<(), CallbackError> + Send + Sync>,
}

impl Callback {
    /// Wrap an infallible function.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::fallible(move || {
            run();
            Ok(())
        })
    }

    /// Wrap a function that may fail. Errors are handed back to the host
    /// that delivered the triggering report.
    pub fn fallible<F>(run: F) -> Self
    where
        F: Fn() -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Invoke the callback.
    pub fn invoke(&self) -> Result<(), CallbackError> {
        (self.run)()
    }
}

impl<F> From<F> for Callback
where
    F: Fn() + Send + Sync + 'static,
{
    fn from(run: F) -> Self {
        Self::new(run)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
