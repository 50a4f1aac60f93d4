//! Call styles over a single operation future.
//!
//! Every public operation is an `async fn`. [`CallExt`] projects that future
//! into the other supported styles: blocking, callback, and a single-element
//! stream. Each style drives the same future once, so one call is one HTTP
//! exchange regardless of how the caller consumes it.

use crate::error::{ServiceError, ServiceResult};
use futures::stream::{self, Once};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;

static FALLBACK_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The runtime used by callers that are not inside one.
fn fallback_runtime() -> ServiceResult<&'static Runtime> {
    if let Some(runtime) = FALLBACK_RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("azure-cognitive-call")
        .enable_all()
        .build()
        .map_err(|e| ServiceError::Runtime(format!("failed to start runtime: {e}")))?;

    Ok(FALLBACK_RUNTIME.get_or_init(|| runtime))
}

/// Drive `future` to completion on the current thread.
///
/// Inside a multi-threaded Tokio runtime the worker is handed over with
/// [`tokio::task::block_in_place`]; outside any runtime a shared background
/// runtime is used.
///
/// # Errors
///
/// Returns [`ServiceError::Runtime`] when called from a current-thread
/// runtime, where blocking would deadlock; `.await` the future instead.
pub fn block_on<F: Future>(future: F) -> ServiceResult<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(ServiceError::Runtime(
                "cannot block inside a current-thread runtime; await the call instead".into(),
            )),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        },
        Err(_) => Ok(fallback_runtime()?.block_on(future)),
    }
}

/// Alternative ways to consume an operation call.
pub trait CallExt<T>: Future<Output = ServiceResult<T>> + Sized {
    /// Block the calling thread until the call completes.
    fn wait(self) -> ServiceResult<T> {
        block_on(self)?
    }

    /// Run the call in the background and hand its outcome to `callback`.
    ///
    /// The callback is invoked exactly once, with either the typed result or
    /// the error. Uses the ambient Tokio runtime when there is one.
    fn on_complete<F>(self, callback: F) -> ServiceResult<JoinHandle<()>>
    where
        Self: Send + 'static,
        T: Send + 'static,
        F: FnOnce(ServiceResult<T>) + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => fallback_runtime()?.handle().clone(),
        };
        Ok(handle.spawn(async move { callback(self.await) }))
    }

    /// View the call as a stream that yields its single outcome and ends.
    fn into_stream(self) -> Once<Self> {
        stream::once(self)
    }
}

impl<T, F> CallExt<T> for F where F: Future<Output = ServiceResult<T>> {}
