//! Sync/async duality
//!
//! Validation logic is written once as an `async` body. An [`Invocation`] is
//! what a validator call produces: either a result that is already available
//! or a boxed future. Awaiting it works for both; the synchronous entry points
//! poll exactly once and treat a pending body as a misuse error.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::ValidationError;

/// The outcome of calling a validator.
pub enum Invocation<'a, T> {
    /// The body completed without suspending.
    Ready(Option<Result<T, ValidationError>>),
    /// The body has to be awaited.
    Pending(BoxFuture<'a, Result<T, ValidationError>>),
}

impl<'a, T> Invocation<'a, T> {
    pub fn ready(result: Result<T, ValidationError>) -> Self {
        Self::Ready(Some(result))
    }

    pub fn pending(future: impl Future<Output = Result<T, ValidationError>> + Send + 'a) -> Self {
        Self::Pending(Box::pin(future))
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Resolves without an executor.
    ///
    /// A pending body gets one poll; if it still does not complete the call
    /// fails with [`ValidationError::Suspended`] naming `validator`.
    pub fn now(self, validator: &str) -> Result<T, ValidationError> {
        match self {
            Self::Ready(Some(result)) => result,
            Self::Ready(None) => Err(suspended(validator)),
            Self::Pending(future) => poll_once(validator, future),
        }
    }
}

impl<T: Unpin> Future for Invocation<'_, T> {
    type Output = Result<T, ValidationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Self::Ready(slot) => Poll::Ready(
                slot.take()
                    .unwrap_or_else(|| Err(suspended("invocation polled after completion"))),
            ),
            Self::Pending(future) => future.as_mut().poll(cx),
        }
    }
}

impl<T> std::fmt::Debug for Invocation<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Invocation::Ready"),
            Self::Pending(_) => f.write_str("Invocation::Pending"),
        }
    }
}

/// Runs `body` inline when `is_async` is false, boxes it otherwise.
pub(crate) fn drive<'a, T, F>(name: &str, is_async: bool, body: F) -> Invocation<'a, T>
where
    F: Future<Output = Result<T, ValidationError>> + Send + 'a,
{
    if is_async {
        Invocation::pending(body)
    } else {
        Invocation::ready(poll_once(name, body))
    }
}

/// Polls `body` once with a no-op waker.
pub(crate) fn poll_once<T>(
    name: &str,
    body: impl Future<Output = Result<T, ValidationError>>,
) -> Result<T, ValidationError> {
    body.now_or_never().unwrap_or_else(|| {
        tracing::warn!(validator = name, "synchronous call suspended");
        Err(suspended(name))
    })
}

fn suspended(name: &str) -> ValidationError {
    ValidationError::Suspended(Cow::Owned(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_bodies_resolve_inline() {
        let invocation = drive("double", false, async { Ok::<_, ValidationError>(21 * 2) });
        assert!(invocation.is_ready());
        assert_eq!(invocation.now("double").unwrap(), 42);
    }

    #[test]
    fn pending_bodies_report_suspension() {
        let invocation: Invocation<'_, i32> = Invocation::pending(futures::future::pending());
        let error = invocation.now("forever").unwrap_err();
        assert_eq!(error, ValidationError::Suspended("forever".into()));
    }
}
