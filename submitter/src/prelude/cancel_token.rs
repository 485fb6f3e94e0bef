use futures::Future;

pub use tokio_util::sync::CancellationToken;

/// Races a future against a cancellation signal.
pub trait FutureCancelExt: Future + Sized {
    /// Resolves to `None` if `cancel` completes first. The cancellation side is
    /// polled first, so an already-fired signal wins even against a ready future.
    fn with_cancel<C>(self, cancel: C) -> impl Future<Output = Option<Self::Output>>
    where
        C: Future<Output = ()>;
}

impl<F: Future> FutureCancelExt for F {
    fn with_cancel<C>(self, cancel: C) -> impl Future<Output = Option<Self::Output>>
    where
        C: Future<Output = ()>,
    {
        async move {
            tokio::select! {
                biased;
                _ = cancel => None,
                out = self => Some(out),
            }
        }
    }
}
