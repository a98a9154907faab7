//! Global error handling mechanisms.

/// Let Runnel handle fatal errors in the process.
///
/// Operators have no way of returning errors to the runtime, so errors they can not recover
/// from, like a topic vanishing from under a sink, abort the worker thread. A spawned runtime
/// reports this as a failure through its handle.
pub trait RunnelFatal<T, E>: Sized + sealed::Sealed {
    /// Abort the computation as gracefully as possible due to a fatal non-recoverable error.
    fn runnel_fatal(self) -> T;
}

impl<T, E> RunnelFatal<T, E> for Result<T, E>
where
    E: std::fmt::Debug + std::error::Error + Send + Sync + 'static,
{
    fn runnel_fatal(self) -> T {
        match self {
            Ok(x) => x,
            Err(e) => {
                let report = eyre::Report::new(e);
                tracing::error!("{report:?}");
                panic!("{report:?}")
            }
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}
