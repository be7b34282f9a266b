use crate::error::{RandioError, RandioResult};
pub use tracing::instrument;
pub use tracing::{debug, error, info, trace, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber: fmt output filtered by `RUST_LOG`, plus the
/// error layer that lets `RandioError` capture span traces.
pub fn init_tracing() -> RandioResult<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| {
            Box::new(RandioError::invalid_state(format!(
                "tracing already initialized: {}",
                e
            )))
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::init_tracing;

    #[test]
    fn test_init_tracing_only_once() {
        // Another test may have installed the subscriber already.
        let _ = init_tracing();
        let err = init_tracing().unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
    }
}
