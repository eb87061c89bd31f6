//! Tracing setup shared by binaries and tests.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set and falls back to
/// `xenia=info`. Calling this more than once is harmless; later calls
/// leave the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xenia=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
