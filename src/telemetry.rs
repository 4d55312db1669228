use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the JSON log subscriber.
/// The level comes from `RUST_LOG` and defaults to `info`; records emitted
/// through the `log` facade (actix's `Logger`) are forwarded as well.
pub fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    // `try_init` so tests that spawn several apps can call this repeatedly
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_telemetry_is_idempotent() {
        init_telemetry();
        init_telemetry();
        tracing::info!(target: "natours", "telemetry initialized twice");
    }
}
