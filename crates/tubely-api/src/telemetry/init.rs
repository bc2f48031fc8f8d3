use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "tubely=debug,tower_http=debug";

/// Install the global tracing subscriber: `RUST_LOG` filtering, compact console
/// lines, or one JSON object per event when `json` is set.
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        let console_fmt = tracing_subscriber::fmt::layer()
            .event_format(Format::default().compact().with_target(false));
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .try_init()?;
    }

    tracing::info!(json, "Tracing initialized");
    Ok(())
}
