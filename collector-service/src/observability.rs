use tracing_subscriber::{filter::Directive, EnvFilter};

/// Installs the global fmt subscriber. `RUST_LOG` directives are extended
/// with info-level defaults for this workspace's crates.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["collector_service=info", "solar_client=info"] {
        if let Ok(d) = directive.parse::<Directive>() {
            filter = filter.add_directive(d);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
