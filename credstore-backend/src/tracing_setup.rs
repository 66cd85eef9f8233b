use tracing_subscriber::fmt::time::ChronoUtc;

/// Initialize tracing from configuration. `RUST_LOG` wins over the
/// configured level when set.
pub fn install_tracing_from_config(cfg: &credstore_config::LoggingConfig) {
    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::new(&env_filter_str);

    // The two formatters produce different subscriber types.
    if cfg.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .init();
    }
}
