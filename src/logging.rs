use tracing_subscriber::EnvFilter;

/// `RUST_LOG` directives win over the configured level; both fall back to info
fn filter(env_directives: Option<String>, default_level: &str) -> EnvFilter {
    env_directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global stderr subscriber. A second call is a no-op.
pub fn init(default_level: &str) {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(env_directives, default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
