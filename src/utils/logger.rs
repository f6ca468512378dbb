use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// hyper/reqwest 的連線細節太吵
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// `RUST_LOG` wins over the built-in default.
fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},{}", default_directives, QUIET_DEPENDENCIES))
    })
}

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        env_filter("shipbridge=debug,info")
    } else {
        env_filter("shipbridge=info,warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// One JSON object per line, flattened for CloudWatch queries on `fields`.
pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(env_filter("shipbridge=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_target(true)
                .without_time(),
        )
        .init();
}
