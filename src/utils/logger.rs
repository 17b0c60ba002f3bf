use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RUST_LOG 優先；否則依 verbose 決定本 crate 的層級
fn level_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("libprep_core=debug,info")
        } else {
            EnvFilter::new("libprep_core=info")
        }
    })
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(level_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 執行紀錄以 JSON 逐行輸出，verbose 時包含每個移液指令
pub fn init_json_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(level_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .json()
                .with_current_span(false),
        )
        .init();
}
