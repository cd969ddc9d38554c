use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger`. `RUST_LOG` wins over the defaults chosen here.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let level = if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_level(level)
            .filter_module("sqlx", log::LevelFilter::Warn)
            .filter_module("reqwest", log::LevelFilter::Warn)
            .filter_module("hyper", log::LevelFilter::Warn)
            .parse_default_env()
            .format_timestamp_secs()
            .init();

        crate::template::set_display_logs(debug);
        log::info!("Logging initialized (debug: {})", debug);
    });
}
