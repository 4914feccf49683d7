use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFilterLevel::Trace => f.write_str("trace"),
            LogFilterLevel::Debug => f.write_str("debug"),
            LogFilterLevel::Info => f.write_str("info"),
            LogFilterLevel::Warn => f.write_str("warn"),
            LogFilterLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub crate_name: String,
    pub filter_level: LogFilterLevel,
}

/// Builds the directive string used when `RUST_LOG` is not set.
///
/// Workspace crates default to `info`; anything else only reports errors.
/// Custom filters are appended last so they win over the defaults.
pub fn default_filter_directives(custom_filters: &[LogFilter]) -> String {
    // These need to have underscores because the Rust compiler automatically
    // converts all hyphens in crate names to underscores to make them valid
    // Rust identifiers
    let default_crate_names = ["descrint", "descrint_cli", "descrint_error", "descrint_tracing"];

    let mut directives = vec!["error".to_string()];
    directives.extend(default_crate_names.iter().map(|s| format!("{s}=info")));
    directives.extend(
        custom_filters
            .iter()
            .map(|filter| format!("{}={}", filter.crate_name, filter.filter_level)),
    );
    directives.join(",")
}

pub fn init_global_filter_layer(
    custom_filters: &[LogFilter],
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let global_filter = default_filter_directives(custom_filters);
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(global_filter)).boxed()
}

pub fn init_stdout_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed()
}

/// Installs the global subscriber. Returns `false` if one was already set,
/// which happens when several tests in one process initialise logging.
pub fn init_tracing(layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>) -> bool {
    let Some(layers) = layers.into_iter().reduce(|a, b| Box::new(a.and_then(b))) else {
        return false;
    };
    let subscriber = tracing_subscriber::registry().with(layers);
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => {
            tracing::debug!("Global tracing subscriber set");
            true
        }
        Err(_) => false,
    }
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();

        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            panic.backtrace = tracing::field::display(std::backtrace::Backtrace::capture()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

pub fn init_stdout_tracing(custom_filters: &[LogFilter]) {
    let layers = vec![
        // The global filter applies to all subsequent layers
        init_global_filter_layer(custom_filters),
        init_stdout_layer(),
    ];
    if init_tracing(layers) {
        init_panic_tracing_hook();
    }
}
