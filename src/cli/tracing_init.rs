//! Tracing subscriber set-up, driven by the `OPENAPI_PROVIDER_LOG*` variables.

use crate::constants;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var(constants::ENV_LOG_FORMAT) {
            Err(_) => Self::Text,
            Ok(value) => match value.to_lowercase().as_str() {
                "json" => Self::Json,
                "text" => Self::Text,
                other => {
                    // Tracing is not initialised yet; stderr is the only channel.
                    eprintln!(
                        "Warning: unrecognised {} '{other}', expected 'json' or 'text'. Using 'text'.",
                        constants::ENV_LOG_FORMAT
                    );
                    Self::Text
                }
            },
        }
    }
}

/// Log sink: the file named by `OPENAPI_PROVIDER_LOG_FILE`, else stderr
struct LogWriter {
    file: Option<Mutex<std::fs::File>>,
}

impl LogWriter {
    fn from_env() -> Self {
        let Ok(path) = std::env::var(constants::ENV_LOG_FILE) else {
            return Self { file: None };
        };
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Self {
                file: Some(Mutex::new(file)),
            },
            Err(e) => {
                eprintln!("Warning: could not open log file '{path}': {e}. Using stderr.");
                Self { file: None }
            }
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file
            .as_ref()
            .and_then(|mutex| mutex.lock().ok())
            .and_then(|file| file.try_clone().ok())
            .map_or_else(
                || Box::new(std::io::stderr()) as Self::Writer,
                |file| Box::new(file) as Self::Writer,
            )
    }
}

/// Level filter: `-v` is debug, `-vv` trace, otherwise `OPENAPI_PROVIDER_LOG`
/// (default `error`)
fn env_filter(verbosity: u8) -> EnvFilter {
    let directive = match verbosity {
        0 => std::env::var(constants::ENV_LOG).unwrap_or_else(|_| "error".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("error"))
}

/// Installs the global subscriber. Call once, before any provider work.
pub fn init_tracing(verbosity: u8) {
    let filter = env_filter(verbosity);
    let writer = LogWriter::from_env();

    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(false)
                .with_target(true)
                .with_line_number(true)
                .with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Text => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}
