//! Tracing setup for embedders.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives for a `DOM_PERMIT_LOG` value.
///
/// A bare level applies to the whole crate. Anything containing `=` is
/// taken as per-module directives, e.g. `activation=trace,gate=debug`;
/// module paths are relative to the crate.
fn filter_directives(raw: Option<&str>) -> String {
    let level = match raw.map(str::trim) {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        Some(custom) if custom.contains('=') => {
            return std::iter::once("dom_permit=info".to_string())
                .chain(
                    custom
                        .split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(|d| format!("dom_permit::{d}")),
                )
                .collect::<Vec<_>>()
                .join(",");
        }
        _ => "info",
    };
    format!("dom_permit={level}")
}

/// Initialize tracing with DOM_PERMIT_LOG and LOG_FORMAT support.
///
/// `RUST_LOG` takes precedence when set. Safe to call more than once; only
/// the first call installs a subscriber.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let raw = std::env::var("DOM_PERMIT_LOG").ok();
        EnvFilter::new(filter_directives(raw.as_deref()))
    };

    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let _ = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
}
