/// Writes one line to a `Logger`. Compiled out with the `no_logging` feature.
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {{
        if !cfg!(feature = "no_logging") {
            if let Some(w) = $logger.line_writer() {
                let _ = std::io::Write::write_fmt(w, format_args!("{}\n", format_args!($($arg)*)));
            }
        }
    }};
}

/// Debug tracing for a single module, printed to stderr. Modules switch it on
/// through their local `debug_enabled!()`, the `eval_logging` feature
/// switches it on everywhere.
macro_rules! enabled_debug_print {
    ($enabled:expr, $module:literal, $format:literal) => {
        enabled_debug_print!($enabled, $module, $format,)
    };
    ($enabled:expr, $module:literal, $format:literal, $($args:expr),*) => {{
        if $enabled || cfg!(feature = "eval_logging") {
            eprintln!(concat!("[", $module, "] ", $format), $($args),*);
        }
    }};
}
