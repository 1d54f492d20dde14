//! Logger initialisation for the command line tool.
//!
//! The library itself only uses the `log` facade.

use std::io::Write;
use std::sync::Once;

use log::LevelFilter;

static INIT: Once = Once::new();

/// Default filter level: parser traces with `--verbose`, warnings otherwise.
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Warn
    }
}

/// Initialise the global logger once; later calls are ignored. A `RUST_LOG`
/// value takes precedence over `verbose`.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match std::env::var("RUST_LOG") {
            Ok(filter) if !filter.is_empty() => {
                builder.parse_filters(&filter);
            }
            _ => {
                builder.filter_level(default_level(verbose));
            }
        }
        builder.format(|buf, record| writeln!(buf, "{}", record.args()));
        builder.target(env_logger::Target::Stderr);
        builder.init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), LevelFilter::Trace);
        assert_eq!(default_level(false), LevelFilter::Warn);
    }
}
