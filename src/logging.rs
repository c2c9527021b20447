//! Logging configuration using tracing
//!
//! Logs go to stderr so `--json` output on stdout stays machine readable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "proxydeck=info,warn";
const VERBOSE_DIRECTIVES: &str = "proxydeck=debug,reqwest=info,hyper=info,warn";

/// Filter directives: `-v` wins, then `RUST_LOG`, then the defaults
fn filter_directives(verbose: bool, env: Option<&str>) -> String {
    if verbose {
        return VERBOSE_DIRECTIVES.to_string();
    }
    env.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES)
        .to_string()
}

/// Initialize the logging system
pub fn init(verbose: bool, json: bool) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directives(verbose, env.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives(true, Some("trace")), VERBOSE_DIRECTIVES);
        assert_eq!(filter_directives(false, Some("proxydeck=trace")), "proxydeck=trace");
        assert_eq!(filter_directives(false, Some("  ")), DEFAULT_DIRECTIVES);
        assert_eq!(filter_directives(false, None), DEFAULT_DIRECTIVES);
    }
}
