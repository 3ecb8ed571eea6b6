//! Diagnostic logging to stderr.

use std::io;

use tracing_subscriber::EnvFilter;

/// How much diagnostic output to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    #[default]
    Quiet,
    /// `--v1`
    Verbose,
    /// `--v2`
    Trace,
    /// `--v3`: like `Trace`, with request and response bodies.
    TraceRequests,
}

impl Verbosity {
    /// Picks the highest level asked for.
    #[must_use]
    pub const fn from_flags(verbose: bool, more_verbose: bool, trace_requests: bool) -> Self {
        if trace_requests {
            Self::TraceRequests
        } else if more_verbose {
            Self::Trace
        } else if verbose {
            Self::Verbose
        } else {
            Self::Quiet
        }
    }

    /// Default filter directive for this level.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Verbose => "info",
            Self::Trace | Self::TraceRequests => "trace",
        }
    }

    /// True if HTTP bodies should be traced.
    #[must_use]
    pub const fn traces_requests(self) -> bool {
        matches!(self, Self::TraceRequests)
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let locations = verbosity >= Verbosity::Trace;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_file(locations)
        .with_line_number(locations)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(false, false, false, Verbosity::Quiet, "error" ; "default")]
    #[test_case(true, false, false, Verbosity::Verbose, "info" ; "v1")]
    #[test_case(true, true, false, Verbosity::Trace, "trace" ; "v2 wins over v1")]
    #[test_case(false, false, true, Verbosity::TraceRequests, "trace" ; "v3")]
    fn verbosity_from_flags(v1: bool, v2: bool, v3: bool, level: Verbosity, directive: &str) {
        let verbosity = Verbosity::from_flags(v1, v2, v3);
        assert_eq!(verbosity, level);
        assert_eq!(verbosity.directive(), directive);
        assert_eq!(verbosity.traces_requests(), v3);
    }
}
