use std::io::{stderr, IsTerminal};

use tracing_subscriber::{
    filter::ParseError,
    fmt::layer,
    layer::SubscriberExt,
    registry,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

// Types

pub type Result<T = ()> = std::result::Result<T, Error>;

// Error

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid log filter: {0}")]
    Filter(
        #[from]
        #[source]
        ParseError,
    ),
    #[error("failed to install tracer: {0}")]
    Init(
        #[from]
        #[source]
        TryInitError,
    ),
}

// Functions

/// Installs the global subscriber, logging to stderr.
///
/// Colors are only enabled when stderr is a terminal so that piped output
/// of `gen` and `history` stays clean.
pub fn init_tracer<FILTER: Into<String>>(log_filter: FILTER) -> Result {
    let filter = EnvFilter::builder().parse(log_filter.into())?;
    let sub = layer()
        .with_ansi(stderr().is_terminal())
        .with_writer(stderr);
    registry().with(filter).with(sub).try_init()?;
    Ok(())
}

// Tests

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_filter() {
        let res = init_tracer("passforge_core=verbose");
        assert!(matches!(res, Err(Error::Filter(_))));
    }

    #[test]
    fn second_init_fails() {
        crate::test::init_tracer();
        let res = init_tracer("warn");
        assert!(matches!(res, Err(Error::Init(_))));
    }
}
