use std::io;
use thiserror::Error;

/// Status reported by an [`InputFilter`](crate::filter::InputFilter) read that did not succeed.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Clean end of input, no data was produced by this read.
    #[error("end of input")]
    Eof,

    /// The filter hit a fatal condition and has already answered it on its own,
    /// callers must not report it a second time.
    #[error("input filter already reported a fatal error")]
    AlreadyReported,

    /// A non-blocking read found nothing ready.
    #[error("input would block")]
    WouldBlock,

    #[error("replay error: {source}")]
    Replay {
        #[from]
        source: ReplayError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl FilterError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::Io { source: io::Error::new(io::ErrorKind::Unsupported, reason.into()) }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("input filter already reported a fatal error")]
    FatalAlreadyReported,

    #[error("cannot read body: {source}")]
    Io { source: FilterError },
}

impl From<FilterError> for CollectError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::AlreadyReported => Self::FatalAlreadyReported,
            source => Self::Io { source },
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReplayError {
    #[error("kept body partition failed at offset {offset}, total length {total}")]
    OutOfRange { offset: u64, total: u64 },
}

impl ReplayError {
    pub fn out_of_range(offset: u64, total: u64) -> Self {
        Self::OutOfRange { offset, total }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown directive: {name}")]
    UnknownDirective { name: String },

    #[error("directive {directive} needs an argument")]
    MissingArgument { directive: String },

    #[error("directive {directive} takes one argument, On or Off, got: {value}")]
    InvalidFlag { directive: String, value: String },
}

impl ConfigError {
    pub fn unknown_directive<S: ToString>(name: S) -> Self {
        Self::UnknownDirective { name: name.to_string() }
    }

    pub fn missing_argument<S: ToString>(directive: S) -> Self {
        Self::MissingArgument { directive: directive.to_string() }
    }

    pub fn invalid_flag<D: ToString, V: ToString>(directive: D, value: V) -> Self {
        Self::InvalidFlag { directive: directive.to_string(), value: value.to_string() }
    }
}
