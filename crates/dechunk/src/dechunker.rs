//! Turns a chunked request into a fixed-length one.
//!
//! [`Dechunker::maybe_activate`] runs once per request, before anything else
//! reads the body. For an eligible request it buffers the whole body, replaces
//! `Transfer-Encoding: chunked` with the computed `Content-Length`, and installs
//! a [`ReplayFilter`] in front of the request's input chain so every later reader
//! sees the buffered body. It never produces a response itself.

use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue};
use tracing::{debug, error};

use crate::collector::BodyCollector;
use crate::config::DechunkConfig;
use crate::error::CollectError;
use crate::filter::{InputPipeline, ReplayFilter};

/// Name the replay filter is installed under.
pub const REPLAY_FILTER_NAME: &str = "dechunk_replay_kept_body";

/// Outcome of [`Dechunker::maybe_activate`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub enum Decision {
    /// Let the following handlers process the request
    Decline,
    /// Buffering failed, the request must be answered with a server error
    InternalError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dechunker {
    config: DechunkConfig,
}

impl Dechunker {
    pub fn new(config: DechunkConfig) -> Self {
        Self { config }
    }

    /// Buffers the body of a chunked request and installs its replay.
    ///
    /// Requests are left untouched when the engine is off or when
    /// `Transfer-Encoding` is not exactly `chunked`.
    pub async fn maybe_activate(&self, headers: &mut HeaderMap, pipeline: &mut InputPipeline) -> Decision {
        if !self.config.engine || !is_chunked(headers) {
            return Decision::Decline;
        }

        let collector = BodyCollector::new(self.config.read_size);
        let kept_body = match collector.collect(pipeline).await {
            Ok(kept_body) => kept_body,
            // the failing filter has answered it already
            Err(CollectError::FatalAlreadyReported) => return Decision::InternalError,
            Err(e) => {
                error!(cause = %e, "cannot read chunked request body");
                return Decision::InternalError;
            }
        };

        let content_length = kept_body.len();
        headers.remove(TRANSFER_ENCODING);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

        pipeline.push_front(REPLAY_FILTER_NAME, |next| ReplayFilter::new(kept_body, next));
        debug!(content_length, "buffered chunked request body");

        Decision::Decline
    }
}

/// Strict match: the first `Transfer-Encoding` value must be the single token
/// `chunked`, ignoring ASCII case. Encoding lists like `gzip, chunked` don't match.
pub fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get(TRANSFER_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("chunked"))
}
