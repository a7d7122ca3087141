//! The innermost input filter: reads the request body as the server decoded it.
//!
//! Chunk framing has already been stripped by the server's body decoder by the
//! time bytes arrive here, this filter only re-cuts the decoded data frames into
//! the windows each read asks for.

use std::error::Error;
use std::io;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::FutureExt;
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{trace, warn};

use crate::error::FilterError;
use crate::filter::{InputFilter, ReadBlock, ReadMode};
use crate::segment::Segment;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// Body may still produce data
    Streaming,
    /// Body is exhausted, end marker not handed out yet
    Ended,
    /// End marker handed out
    Closed,
    /// Size limit exceeded
    Failed,
}

/// Adapts an `http_body::Body` to the [`InputFilter`] read contract.
#[derive(Debug)]
pub struct BodyFilter<B> {
    body: B,
    /// fetched from the body but not yet handed out
    pending: Bytes,
    received: u64,
    limit: Option<u64>,
    state: State,
}

impl<B> BodyFilter<B>
where
    B: Body + Send + Unpin,
    B::Data: Send,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    pub fn new(body: B) -> Self {
        Self { body, pending: Bytes::new(), received: 0, limit: None, state: State::Streaming }
    }

    /// Caps the number of body bytes this filter accepts. Going over the limit
    /// fails the read with [`FilterError::AlreadyReported`].
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Body bytes pulled from the underlying body so far
    pub fn received(&self) -> u64 {
        self.received
    }

    async fn fill(&mut self, block: ReadBlock) -> Result<(), FilterError> {
        while self.pending.is_empty() && self.state == State::Streaming {
            let frame = match block {
                ReadBlock::Block => self.body.frame().await,
                ReadBlock::NonBlock => match self.body.frame().now_or_never() {
                    Some(frame) => frame,
                    None => return Err(FilterError::WouldBlock),
                },
            };

            match frame {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(mut data) => {
                        let bytes = data.copy_to_bytes(data.remaining());
                        self.account(bytes.len() as u64)?;
                        self.pending = bytes;
                    }
                    Err(_trailers) => trace!("skip trailer frame of request body"),
                },
                Some(Err(e)) => return Err(FilterError::io(io::Error::other(e))),
                None => self.state = State::Ended,
            }
        }
        Ok(())
    }

    fn account(&mut self, len: u64) -> Result<(), FilterError> {
        self.received += len;
        match self.limit {
            Some(limit) if self.received > limit => {
                warn!(limit, received = self.received, "request body exceeds the limit");
                self.state = State::Failed;
                self.pending.clear();
                Err(FilterError::AlreadyReported)
            }
            _ => Ok(()),
        }
    }

    fn take(&mut self, len: usize) -> Option<Segment> {
        (len > 0).then(|| Segment::Data(self.pending.split_to(len)))
    }

    /// Closes the round with the end marker once nothing is left to hand out.
    fn finish_round(&mut self, out: &mut Vec<Segment>) {
        if self.pending.is_empty() && (self.state == State::Ended || self.body.is_end_stream()) {
            out.push(Segment::Eos);
            self.state = State::Closed;
        }
    }
}

fn window(max_bytes: u64, available: usize) -> usize {
    usize::try_from(max_bytes).map_or(available, |max| max.min(available))
}

#[async_trait]
impl<B> InputFilter for BodyFilter<B>
where
    B: Body + Send + Unpin,
    B::Data: Send,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError> {
        match self.state {
            State::Failed => return Err(FilterError::AlreadyReported),
            State::Closed => return Err(FilterError::Eof),
            State::Streaming | State::Ended => {}
        }

        match mode {
            ReadMode::Init | ReadMode::EatCrlf => return Ok(()),
            ReadMode::ReadBytes => {
                self.fill(block).await?;
                let len = window(max_bytes, self.pending.len());
                out.extend(self.take(len));
            }
            ReadMode::GetLine => {
                self.fill(block).await?;
                let line_end = self.pending.iter().position(|&b| b == b'\n').map_or(self.pending.len(), |pos| pos + 1);
                let len = window(max_bytes, line_end);
                out.extend(self.take(len));
            }
            ReadMode::Speculative => {
                self.fill(block).await?;
                let len = window(max_bytes, self.pending.len());
                if len > 0 {
                    out.push(Segment::Data(self.pending.slice(..len)));
                }
                return Ok(());
            }
            ReadMode::Exhaustive => {
                let produced = out.len();
                loop {
                    let len = self.pending.len();
                    out.extend(self.take(len));
                    if self.state != State::Streaming || self.body.is_end_stream() {
                        break;
                    }
                    match self.fill(block).await {
                        Ok(()) => {}
                        // data already handed out must reach the caller
                        Err(FilterError::WouldBlock) if out.len() > produced => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.finish_round(out);
        Ok(())
    }
}
