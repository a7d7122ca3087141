//! The request body handed to handlers.
//!
//! [`PipelineBody`] turns the pull-style reads of an [`InputPipeline`] into
//! `http_body` frames, so a handler reads a replayed body like any other.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use http_body::{Body, Frame, SizeHint};
use tracing::error;

use crate::error::FilterError;
use crate::filter::{InputFilter, InputPipeline, ReadBlock, ReadMode};
use crate::segment::Segment;

/// Bytes asked for by every read a [`PipelineBody`] issues.
pub const DEFAULT_FRAME_SIZE: u64 = 8192;

type ReadFuture = BoxFuture<'static, (InputPipeline, Result<Vec<Segment>, FilterError>)>;

/// Request body that reads its data from an [`InputPipeline`].
///
/// This is what handlers receive: every frame is the data of one blocking
/// `ReadBytes` read of the pipeline, so a replayed body is seen exactly like a
/// body with a fixed length.
pub struct PipelineBody {
    pipeline: Option<InputPipeline>,
    reading: Option<ReadFuture>,
    pending: VecDeque<Bytes>,
    frame_size: u64,
    length: Option<u64>,
    eof: bool,
}

impl PipelineBody {
    pub fn new(pipeline: InputPipeline) -> Self {
        Self { pipeline: Some(pipeline), reading: None, pending: VecDeque::new(), frame_size: DEFAULT_FRAME_SIZE, length: None, eof: false }
    }

    /// Declares the exact body length, reported through `size_hint`.
    #[must_use]
    pub fn with_length(mut self, length: Option<u64>) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_frame_size(mut self, frame_size: u64) -> Self {
        self.frame_size = frame_size.max(1);
        self
    }

    fn start_read(&mut self) -> Option<ReadFuture> {
        let mut pipeline = self.pipeline.take()?;
        let frame_size = self.frame_size;
        Some(
            async move {
                let mut out = Vec::new();
                let result = pipeline.read(&mut out, ReadMode::ReadBytes, ReadBlock::Block, frame_size).await;
                (pipeline, result.map(|()| out))
            }
            .boxed(),
        )
    }

    fn accept(&mut self, segments: Vec<Segment>) {
        for segment in segments {
            match segment.into_owned() {
                Segment::Eos => self.eof = true,
                other => {
                    if let Some(bytes) = other.into_bytes().filter(|bytes| !bytes.is_empty()) {
                        self.pending.push_back(bytes);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PipelineBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBody")
            .field("pipeline", &self.pipeline)
            .field("reading", &self.reading.is_some())
            .field("pending", &self.pending.len())
            .field("length", &self.length)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Body for PipelineBody {
    type Data = Bytes;
    type Error = FilterError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            if let Some(bytes) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(Frame::data(bytes))));
            }

            if this.eof {
                return Poll::Ready(None);
            }

            if this.reading.is_none() {
                match this.start_read() {
                    Some(reading) => this.reading = Some(reading),
                    None => {
                        error!("pipeline body polled without its pipeline");
                        this.eof = true;
                        return Poll::Ready(Some(Err(FilterError::unsupported("pipeline body lost its input pipeline"))));
                    }
                }
            }

            let Some(reading) = this.reading.as_mut() else {
                continue;
            };
            let (pipeline, result) = ready!(reading.poll_unpin(cx));
            this.reading = None;
            this.pipeline = Some(pipeline);

            match result {
                Ok(segments) => this.accept(segments),
                Err(FilterError::Eof) => this.eof = true,
                Err(e) => return Poll::Ready(Some(Err(e))),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        (self.eof && self.pending.is_empty()) || self.length == Some(0)
    }

    fn size_hint(&self) -> SizeHint {
        match self.length {
            Some(length) => SizeHint::with_exact(length),
            None => SizeHint::new(),
        }
    }
}
