//! Replays a buffered request body.
//!
//! After the whole body has been collected into a [`SegmentStore`], the
//! [`ReplayFilter`] is put in front of the input chain and serves every bounded
//! read from the store, as if the body had arrived with a fixed length. Once the
//! store is used up, or when a read asks for a mode the store can't answer,
//! reads are passed on to the filter behind it.

use async_trait::async_trait;
use tracing::{error, trace};

use crate::error::FilterError;
use crate::filter::{InputFilter, ReadBlock, ReadMode};
use crate::segment::{Segment, SegmentStore};

/// How much of the buffered body has been handed out.
///
/// `offset + remaining` always equals the length of the store the cursor was
/// created for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReplayCursor {
    offset: u64,
    remaining: u64,
}

impl ReplayCursor {
    pub fn new(total_length: u64) -> Self {
        Self { offset: 0, remaining: total_length }
    }

    /// Bytes already delivered
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes left to deliver
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Clamps a read request to what is left.
    #[inline]
    fn window(&self, max_bytes: u64) -> u64 {
        max_bytes.min(self.remaining)
    }

    fn advance(&mut self, len: u64) {
        self.offset += len;
        self.remaining -= len;
    }
}

/// Input filter serving reads from a kept body.
pub struct ReplayFilter {
    kept_body: SegmentStore,
    cursor: ReplayCursor,
    next: Box<dyn InputFilter>,
}

impl ReplayFilter {
    pub fn new(kept_body: SegmentStore, next: Box<dyn InputFilter>) -> Self {
        let cursor = ReplayCursor::new(kept_body.len());
        Self { kept_body, cursor, next }
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.cursor
    }

    pub fn kept_body(&self) -> &SegmentStore {
        &self.kept_body
    }

    fn serves(&self, mode: ReadMode) -> bool {
        matches!(mode, ReadMode::ReadBytes | ReadMode::GetLine) && !self.cursor.is_exhausted()
    }
}

impl std::fmt::Debug for ReplayFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayFilter").field("kept_body", &self.kept_body).field("cursor", &self.cursor).finish_non_exhaustive()
    }
}

#[async_trait]
impl InputFilter for ReplayFilter {
    async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError> {
        if !self.serves(mode) {
            trace!(?mode, remaining = self.cursor.remaining(), "pass read to next filter");
            return self.next.read(out, mode, block, max_bytes).await;
        }

        let len = self.cursor.window(max_bytes);
        if len == 0 {
            return Ok(());
        }

        let start = self.cursor.offset();
        if let Err(e) = self.kept_body.slice_into(start, start + len, out) {
            error!(offset = start, len, cause = %e, "kept body partition failed");
            return Err(e.into());
        }

        self.cursor.advance(len);
        Ok(())
    }
}
