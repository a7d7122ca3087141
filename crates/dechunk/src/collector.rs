//! Drains a request body into a [`SegmentStore`].

use tracing::{debug, trace};

use crate::error::{CollectError, FilterError};
use crate::filter::{InputFilter, ReadBlock, ReadMode};
use crate::segment::SegmentStore;

/// Upper bound of a single collection read.
pub const DEFAULT_READ_SIZE: u64 = 8192;

/// Reads an input chain to its end marker, keeping every segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BodyCollector {
    read_size: u64,
}

impl Default for BodyCollector {
    fn default() -> Self {
        Self { read_size: DEFAULT_READ_SIZE }
    }
}

impl BodyCollector {
    /// A `read_size` of 0 is raised to 1, an empty window never reaches the end marker.
    pub fn new(read_size: u64) -> Self {
        Self { read_size: read_size.max(1) }
    }

    /// Collects the whole body from `source`.
    ///
    /// Each round is one blocking `ReadBytes` read. Transient segments are copied
    /// into the store before the next read is issued. Collection stops after the
    /// round holding the end marker, or on a clean end of input. Failures are
    /// returned as they are, a half-drained body is never retried.
    pub async fn collect<F>(&self, source: &mut F) -> Result<SegmentStore, CollectError>
    where
        F: InputFilter + ?Sized,
    {
        let mut kept_body = SegmentStore::new();
        let mut round = Vec::new();
        let mut eos_seen = false;

        while !eos_seen {
            match source.read(&mut round, ReadMode::ReadBytes, ReadBlock::Block, self.read_size).await {
                Ok(()) => {}
                Err(FilterError::Eof) => break,
                Err(e) => return Err(e.into()),
            }

            trace!(segments = round.len(), "collected body round");
            for segment in round.drain(..) {
                eos_seen |= segment.is_eos();
                kept_body.append(segment);
            }
        }

        debug!(length = kept_body.len(), segments = kept_body.segment_count(), "collected request body");
        Ok(kept_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BodyFilter, MockInputFilter};
    use http_body_util::Full;
    use crate::segment::Segment;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::io;

    type Round = Result<Vec<Segment>, FilterError>;

    fn scripted(rounds: Vec<Round>) -> MockInputFilter {
        let mut rounds = VecDeque::from(rounds);
        let mut source = MockInputFilter::new();
        source.expect_read().returning(move |out, mode, block, _| {
            assert_eq!(mode, ReadMode::ReadBytes);
            assert_eq!(block, ReadBlock::Block);
            let segments = rounds.pop_front().expect("read past the scripted rounds")?;
            out.extend(segments);
            Ok(())
        });
        source
    }

    fn data(s: &'static str) -> Segment {
        Segment::data(Bytes::from_static(s.as_bytes()))
    }

    #[tokio::test]
    async fn test_collects_until_eos() {
        let mut source = scripted(vec![Ok(vec![data("Hello")]), Ok(vec![data(" World"), Segment::Eos])]);

        let kept_body = BodyCollector::default().collect(&mut source).await.unwrap();

        assert_eq!(kept_body.len(), 11);
        assert!(kept_body.is_sealed());
        assert_eq!(&kept_body.to_bytes()[..], b"Hello World");
    }

    #[tokio::test]
    async fn test_keeps_draining_round_after_eos() {
        let mut source = scripted(vec![Ok(vec![data("a"), Segment::Eos, data("b")])]);

        let kept_body = BodyCollector::default().collect(&mut source).await.unwrap();

        assert_eq!(&kept_body.to_bytes()[..], b"ab");
    }

    #[tokio::test]
    async fn test_eof_ends_collection() {
        let mut source = scripted(vec![Ok(vec![data("partial")]), Err(FilterError::Eof)]);

        let kept_body = BodyCollector::default().collect(&mut source).await.unwrap();

        assert_eq!(kept_body.len(), 7);
        assert!(!kept_body.is_sealed());
    }

    #[tokio::test]
    async fn test_transient_segments_are_detached() {
        let scratch = Bytes::from(vec![b'x'; 4]);
        let mut source = scripted(vec![Ok(vec![Segment::Transient(scratch.clone()), Segment::Eos])]);

        let kept_body = BodyCollector::default().collect(&mut source).await.unwrap();

        let kept = kept_body.iter().next().unwrap();
        assert_eq!(kept, &scratch);
        assert_ne!(kept.as_ptr(), scratch.as_ptr());
    }

    #[tokio::test]
    async fn test_already_reported() {
        let mut source = scripted(vec![Ok(vec![data("abc")]), Err(FilterError::AlreadyReported)]);

        let result = BodyCollector::default().collect(&mut source).await;

        assert!(matches!(result, Err(CollectError::FatalAlreadyReported)));
    }

    #[tokio::test]
    async fn test_io_error() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let mut source = scripted(vec![Err(FilterError::io(reset))]);

        let result = BodyCollector::default().collect(&mut source).await;

        assert!(matches!(result, Err(CollectError::Io { source: FilterError::Io { .. } })));
    }

    #[tokio::test]
    async fn test_uses_read_size() {
        let mut source = MockInputFilter::new();
        source.expect_read().withf(|_, _, _, max_bytes| *max_bytes == 3).times(1).returning(|out, _, _, _| {
            out.push(Segment::Eos);
            Ok(())
        });

        let kept_body = BodyCollector::new(3).collect(&mut source).await.unwrap();

        assert!(kept_body.is_empty());
        assert!(kept_body.is_sealed());
    }

    #[tokio::test]
    async fn test_zero_read_size_still_reaches_eos() {
        let mut source = BodyFilter::new(Full::new(Bytes::from_static(b"abc")));

        let kept_body = BodyCollector::new(0).collect(&mut source).await.unwrap();

        assert_eq!(BodyCollector::new(0), BodyCollector::new(1));
        assert_eq!(&kept_body.to_bytes()[..], b"abc");
        assert!(kept_body.is_sealed());
    }
}
