//! Retained body segments.
//!
//! A [`Segment`] is what an input filter hands out on every read: a span of body
//! bytes or the end-of-body marker. The [`SegmentStore`] keeps the segments of a
//! fully buffered body, in arrival order, and answers byte-offset slicing over
//! them for the replay filter.

use bytes::{Bytes, BytesMut};

use crate::ensure;
use crate::error::ReplayError;

/// An item produced by an input filter read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Immutable bytes that may be kept after the read call returns
    Data(Bytes),
    /// Bytes backed by a transport buffer that is only valid until the read call returns
    Transient(Bytes),
    /// Marks the end of the body
    Eos,
}

impl Segment {
    #[inline]
    pub fn data<B: Into<Bytes>>(bytes: B) -> Self {
        Segment::Data(bytes.into())
    }

    /// Returns true if this segment marks the end of the body
    #[inline]
    pub fn is_eos(&self) -> bool {
        matches!(self, Segment::Eos)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Segment::Data(bytes) | Segment::Transient(bytes) => Some(bytes),
            Segment::Eos => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Segment::Data(bytes) | Segment::Transient(bytes) => Some(bytes),
            Segment::Eos => None,
        }
    }

    /// Detaches the segment from the read call that produced it.
    ///
    /// Transient bytes are deep-copied into fresh storage; data segments and the
    /// end marker are returned as they are.
    #[must_use]
    pub fn into_owned(self) -> Self {
        match self {
            Segment::Transient(bytes) => Segment::Data(Bytes::copy_from_slice(&bytes)),
            other => other,
        }
    }
}

/// The fully buffered body: owned data segments plus the end-marker flag.
///
/// `ends[i]` is the body offset one past the last byte of `segments[i]`, so the
/// last entry is the total body length and offset lookups are a binary search.
#[derive(Debug, Default, Clone)]
pub struct SegmentStore {
    segments: Vec<Bytes>,
    ends: Vec<u64>,
    eos: bool,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment, copying it first if it is transient.
    ///
    /// Empty data segments carry nothing and are not kept.
    pub fn append(&mut self, segment: Segment) {
        match segment.into_owned() {
            Segment::Data(bytes) | Segment::Transient(bytes) => {
                if bytes.is_empty() {
                    return;
                }
                let end = self.len() + bytes.len() as u64;
                self.segments.push(bytes);
                self.ends.push(end);
            }
            Segment::Eos => self.eos = true,
        }
    }

    /// Total body length in bytes, the end marker excluded
    #[inline]
    pub fn len(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the end marker has been appended
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.eos
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.segments.iter()
    }

    /// Concatenates every kept segment into one buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(usize::try_from(self.len()).unwrap_or(0));
        for bytes in &self.segments {
            buf.extend_from_slice(bytes);
        }
        buf.freeze()
    }

    /// Locates the byte at `offset`: the index of the segment holding it and the
    /// position inside that segment.
    ///
    /// `offset == len()` is the partition point past the last segment.
    fn partition(&self, offset: u64) -> Result<(usize, usize), ReplayError> {
        ensure!(offset <= self.len(), ReplayError::out_of_range(offset, self.len()));

        let index = self.ends.partition_point(|&end| end <= offset);
        let start = index.checked_sub(1).map_or(0, |prev| self.ends[prev]);
        // bounded by the segment length, which is a usize
        let within = usize::try_from(offset - start).map_err(|_e| ReplayError::out_of_range(offset, self.len()))?;
        Ok((index, within))
    }

    /// Appends the bytes in `[start, end)` to `out` as shared slices of the kept
    /// segments, in order. Whole segments are handed out whole, the segments at
    /// either edge are cut.
    pub fn slice_into(&self, start: u64, end: u64, out: &mut Vec<Segment>) -> Result<(), ReplayError> {
        ensure!(start <= end, ReplayError::out_of_range(start, self.len()));

        let (first, first_at) = self.partition(start)?;
        let (last, last_at) = self.partition(end)?;

        for index in first..=last {
            let Some(bytes) = self.segments.get(index) else {
                break;
            };
            let from = if index == first { first_at } else { 0 };
            let to = if index == last { last_at } else { bytes.len() };
            if from < to {
                out.push(Segment::Data(bytes.slice(from..to)));
            }
        }

        Ok(())
    }
}
