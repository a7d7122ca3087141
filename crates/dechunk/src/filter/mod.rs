//! Request body input filters.
//!
//! A request body reaches its consumers through a chain of input filters. Every
//! filter answers the same bounded read contract ([`InputFilter::read`]) and is
//! free to serve the read itself or to delegate to the filter behind it.
//!
//! - [`BodyFilter`]: the innermost stage, reading an `http_body::Body`
//! - [`ReplayFilter`]: serves a buffered body from a [`SegmentStore`](crate::segment::SegmentStore)
//! - [`InputPipeline`]: the named chain itself, read from its front
//! - [`ClosedFilter`]: the stage behind an exhausted connection

mod body_filter;
mod replay;

pub use body_filter::BodyFilter;
pub use replay::ReplayCursor;
pub use replay::ReplayFilter;

use async_trait::async_trait;
use tracing::trace;

use crate::error::FilterError;
use crate::segment::Segment;

/// How much of the input a read wants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// Up to `max_bytes` bytes
    ReadBytes,
    /// One line, up to and including `\n`, capped at `max_bytes`
    GetLine,
    /// Swallow a blank line between pipelined requests
    EatCrlf,
    /// Peek at up to `max_bytes` bytes without consuming them
    Speculative,
    /// Everything that is left
    Exhaustive,
    /// Prime the filter chain, no data wanted
    Init,
}

/// Whether a read may wait for data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadBlock {
    Block,
    NonBlock,
}

/// One stage of a request body input chain.
///
/// A successful read appends zero or more segments to `out`; the end of the body
/// is signalled by a [`Segment::Eos`] or, when there is nothing at all left to
/// produce, by [`FilterError::Eof`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputFilter: Send {
    async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError>;
}

#[async_trait]
impl<F: InputFilter + ?Sized> InputFilter for Box<F> {
    async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError> {
        (**self).read(out, mode, block, max_bytes).await
    }
}

/// The filter behind a connection that has nothing more to give.
#[derive(Debug, Default, Copy, Clone)]
pub struct ClosedFilter;

#[async_trait]
impl InputFilter for ClosedFilter {
    async fn read(&mut self, _out: &mut Vec<Segment>, _mode: ReadMode, _block: ReadBlock, _max_bytes: u64) -> Result<(), FilterError> {
        Err(FilterError::Eof)
    }
}

/// A request's chain of input filters, read from the front.
///
/// Filters are added with [`push_front`](InputPipeline::push_front) and receive the
/// previous front as the stage they delegate to, so the newest filter sees every
/// read first.
pub struct InputPipeline {
    front: Box<dyn InputFilter>,
    names: Vec<&'static str>,
}

impl InputPipeline {
    pub fn new<F: InputFilter + 'static>(name: &'static str, filter: F) -> Self {
        Self { front: Box::new(filter), names: vec![name] }
    }

    /// Installs a filter ahead of all current ones.
    ///
    /// `make` receives the current front and returns the filter that replaces it.
    pub fn push_front<F, M>(&mut self, name: &'static str, make: M)
    where
        F: InputFilter + 'static,
        M: FnOnce(Box<dyn InputFilter>) -> F,
    {
        let next = std::mem::replace(&mut self.front, Box::new(ClosedFilter));
        self.front = Box::new(make(next));
        self.names.insert(0, name);
        trace!(filter = name, "installed input filter");
    }

    /// Names of the installed filters, front first
    pub fn filter_names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|installed| *installed == name)
    }
}

impl std::fmt::Debug for InputPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPipeline").field("filters", &self.names).finish_non_exhaustive()
    }
}

#[async_trait]
impl InputFilter for InputPipeline {
    async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError> {
        self.front.read(out, mode, block, max_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Tagging {
        tag: &'static str,
        next: Box<dyn InputFilter>,
    }

    #[async_trait]
    impl InputFilter for Tagging {
        async fn read(&mut self, out: &mut Vec<Segment>, mode: ReadMode, block: ReadBlock, max_bytes: u64) -> Result<(), FilterError> {
            out.push(Segment::data(Bytes::from_static(self.tag.as_bytes())));
            self.next.read(out, mode, block, max_bytes).await
        }
    }

    #[tokio::test]
    async fn test_closed_filter_is_eof() {
        let mut out = vec![];
        let result = ClosedFilter.read(&mut out, ReadMode::ReadBytes, ReadBlock::Block, 10).await;

        assert!(matches!(result, Err(FilterError::Eof)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_push_front_orders_filters() {
        let mut pipeline = InputPipeline::new("closed", ClosedFilter);
        pipeline.push_front("inner", |next| Tagging { tag: "inner", next });
        pipeline.push_front("outer", |next| Tagging { tag: "outer", next });

        assert_eq!(pipeline.filter_names(), &["outer", "inner", "closed"]);
        assert!(pipeline.contains("inner"));
        assert!(!pipeline.contains("replay"));

        let mut out = vec![];
        let result = pipeline.read(&mut out, ReadMode::GetLine, ReadBlock::Block, 1).await;

        assert!(matches!(result, Err(FilterError::Eof)));
        assert_eq!(out, vec![Segment::data(Bytes::from_static(b"outer")), Segment::data(Bytes::from_static(b"inner"))]);
    }
}
