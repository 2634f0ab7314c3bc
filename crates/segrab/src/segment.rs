use bytes::Bytes;
use url::Url;

/// One fetchable chunk of the stream. `index` is the stable original
/// manifest order and decides the final assembly order.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub url: Url,
}

/// Lifecycle of a segment. Transitions are monotonic:
/// `Pending -> InFlight -> {Done | Failed}`. A terminal state is never
/// re-entered, even though an in-flight attempt may be aborted and
/// retried many times before the terminal transition.
#[derive(Debug, Clone)]
pub enum SegmentState {
    Pending,
    InFlight,
    Done { data: Bytes },
    Failed,
}

impl SegmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed)
    }

    /// Advance to `next`. Terminal states are final; re-entering one is a
    /// worker logic bug.
    pub fn advance(&mut self, next: SegmentState) {
        debug_assert!(
            !self.is_terminal(),
            "terminal segment state re-entered: {self:?} -> {next:?}"
        );
        *self = next;
    }
}

/// Terminal result of one segment, produced by the worker owning its
/// partition and consumed by the assembler.
#[derive(Debug, Clone)]
pub struct SegmentOutcome {
    pub index: usize,
    pub state: SegmentState,
}

impl SegmentOutcome {
    /// Payload bytes for `Done` segments, `None` for failed ones.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.state {
            SegmentState::Done { data } => Some(data),
            _ => None,
        }
    }
}
