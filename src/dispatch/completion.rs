//! Completion tracking: decides, exactly once, when the output may close.

/// Whether more work items can still arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundState {
    Open,
    Closed,
}

/// Watches inbound state and drain state.
///
/// The output closes iff inbound is closed, nothing is pending, and nothing
/// is in flight. [`CompletionTracker::try_close`] reports that transition
/// once; later calls return `false`.
#[derive(Debug)]
pub struct CompletionTracker {
    inbound: InboundState,
    closed: bool,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self {
            inbound: InboundState::Open,
            closed: false,
        }
    }

    /// Mark inbound closed. Returns `false` if it was already closed.
    pub fn close_inbound(&mut self) -> bool {
        if self.inbound == InboundState::Closed {
            return false;
        }
        self.inbound = InboundState::Closed;
        true
    }

    pub fn inbound(&self) -> InboundState {
        self.inbound
    }

    pub fn is_inbound_open(&self) -> bool {
        self.inbound == InboundState::Open
    }

    /// Whether the closing condition holds given the current drain state.
    pub fn should_close(&self, drained: bool) -> bool {
        !self.closed && self.inbound == InboundState::Closed && drained
    }

    /// Close the output if the condition holds. True only on the closing call.
    pub fn try_close(&mut self, drained: bool) -> bool {
        if !self.should_close(drained) {
            return false;
        }
        self.closed = true;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
