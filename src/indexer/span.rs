/// Spans below this are not worth shrinking further, unless fewer blocks
/// remain to scan.
pub const MIN_SPAN: u64 = 100;

/// Remembers the last block span a chain's endpoint accepted and halves the
/// span when the endpoint rejects a range. One controller per chain poller;
/// never shared across chains.
#[derive(Debug, Clone)]
pub struct SpanController {
    max_span: u64,
    last_good: Option<u64>,
}

impl SpanController {
    pub fn new(max_span: u64) -> Self {
        Self {
            max_span,
            last_good: None,
        }
    }

    pub fn last_good(&self) -> Option<u64> {
        self.last_good
    }

    /// Span for the first attempt of a batch: the remembered safe span,
    /// capped by the ceiling and by the blocks actually remaining.
    pub fn initial_span(&self, remaining: u64) -> u64 {
        let candidate = self
            .last_good
            .unwrap_or(self.max_span)
            .min(self.max_span)
            .min(remaining);
        self.apply_floor(candidate, remaining)
    }

    /// Halves the current span after a range rejection and remembers the
    /// result so the next batch starts from it.
    pub fn shrink(&mut self, current: u64, remaining: u64) -> u64 {
        let candidate = (current / 2).min(remaining).min(self.max_span).max(1);
        let result = self.apply_floor(candidate, remaining);
        self.last_good = Some(result);
        result
    }

    /// Records a span the endpoint accepted.
    pub fn remember(&mut self, span: u64) {
        self.last_good = Some(span);
    }

    // Spans are floored at min(MIN_SPAN, remaining) and are never zero.
    fn apply_floor(&self, span: u64, remaining: u64) -> u64 {
        span.max(MIN_SPAN.min(remaining)).max(1)
    }
}
