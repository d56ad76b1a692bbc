/// Classification for retry policy.
///
/// Used by the fetch client to decide whether a failed call is worth repeating.
///
/// | Class | Retried? |
/// |-------|----------|
/// | `Never` | No, surfaced immediately |
/// | `WithBackoff` | Yes, with exponential backoff up to the configured cap |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - unknown symbol, validation error, or terminal failure.
    Never,

    /// Transient failure (timeout, 429, 502/503/504).
    /// Retried after an exponentially growing delay.
    WithBackoff,
}
