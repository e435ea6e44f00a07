/// How a fan-out stage reacts to its first failure.
///
/// The fetch stage defaults to [`FanoutPolicy::FailFast`]: a partial result
/// set is useless, so the first page error cancels every sibling worker. The
/// persist stage defaults to [`FanoutPolicy::CollectAll`]: a partial backup of
/// unrelated items is still useful, so siblings run to completion and the
/// failures are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanoutPolicy {
    /// Cancel all in-flight work as soon as one task fails.
    #[default]
    FailFast,
    /// Let every task run to completion and aggregate the failures.
    CollectAll,
}
