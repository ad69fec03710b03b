/// The outcome of a single guest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
  /// Exit code on normal termination, or a distinguished non-zero value
  /// (`128 + signal`) when the guest died from a signal.
  pub status: i32,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  /// True iff the supervisor killed the guest because the wall-clock
  /// deadline elapsed, or the kernel killed it for exceeding the CPU cap.
  pub time_limit_exceeded: bool,
}
