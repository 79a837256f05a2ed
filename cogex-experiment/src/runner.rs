use crate::state::Trial;
use cogex_core::{RenderAction, TrialError, TrialState};
use cogex_timing::HighPrecisionTimer;

/// Drives a prepared trial on the calling thread until it is done.
///
/// Sleeps until the next timed deadline, never longer than the configured
/// poll interval so audio end and captured input are noticed promptly. An
/// armed trial waits here for a start signal posted through its
/// [`TrialControl`](crate::TrialControl).
pub fn run_blocking<A: RenderAction>(trial: &mut Trial<A>) -> Result<(), TrialError> {
    let timer = HighPrecisionTimer::new();
    let max_wait = trial.config().poll_interval();
    loop {
        match trial.poll() {
            TrialState::Done => return Ok(()),
            TrialState::Idle => {
                return Err(TrialError::InvalidState {
                    operation: "run",
                    state: TrialState::Idle,
                });
            }
            _ => {}
        }
        let wait = match (trial.next_deadline(), trial.now()) {
            (Some(deadline), Some(now)) => deadline.saturating_duration_since(now).min(max_wait),
            _ => max_wait,
        };
        if !wait.is_zero() {
            timer.sleep(wait);
        }
    }
}
