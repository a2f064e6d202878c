//! Best-effort progress reporting for long running stages.
//!
//! Stages report at coarse checkpoints (per grid row, per contour level).
//! Reports carry no guarantee of granularity and cannot cancel a stage.

/// Receiver of progress checkpoints. `fraction` runs from `0.0` to `1.0`
/// within the named stage.
pub trait Progress {
    fn report(&mut self, stage: &str, fraction: f64);
}

impl<F: FnMut(&str, f64)> Progress for F {
    fn report(&mut self, stage: &str, fraction: f64) {
        self(stage, fraction)
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _stage: &str, _fraction: f64) {}
}
