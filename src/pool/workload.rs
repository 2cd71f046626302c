//! Per-iteration state transitions run by workers
//!
//! A workload is any deterministic, side-effect free step function. The
//! worker owns its state by value and calls `step` once per iteration, so a
//! workload is shared immutably across all worker threads.

/// A deterministic per-iteration state transition
pub trait Workload: Send + Sync + 'static {
    /// Compute the next state of `worker` from `state`
    fn step(&self, worker: usize, state: f64) -> f64;
}

/// Default CPU-bound placeholder: `state = sqrt(state^2 + worker)`
#[derive(Debug, Clone, Copy, Default)]
pub struct SqrtDrift;

impl Workload for SqrtDrift {
    #[inline]
    fn step(&self, worker: usize, state: f64) -> f64 {
        (state * state + worker as f64).sqrt()
    }
}

impl<F> Workload for F
where
    F: Fn(usize, f64) -> f64 + Send + Sync + 'static,
{
    #[inline]
    fn step(&self, worker: usize, state: f64) -> f64 {
        self(worker, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_drift() {
        // Worker 0 is a fixed point
        assert_eq!(SqrtDrift.step(0, 0.0), 0.0);
        assert_eq!(SqrtDrift.step(0, 5.0), 5.0);

        // sqrt(3^2 + 16) = 5
        assert_eq!(SqrtDrift.step(16, 3.0), 5.0);
    }

    #[test]
    fn test_closure_workload() {
        let double = |_worker: usize, state: f64| state * 2.0;
        assert_eq!(double.step(1, 1.5), 3.0);
    }
}
