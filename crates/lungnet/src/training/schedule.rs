//! Cyclical learning-rate schedule with exponentially decaying amplitude.

/// Learning rate for `step` under a cyclical schedule whose amplitude
/// decays by `gamma` each step.
///
/// The rate ramps linearly from `base_lr` to `max_lr` over `step_size_up`
/// steps, back down over the same number of steps, and repeats. The
/// triangle amplitude is scaled by `gamma.powi(step)`, so later cycles
/// peak lower while the floor stays at `base_lr`.
pub fn cyclical_lr(
    step: usize,
    base_lr: f64,
    max_lr: f64,
    gamma: f64,
    step_size_up: usize,
) -> f64 {
    let up = step_size_up as f64;
    let s = step as f64;
    let cycle = (1.0 + s / (2.0 * up)).floor();
    let x = (s / up - 2.0 * cycle + 1.0).abs();
    let scale = (1.0 - x).max(0.0) * gamma.powi(step as i32);
    base_lr + (max_lr - base_lr) * scale
}

/// Stateful view over [`cyclical_lr`], advanced once per epoch.
#[derive(Debug, Clone)]
pub struct CyclicLr {
    base_lr: f64,
    max_lr: f64,
    gamma: f64,
    step_size_up: usize,
    step: usize,
}

impl CyclicLr {
    pub fn new(base_lr: f64, max_lr: f64, gamma: f64, step_size_up: usize) -> Self {
        Self {
            base_lr,
            max_lr,
            gamma,
            step_size_up,
            step: 0,
        }
    }

    /// Learning rate for the current step.
    pub fn lr(&self) -> f64 {
        cyclical_lr(
            self.step,
            self.base_lr,
            self.max_lr,
            self.gamma,
            self.step_size_up,
        )
    }

    /// Move to the next step. Called after each completed epoch.
    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn completed_steps(&self) -> usize {
        self.step
    }
}
