use log::warn;
use std::time::Duration;

/// Fixed-timestep accumulator.
///
/// Wall-clock time is fed in with [`FixedTimestep::advance`], which answers how
/// many whole steps to run. The remainder carries over to the next frame so the
/// simulation rate does not drift with scheduler jitter. Frame times above
/// `max_frame` are clamped so a stall cannot queue up an unbounded burst of steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    max_frame: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(step: Duration, max_frame: Duration) -> Self {
        Self {
            step,
            max_frame: max_frame.max(step),
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn step_secs(&self) -> f32 {
        self.step.as_secs_f32()
    }

    /// Adds `elapsed` to the accumulator and returns the number of steps due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let elapsed = if elapsed > self.max_frame {
            warn!(
                "Large frame time detected ({:.3}s), capping to {:.3}s",
                elapsed.as_secs_f32(),
                self.max_frame.as_secs_f32()
            );
            self.max_frame
        } else {
            elapsed
        };

        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    /// Time left before the next step is due.
    pub fn until_next_step(&self) -> Duration {
        self.step.saturating_sub(self.accumulator)
    }
}
