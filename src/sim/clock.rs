use std::ops::ControlFlow;

/// A simulation clock that tracks steps over a fixed horizon.
///
/// The `Clock` hands out step indices in order and can resume from any
/// point, so an interrupted run continues where it stopped.
///
/// # Examples
///
/// ```
/// use ev_site_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut steps = Vec::new();
///
/// clock.run(|step| steps.push(step));
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next step to hand out
    current: usize,
    /// Horizon (exclusive)
    total: usize,
}

impl Clock {
    /// Creates a new clock with a specified total number of steps.
    ///
    /// # Arguments
    ///
    /// * `total` - The total number of steps the clock will run
    pub fn new(total: usize) -> Self {
        Self::starting_at(0, total)
    }

    /// Creates a clock that resumes at `current`.
    pub fn starting_at(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// Next step the clock will hand out.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Returns `true` once every step has been handed out.
    pub fn is_finished(&self) -> bool {
        self.current >= self.total
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The current step number before advancing
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(usize)) {
        while let Some(step) = self.tick() {
            f(step);
        }
    }

    /// Runs `f` for each remaining step until it breaks.
    ///
    /// Returns the break value, or `Continue(())` if every step ran.
    pub fn run_while<B>(&mut self, mut f: impl FnMut(usize) -> ControlFlow<B>) -> ControlFlow<B> {
        while let Some(step) = self.tick() {
            f(step)?;
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock() {
        let clock = Clock::new(5);
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.total, 5);
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(2);
        assert_eq!(clock.tick(), Some(0));
        assert_eq!(clock.tick(), Some(1));
        assert_eq!(clock.tick(), None);
        assert!(clock.is_finished());
    }

    #[test]
    fn test_resume() {
        let mut clock = Clock::starting_at(3, 5);
        let mut steps = Vec::new();
        clock.run(|step| steps.push(step));
        assert_eq!(steps, vec![3, 4]);
    }

    #[test]
    fn test_run_while_stops_on_break() {
        let mut clock = Clock::new(10);
        let mut seen = Vec::new();
        let flow = clock.run_while(|step| {
            seen.push(step);
            if step == 2 {
                ControlFlow::Break(step)
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(2));
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(clock.current(), 3);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(0);
        assert_eq!(clock.tick(), None);

        let mut was_called = false;
        clock.run(|_| was_called = true);
        assert!(!was_called);
    }
}
