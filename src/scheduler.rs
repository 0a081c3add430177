//! Fixed-window tick driver.

use crate::collab::{ResultLog, Spawner, TemplateStore};
use crate::error::SimError;
use crate::lifecycle::{GenerationReport, Lifecycle};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// What the scheduler drives. Implemented by [`Lifecycle`].
pub trait Generational {
    type Report;

    fn start(&mut self) -> Result<(), SimError>;
    fn resume(&mut self) -> Result<(), SimError>;
    fn stop(&mut self);
    /// Called once per tick while running, before the window check.
    fn tick(&mut self);
    /// Run one full generation transition.
    fn advance(&mut self) -> Result<Self::Report, SimError>;
}

impl<S, L, T> Generational for Lifecycle<S, L, T>
where
    S: Spawner,
    L: ResultLog,
    T: TemplateStore,
{
    type Report = GenerationReport;

    fn start(&mut self) -> Result<(), SimError> {
        Lifecycle::start(self)
    }

    fn resume(&mut self) -> Result<(), SimError> {
        Lifecycle::resume(self)
    }

    fn stop(&mut self) {
        Lifecycle::stop(self)
    }

    fn tick(&mut self) {
        self.drain_events()
    }

    fn advance(&mut self) -> Result<GenerationReport, SimError> {
        Lifecycle::advance(self)
    }
}

/// Cloneable stop request. Honoured at the next tick boundary, never in the
/// middle of a generation transition.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct TickOutcome<R> {
    /// Set when this tick completed a generation.
    pub report: Option<R>,
    /// Set when this tick honoured a stop request.
    pub stopped: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    simulation_timer: f64,
    elapsed: f64,
    running: bool,
    stop: StopHandle,
}

impl Scheduler {
    pub fn new(simulation_timer: f64) -> Self {
        Self {
            simulation_timer,
            elapsed: 0.0,
            running: false,
            stop: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time accumulated in the current window.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn start<G: Generational>(&mut self, sim: &mut G) -> Result<(), SimError> {
        sim.start()?;
        // Requests issued while not running are stale.
        self.stop.take();
        self.elapsed = 0.0;
        self.running = true;
        Ok(())
    }

    pub fn resume<G: Generational>(&mut self, sim: &mut G) -> Result<(), SimError> {
        sim.resume()?;
        self.stop.take();
        self.elapsed = 0.0;
        self.running = true;
        Ok(())
    }

    pub fn stop<G: Generational>(&mut self, sim: &mut G) {
        self.running = false;
        sim.stop();
    }

    /// Advance the clock by `dt` seconds.
    ///
    /// When the window has elapsed, exactly one generation transition runs and
    /// the accumulator restarts at `-dt`; the same tick's increment brings it
    /// back to zero. A failed transition halts the scheduler.
    pub fn tick<G: Generational>(
        &mut self,
        dt: f64,
        sim: &mut G,
    ) -> Result<TickOutcome<G::Report>, SimError> {
        let mut outcome = TickOutcome {
            report: None,
            stopped: false,
        };
        if !self.running {
            return Ok(outcome);
        }

        sim.tick();
        if self.elapsed >= self.simulation_timer {
            match sim.advance() {
                Ok(report) => outcome.report = Some(report),
                Err(error) => {
                    self.running = false;
                    return Err(error);
                }
            }
            self.elapsed = -dt;
        }
        self.elapsed += dt;

        if self.stop.take() {
            self.stop(sim);
            outcome.stopped = true;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::AgentKind;

    #[derive(Default)]
    struct Counter {
        started: usize,
        resumed: usize,
        stopped: usize,
        ticks: usize,
        advances: usize,
        fail_on: Option<usize>,
    }

    impl Generational for Counter {
        type Report = usize;

        fn start(&mut self) -> Result<(), SimError> {
            self.started += 1;
            Ok(())
        }

        fn resume(&mut self) -> Result<(), SimError> {
            self.resumed += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped += 1;
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }

        fn advance(&mut self) -> Result<usize, SimError> {
            if self.fail_on == Some(self.advances + 1) {
                return Err(SimError::PopulationCollapse {
                    kind: AgentKind::Boat,
                });
            }
            self.advances += 1;
            Ok(self.advances)
        }
    }

    fn generation_ticks(sched: &mut Scheduler, sim: &mut Counter, n_ticks: usize) -> Vec<usize> {
        (1..=n_ticks)
            .filter(|_| sched.tick(0.25, &mut *sim).unwrap().report.is_some())
            .collect()
    }

    #[test]
    fn idle_scheduler_does_nothing() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter::default();
        let outcome = sched.tick(0.25, &mut sim).unwrap();
        assert!(outcome.report.is_none());
        assert_eq!(sim.ticks, 0);
    }

    #[test]
    fn windows_fire_at_a_fixed_period() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter::default();
        sched.start(&mut sim).unwrap();

        let fired = generation_ticks(&mut sched, &mut sim, 13);
        assert_eq!(fired, vec![5, 9, 13]);
        assert_eq!(sim.advances, 3);
        assert_eq!(sched.elapsed(), 0.0);
    }

    #[test]
    fn coarse_ticks_restart_the_window_at_zero() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter::default();
        sched.start(&mut sim).unwrap();

        // 0.75-second ticks: each window closes at 1.5s, 0.5s late.
        let mut fired = Vec::new();
        for i_tick in 1..=9 {
            if sched.tick(0.75, &mut sim).unwrap().report.is_some() {
                fired.push(i_tick);
            }
        }
        assert_eq!(fired, vec![3, 6, 9]);
    }

    #[test]
    fn stop_request_is_honoured_after_the_cycle() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter::default();
        sched.start(&mut sim).unwrap();
        for _ in 0..4 {
            sched.tick(0.25, &mut sim).unwrap();
        }

        sched.stop_handle().request();
        let outcome = sched.tick(0.25, &mut sim).unwrap();
        assert_eq!(outcome.report, Some(1));
        assert!(outcome.stopped);
        assert!(!sched.is_running());
        assert_eq!(sim.stopped, 1);

        sched.resume(&mut sim).unwrap();
        assert!(sched.is_running());
        assert_eq!(sim.resumed, 1);
        assert!(!sched.stop_handle().is_requested());
    }

    #[test]
    fn request_before_start_is_discarded() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter::default();
        sched.stop_handle().request();
        sched.start(&mut sim).unwrap();

        let outcome = sched.tick(0.25, &mut sim).unwrap();
        assert!(!outcome.stopped);
        assert!(sched.is_running());
        assert_eq!(sim.stopped, 0);

        sched.stop(&mut sim);
        sched.stop_handle().request();
        sched.resume(&mut sim).unwrap();
        assert!(!sched.tick(0.25, &mut sim).unwrap().stopped);
        assert!(sched.is_running());
    }

    #[test]
    fn failed_transition_halts() {
        let mut sched = Scheduler::new(1.0);
        let mut sim = Counter {
            fail_on: Some(1),
            ..Counter::default()
        };
        sched.start(&mut sim).unwrap();

        let mut result = Ok(());
        for _ in 0..5 {
            result = sched.tick(0.25, &mut sim).map(|_| ());
        }
        assert!(matches!(result, Err(SimError::PopulationCollapse { .. })));
        assert!(!sched.is_running());
        assert_eq!(sim.advances, 0);

        let outcome = sched.tick(0.25, &mut sim).unwrap();
        assert!(outcome.report.is_none());
    }
}
