//! The monitoring loop.
//!
//! A controller owns one run: acquire every handle, then repeat
//! sample -> evaluate -> dispatch until shutdown is requested, then release
//! everything in reverse acquisition order. The lifecycle is a small state
//! machine:
//!
//! ```text
//! Idle --acquired--> Running --shutdown / fatal error--> Draining --released--> Stopped
//!   \--acquisition failed-------------------------------------------------------^
//! ```
//!
//! Shutdown is checked between iterations and during the inter-iteration
//! wait, never in the middle of an iteration: once a sample is taken its
//! decision reaches every sink.

use std::time::{Duration, Instant};

use crate::error::LoopError;
use crate::process::Processor;
use crate::session::{Session, SessionBuilder};
use crate::shutdown::ShutdownSignal;
use crate::sink::SinkSet;
use crate::source::SampleSource;

const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Pause between the end of one iteration and the start of the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Free-running (the vision loop).
    Immediate,
    /// Fixed wait (the environment loop).
    Every(Duration),
}

/// One source, one processor, the sinks fed by it.
pub struct Pipeline<S, P>
where
    S: SampleSource,
    P: Processor<Input = S::Output>,
{
    pub source: S,
    pub processor: P,
    pub sinks: SinkSet<S::Output, P::Output>,
}

impl<S, P> Pipeline<S, P>
where
    S: SampleSource,
    P: Processor<Input = S::Output>,
{
    pub fn new(source: S, processor: P, sinks: SinkSet<S::Output, P::Output>) -> Self {
        Self {
            source,
            processor,
            sinks,
        }
    }

    /// One iteration. Sink failures are returned, not raised: they never
    /// abort the iteration.
    fn step(&mut self) -> Result<Vec<LoopError>, LoopError> {
        let observation = self.source.sample()?;
        let decision = self.processor.evaluate(&observation)?;
        Ok(self.sinks.dispatch(&observation, &decision))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    /// Iterations that lost their sample or decision to a recoverable error.
    pub degraded: u64,
    pub sink_failures: u64,
}

pub struct LoopController {
    cadence: Cadence,
    shutdown: ShutdownSignal,
    max_iterations: Option<u64>,
    state: LoopState,
    transitions: Vec<(LoopState, LoopState)>,
}

impl LoopController {
    pub fn new(cadence: Cadence, shutdown: ShutdownSignal) -> Self {
        Self {
            cadence,
            shutdown,
            max_iterations: None,
            state: LoopState::Idle,
            transitions: Vec::new(),
        }
    }

    /// Stop on our own after `limit` iterations.
    pub fn with_max_iterations(mut self, limit: Option<u64>) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Every transition taken so far, oldest first.
    pub fn transitions(&self) -> &[(LoopState, LoopState)] {
        &self.transitions
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    fn enter(&mut self, next: LoopState) {
        log::debug!("loop state {:?} -> {:?}", self.state, next);
        self.transitions.push((self.state, next));
        self.state = next;
    }

    /// Run the loop to completion.
    ///
    /// `acquire` opens every handle through the session builder and wires
    /// the pipeline. If it fails, whatever it already opened is released
    /// and the error is returned without entering `Running`.
    pub fn run<S, P, F>(&mut self, acquire: F) -> Result<RunSummary, LoopError>
    where
        S: SampleSource,
        P: Processor<Input = S::Output>,
        F: FnOnce(&mut SessionBuilder) -> Result<Pipeline<S, P>, LoopError>,
    {
        if self.state != LoopState::Idle {
            return Err(LoopError::Config(format!(
                "controller already used (state {:?})",
                self.state
            )));
        }

        let mut builder = Session::builder();
        let pipeline = match acquire(&mut builder) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                log::error!("{}", err);
                drop(builder);
                self.enter(LoopState::Stopped);
                return Err(err);
            }
        };
        let mut session = builder.finish();
        log::info!(
            "acquired {} handle(s): {}",
            session.resources().len(),
            session.resources().join(", ")
        );

        self.enter(LoopState::Running);
        let (summary, fatal) = self.drive(pipeline);

        self.enter(LoopState::Draining);
        let report = session.release();
        if !report.is_clean() {
            log::warn!("{} handle(s) failed to release", report.failed.len());
        }
        self.enter(LoopState::Stopped);
        log::info!(
            "loop stopped after {} iteration(s) ({} degraded, {} sink failure(s))",
            summary.iterations,
            summary.degraded,
            summary.sink_failures
        );

        match fatal {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    /// Iterate until told to stop. Consumes the pipeline so that its
    /// handle references are gone before the session releases them.
    fn drive<S, P>(&mut self, mut pipeline: Pipeline<S, P>) -> (RunSummary, Option<LoopError>)
    where
        S: SampleSource,
        P: Processor<Input = S::Output>,
    {
        let mut summary = RunSummary::default();
        while !self.shutdown.is_requested() && !self.limit_reached(summary.iterations) {
            summary.iterations += 1;
            match pipeline.step() {
                Ok(failures) => summary.sink_failures += failures.len() as u64,
                Err(err) if err.is_recoverable() => {
                    log::warn!("iteration {} degraded: {}", summary.iterations, err);
                    summary.degraded += 1;
                }
                Err(err) => {
                    log::error!("iteration {} failed: {}", summary.iterations, err);
                    return (summary, Some(err));
                }
            }
            if self.limit_reached(summary.iterations) {
                break;
            }
            self.wait();
        }
        if self.shutdown.is_requested() {
            log::info!("shutdown requested");
        }
        (summary, None)
    }

    fn limit_reached(&self, iterations: u64) -> bool {
        self.max_iterations.is_some_and(|limit| iterations >= limit)
    }

    fn wait(&self) {
        let Cadence::Every(period) = self.cadence else {
            return;
        };
        let deadline = Instant::now() + period;
        while !self.shutdown.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Resource, Shared};
    use crate::sink::Sink;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Handle {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Resource for Handle {
        fn release(&mut self) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("release {}", self.name));
            Ok(())
        }
    }

    struct Counter {
        handle: Shared<Handle>,
        next: u32,
        fail_on: Option<u32>,
        fatal_on: Option<u32>,
        stop_after: Option<(u32, ShutdownSignal)>,
    }

    impl Counter {
        fn new(handle: Shared<Handle>) -> Self {
            Self {
                handle,
                next: 0,
                fail_on: None,
                fatal_on: None,
                stop_after: None,
            }
        }
    }

    impl SampleSource for Counter {
        type Output = u32;

        fn sample(&mut self) -> Result<u32, LoopError> {
            self.next += 1;
            let handle = self.handle.borrow();
            handle.log.borrow_mut().push(format!("sample {}", self.next));
            if let Some((n, signal)) = &self.stop_after {
                if self.next == *n {
                    signal.request();
                }
            }
            if self.fail_on == Some(self.next) {
                return Err(LoopError::Capture(anyhow!("dropped frame")));
            }
            if self.fatal_on == Some(self.next) {
                return Err(LoopError::Config("device vanished".into()));
            }
            Ok(self.next)
        }
    }

    struct Double;

    impl Processor for Double {
        type Input = u32;
        type Output = u32;

        fn evaluate(&mut self, n: &u32) -> Result<u32, LoopError> {
            Ok(n * 2)
        }
    }

    struct Collect(Rc<RefCell<Vec<u32>>>);

    impl Sink<u32, u32> for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }

        fn consume(&mut self, _n: &u32, doubled: &u32) -> anyhow::Result<()> {
            self.0.borrow_mut().push(*doubled);
            Ok(())
        }
    }

    struct Broken;

    impl Sink<u32, u32> for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn consume(&mut self, _n: &u32, _d: &u32) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn handle(
        builder: &mut SessionBuilder,
        name: &'static str,
        log: &Rc<RefCell<Vec<String>>>,
    ) -> Result<Shared<Handle>, LoopError> {
        let log = log.clone();
        builder.acquire(name, move || Ok(Handle { name, log }))
    }

    #[test]
    fn runs_until_limit_and_releases() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new())
            .with_max_iterations(Some(3));

        let summary = controller
            .run(|b| {
                let h = handle(b, "camera", &log)?;
                Ok(Pipeline::new(
                    Counter::new(h),
                    Double,
                    SinkSet::new().with(Collect(seen.clone())),
                ))
            })
            .unwrap();

        assert_eq!(summary.iterations, 3);
        assert_eq!(*seen.borrow(), vec![2, 4, 6]);
        assert_eq!(log.borrow().last().map(String::as_str), Some("release camera"));
        assert_eq!(controller.state(), LoopState::Stopped);
        assert_eq!(
            controller.transitions(),
            &[
                (LoopState::Idle, LoopState::Running),
                (LoopState::Running, LoopState::Draining),
                (LoopState::Draining, LoopState::Stopped),
            ]
        );
    }

    #[test]
    fn shutdown_finishes_the_current_iteration() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let shutdown = ShutdownSignal::new();
        let mut controller = LoopController::new(Cadence::Immediate, shutdown.clone());

        let summary = controller
            .run(|b| {
                let h = handle(b, "camera", &log)?;
                let mut source = Counter::new(h);
                source.stop_after = Some((2, shutdown.clone()));
                Ok(Pipeline::new(
                    source,
                    Double,
                    SinkSet::new().with(Collect(seen.clone())),
                ))
            })
            .unwrap();

        assert_eq!(summary.iterations, 2);
        assert_eq!(*seen.borrow(), vec![2, 4]);
    }

    #[test]
    fn recoverable_errors_degrade_one_iteration() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new())
            .with_max_iterations(Some(3));

        let summary = controller
            .run(|b| {
                let h = handle(b, "camera", &log)?;
                let mut source = Counter::new(h);
                source.fail_on = Some(2);
                Ok(Pipeline::new(
                    source,
                    Double,
                    SinkSet::new().with(Broken).with(Collect(seen.clone())),
                ))
            })
            .unwrap();

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.sink_failures, 2);
        assert_eq!(*seen.borrow(), vec![2, 6]);
    }

    #[test]
    fn fatal_error_drains_and_returns_it() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new())
            .with_max_iterations(Some(10));

        let result = controller.run(|b| {
            let h = handle(b, "camera", &log)?;
            let mut source = Counter::new(h);
            source.fatal_on = Some(2);
            Ok(Pipeline::new(source, Double, SinkSet::new()))
        });

        assert!(matches!(result, Err(LoopError::Config(_))));
        assert_eq!(controller.state(), LoopState::Stopped);
        assert!(log.borrow().contains(&"release camera".to_string()));
    }

    #[test]
    fn acquisition_failure_releases_earlier_handles() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new());

        let result = controller.run(|b| {
            let h = handle(b, "gpio", &log)?;
            b.acquire::<Handle, _>("i2c", || Err(anyhow!("bus 1 missing")))?;
            handle(b, "humiture", &log)?;
            Ok(Pipeline::new(Counter::new(h), Double, SinkSet::new()))
        });

        assert!(matches!(result, Err(LoopError::Acquisition { resource: "i2c", .. })));
        assert_eq!(*log.borrow(), vec!["release gpio".to_string()]);
        assert_eq!(
            controller.transitions(),
            &[(LoopState::Idle, LoopState::Stopped)]
        );
    }

    #[test]
    fn wait_wakes_early_on_shutdown() {
        let shutdown = ShutdownSignal::new();
        let cadence = Cadence::Every(Duration::from_secs(30));
        let controller = LoopController::new(cadence, shutdown.clone());
        let remote = shutdown.clone();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            remote.request();
        });

        let started = Instant::now();
        controller.wait();
        waker.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
