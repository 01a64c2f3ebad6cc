use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use anyhow::anyhow;
use tempfile::NamedTempFile;

use edge_sentry::hal::{Humiture, Level, MemoryGpio, MemoryI2c, SyntheticHumiture};
use edge_sentry::sink::{AlertSink, DisplaySink, LogSink};
use edge_sentry::{
    Cadence, EnvironmentPins, EnvironmentSource, LoopController, LoopError, LoopState, Pipeline,
    SensorReading, Shared, ShutdownSignal, Sink, SinkSet, ThresholdProcessor, ThresholdVerdict,
    Thresholds,
};

const PINS: EnvironmentPins = EnvironmentPins {
    soil: 17,
    light: 27,
};
const BUZZER: u8 = 22;

/// Stands in for Ctrl-C arriving after `after` readings.
struct InterruptAfter {
    after: u64,
    seen: u64,
    signal: ShutdownSignal,
}

impl Sink<SensorReading, ThresholdVerdict> for InterruptAfter {
    fn name(&self) -> &'static str {
        "interrupt"
    }

    fn consume(&mut self, _r: &SensorReading, _v: &ThresholdVerdict) -> anyhow::Result<()> {
        self.seen += 1;
        if self.seen == self.after {
            self.signal.request();
        }
        Ok(())
    }
}

#[test]
fn interrupt_mid_loop_stops_cleanly_and_keeps_the_log() {
    let mut log_file = NamedTempFile::new().expect("temp log");
    writeln!(log_file, "2024-05-01 08:00:00,22,50,Wet,Good").expect("seed log");
    let log_path = log_file.path().to_path_buf();

    let shutdown = ShutdownSignal::new();
    let mut controller =
        LoopController::new(Cadence::Every(Duration::from_millis(10)), shutdown.clone());

    let mut acquired: Option<(Shared<MemoryGpio>, Shared<MemoryI2c>)> = None;
    let summary = controller
        .run(|session| {
            let gpio = session.acquire("gpio", || {
                Ok(MemoryGpio::new()
                    .with_input(PINS.soil, Level::Low)
                    .with_input(PINS.light, Level::High))
            })?;
            let humiture = session.acquire("humiture", || {
                Ok(SyntheticHumiture::scripted([
                    Some(Humiture {
                        temperature_c: 31.5,
                        humidity_pct: 55.0,
                    }),
                    None,
                ]))
            })?;
            let display = session.acquire("display", || Ok(MemoryI2c::new()))?;
            let log = LogSink::open(&log_path).map_err(|c| LoopError::acquisition("log", c))?;
            acquired = Some((gpio.clone(), display.clone()));

            let sinks = SinkSet::new()
                .with(log)
                .with(DisplaySink::new(display, 0x27))
                .with(AlertSink::new(gpio.clone(), BUZZER, Duration::from_millis(5)))
                .with(InterruptAfter {
                    after: 3,
                    seen: 0,
                    signal: shutdown.clone(),
                });
            Ok(Pipeline::new(
                EnvironmentSource::new(humiture, gpio, PINS),
                ThresholdProcessor::new(Thresholds::default()),
                sinks,
            ))
        })
        .expect("run loop");

    assert_eq!(summary.iterations, 3);
    assert_eq!(summary.sink_failures, 0);
    assert_eq!(controller.state(), LoopState::Stopped);

    let contents = std::fs::read_to_string(&log_path).expect("read log");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "2024-05-01 08:00:00,22,50,Wet,Good");
    assert!(lines[1].ends_with(",31.5,55,Dry,Good"), "{}", lines[1]);
    assert!(lines[2].ends_with(",N/A,N/A,Dry,Good"), "{}", lines[2]);
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 5);
    }

    let (gpio, display) = acquired.expect("handles were acquired");
    let gpio = gpio.borrow();
    // dry soil every iteration: three High/Low pulses
    let pulses: Vec<Level> = gpio.writes().iter().map(|(_, level)| *level).collect();
    assert_eq!(pulses.len(), 6);
    assert!(pulses
        .chunks(2)
        .all(|pair| pair == [Level::High, Level::Low]));
    assert!(gpio.is_released());
    assert_eq!(gpio.output(BUZZER), Some(Level::Low));
    assert!(display.borrow().is_released());
}

#[test]
fn failed_display_does_not_block_log_or_alert() {
    let log_file = NamedTempFile::new().expect("temp log");
    let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new())
        .with_max_iterations(Some(2));

    let mut gpio_handle = None;
    let summary = controller
        .run(|session| {
            let gpio = session.acquire("gpio", || {
                Ok(MemoryGpio::new()
                    .with_input(PINS.soil, Level::High)
                    .with_input(PINS.light, Level::Low))
            })?;
            let humiture = session.acquire("humiture", || Ok(SyntheticHumiture::seeded(7)))?;
            let display = session.acquire("display", || {
                let mut bus = MemoryI2c::new();
                bus.set_failing(true);
                Ok(bus)
            })?;
            gpio_handle = Some(gpio.clone());
            let log =
                LogSink::open(log_file.path()).map_err(|c| LoopError::acquisition("log", c))?;

            let sinks = SinkSet::new()
                .with(DisplaySink::new(display, 0x27))
                .with(log)
                .with(AlertSink::new(gpio.clone(), BUZZER, Duration::from_millis(1)));
            Ok(Pipeline::new(
                EnvironmentSource::new(humiture, gpio, PINS),
                ThresholdProcessor::new(Thresholds::default()),
                sinks,
            ))
        })
        .expect("run loop");

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.sink_failures, 2);
    let contents = std::fs::read_to_string(log_file.path()).expect("read log");
    assert_eq!(contents.lines().count(), 2);
    let gpio = gpio_handle.expect("gpio acquired");
    assert_eq!(gpio.borrow().writes().len(), 4);
}

#[test]
fn second_of_three_handles_failing_releases_the_first() {
    let mut controller = LoopController::new(Cadence::Immediate, ShutdownSignal::new());
    let gpio_handle: Rc<RefCell<Option<Shared<MemoryGpio>>>> = Rc::new(RefCell::new(None));
    let mut humiture_opened = false;

    let result = controller.run(|session| {
        let gpio = session.acquire("gpio", || Ok(MemoryGpio::new()))?;
        *gpio_handle.borrow_mut() = Some(gpio.clone());
        let display = session.acquire::<MemoryI2c, _>("display", || {
            Err(anyhow!("no device at 0x27"))
        })?;
        let humiture = session.acquire("humiture", || {
            humiture_opened = true;
            Ok(SyntheticHumiture::seeded(1))
        })?;
        let sinks = SinkSet::new().with(DisplaySink::new(display, 0x27));
        Ok(Pipeline::new(
            EnvironmentSource::new(humiture, gpio, PINS),
            ThresholdProcessor::new(Thresholds::default()),
            sinks,
        ))
    });

    match result {
        Err(LoopError::Acquisition { resource, .. }) => assert_eq!(resource, "display"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("loop should not start"),
    }
    assert!(!humiture_opened);
    assert_eq!(controller.state(), LoopState::Stopped);
    assert!(!controller
        .transitions()
        .iter()
        .any(|(_, to)| *to == LoopState::Running));

    let gpio = gpio_handle.borrow_mut().take().expect("gpio acquired");
    assert!(gpio.borrow().is_released());
}
