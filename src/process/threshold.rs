use std::collections::BTreeSet;

use super::Processor;
use crate::decision::{Reason, ThresholdVerdict};
use crate::error::LoopError;
use crate::observation::SensorReading;

/// Alert limits. Fixed for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// Celsius; anything strictly above alerts.
    pub temp_max: f32,
    /// Percent relative humidity; anything strictly below alerts.
    pub humidity_min: f32,
    pub soil_wet_required: bool,
    pub light_good_required: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_max: 30.0,
            humidity_min: 40.0,
            soil_wet_required: true,
            light_good_required: true,
        }
    }
}

/// Absent temperature or humidity never triggers its condition.
pub fn evaluate_thresholds(reading: &SensorReading, thresholds: &Thresholds) -> ThresholdVerdict {
    let mut reasons = BTreeSet::new();
    if reading.temperature.is_some_and(|t| t > thresholds.temp_max) {
        reasons.insert(Reason::HighTemp);
    }
    if reading.humidity.is_some_and(|h| h < thresholds.humidity_min) {
        reasons.insert(Reason::LowHumidity);
    }
    if thresholds.soil_wet_required && !reading.soil_wet {
        reasons.insert(Reason::DrySoil);
    }
    if thresholds.light_good_required && !reading.light_good {
        reasons.insert(Reason::LowLight);
    }
    ThresholdVerdict::from_reasons(reasons)
}

pub struct ThresholdProcessor {
    thresholds: Thresholds,
}

impl ThresholdProcessor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl Processor for ThresholdProcessor {
    type Input = SensorReading;
    type Output = ThresholdVerdict;

    fn evaluate(&mut self, reading: &SensorReading) -> Result<ThresholdVerdict, LoopError> {
        Ok(evaluate_thresholds(reading, &self.thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reading(
        temp: Option<f32>,
        hum: Option<f32>,
        soil_wet: bool,
        light_good: bool,
    ) -> SensorReading {
        SensorReading {
            temperature: temp,
            humidity: hum,
            soil_wet,
            light_good,
            soil_read_failed: false,
            light_read_failed: false,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn hot_dry_air_and_dry_soil() {
        let verdict = evaluate_thresholds(
            &reading(Some(32.0), Some(35.0), false, true),
            &Thresholds::default(),
        );
        assert!(verdict.exceeded);
        let expected: BTreeSet<_> = [Reason::HighTemp, Reason::LowHumidity, Reason::DrySoil]
            .into_iter()
            .collect();
        assert_eq!(verdict.reasons, expected);
    }

    #[test]
    fn absent_temperature_never_triggers() {
        let verdict = evaluate_thresholds(
            &reading(None, Some(50.0), true, true),
            &Thresholds::default(),
        );
        assert!(!verdict.exceeded);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn boundaries_are_strict() {
        let verdict = evaluate_thresholds(
            &reading(Some(30.0), Some(40.0), true, true),
            &Thresholds::default(),
        );
        assert!(!verdict.exceeded);
    }

    #[test]
    fn digital_conditions_can_be_disabled() {
        let thresholds = Thresholds {
            soil_wet_required: false,
            light_good_required: false,
            ..Thresholds::default()
        };
        let verdict = evaluate_thresholds(&reading(None, None, false, false), &thresholds);
        assert!(!verdict.exceeded);
    }

    #[test]
    fn low_light_alone_exceeds() {
        let mut processor = ThresholdProcessor::new(Thresholds::default());
        let verdict = processor
            .evaluate(&reading(Some(22.0), Some(55.0), true, false))
            .unwrap();
        assert_eq!(verdict.reasons.into_iter().collect::<Vec<_>>(), vec![Reason::LowLight]);
    }

    #[test]
    fn exceeded_iff_any_condition_holds() {
        let mut rng = StdRng::seed_from_u64(42);
        let thresholds = Thresholds::default();
        for _ in 0..1000 {
            let temp = rng.gen_bool(0.7).then(|| rng.gen_range(0.0..45.0f32));
            let hum = rng.gen_bool(0.7).then(|| rng.gen_range(10.0..90.0f32));
            let soil_wet = rng.gen_bool(0.5);
            let light_good = rng.gen_bool(0.5);

            let sample = reading(temp, hum, soil_wet, light_good);
            let verdict = evaluate_thresholds(&sample, &thresholds);

            let expected = temp.is_some_and(|t| t > thresholds.temp_max)
                || hum.is_some_and(|h| h < thresholds.humidity_min)
                || !soil_wet
                || !light_good;
            assert_eq!(verdict.exceeded, expected, "temp={temp:?} hum={hum:?}");
            assert_eq!(verdict.exceeded, !verdict.reasons.is_empty());
            if temp.is_none() {
                assert!(!verdict.reasons.contains(&Reason::HighTemp));
            }
            if hum.is_none() {
                assert!(!verdict.reasons.contains(&Reason::LowHumidity));
            }
        }
    }
}
