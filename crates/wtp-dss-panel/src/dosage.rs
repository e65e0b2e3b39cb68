//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Bounded alum dosage slider model."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use wtp_dss_common::config::DosageConfig;

use crate::errors::{PanelError, Result};

/// Slider positions are snapped to this resolution to drop float noise.
const SNAP_RESOLUTION: f64 = 1e9;

/// Inclusive dosage bounds (mg/L) with a fixed slider step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DosageRange {
    min: f64,
    max: f64,
    step: f64,
}

impl DosageRange {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(PanelError::InvalidRange("bounds must be finite".into()));
        }
        if min >= max {
            return Err(PanelError::InvalidRange(format!(
                "min {min} must be lower than max {max}"
            )));
        }
        if step <= 0.0 || step > max - min {
            return Err(PanelError::InvalidRange(format!(
                "step {step} must be positive and no wider than the range"
            )));
        }
        Ok(Self { min, max, step })
    }

    pub fn from_config(config: &DosageConfig) -> Result<Self> {
        Self::new(config.min, config.max, config.step)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamp into range and snap to the nearest step counted from `min`.
    /// Non-finite input falls back to `min`.
    pub fn coerce(&self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return self.min;
        }
        let clamped = raw.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        let mut snapped = snap(self.min + steps * self.step);
        if snapped > self.max {
            snapped = snap(snapped - self.step);
        }
        snapped
    }

    /// Parse a slider value as reported by the control and coerce it.
    pub fn parse(&self, text: &str) -> Result<f64> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| PanelError::InvalidDosage(text.to_owned()))?;
        if !value.is_finite() {
            return Err(PanelError::InvalidDosage(text.to_owned()));
        }
        Ok(self.coerce(value))
    }

    /// Reject values outside the range without altering them.
    pub fn check(&self, value: f64) -> Result<f64> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(PanelError::DosageOutOfRange {
                value,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Every position the slider can take, in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = f64> + '_ {
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize;
        (0..=count).map(move |i| snap(self.min + i as f64 * self.step))
    }
}

fn snap(value: f64) -> f64 {
    (value * SNAP_RESOLUTION).round() / SNAP_RESOLUTION
}

/// Slider-style control holding the operator's proposed dosage.
#[derive(Debug, Clone, PartialEq)]
pub struct DosageSlider {
    range: DosageRange,
    value: f64,
}

impl DosageSlider {
    pub fn new(range: DosageRange, initial: f64) -> Self {
        Self {
            range,
            value: range.coerce(initial),
        }
    }

    pub fn from_config(config: &DosageConfig) -> Result<Self> {
        Ok(Self::new(DosageRange::from_config(config)?, config.default))
    }

    pub fn range(&self) -> DosageRange {
        self.range
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_raw(&mut self, raw: f64) -> f64 {
        self.value = self.range.coerce(raw);
        self.value
    }

    /// Accepts the textual value emitted by range inputs; the previous value
    /// is kept when the text is not a number.
    pub fn set_text(&mut self, text: &str) -> Result<f64> {
        self.value = self.range.parse(text)?;
        Ok(self.value)
    }

    pub fn increment(&mut self) -> f64 {
        self.set_raw(self.value + self.range.step)
    }

    pub fn decrement(&mut self) -> f64 {
        self.set_raw(self.value - self.range.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant_range() -> DosageRange {
        DosageRange::new(5.0, 20.0, 0.5).unwrap()
    }

    #[test]
    fn every_position_is_a_valid_submission() {
        for range in [plant_range(), DosageRange::new(8.0, 16.0, 0.5).unwrap()] {
            let positions: Vec<f64> = range.positions().collect();
            assert_eq!(positions.first(), Some(&range.min()));
            assert_eq!(positions.last(), Some(&range.max()));
            for value in positions {
                assert!(value.is_finite());
                assert!(range.check(value).is_ok(), "{value} rejected");
                assert_eq!(range.coerce(value), value);
            }
        }
    }

    #[test]
    fn positions_count_matches_step() {
        assert_eq!(plant_range().positions().count(), 31);
        let fine = DosageRange::new(0.0, 1.0, 0.1).unwrap();
        let positions: Vec<f64> = fine.positions().collect();
        assert_eq!(positions.len(), 11);
        assert_eq!(positions[3], 0.3);
    }

    #[test]
    fn coerce_clamps_and_snaps() {
        let range = plant_range();
        assert_eq!(range.coerce(12.3), 12.5);
        assert_eq!(range.coerce(12.2), 12.0);
        assert_eq!(range.coerce(-4.0), 5.0);
        assert_eq!(range.coerce(100.0), 20.0);
        assert_eq!(range.coerce(f64::NAN), 5.0);
        assert_eq!(range.coerce(f64::INFINITY), 5.0);
    }

    #[test]
    fn coerce_never_exceeds_max_with_uneven_step() {
        let range = DosageRange::new(5.0, 6.0, 0.4).unwrap();
        assert_eq!(range.coerce(6.0), 5.8);
        assert_eq!(range.positions().last(), Some(5.8));
    }

    #[test]
    fn parse_accepts_slider_text() {
        let range = plant_range();
        assert_eq!(range.parse("14").unwrap(), 14.0);
        assert_eq!(range.parse(" 14.0 ").unwrap(), 14.0);
        assert_eq!(range.parse("25").unwrap(), 20.0);
        assert!(matches!(
            range.parse("alum"),
            Err(PanelError::InvalidDosage(_))
        ));
        assert!(matches!(range.parse("NaN"), Err(PanelError::InvalidDosage(_))));
    }

    #[test]
    fn check_reports_bounds() {
        let err = plant_range().check(21.0).unwrap_err();
        assert!(matches!(
            err,
            PanelError::DosageOutOfRange { min, max, .. } if min == 5.0 && max == 20.0
        ));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(DosageRange::new(20.0, 5.0, 0.5).is_err());
        assert!(DosageRange::new(5.0, 20.0, 0.0).is_err());
        assert!(DosageRange::new(5.0, 6.0, 2.0).is_err());
        assert!(DosageRange::new(f64::NAN, 6.0, 0.5).is_err());
    }

    #[test]
    fn slider_steps_within_bounds() {
        let mut slider = DosageSlider::new(plant_range(), 19.5);
        assert_eq!(slider.increment(), 20.0);
        assert_eq!(slider.increment(), 20.0);
        slider.set_raw(5.2);
        assert_eq!(slider.value(), 5.0);
        assert_eq!(slider.decrement(), 5.0);
        assert!(slider.set_text("oops").is_err());
        assert_eq!(slider.value(), 5.0);
        assert_eq!(slider.set_text("14.0").unwrap(), 14.0);
    }

    #[test]
    fn slider_defaults_from_config() {
        let slider = DosageSlider::from_config(&DosageConfig::default()).unwrap();
        assert_eq!(slider.value(), 12.5);
        assert_eq!(slider.range(), plant_range());
    }
}
