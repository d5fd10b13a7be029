//! Lock-free host parameter store.
//!
//! Every parameter is an independent atomic: the control side writes without
//! locking, the audio side reads a [`ParameterSnapshot`] without locking.
//! Cross-parameter consistency is not guaranteed. A single changed flag lets
//! the audio side notice that discrete settings (pattern, looping) need to be
//! re-applied.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::{stereo::HOST_PAN_RANGE, ConversionFormula, Result, ScanPattern, ScanlineError};

/// Inclusive range and default for a continuous parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamps into range; NaN maps to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

pub const SCAN_SPEED: ParamRange = ParamRange::new(0.1, 10.0, 1.0);
pub const AREA_SIZE: ParamRange = ParamRange::new(1.0, 50.0, 5.0);
pub const OUTPUT_GAIN: ParamRange = ParamRange::new(0.0, 2.0, 1.0);
pub const CHANNEL_WEIGHT: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
pub const PAN: ParamRange = ParamRange::new(-HOST_PAN_RANGE, HOST_PAN_RANGE, 0.0);

/// Host-visible parameter ids accepted by [`ParameterStore::set_by_name`].
pub const PARAMETER_IDS: [&str; 11] = [
    "scanSpeed",
    "areaSize",
    "outputGain",
    "leftWeight",
    "rightWeight",
    "redPan",
    "greenPan",
    "bluePan",
    "conversionFormula",
    "scanPattern",
    "looping",
];

/// Plain copy of every parameter at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterSnapshot {
    pub scan_speed: f32,
    pub area_size: u32,
    pub output_gain: f32,
    pub left_weight: f32,
    pub right_weight: f32,
    /// Host range [-100, 100].
    pub red_pan: f32,
    pub green_pan: f32,
    pub blue_pan: f32,
    pub conversion_formula: ConversionFormula,
    pub scan_pattern: ScanPattern,
    pub looping: bool,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            scan_speed: SCAN_SPEED.default,
            area_size: AREA_SIZE.default as u32,
            output_gain: OUTPUT_GAIN.default,
            left_weight: CHANNEL_WEIGHT.default,
            right_weight: CHANNEL_WEIGHT.default,
            red_pan: PAN.default,
            green_pan: PAN.default,
            blue_pan: PAN.default,
            conversion_formula: ConversionFormula::RgbAverage,
            scan_pattern: ScanPattern::Horizontal,
            looping: true,
        }
    }
}

impl ParameterSnapshot {
    /// Host pan values in colour order (red, green, blue).
    pub fn pans(&self) -> [f32; 3] {
        [self.red_pan, self.green_pan, self.blue_pan]
    }
}

/// `f32` stored as raw bits in an [`AtomicU32`].
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Shared parameter bag written by the host and read by the renderer.
#[derive(Debug)]
pub struct ParameterStore {
    scan_speed: AtomicF32,
    area_size: AtomicU32,
    output_gain: AtomicF32,
    left_weight: AtomicF32,
    right_weight: AtomicF32,
    red_pan: AtomicF32,
    green_pan: AtomicF32,
    blue_pan: AtomicF32,
    conversion_formula: AtomicU32,
    scan_pattern: AtomicU32,
    looping: AtomicBool,
    changed: AtomicBool,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::from_snapshot(&ParameterSnapshot::default())
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from initial values, clamping each one.
    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Self {
        let store = Self {
            scan_speed: AtomicF32::new(SCAN_SPEED.default),
            area_size: AtomicU32::new(AREA_SIZE.default as u32),
            output_gain: AtomicF32::new(OUTPUT_GAIN.default),
            left_weight: AtomicF32::new(CHANNEL_WEIGHT.default),
            right_weight: AtomicF32::new(CHANNEL_WEIGHT.default),
            red_pan: AtomicF32::new(PAN.default),
            green_pan: AtomicF32::new(PAN.default),
            blue_pan: AtomicF32::new(PAN.default),
            conversion_formula: AtomicU32::new(0),
            scan_pattern: AtomicU32::new(0),
            looping: AtomicBool::new(true),
            changed: AtomicBool::new(true),
        };
        store.apply_snapshot(snapshot);
        store
    }

    /// Writes every field of `snapshot` through the clamping setters.
    pub fn apply_snapshot(&self, snapshot: &ParameterSnapshot) {
        self.set_scan_speed(snapshot.scan_speed);
        self.set_area_size(snapshot.area_size);
        self.set_output_gain(snapshot.output_gain);
        self.set_left_weight(snapshot.left_weight);
        self.set_right_weight(snapshot.right_weight);
        self.set_red_pan(snapshot.red_pan);
        self.set_green_pan(snapshot.green_pan);
        self.set_blue_pan(snapshot.blue_pan);
        self.set_conversion_formula(snapshot.conversion_formula);
        self.set_scan_pattern(snapshot.scan_pattern);
        self.set_looping(snapshot.looping);
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            scan_speed: self.scan_speed(),
            area_size: self.area_size(),
            output_gain: self.output_gain(),
            left_weight: self.left_weight(),
            right_weight: self.right_weight(),
            red_pan: self.red_pan(),
            green_pan: self.green_pan(),
            blue_pan: self.blue_pan(),
            conversion_formula: self.conversion_formula(),
            scan_pattern: self.scan_pattern(),
            looping: self.looping(),
        }
    }

    /// Returns whether anything changed since the previous call and clears the flag.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Sets a parameter by host id. Choice parameters take their index.
    pub fn set_by_name(&self, id: &str, value: f32) -> Result<()> {
        match id {
            "scanSpeed" => self.set_scan_speed(value),
            "areaSize" => self.set_area_size(clamp_to_u32(value)),
            "outputGain" => self.set_output_gain(value),
            "leftWeight" => self.set_left_weight(value),
            "rightWeight" => self.set_right_weight(value),
            "redPan" => self.set_red_pan(value),
            "greenPan" => self.set_green_pan(value),
            "bluePan" => self.set_blue_pan(value),
            "conversionFormula" => {
                self.set_conversion_formula(ConversionFormula::from_index(clamp_to_u32(value)))
            }
            "scanPattern" => self.set_scan_pattern(ScanPattern::from_index(clamp_to_u32(value))),
            "looping" => self.set_looping(value >= 0.5),
            _ => return Err(ScanlineError::UnknownParameter(id.to_string())),
        }
        Ok(())
    }

    pub fn scan_speed(&self) -> f32 {
        self.scan_speed.load()
    }

    pub fn area_size(&self) -> u32 {
        self.area_size.load(Ordering::Relaxed)
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain.load()
    }

    pub fn left_weight(&self) -> f32 {
        self.left_weight.load()
    }

    pub fn right_weight(&self) -> f32 {
        self.right_weight.load()
    }

    pub fn red_pan(&self) -> f32 {
        self.red_pan.load()
    }

    pub fn green_pan(&self) -> f32 {
        self.green_pan.load()
    }

    pub fn blue_pan(&self) -> f32 {
        self.blue_pan.load()
    }

    pub fn conversion_formula(&self) -> ConversionFormula {
        ConversionFormula::from_index(self.conversion_formula.load(Ordering::Relaxed))
    }

    pub fn scan_pattern(&self) -> ScanPattern {
        ScanPattern::from_index(self.scan_pattern.load(Ordering::Relaxed))
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub fn set_scan_speed(&self, value: f32) {
        self.scan_speed.store(SCAN_SPEED.clamp(value));
        self.mark_changed();
    }

    pub fn set_area_size(&self, value: u32) {
        let value = value.clamp(AREA_SIZE.min as u32, AREA_SIZE.max as u32);
        self.area_size.store(value, Ordering::Relaxed);
        self.mark_changed();
    }

    pub fn set_output_gain(&self, value: f32) {
        self.output_gain.store(OUTPUT_GAIN.clamp(value));
        self.mark_changed();
    }

    pub fn set_left_weight(&self, value: f32) {
        self.left_weight.store(CHANNEL_WEIGHT.clamp(value));
        self.mark_changed();
    }

    pub fn set_right_weight(&self, value: f32) {
        self.right_weight.store(CHANNEL_WEIGHT.clamp(value));
        self.mark_changed();
    }

    pub fn set_red_pan(&self, value: f32) {
        self.red_pan.store(PAN.clamp(value));
        self.mark_changed();
    }

    pub fn set_green_pan(&self, value: f32) {
        self.green_pan.store(PAN.clamp(value));
        self.mark_changed();
    }

    pub fn set_blue_pan(&self, value: f32) {
        self.blue_pan.store(PAN.clamp(value));
        self.mark_changed();
    }

    pub fn set_conversion_formula(&self, formula: ConversionFormula) {
        self.conversion_formula
            .store(formula.index(), Ordering::Relaxed);
        self.mark_changed();
    }

    pub fn set_scan_pattern(&self, pattern: ScanPattern) {
        self.scan_pattern.store(pattern.index(), Ordering::Relaxed);
        self.mark_changed();
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
        self.mark_changed();
    }

    fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }
}

fn clamp_to_u32(value: f32) -> u32 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, u32::MAX as f32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn defaults_are_centred_and_unity() {
        let store = ParameterStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot, ParameterSnapshot::default());
        assert_eq!(snapshot.pans(), [0.0; 3]);
        assert_eq!(snapshot.output_gain, 1.0);
        assert_eq!(snapshot.area_size, 5);
    }

    #[test]
    fn setters_clamp_to_host_ranges() {
        let store = ParameterStore::new();
        store.set_red_pan(-150.0);
        store.set_green_pan(200.0);
        store.set_blue_pan(-33.3);
        store.set_scan_speed(0.0);
        store.set_area_size(500);
        store.set_output_gain(9.0);
        store.set_left_weight(-1.0);

        assert_eq!(store.red_pan(), -100.0);
        assert_eq!(store.green_pan(), 100.0);
        assert_eq!(store.blue_pan(), -33.3);
        assert_eq!(store.scan_speed(), 0.1);
        assert_eq!(store.area_size(), 50);
        assert_eq!(store.output_gain(), 2.0);
        assert_eq!(store.left_weight(), 0.0);
    }

    #[test]
    fn changed_flag_is_consumed_once() {
        let store = ParameterStore::new();
        assert!(store.take_changed());
        assert!(!store.take_changed());

        store.set_scan_pattern(ScanPattern::Spiral);
        assert!(store.take_changed());
        assert!(!store.take_changed());
    }

    #[test]
    fn set_by_name_resolves_host_ids() {
        let store = ParameterStore::new();
        store.set_by_name("redPan", -100.0).unwrap();
        store.set_by_name("conversionFormula", 1.0).unwrap();
        store.set_by_name("scanPattern", 99.0).unwrap();
        store.set_by_name("areaSize", 7.4).unwrap();
        store.set_by_name("looping", 0.0).unwrap();

        assert_eq!(store.red_pan(), -100.0);
        assert_eq!(store.conversion_formula(), ConversionFormula::WeightedRgb);
        assert_eq!(store.scan_pattern(), ScanPattern::Horizontal);
        assert_eq!(store.area_size(), 7);
        assert!(!store.looping());

        let err = store.set_by_name("scanX", 0.2).unwrap_err();
        assert!(matches!(err, ScanlineError::UnknownParameter(_)));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = ParameterSnapshot {
            red_pan: -40.0,
            scan_pattern: ScanPattern::Diagonal,
            ..ParameterSnapshot::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"redPan\""));
        let parsed: ParameterSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn concurrent_pan_reads_stay_in_range() {
        let store = Arc::new(ParameterStore::new());
        let deadline = Instant::now() + Duration::from_millis(100);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut value = -100.0f32;
                while Instant::now() < deadline {
                    store.set_red_pan(value);
                    store.set_green_pan(value + 50.0);
                    store.set_blue_pan(value + 100.0);
                    value += 1.0;
                    if value > 100.0 {
                        value = -100.0;
                    }
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut errors = 0usize;
                while Instant::now() < deadline {
                    for pan in store.snapshot().pans() {
                        if !(-100.0..=100.0).contains(&pan) {
                            errors += 1;
                        }
                    }
                }
                errors
            })
        };

        writer.join().unwrap();
        assert_eq!(reader.join().unwrap(), 0);
    }
}
