//! Constant-power stereo placement of the three colour voices.

use std::f32::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

/// Host-facing pan values span [-100, 100].
pub const HOST_PAN_RANGE: f32 = 100.0;

/// One left/right output pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame::new(0.0, 0.0);

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Both channels clamped to [-1, 1].
    pub fn clamped(self) -> Self {
        Self::new(self.left.clamp(-1.0, 1.0), self.right.clamp(-1.0, 1.0))
    }

    pub fn mid(self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

impl std::ops::Add for StereoFrame {
    type Output = StereoFrame;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

/// Normalises a host pan value in [-100, 100] to [-1, 1].
pub fn normalize_pan(host_value: f32) -> f32 {
    if host_value.is_nan() {
        return 0.0;
    }
    (host_value / HOST_PAN_RANGE).clamp(-1.0, 1.0)
}

/// Sine/cosine panner: `left² + right² == sample²` at every position.
#[derive(Debug, Default, Clone, Copy)]
pub struct StereoPanner;

impl StereoPanner {
    pub fn new() -> Self {
        Self
    }

    /// Places a mono sample at `position` (-1 hard left, +1 hard right).
    /// Positions outside [-1, 1] are clamped first.
    pub fn pan(&self, sample: f32, position: f32) -> StereoFrame {
        let position = if position.is_nan() { 0.0 } else { position.clamp(-1.0, 1.0) };
        let angle = (position + 1.0) * FRAC_PI_4;
        let (right_gain, left_gain) = angle.sin_cos();
        StereoFrame::new(sample * left_gain, sample * right_gain)
    }

    /// Pans red, green and blue independently and sums them. The mix is
    /// clamped to [-1, 1], trading exact energy preservation for no overshoot.
    pub fn pan_rgb(&self, samples: [f32; 3], positions: [f32; 3]) -> StereoFrame {
        samples
            .iter()
            .zip(positions)
            .map(|(sample, position)| self.pan(*sample, position))
            .fold(StereoFrame::SILENCE, |mix, frame| mix + frame)
            .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTRE_GAIN: f32 = 0.707_106_78;

    #[test]
    fn hard_left_and_hard_right() {
        let panner = StereoPanner::new();

        let left = panner.pan(0.8, -1.0);
        assert!((left.left - 0.8).abs() < 1e-6);
        assert!(left.right.abs() < 1e-6);

        let right = panner.pan(0.8, 1.0);
        assert!(right.left.abs() < 1e-6);
        assert!((right.right - 0.8).abs() < 1e-6);
    }

    #[test]
    fn centre_is_equal_power_not_half_amplitude() {
        let frame = StereoPanner::new().pan(1.0, 0.0);
        assert!((frame.left - CENTRE_GAIN).abs() < 1e-5);
        assert!((frame.right - CENTRE_GAIN).abs() < 1e-5);
    }

    #[test]
    fn energy_is_conserved_across_the_field() {
        let panner = StereoPanner::new();
        for input in [-1.0f32, -0.3, 0.5, 1.0] {
            for step in 0..=20 {
                let position = -1.0 + step as f32 * 0.1;
                let frame = panner.pan(input, position);
                let energy = frame.left * frame.left + frame.right * frame.right;
                assert!((energy - input * input).abs() < 0.001, "{input} @ {position}");
            }
        }
    }

    #[test]
    fn out_of_range_positions_clamp() {
        let panner = StereoPanner::new();
        assert_eq!(panner.pan(0.5, -2.0), panner.pan(0.5, -1.0));
        assert_eq!(panner.pan(0.5, 2.0), panner.pan(0.5, 1.0));
        assert_eq!(panner.pan(0.5, f32::NAN), panner.pan(0.5, 0.0));
    }

    #[test]
    fn rgb_mix_separates_voices_by_position() {
        let panner = StereoPanner::new();
        let frame = panner.pan_rgb([0.6, 0.0, 0.0], [-1.0, 0.0, 1.0]);
        assert!((frame.left - 0.6).abs() < 1e-6);
        assert!(frame.right.abs() < 1e-6);

        let frame = panner.pan_rgb([1.0, 0.004, -0.5], [-1.0, 0.0, 1.0]);
        assert!(frame.left != frame.right);
    }

    #[test]
    fn rgb_mix_is_clamped() {
        let frame = StereoPanner::new().pan_rgb([1.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        assert_eq!(frame, StereoFrame::new(1.0, 1.0));

        let frame = StereoPanner::new().pan_rgb([-1.0, -1.0, -1.0], [-1.0, -1.0, -1.0]);
        assert_eq!(frame.left, -1.0);
    }

    #[test]
    fn host_pan_values_normalise() {
        assert_eq!(normalize_pan(-100.0), -1.0);
        assert_eq!(normalize_pan(50.0), 0.5);
        assert_eq!(normalize_pan(250.0), 1.0);
        assert_eq!(normalize_pan(f32::NAN), 0.0);
    }
}
