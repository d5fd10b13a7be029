use crate::{Channel, ConversionFormula, Rgb};

pub const MIN_GAIN: f32 = 0.0;
pub const MAX_GAIN: f32 = 2.0;

/// Maps sampled colour to audio amplitude under a persistent output gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synthesizer {
    gain: f32,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gain(gain: f32) -> Self {
        let mut synth = Self::default();
        synth.set_gain(gain);
        synth
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Stores the gain clamped to [0, 2]. NaN is ignored.
    pub fn set_gain(&mut self, gain: f32) {
        if gain.is_nan() {
            return;
        }
        self.gain = gain.clamp(MIN_GAIN, MAX_GAIN);
    }

    /// Converts a colour with the given formula, applies gain and clamps the
    /// result to [-1, 1].
    pub fn convert(&self, color: Rgb, formula: ConversionFormula) -> f32 {
        self.scale(formula.apply(color))
    }

    /// Per-channel amplitudes (red, green, blue), each with gain applied.
    pub fn convert_channels(&self, color: Rgb) -> [f32; 3] {
        Channel::ALL.map(|channel| self.scale(color.to_audio_channel(channel)))
    }

    fn scale(&self, value: f32) -> f32 {
        (value * self.gain).clamp(-1.0, 1.0)
    }
}
