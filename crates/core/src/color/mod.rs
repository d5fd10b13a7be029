use serde::{Deserialize, Serialize};

/// 8-bit RGB colour sampled from an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Colour channel selector used by the per-channel conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn channel(self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    /// Mean of the three channels mapped to [-1, 1].
    pub fn to_audio_simple(self) -> f32 {
        let sum = f32::from(self.red) + f32::from(self.green) + f32::from(self.blue);
        to_bipolar(sum / (3.0 * 255.0))
    }

    /// BT.709 luma mapped to [-1, 1].
    pub fn to_audio_weighted(self) -> f32 {
        let luma = 0.2126 * f32::from(self.red)
            + 0.7152 * f32::from(self.green)
            + 0.0722 * f32::from(self.blue);
        to_bipolar(luma / 255.0)
    }

    /// A single channel mapped to [-1, 1].
    pub fn to_audio_channel(self, channel: Channel) -> f32 {
        to_bipolar(f32::from(self.channel(channel)) / 255.0)
    }

    pub fn max_channel(self) -> u8 {
        self.red.max(self.green).max(self.blue)
    }

    pub fn min_channel(self) -> u8 {
        self.red.min(self.green).min(self.blue)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self::new(red, green, blue)
    }
}

/// Maps a unit value in [0, 1] onto the bipolar audio range, clamped.
fn to_bipolar(unit: f32) -> f32 {
    (unit * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Colour-to-amplitude formula selectable by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFormula {
    #[default]
    RgbAverage,
    WeightedRgb,
    RedChannel,
    GreenChannel,
    BlueChannel,
    MaxChannel,
    MinChannel,
}

impl ConversionFormula {
    pub const ALL: [ConversionFormula; 7] = [
        ConversionFormula::RgbAverage,
        ConversionFormula::WeightedRgb,
        ConversionFormula::RedChannel,
        ConversionFormula::GreenChannel,
        ConversionFormula::BlueChannel,
        ConversionFormula::MaxChannel,
        ConversionFormula::MinChannel,
    ];

    /// Resolves a host choice index. Unknown indices fall back to
    /// [`ConversionFormula::RgbAverage`].
    pub fn from_index(index: u32) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RgbAverage => "RGB Average",
            Self::WeightedRgb => "Weighted RGB",
            Self::RedChannel => "Red Channel",
            Self::GreenChannel => "Green Channel",
            Self::BlueChannel => "Blue Channel",
            Self::MaxChannel => "Max Channel",
            Self::MinChannel => "Min Channel",
        }
    }

    /// Evaluates the formula without any gain applied.
    pub fn apply(self, color: Rgb) -> f32 {
        match self {
            Self::RgbAverage => color.to_audio_simple(),
            Self::WeightedRgb => color.to_audio_weighted(),
            Self::RedChannel => color.to_audio_channel(Channel::Red),
            Self::GreenChannel => color.to_audio_channel(Channel::Green),
            Self::BlueChannel => color.to_audio_channel(Channel::Blue),
            Self::MaxChannel => to_bipolar(f32::from(color.max_channel()) / 255.0),
            Self::MinChannel => to_bipolar(f32::from(color.min_channel()) / 255.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn black_and_white_hit_the_rails() {
        assert_eq!(Rgb::BLACK.to_audio_simple(), -1.0);
        assert!((Rgb::WHITE.to_audio_simple() - 1.0).abs() < 0.01);
        assert!((Rgb::WHITE.to_audio_weighted() - 1.0).abs() < 0.01);
        assert!((Rgb::BLACK.to_audio_weighted() + 1.0).abs() < 0.01);
    }

    #[test]
    fn per_channel_extraction_isolates_channels() {
        let red = Rgb::new(255, 0, 0);
        let green = Rgb::new(0, 255, 0);
        assert!(red.to_audio_channel(Channel::Red) > green.to_audio_channel(Channel::Red));
        assert!(green.to_audio_channel(Channel::Green) > red.to_audio_channel(Channel::Green));

        let pixel = Rgb::new(255, 128, 64);
        let amps: Vec<f32> = Channel::ALL
            .iter()
            .map(|c| pixel.to_audio_channel(*c))
            .collect();
        assert!(amps[0] != amps[1] && amps[1] != amps[2] && amps[0] != amps[2]);
    }

    #[test]
    fn max_and_min_formulas_pick_extremes() {
        let color = Rgb::new(10, 200, 60);
        let max = ConversionFormula::MaxChannel.apply(color);
        let min = ConversionFormula::MinChannel.apply(color);
        assert!((max - color.to_audio_channel(Channel::Green)).abs() < 1e-6);
        assert!((min - color.to_audio_channel(Channel::Red)).abs() < 1e-6);
    }

    #[test]
    fn unknown_formula_index_falls_back_to_average() {
        assert_eq!(ConversionFormula::from_index(3), ConversionFormula::GreenChannel);
        assert_eq!(ConversionFormula::from_index(42), ConversionFormula::RgbAverage);
        for formula in ConversionFormula::ALL {
            assert_eq!(ConversionFormula::from_index(formula.index()), formula);
        }
    }

    proptest! {
        #[test]
        fn every_formula_stays_in_audio_range(
            r in any::<u8>(),
            g in any::<u8>(),
            b in any::<u8>(),
        ) {
            let color = Rgb::new(r, g, b);
            for formula in ConversionFormula::ALL {
                let value = formula.apply(color);
                prop_assert!((-1.0..=1.0).contains(&value));
            }
        }
    }
}
