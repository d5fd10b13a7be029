//! Core library for the Scanline image sonifier.
//!
//! An image is traced one position per audio sample. The colour under the
//! scan head is averaged, converted to amplitude and placed in the stereo
//! field with one pan position per colour channel. Each module owns one stage
//! of that pipeline; [`AudioEngine`] and [`Renderer`] wire them together for
//! a control thread and a real-time audio callback respectively.

pub mod audio;
pub mod color;
pub mod config;
pub mod error;
pub mod params;
pub mod pixels;
pub mod scan;
pub mod state;
pub mod stereo;
pub mod synth;

pub use audio::{AudioEngine, Renderer};
pub use color::{Channel, ConversionFormula, Rgb};
pub use config::{AppConfig, AudioConfig, ChannelMode, ImageConfig};
pub use error::{Result, ScanlineError};
pub use params::{ParameterSnapshot, ParameterStore};
pub use pixels::{CodecDecoder, DecodedImage, Dimensions, ImageDecoder, PixelBuffer};
pub use scan::{Position, ScanPattern, ScanState, Scanner};
pub use state::{SessionState, STATE_VERSION};
pub use stereo::{normalize_pan, StereoFrame, StereoPanner};
pub use synth::Synthesizer;
