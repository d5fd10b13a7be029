//! Decode-once, sample-many access to image colour data.
//!
//! A [`PixelBuffer`] is either empty or holds a fully validated image; a load
//! never leaves it half-populated. Sampling outside the image, or on an empty
//! buffer, yields black rather than an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{config::ImageConfig, Channel, Rgb, Result, ScanlineError};

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Raw output of an image codec: row-major RGB pixels.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgb>,
}

/// Seam between the loader and the image codec.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage>;
}

/// Production decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodecDecoder;

impl ImageDecoder for CodecDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let decoded = image::open(path).map_err(|err| ScanlineError::Decode(err.to_string()))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .into_raw()
            .chunks_exact(3)
            .map(|px| Rgb::new(px[0], px[1], px[2]))
            .collect();

        Ok(DecodedImage {
            width,
            height,
            pixels,
        })
    }
}

/// Immutable-once-loaded RGB pixel grid.
#[derive(Debug, Default, Clone)]
pub struct PixelBuffer {
    pixels: Vec<Rgb>,
    dimensions: Dimensions,
    path: Option<PathBuf>,
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already decoded pixel grid without applying load limits.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgb>) -> Result<Self> {
        let dimensions = Dimensions::new(width, height);
        if !dimensions.is_valid() {
            return Err(invalid_dimensions(dimensions, "image is empty"));
        }
        if pixels.len() as u64 != dimensions.area() {
            return Err(ScanlineError::Decode(format!(
                "expected {} pixels for a {width}x{height} image, got {}",
                dimensions.area(),
                pixels.len()
            )));
        }

        Ok(Self {
            pixels,
            dimensions,
            path: None,
        })
    }

    /// Loads and validates an image file, replacing the current contents.
    ///
    /// The buffer is unloaded before any validation runs, so on failure it is
    /// left empty regardless of what it held before.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        limits: &ImageConfig,
        decoder: &dyn ImageDecoder,
    ) -> Result<Dimensions> {
        self.unload();
        let path = path.as_ref();

        if !path.is_file() {
            return Err(ScanlineError::FileNotFound(path.to_path_buf()));
        }

        let size = std::fs::metadata(path)?.len();
        if size > limits.max_file_bytes {
            return Err(ScanlineError::FileTooLarge {
                size,
                limit: limits.max_file_bytes,
            });
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !limits.accepts_extension(extension) {
            return Err(ScanlineError::UnsupportedFormat {
                extension: extension.to_string(),
                allowed: limits.extensions.join(", "),
            });
        }

        let decoded = decoder.decode(path)?;
        let dimensions = Dimensions::new(decoded.width, decoded.height);
        validate_dimensions(dimensions, limits)?;

        let mut loaded = Self::from_pixels(decoded.width, decoded.height, decoded.pixels)?;
        loaded.path = Some(path.to_path_buf());
        *self = loaded;

        Ok(dimensions)
    }

    /// Drops the pixel data. Idempotent.
    pub fn unload(&mut self) {
        *self = Self::default();
    }

    pub fn is_loaded(&self) -> bool {
        self.dimensions.is_valid()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true when `(x, y)` lies in `[0, width) x [0, height)`.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.is_loaded()
            && x >= 0.0
            && y >= 0.0
            && x < self.dimensions.width as f32
            && y < self.dimensions.height as f32
    }

    /// Bilinearly interpolated colour at a sub-pixel position.
    pub fn sample(&self, x: f32, y: f32) -> Rgb {
        if !self.contains(x, y) {
            return Rgb::BLACK;
        }

        let last_x = self.dimensions.width as usize - 1;
        let last_y = self.dimensions.height as usize - 1;
        let x0 = (x.floor() as usize).min(last_x);
        let y0 = (y.floor() as usize).min(last_y);
        let x1 = (x0 + 1).min(last_x);
        let y1 = (y0 + 1).min(last_y);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let (Some(top_left), Some(top_right), Some(bottom_left), Some(bottom_right)) = (
            self.pixel(x0, y0),
            self.pixel(x1, y0),
            self.pixel(x0, y1),
            self.pixel(x1, y1),
        ) else {
            return Rgb::BLACK;
        };

        let blend = |channel: Channel| {
            let top = lerp(top_left.channel(channel), top_right.channel(channel), fx);
            let bottom = lerp(bottom_left.channel(channel), bottom_right.channel(channel), fx);
            let value = top + (bottom - top) * fy;
            value.round().clamp(0.0, 255.0) as u8
        };

        Rgb::new(blend(Channel::Red), blend(Channel::Green), blend(Channel::Blue))
    }

    /// Mean colour over a square window centred on `(x, y)`.
    ///
    /// Even radii are bumped to the next odd value. Cells outside the image are
    /// skipped rather than counted as black; an entirely outside window yields
    /// black. Channel means truncate.
    pub fn area_average(&self, x: f32, y: f32, radius: u32) -> Rgb {
        let radius = if radius % 2 == 0 { radius + 1 } else { radius };
        let half = (radius / 2) as i64;

        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for dy in -half..=half {
            for dx in -half..=half {
                let sx = x + dx as f32;
                let sy = y + dy as f32;
                if !self.contains(sx, sy) {
                    continue;
                }

                let color = self.sample(sx, sy);
                sums[0] += u64::from(color.red);
                sums[1] += u64::from(color.green);
                sums[2] += u64::from(color.blue);
                count += 1;
            }
        }

        if count == 0 {
            return Rgb::BLACK;
        }

        Rgb::new(
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
        )
    }

    /// Mean colour of the whole image (truncating), black when empty.
    pub fn mean_color(&self) -> Rgb {
        if self.pixels.is_empty() {
            return Rgb::BLACK;
        }

        let count = self.pixels.len() as u64;
        let sums = self.pixels.iter().fold([0u64; 3], |mut acc, px| {
            acc[0] += u64::from(px.red);
            acc[1] += u64::from(px.green);
            acc[2] += u64::from(px.blue);
            acc
        });

        Rgb::new(
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
        )
    }

    fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        let width = self.dimensions.width as usize;
        if x >= width {
            return None;
        }
        self.pixels.get(y * width + x).copied()
    }
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    let a = f32::from(a);
    a + (f32::from(b) - a) * t
}

fn validate_dimensions(dimensions: Dimensions, limits: &ImageConfig) -> Result<()> {
    if !dimensions.is_valid() {
        return Err(invalid_dimensions(dimensions, "image is empty"));
    }
    if dimensions.width >= limits.max_dimension || dimensions.height >= limits.max_dimension {
        return Err(invalid_dimensions(
            dimensions,
            &format!("width and height must be below {}", limits.max_dimension),
        ));
    }
    if dimensions.width < limits.min_dimension || dimensions.height < limits.min_dimension {
        return Err(invalid_dimensions(
            dimensions,
            &format!("width and height must be at least {}", limits.min_dimension),
        ));
    }
    Ok(())
}

fn invalid_dimensions(dimensions: Dimensions, reason: &str) -> ScanlineError {
    ScanlineError::InvalidDimensions {
        width: dimensions.width,
        height: dimensions.height,
        reason: reason.to_string(),
    }
}
