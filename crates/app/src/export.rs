use std::path::Path;
use std::time::Duration;

use scanline_core::{AppConfig, AudioEngine, Result, ScanlineError};
use tracing::info;

/// Renders `image` offline into a 32-bit float WAV at `output`.
pub fn run(config: AppConfig, image: &Path, output: &Path, duration: Duration) -> Result<()> {
    let mut engine = AudioEngine::new(config);
    engine.load_image(image)?;

    let frames = render_wav(&engine, output, duration)?;
    info!(?output, frames, "render finished");
    Ok(())
}

/// Writes `duration` of audio from `engine` using its configured stream
/// format. Returns the number of frames written.
pub fn render_wav(engine: &AudioEngine, output: &Path, duration: Duration) -> Result<u64> {
    let audio = &engine.config().audio;
    let channels = audio.channels.max(1);
    let block_size = audio.block_size.max(1);
    let sample_rate = audio.sample_rate;

    engine.prepare(sample_rate, block_size);
    let mut renderer = engine.renderer();

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec).map_err(wav_error)?;

    let total_frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as u64;
    let channels = usize::from(channels);
    let mut buffer = vec![0.0f32; block_size * channels];
    let mut written = 0u64;

    while written < total_frames {
        let frames = (total_frames - written).min(block_size as u64) as usize;
        let block = &mut buffer[..frames * channels];
        renderer.process_interleaved(block, channels);
        for sample in block.iter() {
            writer.write_sample(*sample).map_err(wav_error)?;
        }
        written += frames as u64;
    }

    writer.finalize().map_err(wav_error)?;
    engine.release();
    Ok(written)
}

fn wav_error(err: hound::Error) -> ScanlineError {
    ScanlineError::msg(format!("failed to write wav: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("scanline-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn writes_float_wav_with_requested_length() {
        let image_path = temp_path("stripes.png");
        let img = image::RgbImage::from_fn(8, 4, |x, _| {
            if x % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        img.save(&image_path).unwrap();

        let mut config = AppConfig::default();
        config.audio.sample_rate = 8_000;
        config.audio.block_size = 100;
        config.parameters.area_size = 1;
        let mut engine = AudioEngine::new(config);
        engine.load_image(&image_path).unwrap();

        let output = temp_path("stripes.wav");
        let frames = render_wav(&engine, &output, Duration::from_millis(250)).unwrap();
        assert_eq!(frames, 2_000);
        assert!(!engine.is_active());

        let mut reader = hound::WavReader::open(&output).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.duration(), 2_000);

        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4_000);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|s| *s > 0.5));
        assert!(samples.iter().any(|s| *s < -0.5));
    }

    #[test]
    fn unloaded_engine_writes_silence() {
        let engine = AudioEngine::new(AppConfig::default());
        let output = temp_path("silence.wav");
        let frames = render_wav(&engine, &output, Duration::from_millis(10)).unwrap();
        assert_eq!(frames, 480);

        let mut reader = hound::WavReader::open(&output).unwrap();
        assert!(reader.samples::<f32>().all(|s| s.unwrap() == 0.0));
    }
}
