use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use scanline_core::{AppConfig, AudioEngine, Renderer, Result, ScanlineError};
use tracing::{info, warn};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);
const SCRATCH_SAMPLES: usize = 8192;

/// Plays `image` through the default output device for `duration`.
pub fn run(config: AppConfig, image: &Path, duration: Duration) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ScanlineError::msg("no default output device found"))?;
    let supported = device
        .default_output_config()
        .map_err(|err| ScanlineError::msg(format!("failed to query output config: {err}")))?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    let mut engine = AudioEngine::new(config);
    engine.load_image(image)?;
    engine.prepare(stream_config.sample_rate.0, engine.config().audio.block_size);

    let renderer = engine.renderer();
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, renderer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, renderer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, renderer)?,
        other => {
            return Err(ScanlineError::msg(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };
    stream
        .play()
        .map_err(|err| ScanlineError::msg(format!("failed to start output stream: {err}")))?;

    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate = stream_config.sample_rate.0,
        channels = stream_config.channels,
        "playback started"
    );

    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(REPORT_INTERVAL.min(deadline - now));

        let position = engine.scan_position();
        info!(
            x = position.x,
            y = position.y,
            state = ?engine.scan_state(),
            "scanning"
        );
    }

    engine.release();
    drop(stream);
    info!("playback finished");
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let mut scratch = vec![0.0f32; SCRATCH_SAMPLES];
    let err_fn = |err: cpal::StreamError| warn!(error = %err, "audio stream error");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_from_renderer(&mut renderer, &mut scratch, data, channels);
            },
            err_fn,
            None,
        )
        .map_err(|err| ScanlineError::msg(format!("failed to build output stream: {err}")))
}

/// Renders `data` through `scratch` in whole-frame chunks so the audio
/// callback never allocates.
fn fill_from_renderer<T>(
    renderer: &mut Renderer,
    scratch: &mut [f32],
    data: &mut [T],
    channels: usize,
) where
    T: Sample + FromSample<f32>,
{
    let channels = channels.max(1);
    let chunk = scratch.len() / channels * channels;
    if chunk == 0 {
        data.fill(T::EQUILIBRIUM);
        return;
    }

    for out in data.chunks_mut(chunk) {
        let block = &mut scratch[..out.len()];
        renderer.process_interleaved(block, channels);
        for (sample, value) in out.iter_mut().zip(block.iter()) {
            *sample = T::from_sample(*value);
        }
    }
}
