//! Control-side engine and real-time renderer.
//!
//! [`AudioEngine`] lives on the control thread: it loads images, exposes the
//! parameter store and persists sessions. [`Renderer`] is handed to the audio
//! callback. The two share the image and scanner behind a mutex that the
//! renderer only ever `try_lock`s, so a slow decode produces silence instead
//! of a dropout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::{debug, info, warn};

use crate::{
    normalize_pan, AppConfig, ChannelMode, CodecDecoder, Dimensions, ImageDecoder, ParameterStore,
    PixelBuffer, Position, Result, ScanState, Scanner, SessionState, StereoFrame, StereoPanner,
    Synthesizer,
};

/// Image and scan state, always mutated together.
#[derive(Debug, Default)]
struct Voice {
    image: PixelBuffer,
    scanner: Scanner,
}

#[derive(Debug)]
struct Shared {
    voice: Mutex<Voice>,
    params: ParameterStore,
    active: AtomicBool,
    sample_rate: AtomicU32,
    block_size: AtomicUsize,
}

/// Control-side façade over the image-to-audio pipeline.
pub struct AudioEngine {
    config: AppConfig,
    decoder: Box<dyn ImageDecoder>,
    shared: Arc<Shared>,
    last_error: Option<String>,
    auto_load: bool,
}

impl AudioEngine {
    /// Creates an engine that decodes images with the `image` crate.
    pub fn new(config: AppConfig) -> Self {
        Self::with_decoder(config, CodecDecoder)
    }

    /// Creates an engine with a custom image decoder.
    pub fn with_decoder(config: AppConfig, decoder: impl ImageDecoder + 'static) -> Self {
        let params = ParameterStore::from_snapshot(&config.parameters);
        let mut scanner = Scanner::new();
        scanner.set_pattern(params.scan_pattern());
        scanner.set_looping(params.looping());

        let shared = Shared {
            voice: Mutex::new(Voice {
                image: PixelBuffer::new(),
                scanner,
            }),
            params,
            active: AtomicBool::new(false),
            sample_rate: AtomicU32::new(config.audio.sample_rate),
            block_size: AtomicUsize::new(config.audio.block_size),
        };

        Self {
            config,
            decoder: Box::new(decoder),
            shared: Arc::new(shared),
            last_error: None,
            auto_load: true,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Host parameters. Writes are picked up by the renderer on its next buffer.
    pub fn params(&self) -> &ParameterStore {
        &self.shared.params
    }

    /// Loads and validates an image, then rewinds the scanner onto it.
    ///
    /// The previous image is dropped before validation starts. On failure the
    /// engine stays unloaded and the error message is kept for [`last_error`].
    ///
    /// [`last_error`]: AudioEngine::last_error
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<Dimensions> {
        let path = path.as_ref();
        {
            let mut voice = self.lock_voice();
            voice.image.unload();
            voice.scanner.clear();
        }

        // Decode without holding the lock; the renderer sees an unloaded voice meanwhile.
        let mut image = PixelBuffer::new();
        let loaded = image.load(path, &self.config.image, self.decoder.as_ref());

        match loaded {
            Ok(dimensions) => {
                {
                    let mut voice = self.lock_voice();
                    voice.image = image;
                    voice.scanner.set_pattern(self.shared.params.scan_pattern());
                    voice.scanner.set_looping(self.shared.params.looping());
                    voice
                        .scanner
                        .initialize(dimensions.width, dimensions.height);
                }
                self.last_error = None;
                info!(
                    path = %path.display(),
                    width = dimensions.width,
                    height = dimensions.height,
                    "image loaded"
                );
                Ok(dimensions)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image rejected");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Drops the current image. Idempotent.
    pub fn unload_image(&mut self) {
        let mut voice = self.lock_voice();
        voice.image.unload();
        voice.scanner.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_voice().image.is_loaded()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.lock_voice().image.dimensions()
    }

    pub fn image_path(&self) -> Option<PathBuf> {
        self.lock_voice().image.path().map(Path::to_path_buf)
    }

    /// Message of the most recent failed load, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Mean colour of the loaded image, black when nothing is loaded.
    pub fn mean_color(&self) -> crate::Rgb {
        self.lock_voice().image.mean_color()
    }

    pub fn scan_position(&self) -> Position {
        self.lock_voice().scanner.position()
    }

    pub fn scan_state(&self) -> ScanState {
        self.lock_voice().scanner.state()
    }

    pub fn auto_load(&self) -> bool {
        self.auto_load
    }

    pub fn set_auto_load(&mut self, auto_load: bool) {
        self.auto_load = auto_load;
    }

    /// Activates rendering at the given stream format.
    pub fn prepare(&self, sample_rate: u32, block_size: usize) {
        let sample_rate = if sample_rate == 0 {
            self.config.audio.sample_rate
        } else {
            sample_rate
        };
        self.shared.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.shared.block_size.store(block_size, Ordering::Relaxed);
        self.shared.active.store(true, Ordering::Release);
        debug!(sample_rate, block_size, "audio prepared");
    }

    /// Deactivates rendering; renderers emit silence until the next [`prepare`].
    ///
    /// [`prepare`]: AudioEngine::prepare
    pub fn release(&self) {
        self.shared.active.store(false, Ordering::Release);
        debug!("audio released");
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate.load(Ordering::Relaxed)
    }

    pub fn block_size(&self) -> usize {
        self.shared.block_size.load(Ordering::Relaxed)
    }

    /// Creates a renderer for the audio callback, seeded with the current parameters.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(Arc::clone(&self.shared), &self.config)
    }

    /// Serialises image path, scan progress and parameters.
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let parameters = self.shared.params.snapshot();
        let (image_path, scan_position) = {
            let voice = self.lock_voice();
            (
                voice.image.path().map(Path::to_path_buf),
                voice.scanner.position(),
            )
        };

        SessionState {
            image_path,
            scan_position,
            scan_pattern: parameters.scan_pattern,
            conversion_formula: parameters.conversion_formula,
            auto_load: self.auto_load,
            parameters,
            ..SessionState::default()
        }
        .to_bytes()
    }

    /// Restores a blob produced by [`save_state`].
    ///
    /// Parameters are applied first, then the image is reloaded when
    /// `auto_load` is set. A failed reload is recorded in [`last_error`] but
    /// does not fail the restore.
    ///
    /// [`save_state`]: AudioEngine::save_state
    /// [`last_error`]: AudioEngine::last_error
    pub fn restore_state(&mut self, bytes: &[u8]) -> Result<()> {
        let state = SessionState::from_bytes(bytes)?;
        let params = &self.shared.params;
        params.apply_snapshot(&state.parameters);
        params.set_scan_pattern(state.scan_pattern);
        params.set_conversion_formula(state.conversion_formula);
        self.auto_load = state.auto_load;
        debug!(parameters = ?state.parameters, "restored parameters applied");

        {
            let mut voice = self.lock_voice();
            voice.scanner.set_pattern(state.scan_pattern);
            voice.scanner.set_looping(state.parameters.looping);
        }

        if let (true, Some(path)) = (state.auto_load, state.image_path.as_deref()) {
            if self.load_image(path).is_err() {
                return Ok(());
            }
        }

        let mut voice = self.lock_voice();
        if voice.image.is_loaded() && !voice.scanner.restore_position(state.scan_position) {
            warn!(
                x = state.scan_position.x,
                y = state.scan_position.y,
                "scan position not restored"
            );
        }
        info!(
            pattern = state.scan_pattern.label(),
            loaded = voice.image.is_loaded(),
            "session restored"
        );
        Ok(())
    }

    fn lock_voice(&self) -> MutexGuard<'_, Voice> {
        self.shared.voice.lock().unwrap_or_else(|poisoned| {
            warn!("voice lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("config", &self.config)
            .field("last_error", &self.last_error)
            .field("auto_load", &self.auto_load)
            .finish_non_exhaustive()
    }
}

/// Linear ramp toward a target value.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl Ramp {
    fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    fn set_target(&mut self, target: f32, samples: u32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if samples == 0 {
            self.current = target;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / samples as f32;
            self.remaining = samples;
        }
    }

    fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }
}

/// Real-time half of the engine. Never blocks, never allocates, never fails.
pub struct Renderer {
    shared: Arc<Shared>,
    synth: Synthesizer,
    panner: StereoPanner,
    channel_mode: ChannelMode,
    max_area_size: u32,
    smoothing_ms: f32,
    pans: [Ramp; 3],
    gain: Ramp,
}

impl Renderer {
    fn new(shared: Arc<Shared>, config: &AppConfig) -> Self {
        let params = shared.params.snapshot();
        Self {
            synth: Synthesizer::with_gain(params.output_gain),
            panner: StereoPanner::new(),
            channel_mode: config.audio.channel_mode,
            max_area_size: config.audio.max_area_size.max(1),
            smoothing_ms: config.audio.smoothing_ms,
            pans: params.pans().map(|pan| Ramp::new(normalize_pan(pan))),
            gain: Ramp::new(params.output_gain),
            shared,
        }
    }

    /// Fills an interleaved buffer of `channels` channels. Trailing samples
    /// that do not form a whole frame are zeroed.
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            buffer.fill(0.0);
            return;
        }

        let frames = buffer.len() / channels;
        buffer[frames * channels..].fill(0.0);
        self.render(frames, |index, frame| {
            let start = index * channels;
            if let Some(slot) = buffer.get_mut(start..start + channels) {
                for (channel, sample) in slot.iter_mut().enumerate() {
                    *sample = channel_value(frame, channel, channels);
                }
            }
        });
    }

    /// Fills one slice per channel. Frames beyond the shortest slice are zeroed.
    pub fn process_planar(&mut self, outputs: &mut [&mut [f32]]) {
        let channels = outputs.len();
        let frames = outputs.iter().map(|out| out.len()).min().unwrap_or(0);
        for out in outputs.iter_mut() {
            out[frames..].fill(0.0);
        }

        self.render(frames, |index, frame| {
            for (channel, out) in outputs.iter_mut().enumerate() {
                if let Some(sample) = out.get_mut(index) {
                    *sample = channel_value(frame, channel, channels);
                }
            }
        });
    }

    fn render(&mut self, frames: usize, mut write: impl FnMut(usize, StereoFrame)) {
        if !self.shared.active.load(Ordering::Acquire) {
            silence(frames, &mut write);
            return;
        }

        let mut voice = match self.shared.voice.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                silence(frames, &mut write);
                return;
            }
        };

        let params = self.shared.params.snapshot();
        if self.shared.params.take_changed() {
            voice.scanner.set_pattern(params.scan_pattern);
            voice.scanner.set_looping(params.looping);
        }

        if !voice.image.is_loaded() {
            silence(frames, &mut write);
            return;
        }

        let ramp = self.ramp_samples();
        for (ramp_state, pan) in self.pans.iter_mut().zip(params.pans()) {
            ramp_state.set_target(normalize_pan(pan), ramp);
        }
        self.gain.set_target(params.output_gain, ramp);

        let area = params.area_size.clamp(1, self.max_area_size);
        let weights = (params.left_weight * 2.0, params.right_weight * 2.0);
        let Voice { image, scanner } = &mut *voice;

        for index in 0..frames {
            let mut position = scanner.advance(params.scan_speed);
            if !image.contains(position.x, position.y) {
                scanner.reset_position();
                position = scanner.position();
            }

            let color = image.area_average(position.x, position.y, area);
            self.synth.set_gain(self.gain.next());
            let amplitudes = match self.channel_mode {
                ChannelMode::Split => self.synth.convert_channels(color),
                ChannelMode::Mono => [self.synth.convert(color, params.conversion_formula); 3],
            };
            let positions = [self.pans[0].next(), self.pans[1].next(), self.pans[2].next()];

            let mixed = self.panner.pan_rgb(amplitudes, positions);
            let frame = StereoFrame::new(mixed.left * weights.0, mixed.right * weights.1).clamped();
            write(index, sanitize(frame));
        }
    }

    fn ramp_samples(&self) -> u32 {
        let sample_rate = self.shared.sample_rate.load(Ordering::Relaxed) as f32;
        let samples = self.smoothing_ms.max(0.0) * 0.001 * sample_rate;
        if samples.is_finite() {
            samples.round() as u32
        } else {
            0
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("channel_mode", &self.channel_mode)
            .field("max_area_size", &self.max_area_size)
            .finish_non_exhaustive()
    }
}

/// Mono outputs get the mid signal; otherwise even channels are left, odd are right.
fn channel_value(frame: StereoFrame, channel: usize, channels: usize) -> f32 {
    if channels == 1 {
        frame.mid()
    } else if channel % 2 == 0 {
        frame.left
    } else {
        frame.right
    }
}

fn silence(frames: usize, write: &mut impl FnMut(usize, StereoFrame)) {
    for index in 0..frames {
        write(index, StereoFrame::SILENCE);
    }
}

fn sanitize(frame: StereoFrame) -> StereoFrame {
    let finite = |value: f32| if value.is_finite() { value } else { 0.0 };
    StereoFrame::new(finite(frame.left), finite(frame.right))
}
