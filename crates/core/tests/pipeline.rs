use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, RgbImage};
use scanline_core::{
    AppConfig, AudioEngine, ConversionFormula, Dimensions, Position, ScanPattern, ScanState,
    ScanlineError,
};

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

fn temp_path(extension: &str) -> PathBuf {
    let id = NEXT_FILE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "scanline-pipeline-{}-{id}.{extension}",
        std::process::id()
    ))
}

fn write_image(
    width: u32,
    height: u32,
    extension: &str,
    pixel: impl Fn(u32, u32) -> [u8; 3],
) -> PathBuf {
    let path = temp_path(extension);
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| image::Rgb(pixel(x, y)));
    img.save(&path).unwrap();
    path
}

fn prepared_engine() -> AudioEngine {
    let engine = AudioEngine::new(AppConfig::default());
    engine.prepare(44_100, 256);
    engine
}

#[test]
fn png_renders_bounded_audio() {
    let path = write_image(32, 16, "png", |x, y| [(x * 8) as u8, (y * 16) as u8, 200]);
    let mut engine = prepared_engine();

    let dimensions = engine.load_image(&path).unwrap();
    assert_eq!(dimensions, Dimensions::new(32, 16));
    assert!(engine.is_loaded());
    assert_eq!(engine.image_path(), Some(path.clone()));

    let mut renderer = engine.renderer();
    let mut buffer = vec![0.0f32; 512];
    renderer.process_interleaved(&mut buffer, 2);

    assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(buffer.iter().any(|s| *s != 0.0));
    assert_eq!(engine.scan_state(), ScanState::Scanning);
}

#[test]
fn bmp_is_accepted() {
    let path = write_image(4, 4, "bmp", |_, _| [10, 20, 30]);
    let mut engine = prepared_engine();
    engine.load_image(&path).unwrap();
    assert_eq!(engine.mean_color(), scanline_core::Rgb::new(10, 20, 30));
}

#[test]
fn rejected_loads_leave_engine_unloaded() {
    let mut engine = prepared_engine();
    let good = write_image(8, 8, "png", |_, _| [255, 255, 255]);

    let tiny = write_image(1, 1, "png", |_, _| [0, 0, 0]);
    let wide = write_image(4096, 2, "png", |_, _| [0, 0, 0]);
    let text = temp_path("txt");
    std::fs::write(&text, b"hello").unwrap();
    let corrupt = temp_path("png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let missing = temp_path("png");

    for path in [&tiny, &wide, &text, &corrupt, &missing] {
        engine.load_image(&good).unwrap();
        let err = engine.load_image(path).unwrap_err();
        assert!(err.is_load_error(), "{err}");
        assert!(!engine.is_loaded());
        assert!(!engine.last_error().unwrap_or_default().is_empty());
    }

    assert!(matches!(
        engine.load_image(&tiny),
        Err(ScanlineError::InvalidDimensions { width: 1, height: 1, .. })
    ));
    assert!(matches!(
        engine.load_image(&corrupt),
        Err(ScanlineError::Decode(_))
    ));
    assert!(matches!(
        engine.load_image(&missing),
        Err(ScanlineError::FileNotFound(_))
    ));
}

#[test]
fn file_size_ceiling_is_configurable() {
    let mut config = AppConfig::default();
    config.image.max_file_bytes = 16;
    let mut engine = AudioEngine::new(config);

    let path = write_image(8, 8, "png", |x, y| [x as u8, y as u8, 0]);
    assert!(matches!(
        engine.load_image(&path),
        Err(ScanlineError::FileTooLarge { limit: 16, .. })
    ));
}

#[test]
fn unloaded_engine_is_silent() {
    let engine = prepared_engine();
    let mut renderer = engine.renderer();
    let mut left = vec![0.3f32; 128];
    let mut right = vec![0.3f32; 128];
    renderer.process_planar(&mut [&mut left[..], &mut right[..]]);
    assert!(left.iter().chain(&right).all(|s| *s == 0.0));
}

#[test]
fn hard_left_red_stays_on_the_left() {
    let path = write_image(16, 16, "png", |_, _| [255, 0, 0]);
    let mut engine = prepared_engine();
    engine.load_image(&path).unwrap();
    engine.params().set_red_pan(-100.0);
    engine.params().set_green_pan(100.0);
    engine.params().set_blue_pan(100.0);

    let mut renderer = engine.renderer();
    let mut buffer = vec![0.0f32; 64];
    renderer.process_interleaved(&mut buffer, 2);

    for frame in buffer.chunks_exact(2) {
        assert!(frame[0] > 0.99);
        assert!(frame[1] < -0.99);
    }
}

#[test]
fn every_pattern_stays_bounded_over_long_runs() {
    let path = write_image(9, 7, "png", |x, y| {
        [(x * 28) as u8, (y * 36) as u8, ((x + y) * 16) as u8]
    });

    for pattern in ScanPattern::ALL {
        let mut engine = prepared_engine();
        engine.params().set_scan_pattern(pattern);
        engine.params().set_scan_speed(3.7);
        engine.load_image(&path).unwrap();

        let mut renderer = engine.renderer();
        let mut buffer = vec![0.0f32; 2048];
        for _ in 0..20 {
            renderer.process_interleaved(&mut buffer, 2);
            assert!(buffer.iter().all(|s| s.is_finite() && (-1.0..=1.0).contains(s)));
            let position = engine.scan_position();
            assert!((0.0..=8.0).contains(&position.x), "{pattern:?} {position:?}");
            assert!((0.0..=6.0).contains(&position.y), "{pattern:?} {position:?}");
        }
    }
}

#[test]
fn non_looping_scan_completes_and_holds_still() {
    let path = write_image(10, 10, "png", |_, _| [128, 128, 128]);
    let mut engine = prepared_engine();
    engine.params().set_looping(false);
    engine.load_image(&path).unwrap();

    let mut renderer = engine.renderer();
    let mut buffer = vec![0.0f32; 512];
    renderer.process_interleaved(&mut buffer, 2);
    assert_eq!(engine.scan_state(), ScanState::Complete);

    let frozen = engine.scan_position();
    renderer.process_interleaved(&mut buffer, 2);
    assert_eq!(engine.scan_position(), frozen);
}

#[test]
fn session_state_restores_image_and_position() {
    let path = write_image(12, 12, "png", |x, _| [(x * 20) as u8, 0, 0]);
    let mut engine = prepared_engine();
    engine.params().set_conversion_formula(ConversionFormula::WeightedRgb);
    engine.load_image(&path).unwrap();

    let mut renderer = engine.renderer();
    let mut buffer = vec![0.0f32; 60];
    renderer.process_interleaved(&mut buffer, 2);
    let position = engine.scan_position();
    assert_ne!(position, Position::ORIGIN);

    let bytes = engine.save_state().unwrap();
    let mut restored = prepared_engine();
    restored.restore_state(&bytes).unwrap();

    assert_eq!(restored.dimensions(), Dimensions::new(12, 12));
    assert_eq!(restored.scan_position(), position);
    assert_eq!(
        restored.params().conversion_formula(),
        ConversionFormula::WeightedRgb
    );
}

#[test]
fn restore_with_missing_image_reports_the_load_error() {
    let path = write_image(6, 6, "png", |_, _| [1, 2, 3]);
    let mut engine = prepared_engine();
    engine.load_image(&path).unwrap();
    let bytes = engine.save_state().unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut restored = prepared_engine();
    restored.restore_state(&bytes).unwrap();
    assert!(!restored.is_loaded());
    assert!(restored.last_error().is_some());
}
