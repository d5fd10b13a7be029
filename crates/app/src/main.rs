mod export;
mod playback;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scanline_core::{
    AppConfig, AudioEngine, ChannelMode, ConversionFormula, ScanPattern, ScanlineError,
};
use tracing_subscriber::EnvFilter;

fn main() -> scanline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), &cli.params)?;

    match cli.command {
        Commands::Play { image, seconds } => playback::run(config, &image, duration(seconds)?),
        Commands::Render {
            image,
            output,
            seconds,
        } => export::run(config, &image, &output, duration(seconds)?),
        Commands::Inspect { image } => run_inspect(config, &image),
    }
}

fn run_inspect(config: AppConfig, image: &Path) -> scanline_core::Result<()> {
    tracing::info!(?image, "inspecting image");

    let mut engine = AudioEngine::new(config);
    let dimensions = engine.load_image(image)?;
    let mean = engine.mean_color();
    let formula = engine.params().conversion_formula();

    println!("{}", image.display());
    println!("  dimensions: {}x{}", dimensions.width, dimensions.height);
    println!(
        "  mean colour: rgb({}, {}, {})",
        mean.red, mean.green, mean.blue
    );
    println!("  {}: {:.4}", formula.label(), formula.apply(mean));
    Ok(())
}

fn resolve_config(path: Option<&Path>, params: &ParamArgs) -> scanline_core::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::live_defaults(),
    };
    params.apply(&mut config);
    Ok(config)
}

fn duration(seconds: f32) -> scanline_core::Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .map_err(|err| ScanlineError::msg(format!("invalid duration {seconds}: {err}")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Turns images into sound by scanning their pixels",
    long_about = None
)]
struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    params: ParamArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play an image through the default output device.
    Play {
        image: PathBuf,
        /// How long to play for.
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f32,
    },
    /// Render an image to a 32-bit float WAV file.
    Render {
        image: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f32,
    },
    /// Print the dimensions and mean colour of an image.
    Inspect { image: PathBuf },
}

#[derive(Args, Debug, Default)]
struct ParamArgs {
    /// Scan speed in pixels per sample (0.1 to 10).
    #[arg(long, global = true)]
    speed: Option<f32>,
    /// Area-average window size (1 to 50).
    #[arg(long, global = true)]
    area: Option<u32>,
    /// Output gain (0 to 2).
    #[arg(long, global = true)]
    gain: Option<f32>,
    #[arg(long, global = true)]
    left_weight: Option<f32>,
    #[arg(long, global = true)]
    right_weight: Option<f32>,
    /// Red pan (-100 to 100).
    #[arg(long, global = true, allow_negative_numbers = true)]
    red_pan: Option<f32>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    green_pan: Option<f32>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    blue_pan: Option<f32>,
    #[arg(long, global = true, value_enum)]
    formula: Option<FormulaArg>,
    #[arg(long, global = true, value_enum)]
    pattern: Option<PatternArg>,
    /// Stop at the end of the image instead of starting over.
    #[arg(long, global = true)]
    no_loop: bool,
    /// Feed the formula amplitude to all three voices.
    #[arg(long, global = true)]
    mono: bool,
}

impl ParamArgs {
    fn apply(&self, config: &mut AppConfig) {
        let params = &mut config.parameters;
        if let Some(speed) = self.speed {
            params.scan_speed = speed;
        }
        if let Some(area) = self.area {
            params.area_size = area;
        }
        if let Some(gain) = self.gain {
            params.output_gain = gain;
        }
        if let Some(weight) = self.left_weight {
            params.left_weight = weight;
        }
        if let Some(weight) = self.right_weight {
            params.right_weight = weight;
        }
        if let Some(pan) = self.red_pan {
            params.red_pan = pan;
        }
        if let Some(pan) = self.green_pan {
            params.green_pan = pan;
        }
        if let Some(pan) = self.blue_pan {
            params.blue_pan = pan;
        }
        if let Some(formula) = self.formula {
            params.conversion_formula = formula.into();
        }
        if let Some(pattern) = self.pattern {
            params.scan_pattern = pattern.into();
        }
        if self.no_loop {
            params.looping = false;
        }
        if self.mono {
            config.audio.channel_mode = ChannelMode::Mono;
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum FormulaArg {
    Average,
    Weighted,
    Red,
    Green,
    Blue,
    Max,
    Min,
}

impl From<FormulaArg> for ConversionFormula {
    fn from(value: FormulaArg) -> Self {
        match value {
            FormulaArg::Average => ConversionFormula::RgbAverage,
            FormulaArg::Weighted => ConversionFormula::WeightedRgb,
            FormulaArg::Red => ConversionFormula::RedChannel,
            FormulaArg::Green => ConversionFormula::GreenChannel,
            FormulaArg::Blue => ConversionFormula::BlueChannel,
            FormulaArg::Max => ConversionFormula::MaxChannel,
            FormulaArg::Min => ConversionFormula::MinChannel,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PatternArg {
    Horizontal,
    Vertical,
    Diagonal,
    Spiral,
}

impl From<PatternArg> for ScanPattern {
    fn from(value: PatternArg) -> Self {
        match value {
            PatternArg::Horizontal => ScanPattern::Horizontal,
            PatternArg::Vertical => ScanPattern::Vertical,
            PatternArg::Diagonal => ScanPattern::Diagonal,
            PatternArg::Spiral => ScanPattern::Spiral,
        }
    }
}
