use sd2hd::{Config, Console, Error, MediaInfo, Orchestrator, RunOutcome, RunRequest, UpscaleModel};

use std::path::{Path, PathBuf};

use clap::Parser;
use crossbeam_channel::unbounded;

#[derive(Parser, Debug)]
#[command(name = "sd2hd", version, about = "Upscale SD video to HD with ffmpeg and waifu2x")]
struct Args {
    /// Input video file
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file (default: <input stem>.hd.mkv next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Upscale factor
    #[arg(long)]
    scale: Option<u32>,

    /// Denoise level (0-3)
    #[arg(long)]
    denoise: Option<u32>,

    /// waifu2x model: anime-style-art-rgb, cunet or photo
    #[arg(long)]
    model: Option<UpscaleModel>,

    /// Constant rate factor of the video encoder
    #[arg(long)]
    crf: Option<u32>,

    #[arg(long)]
    preset: Option<String>,

    #[arg(long)]
    tune: Option<String>,

    #[arg(long)]
    video_codec: Option<String>,

    #[arg(long)]
    audio_codec: Option<String>,

    #[arg(long)]
    audio_bitrate: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(height) = self.height {
            config.output_height = height;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(denoise) = self.denoise {
            config.denoise = denoise;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        let codecs = &mut config.codecs;
        if let Some(crf) = self.crf {
            codecs.video_crf = crf;
        }
        for (value, target) in [
            (&self.preset, &mut codecs.video_preset),
            (&self.tune, &mut codecs.video_tuning),
            (&self.video_codec, &mut codecs.video_codec),
            (&self.audio_codec, &mut codecs.audio_codec),
            (&self.audio_bitrate, &mut codecs.audio_bitrate),
        ] {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }
    }

    fn output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| default_output(&self.input))
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{}.hd.mkv", stem))
}

fn print_options(request: &RunRequest, media: &MediaInfo) {
    let geometry = &request.geometry;
    println!("Input:      {}", request.input.display());
    println!("Output:     {}", request.output.display());
    println!(
        "Source:     {}x{} ({}, {} fps)",
        media.video_width,
        media.video_height,
        media.display_aspect_ratio.to_string_with(':'),
        media.frame_rate
    );
    println!("Extract:    {}x{}", geometry.extract_width, geometry.extract_height);
    println!(
        "Scale:      {}x ({}, denoise {})",
        geometry.scale,
        request.model.label(),
        request.denoise
    );
    println!("Encoder:    {} crf {}", request.codecs.video_codec, request.codecs.video_crf);
    println!("Resolution: {}x{}", geometry.output_width, geometry.output_height);
}

fn run_pipeline() -> Result<(), Error> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    if !args.input.is_file() {
        return Err(Error::InvalidArgument(format!("{} is not a file", args.input.display())));
    }

    let (sender, receiver) = unbounded();
    let orchestrator = Orchestrator::new(&config, sender);
    let media = orchestrator.probe(&args.input)?;
    let request = RunRequest::new(&args.input, args.output(), &media, &config)?;
    print_options(&request, &media);

    let console = Console::new();
    orchestrator.start(request)?;
    let outcome = console.run(&receiver);
    match orchestrator.wait().or(outcome) {
        Some(RunOutcome::Completed) => Ok(()),
        Some(RunOutcome::Failed { stage, message }) => Err(Error::StageFailed { stage, message }),
        Some(RunOutcome::Aborted) | None => Err(Error::Aborted),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(error) = run_pipeline() {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    } else {
        println!("Completed!");
    }
}
