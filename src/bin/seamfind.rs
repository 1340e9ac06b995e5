use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::{Value, json};
use seamfind::{
    ChannelMode, FfmpegLogLevel, FollowOutcome, FrameMatcher, LeadWindowAnchor, MatchOptions,
    Metric, OperationType, ProgressCallback, ProgressInfo, Seam, StitchOptions, Stitcher,
    VideoCodec, VideoEncoder, VideoEncoderOptions,
};

const CLI_AFTER_HELP: &str = "Examples:\n  seamfind find part1.mp4 part2.mp4 --seconds 2 --metric ssim\n  seamfind find part1.mp4 \"[part2.mp4,part3.mp4]\" --colour --json\n  seamfind stitch --lead part1.mp4 --follow part2.mp4 --lead-frame 1499 --follow-frame 12 --out stitched\n  seamfind completions zsh > _seamfind";

#[derive(Debug, Parser)]
#[command(
    name = "seamfind",
    version,
    about = "Find the most similar frames where one video clip should join the next",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Diagnostic detail: 0 silent, 1 stages, 2 timing, 3 every search row.
    #[arg(long, global = true, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbose: u8,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Worker thread count (defaults to one per logical processor).
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find the best seam between a leading clip and each following clip.
    #[command(
        about = "Find the most similar frame pair",
        after_help = "Examples:\n  seamfind find lead.mp4 follow.mp4\n  seamfind find lead.mp4 a.mp4,b.mp4 --metric psnr --no-downscale"
    )]
    Find {
        /// The clip that plays first.
        lead: PathBuf,

        /// One or more clips that play after it. Comma-separated lists and
        /// `[a,b]` are accepted too.
        #[arg(required = true, num_args = 1..)]
        follow: Vec<String>,

        /// Seconds to search at the end of the leading clip and the start of
        /// each following clip.
        #[arg(long, short = 's', default_value_t = 2)]
        seconds: u64,

        /// Similarity metric: mse | nrmse | psnr | ssim.
        #[arg(long, short = 'm', default_value = "mse")]
        metric: String,

        /// Compare in colour.
        #[arg(long, visible_alias = "color", conflicts_with = "greyscale")]
        colour: bool,

        /// Compare in greyscale (default).
        #[arg(long, visible_alias = "grayscale")]
        greyscale: bool,

        /// Downscale frames before comparing (default).
        #[arg(long, conflicts_with = "no_downscale")]
        downscale: bool,

        /// Compare frames at full resolution.
        #[arg(long)]
        no_downscale: bool,

        /// Height frames are downscaled to.
        #[arg(long, default_value_t = seamfind::DEFAULT_TARGET_HEIGHT)]
        height: u32,

        /// Start the leading window one frame earlier, as older releases did.
        #[arg(long)]
        legacy_seek: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Join two clips at a seam and write diagnostic images.
    #[command(
        about = "Stitch two clips at a chosen seam",
        after_help = "Examples:\n  seamfind stitch -l part1.mp4 -f part2.mp4 -x 1499 -y 12 -o out"
    )]
    Stitch {
        /// The clip that plays first.
        #[arg(long, short = 'l')]
        lead: PathBuf,
        /// The clip that plays second.
        #[arg(long, short = 'f')]
        follow: PathBuf,
        /// Last frame of the leading clip to keep.
        #[arg(long, short = 'x')]
        lead_frame: u64,
        /// First frame of the following clip to keep.
        #[arg(long, short = 'y')]
        follow_frame: u64,
        /// Directory the seam's output directory is created in.
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Seconds of the leading clip to keep.
        #[arg(long, short = 'z', default_value_t = 5)]
        lead_seconds: u64,
        /// Seconds of the following clip to keep.
        #[arg(long, short = 'w', default_value_t = 5)]
        follow_seconds: u64,
        /// Output codec: h264 | h265 | mpeg4.
        #[arg(long, default_value = "mpeg4")]
        codec: String,
        /// Skip the diagnostic images.
        #[arg(long)]
        no_diagnostics: bool,
        /// Allow overwriting an existing stitched video.
        #[arg(long)]
        overwrite: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Split following-clip arguments on commas, accepting an optional
/// surrounding `[...]`.
fn parse_follow_paths(values: &[String]) -> Vec<PathBuf> {
    values
        .iter()
        .flat_map(|value| {
            value
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|part| part.trim().trim_matches(|c| c == '"' || c == '\''))
                .filter(|part| !part.is_empty())
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn channel_mode(colour: bool) -> ChannelMode {
    if colour {
        ChannelMode::Color
    } else {
        ChannelMode::Grayscale
    }
}

fn log_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// JSON has no infinity; identical frames under PSNR are reported as "inf".
fn score_json(score: f64) -> Value {
    if score.is_finite() {
        json!(score)
    } else if score > 0.0 {
        json!("inf")
    } else {
        json!("-inf")
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log_filter(global.verbose))
        .parse_default_env()
        .init();

    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        seamfind::set_ffmpeg_log_level(parsed);
    }

    if global.threads == Some(0) {
        return Err("--threads must be greater than zero".into());
    }
    Ok(())
}

/// Drives an indicatif bar from progress callbacks.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {msg:>10} {bar:40.cyan/blue} {pos}/{len}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let label = match info.operation {
            OperationType::FrameExtraction => "reading",
            OperationType::Downscaling => "resizing",
            OperationType::Search => "searching",
            OperationType::Stitching => "writing",
            _ => "working",
        };
        self.bar.set_message(label);
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    let progress = if cli.global.progress {
        Some(Arc::new(TerminalProgress::new()?))
    } else {
        None
    };

    match cli.command {
        Commands::Find {
            lead,
            follow,
            seconds,
            metric,
            colour,
            greyscale: _,
            downscale: _,
            no_downscale,
            height,
            legacy_seek,
            json,
        } => {
            let metric: Metric = metric.parse()?;
            let follow_paths = parse_follow_paths(&follow);
            if follow_paths.is_empty() {
                return Err("at least one following clip is required".into());
            }

            let mut options = MatchOptions::new()
                .with_seconds(seconds)
                .with_metric(metric)
                .with_channel_mode(channel_mode(colour))
                .with_downscale(!no_downscale)
                .with_target_height(height)
                .with_verbosity(cli.global.verbose);
            if legacy_seek {
                options = options.with_lead_anchor(LeadWindowAnchor::Legacy);
            }
            if let Some(threads) = cli.global.threads {
                options = options.with_threads(threads);
            }
            if let Some(progress) = &progress {
                options = options.with_progress(progress.clone());
            }

            let matcher = FrameMatcher::new(options)?;
            let outcomes = matcher.run(&lead, &follow_paths)?;
            if let Some(progress) = &progress {
                progress.finish();
            }

            if json {
                let results: Vec<Value> = follow_paths
                    .iter()
                    .zip(&outcomes)
                    .map(|(path, outcome)| match outcome {
                        FollowOutcome::Matched(result) => json!({
                            "follow": path.display().to_string(),
                            "lead_frame": result.lead_index,
                            "follow_frame": result.follow_index,
                            "score": score_json(result.score),
                        }),
                        FollowOutcome::Absent { reason, .. } => json!({
                            "follow": path.display().to_string(),
                            "error": reason.to_string(),
                        }),
                    })
                    .collect();
                let payload = json!({
                    "lead": lead.display().to_string(),
                    "metric": metric.name(),
                    "seconds": seconds,
                    "results": results,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (path, outcome) in follow_paths.iter().zip(&outcomes) {
                    match outcome {
                        FollowOutcome::Matched(result) => println!(
                            "{} {}: lead frame {}, follow frame {} ({} {})",
                            "match".green().bold(),
                            path.display(),
                            result.lead_index,
                            result.follow_index,
                            metric,
                            result.score
                        ),
                        FollowOutcome::Absent { reason, .. } => eprintln!(
                            "{} {}",
                            "warning:".yellow().bold(),
                            format!("{}: {reason}", path.display()).yellow()
                        ),
                    }
                }
            }
        }
        Commands::Stitch {
            lead,
            follow,
            lead_frame,
            follow_frame,
            out,
            lead_seconds,
            follow_seconds,
            codec,
            no_diagnostics,
            overwrite,
        } => {
            let codec: VideoCodec = codec.parse()?;
            let seam = Seam::new(lead, lead_frame, follow, follow_frame);
            let directory = seam.output_directory(&out);
            let video_path = directory.join(seam.video_file_name());
            ensure_writable_path(&video_path, overwrite)?;

            let mut options = StitchOptions::new()
                .with_lead_seconds(lead_seconds)
                .with_follow_seconds(follow_seconds)
                .with_verbosity(cli.global.verbose);
            if let Some(progress) = &progress {
                options = options.with_progress(progress.clone());
            }

            let stitcher = Stitcher::new(options)?;
            let clip = stitcher.collect(&seam)?;
            std::fs::create_dir_all(&directory)?;

            let encoder_options = VideoEncoderOptions::default()
                .fps(clip.frames_per_second)
                .codec(codec);
            let mut encoder = VideoEncoder::create(&video_path, encoder_options)?;
            stitcher.write(&clip, &mut encoder)?;
            if !no_diagnostics {
                stitcher.write_diagnostics(&clip, &directory)?;
            }
            if let Some(progress) = &progress {
                progress.finish();
            }

            println!(
                "{} {} ({} + {} frames)",
                "wrote".green().bold(),
                video_path.display(),
                clip.lead.len(),
                clip.follow.len()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "seamfind", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
