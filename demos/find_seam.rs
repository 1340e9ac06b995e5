//! Find where a following clip best continues a leading clip.
//!
//! Usage:
//!   cargo run --example find_seam --features ffmpeg -- <lead> <follow>... [metric]

use std::error::Error;

use seamfind::{FollowOutcome, MatchOptions, Metric, find_matching_frames};

fn main() -> Result<(), Box<dyn Error>> {
    let mut arguments: Vec<String> = std::env::args().skip(1).collect();
    if arguments.len() < 2 {
        return Err("usage: find_seam <lead> <follow>... [mse|nrmse|psnr|ssim]".into());
    }

    // A trailing metric name is optional.
    let metric = match arguments.last().map(|last| last.parse::<Metric>()) {
        Some(Ok(metric)) if arguments.len() > 2 => {
            arguments.pop();
            metric
        }
        _ => Metric::Ssim,
    };
    let lead = arguments.remove(0);

    let options = MatchOptions::new().with_seconds(2).with_metric(metric);
    println!("Comparing {lead} with {} clip(s) using {metric}...", arguments.len());

    for outcome in find_matching_frames(&lead, &arguments, options)? {
        match outcome {
            FollowOutcome::Matched(best) => println!(
                "lead frame {:>6}  follow frame {:>6}  {metric} {:.4}",
                best.lead_index, best.follow_index, best.score
            ),
            FollowOutcome::Absent { path, reason } => {
                println!("{}: skipped ({reason})", path.display());
            }
        }
    }

    Ok(())
}
