//! Join two clips at a known pair of frames and write diagnostic images.
//!
//! Usage:
//!   cargo run --example stitch --features ffmpeg -- <lead> <lead_frame> <follow> <follow_frame>

use std::error::Error;
use std::path::Path;

use seamfind::{Seam, StitchOptions, Stitcher, VideoCodec, VideoEncoder, VideoEncoderOptions};

fn main() -> Result<(), Box<dyn Error>> {
    let arguments: Vec<String> = std::env::args().skip(1).collect();
    let [lead, lead_frame, follow, follow_frame] = arguments.as_slice() else {
        return Err("usage: stitch <lead> <lead_frame> <follow> <follow_frame>".into());
    };

    let seam = Seam::new(lead, lead_frame.parse()?, follow, follow_frame.parse()?);
    let stitcher = Stitcher::new(
        StitchOptions::new()
            .with_lead_seconds(3)
            .with_follow_seconds(3),
    )?;

    println!("Reading frames around the seam...");
    let clip = stitcher.collect(&seam)?;
    println!(
        "{} leading and {} following frames at {:.2} fps",
        clip.lead.len(),
        clip.follow.len(),
        clip.frames_per_second
    );

    let directory = seam.output_directory(Path::new("."));
    let images = stitcher.write_diagnostics(&clip, &directory)?;
    println!("Saved {}", images.absolute_difference.display());
    println!("Saved {}", images.ssim_difference.display());

    let output = directory.join(seam.video_file_name());
    let mut encoder = VideoEncoder::create(
        &output,
        VideoEncoderOptions::default()
            .fps(clip.frames_per_second)
            .codec(VideoCodec::H264),
    )?;
    stitcher.write(&clip, &mut encoder)?;
    println!("Saved {}", output.display());

    Ok(())
}
