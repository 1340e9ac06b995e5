use std::env;
use std::path::PathBuf;

fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // Nothing links against FFmpeg without the `ffmpeg` feature.
    if env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=seamfind: the `ffmpeg` feature needs FFmpeg. Install it with vcpkg and set FFMPEG_DIR."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(&triplet);
    if candidate.is_dir() {
        println!(
            "cargo:warning=seamfind: found FFmpeg under {}; set FFMPEG_DIR to that path.",
            candidate.display()
        );
    } else {
        println!(
            "cargo:warning=seamfind: VCPKG_ROOT has no `{triplet}` FFmpeg install at {}.",
            candidate.display()
        );
    }
}
