use std::env;
use std::path::{Path, PathBuf};

/// Where a hardware-enabled FFmpeg build usually lives when the system one
/// is not picked up by pkg-config.
fn ffmpeg_candidates(target_os: &str, target_arch: &str) -> Vec<PathBuf> {
    match target_os {
        "windows" => env::var("VCPKG_ROOT")
            .map(|root| {
                let triplet =
                    env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
                vec![PathBuf::from(root).join("installed").join(triplet)]
            })
            .unwrap_or_default(),
        "macos" => vec![
            PathBuf::from("/opt/homebrew/opt/ffmpeg"),
            PathBuf::from("/usr/local/opt/ffmpeg"),
        ],
        // Rockchip boards typically carry an MPP/RGA-enabled FFmpeg next to
        // the distribution one.
        "linux" if target_arch == "aarch64" => vec![PathBuf::from("/opt/ffmpeg-rockchip")],
        _ => Vec::new(),
    }
}

fn has_libraries(prefix: &Path) -> bool {
    prefix.join("lib").exists() && prefix.join("include").join("libavfilter").exists()
}

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");
    println!("cargo:rerun-if-env-changed=VCPKGRS_TRIPLET");

    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    match ffmpeg_candidates(&target_os, &target_arch)
        .into_iter()
        .find(|prefix| has_libraries(prefix))
    {
        Some(prefix) => println!(
            "cargo:warning=Found FFmpeg at {}. Set FFMPEG_DIR={} if ffmpeg-sys-next picks up a build without the hardware decoders you need.",
            prefix.display(),
            prefix.display(),
        ),
        None if target_os == "windows" => println!(
            "cargo:warning=FFMPEG_DIR is not set. On Windows, install FFmpeg (with d3d11va/dxva2 support) via vcpkg and set VCPKG_ROOT or FFMPEG_DIR."
        ),
        None => {}
    }
}
