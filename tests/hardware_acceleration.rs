//! Hardware acceleration integration tests.
//!
//! Actual hardware decoding cannot be reliably tested in CI because the
//! available devices depend on the host GPU and driver stack. These tests
//! check device naming and enumeration, and that the fallback policy holds
//! whichever devices exist.

use std::path::Path;

use ffmpeg_next::format::Pixel;
use framepump::{
    DecodeErrorKind, HardwareAccelerationMode, HardwareDeviceType, Pipeline, PipelineError,
    PipelineOptions,
    hardware_acceleration::{is_hardware_pixel_format, preferred_surface_format},
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn skip_unless(path: &str) -> bool {
    if !Path::new(path).exists() {
        eprintln!("Skipping: fixture {path} not found");
        return true;
    }
    false
}

#[test]
fn enumerate_hardware_devices_does_not_panic() {
    framepump::initialize().expect("FFmpeg initialisation failed");
    let devices = framepump::available_hardware_devices();
    println!("Detected hardware devices: {devices:?}");

    for device in &devices {
        assert_eq!(device.name().parse::<HardwareDeviceType>(), Ok(*device));
    }
}

#[test]
fn device_names_parse() {
    for device in HardwareDeviceType::ALL {
        assert_eq!(device.to_string().parse::<HardwareDeviceType>(), Ok(device));
    }
    assert_eq!("rkmpp".parse::<HardwareDeviceType>(), Ok(HardwareDeviceType::Drm));
    assert_eq!("NVDEC".parse::<HardwareDeviceType>(), Ok(HardwareDeviceType::Cuda));
    assert!("opencl".parse::<HardwareDeviceType>().is_err());
}

#[test]
fn every_default_chain_leaves_the_device() {
    for device in HardwareDeviceType::ALL {
        let chain = device.default_filter_chain(640, 360, framepump::PixelFormat::Rgb24);
        assert!(
            chain.contains("hwmap") || chain.contains("hwdownload"),
            "{device} chain has no map/download stage: {chain}"
        );
        assert!(chain.ends_with("format=rgb24"), "{device} chain: {chain}");
        assert!(chain.contains("640") && chain.contains("360"), "{device} chain: {chain}");
    }
}

#[test]
fn hardware_pixel_formats_are_recognised() {
    assert!(is_hardware_pixel_format(Pixel::VAAPI));
    assert!(is_hardware_pixel_format(Pixel::DRM_PRIME));
    assert!(is_hardware_pixel_format(Pixel::CUDA));
    assert!(!is_hardware_pixel_format(Pixel::NV12));
    assert!(!is_hardware_pixel_format(Pixel::BGR24));
    assert!(!is_hardware_pixel_format(Pixel::None));
}

#[test]
fn negotiation_picks_the_bound_device_format() {
    // h264 lists CUDA ahead of VAAPI; a VAAPI-bound decoder must not take it.
    let offered = [Pixel::CUDA, Pixel::VAAPI, Pixel::YUV420P];
    assert_eq!(
        preferred_surface_format(&offered, Some(HardwareDeviceType::Vaapi)),
        Some(Pixel::VAAPI)
    );
    assert_eq!(
        preferred_surface_format(&offered, Some(HardwareDeviceType::Cuda)),
        Some(Pixel::CUDA)
    );
}

#[test]
fn negotiation_falls_back_to_drm_prime_then_nv12() {
    assert_eq!(
        preferred_surface_format(&[Pixel::NV12, Pixel::DRM_PRIME], Some(HardwareDeviceType::Vaapi)),
        Some(Pixel::DRM_PRIME)
    );
    assert_eq!(
        preferred_surface_format(&[Pixel::YUV420P, Pixel::NV12], Some(HardwareDeviceType::Cuda)),
        Some(Pixel::NV12)
    );
    assert_eq!(
        preferred_surface_format(&[Pixel::YUV420P], Some(HardwareDeviceType::Vaapi)),
        None
    );
    assert_eq!(preferred_surface_format(&[Pixel::CUDA], None), None);
}

#[test]
fn rockchip_decoders_keep_drm_prime() {
    assert_eq!(HardwareDeviceType::Drm.surface_format(), Pixel::DRM_PRIME);
    assert_eq!(
        preferred_surface_format(&[Pixel::DRM_PRIME, Pixel::NV12], Some(HardwareDeviceType::Drm)),
        Some(Pixel::DRM_PRIME)
    );
}

#[test]
fn auto_mode_extracts_frames() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Auto);
    let mut pipeline = Pipeline::with_options(SAMPLE_VIDEO, options).unwrap();
    println!("Active device: {:?}", pipeline.hardware_device());

    for _ in 0..3 {
        assert!(pipeline.next_frame().unwrap().is_some(), "Auto mode should still extract frames");
    }
}

#[test]
fn software_mode_reports_no_device() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    let pipeline = Pipeline::with_options(SAMPLE_VIDEO, options).unwrap();
    assert_eq!(pipeline.hardware_device(), None);
    assert_eq!(pipeline.filter_description(), "scale=w=1280:h=720,format=bgr24");
}

#[test]
fn required_hardware_either_binds_or_fails_cleanly() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let options = PipelineOptions::new()
        .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda))
        .with_require_hardware(true);

    match Pipeline::with_options(SAMPLE_VIDEO, options) {
        Ok(pipeline) => {
            assert_eq!(pipeline.hardware_device(), Some(HardwareDeviceType::Cuda));
        }
        Err(PipelineError::Decode { kind, .. }) => {
            assert_eq!(kind, DecodeErrorKind::HardwareUnavailable);
        }
        Err(PipelineError::Graph { .. }) => {
            // A CUDA device without the scale_cuda filter in this FFmpeg build.
        }
        Err(other) => panic!("Unexpected error: {other}"),
    }
}

#[test]
fn unavailable_device_falls_back_when_not_required() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    // No stock h264 decoder decodes on DXVA2 outside Windows, so this falls
    // back to software there.
    let options = PipelineOptions::new()
        .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Dxva2));

    match Pipeline::with_options(SAMPLE_VIDEO, options) {
        Ok(mut pipeline) => {
            if !cfg!(windows) {
                assert_eq!(pipeline.hardware_device(), None);
            }
            assert!(pipeline.next_frame().unwrap().is_some());
        }
        Err(error) => {
            assert!(cfg!(windows), "Fallback should not fail off Windows: {error}");
        }
    }
}
