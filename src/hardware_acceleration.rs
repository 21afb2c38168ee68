//! Hardware-accelerated decoding support.
//!
//! This module provides [`HardwareAccelerationMode`] for controlling
//! hardware decoder selection, [`HardwareDeviceType`] for naming devices, and
//! the internal plumbing that creates an FFmpeg device context, negotiates
//! the decoder's hardware surface format, and owns hardware frame pools.
//!
//! Device and frame-pool contexts are reference-counted FFmpeg buffers.
//! Each wrapper here holds exactly one reference and releases it on drop, so
//! a pipeline tears its hardware state down deterministically even when a
//! later stage failed to initialise.
//!
//! # Platform Support
//!
//! Availability depends on both the FFmpeg build and the host's GPU
//! drivers. Use [`available_hardware_devices`] to see what the linked FFmpeg
//! was built with.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    ptr,
    str::FromStr,
};

use ffmpeg_next::{codec::Codec, format::Pixel};
use ffmpeg_sys_next::{
    AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX, AV_PIX_FMT_FLAG_HWACCEL, AVBufferRef,
    AVCodecContext, AVCodecHWConfig, AVHWDeviceContext, AVHWDeviceType, AVHWFramesContext,
    AVPixelFormat,
};

use crate::configuration::PixelFormat;
use crate::error::{DecodeErrorKind, PipelineError};

/// Hardware acceleration mode for video decoding.
///
/// Combine with [`PipelineOptions::with_require_hardware`](crate::PipelineOptions::with_require_hardware)
/// to decide whether a missing device is an error or a software fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAccelerationMode {
    /// Try every device the codec supports, in the codec's order of
    /// preference.
    #[default]
    Auto,
    /// Force software decoding.
    Software,
    /// Use one specific device type.
    Specific(HardwareDeviceType),
}

/// Hardware device types this crate can drive.
///
/// Not all types are available on all platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareDeviceType {
    /// NVIDIA CUDA / NVDEC (Linux, Windows).
    Cuda,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// DRM PRIME buffers (Linux SoCs; used by Rockchip MPP `*_rkmpp`
    /// decoders).
    Drm,
    /// Intel Quick Sync Video.
    Qsv,
    /// Apple VideoToolbox (macOS, iOS).
    VideoToolbox,
    /// Direct3D 11 Video Acceleration (Windows).
    D3d11va,
    /// DirectX Video Acceleration 2 (Windows).
    Dxva2,
}

impl HardwareDeviceType {
    /// Every device type, in the order [`HardwareAccelerationMode::Auto`]
    /// falls back to when the codec does not express a preference.
    pub const ALL: [HardwareDeviceType; 7] = [
        HardwareDeviceType::Cuda,
        HardwareDeviceType::Vaapi,
        HardwareDeviceType::Drm,
        HardwareDeviceType::Qsv,
        HardwareDeviceType::VideoToolbox,
        HardwareDeviceType::D3d11va,
        HardwareDeviceType::Dxva2,
    ];

    pub(crate) fn to_av_hw_device_type(self) -> AVHWDeviceType {
        match self {
            HardwareDeviceType::Cuda => AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            HardwareDeviceType::Vaapi => AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            HardwareDeviceType::Drm => AVHWDeviceType::AV_HWDEVICE_TYPE_DRM,
            HardwareDeviceType::Qsv => AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
            HardwareDeviceType::VideoToolbox => AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            HardwareDeviceType::D3d11va => AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            HardwareDeviceType::Dxva2 => AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
        }
    }

    pub(crate) fn from_av_hw_device_type(device_type: AVHWDeviceType) -> Option<Self> {
        match device_type {
            AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA => Some(HardwareDeviceType::Cuda),
            AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI => Some(HardwareDeviceType::Vaapi),
            AVHWDeviceType::AV_HWDEVICE_TYPE_DRM => Some(HardwareDeviceType::Drm),
            AVHWDeviceType::AV_HWDEVICE_TYPE_QSV => Some(HardwareDeviceType::Qsv),
            AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX => Some(HardwareDeviceType::VideoToolbox),
            AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA => Some(HardwareDeviceType::D3d11va),
            AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2 => Some(HardwareDeviceType::Dxva2),
            _ => None,
        }
    }

    /// FFmpeg's name for the device type (e.g. `"vaapi"`).
    pub fn name(self) -> &'static str {
        match self {
            HardwareDeviceType::Cuda => "cuda",
            HardwareDeviceType::Vaapi => "vaapi",
            HardwareDeviceType::Drm => "drm",
            HardwareDeviceType::Qsv => "qsv",
            HardwareDeviceType::VideoToolbox => "videotoolbox",
            HardwareDeviceType::D3d11va => "d3d11va",
            HardwareDeviceType::Dxva2 => "dxva2",
        }
    }

    /// Opaque pixel format of this device's decoded surfaces.
    pub fn surface_format(self) -> Pixel {
        Pixel::from(match self {
            HardwareDeviceType::Cuda => AVPixelFormat::AV_PIX_FMT_CUDA,
            HardwareDeviceType::Vaapi => AVPixelFormat::AV_PIX_FMT_VAAPI,
            HardwareDeviceType::Drm => AVPixelFormat::AV_PIX_FMT_DRM_PRIME,
            HardwareDeviceType::Qsv => AVPixelFormat::AV_PIX_FMT_QSV,
            HardwareDeviceType::VideoToolbox => AVPixelFormat::AV_PIX_FMT_VIDEOTOOLBOX,
            HardwareDeviceType::D3d11va => AVPixelFormat::AV_PIX_FMT_D3D11,
            HardwareDeviceType::Dxva2 => AVPixelFormat::AV_PIX_FMT_DXVA2_VLD,
        })
    }

    /// The default chain for frames arriving on this device: scale to
    /// `width`×`height` on the device where a scaler exists, map or download
    /// to host memory, then convert to `format`.
    ///
    /// Windows devices have no device-side scaler in FFmpeg's stock filter
    /// set, so their chain downloads first and scales on the host.
    pub fn default_filter_chain(self, width: u32, height: u32, format: PixelFormat) -> String {
        let format = format.name();
        match self {
            HardwareDeviceType::Drm => {
                format!("scale_rkrga=w={width}:h={height}:format={format},hwmap=mode=read,format={format}")
            }
            HardwareDeviceType::Vaapi => {
                format!("scale_vaapi=w={width}:h={height}:format=nv12,hwmap=mode=read,format={format}")
            }
            HardwareDeviceType::Cuda => {
                format!("scale_cuda=w={width}:h={height}:format=nv12,hwdownload,format=nv12,format={format}")
            }
            HardwareDeviceType::Qsv => {
                format!("scale_qsv=w={width}:h={height}:format=nv12,hwdownload,format=nv12,format={format}")
            }
            HardwareDeviceType::VideoToolbox => {
                format!("scale_vt=w={width}:h={height},hwdownload,format=nv12,format={format}")
            }
            HardwareDeviceType::D3d11va | HardwareDeviceType::Dxva2 => {
                format!("hwdownload,format=nv12,scale=w={width}:h={height},format={format}")
            }
        }
    }
}

impl Display for HardwareDeviceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for HardwareDeviceType {
    type Err = String;

    /// Parse FFmpeg's device name. `"rkmpp"` is accepted as an alias for
    /// [`HardwareDeviceType::Drm`].
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "cuda" | "nvdec" => Ok(HardwareDeviceType::Cuda),
            "vaapi" => Ok(HardwareDeviceType::Vaapi),
            "drm" | "rkmpp" => Ok(HardwareDeviceType::Drm),
            "qsv" => Ok(HardwareDeviceType::Qsv),
            "videotoolbox" => Ok(HardwareDeviceType::VideoToolbox),
            "d3d11va" => Ok(HardwareDeviceType::D3d11va),
            "dxva2" => Ok(HardwareDeviceType::Dxva2),
            other => Err(format!("unknown hardware device type '{other}'")),
        }
    }
}

/// List the hardware device types supported by the linked FFmpeg build.
///
/// Being listed does not guarantee a device can be opened on this host.
pub fn available_hardware_devices() -> Vec<HardwareDeviceType> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }
        if let Some(device) = HardwareDeviceType::from_av_hw_device_type(device_type) {
            devices.push(device);
        }
    }

    devices
}

/// One owned reference to an FFmpeg `AVBufferRef`.
struct BufferReference {
    ptr: *mut AVBufferRef,
}

impl BufferReference {
    /// Take a new reference to a buffer someone else owns.
    fn share(ptr: *mut AVBufferRef) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let shared = unsafe { ffmpeg_sys_next::av_buffer_ref(ptr) };
        if shared.is_null() {
            None
        } else {
            Some(Self { ptr: shared })
        }
    }

    fn new_reference(&self) -> *mut AVBufferRef {
        unsafe { ffmpeg_sys_next::av_buffer_ref(self.ptr) }
    }
}

impl Drop for BufferReference {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { ffmpeg_sys_next::av_buffer_unref(&mut self.ptr) };
        }
    }
}

/// An opened hardware device.
pub(crate) struct HardwareDeviceContext {
    reference: BufferReference,
    device: HardwareDeviceType,
}

impl HardwareDeviceContext {
    /// Open the default device of the given type.
    pub(crate) fn create(device: HardwareDeviceType) -> Result<Self, PipelineError> {
        let mut context: *mut AVBufferRef = ptr::null_mut();
        let result = unsafe {
            ffmpeg_sys_next::av_hwdevice_ctx_create(
                &mut context,
                device.to_av_hw_device_type(),
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };

        if result < 0 || context.is_null() {
            return Err(PipelineError::decode(
                DecodeErrorKind::HardwareUnavailable,
                format!(
                    "Failed to create {device} device context: {}",
                    ffmpeg_next::Error::from(result)
                ),
            ));
        }

        Ok(Self {
            reference: BufferReference { ptr: context },
            device,
        })
    }

    pub(crate) fn device(&self) -> HardwareDeviceType {
        self.device
    }

    pub(crate) fn new_reference(&self) -> *mut AVBufferRef {
        self.reference.new_reference()
    }
}

/// A pool of hardware surfaces shared between the decoder output and the
/// filter graph's source.
pub(crate) struct HardwareFramesContext {
    reference: BufferReference,
}

impl HardwareFramesContext {
    /// Take a reference to the pool a decoded frame was allocated from.
    pub(crate) fn from_frame_pool(pool: *mut AVBufferRef) -> Option<Self> {
        BufferReference::share(pool).map(|reference| Self { reference })
    }

    /// Allocate a new pool on `device` for surfaces of `hardware_format`
    /// backed by `software_format` data.
    pub(crate) fn allocate(
        device: &HardwareDeviceContext,
        hardware_format: Pixel,
        software_format: Pixel,
        width: u32,
        height: u32,
        pool_size: u32,
    ) -> Result<Self, PipelineError> {
        let mut device_reference = device.new_reference();
        let frames = unsafe { ffmpeg_sys_next::av_hwframe_ctx_alloc(device_reference) };
        unsafe { ffmpeg_sys_next::av_buffer_unref(&mut device_reference) };
        if frames.is_null() {
            return Err(PipelineError::decode(
                DecodeErrorKind::ContextInitFailed,
                "Failed to allocate hardware frames context",
            ));
        }
        let reference = BufferReference { ptr: frames };

        let result = unsafe {
            let pool = (*reference.ptr).data as *mut AVHWFramesContext;
            (*pool).format = AVPixelFormat::from(hardware_format);
            (*pool).sw_format = AVPixelFormat::from(software_format);
            (*pool).width = width as i32;
            (*pool).height = height as i32;
            (*pool).initial_pool_size = pool_size as i32;
            ffmpeg_sys_next::av_hwframe_ctx_init(reference.ptr)
        };
        if result < 0 {
            return Err(PipelineError::decode(
                DecodeErrorKind::ContextInitFailed,
                format!(
                    "Failed to initialise hardware frames context ({hardware_format:?} over {software_format:?}): {}",
                    ffmpeg_next::Error::from(result)
                ),
            ));
        }

        log::debug!(
            "Allocated hardware frame pool {hardware_format:?}/{software_format:?} {width}x{height} (initial size {pool_size})"
        );

        Ok(Self { reference })
    }

    pub(crate) fn as_ptr(&self) -> *mut AVBufferRef {
        self.reference.ptr
    }

    pub(crate) fn new_reference(&self) -> *mut AVBufferRef {
        self.reference.new_reference()
    }
}

/// Returns `true` when frames in `format` live in device memory.
pub fn is_hardware_pixel_format(format: Pixel) -> bool {
    if format == Pixel::None {
        return false;
    }
    let descriptor = unsafe { ffmpeg_sys_next::av_pix_fmt_desc_get(AVPixelFormat::from(format)) };
    !descriptor.is_null() && unsafe { (*descriptor).flags } & AV_PIX_FMT_FLAG_HWACCEL as u64 != 0
}

/// Device types `codec` can decode on through a device context, in the
/// codec's order of preference.
pub(crate) fn codec_hardware_devices(codec: &Codec) -> Vec<HardwareDeviceType> {
    let codec_ptr = unsafe { codec.as_ptr() };
    let mut devices = Vec::new();
    if codec_ptr.is_null() {
        return devices;
    }

    let mut index: i32 = 0;
    loop {
        let config: *const AVCodecHWConfig =
            unsafe { ffmpeg_sys_next::avcodec_get_hw_config(codec_ptr, index) };
        if config.is_null() {
            break;
        }

        let methods = unsafe { (*config).methods };
        if methods & (AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32) != 0 {
            let device_type = unsafe { (*config).device_type };
            if let Some(device) = HardwareDeviceType::from_av_hw_device_type(device_type)
                && !devices.contains(&device)
            {
                devices.push(device);
            }
        }

        index += 1;
    }

    devices
}

/// Install the hardware surface negotiation callback on an unopened codec
/// context, and attach `device` to it.
pub(crate) fn attach_device(context: *mut AVCodecContext, device: &HardwareDeviceContext) {
    unsafe {
        (*context).hw_device_ctx = device.new_reference();
        (*context).get_format = Some(negotiate_hardware_format);
    }
}

/// Pick the decoder output format for a decoder bound to `device`.
///
/// The device's own surface format wins when offered. Otherwise
/// `drm_prime`, then `nv12`. `None` leaves the choice to FFmpeg.
pub fn preferred_surface_format(
    offered: &[Pixel],
    device: Option<HardwareDeviceType>,
) -> Option<Pixel> {
    let bound = device.map(HardwareDeviceType::surface_format);
    bound
        .into_iter()
        .chain([Pixel::from(AVPixelFormat::AV_PIX_FMT_DRM_PRIME), Pixel::NV12])
        .find(|format| offered.contains(format))
}

/// Device type of the context attached to an opened codec context.
unsafe fn bound_device(context: *const AVCodecContext) -> Option<HardwareDeviceType> {
    unsafe {
        let reference = (*context).hw_device_ctx;
        if reference.is_null() || (*reference).data.is_null() {
            return None;
        }
        let device = (*reference).data as *const AVHWDeviceContext;
        HardwareDeviceType::from_av_hw_device_type((*device).type_)
    }
}

/// Decoder `get_format` callback. See [`preferred_surface_format`].
unsafe extern "C" fn negotiate_hardware_format(
    context: *mut AVCodecContext,
    formats: *const AVPixelFormat,
) -> AVPixelFormat {
    let mut offered = Vec::new();
    let mut cursor = formats;
    unsafe {
        while !cursor.is_null() && *cursor != AVPixelFormat::AV_PIX_FMT_NONE {
            offered.push(Pixel::from(*cursor));
            cursor = cursor.add(1);
        }
    }

    let device = unsafe { bound_device(context) };
    match preferred_surface_format(&offered, device) {
        Some(format) => {
            log::debug!("Negotiated decoder surface format {format:?}");
            AVPixelFormat::from(format)
        }
        None => {
            log::warn!(
                "Decoder offered no surface format usable on {}; using FFmpeg's default",
                device.map_or("the bound device".to_string(), |device| device.to_string())
            );
            unsafe { ffmpeg_sys_next::avcodec_default_get_format(context, formats) }
        }
    }
}

/// Host-side surface layout used when a pool must be allocated by hand:
/// `p010le` for streams deeper than 8 bits, `nv12` otherwise.
pub(crate) fn software_surface_format(bits_per_raw_sample: u32) -> Pixel {
    if bits_per_raw_sample > 8 {
        Pixel::P010LE
    } else {
        Pixel::NV12
    }
}
