//! Host frames to flat pixel buffers.
//!
//! The filter graph hands out frames whose rows may be padded for
//! alignment. [`PixelBufferAdapter`] exposes each frame as one contiguous
//! run of `width × height × bytes_per_pixel` bytes: the frame's own plane
//! when its rows are already tightly packed, otherwise a compacted copy in a
//! buffer the adapter reuses from frame to frame.
//!
//! An [`OutputFrame`] borrows from the pipeline, so the borrow checker
//! rejects holding one across the next
//! [`Pipeline::next_frame`](crate::Pipeline::next_frame) call. Use
//! [`OutputFrame::to_owned_frame`] to keep a frame around.

use std::slice;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;
use crate::error::PipelineError;
use crate::frame::HostFrame;
use crate::metadata::{FrameMetadata, FrameTime};

/// Copy `height` rows of `row_bytes` each out of `data`, whose rows start
/// `stride` bytes apart, into `output` (which is cleared first).
///
/// # Errors
///
/// Returns [`PipelineError::Runtime`] if `stride` is shorter than a row or
/// `data` is too small for the declared shape.
pub fn compact_rows(
    data: &[u8],
    stride: usize,
    row_bytes: usize,
    height: usize,
    output: &mut Vec<u8>,
) -> Result<(), PipelineError> {
    if stride < row_bytes {
        return Err(PipelineError::Runtime(format!(
            "Row stride {stride} is shorter than a {row_bytes}-byte row"
        )));
    }
    let required = match height {
        0 => 0,
        rows => (rows - 1) * stride + row_bytes,
    };
    if data.len() < required {
        return Err(PipelineError::Runtime(format!(
            "Plane holds {} bytes, {required} needed for {height} rows",
            data.len()
        )));
    }

    output.clear();
    output.reserve(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        output.extend_from_slice(&data[start..start + row_bytes]);
    }
    Ok(())
}

/// Turns filtered [`HostFrame`]s into contiguous [`OutputFrame`]s.
///
/// Created with the graph's negotiated output shape; frames that do not
/// match it are rejected rather than exposed with a wrong shape.
#[derive(Debug)]
pub struct PixelBufferAdapter {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    buffer: Vec<u8>,
    zero_copy: bool,
}

impl PixelBufferAdapter {
    /// Create an adapter for frames of the given shape.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            buffer: Vec::new(),
            zero_copy: false,
        }
    }

    /// Bytes in one tightly packed row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Total bytes of one adapted frame.
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Expose `frame` as a contiguous buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the frame's shape or layout
    /// differs from the adapter's, or its plane is missing or truncated.
    pub fn adapt<'a>(
        &'a mut self,
        frame: &'a HostFrame,
        metadata: FrameMetadata,
    ) -> Result<OutputFrame<'a>, PipelineError> {
        self.prepare(frame)?;
        Ok(self.view(frame, metadata))
    }

    /// Check `frame` and compact its rows if they are padded.
    pub(crate) fn prepare(&mut self, frame: &HostFrame) -> Result<(), PipelineError> {
        if frame.width() != self.width
            || frame.height() != self.height
            || PixelFormat::from_ffmpeg_pixel(frame.format()) != Some(self.pixel_format)
        {
            return Err(PipelineError::Runtime(format!(
                "Filtered frame is {:?} {}x{}, expected {} {}x{}",
                frame.format(),
                frame.width(),
                frame.height(),
                self.pixel_format,
                self.width,
                self.height,
            )));
        }

        let row_bytes = self.row_bytes();
        let height = self.height as usize;
        let (plane, linesize) = plane_of(frame);
        if plane.is_null() {
            return Err(PipelineError::Runtime(
                "Filtered frame has no pixel data".to_string(),
            ));
        }

        self.zero_copy = linesize > 0 && linesize as usize == row_bytes;
        if self.zero_copy {
            return Ok(());
        }

        if linesize > 0 {
            let stride = linesize as usize;
            let plane_length = match height {
                0 => 0,
                rows => (rows - 1) * stride + row_bytes,
            };
            let data = unsafe { slice::from_raw_parts(plane, plane_length) };
            return compact_rows(data, stride, row_bytes, height, &mut self.buffer);
        }

        // Bottom-up rows (e.g. after `vflip`): each row is contiguous, rows
        // step backwards.
        if linesize.unsigned_abs() < row_bytes {
            return Err(PipelineError::Runtime(format!(
                "Row stride {linesize} is shorter than a {row_bytes}-byte row"
            )));
        }
        self.buffer.clear();
        self.buffer.reserve(row_bytes * height);
        for row in 0..height {
            let row_data =
                unsafe { slice::from_raw_parts(plane.offset(row as isize * linesize), row_bytes) };
            self.buffer.extend_from_slice(row_data);
        }
        Ok(())
    }

    /// View the frame last passed to [`prepare`](PixelBufferAdapter::prepare).
    pub(crate) fn view<'a>(&'a self, frame: &'a HostFrame, metadata: FrameMetadata) -> OutputFrame<'a> {
        let data: &'a [u8] = if self.zero_copy {
            let (plane, _) = plane_of(frame);
            unsafe { slice::from_raw_parts(plane, self.frame_bytes()) }
        } else {
            &self.buffer
        };

        OutputFrame {
            data,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            metadata,
        }
    }
}

fn plane_of(frame: &HostFrame) -> (*const u8, isize) {
    unsafe {
        let raw = frame.as_video_frame().as_ptr();
        ((*raw).data[0] as *const u8, (*raw).linesize[0] as isize)
    }
}

/// One delivered frame, borrowed from the pipeline.
///
/// Rows are tightly packed: [`stride`](OutputFrame::stride) is always
/// `width × bytes_per_pixel` and the buffer is exactly
/// `stride × height` bytes.
#[derive(Debug, Clone, Copy)]
pub struct OutputFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    metadata: FrameMetadata,
}

impl<'a> OutputFrame<'a> {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout of the buffer.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.pixel_format.channels()
    }

    /// The contiguous pixel bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Length of the pixel buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-sized frame.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Per-frame metadata.
    pub fn metadata(&self) -> FrameMetadata {
        self.metadata
    }

    /// Shorthand for `metadata().frame_id`.
    pub fn frame_id(&self) -> u64 {
        self.metadata.frame_id
    }

    /// Shorthand for `metadata().pts`.
    pub fn pts(&self) -> Option<i64> {
        self.metadata.pts
    }

    /// Shorthand for `metadata().time`.
    pub fn time(&self) -> FrameTime {
        self.metadata.time
    }

    /// Copy the pixel bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Copy the frame so it outlives the next pull.
    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            data: self.data.to_vec(),
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            metadata: self.metadata,
        }
    }

    /// Convert to an [`image::DynamicImage`]. BGR-ordered layouts are
    /// swizzled to RGB.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the buffer does not match its
    /// declared shape.
    pub fn to_image(&self) -> Result<DynamicImage, PipelineError> {
        pixels_to_image(self.data, self.width, self.height, self.pixel_format)
    }
}

/// A delivered frame copied out of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    metadata: FrameMetadata,
}

impl OwnedFrame {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout of the buffer.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    /// The contiguous pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Per-frame metadata.
    pub fn metadata(&self) -> FrameMetadata {
        self.metadata
    }

    /// Take the pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Convert to an [`image::DynamicImage`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the buffer does not match its
    /// declared shape.
    pub fn to_image(&self) -> Result<DynamicImage, PipelineError> {
        pixels_to_image(&self.data, self.width, self.height, self.pixel_format)
    }
}

fn pixels_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<DynamicImage, PipelineError> {
    let shape_error = || {
        PipelineError::Runtime(format!(
            "Failed to construct {pixel_format} image from a {}-byte buffer at {width}x{height}",
            data.len()
        ))
    };

    match pixel_format {
        PixelFormat::Rgb24 => RgbImage::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(shape_error),
        PixelFormat::Bgr24 => RgbImage::from_raw(width, height, swizzle(data, 3, [2, 1, 0, 0]))
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(shape_error),
        PixelFormat::Rgba => RgbaImage::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(shape_error),
        PixelFormat::Bgra => RgbaImage::from_raw(width, height, swizzle(data, 4, [2, 1, 0, 3]))
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(shape_error),
        PixelFormat::Argb => RgbaImage::from_raw(width, height, swizzle(data, 4, [1, 2, 3, 0]))
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(shape_error),
        PixelFormat::Abgr => RgbaImage::from_raw(width, height, swizzle(data, 4, [3, 2, 1, 0]))
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(shape_error),
        PixelFormat::Gray8 => GrayImage::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(shape_error),
        PixelFormat::Gray16Le => {
            let samples = data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, samples)
                .map(DynamicImage::ImageLuma16)
                .ok_or_else(shape_error)
        }
    }
}

/// Reorder each `channels`-byte pixel so output byte `i` is input byte
/// `order[i]`.
fn swizzle(data: &[u8], channels: usize, order: [usize; 4]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    for pixel in data.chunks_exact(channels) {
        output.extend(order[..channels].iter().map(|&index| pixel[index]));
    }
    output
}
