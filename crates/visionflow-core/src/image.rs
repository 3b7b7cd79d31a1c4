//! Owned pixel buffers with checked geometry.

use crate::{CoreError, Rect};

/// Sample layout of an [`Image`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single luminance channel.
    Gray,
    /// Interleaved red/green/blue, 3 bytes per pixel.
    Rgb,
}

impl PixelFormat {
    /// Bytes per pixel for this layout.
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
        }
    }
}

/// Decoded pixel buffer in row-major order.
///
/// The buffer length is always exactly `width * height * channels`; the
/// constructor rejects anything else, so indexing arithmetic downstream can
/// rely on the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Image {
    /// Constructs a validated image from an existing buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] for zero dimensions,
    /// [`CoreError::DimensionOverflow`] when the byte count overflows, and
    /// [`CoreError::InvalidImageShape`] when the buffer length is not
    /// exactly `width * height * channels`.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let expected = required_len(width, height, format)?;
        if data.len() != expected {
            return Err(CoreError::InvalidImageShape {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Constructs an image filled with a single sample value.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] or [`CoreError::DimensionOverflow`]
    /// for invalid geometry.
    pub fn filled(
        width: u32,
        height: u32,
        format: PixelFormat,
        value: u8,
    ) -> Result<Self, CoreError> {
        let len = required_len(width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            data: vec![value; len],
        })
    }

    /// Constructs a solid RGB image from one color.
    ///
    /// # Errors
    /// Returns [`CoreError`] for invalid geometry.
    pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, CoreError> {
        let len = required_len(width, height, PixelFormat::Rgb)?;
        let mut data = vec![0_u8; len];
        for pixel in data.chunks_exact_mut(3) {
            pixel.copy_from_slice(&rgb);
        }
        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgb,
            data,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Total byte cost of the backing buffer.
    pub fn byte_cost(&self) -> usize {
        self.data.len()
    }

    /// Read-only view of the backing buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the backing buffer.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the image and returns the backing buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Byte offset of pixel `(x, y)`.
    ///
    /// Callers must keep `x < width` and `y < height`; the offset itself is
    /// always in range for valid coordinates.
    pub fn pixel_offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels()
    }

    /// One image row as a byte slice.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.channels();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Extracts `region` into a new owned image.
    ///
    /// # Errors
    /// Returns [`CoreError::RegionOutOfBounds`] unless the region is valid
    /// and lies fully inside the image.
    pub fn crop(&self, region: &Rect) -> Result<Image, CoreError> {
        if !region.is_valid(Some((self.width, self.height))) {
            return Err(CoreError::RegionOutOfBounds {
                region: region.to_string(),
                width: self.width,
                height: self.height,
            });
        }

        let channels = self.channels();
        let row_len = region.width as usize * channels;
        let mut data = Vec::with_capacity(region.height as usize * row_len);

        for y in region.y..region.y2() {
            let start = self.pixel_offset(region.x as u32, y as u32);
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Image::new(region.width as u32, region.height as u32, self.format, data)
    }
}

fn required_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::EmptyImage { width, height });
    }

    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(format.channels()))
        .ok_or(CoreError::DimensionOverflow { width, height })
}
