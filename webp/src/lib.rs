use std::borrow::Cow;
use std::fmt::{Debug, Error, Formatter};
use std::ops::Deref;

use image::DynamicImage;
use libwebp_sys::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    RGB,
    RGBA,
}

/// Raised when libwebp refuses to encode the given pixels.
///
/// libwebp does not report a reason, only a zero length output,
/// this is usually caused by dimensions above 16383px.
#[derive(Debug)]
pub struct EncodingError {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "libwebp failed to encode a {}x{} image", self.width, self.height)
    }
}

impl std::error::Error for EncodingError {}

pub struct Encoder<'a> {
    layout: PixelLayout,
    image: Cow<'a, [u8]>,
    width: u32,
    height: u32,
}

impl<'a> Encoder<'a> {
    /// Creates a new encoder from the given image.
    ///
    /// RGB8 and RGBA8 images are borrowed as-is, every other
    /// colour type is converted to RGBA8 first.
    pub fn from_image(image: &'a DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(image) => {
                Self::from_rgb(image.as_ref(), image.width(), image.height())
            },
            DynamicImage::ImageRgba8(image) => {
                Self::from_rgba(image.as_ref(), image.width(), image.height())
            },
            other => {
                let converted = other.to_rgba8();
                let (width, height) = converted.dimensions();
                Self {
                    image: Cow::Owned(converted.into_raw()),
                    width,
                    height,
                    layout: PixelLayout::RGBA,
                }
            },
        }
    }

    /// Creates a new encoder from the given image data in the RGB pixel layout.
    pub fn from_rgb(image: &'a [u8], width: u32, height: u32) -> Self {
        Self { image: Cow::Borrowed(image), width, height, layout: PixelLayout::RGB }
    }

    /// Creates a new encoder from the given image data in the RGBA pixel layout.
    pub fn from_rgba(image: &'a [u8], width: u32, height: u32) -> Self {
        Self { image: Cow::Borrowed(image), width, height, layout: PixelLayout::RGBA }
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Encode the image with the given quality.
    /// The image quality must be between 0.0 and 100.0 inclusive for minimal
    /// and maximal quality respectively.
    pub fn encode(&self, quality: f32) -> Result<WebPMemory, EncodingError> {
        let quality = quality.clamp(0.0, 100.0);
        unsafe { encode(&self.image, self.layout, self.width, self.height, quality) }
            .ok_or(EncodingError { width: self.width, height: self.height })
    }

    /// Encode the image losslessly.
    pub fn encode_lossless(&self) -> Result<WebPMemory, EncodingError> {
        unsafe { encode(&self.image, self.layout, self.width, self.height, -1.0) }
            .ok_or(EncodingError { width: self.width, height: self.height })
    }
}

unsafe fn encode(
    image: &[u8],
    layout: PixelLayout,
    width: u32,
    height: u32,
    quality: f32,
) -> Option<WebPMemory> {
    let width = width as _;
    let height = height as _;
    let mut buffer = std::ptr::null_mut::<u8>();

    let len = match layout {
        PixelLayout::RGB if quality < 0.0 => {
            let stride = width * 3;
            WebPEncodeLosslessRGB(image.as_ptr(), width, height, stride, &mut buffer as *mut _)
        },
        PixelLayout::RGB => {
            let stride = width * 3;
            WebPEncodeRGB(image.as_ptr(), width, height, stride, quality, &mut buffer as *mut _)
        },
        PixelLayout::RGBA if quality < 0.0 => {
            let stride = width * 4;
            WebPEncodeLosslessRGBA(image.as_ptr(), width, height, stride, &mut buffer as *mut _)
        },
        PixelLayout::RGBA => {
            let stride = width * 4;
            WebPEncodeRGBA(image.as_ptr(), width, height, stride, quality, &mut buffer as *mut _)
        },
    };

    if len == 0 || buffer.is_null() {
        if !buffer.is_null() {
            WebPFree(buffer as _);
        }
        return None;
    }

    Some(WebPMemory(buffer, len))
}

/// This struct represents a safe wrapper around memory owned by libwebp.
/// Its data contents can be accessed through the Deref trait.
pub struct WebPMemory(pub(crate) *mut u8, pub(crate) usize);

// The buffer is exclusively owned and only freed on drop.
unsafe impl Send for WebPMemory {}

impl Debug for WebPMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_struct("WebpMemory").field("len", &self.1).finish()
    }
}

impl Drop for WebPMemory {
    fn drop(&mut self) {
        unsafe { WebPFree(self.0 as _) }
    }
}

impl Deref for WebPMemory {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.0, self.1) }
    }
}
