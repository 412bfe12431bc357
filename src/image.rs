use std::fmt::{Debug, Formatter};
use std::io::Cursor;

use bytes::Bytes;
use image::io::Reader;
use image::{DynamicImage, ImageResult};
use once_cell::sync::OnceCell;

/// An uploaded file, still in its encoded form.
///
/// The pixels are only decoded when a spec needs them,
/// the dimensions can be read from the header alone.
pub struct SourceImage {
    name: Option<String>,
    data: Bytes,
    dimensions: OnceCell<(u32, u32)>,
}

impl SourceImage {
    pub fn new(name: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name,
            data: data.into(),
            dimensions: OnceCell::new(),
        }
    }

    /// The file name the client uploaded the image with.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The intrinsic width and height of the image.
    pub fn dimensions(&self) -> ImageResult<(u32, u32)> {
        self.dimensions
            .get_or_try_init(|| {
                Reader::new(Cursor::new(self.data.as_ref()))
                    .with_guessed_format()?
                    .into_dimensions()
            })
            .copied()
    }

    pub fn decode(&self) -> ImageResult<DynamicImage> {
        let img = Reader::new(Cursor::new(self.data.as_ref()))
            .with_guessed_format()?
            .decode()?;

        let _ = self.dimensions.set((img.width(), img.height()));

        Ok(img)
    }
}

impl Debug for SourceImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}
