use enum_dispatch::enum_dispatch;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use super::canvas::parse_color;

/// The filter used by every resize.
const FILTER: FilterType = FilterType::Lanczos3;

/// A single pixel operation.
///
/// Operations never touch their input, every call produces a new image
/// so many specs can run against one shared decoded source.
#[enum_dispatch]
pub trait Operation {
    fn apply(&self, img: &DynamicImage) -> anyhow::Result<DynamicImage>;
}

/// Operations are dynamically selected here.
#[enum_dispatch(Operation)]
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ResizeCover,
    ResizeContain,
    Extend,
}

/// Scales to cover the box then crops the overflow around the centre,
/// the output is always exactly `width`x`height`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResizeCover {
    pub width: u32,
    pub height: u32,
}

impl Operation for ResizeCover {
    fn apply(&self, img: &DynamicImage) -> anyhow::Result<DynamicImage> {
        if img.width() == self.width && img.height() == self.height {
            return Ok(img.clone());
        }

        Ok(img.resize_to_fill(self.width, self.height, FILTER))
    }
}

/// Scales to fit inside the box keeping the aspect ratio, nothing is cropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResizeContain {
    pub width: u32,
    pub height: u32,
}

impl Operation for ResizeContain {
    fn apply(&self, img: &DynamicImage) -> anyhow::Result<DynamicImage> {
        Ok(img.resize(self.width, self.height, FILTER))
    }
}

/// Pads each edge by the given amount of pixels filled with `background`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extend {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    pub background: String,
}

impl Extend {
    pub fn uniform(margin: u32, background: String) -> Self {
        Self {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
            background,
        }
    }
}

impl Operation for Extend {
    fn apply(&self, img: &DynamicImage) -> anyhow::Result<DynamicImage> {
        let background = parse_color(&self.background)?;

        let width = img.width() + self.left + self.right;
        let height = img.height() + self.top + self.bottom;
        let mut canvas = RgbaImage::from_pixel(width, height, background);

        // Copied rather than blended, transparent source pixels stay transparent.
        imageops::replace(&mut canvas, &img.to_rgba8(), self.left as i64, self.top as i64);

        Ok(DynamicImage::ImageRgba8(canvas))
    }
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgba};

    use super::*;

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255])))
    }

    #[test]
    fn test_cover_is_exact() {
        let out = ResizeCover { width: 30, height: 7 }.apply(&image(100, 50)).unwrap();
        assert_eq!(out.dimensions(), (30, 7));
    }

    #[test]
    fn test_contain_keeps_aspect_ratio() {
        let out = ResizeContain { width: 50, height: 50 }.apply(&image(200, 100)).unwrap();
        assert_eq!(out.dimensions(), (50, 25));

        let out = ResizeContain { width: 40, height: 300 }.apply(&image(100, 200)).unwrap();
        assert_eq!(out.dimensions(), (40, 80));
    }

    #[test]
    fn test_zero_extend_is_a_no_op() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 0])));
        let out = Extend::uniform(0, "#ff0000".to_string()).apply(&src).unwrap();

        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.to_rgba8(), src.to_rgba8());
    }

    #[test]
    fn test_extend_pads_with_background() {
        let out = Extend {
            top: 1,
            bottom: 0,
            left: 2,
            right: 0,
            background: "#00ff00".to_string(),
        }
        .apply(&image(4, 4))
        .unwrap();

        assert_eq!(out.dimensions(), (6, 5));
        assert_eq!(out.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(out.get_pixel(2, 1), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_extend_with_bad_colour_fails() {
        let result = Extend::uniform(0, "not-a-colour".to_string()).apply(&image(2, 2));
        assert!(result.is_err());
    }

    #[test]
    fn test_source_is_untouched() {
        let src = image(64, 64);
        let op: Op = ResizeCover { width: 8, height: 8 }.into();
        let _ = op.apply(&src).unwrap();

        assert_eq!(src.dimensions(), (64, 64));
    }
}
