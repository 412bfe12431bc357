use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat};
use strum::{Display, EnumString};

/// The largest side an `.ico` entry can have.
const MAX_ICON_SIZE: u32 = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Ico,
}

impl OutputFormat {
    #[inline]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Ico => "ico",
        }
    }

    #[inline]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Ico => "image/x-icon",
        }
    }
}

/// Encodes the image, `quality` (1 - 100) only applies to JPEG and WebP.
pub fn encode_to(img: &DynamicImage, format: OutputFormat, quality: u8) -> anyhow::Result<Bytes> {
    match format {
        OutputFormat::Webp => {
            let encoded = webp::Encoder::from_image(img).encode(quality as f32)?;
            Ok(Bytes::copy_from_slice(&encoded))
        },
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let flattened = DynamicImage::ImageRgb8(img.to_rgb8());
            write(&flattened, ImageOutputFormat::Jpeg(quality))
        },
        OutputFormat::Png => write(img, ImageOutputFormat::Png),
        OutputFormat::Ico => {
            if img.width() > MAX_ICON_SIZE || img.height() > MAX_ICON_SIZE {
                return Err(anyhow::anyhow!(
                    "icon entries cannot exceed {}x{}, got {}x{}",
                    MAX_ICON_SIZE,
                    MAX_ICON_SIZE,
                    img.width(),
                    img.height(),
                ));
            }

            write(img, ImageOutputFormat::Ico)
        },
    }
}

#[inline]
fn write(img: &DynamicImage, format: ImageOutputFormat) -> anyhow::Result<Bytes> {
    let mut buff = Cursor::new(Vec::new());
    img.write_to(&mut buff, format)?;
    Ok(Bytes::from(buff.into_inner()))
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn image(size: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba([200, 10, 10, 255])))
    }

    #[test]
    fn test_every_format_is_decodable() {
        for (format, expected) in [
            (OutputFormat::Png, ImageFormat::Png),
            (OutputFormat::Jpeg, ImageFormat::Jpeg),
            (OutputFormat::Webp, ImageFormat::WebP),
            (OutputFormat::Ico, ImageFormat::Ico),
        ] {
            let encoded = encode_to(&image(32), format, 80).unwrap();
            assert_eq!(image::guess_format(&encoded).unwrap(), expected, "{}", format);

            let decoded = image::load_from_memory(&encoded).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 32));
        }
    }

    #[test]
    fn test_oversized_icon_is_rejected() {
        assert!(encode_to(&image(257), OutputFormat::Ico, 100).is_err());
        assert!(encode_to(&image(256), OutputFormat::Ico, 100).is_ok());
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(128, 128, |x, y| {
            image::Rgb([(x * 2) as u8, (y * 2) as u8, ((x ^ y) & 0xff) as u8])
        }));

        let high = encode_to(&img, OutputFormat::Webp, 95).unwrap();
        let low = encode_to(&img, OutputFormat::Webp, 5).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_parse_and_mime() {
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Ico.content_type(), "image/x-icon");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
    }
}
