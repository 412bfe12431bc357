//! Turns a validated [`TransformRequest`] into the concrete list of
//! artifacts to generate.
//!
//! Everything a tool does is decided here: which pixel operations run in
//! which order, the output encoding, the storage key and whether the key
//! gets a signed URL. The controller only executes the resulting [`Plan`].

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use ::image::ImageError;
use thiserror::Error;

use crate::image::SourceImage;
use crate::processor::{Extend, Op, OutputFormat, ResizeContain, ResizeCover};

mod naming;
mod profiles;
mod request;

pub use naming::KeyStamp;
pub use profiles::{
    Tool,
    ToolProfile,
    CONVERT_FORMATS,
    FAVICON_CANVAS_SIZE,
    FAVICON_FONT_SIZE,
    FAVICON_ICON_SIZE,
};
pub use request::{ResizeType, TransformRequest};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported target format: {0:?}")]
    UnsupportedFormat(String),

    #[error("scaling {width}x{height} by {percent_w}% x {percent_h}% leaves an empty axis")]
    EmptyAxis {
        width: u32,
        height: u32,
        percent_w: u32,
        percent_h: u32,
    },

    #[error("no output sizes were requested")]
    NoSizes,

    #[error("a {width}x{height} image exceeds the output limits of {limits}")]
    TooLarge {
        width: u32,
        height: u32,
        limits: OutputLimits,
    },

    #[error("more than one artifact would be stored as {0:?}")]
    DuplicateKey(String),

    #[error("failed to inspect the source image: {0}")]
    Inspect(#[from] ImageError),
}

/// Upper bounds on the images a request may read or produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutputLimits {
    /// The longest allowed side in pixels.
    pub max_dimension: u32,

    /// The largest allowed `width * height`.
    pub max_pixels: u64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_dimension: 16_384,
            max_pixels: 50_000_000,
        }
    }
}

impl OutputLimits {
    #[inline]
    pub fn allows(&self, width: u32, height: u32) -> bool {
        width <= self.max_dimension
            && height <= self.max_dimension
            && width as u64 * height as u64 <= self.max_pixels
    }

    pub fn check(&self, width: u32, height: u32) -> Result<(), ResolveError> {
        if self.allows(width, height) {
            Ok(())
        } else {
            Err(ResolveError::TooLarge {
                width,
                height,
                limits: *self,
            })
        }
    }
}

impl Display for OutputLimits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pixels per side and {} pixels in total",
            self.max_dimension, self.max_pixels,
        )
    }
}

/// The image every derivative of a spec is produced from.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseImage {
    /// The n-th uploaded file of the request.
    Source(usize),

    /// A canvas rendered from scratch.
    Canvas(CanvasSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSpec {
    pub size: u32,
    pub background: String,
    pub label: Option<TextLabel>,
}

/// Text centred on a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub color: String,
    pub font_size: u32,
}

/// What an artifact is to the response that lists it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArtifactRole {
    /// The only artifact of a single output tool, or one per file in bulk.
    Primary,

    /// One member of a multi size bitmap set.
    Bitmap(u32),

    /// The `.ico` entry of an icon set.
    Icon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    /// Index into `Plan::bases`.
    pub base: usize,

    /// Applied in order.
    pub operations: Vec<Op>,

    pub format: OutputFormat,

    /// Encoder quality, ignored by lossless formats.
    pub quality: u8,

    /// The storage key.
    pub file_name: String,

    /// Mint a signed URL once published.
    pub sign: bool,

    pub role: ArtifactRole,

    /// The client side name of the source file, bulk requests only.
    pub original_name: Option<String>,
}

/// Everything required to run one request.
#[derive(Debug)]
pub struct Plan {
    pub tool: Tool,
    pub sources: Vec<SourceImage>,
    pub bases: Vec<BaseImage>,
    pub specs: Vec<TransformSpec>,
}

impl Plan {
    fn from_source(tool: Tool, source: SourceImage, specs: Vec<TransformSpec>) -> Self {
        Self {
            tool,
            sources: vec![source],
            bases: vec![BaseImage::Source(0)],
            specs,
        }
    }
}

/// Resolves the request into its plan.
///
/// The only I/O performed is reading the header of every source,
/// nothing is decoded.
pub fn resolve(
    request: TransformRequest,
    stamp: &KeyStamp,
    default_quality: u8,
    limits: OutputLimits,
) -> Result<Plan, ResolveError> {
    let tool = request.tool();
    let profile = tool.profile();
    // Only `convert` leaves the format to the request.
    let format = profile.format.unwrap_or(OutputFormat::Png);

    let plan = match request {
        TransformRequest::Resize {
            source,
            width,
            height,
            resize_type,
        } => {
            let operation = match resize_type {
                ResizeType::Pixels => {
                    limits.check(width, height)?;
                    Op::from(ResizeCover { width, height })
                },
                ResizeType::Percentage => {
                    let (src_width, src_height) = source.dimensions()?;
                    let target_width = scale_percent(src_width, width);
                    let target_height = scale_percent(src_height, height);

                    if target_width == 0 || target_height == 0 {
                        return Err(ResolveError::EmptyAxis {
                            width: src_width,
                            height: src_height,
                            percent_w: width,
                            percent_h: height,
                        });
                    }

                    limits.check(target_width, target_height)?;
                    Op::from(ResizeCover {
                        width: target_width,
                        height: target_height,
                    })
                },
                ResizeType::Ratio => {
                    limits.check(width, height)?;
                    Op::from(ResizeContain { width, height })
                },
            };

            let spec = TransformSpec {
                base: 0,
                operations: vec![operation],
                format,
                quality: default_quality,
                file_name: stamp.file_name(profile.prefix, None, None, format.extension()),
                sign: profile.signs_urls,
                role: ArtifactRole::Primary,
                original_name: None,
            };

            Plan::from_source(tool, source, vec![spec])
        },
        TransformRequest::BulkResize {
            sources,
            width,
            height,
        } => {
            limits.check(width, height)?;

            let mut bases = Vec::with_capacity(sources.len());
            let mut specs = Vec::with_capacity(sources.len());
            let mut taken = HashSet::with_capacity(sources.len());

            for (index, source) in sources.iter().enumerate() {
                let original_name = source.name().unwrap_or("file").to_string();

                // Uploads sharing a name are told apart by a counter in front of the name.
                let mut file_name = stamp.file_name(
                    profile.prefix,
                    Some(&original_name),
                    None,
                    format.extension(),
                );
                let mut attempt = 1;
                while !taken.insert(file_name.clone()) {
                    attempt += 1;
                    file_name = stamp.file_name(
                        profile.prefix,
                        Some(&format!("{}-{}", attempt, original_name)),
                        None,
                        format.extension(),
                    );
                }

                bases.push(BaseImage::Source(index));
                specs.push(TransformSpec {
                    base: index,
                    operations: vec![ResizeContain { width, height }.into()],
                    format,
                    quality: default_quality,
                    file_name,
                    sign: profile.signs_urls,
                    role: ArtifactRole::Primary,
                    original_name: Some(original_name),
                });
            }

            Plan {
                tool,
                sources,
                bases,
                specs,
            }
        },
        TransformRequest::Compress { source, quality } => {
            let spec = TransformSpec {
                base: 0,
                operations: vec![],
                format,
                quality,
                file_name: stamp.file_name(profile.prefix, None, None, format.extension()),
                sign: profile.signs_urls,
                role: ArtifactRole::Primary,
                original_name: None,
            };

            Plan::from_source(tool, source, vec![spec])
        },
        TransformRequest::Convert { source, format } => {
            let target = format
                .parse::<OutputFormat>()
                .ok()
                .filter(|f| CONVERT_FORMATS.contains(f))
                .ok_or(ResolveError::UnsupportedFormat(format))?;

            let spec = TransformSpec {
                base: 0,
                operations: vec![],
                format: target,
                quality: default_quality,
                file_name: stamp.file_name(profile.prefix, None, None, target.extension()),
                sign: profile.signs_urls,
                role: ArtifactRole::Primary,
                original_name: None,
            };

            Plan::from_source(tool, source, vec![spec])
        },
        TransformRequest::IconConvert { source, sizes } => {
            let primary = sizes.first().copied().ok_or(ResolveError::NoSizes)?;
            for &size in sizes.iter() {
                limits.check(size, size)?;
            }
            let specs = icon_set(
                profile,
                stamp,
                format,
                &sizes,
                primary,
            );

            Plan::from_source(tool, source, specs)
        },
        TransformRequest::IconEdit {
            source,
            size,
            background,
        } => {
            limits.check(size, size)?;

            // Zero margins on every side, the extend never grows the image.
            let spec = TransformSpec {
                base: 0,
                operations: vec![
                    ResizeCover { width: size, height: size }.into(),
                    Extend::uniform(0, background).into(),
                ],
                format,
                quality: default_quality,
                file_name: stamp.file_name(profile.prefix, None, None, format.extension()),
                sign: profile.signs_urls,
                role: ArtifactRole::Primary,
                original_name: None,
            };

            Plan::from_source(tool, source, vec![spec])
        },
        TransformRequest::FaviconGenerate {
            source,
            text,
            background,
            text_color,
        } => {
            let specs = icon_set(
                profile,
                stamp,
                format,
                profile.fixed_sizes,
                FAVICON_ICON_SIZE,
            );

            match source {
                Some(source) => Plan::from_source(tool, source, specs),
                None => {
                    let label = text.filter(|t| !t.is_empty()).map(|text| TextLabel {
                        text,
                        color: text_color,
                        font_size: FAVICON_FONT_SIZE,
                    });

                    Plan {
                        tool,
                        sources: vec![],
                        bases: vec![BaseImage::Canvas(CanvasSpec {
                            size: FAVICON_CANVAS_SIZE,
                            background,
                            label,
                        })],
                        specs,
                    }
                },
            }
        },
    };

    for source in plan.sources.iter() {
        let (width, height) = source.dimensions()?;
        limits.check(width, height)?;
    }

    let mut keys = HashSet::with_capacity(plan.specs.len());
    for spec in plan.specs.iter() {
        if !keys.insert(spec.file_name.as_str()) {
            return Err(ResolveError::DuplicateKey(spec.file_name.clone()));
        }
    }

    Ok(plan)
}

/// One square bitmap per size followed by the `.ico` entry.
fn icon_set(
    profile: ToolProfile,
    stamp: &KeyStamp,
    format: OutputFormat,
    sizes: &[u32],
    icon_size: u32,
) -> Vec<TransformSpec> {
    let mut specs: Vec<TransformSpec> = sizes
        .iter()
        .map(|&size| TransformSpec {
            base: 0,
            operations: vec![ResizeCover { width: size, height: size }.into()],
            format,
            quality: 100,
            file_name: stamp.file_name(profile.prefix, None, Some(size), format.extension()),
            sign: profile.signs_urls,
            role: ArtifactRole::Bitmap(size),
            original_name: None,
        })
        .collect();

    specs.push(TransformSpec {
        base: 0,
        operations: vec![ResizeCover {
            width: icon_size,
            height: icon_size,
        }
        .into()],
        format: OutputFormat::Ico,
        quality: 100,
        file_name: stamp.file_name(profile.prefix, None, None, OutputFormat::Ico.extension()),
        sign: profile.signs_urls,
        role: ArtifactRole::Icon,
        original_name: None,
    });

    specs
}

#[inline]
fn scale_percent(dimension: u32, percent: u32) -> u32 {
    (dimension as f64 * percent as f64 / 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ::image::{DynamicImage, ImageOutputFormat, RgbaImage};

    use super::profiles::FAVICON_SIZES;
    use super::*;

    fn png_source(name: &str, width: u32, height: u32) -> SourceImage {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut buff = Cursor::new(Vec::new());
        img.write_to(&mut buff, ImageOutputFormat::Png).unwrap();
        SourceImage::new(Some(name.to_string()), buff.into_inner())
    }

    fn stamp() -> KeyStamp {
        KeyStamp::at(1000, false)
    }

    #[test]
    fn test_pixels_resize_is_exact() {
        let plan = resolve(
            TransformRequest::Resize {
                source: png_source("a.png", 10, 10),
                width: 30,
                height: 20,
                resize_type: ResizeType::Pixels,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(plan.specs.len(), 1);
        let spec = &plan.specs[0];
        assert_eq!(spec.operations, vec![Op::from(ResizeCover { width: 30, height: 20 })]);
        assert_eq!(spec.format, OutputFormat::Webp);
        assert_eq!(spec.file_name, "resized-1000.webp");
        assert!(spec.sign);
    }

    #[test]
    fn test_percentage_resize_reads_intrinsic_dimensions() {
        let plan = resolve(
            TransformRequest::Resize {
                source: png_source("a.png", 200, 101),
                width: 50,
                height: 25,
                resize_type: ResizeType::Percentage,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        // 101 * 0.25 = 25.25
        assert_eq!(
            plan.specs[0].operations,
            vec![Op::from(ResizeCover { width: 100, height: 25 })],
        );
    }

    #[test]
    fn test_percentage_resize_to_nothing_is_rejected() {
        let result = resolve(
            TransformRequest::Resize {
                source: png_source("a.png", 4, 4),
                width: 1,
                height: 1,
                resize_type: ResizeType::Percentage,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        );

        assert!(matches!(result, Err(ResolveError::EmptyAxis { .. })));
    }

    #[test]
    fn test_ratio_resize_contains() {
        let plan = resolve(
            TransformRequest::Resize {
                source: png_source("a.png", 10, 10),
                width: 30,
                height: 20,
                resize_type: ResizeType::Ratio,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(
            plan.specs[0].operations,
            vec![Op::from(ResizeContain { width: 30, height: 20 })],
        );
    }

    #[test]
    fn test_bulk_resize_keeps_input_order() {
        let plan = resolve(
            TransformRequest::BulkResize {
                sources: vec![png_source("b.png", 4, 4), png_source("a.jpg", 4, 4)],
                width: 16,
                height: 16,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        let names: Vec<_> = plan.specs.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, ["bulk-resized-1000-b.png.webp", "bulk-resized-1000-a.jpg.webp"]);
        assert_eq!(plan.specs[1].base, 1);
        assert_eq!(plan.specs[1].original_name.as_deref(), Some("a.jpg"));
        assert!(plan.specs.iter().all(|s| s.sign));
    }

    #[test]
    fn test_compress_only_reencodes() {
        let plan = resolve(
            TransformRequest::Compress {
                source: png_source("a.png", 4, 4),
                quality: 35,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        let spec = &plan.specs[0];
        assert!(spec.operations.is_empty());
        assert_eq!(spec.quality, 35);
        assert_eq!(spec.format, OutputFormat::Webp);
        assert!(!spec.sign);
    }

    #[test]
    fn test_convert_rejects_unsupported_format() {
        let result = resolve(
            TransformRequest::Convert {
                source: png_source("a.png", 4, 4),
                format: "gif".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        );
        assert!(matches!(result, Err(ResolveError::UnsupportedFormat(f)) if f == "gif"));

        let result = resolve(
            TransformRequest::Convert {
                source: png_source("a.png", 4, 4),
                format: "ico".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        );
        assert!(matches!(result, Err(ResolveError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_convert_names_by_target() {
        let plan = resolve(
            TransformRequest::Convert {
                source: png_source("a.png", 4, 4),
                format: "jpeg".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(plan.specs[0].format, OutputFormat::Jpeg);
        assert_eq!(plan.specs[0].file_name, "converted-1000.jpeg");
    }

    #[test]
    fn test_icon_convert_fans_out_per_size() {
        let plan = resolve(
            TransformRequest::IconConvert {
                source: png_source("a.png", 64, 64),
                sizes: vec![16, 32, 48],
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(plan.specs.len(), 4);
        let roles: Vec<_> = plan.specs.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            [
                ArtifactRole::Bitmap(16),
                ArtifactRole::Bitmap(32),
                ArtifactRole::Bitmap(48),
                ArtifactRole::Icon,
            ],
        );

        let icon = &plan.specs[3];
        assert_eq!(icon.format, OutputFormat::Ico);
        assert_eq!(icon.file_name, "icon-1000.ico");
        assert_eq!(icon.operations, vec![Op::from(ResizeCover { width: 16, height: 16 })]);
        assert_eq!(plan.specs[2].file_name, "icon-1000-48.png");
    }

    #[test]
    fn test_icon_edit_extends_by_nothing() {
        let plan = resolve(
            TransformRequest::IconEdit {
                source: png_source("a.png", 64, 64),
                size: 24,
                background: "#ff0000".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(
            plan.specs[0].operations,
            vec![
                Op::from(ResizeCover { width: 24, height: 24 }),
                Op::from(Extend::uniform(0, "#ff0000".to_string())),
            ],
        );
        assert_eq!(plan.specs[0].file_name, "icon-1000.png");
    }

    #[test]
    fn test_favicon_without_file_uses_canvas() {
        let plan = resolve(
            TransformRequest::FaviconGenerate {
                source: None,
                text: Some("A".to_string()),
                background: "#ffffff".to_string(),
                text_color: "#000000".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert!(plan.sources.is_empty());
        assert_eq!(
            plan.bases,
            vec![BaseImage::Canvas(CanvasSpec {
                size: 256,
                background: "#ffffff".to_string(),
                label: Some(TextLabel {
                    text: "A".to_string(),
                    color: "#000000".to_string(),
                    font_size: 128,
                }),
            })],
        );

        assert_eq!(plan.specs.len(), 7);
        let icon = plan.specs.last().unwrap();
        assert_eq!(icon.role, ArtifactRole::Icon);
        assert_eq!(icon.operations, vec![Op::from(ResizeCover { width: 32, height: 32 })]);
        assert_eq!(icon.file_name, "favicon-1000.ico");
    }

    #[test]
    fn test_favicon_with_file_ignores_text() {
        let plan = resolve(
            TransformRequest::FaviconGenerate {
                source: Some(png_source("logo.png", 64, 64)),
                text: Some("A".to_string()),
                background: "#ffffff".to_string(),
                text_color: "#000000".to_string(),
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        assert_eq!(plan.bases, vec![BaseImage::Source(0)]);
        assert_eq!(plan.specs.len(), FAVICON_SIZES.len() + 1);
    }

    #[test]
    fn test_percentage_resize_beyond_limits_is_rejected() {
        let result = resolve(
            TransformRequest::Resize {
                source: png_source("a.png", 10, 10),
                width: 4_000_000_000,
                height: 100,
                resize_type: ResizeType::Percentage,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        );

        assert!(matches!(result, Err(ResolveError::TooLarge { height: 10, .. })));
    }

    #[test]
    fn test_limits_cover_sides_and_area() {
        let limits = OutputLimits {
            max_dimension: 100,
            max_pixels: 5_000,
        };

        assert!(limits.allows(100, 50));
        assert!(!limits.allows(101, 1));
        assert!(!limits.allows(100, 51));
        assert!(limits.check(10, 10).is_ok());
    }

    #[test]
    fn test_oversized_source_is_rejected() {
        let limits = OutputLimits {
            max_dimension: 32,
            max_pixels: 1_024,
        };

        let result = resolve(
            TransformRequest::Compress {
                source: png_source("wide.png", 64, 1),
                quality: 50,
            },
            &stamp(),
            80,
            limits,
        );

        assert!(matches!(result, Err(ResolveError::TooLarge { width: 64, height: 1, .. })));
    }

    #[test]
    fn test_bulk_resize_with_repeated_names_gets_distinct_keys() {
        let plan = resolve(
            TransformRequest::BulkResize {
                sources: vec![
                    png_source("a.png", 4, 4),
                    png_source("a.png", 4, 4),
                    png_source("2-a.png", 4, 4),
                ],
                width: 16,
                height: 16,
            },
            &stamp(),
            80,
            OutputLimits::default(),
        )
        .unwrap();

        let names: Vec<_> = plan.specs.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "bulk-resized-1000-a.png.webp",
                "bulk-resized-1000-2-a.png.webp",
                "bulk-resized-1000-2-2-a.png.webp",
            ],
        );

        let originals: Vec<_> = plan
            .specs
            .iter()
            .map(|s| s.original_name.as_deref())
            .collect();
        assert_eq!(originals, [Some("a.png"), Some("a.png"), Some("2-a.png")]);
    }

    #[test]
    fn test_repeated_icon_sizes_are_rejected() {
        let result = resolve(
            TransformRequest::IconConvert {
                source: png_source("a.png", 64, 64),
                sizes: vec![16, 32, 16],
            },
            &stamp(),
            80,
            OutputLimits::default(),
        );

        assert!(matches!(result, Err(ResolveError::DuplicateKey(key)) if key == "icon-1000-16.png"));
    }
}
