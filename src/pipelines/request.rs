use strum::{Display, EnumString};

use crate::image::SourceImage;
use crate::pipelines::Tool;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResizeType {
    /// Resize to exactly the given width and height.
    Pixels,

    /// Width and height are percentages of the source dimensions.
    Percentage,

    /// Fit inside the given width and height keeping the aspect ratio.
    Ratio,
}

/// A validated request for one of the tools.
#[derive(Debug)]
pub enum TransformRequest {
    Resize {
        source: SourceImage,
        width: u32,
        height: u32,
        resize_type: ResizeType,
    },
    BulkResize {
        sources: Vec<SourceImage>,
        width: u32,
        height: u32,
    },
    Compress {
        source: SourceImage,
        quality: u8,
    },
    Convert {
        source: SourceImage,
        /// Left unparsed, unsupported formats are a resolution error.
        format: String,
    },
    IconConvert {
        source: SourceImage,
        sizes: Vec<u32>,
    },
    IconEdit {
        source: SourceImage,
        size: u32,
        background: String,
    },
    FaviconGenerate {
        source: Option<SourceImage>,
        text: Option<String>,
        background: String,
        text_color: String,
    },
}

impl TransformRequest {
    pub fn tool(&self) -> Tool {
        match self {
            Self::Resize { .. } => Tool::Resize,
            Self::BulkResize { .. } => Tool::BulkResize,
            Self::Compress { .. } => Tool::Compress,
            Self::Convert { .. } => Tool::Convert,
            Self::IconConvert { .. } => Tool::IconConvert,
            Self::IconEdit { .. } => Tool::IconEdit,
            Self::FaviconGenerate { .. } => Tool::FaviconGenerate,
        }
    }
}
