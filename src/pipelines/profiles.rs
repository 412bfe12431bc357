use strum::{Display, EnumString};

use crate::processor::OutputFormat;

/// The bitmap sizes every favicon bundle is rendered at.
pub const FAVICON_SIZES: &[u32] = &[16, 32, 48, 64, 128, 256];

/// The side length of the synthetic favicon canvas.
pub const FAVICON_CANVAS_SIZE: u32 = 256;

/// The font size the favicon text label is rendered at.
pub const FAVICON_FONT_SIZE: u32 = 128;

/// The side length of the `.ico` entry of a favicon bundle.
pub const FAVICON_ICON_SIZE: u32 = 32;

/// The formats the convert tool accepts.
pub const CONVERT_FORMATS: &[OutputFormat] =
    &[OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Webp];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Tool {
    Resize,
    BulkResize,
    Compress,
    Convert,
    IconConvert,
    IconEdit,
    FaviconGenerate,
}

/// The fixed, per tool, parts of artifact generation.
#[derive(Debug, Copy, Clone)]
pub struct ToolProfile {
    /// The first segment of every storage key the tool produces.
    pub prefix: &'static str,

    /// The encoding of the tool's main artifacts.
    ///
    /// `None` when the request picks it.
    pub format: Option<OutputFormat>,

    /// If a signed URL is minted for every published artifact.
    pub signs_urls: bool,

    /// The bitmap sizes rendered regardless of the request.
    pub fixed_sizes: &'static [u32],

    /// The generic message returned when the tool fails.
    pub failure_message: &'static str,
}

impl Tool {
    pub const fn profile(self) -> ToolProfile {
        match self {
            Self::Resize => ToolProfile {
                prefix: "resized",
                format: Some(OutputFormat::Webp),
                signs_urls: true,
                fixed_sizes: &[],
                failure_message: "Error processing image",
            },
            Self::BulkResize => ToolProfile {
                prefix: "bulk-resized",
                format: Some(OutputFormat::Webp),
                signs_urls: true,
                fixed_sizes: &[],
                failure_message: "Error processing images",
            },
            Self::Compress => ToolProfile {
                prefix: "compressed",
                format: Some(OutputFormat::Webp),
                signs_urls: false,
                fixed_sizes: &[],
                failure_message: "Error processing image",
            },
            Self::Convert => ToolProfile {
                prefix: "converted",
                format: None,
                signs_urls: false,
                fixed_sizes: &[],
                failure_message: "Error processing image",
            },
            Self::IconConvert => ToolProfile {
                prefix: "icon",
                format: Some(OutputFormat::Png),
                signs_urls: false,
                fixed_sizes: &[],
                failure_message: "Error processing image",
            },
            Self::IconEdit => ToolProfile {
                prefix: "icon",
                format: Some(OutputFormat::Png),
                signs_urls: false,
                fixed_sizes: &[],
                failure_message: "Error processing image",
            },
            Self::FaviconGenerate => ToolProfile {
                prefix: "favicon",
                format: Some(OutputFormat::Png),
                signs_urls: false,
                fixed_sizes: FAVICON_SIZES,
                failure_message: "Error processing image",
            },
        }
    }
}
