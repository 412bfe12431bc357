use std::sync::Arc;

use poem_openapi::payload::Json;
use poem_openapi::types::multipart::Upload;
use poem_openapi::{Multipart, OpenApi};

use crate::controller::{Outcome, TransformController};
use crate::error::ToolError;
use crate::image::SourceImage;
use crate::pipelines::{ArtifactRole, OutputLimits, ResizeType, Tool, TransformRequest};
use crate::response::{
    failure,
    BulkResizeEntry,
    BulkResizeResponse,
    BulkResizeResult,
    FileResponse,
    FileResult,
    IconSetResponse,
    IconSetResult,
    ResizeResponse,
    ResizeResult,
};
use crate::storage::PublishedResult;

#[derive(Multipart)]
pub struct ResizePayload {
    file: Option<Upload>,
    width: Option<String>,
    height: Option<String>,
    /// One of `pixels`, `percentage` or `ratio`.
    #[oai(rename = "resizeType")]
    resize_type: Option<String>,
}

#[derive(Multipart)]
pub struct BulkResizePayload {
    files: Vec<Upload>,
    width: Option<String>,
    height: Option<String>,
}

#[derive(Multipart)]
pub struct CompressPayload {
    file: Option<Upload>,
    /// From 1 to 100 inclusive.
    quality: Option<String>,
}

#[derive(Multipart)]
pub struct ConvertPayload {
    file: Option<Upload>,
    /// One of `png`, `jpeg` or `webp`.
    format: Option<String>,
}

#[derive(Multipart)]
pub struct IconConvertPayload {
    file: Option<Upload>,
    /// A JSON array of square sizes, e.g. `[16, 32, 48]`.
    sizes: Option<String>,
}

#[derive(Multipart)]
pub struct IconEditPayload {
    file: Option<Upload>,
    size: Option<String>,
    #[oai(rename = "backgroundColor")]
    background_color: Option<String>,
}

#[derive(Multipart)]
pub struct FaviconPayload {
    file: Option<Upload>,
    /// Rendered on a blank canvas when no file is given.
    text: Option<String>,
    #[oai(rename = "backgroundColor")]
    background_color: Option<String>,
    #[oai(rename = "textColor")]
    text_color: Option<String>,
}

pub struct ImageToolsApi {
    controller: Arc<TransformController>,
}

impl ImageToolsApi {
    pub fn new(controller: Arc<TransformController>) -> Self {
        Self { controller }
    }
}

#[OpenApi]
impl ImageToolsApi {
    /// Resize an image
    ///
    /// Resizes to exact pixels, to a percentage of the original or to fit
    /// inside a box, and returns a signed URL to the WebP result.
    #[oai(path = "/resize", method = "post")]
    pub async fn resize(&self, payload: ResizePayload) -> ResizeResponse {
        match resize(&self.controller, payload).await {
            Ok(result) => ResizeResponse::Ok(Json(result)),
            Err(e) => failure(Tool::Resize, e),
        }
    }

    /// Resize many images
    ///
    /// Fits every uploaded file inside the same box.
    #[oai(path = "/bulk-resize", method = "post")]
    pub async fn bulk_resize(&self, payload: BulkResizePayload) -> BulkResizeResponse {
        match bulk_resize(&self.controller, payload).await {
            Ok(result) => BulkResizeResponse::Ok(Json(result)),
            Err(e) => failure(Tool::BulkResize, e),
        }
    }

    /// Compress an image
    ///
    /// Re-encodes as WebP at the given quality.
    #[oai(path = "/compress", method = "post")]
    pub async fn compress(&self, payload: CompressPayload) -> FileResponse {
        match compress(&self.controller, payload).await {
            Ok(result) => FileResponse::Ok(Json(result)),
            Err(e) => failure(Tool::Compress, e),
        }
    }

    /// Convert an image
    #[oai(path = "/convert", method = "post")]
    pub async fn convert(&self, payload: ConvertPayload) -> FileResponse {
        match convert(&self.controller, payload).await {
            Ok(result) => FileResponse::Ok(Json(result)),
            Err(e) => failure(Tool::Convert, e),
        }
    }

    /// Convert an image to an icon set
    ///
    /// Produces one PNG per requested size and an `.ico` at the first size.
    #[oai(path = "/icon-converter", method = "post")]
    pub async fn icon_convert(&self, payload: IconConvertPayload) -> IconSetResponse {
        match icon_convert(&self.controller, payload).await {
            Ok(result) => IconSetResponse::Ok(Json(result)),
            Err(e) => failure(Tool::IconConvert, e),
        }
    }

    /// Create a square icon
    #[oai(path = "/icon-editor", method = "post")]
    pub async fn icon_edit(&self, payload: IconEditPayload) -> FileResponse {
        match icon_edit(&self.controller, payload).await {
            Ok(result) => FileResponse::Ok(Json(result)),
            Err(e) => failure(Tool::IconEdit, e),
        }
    }

    /// Generate a favicon bundle
    ///
    /// Uses the uploaded file, or renders the text on a 256x256 canvas
    /// when there is none.
    #[oai(path = "/favicon-generator", method = "post")]
    pub async fn favicon_generate(&self, payload: FaviconPayload) -> IconSetResponse {
        match favicon_generate(&self.controller, payload).await {
            Ok(result) => IconSetResponse::Ok(Json(result)),
            Err(e) => failure(Tool::FaviconGenerate, e),
        }
    }
}

async fn resize(
    controller: &TransformController,
    payload: ResizePayload,
) -> Result<ResizeResult, ToolError> {
    let width = required_number(payload.width, "width")?;
    let height = required_number(payload.height, "height")?;
    let resize_type = required_text(payload.resize_type, "resizeType")?
        .parse::<ResizeType>()
        .map_err(|_| ToolError::invalid("resizeType", "expected pixels, percentage or ratio"))?;
    // Percentages are checked once the source dimensions are known.
    if resize_type != ResizeType::Percentage {
        bounded(controller.limits(), ("width", width), ("height", height))?;
    }
    let source = required_file(payload.file, "file").await?;

    let outcomes = controller
        .run(TransformRequest::Resize {
            source,
            width,
            height,
            resize_type,
        })
        .await?;

    let published = single(outcomes)?;
    Ok(ResizeResult {
        success: true,
        signed_url: signed_url(&published)?,
        file_name: published.file_name,
    })
}

async fn bulk_resize(
    controller: &TransformController,
    payload: BulkResizePayload,
) -> Result<BulkResizeResult, ToolError> {
    let width = required_number(payload.width, "width")?;
    let height = required_number(payload.height, "height")?;
    bounded(controller.limits(), ("width", width), ("height", height))?;
    if payload.files.is_empty() {
        return Err(ToolError::missing("files"));
    }

    let mut sources = Vec::with_capacity(payload.files.len());
    for upload in payload.files {
        sources.push(required_file(Some(upload), "files").await?);
    }

    let outcomes = controller
        .run(TransformRequest::BulkResize {
            sources,
            width,
            height,
        })
        .await?;

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        results.push(BulkResizeEntry {
            original_name: outcome.original_name.clone().unwrap_or_default(),
            signed_url: signed_url(&outcome.published)?,
            resized_name: outcome.published.file_name,
        });
    }

    Ok(BulkResizeResult {
        success: true,
        results,
    })
}

async fn compress(
    controller: &TransformController,
    payload: CompressPayload,
) -> Result<FileResult, ToolError> {
    let quality = required_number(payload.quality, "quality")?;
    if quality > 100 {
        return Err(ToolError::invalid("quality", "expected a value from 1 to 100"));
    }
    let source = required_file(payload.file, "file").await?;

    let outcomes = controller
        .run(TransformRequest::Compress {
            source,
            quality: quality as u8,
        })
        .await?;

    Ok(FileResult {
        success: true,
        file_name: single(outcomes)?.file_name,
    })
}

async fn convert(
    controller: &TransformController,
    payload: ConvertPayload,
) -> Result<FileResult, ToolError> {
    let format = required_text(payload.format, "format")?;
    let source = required_file(payload.file, "file").await?;

    let outcomes = controller
        .run(TransformRequest::Convert { source, format })
        .await?;

    Ok(FileResult {
        success: true,
        file_name: single(outcomes)?.file_name,
    })
}

async fn icon_convert(
    controller: &TransformController,
    payload: IconConvertPayload,
) -> Result<IconSetResult, ToolError> {
    let raw = required_text(payload.sizes, "sizes")?;
    let sizes: Vec<u32> = serde_json::from_str(&raw)
        .map_err(|_| ToolError::invalid("sizes", "expected a JSON array of positive integers"))?;
    if sizes.is_empty() {
        return Err(ToolError::missing("sizes"));
    }
    if sizes.contains(&0) {
        return Err(ToolError::invalid("sizes", "sizes must be positive"));
    }
    for (index, size) in sizes.iter().enumerate() {
        if sizes[..index].contains(size) {
            return Err(ToolError::invalid("sizes", format!("{} is listed more than once", size)));
        }
        bounded(controller.limits(), ("sizes", *size), ("sizes", *size))?;
    }
    let source = required_file(payload.file, "file").await?;

    let outcomes = controller
        .run(TransformRequest::IconConvert { source, sizes })
        .await?;

    icon_set(outcomes)
}

async fn icon_edit(
    controller: &TransformController,
    payload: IconEditPayload,
) -> Result<FileResult, ToolError> {
    let size = required_number(payload.size, "size")?;
    bounded(controller.limits(), ("size", size), ("size", size))?;
    let background = required_text(payload.background_color, "backgroundColor")?;
    let source = required_file(payload.file, "file").await?;

    let outcomes = controller
        .run(TransformRequest::IconEdit {
            source,
            size,
            background,
        })
        .await?;

    Ok(FileResult {
        success: true,
        file_name: single(outcomes)?.file_name,
    })
}

async fn favicon_generate(
    controller: &TransformController,
    payload: FaviconPayload,
) -> Result<IconSetResult, ToolError> {
    let text = payload.text.filter(|t| !t.trim().is_empty());
    let source = optional_file(payload.file).await?;
    if source.is_none() && text.is_none() {
        return Err(ToolError::missing("file or text"));
    }
    let background = required_text(payload.background_color, "backgroundColor")?;
    let text_color = required_text(payload.text_color, "textColor")?;

    let outcomes = controller
        .run(TransformRequest::FaviconGenerate {
            source,
            text,
            background,
            text_color,
        })
        .await?;

    icon_set(outcomes)
}

/// Parses a positive base 10 integer field.
fn required_number(value: Option<String>, field: &str) -> Result<u32, ToolError> {
    let raw = required_text(value, field)?;
    let number: u32 = raw
        .parse()
        .map_err(|_| ToolError::invalid(field, "expected a positive integer"))?;

    if number == 0 {
        return Err(ToolError::invalid(field, "expected a positive integer"));
    }

    Ok(number)
}

/// Rejects output dimensions beyond the configured limits.
fn bounded(
    limits: OutputLimits,
    (width_field, width): (&str, u32),
    (height_field, height): (&str, u32),
) -> Result<(), ToolError> {
    if width > limits.max_dimension {
        return Err(ToolError::invalid(
            width_field,
            format!("must not exceed {}", limits.max_dimension),
        ));
    }

    if height > limits.max_dimension {
        return Err(ToolError::invalid(
            height_field,
            format!("must not exceed {}", limits.max_dimension),
        ));
    }

    if !limits.allows(width, height) {
        return Err(ToolError::invalid(
            width_field,
            format!("{}x{} exceeds {} pixels in total", width, height, limits.max_pixels),
        ));
    }

    Ok(())
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ToolError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ToolError::missing(field))
}

async fn required_file(upload: Option<Upload>, field: &str) -> Result<SourceImage, ToolError> {
    optional_file(upload)
        .await?
        .ok_or_else(|| ToolError::missing(field))
}

/// Reads the upload, browsers send an empty part when no file was picked.
async fn optional_file(upload: Option<Upload>) -> Result<Option<SourceImage>, ToolError> {
    let upload = match upload {
        Some(upload) => upload,
        None => return Ok(None),
    };

    let name = upload.file_name().map(ToString::to_string);
    let data = upload
        .into_vec()
        .await
        .map_err(|e| ToolError::Processing(e.into()))?;

    let source = SourceImage::new(name, data);
    if source.is_empty() {
        Ok(None)
    } else {
        Ok(Some(source))
    }
}

fn single(outcomes: Vec<Outcome>) -> Result<PublishedResult, ToolError> {
    outcomes
        .into_iter()
        .next()
        .map(|outcome| outcome.published)
        .ok_or_else(|| ToolError::Processing(anyhow::anyhow!("no artifact was produced")))
}

fn signed_url(published: &PublishedResult) -> Result<String, ToolError> {
    published.signed_url.clone().ok_or_else(|| {
        ToolError::Processing(anyhow::anyhow!(
            "artifact {} was published without a signed URL",
            published.file_name,
        ))
    })
}

fn icon_set(outcomes: Vec<Outcome>) -> Result<IconSetResult, ToolError> {
    let mut ico_file_name = None;
    let mut png_file_names = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        match outcome.role {
            ArtifactRole::Icon => ico_file_name = Some(outcome.published.file_name),
            ArtifactRole::Bitmap(_) | ArtifactRole::Primary => {
                png_file_names.push(outcome.published.file_name)
            },
        }
    }

    let ico_file_name = ico_file_name
        .ok_or_else(|| ToolError::Processing(anyhow::anyhow!("icon set has no .ico entry")))?;

    Ok(IconSetResult {
        success: true,
        ico_file_name,
        png_file_names,
    })
}
