use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use tokio::sync::oneshot;

use crate::image::SourceImage;
use crate::pipelines::{BaseImage, TransformSpec};

mod canvas;
mod encoder;
mod resizer;

pub use canvas::render_canvas;
pub use encoder::{encode_to, OutputFormat};
pub use resizer::{Extend, Op, Operation, ResizeContain, ResizeCover};

/// One encoded output image ready to be published.
#[derive(Debug)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Applies the spec's operations to `base` and encodes the result.
///
/// `base` is only ever read.
pub fn generate(base: &DynamicImage, spec: &TransformSpec) -> anyhow::Result<Artifact> {
    let mut img = Cow::Borrowed(base);
    for operation in spec.operations.iter() {
        img = Cow::Owned(operation.apply(&img)?);
    }

    let data = encode_to(&img, spec.format, spec.quality)?;

    Ok(Artifact {
        file_name: spec.file_name.clone(),
        content_type: spec.format.content_type(),
        data,
        width: img.width(),
        height: img.height(),
    })
}

/// Produces the image a set of specs derive from.
pub fn load_base(base: &BaseImage, sources: &[SourceImage]) -> anyhow::Result<DynamicImage> {
    match base {
        BaseImage::Source(index) => {
            let source = sources
                .get(*index)
                .ok_or_else(|| anyhow::anyhow!("no source image at index {}", index))?;

            Ok(source.decode()?)
        },
        BaseImage::Canvas(spec) => render_canvas(spec),
    }
}

/// Runs `generate` on the rayon pool.
pub async fn generate_async(
    base: Arc<DynamicImage>,
    spec: TransformSpec,
) -> anyhow::Result<Artifact> {
    spawn_cpu(move || generate(&base, &spec)).await
}

/// Runs `load_base` on the rayon pool.
pub async fn load_base_async(
    base: BaseImage,
    sources: Arc<Vec<SourceImage>>,
) -> anyhow::Result<Arc<DynamicImage>> {
    spawn_cpu(move || load_base(&base, &sources).map(Arc::new)).await
}

async fn spawn_cpu<T, F>(func: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    rayon::spawn(move || {
        // The receiver is gone if the request was dropped.
        let _ = tx.send(func());
    });

    rx.await?
}
