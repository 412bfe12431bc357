use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::instrument;
use tracing_futures::Instrument;

use crate::error::ToolError;
use crate::pipelines::{resolve, ArtifactRole, KeyStamp, OutputLimits, Plan, TransformRequest};
use crate::processor::{generate_async, load_base_async};
use crate::storage::{PublishedResult, Publisher};
use crate::StorageBackend;

/// Tunables taken from the runtime config.
#[derive(Debug, Copy, Clone)]
pub struct ControllerOptions {
    pub default_quality: u8,
    pub unique_keys: bool,
    pub limits: OutputLimits,
}

/// One published artifact along with what it is to the response.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub role: ArtifactRole,
    pub original_name: Option<String>,
    pub published: PublishedResult,
}

/// Runs requests end to end: resolve, generate and publish.
pub struct TransformController {
    options: ControllerOptions,
    publisher: Publisher,
    global_limiter: Option<Arc<Semaphore>>,
}

impl TransformController {
    pub fn new(
        options: ControllerOptions,
        storage: Arc<dyn StorageBackend>,
        global_limiter: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            options,
            publisher: Publisher::new(storage),
            global_limiter,
        }
    }

    /// The bounds every request is checked against.
    #[inline]
    pub fn limits(&self) -> OutputLimits {
        self.options.limits
    }

    /// Resolves and executes the request.
    ///
    /// Outcomes are in the order the specs were resolved.
    pub async fn run(&self, request: TransformRequest) -> Result<Vec<Outcome>, ToolError> {
        let stamp = KeyStamp::now(self.options.unique_keys);
        let plan = resolve(
            request,
            &stamp,
            self.options.default_quality,
            self.options.limits,
        )?;
        Ok(self.execute(plan).await?)
    }

    /// Executes every spec of the plan concurrently.
    ///
    /// Each base is decoded once and shared read-only between its specs,
    /// the first failing spec fails the whole plan.
    #[instrument(
        name = "execute",
        skip(self, plan),
        fields(tool = %plan.tool, artifacts = plan.specs.len()),
    )]
    pub async fn execute(&self, plan: Plan) -> anyhow::Result<Vec<Outcome>> {
        let Plan {
            sources,
            bases,
            specs,
            ..
        } = plan;
        let sources = Arc::new(sources);

        let bases = try_join_all(
            bases
                .into_iter()
                .map(|base| load_base_async(base, sources.clone())),
        )
        .await?;

        let chains = specs.into_iter().map(|spec| {
            let base = bases.get(spec.base).cloned();
            let publisher = self.publisher.clone();
            let limiter = self.global_limiter.clone();
            let span = info_span!("artifact", name = %spec.file_name);

            async move {
                let role = spec.role;
                let original_name = spec.original_name.clone();
                let sign = spec.sign;
                let base = base
                    .ok_or_else(|| anyhow::anyhow!("spec refers to missing base {}", spec.base))?;

                let artifact = match limiter {
                    Some(limiter) => {
                        let _permit = limiter.acquire_owned().await?;
                        generate_async(base, spec).await?
                    },
                    None => generate_async(base, spec).await?,
                };

                let published = publisher.publish(artifact, sign).await?;

                Ok::<_, anyhow::Error>(Outcome {
                    role,
                    original_name,
                    published,
                })
            }
            .instrument(span)
        });

        let outcomes = try_join_all(chains).await?;
        info!("Published {} artifacts", outcomes.len());

        Ok(outcomes)
    }
}
