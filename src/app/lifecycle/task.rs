use anyhow::{Context, Error};
use async_trait::async_trait;
use tracing::{Instrument, Span, debug};

/// One step of a startup or shutdown sequence
#[async_trait]
pub trait LifecycleTask<C: Send + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, context: &C) -> Result<(), Error>;
}

/// Ordered tasks run against a shared context, stopping at the
/// first failure. The whole run executes under the span produced
/// by the span provider
pub struct Lifecycle<C: Send + Sync> {
    tasks: Vec<Box<dyn LifecycleTask<C>>>,
    span_provider: Box<dyn Fn() -> Span + Send + Sync>,
}

impl<C: Send + Sync> Lifecycle<C> {
    pub fn new<F>(span_provider: F) -> Self
    where
        F: Fn() -> Span + Send + Sync + 'static,
    {
        Lifecycle {
            tasks: Vec::new(),
            span_provider: Box::new(span_provider),
        }
    }

    pub fn with(mut self, task: Box<dyn LifecycleTask<C>>) -> Self {
        self.tasks.push(task);
        self
    }

    pub async fn run(&self, context: &C) -> Result<(), Error> {
        let span = (self.span_provider)();

        async {
            for task in &self.tasks {
                debug!("Running lifecycle task {}", task.name());

                task.run(context)
                    .await
                    .with_context(|| format!("lifecycle task {} failed", task.name()))?;
            }

            Ok(())
        }
        .instrument(span)
        .await
    }
}
