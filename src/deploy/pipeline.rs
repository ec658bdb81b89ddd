// ABOUTME: Ordered deployment stages over a shared context.
// ABOUTME: Stops at the first failing stage and reports which one it was.

use async_trait::async_trait;

use super::error::DeployError;
use crate::error::Result;

/// One named step of a deployment pipeline.
#[async_trait]
pub trait Stage<C: Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &C) -> Result<()>;
}

/// Stages run in insertion order; a failure skips everything after it.
pub struct Pipeline<'s, C> {
    stages: Vec<Box<dyn Stage<C> + 's>>,
}

impl<'s, C: Sync> Pipeline<'s, C> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn stage(mut self, stage: impl Stage<C> + 's) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &C) -> std::result::Result<(), DeployError> {
        for stage in &self.stages {
            let name = stage.name();
            tracing::info!(stage = name, "starting stage");

            if let Err(e) = stage.run(ctx).await {
                tracing::warn!(stage = name, error = %e, "stage failed");
                return Err(DeployError::new(name, e));
            }
        }
        Ok(())
    }
}

impl<C: Sync> Default for Pipeline<'_, C> {
    fn default() -> Self {
        Self::new()
    }
}
