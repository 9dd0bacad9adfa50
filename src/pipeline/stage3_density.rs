use anyhow::{Context, Result};
use tracing::info;

use crate::ctx::{Ctx, density_column};
use crate::pipeline::Stage;
use crate::spatial::density::append_density_column;

pub struct Stage3Density;

impl Stage3Density {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage3Density {
    fn name(&self) -> &'static str {
        "stage3_density"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let pattern = ctx.plan.covariate_pattern.clone();
        let column = density_column(&pattern);
        let Ctx {
            collection,
            config,
            engines,
            ..
        } = ctx;
        let collection = collection
            .as_mut()
            .context("sample collection not loaded")?;
        append_density_column(collection, &pattern, &column, config, engines.smoother.as_ref())
            .with_context(|| format!("failed to smooth pattern '{}'", pattern))?;

        let fields = collection.fields(&column)?;
        let mean_bandwidth =
            fields.iter().map(|f| f.bandwidth()).sum::<f64>() / fields.len().max(1) as f64;
        info!(
            column = %column,
            samples = fields.len(),
            resolution = config.resolution,
            mean_bandwidth,
            "density_ready"
        );
        Ok(())
    }
}
