use anyhow::{Context, Result};
use tracing::info;

use crate::ctx::{Ctx, density_column};
use crate::model::cache::{CacheOutcome, fit_or_load};
use crate::model::{CrossPatternSpec, fit_cross_pattern_model};
use crate::pipeline::Stage;

pub struct Stage5CrossModel;

impl Stage5CrossModel {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage5CrossModel {
    fn name(&self) -> &'static str {
        "stage5_cross_model"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let spec = CrossPatternSpec::new(
            ctx.plan.response_pattern.clone(),
            density_column(&ctx.plan.covariate_pattern),
        )
        .with_factors(ctx.plan.cross_factors.clone());
        let model_id = spec.model_id();

        let (model, outcome) = {
            let collection = ctx.collection()?;
            let config = &ctx.config;
            let fitter = ctx.engines.point_process.as_ref();
            fit_or_load(
                &ctx.output.model_cache_dir,
                &model_id,
                config.model_cache_policy,
                || fit_cross_pattern_model(collection, &spec, config, fitter),
            )
            .with_context(|| format!("cross-pattern model '{}' failed", model_id))?
        };

        if let Some(effect) = model.coefficient(&spec.covariate_field) {
            let (ratio, lower, upper) = effect.rate_ratio();
            info!(
                model = %model_id,
                cached = outcome == CacheOutcome::Loaded,
                estimate = effect.estimate,
                rate_ratio = ratio,
                rate_ratio_lower = lower,
                rate_ratio_upper = upper,
                "cross_model_ready"
            );
        }
        ctx.cross_model = Some(model);
        ctx.cross_model_source = Some(outcome);
        Ok(())
    }
}
