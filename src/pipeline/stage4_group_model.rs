use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::ctx::{Ctx, GROUP_MODEL_COLUMN, fitted_column, intensity_column};
use crate::model::cache::{CacheOutcome, fit_or_load};
use crate::model::group::predict_group_means;
use crate::model::{GroupModelSpec, fit_group_model, summarize_groups};
use crate::pipeline::Stage;
use crate::table::{Column, ColumnKind, ModelRef};

pub struct Stage4GroupModel;

impl Stage4GroupModel {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage4GroupModel {
    fn name(&self) -> &'static str {
        "stage4_group_model"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let response = intensity_column(&ctx.plan.response_pattern);

        let mut summaries = Vec::new();
        {
            let collection = ctx.collection()?;
            for covariate in &ctx.plan.group_covariates {
                if collection.column_kind(covariate) == Some(ColumnKind::Factor) {
                    summaries.extend(summarize_groups(collection, &response, covariate)?);
                }
            }
        }
        ctx.group_summaries = summaries;

        if ctx.plan.group_covariates.is_empty() {
            info!("no group covariates; group model skipped");
            return Ok(());
        }

        let spec = GroupModelSpec::new(
            response.clone(),
            ctx.plan.group_covariates.clone(),
            ctx.plan.variance_covariates.clone(),
        );
        let model_id = spec.model_id();
        let (model, outcome) = {
            let collection = ctx.collection()?;
            let config = &ctx.config;
            let fitter = ctx.engines.regression.as_ref();
            fit_or_load(
                &ctx.output.model_cache_dir,
                &model_id,
                config.model_cache_policy,
                || fit_group_model(collection, &spec, config, fitter),
            )
            .with_context(|| format!("group model '{}' failed", model_id))?
        };

        let stale = {
            let collection = ctx.collection()?;
            model
                .snapshot
                .sample_ids
                .iter()
                .any(|id| collection.row_of(id).is_none())
        };
        if outcome == CacheOutcome::Loaded && stale {
            warn!(model = %model_id, "cached group model was fitted on different samples");
            ctx.warnings.push(format!(
                "cached model '{}' references samples absent from the input",
                model_id
            ));
        }

        let fitted = predict_group_means(&model, ctx.collection()?)?;
        let rows = ctx.collection()?.len();
        let fitted_name = fitted_column(&ctx.plan.response_pattern);
        let collection = ctx.collection_mut()?;
        collection.append_column(
            GROUP_MODEL_COLUMN,
            Column::ModelRef(vec![
                ModelRef {
                    model_id: model_id.clone()
                };
                rows
            ]),
        )?;
        collection.append_column(fitted_name, Column::Scalar(fitted))?;

        info!(
            model = %model_id,
            cached = outcome == CacheOutcome::Loaded,
            coefficients = model.coefficients.len(),
            "group_model_ready"
        );
        ctx.group_model = Some(model);
        ctx.group_model_source = Some(outcome);
        Ok(())
    }
}
