use anyhow::{Result, bail};
use tracing::info;

use crate::ctx::Ctx;
use crate::io::dataset::{LoadOptions, load_collection};
use crate::pipeline::Stage;
use crate::table::ColumnKind;

pub struct Stage1Load;

impl Stage1Load {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage1Load {
    fn name(&self) -> &'static str {
        "stage1_load"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let mut required = vec![ctx.plan.response_pattern.clone()];
        if ctx.plan.covariate_pattern != ctx.plan.response_pattern {
            required.push(ctx.plan.covariate_pattern.clone());
        }
        let options = LoadOptions {
            required_patterns: required,
        };
        let collection = load_collection(&ctx.input, &options)?;

        for column in ctx
            .plan
            .group_covariates
            .iter()
            .chain(ctx.plan.variance_covariates.iter())
            .chain(ctx.plan.cross_factors.iter())
        {
            match collection.column_kind(column) {
                Some(ColumnKind::Factor) | Some(ColumnKind::Scalar) => {}
                Some(kind) => bail!("covariate '{}' is a {} column", column, kind),
                None => bail!("covariate '{}' not found in {}", column, ctx.input.display()),
            }
        }

        let patterns = collection.names_of_kind(ColumnKind::Pattern);
        let factors = collection.names_of_kind(ColumnKind::Factor);
        info!(
            samples = collection.len(),
            patterns = %patterns.join(","),
            factors = %factors.join(","),
            "collection_ready"
        );
        ctx.report.input.path = ctx.input.display().to_string();
        ctx.report.input.samples = collection.len() as u64;
        ctx.report.input.patterns = patterns;
        ctx.report.input.factors = factors;
        ctx.collection = Some(collection);
        Ok(())
    }
}
