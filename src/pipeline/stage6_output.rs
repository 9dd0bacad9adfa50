use anyhow::Result;
use tracing::info;

use crate::ctx::Ctx;
use crate::io::json_writer::{build_report, write_json};
use crate::io::tsv_writer::{write_coefficients_tsv, write_intensity_tsv};
use crate::pipeline::Stage;

pub struct Stage6Output;

impl Stage6Output {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage6Output {
    fn name(&self) -> &'static str {
        "stage6_output"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let report = build_report(ctx)?;

        if ctx.write_json {
            write_json(&ctx.output.json_path, &report)?;
            info!(path = %ctx.output.json_path.display(), "json_written");
        }
        if ctx.write_tsv {
            write_intensity_tsv(&ctx.output.intensity_tsv_path, &report.intensities)?;
            let models: Vec<_> = ctx
                .group_model
                .iter()
                .chain(ctx.cross_model.iter())
                .collect();
            write_coefficients_tsv(&ctx.output.coefficients_tsv_path, &models)?;
            info!(
                intensity = %ctx.output.intensity_tsv_path.display(),
                coefficients = %ctx.output.coefficients_tsv_path.display(),
                "tsv_written"
            );
        }

        ctx.report = report;
        Ok(())
    }
}
