use std::path::Path;

use anyhow::{Context, Result};

use crate::ctx::{Ctx, density_column, intensity_column};
use crate::schema::v1::{DensityRow, InputMeta, IntensityRow, PpaReportV1, SCHEMA_VERSION};
use crate::spatial::compute_intensity;
use crate::table::ColumnKind;

pub fn build_report(ctx: &Ctx) -> Result<PpaReportV1> {
    let collection = ctx.collection()?;
    let patterns = collection.names_of_kind(ColumnKind::Pattern);
    let factors = collection.names_of_kind(ColumnKind::Factor);

    let mut intensities = Vec::new();
    let mut density = Vec::new();
    for pattern in &patterns {
        let column = collection.patterns(pattern)?;
        let stored = if collection.has_column(&intensity_column(pattern)) {
            Some(collection.scalars(&intensity_column(pattern))?)
        } else {
            None
        };
        for (row, pp) in column.iter().enumerate() {
            let intensity = stored
                .and_then(|s| s[row])
                .unwrap_or_else(|| compute_intensity(pp));
            intensities.push(IntensityRow {
                sample: collection.ids()[row].clone(),
                pattern: pattern.clone(),
                count: pp.len() as u64,
                area: pp.window().area(),
                intensity,
            });
        }

        let field_name = density_column(pattern);
        if collection.has_column(&field_name) {
            for (row, field) in collection.fields(&field_name)?.iter().enumerate() {
                density.push(DensityRow {
                    sample: collection.ids()[row].clone(),
                    pattern: pattern.clone(),
                    bandwidth: field.bandwidth(),
                    integral: field.integral(),
                    max: field.max(),
                });
            }
        }
    }

    Ok(PpaReportV1 {
        tool: "kira-ppa".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        input: InputMeta {
            path: ctx.input.display().to_string(),
            samples: collection.len() as u64,
            patterns,
            factors,
        },
        config: ctx.config.clone(),
        intensities,
        density,
        group_summaries: ctx.group_summaries.clone(),
        group_model: ctx.group_model.clone(),
        cross_model: ctx.cross_model.clone(),
        warnings: ctx.warnings.clone(),
    })
}

pub fn write_json(path: &Path, report: &PpaReportV1) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
