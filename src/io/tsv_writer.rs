use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{Component, FittedModel, ModelKind};
use crate::schema::v1::IntensityRow;

pub fn write_intensity_tsv(path: &Path, rows: &[IntensityRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "sample\tpattern\tcount\tarea\tintensity")?;
    for r in rows {
        writeln!(
            w,
            "{}\t{}\t{}\t{:.6}\t{:.8}",
            r.sample, r.pattern, r.count, r.area, r.intensity
        )?;
    }
    w.flush()?;
    Ok(())
}

/// One row per coefficient; `rate_ratio` is filled for log-link models only.
pub fn write_coefficients_tsv(path: &Path, models: &[&FittedModel]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(
        w,
        "model\tcomponent\tterm\testimate\tstd_error\tlower\tupper\trate_ratio"
    )?;
    for model in models {
        for c in &model.coefficients {
            let component = match c.component {
                Component::Mean => "mean",
                Component::Scale => "scale",
            };
            let rate_ratio = match model.kind {
                ModelKind::CrossPattern => format!("{:.6}", c.rate_ratio().0),
                ModelKind::Group => "NA".to_string(),
            };
            writeln!(
                w,
                "{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}",
                model.id, component, c.name, c.estimate, c.std_error, c.lower, c.upper, rate_ratio
            )?;
        }
    }
    w.flush()?;
    Ok(())
}
