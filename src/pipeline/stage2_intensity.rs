use anyhow::Result;
use tracing::{info, warn};

use crate::ctx::{Ctx, intensity_column};
use crate::pipeline::Stage;
use crate::spatial::intensity::append_intensity_column;
use crate::table::ColumnKind;

pub struct Stage2Intensity;

impl Stage2Intensity {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage2Intensity {
    fn name(&self) -> &'static str {
        "stage2_intensity"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let patterns = ctx.collection()?.names_of_kind(ColumnKind::Pattern);
        let mut added = 0usize;
        for pattern in &patterns {
            let column = intensity_column(pattern);
            if ctx.collection()?.has_column(&column) {
                warn!(column = %column, "intensity column already present; keeping stored values");
                ctx.warnings
                    .push(format!("kept stored intensity column '{}'", column));
                continue;
            }
            append_intensity_column(ctx.collection_mut()?, pattern, &column)?;
            added += 1;
        }
        info!(columns = added, "intensity_ready");
        Ok(())
    }
}
