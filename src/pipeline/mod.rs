use anyhow::Result;
use std::time::Instant;
use tracing::{info, warn};

use crate::ctx::Ctx;

pub mod stage0_scaffold;
pub mod stage1_load;
pub mod stage2_intensity;
pub mod stage3_density;
pub mod stage4_group_model;
pub mod stage5_cross_model;
pub mod stage6_output;

pub trait Stage {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &mut Ctx) -> Result<()>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Every stage of a full analysis run, in order.
    pub fn full() -> Self {
        Self::new(vec![
            Box::new(stage0_scaffold::Stage0Scaffold::new()),
            Box::new(stage1_load::Stage1Load::new()),
            Box::new(stage2_intensity::Stage2Intensity::new()),
            Box::new(stage3_density::Stage3Density::new()),
            Box::new(stage4_group_model::Stage4GroupModel::new()),
            Box::new(stage5_cross_model::Stage5CrossModel::new()),
            Box::new(stage6_output::Stage6Output::new()),
        ])
    }

    /// A failing stage halts the run and names itself in the error context;
    /// columns added by earlier stages stay on the context for inspection.
    pub fn run(&self, ctx: &mut Ctx) -> Result<()> {
        for stage in &self.stages {
            let start = Instant::now();
            info!(stage = stage.name(), "stage started");
            if let Err(err) = stage.run(ctx) {
                let elapsed_ms = start.elapsed().as_millis();
                warn!(
                    stage = stage.name(),
                    elapsed_ms = elapsed_ms as u64,
                    error = %err,
                    "stage failed"
                );
                return Err(err.context(format!("{} failed", stage.name())));
            }
            let elapsed_ms = start.elapsed().as_millis();
            info!(
                stage = stage.name(),
                elapsed_ms = elapsed_ms as u64,
                "stage finished"
            );
        }
        Ok(())
    }
}
