use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kira_ppa::cli::{Cli, Commands, RunArgs, SimulateArgs, ValidateArgs};
use kira_ppa::ctx::{AnalysisPlan, Ctx};
use kira_ppa::io;
use kira_ppa::io::dataset::{LoadOptions, load_collection, save_collection};
use kira_ppa::pipeline::Pipeline;
use kira_ppa::simulate::simulate_dataset;
use kira_ppa::table::{ColumnKind, SampleCollection};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Validate(args) => validate(args),
        Commands::Simulate(args) => simulate(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = args
        .analysis_config()
        .context("invalid analysis configuration")?;
    let plan = AnalysisPlan {
        response_pattern: args.response,
        covariate_pattern: args.covariate,
        group_covariates: args.group,
        variance_covariates: args.variance,
        cross_factors: args.cross_factor,
    };
    let mut ctx = Ctx::new(
        args.input,
        args.out,
        plan,
        config,
        args.json,
        args.tsv,
        env!("CARGO_PKG_VERSION"),
    );
    Pipeline::full().run(&mut ctx)?;
    print_summary(&ctx)
}

fn validate(args: ValidateArgs) -> Result<()> {
    let options = LoadOptions {
        required_patterns: args.require,
    };
    let collection = load_collection(&args.input, &options)?;
    print_validate_summary(&collection)
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let spec = args.simulation_spec();
    let collection = simulate_dataset(&spec).context("simulation failed")?;
    save_collection(&args.out, &collection)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!(
        "kira-ppa simulate: {} samples written to {}",
        collection.len(),
        args.out.display()
    );
    Ok(())
}

fn print_summary(ctx: &Ctx) -> Result<()> {
    let summary = io::summary::format_summary(ctx)?;
    print!("{}", summary);
    if !ctx.warnings.is_empty() {
        println!("warnings:");
        for warning in &ctx.warnings {
            println!("- {}", warning);
        }
    }
    Ok(())
}

fn print_validate_summary(collection: &SampleCollection) -> Result<()> {
    println!("kira-ppa validate ok");
    println!("samples: {}", collection.len());
    let mut warnings = Vec::new();
    for name in collection.names_of_kind(ColumnKind::Pattern) {
        let patterns = collection.patterns(&name)?;
        let points: usize = patterns.iter().map(|p| p.len()).sum();
        println!("pattern {}: {} points", name, points);
        for (id, pattern) in collection.ids().iter().zip(patterns.iter()) {
            if pattern.is_empty() {
                warnings.push(format!("sample '{}' has no '{}' points", id, name));
            }
        }
    }
    for name in collection.names_of_kind(ColumnKind::Factor) {
        let values = collection.factors(&name)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        println!("factor {}: {} missing", name, missing);
    }
    for name in collection.names_of_kind(ColumnKind::Scalar) {
        let values = collection.scalars(&name)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        println!("scalar {}: {} missing", name, missing);
    }
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in &warnings {
            println!("- {}", warning);
        }
    }
    Ok(())
}
