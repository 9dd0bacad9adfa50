use anyhow::Result;

use crate::ctx::Ctx;
use crate::model::{Component, FittedModel};
use crate::table::ColumnKind;

pub fn format_summary(ctx: &Ctx) -> Result<String> {
    let version = env!("CARGO_PKG_VERSION");
    let collection = ctx.collection()?;
    let patterns = collection.names_of_kind(ColumnKind::Pattern);

    let mut out = String::new();
    out.push_str(&format!("kira-ppa v{}\n", version));
    out.push_str(&format!(
        "Input: {} samples, patterns={}\n",
        collection.len(),
        patterns.join(",")
    ));

    for s in &ctx.group_summaries {
        out.push_str(&format!(
            "{}={}: n={} mean={:.6} sd={:.6}\n",
            s.covariate, s.level, s.n, s.mean, s.sd
        ));
    }
    if let Some(model) = &ctx.group_model {
        push_model(&mut out, "Group model", model);
    }
    if let Some(model) = &ctx.cross_model {
        push_model(&mut out, "Cross-pattern model", model);
    }
    Ok(out)
}

fn push_model(out: &mut String, title: &str, model: &FittedModel) {
    out.push_str(&format!(
        "{} ({}, n={}, {:.0}% interval):\n",
        title,
        model.id,
        model.n_obs,
        model.confidence_level * 100.0
    ));
    for c in &model.coefficients {
        let prefix = match c.component {
            Component::Mean => "",
            Component::Scale => "  ",
        };
        out.push_str(&format!(
            "  {}{}: {:+.4} [{:+.4}, {:+.4}]\n",
            prefix, c.name, c.estimate, c.lower, c.upper
        ));
    }
}
