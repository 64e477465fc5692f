//! The `mockprep parse` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use mockprep_core::validator::safe_parse;

pub fn execute(input: PathBuf, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let outcome = safe_parse(&raw);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let eval = &outcome.data;
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    for (field, score) in [
        ("technical_score", eval.technical_score),
        ("communication_score", eval.communication_score),
        ("confidence_score", eval.confidence_score),
        ("logic_score", eval.logic_score),
        ("depth_score", eval.depth_score),
    ] {
        table.add_row(vec![Cell::new(field), Cell::new(format!("{score:.1}"))]);
    }
    table.add_row(vec![
        Cell::new("difficulty_recommendation"),
        Cell::new(eval.difficulty_recommendation),
    ]);
    table.add_row(vec![
        Cell::new("weak_topics"),
        Cell::new(eval.weak_topics.join(", ")),
    ]);
    table.add_row(vec![
        Cell::new("strengths"),
        Cell::new(eval.strengths.join(", ")),
    ]);
    table.add_row(vec![Cell::new("feedback"), Cell::new(&eval.feedback)]);
    println!("{table}");

    if outcome.success {
        println!("Output is valid.");
    } else {
        println!("Output recovered with {} error(s):", outcome.errors.len());
        for err in &outcome.errors {
            println!("  - {err}");
        }
    }

    Ok(())
}
