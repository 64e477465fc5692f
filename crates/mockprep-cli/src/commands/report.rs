//! The `mockprep report` command.

use std::path::PathBuf;

use anyhow::Result;

use mockprep_core::report::SessionReport;

pub fn execute(file: PathBuf, format: String) -> Result<()> {
    let report = SessionReport::load_json(&file)?;

    match format.as_str() {
        "markdown" | "md" => print!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => anyhow::bail!("unknown format '{other}' (expected markdown or json)"),
    }

    Ok(())
}
