//! The `mockprep init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("mockprep.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("banks")?;
    write_if_missing(Path::new("banks/example.toml"), EXAMPLE_BANK)?;
    write_if_missing(Path::new("answers.toml"), EXAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Edit mockprep.toml to pick a scorer (the mock scorer works offline)");
    println!("  2. Run: mockprep validate --bank banks/example.toml");
    println!("  3. Run: mockprep run --bank banks/example.toml --answers answers.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# mockprep configuration

default_provider = "mock"
default_model = "mock-scorer"
output_dir = "./mockprep-sessions"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"

[providers.mock]
type = "mock"

[engine]
scorer_timeout_secs = 30
max_retries = 2
retry_delay_ms = 500
top_weak_skills = 5
cross_difficulty_fallback = false

[engine.weights]
technical = 0.35
communication = 0.15
confidence = 0.15
logic = 0.20
depth = 0.15
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Backend Bank"
description = "A few backend questions to get started"
default_category = "backend"

[[questions]]
id = "http-verbs"
text = "What is the difference between PUT and PATCH?"
difficulty = "easy"
category = "http"

[[questions]]
id = "cache-invalidation"
text = "How would you invalidate a cache that sits in front of a user profile service?"
difficulty = "medium"
category = "caching"

[[questions]]
id = "db-indexes"
text = "When does adding an index make a query slower overall?"
difficulty = "medium"
category = "databases"

[[questions]]
id = "consensus"
text = "Walk through what happens in Raft when the leader is partitioned away."
difficulty = "hard"
category = "distributed-systems"
"#;

const EXAMPLE_ANSWERS: &str = r#"[[answers]]
text = """
I would use a write-through cache keyed by user id, for example Redis with a short TTL.
Writes go to the database first and then delete the cache entry. However, the trade-off
is a brief window of stale reads during concurrent updates.
"""

[[answers]]
text = "Maybe an index on every column."
"#;
