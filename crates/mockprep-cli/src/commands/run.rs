//! The `mockprep run` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Deserialize;

use mockprep_core::badges::BadgeRegistry;
use mockprep_core::bank::load_banks;
use mockprep_core::coach::InterviewStepParams;
use mockprep_core::engine::EvaluationInput;
use mockprep_core::in_memory::InMemoryStore;
use mockprep_core::model::{Difficulty, InterviewMode, Question};
use mockprep_core::report::{SessionReport, TurnRecord};
use mockprep_core::scoring::SessionScoreAverages;
use mockprep_core::selector::QuestionSelectionParams;
use mockprep_core::service::CoachingService;
use mockprep_core::store::Store;
use mockprep_providers::config::load_config_from;
use mockprep_providers::create_scorer;

pub struct RunArgs {
    pub bank: PathBuf,
    pub answers: PathBuf,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub user: String,
    pub role: String,
    pub mode: String,
    pub difficulty: String,
    pub category: Option<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct AnswersFile {
    answers: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    text: String,
}

fn load_answers(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers: {}", path.display()))?;
    let file: AnswersFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", path.display()))?;
    let answers: Vec<String> = file
        .answers
        .into_iter()
        .map(|a| a.text.trim().to_string())
        .collect();
    anyhow::ensure!(!answers.is_empty(), "{} has no answers", path.display());
    Ok(answers)
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let started = Instant::now();

    let mut difficulty: Difficulty = args
        .difficulty
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let mode: InterviewMode = args.mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let config = load_config_from(args.config.as_deref())?;
    let provider_name = args
        .provider
        .clone()
        .unwrap_or_else(|| config.default_provider.clone());
    let scorer = create_scorer(&config.provider(&provider_name)?)?;
    let engine_config = config.engine_config(args.model.as_deref())?;
    let model = engine_config.model.clone();

    let answers = load_answers(&args.answers)?;

    let store = InMemoryStore::new();
    let banks = load_banks(&args.bank)?;
    for bank in &banks {
        store
            .insert_questions(bank.questions.iter().cloned())
            .with_context(|| format!("failed to load bank '{}'", bank.id))?;
    }
    let session = store.create_session(&args.user, difficulty)?;

    let shared: Arc<dyn Store> = Arc::new(store);
    let service = CoachingService::try_new(
        scorer,
        shared,
        engine_config,
        BadgeRegistry::default(),
    )?;

    eprintln!(
        "mockprep v{}: {} answers, provider {provider_name}, model {model}",
        env!("CARGO_PKG_VERSION"),
        answers.len()
    );
    eprintln!();

    let first = service
        .select_next_question(&QuestionSelectionParams {
            session_id: session.id.clone(),
            difficulty: Some(difficulty),
            category: args.category.clone(),
            weak_topics: Vec::new(),
        })
        .await?;
    let mut current: Option<Question> = first.map(|s| s.question);

    let mut turns = Vec::new();
    let mut final_averages = SessionScoreAverages::default();

    for answer in answers {
        let Some(question) = current.take() else {
            eprintln!("No more questions available; stopping early.");
            break;
        };

        let output = service
            .evaluate_response(&EvaluationInput {
                session_id: session.id.clone(),
                question_id: question.id.clone(),
                user_answer: answer.clone(),
                role: args.role.clone(),
                difficulty: difficulty.to_string(),
                mode: mode.to_string(),
            })
            .await;

        if let Some(failure) = &output.error {
            eprintln!("  [{}] {}: {}", question.id, failure.kind, failure.message);
        }
        if let Some(averages) = output.session_averages {
            final_averages = averages;
        }

        let asked_difficulty = difficulty;
        let next = match (&output.evaluation, output.success) {
            (Some(evaluation), true) => {
                let step = service
                    .process_interview_step(InterviewStepParams {
                        session_id: session.id.clone(),
                        user_id: args.user.clone(),
                        current_difficulty: difficulty,
                        evaluation: evaluation.clone(),
                        category: args.category.clone(),
                    })
                    .await;
                difficulty = step.next_difficulty;
                step.next_question
            }
            _ => service
                .select_next_question(&QuestionSelectionParams {
                    session_id: session.id.clone(),
                    difficulty: Some(difficulty),
                    category: args.category.clone(),
                    weak_topics: Vec::new(),
                })
                .await?
                .map(|s| s.question),
        };

        eprintln!(
            "  {} [{}] overall {} -> next {}",
            question.id,
            asked_difficulty,
            output
                .session_averages
                .map(|a| format!("{:.2}", a.overall_score))
                .unwrap_or_else(|| "-".into()),
            difficulty
        );

        turns.push(TurnRecord {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            difficulty: asked_difficulty,
            answer,
            persisted: output.success,
            evaluation: output.evaluation,
            llm_output_valid: output.llm_output_valid,
            used_fallback: output.used_fallback,
            validation_errors: output.validation_errors,
            overall_after: output.session_averages.map(|a| a.overall_score),
            next_difficulty: difficulty,
            next_question_id: next.as_ref().map(|q| q.id.clone()),
        });

        current = next;
    }

    let badges = service.evaluate_and_award_badges(&args.user).await;

    let report = SessionReport {
        id: uuid::Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        session_id: session.id.clone(),
        user_id: args.user.clone(),
        role: args.role.clone(),
        mode: mode.to_string(),
        provider: provider_name,
        model,
        turns,
        final_averages,
        badges,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        session_id = %report.session_id,
        turns = report.turns.len(),
        fallbacks = report.fallback_turns(),
        "session replay complete"
    );
    print_summary(&report);

    let path = args.output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        config
            .output_dir
            .join(format!("session-{timestamp}.json"))
    });
    report.save_json(&path)?;
    eprintln!("Session report saved to: {}", path.display());

    Ok(())
}

fn print_summary(report: &SessionReport) {
    let mut table = Table::new();
    table.set_header(vec![
        "#",
        "Question",
        "Difficulty",
        "Technical",
        "Overall",
        "Next",
        "Valid",
    ]);

    for (i, turn) in report.turns.iter().enumerate() {
        let technical = turn
            .evaluation
            .as_ref()
            .map(|e| format!("{:.1}", e.technical_score))
            .unwrap_or_else(|| "-".into());
        let overall = turn
            .overall_after
            .map(|o| format!("{o:.2}"))
            .unwrap_or_else(|| "-".into());
        let valid = if turn.used_fallback {
            "fallback"
        } else if turn.llm_output_valid {
            "yes"
        } else {
            "recovered"
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&turn.question_id),
            Cell::new(turn.difficulty),
            Cell::new(technical),
            Cell::new(overall),
            Cell::new(turn.next_difficulty),
            Cell::new(valid),
        ]);
    }

    println!("{table}");
    println!(
        "Overall score: {:.2} across {} answers",
        report.final_averages.overall_score, report.final_averages.response_count
    );

    if report.badges.is_empty() {
        println!("No badges yet.");
    } else {
        println!("Badges:");
        for badge in &report.badges {
            let marker = if badge.is_new { " (new)" } else { "" };
            println!("  - {}{}: {}", badge.name, marker, badge.description);
        }
    }
}
