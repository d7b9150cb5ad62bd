//! Financial advisory pipeline
//!
//! The built-in orchestration the binary runs: a fan-out of goal analysis
//! and savings research, a bounded build/review loop over the roadmap, and
//! a record keeper that persists the consultation through its tools.

use std::io::{self, Write};
use std::sync::Arc;

use serde_json::json;

use crate::agent::{Agent, Loop, Node, Orchestrator, Parallel, Sequential};
use crate::core::{Config, Message, Result};
use crate::llm::{GeminiClient, LLMProvider, StreamCallback};
use crate::state::StateStore;
use crate::tools::ToolRegistry;

/// Build the advisory orchestration tree.
///
/// Layout:
/// ```text
/// advisory_team (Sequential)
/// ├── coordinator (Parallel)
/// │   ├── goal_analyzer
/// │   └── savings_researcher
/// ├── roadmap_review (Loop, bounded)
/// │   ├── roadmap_builder
/// │   └── roadmap_reviewer   (may call exit_loop)
/// └── record_keeper          (record id + state + document tools)
/// ```
pub fn build_advisory_pipeline(
    config: &Config,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
) -> Result<Orchestrator> {
    let model = &config.models.worker;
    let max_turns = config.agent.max_turns;

    let goal_analyzer = Agent::builder("goal_analyzer")
        .instruction(
            "FINANCIAL_REQUEST:\n{{ FINANCIAL_REQUEST? }}\n\n\
             INSTRUCTIONS:\n\
             Analyze the financial goal described in FINANCIAL_REQUEST. Consider:\n\
             - Goal amount and timeline\n\
             - Monthly savings capacity based on income/expenses\n\
             - Risk tolerance and investment horizon\n\
             - Feasibility assessment\n\
             - Recommended monthly contribution amounts\n\n\
             Provide a detailed analysis report including an achievability \
             score (1-10) and key recommendations.",
        )
        .output_key("goal_analysis_report")
        .llm(llm.clone())
        .model(model)
        .tools(tools.clone())
        .max_turns(max_turns)
        .build()?;

    let savings_researcher = Agent::builder("savings_researcher")
        .instruction(
            "FINANCIAL_REQUEST:\n{{ FINANCIAL_REQUEST? }}\n\n\
             INSTRUCTIONS:\n\
             Recommend the best savings and investment options for the goal:\n\
             - High-yield savings accounts for short-term goals\n\
             - CDs for medium-term goals with guaranteed returns\n\
             - Investment accounts (stocks, bonds, ETFs) for long-term growth\n\
             - Automated savings programs and apps\n\n\
             Provide specific product recommendations with pros/cons and \
             expected returns.",
        )
        .output_key("savings_options_report")
        .llm(llm.clone())
        .model(model)
        .tools(tools.clone())
        .max_turns(max_turns)
        .build()?;

    let roadmap_builder = Agent::builder("roadmap_builder")
        .instruction(
            "FINANCIAL_REQUEST:\n{{ FINANCIAL_REQUEST? }}\n\n\
             GOAL_ANALYSIS:\n{{ goal_analysis_report? }}\n\n\
             SAVINGS_OPTIONS:\n{{ savings_options_report? }}\n\n\
             REVIEWER_FEEDBACK:\n{{ roadmap_feedback? }}\n\n\
             INSTRUCTIONS:\n\
             Create a comprehensive financial roadmap combining the goal \
             analysis and savings options. Break the plan down by milestone, \
             give actionable monthly steps, and include contingency plans. \
             If REVIEWER_FEEDBACK is present, address every point in it.",
        )
        .output_key("financial_roadmap")
        .llm(llm.clone())
        .model(model)
        .tools(tools.clone())
        .max_turns(max_turns)
        .build()?;

    let roadmap_reviewer = Agent::builder("roadmap_reviewer")
        .instruction(
            "FINANCIAL_ROADMAP:\n{{ financial_roadmap? }}\n\n\
             INSTRUCTIONS:\n\
             Review the roadmap for completeness: milestones, monthly steps, \
             contingency plans, and tracking metrics. If it is complete and \
             actionable, call the exit_loop tool. Otherwise respond with a \
             concise list of required fixes.",
        )
        .output_key("roadmap_feedback")
        .allowed_tools(vec!["exit_loop".to_string()])
        .llm(llm.clone())
        .model(model)
        .tools(tools.clone())
        .temperature(0.1)
        .max_turns(max_turns)
        .build()?;

    let record_keeper = Agent::builder("record_keeper")
        .instruction(
            "FINANCIAL_REQUEST:\n{{ FINANCIAL_REQUEST? }}\n\n\
             FINANCIAL_ROADMAP:\n{{ financial_roadmap? }}\n\n\
             INSTRUCTIONS:\n\
             Store this consultation. Use generate_record_id to mint a user \
             record id, append_to_state to record it under the key \
             'user_record_id', and write_document to save the roadmap to \
             'advisory_roadmap.md'. Then confirm what was stored.",
        )
        .output_key("user_record_status")
        .allowed_tools(vec![
            "generate_record_id".to_string(),
            "append_to_state".to_string(),
            "write_document".to_string(),
        ])
        .llm(llm.clone())
        .model(model)
        .tools(tools.clone())
        .temperature(0.1)
        .max_turns(max_turns)
        .build()?;

    let coordinator = Parallel::new(
        "coordinator",
        vec![Node::from(goal_analyzer), Node::from(savings_researcher)],
    );

    let roadmap_review = Loop::new(
        "roadmap_review",
        vec![Node::from(roadmap_builder), Node::from(roadmap_reviewer)],
        config.agent.default_loop_iterations,
    );

    let root = Sequential::new(
        "advisory_team",
        vec![
            Node::from(coordinator),
            Node::from(roadmap_review),
            Node::from(record_keeper),
        ],
    );

    Ok(Orchestrator::new(root))
}

/// Run the advisory pipeline for one request and print the results
pub async fn run_advisory(config: &Config, request: &str) -> Result<()> {
    let llm: Arc<dyn LLMProvider> = Arc::new(GeminiClient::from_config(config)?);
    let tools = Arc::new(ToolRegistry::with_builtins());

    let orchestrator = build_advisory_pipeline(config, llm.clone(), tools)?;

    println!("[{}] Starting run", orchestrator.root_name());

    let state = orchestrator
        .run_seeded([("FINANCIAL_REQUEST", json!(request))])
        .await?;

    if let Some(roadmap) = state.latest("financial_roadmap") {
        println!("\n## Financial roadmap\n");
        println!("{}", roadmap.as_str().unwrap_or_default());
    }

    if let Some(status) = state.latest("user_record_status") {
        println!("\n## Record status\n");
        println!("{}", status.as_str().unwrap_or_default());
    }

    if config.streaming.enabled {
        print_closing_summary(config, llm.as_ref(), &state).await?;
    }

    println!("\n[{}] Complete. State keys:", orchestrator.root_name());
    for key in state.keys() {
        println!("  - {} ({} entries)", key, state.get(&key).len());
    }

    Ok(())
}

/// Stream a short client-facing summary of the completed consultation
async fn print_closing_summary(
    config: &Config,
    llm: &dyn LLMProvider,
    state: &StateStore,
) -> Result<()> {
    let roadmap = state
        .latest("financial_roadmap")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    if roadmap.is_empty() {
        return Ok(());
    }

    let prompt = format!(
        "Summarize this financial roadmap for the client in three sentences:\n\n{}",
        roadmap
    );

    println!("\n## Summary\n");

    // print_tokens chooses between live token output and printing the
    // buffered response once complete
    let live = config.streaming.print_tokens;
    let on_token: StreamCallback = if live {
        Box::new(|token| {
            print!("{}", token);
            let _ = io::stdout().flush();
        })
    } else {
        Box::new(|_| {})
    };

    let response = llm
        .generate_stream(&config.models.worker, &[Message::user(prompt)], None, on_token)
        .await?;

    if live {
        println!();
    } else {
        println!("{}", response.content);
    }

    Ok(())
}
