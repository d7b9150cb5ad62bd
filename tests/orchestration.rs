//! Orchestration integration tests
//!
//! Exercises the control-flow semantics of the node tree end to end with a
//! scripted in-memory generation provider, so no network or model is
//! involved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio_test::assert_ok;

use ensemble::agent::{Agent, Loop, Node, Orchestrator, Parallel, Sequential};
use ensemble::core::{EnsembleError, Message, Result, ToolCall, ToolSpec};
use ensemble::llm::{GenerateOptions, LLMProvider, LLMResponse};
use ensemble::state::StateStore;
use ensemble::tools::{ExitLoopTool, Tool, ToolOutput, ToolRegistry};

/// Generation provider that replays a fixed script of responses.
///
/// Once the script is exhausted it keeps returning the fallback response,
/// which lets loop bodies run an unbounded number of iterations. Every
/// prompt it receives is captured for assertions.
struct ScriptedProvider {
    script: Mutex<VecDeque<LLMResponse>>,
    fallback: LLMResponse,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(script: Vec<LLMResponse>) -> Arc<Self> {
        Self::with_fallback(script, LLMResponse::text("done"))
    }

    fn with_fallback(script: Vec<LLMResponse>, fallback: LLMResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(
        &self,
        _model: &str,
        messages: &[Message],
        _tools: &[ToolSpec],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let prompt = messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Tool that fails on every invocation
struct FlakyTool;

#[async_trait]
impl Tool for FlakyTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("flaky", "Always fails", json!({"type": "object"}))
    }

    async fn invoke(&self, _state: &StateStore, call: &ToolCall) -> Result<ToolOutput> {
        Err(EnsembleError::tool(&call.name, "disk unavailable"))
    }
}

fn text_agent(name: &str, text: &str) -> (Agent, Arc<ScriptedProvider>) {
    let provider = ScriptedProvider::new(vec![LLMResponse::text(text)]);
    let agent = Agent::builder(name)
        .instruction(format!("You are {}", name))
        .llm(provider.clone())
        .build()
        .unwrap();
    (agent, provider)
}

#[tokio::test]
async fn sequential_child_observes_earlier_writes() {
    let writer_provider = ScriptedProvider::new(vec![LLMResponse::text("alpha report")]);
    let writer = Agent::builder("writer")
        .instruction("Produce the report")
        .output_key("X")
        .llm(writer_provider)
        .build()
        .unwrap();

    let reader_provider = ScriptedProvider::new(vec![LLMResponse::text("read it")]);
    let reader = Agent::builder("reader")
        .instruction("Summarize: {{ X }}")
        .llm(reader_provider.clone())
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Sequential::new(
        "pipeline",
        vec![Node::from(writer), Node::from(reader)],
    ));
    orchestrator.run(StateStore::new()).await.unwrap();

    let prompts = reader_provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(
        prompts[0].contains("alpha report"),
        "reader must observe the writer's output, got: {}",
        prompts[0]
    );
}

#[tokio::test]
async fn parallel_appends_to_same_key_lose_nothing() {
    let left_provider = ScriptedProvider::new(vec![LLMResponse::text("from left")]);
    let left = Agent::builder("left")
        .instruction("log something")
        .append_key("log")
        .llm(left_provider)
        .build()
        .unwrap();

    let right_provider = ScriptedProvider::new(vec![LLMResponse::text("from right")]);
    let right = Agent::builder("right")
        .instruction("log something")
        .append_key("log")
        .llm(right_provider)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Parallel::new(
        "fanout",
        vec![Node::from(left), Node::from(right)],
    ));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    let log = state.get("log");
    assert_eq!(log.len(), 2);
    assert!(log.contains(&json!("from left")));
    assert!(log.contains(&json!("from right")));
}

#[tokio::test]
async fn loop_without_exit_runs_body_exactly_n_times() {
    // Fallback keeps answering, so only the iteration cap stops the loop
    let provider = ScriptedProvider::new(vec![]);
    let planner = Agent::builder("planner")
        .instruction("Extend the plan")
        .append_key("PLAN")
        .llm(provider.clone())
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Loop::new("draft", vec![Node::from(planner)], 4));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    assert_eq!(state.get("PLAN").len(), 4);
    assert_eq!(provider.prompts().len(), 4);
}

#[tokio::test]
async fn loop_exit_on_second_iteration_stops_early() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool));
    let registry = Arc::new(registry);

    let body_provider = ScriptedProvider::new(vec![]);
    let body = Agent::builder("worker")
        .instruction("work")
        .append_key("work_log")
        .llm(body_provider)
        .tools(registry.clone())
        .build()
        .unwrap();

    // First iteration: plain text. Second iteration: raise the signal.
    let gate_provider = ScriptedProvider::new(vec![
        LLMResponse::text("keep going"),
        LLMResponse::tool_requests(vec![ToolCall::new("exit_loop", json!({}))]),
    ]);
    let gate = Agent::builder("gate")
        .instruction("decide")
        .llm(gate_provider)
        .tools(registry)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Loop::new(
        "bounded",
        vec![Node::from(body), Node::from(gate)],
        3,
    ));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    // Body ran on iterations 1 and 2, never 3
    assert_eq!(state.get("work_log").len(), 2);
}

#[tokio::test]
async fn planner_validator_scenario_runs_once() {
    // Loop(max=3, body=[planner, validator]): planner appends to PLAN,
    // validator exits as soon as PLAN is non-empty, which is true on the
    // first iteration already.
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool));
    let registry = Arc::new(registry);

    let planner_provider = ScriptedProvider::new(vec![]);
    let planner = Agent::builder("planner")
        .instruction("Draft the next plan step")
        .append_key("PLAN")
        .llm(planner_provider.clone())
        .tools(registry.clone())
        .build()
        .unwrap();

    let validator_provider = ScriptedProvider::new(vec![LLMResponse::tool_requests(vec![
        ToolCall::new("exit_loop", json!({"reason": "plan present"})),
    ])]);
    let validator = Agent::builder("validator")
        .instruction("PLAN so far: {{ PLAN? }}")
        .llm(validator_provider.clone())
        .tools(registry)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Loop::new(
        "plan_loop",
        vec![Node::from(planner), Node::from(validator)],
        3,
    ));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    assert_eq!(state.get("PLAN").len(), 1);
    assert_eq!(planner_provider.prompts().len(), 1);
    // Validator saw the planner's write within the same iteration
    assert!(validator_provider.prompts()[0].contains("done"));
}

#[tokio::test]
async fn exit_signal_in_parallel_terminates_enclosing_loop() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool));
    let registry = Arc::new(registry);

    let worker_provider = ScriptedProvider::new(vec![]);
    let worker = Agent::builder("worker")
        .instruction("work")
        .append_key("work_log")
        .llm(worker_provider)
        .tools(registry.clone())
        .build()
        .unwrap();

    let exiter_provider = ScriptedProvider::with_fallback(
        vec![],
        LLMResponse::tool_requests(vec![ToolCall::new("exit_loop", json!({}))]),
    );
    let exiter = Agent::builder("exiter")
        .instruction("stop")
        .llm(exiter_provider)
        .tools(registry)
        .build()
        .unwrap();

    let fanout = Parallel::new("fanout", vec![Node::from(worker), Node::from(exiter)]);
    let orchestrator = Orchestrator::new(Loop::new("outer", vec![Node::from(fanout)], 3));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    // The exiter fired during iteration 1; the sibling still completed
    // (join-all), then the loop absorbed the signal.
    assert_eq!(state.get("work_log").len(), 1);
}

#[tokio::test]
async fn exit_signal_escaping_root_is_absorbed() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool));
    let registry = Arc::new(registry);

    let provider = ScriptedProvider::new(vec![LLMResponse::tool_requests(vec![ToolCall::new(
        "exit_loop",
        json!({}),
    )])]);
    let lone = Agent::builder("lone")
        .instruction("bail out")
        .llm(provider)
        .tools(registry)
        .build()
        .unwrap();

    // No enclosing Loop: the orchestrator absorbs the signal at the root
    let orchestrator = Orchestrator::new(Sequential::new("root", vec![Node::from(lone)]));
    assert_ok!(orchestrator.run(StateStore::new()).await);
}

#[tokio::test]
async fn exit_skips_later_sequential_siblings() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool));
    let registry = Arc::new(registry);

    let exiter_provider = ScriptedProvider::new(vec![LLMResponse::tool_requests(vec![
        ToolCall::new("exit_loop", json!({})),
    ])]);
    let exiter = Agent::builder("exiter")
        .instruction("stop now")
        .llm(exiter_provider)
        .tools(registry)
        .build()
        .unwrap();

    let (after, after_provider) = text_agent("after", "should not run");

    let body = Sequential::new("body", vec![Node::from(exiter), Node::from(after)]);
    let orchestrator = Orchestrator::new(Loop::new("outer", vec![Node::from(body)], 3));
    orchestrator.run(StateStore::new()).await.unwrap();

    // Sequential re-raised the signal instead of running the next child
    assert!(after_provider.prompts().is_empty());
}

#[tokio::test]
async fn turn_limit_exceeded_is_fatal_with_node_path() {
    let registry = Arc::new(ToolRegistry::with_builtins());

    // The model never produces a final answer
    let provider = ScriptedProvider::with_fallback(
        vec![],
        LLMResponse::tool_requests(vec![ToolCall::new(
            "append_to_state",
            json!({"key": "junk", "value": "x"}),
        )]),
    );
    let spinner = Agent::builder("spinner")
        .instruction("spin")
        .llm(provider)
        .tools(registry)
        .max_turns(2)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Sequential::new("root", vec![Node::from(spinner)]));
    let err = orchestrator.run(StateStore::new()).await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("root/spinner"), "missing node path: {}", msg);
    assert!(msg.contains("turn limit"), "unexpected error: {}", msg);
}

#[tokio::test]
async fn tool_failure_is_fed_back_not_fatal() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FlakyTool));
    let registry = Arc::new(registry);

    let provider = ScriptedProvider::new(vec![
        LLMResponse::tool_requests(vec![ToolCall::new("flaky", json!({}))]),
        LLMResponse::text("recovered without the tool"),
    ]);
    let agent = Agent::builder("resilient")
        .instruction("try the tool")
        .output_key("result")
        .llm(provider.clone())
        .tools(registry)
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Sequential::new("root", vec![Node::from(agent)]));
    let state = orchestrator.run(StateStore::new()).await.unwrap();

    assert_eq!(
        state.latest("result"),
        Some(json!("recovered without the tool"))
    );

    // The failure was surfaced to the model as an observation
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("FAILED"));
    assert!(prompts[1].contains("disk unavailable"));
}

#[tokio::test]
async fn fatal_generation_error_propagates_out_of_parallel_after_join() {
    // A provider that errors instead of answering
    struct FailingProvider;

    #[async_trait]
    impl LLMProvider for FailingProvider {
        async fn generate(
            &self,
            _model: &str,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            Err(EnsembleError::generation("quota exhausted", false))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    let broken = Agent::builder("broken")
        .instruction("will fail")
        .llm(Arc::new(FailingProvider))
        .build()
        .unwrap();

    let healthy_provider = ScriptedProvider::new(vec![LLMResponse::text("fine")]);
    let healthy = Agent::builder("healthy")
        .instruction("will succeed")
        .append_key("log")
        .llm(healthy_provider.clone())
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Parallel::new(
        "fanout",
        vec![Node::from(broken), Node::from(healthy)],
    ));
    let err = orchestrator.run(StateStore::new()).await.unwrap_err();

    assert!(err.to_string().contains("fanout/broken"));
    // Join-all semantics: the healthy sibling still ran to completion
    assert_eq!(healthy_provider.prompts().len(), 1);
}
