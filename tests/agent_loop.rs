//! End-to-end tests of the agent loop against scripted model services.

mod common;

use common::*;
use math_agent::agent::{Agent, LoopOptions};
use math_agent::cas::SymbolicEngine;
use math_agent::error::{AgentError, ErrorKind, ModelError, ToolError};
use math_agent::tools::ToolRegistry;
use math_agent::types::*;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn outputs(conversation: &ConversationState) -> Vec<String> {
    conversation
        .tool_results()
        .map(|r| r.output.clone())
        .collect()
}

// ============= Happy path =============

#[tokio::test]
async fn test_multiply_then_answer() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("call_1", "multiply", json!({"a": 3, "b": 3}))]),
        final_answer("3 times 3 is 9."),
    ]));
    let agent = agent(model.clone(), 5);

    let done = agent.run("What is 3 times 3?").await.unwrap();

    assert_eq!(done.answer, "3 times 3 is 9.");
    assert_eq!(done.model_turns, 2);
    assert_eq!(model.call_count(), 2);
    assert_eq!(
        done.trace,
        vec![
            AgentState::AwaitingModel,
            AgentState::ExecutingTool,
            AgentState::AwaitingModel,
            AgentState::Done,
        ]
    );

    let results: Vec<_> = done.conversation.tool_results().collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_name, "multiply");
    assert_eq!(results[0].tool_call_id, "call_1");
    assert_eq!(results[0].output, "9.0");
    assert!(results[0].success);

    // user, tool request, tool result, answer
    assert_eq!(done.conversation.len(), 4);
    assert_eq!(done.conversation.final_answer(), Some("3 times 3 is 9."));
    assert_eq!(done.usage.total_tokens, 30);
}

#[tokio::test]
async fn test_tool_results_reach_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("c1", "add", json!({"a": 2, "b": 2}))]),
        final_answer("4"),
    ]));
    agent(model.clone(), 5).run("2 + 2?").await.unwrap();

    let seen = model.seen();
    assert_eq!(seen.len(), 2);

    let first = &seen[0];
    assert_eq!(first[0].role, ChatRole::System);
    assert!(first[0].content.contains("# Available tools"));
    assert_eq!(first[1].role, ChatRole::User);
    assert_eq!(first[1].content, "2 + 2?");

    let second = &seen[1];
    let tool_msg = second.last().unwrap();
    assert_eq!(tool_msg.role, ChatRole::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_msg.content, "4.0");
}

#[tokio::test]
async fn test_direct_answer_without_tools() {
    let model = Arc::new(ScriptedModel::new(vec![final_answer("Hello!")]));
    let done = agent(model, 5).run("Hi").await.unwrap();

    assert_eq!(done.answer, "Hello!");
    assert_eq!(done.model_turns, 1);
    assert_eq!(done.trace, vec![AgentState::AwaitingModel, AgentState::Done]);
    assert_eq!(done.conversation.tool_results().count(), 0);
}

#[tokio::test]
async fn test_symbolic_chain() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call(
            "d",
            "symbolic_derivative",
            json!({"expression": "5*x - 3*x**2"}),
        )]),
        tool_calls(vec![call(
            "i",
            "symbolic_integral",
            json!({"expression": "5*x - 3*x**2", "variable": "x"}),
        )]),
        tool_calls(vec![call(
            "di",
            "definite_integral",
            json!({"expression": "5*x - 3*x**2", "variable": "x", "lower_limit": 0, "upper_limit": 1}),
        )]),
        final_answer("The area is 3/2."),
    ]));
    let done = agent(model, 10).run("Analyse 5x - 3x^2").await.unwrap();

    assert_eq!(
        outputs(&done.conversation),
        vec!["-6*x + 5", "-x**3 + 5*x**2/2", "3/2"]
    );
    assert_eq!(done.model_turns, 4);
}

#[tokio::test]
async fn test_search_then_compute() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call(
            "s",
            "web_searcher",
            json!({"query": "Laplace transform definition"}),
        )]),
        tool_calls(vec![call(
            "e",
            "symbolic_integral",
            json!({"expression": "exp(-2*t)", "variable": "t"}),
        )]),
        final_answer("Done."),
    ]));
    let done = agent(model, 5).run("Laplace transform of 1").await.unwrap();

    let results: Vec<_> = done.conversation.tool_results().collect();
    assert_eq!(results.len(), 2);
    let hits: serde_json::Value = serde_json::from_str(&results[0].output).unwrap();
    assert_eq!(hits[0]["title"], "Laplace transform");
    assert!(hits[0]["excerpt"].as_str().unwrap().contains("exp(-s*t)"));
    assert!(results[1].success);
}

// ============= Iteration bound =============

#[tokio::test]
async fn test_never_stopping_model_hits_iteration_limit() {
    let model = Arc::new(LoopingModel::default());
    let err = agent(model.clone(), 3).run("count forever").await.unwrap_err();

    assert_eq!(err, AgentError::MaxIterationsExceeded { limit: 3 });
    assert_eq!(err.kind(), ErrorKind::MaxIterationsExceeded);
    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn test_answer_on_last_allowed_turn() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("a", "add", json!({"a": 1, "b": 1}))]),
        final_answer("2"),
    ]));
    let done = agent(model.clone(), 2).run("1 + 1").await.unwrap();
    assert_eq!(done.answer, "2");
    assert_eq!(model.call_count(), 2);
}

// ============= Recoverable tool errors =============

#[tokio::test]
async fn test_recoverable_errors_are_fed_back() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![
            call("z", "divide", json!({"a": 1, "b": 0})),
            call("u", "sqrt", json!({"a": 4})),
            call("m", "add", json!({"a": 1})),
            call("p", "symbolic_derivative", json!({"expression": "2x +"})),
        ]),
        tool_calls(vec![call("ok", "divide", json!({"a": 1, "b": 4}))]),
        final_answer("0.25"),
    ]));
    let done = agent(model.clone(), 5).run("1/0?").await.unwrap();

    assert_eq!(done.answer, "0.25");
    let results: Vec<_> = done.conversation.tool_results().collect();
    assert_eq!(results.len(), 5);

    let kinds: Vec<Option<ErrorKind>> = results
        .iter()
        .map(|r| r.error.as_ref().map(|e| e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::DivisionByZero),
            Some(ErrorKind::UnknownTool),
            Some(ErrorKind::ArgumentValidation),
            Some(ErrorKind::ExpressionParse),
            None,
        ]
    );
    assert!(results[0].output.starts_with("Error (division_by_zero):"));
    assert!(!results[0].success);
    assert!(results[1].output.contains("sqrt"));
    assert_eq!(results[4].output, "0.25");

    // The model saw every error before its next turn.
    let second = &model.seen()[1];
    let tool_msgs: Vec<_> = second.iter().filter(|m| m.role == ChatRole::Tool).collect();
    assert_eq!(tool_msgs.len(), 4);
}

#[tokio::test]
async fn test_unavailable_search_is_recoverable() {
    let registry = Arc::new(
        ToolRegistry::with_default_tools(Arc::new(SymbolicEngine::new()), Arc::new(OfflineSearch))
            .unwrap(),
    );
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("s", "web_searcher", json!({"query": "anything"}))]),
        final_answer("Search is down."),
    ]));
    let done = Agent::new(model, registry, options(5))
        .run("look it up")
        .await
        .unwrap();

    let result = done.conversation.tool_results().next().unwrap();
    assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::SearchUnavailable);
}

// ============= Multiple calls per turn =============

async fn run_three_calls(parallel: bool) -> Vec<String> {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![
            call("1", "exponent", json!({"a": 2, "b": 10})),
            call("2", "add", json!({"a": 1, "b": 1})),
            call("3", "symbolic_derivative", json!({"expression": "5*x - 3*x**2"})),
        ]),
        final_answer("done"),
    ]));
    let mut opts = options(5);
    opts.parallel_tool_calls = parallel;
    let done = Agent::new(model, registry(), opts).run("three things").await.unwrap();

    let ids: Vec<_> = done
        .conversation
        .tool_results()
        .map(|r| r.tool_call_id.clone())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    outputs(&done.conversation)
}

#[tokio::test]
async fn test_parallel_results_keep_request_order() {
    assert_eq!(run_three_calls(true).await, vec!["1024.0", "2.0", "-6*x + 5"]);
}

#[tokio::test]
async fn test_sequential_results_keep_request_order() {
    assert_eq!(run_three_calls(false).await, vec!["1024.0", "2.0", "-6*x + 5"]);
}

#[tokio::test]
async fn test_missing_call_ids_are_generated() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("", "add", json!({"a": 1, "b": 2}))]),
        final_answer("3"),
    ]));
    let done = agent(model, 5).run("1 + 2").await.unwrap();

    let request_id = done
        .conversation
        .turns()
        .iter()
        .find_map(|t| match t {
            Turn::ToolRequests { calls, .. } => Some(calls[0].id.clone()),
            _ => None,
        })
        .unwrap();
    assert!(request_id.starts_with("call_"));
    let result = done.conversation.tool_results().next().unwrap();
    assert_eq!(result.tool_call_id, request_id);
}

// ============= Fatal failures =============

#[tokio::test]
async fn test_crashing_tool_aborts_the_run() {
    let registry = Arc::new(
        ToolRegistry::with_default_tools(Arc::new(CrashingCas), Arc::new(StubSearch::laplace()))
            .unwrap(),
    );
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("d", "symbolic_derivative", json!({"expression": "x**2"}))]),
        final_answer("unreachable"),
    ]));
    let err = Agent::new(model.clone(), registry, options(5))
        .run("differentiate")
        .await
        .unwrap_err();

    match &err {
        AgentError::Tool(ToolError::ToolExecution { tool, reason }) => {
            assert_eq!(tool, "symbolic_derivative");
            assert!(reason.contains("derivative backend crashed"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::ToolExecution);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_model_error_fails_the_run() {
    let model = Arc::new(ScriptedModel::with_results(vec![Err(ModelError::Status {
        status: 401,
        body: "invalid api key".into(),
    })]));
    let err = agent(model, 5).run("hi").await.unwrap_err();

    assert!(matches!(err, AgentError::Model(ModelError::Status { status: 401, .. })));
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
    assert_eq!(err.report().kind, ErrorKind::ModelUnavailable);
}

#[tokio::test]
async fn test_empty_tool_call_reply() {
    let model = Arc::new(ScriptedModel::new(vec![ModelReply::ToolCalls {
        content: Some("Nothing to compute: 42.".into()),
        calls: vec![],
    }]));
    let done = agent(model, 5).run("q").await.unwrap();
    assert_eq!(done.answer, "Nothing to compute: 42.");

    let model = Arc::new(ScriptedModel::new(vec![tool_calls(vec![])]));
    let err = agent(model, 5).run("q").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedModelResponse);
}

// ============= Timeouts and cancellation =============

#[tokio::test]
async fn test_model_timeout() {
    let model = Arc::new(SlowModel {
        delay: Duration::from_secs(10),
    });
    let opts = LoopOptions {
        model_timeout: Duration::from_millis(50),
        ..options(5)
    };
    let err = Agent::new(model, registry(), opts).run("slow").await.unwrap_err();
    assert_eq!(err, AgentError::ModelTimeout(Duration::from_millis(50)));
}

#[tokio::test]
async fn test_run_timeout() {
    let model = Arc::new(SlowModel {
        delay: Duration::from_secs(10),
    });
    let opts = LoopOptions {
        run_timeout: Duration::from_millis(50),
        ..options(5)
    };
    let err = Agent::new(model, registry(), opts).run("slow").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunTimeout);
}

#[tokio::test]
async fn test_cancellation() {
    let model = Arc::new(SlowModel {
        delay: Duration::from_secs(10),
    });
    let agent = agent(model, 5);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = agent.run_with_cancel("wait", cancel).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert_eq!(err.report().kind, ErrorKind::Cancelled);
}

fn slow_search_agent(search: &SlowSearch, opts: LoopOptions) -> Agent {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_calls(vec![call("s", "web_searcher", json!({"query": "slow"}))]),
        final_answer("unreachable"),
    ]));
    let search = SlowSearch {
        delay: search.delay,
        finished: Arc::clone(&search.finished),
    };
    let registry = ToolRegistry::with_default_tools(Arc::new(SymbolicEngine::new()), Arc::new(search))
        .unwrap();
    Agent::new(model, Arc::new(registry), opts)
}

#[tokio::test]
async fn test_run_timeout_aborts_running_tools() {
    let search = SlowSearch::new(Duration::from_millis(300));
    let opts = LoopOptions {
        run_timeout: Duration::from_millis(50),
        ..options(5)
    };
    let err = slow_search_agent(&search, opts).run("q").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunTimeout);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!search.finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancellation_aborts_running_tools() {
    let search = SlowSearch::new(Duration::from_millis(300));
    let opts = LoopOptions {
        parallel_tool_calls: false,
        ..options(5)
    };
    let agent = slow_search_agent(&search, opts);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = agent.run_with_cancel("q", cancel).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!search.finished.load(Ordering::SeqCst));
}
