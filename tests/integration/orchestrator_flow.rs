//! End-to-end request execution through the orchestrator.

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::timeout;

use conductor::agent::{Agent, AgentStatus};
use conductor::bus::{MessageBus, MessageKind};
use conductor::core::{ErrorCode, PlanProjection, PlanStatus, TaskPlan, TaskType};
use conductor::orchestration::{OrchestratorEvent, OrchestratorState, PlanObserver, TaskProgress};
use conductor::state::StateStore;

use crate::fixtures::{
    completed_tasks, default_agents, offline_config, task_for, with_agent, Harness,
    RecordingBridge, ScriptedAgent, ScriptedLlm,
};

fn manual_plan(groups: Vec<Vec<conductor::core::AgentTask>>) -> TaskPlan {
    let mut plan = TaskPlan::new("manual plan");
    for group in groups {
        plan.parallel_groups.push(group.iter().map(|t| t.id).collect());
        plan.tasks.extend(group);
    }
    plan
}

/// Test: Full platformer request
/// Given every default worker registered
/// When "create a platformer game" runs
/// Then all four tasks complete and the plan is marked completed
#[tokio::test]
async fn test_platformer_request_completes() {
    let agents = default_agents();
    let mut harness = Harness::new(agents.clone());

    let result = harness
        .orchestrator
        .execute_request("create a platformer game")
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(completed_tasks(&result).len(), 4);
    assert_eq!(result.artifacts.len(), 4);
    assert_eq!(result.tokens_used, 40);

    let calls: Vec<(String, usize)> = agents
        .iter()
        .map(|a| (a.config().id, a.calls()))
        .filter(|(_, calls)| *calls > 0)
        .collect();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|(_, n)| *n == 1));

    let plan = harness.store.get_current_plan().await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.checkpoint_id.is_some());
    assert_eq!(harness.orchestrator.state().await, OrchestratorState::Complete);

    assert_eq!(
        harness.states(),
        vec![
            OrchestratorState::Analyzing,
            OrchestratorState::Planning,
            OrchestratorState::Delegating,
            OrchestratorState::Monitoring,
            OrchestratorState::Delegating,
            OrchestratorState::Monitoring,
            OrchestratorState::Integrating,
            OrchestratorState::Verifying,
            OrchestratorState::Complete,
        ]
    );
}

/// Test: Fail-fast across groups
/// Given groups [[A, B], [C]] where B fails
/// When the plan executes
/// Then B's result is returned and C never runs
#[tokio::test]
async fn test_failure_stops_later_groups() {
    let a = ScriptedAgent::ok("scene_agent");
    let b = ScriptedAgent::failing("script_agent");
    let c = ScriptedAgent::ok("integration_agent");
    let harness = Harness::new(vec![a.clone(), b.clone(), c.clone()]);

    let task_a = task_for("scene_agent", TaskType::CreateScene);
    let task_b = task_for("script_agent", TaskType::CreateScript);
    let task_c = task_for("integration_agent", TaskType::IntegrateAsset);
    let b_id = task_b.id;
    let plan = manual_plan(vec![vec![task_a, task_b], vec![task_c]]);
    harness.store.set_current_plan(plan.clone()).await.unwrap();

    let result = harness.orchestrator.execute_plan(&plan).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.task_id, b_id);
    assert_eq!(result.agent_id, "script_agent");
    assert_eq!(result.error_code(), Some(ErrorCode::AgentFailed));
    assert_eq!(a.calls(), 1, "A shares B's group and still runs");
    assert_eq!(c.calls(), 0, "C must never be invoked");

    let stored = harness.store.get_current_plan().await.unwrap().unwrap();
    assert_eq!(stored.status, PlanStatus::Failed);
}

/// Test: Two failures in one group
/// Given groups [[A, B], [C]] where both A and B fail
/// Then A's result is surfaced (first in group order) and C never runs
#[tokio::test]
async fn test_first_failure_in_group_order_wins() {
    let a = ScriptedAgent::failing("scene_agent");
    let b = ScriptedAgent::failing("script_agent");
    let c = ScriptedAgent::ok("integration_agent");
    let harness = Harness::new(vec![a.clone(), b.clone(), c.clone()]);

    let task_a = task_for("scene_agent", TaskType::CreateScene);
    let task_b = task_for("script_agent", TaskType::CreateScript);
    let task_c = task_for("integration_agent", TaskType::IntegrateAsset);
    let a_id = task_a.id;
    let plan = manual_plan(vec![vec![task_a, task_b], vec![task_c]]);

    let result = harness.orchestrator.execute_plan(&plan).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.task_id, a_id);
    assert_eq!(result.agent_id, "scene_agent");
    assert_eq!(result.error.unwrap().message, "scene_agent refused");
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 0);
}

/// Test: Overlapping requests
/// Given a request held in monitoring by a gated worker
/// When a second request arrives
/// Then the second is refused and the first still completes normally
#[tokio::test]
async fn test_overlapping_request_is_refused() {
    let barrier = Arc::new(Barrier::new(2));
    let scene = ScriptedAgent::gated("scene_agent", barrier.clone());
    let mut harness = Harness::new(with_agent(default_agents(), scene.clone()));
    let orchestrator = &harness.orchestrator;

    let first = orchestrator.execute_request("create a new scene named Arena");
    let second = async {
        while orchestrator.state().await != OrchestratorState::Monitoring {
            tokio::task::yield_now().await;
        }
        let refused = orchestrator
            .execute_request("create a new scene named Forest")
            .await;
        barrier.wait().await;
        refused
    };

    let (first, second) = timeout(Duration::from_secs(5), async { tokio::join!(first, second) })
        .await
        .expect("the gated worker must be released");

    assert!(!second.success);
    let error = second.error.unwrap();
    assert_eq!(error.code, ErrorCode::ExecutionFailed);
    assert!(error.recoverable);
    assert!(error.message.contains("busy"));

    assert!(first.success, "unexpected failure: {:?}", first.error);
    assert_eq!(scene.calls(), 1);
    assert_eq!(orchestrator.state().await, OrchestratorState::Complete);
    let plan = harness.store.get_current_plan().await.unwrap().unwrap();
    assert_eq!(plan.user_request, "create a new scene named Arena");
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(harness.store.checkpoint_count().await, 1);

    assert!(!harness.states().contains(&OrchestratorState::Error));
}

/// Test: Failing request leaves the orchestrator in the error state
#[tokio::test]
async fn test_failed_request_returns_worker_result() {
    let agents = with_agent(default_agents(), ScriptedAgent::failing("script_agent"));
    let mut harness = Harness::new(agents);

    let result = harness
        .orchestrator
        .execute_request("create a new scene with a movement script")
        .await;

    assert!(!result.success);
    assert_eq!(result.agent_id, "script_agent");
    assert_eq!(result.error.as_ref().unwrap().message, "script_agent refused");
    assert_eq!(harness.orchestrator.state().await, OrchestratorState::Error);
    assert_eq!(harness.states().last(), Some(&OrchestratorState::Error));
    assert_eq!(
        harness.pool.status("script_agent"),
        Some(AgentStatus::Error)
    );
    assert_eq!(harness.pool.status("scene_agent"), Some(AgentStatus::Idle));
}

/// Test: Missing worker
/// Given a task assigned to an unregistered agent
/// Then the result carries NO_AGENT and is not recoverable
#[tokio::test]
async fn test_missing_agent_is_reported() {
    let harness = Harness::new(default_agents());
    let plan = manual_plan(vec![vec![task_for("ghost_agent", TaskType::Custom)]]);

    let result = harness.orchestrator.execute_plan(&plan).await.unwrap();

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.code, ErrorCode::NoAgent);
    assert!(!error.recoverable);
    assert!(error.message.contains("ghost_agent"));
}

/// Test: A worker returning `Err` is contained as a failed result
#[tokio::test]
async fn test_agent_error_becomes_failed_result() {
    let harness = Harness::new(vec![ScriptedAgent::erroring("general_agent")]);
    let plan = manual_plan(vec![vec![task_for("general_agent", TaskType::Custom)]]);

    let result = harness.orchestrator.execute_plan(&plan).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error_code(), Some(ErrorCode::AgentFailed));
    assert!(result.error.unwrap().message.contains("boom"));
}

/// Test: Checkpoint before side effects, rollback restores it
#[tokio::test]
async fn test_checkpoint_and_rollback() {
    let harness = Harness::new(default_agents());
    harness.store.put_scene("res://Main.tscn", "Node2D").await;

    let result = harness
        .orchestrator
        .execute_request("create a new scene named Arena")
        .await;
    assert!(result.success);

    let plan = harness.store.get_current_plan().await.unwrap().unwrap();
    let checkpoint = plan.checkpoint_id.clone().unwrap();
    assert_eq!(harness.store.checkpoint_count().await, 1);
    let (label, author) = harness.store.checkpoint_info(&checkpoint).await.unwrap();
    assert_eq!(label, "Before: create a new scene named Arena");
    assert_eq!(author, "orchestrator");

    // Simulate the worker's side effect landing in the project.
    harness.store.put_scene("res://Arena.tscn", "Node2D").await;
    assert!(harness.orchestrator.rollback(None).await.unwrap());

    let state = harness.store.get_state().await.unwrap();
    assert!(state.scenes.contains_key("res://Main.tscn"));
    assert!(!state.scenes.contains_key("res://Arena.tscn"));
    assert!(state.current_plan_id.is_none());

    // The restored snapshot predates the plan, so there is nothing left to undo.
    assert!(!harness.orchestrator.rollback(None).await.unwrap());
}

/// Test: Rolling back to an unknown checkpoint reports false and changes nothing
#[tokio::test]
async fn test_rollback_unknown_checkpoint() {
    let harness = Harness::new(default_agents());
    harness.store.put_scene("res://Main.tscn", "Node2D").await;
    let missing = conductor::core::CheckpointId("checkpoint-missing".to_string());

    let restored = harness.orchestrator.rollback(Some(missing)).await.unwrap();

    assert!(!restored);
    let state = harness.store.get_state().await.unwrap();
    assert!(state.scenes.contains_key("res://Main.tscn"));
}

/// Test: Strict verification
/// Given a model plan with a dependency cycle (truncated by default)
/// When the request runs under the strict verify policy
/// Then the result is VERIFICATION_FAILED
#[tokio::test]
async fn test_strict_verification_rejects_partial_plan() {
    let reply = r#"[{"type": "create_scene"}, {"type": "custom", "depends_on": [2]}, {"type": "custom", "depends_on": [1]}]"#;

    let mut config = offline_config();
    config.planner.use_llm = true;
    config.orchestrator.verify_policy = conductor::config::VerifyPolicy::Strict;
    let harness = Harness::build(
        default_agents(),
        config,
        ScriptedLlm::replying(reply),
        Arc::new(RecordingBridge::default()),
    );

    let result = harness.orchestrator.execute_request("build the arena").await;

    assert!(!result.success);
    assert_eq!(result.error_code(), Some(ErrorCode::VerificationFailed));
    assert_eq!(harness.orchestrator.state().await, OrchestratorState::Error);
    let plan = harness.store.get_current_plan().await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Failed);
}

/// Test: The same partial plan only logs under the default policy
#[tokio::test]
async fn test_lenient_verification_reports_success() {
    let reply = r#"[{"type": "create_scene"}, {"type": "custom", "depends_on": [2]}, {"type": "custom", "depends_on": [1]}]"#;

    let mut config = offline_config();
    config.planner.use_llm = true;
    let harness = Harness::build(
        default_agents(),
        config,
        ScriptedLlm::replying(reply),
        Arc::new(RecordingBridge::default()),
    );

    let result = harness.orchestrator.execute_request("build the arena").await;

    assert!(result.success);
    assert_eq!(completed_tasks(&result).len(), 1);
    assert_eq!(harness.orchestrator.state().await, OrchestratorState::Complete);
}

/// Test: Host progress mirror sees the plan and each step's transitions
#[tokio::test]
async fn test_progress_is_mirrored_to_bridge() {
    let harness = Harness::new(default_agents());

    let result = harness
        .orchestrator
        .execute_request("create a new scene named Arena")
        .await;
    assert!(result.success);

    let published = harness.bridge.calls_named("set_task_plan");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["name"], "create a new scene named Arena");
    assert_eq!(published[0]["steps"][0]["index"], 0);
    assert_eq!(published[0]["steps"][0]["status"], "pending");
    assert_eq!(published[0]["steps"][0]["agent"], "scene_agent");

    let updates = harness.bridge.calls_named("update_plan");
    assert_eq!(
        updates,
        vec![
            json!({ "step_index": 0, "status": "in_progress" }),
            json!({ "step_index": 0, "status": "completed" }),
        ]
    );
}

/// Test: An offline editor does not affect execution
#[tokio::test]
async fn test_bridge_failures_do_not_fail_the_plan() {
    let harness = Harness::build(
        default_agents(),
        offline_config(),
        ScriptedLlm::offline(),
        RecordingBridge::offline(),
    );

    let result = harness
        .orchestrator
        .execute_request("create a new scene named Arena")
        .await;

    assert!(result.success);
    assert!(!harness.bridge.calls_named("update_plan").is_empty());
}

#[derive(Default)]
struct CapturingObserver {
    seen: Mutex<Vec<PlanProjection>>,
}

impl PlanObserver for CapturingObserver {
    fn on_plan_created(&self, projection: &PlanProjection) {
        self.seen.lock().unwrap().push(projection.clone());
    }
}

/// Test: Observer and event channel see the plan and per-task progress
#[tokio::test]
async fn test_plan_observer_and_task_events() {
    let observer = Arc::new(CapturingObserver::default());
    let mut harness = Harness::build_observed(
        default_agents(),
        offline_config(),
        ScriptedLlm::offline(),
        Arc::new(RecordingBridge::default()),
        Some(observer.clone()),
    );

    let result = harness
        .orchestrator
        .execute_request("create a new scene named Arena")
        .await;
    assert!(result.success);

    let seen = observer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].tasks.len(), 1);
    assert!(seen[0].tasks.iter().all(|t| t.status == "pending"));

    let events = harness.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::PlanCreated(p) if p.id == seen[0].id)));

    let progress: Vec<TaskProgress> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::AgentStatus {
                agent_id, progress, ..
            } if agent_id == "scene_agent" => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![TaskProgress::Working, TaskProgress::Completed]);
}

/// Test: Workers are told about their tasks over the bus
#[tokio::test]
async fn test_task_requests_go_over_the_bus() {
    let harness = Harness::new(default_agents());
    harness.orchestrator.subscribe().await.unwrap();

    let result = harness
        .orchestrator
        .execute_request("create a new scene named Arena")
        .await;
    assert!(result.success);

    let requests: Vec<_> = harness
        .bus
        .history()
        .await
        .into_iter()
        .filter(|m| m.kind == MessageKind::TaskRequest)
        .collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].from, "orchestrator");
    assert_eq!(requests[0].to, "scene_agent");
    assert_eq!(requests[0].payload["task"]["type"], "create_scene");

    let info = harness.bus.agent("scene_agent").await.unwrap();
    assert_eq!(info.status, AgentStatus::Idle);
    assert!(harness.bus.agent("orchestrator").await.is_some());
}

/// Test: Worker status updates reach the event channel
#[tokio::test]
async fn test_status_updates_from_workers_are_forwarded() {
    let mut harness = Harness::new(default_agents());
    harness.orchestrator.subscribe().await.unwrap();

    harness
        .bus
        .sessions_send(
            "tileset_agent",
            "orchestrator",
            json!({ "progress": 0.5 }),
            MessageKind::StatusUpdate,
        )
        .await
        .unwrap();

    let events = harness.drain_events();
    assert_eq!(
        events,
        vec![OrchestratorEvent::StatusUpdate {
            from: "tileset_agent".to_string(),
            payload: json!({ "progress": 0.5 }),
        }]
    );
}
