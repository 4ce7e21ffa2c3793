//! End-to-end dispatch: routing, fusion, messaging and persistence through
//! the public `Dispatcher` surface.

use std::sync::Arc;
use std::time::Duration;

use chorus::config::BackendKind;
use chorus::engine::Outcome;
use chorus::providers::MockCompletion;
use chorus::registry::AgentRegistry;
use chorus::routing::{RouteTarget, RoutingDecision};
use chorus::storage::InMemoryBackupStore;
use chorus::{AgentId, ChorusError, Config, Dispatcher, FusionStatus, Participant};

async fn dispatcher(dir: &std::path::Path, mock: MockCompletion) -> Dispatcher {
    let mut config = Config::default();
    config.storage.state_dir = dir.join("state");
    config.fusion.timeout_ms = 500;
    Dispatcher::assemble(
        config,
        AgentRegistry::builtin().unwrap(),
        Arc::new(mock),
        Arc::new(InMemoryBackupStore::new()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_compare_query_fuses_lumina_and_nova() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(
        dir.path(),
        MockCompletion::new()
            .reply("lumina", "People will feel respected by it.")
            .reply("nova", "The cache invalidation is sound."),
    )
    .await;

    let reply = d
        .handle_text("Compare the emotional and technical tradeoffs of this design")
        .await
        .unwrap();

    assert_eq!(
        reply.decision,
        RoutingDecision::Fusion {
            agent_ids: vec![AgentId::from("lumina"), AgentId::from("nova")]
        }
    );
    let fusion = reply.fusion.unwrap();
    assert_eq!(fusion.status, FusionStatus::Complete);
    assert!(reply.text.contains("### Lumina [lumina]"));
    assert!(reply.text.contains("### Nova [nova]"));
    assert!(reply.text.contains("Contributors: lumina, nova"));

    let lumina_log = d
        .bridge()
        .history(&Participant::User, &Participant::agent("lumina"), 10);
    let intents: Vec<&str> = lumina_log.iter().map(|m| m.intent.as_str()).collect();
    assert_eq!(intents, vec!["fusion_response", "fusion_query"]);
}

#[tokio::test]
async fn test_fusion_with_failing_agent_notes_missing() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(
        dir.path(),
        MockCompletion::new()
            .reply("lumina", "It is kind.")
            .fail("nova", "model crashed"),
    )
    .await;

    let reply = d
        .handle_text("Compare the emotional and technical tradeoffs of this design")
        .await
        .unwrap();
    let fusion = reply.fusion.unwrap();

    assert_eq!(fusion.status, FusionStatus::Complete);
    assert_eq!(fusion.responses.len(), 1);
    assert!(fusion.responses.contains_key(&AgentId::from("lumina")));
    assert_eq!(fusion.missing, vec![AgentId::from("nova")]);
    assert!(reply.text.contains("Did not respond: nova"));

    let nova = d.health().check_health(&AgentId::from("nova")).unwrap();
    assert_eq!(nova.error_count, 1);
}

#[tokio::test]
async fn test_slow_agent_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(
        dir.path(),
        MockCompletion::new()
            .reply("sage", "Consider the long view.")
            .delayed("muse", Duration::from_secs(10), "A poem, eventually."),
    )
    .await;

    let reply = d.handle_line("/use sage,muse").await.unwrap();
    assert!(matches!(reply, Outcome::Info(_)));

    let reply = d.handle_text("what should I do next").await.unwrap();
    let fusion = reply.fusion.unwrap();
    assert_eq!(fusion.status, FusionStatus::Timeout);
    assert_eq!(fusion.missing, vec![AgentId::from("muse")]);
    assert!(fusion.completed_at.is_some());
}

#[tokio::test]
async fn test_unmatched_text_falls_back_to_default_agent() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(dir.path(), MockCompletion::new().reply("echo", "Sure.")).await;

    let reply = d.handle_text("zxqv blorp").await.unwrap();
    assert_eq!(
        reply.decision,
        RoutingDecision::Single {
            target: RouteTarget::Agent(AgentId::from("echo"))
        }
    );
    assert_eq!(reply.text, "Sure.");
}

#[tokio::test]
async fn test_direct_address_bypasses_router() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(dir.path(), MockCompletion::new().reply("sage", "Patience.")).await;

    let Outcome::Reply(reply) = d.handle_line("@sage: What's the weather?").await.unwrap() else {
        panic!("expected a reply");
    };
    assert_eq!(reply.text, "Patience.");

    let err = d.handle_line("@ghost: hello").await.unwrap_err();
    assert!(matches!(err, ChorusError::UnknownAgent { .. }));
}

#[tokio::test]
async fn test_history_timestamps_never_decrease() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(dir.path(), MockCompletion::new()).await;

    for i in 0..5 {
        d.ask_agent(&AgentId::from("nova"), &format!("question {}", i))
            .await
            .unwrap();
    }

    let history = d
        .bridge()
        .history(&Participant::User, &Participant::agent("nova"), 100);
    assert_eq!(history.len(), 10);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }
    assert_eq!(history.last().unwrap().payload, "question 0");
}

#[tokio::test]
async fn test_init_from_registry_file_with_echo_backend() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("agents.yaml");
    std::fs::write(
        &registry,
        r#"
agents:
  - id: helper
    display_name: Helper
    trigger_phrases: [help]
  - id: coder
    display_name: Coder
    capability_tags: [code]
    trigger_phrases: [code, compile error]
"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.registry_path = Some(registry);
    config.router.default_agent = AgentId::from("helper");
    config.provider.backend = BackendKind::Echo;
    config.storage.state_dir = dir.path().join("state");
    config.storage.agents_dir = dir.path().join("agents");
    config.storage.backup_dir = dir.path().join("backups");

    let d = Dispatcher::init(config).await.unwrap();
    assert_eq!(d.registry().len(), 2);
    // every agent gets a baseline snapshot to resurrect from
    assert!(dir.path().join("backups/helper").is_dir());
    assert!(dir.path().join("backups/coder").is_dir());

    let reply = d.handle_text("I have a compile error").await.unwrap();
    assert_eq!(reply.text, "coder heard: I have a compile error");
    d.close().await.unwrap();
    assert!(dir.path().join("state/emotions.json").exists());
    assert!(dir.path().join("state/health.json").exists());
}

#[tokio::test]
async fn test_init_rejects_missing_default_agent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.router.default_agent = AgentId::from("nobody");
    config.storage.state_dir = dir.path().join("state");

    let err = Dispatcher::assemble(
        config,
        AgentRegistry::builtin().unwrap(),
        Arc::new(MockCompletion::new()),
        Arc::new(InMemoryBackupStore::new()),
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(
        err,
        ChorusError::Config(_) | ChorusError::UnknownAgent { .. }
    ));
}
