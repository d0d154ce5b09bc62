//! Compiled chains running end-to-end on the dispatcher with a mock
//! completion backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use hivemind_chain::{
    build_auto_chain, compile, AutoChainOptions, BuiltInPerspective, ChainDefinition, Depth,
};
use hivemind_core::{CompletionBackend, CompletionOptions, SwarmConfig, SwarmResult};
use hivemind_dispatch::Dispatcher;
use std::sync::Arc;

/// Answers every prompt with a short tag of what it was asked.
struct TaggingBackend;

#[async_trait]
impl CompletionBackend for TaggingBackend {
    async fn complete(&self, prompt: &str, _opts: &CompletionOptions) -> SwarmResult<String> {
        let instruction = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Task: "))
            .unwrap_or("?");
        let head: String = instruction.chars().take(30).collect();
        Ok(format!("Handled: {head}."))
    }
}

fn dispatcher() -> Dispatcher {
    let mut config = SwarmConfig::default();
    config.scaling.backoff_base_ms = 0;
    Dispatcher::new(config, Arc::new(TaggingBackend) as Arc<dyn CompletionBackend>)
}

#[tokio::test]
async fn test_compiled_chain_runs_through_orchestrate() {
    let json = r#"{
        "name": "three step",
        "input": "raw notes about the quarter",
        "stages": [
            {"name": "Extract", "mode": "single", "perspective": "extractor", "prompt": "Extract signals"},
            {"name": "Views", "mode": "fan-out",
             "perspectives": ["analyst", "challenger"], "prompt": "Weigh the signals"},
            {"name": "Merge", "mode": "reduce", "perspective": "synthesizer", "prompt": "Synthesize the takes"}
        ]
    }"#;
    let def = ChainDefinition::from_json(json).unwrap();
    let phases = compile(def).unwrap();

    let outcome = dispatcher().orchestrate(phases).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.phases.len(), 3);
    assert_eq!(outcome.phases[0].results.len(), 1);
    assert_eq!(outcome.phases[1].results.len(), 2, "one task per perspective");
    assert_eq!(outcome.phases[2].results.len(), 1);
    assert!(outcome.final_output().unwrap().starts_with("Handled:"));
}

#[tokio::test]
async fn test_auto_chain_runs_end_to_end() {
    let def = build_auto_chain(&AutoChainOptions {
        task: "Summarize the findings".to_string(),
        data: Some("finding one\nfinding two\nfinding three".to_string()),
        depth: Depth::Quick,
        ..AutoChainOptions::default()
    });
    let phases = compile(def).unwrap();

    let outcome = dispatcher().orchestrate(phases).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.phases.len(), 2);
    assert!(outcome.final_output().is_some());
}

#[tokio::test]
async fn test_invalid_chain_never_reaches_the_dispatcher() {
    let def = ChainDefinition {
        name: "broken".to_string(),
        input: None,
        stages: vec![hivemind_chain::Stage {
            mode: hivemind_chain::StageMode::FanOut,
            ..hivemind_chain::Stage::default()
        }],
    };
    assert!(compile(def).is_err());
}

#[tokio::test]
async fn test_fan_out_tasks_get_distinct_personas_at_runtime() {
    let def = ChainDefinition {
        name: "fan".to_string(),
        input: Some("the data".to_string()),
        stages: vec![hivemind_chain::Stage {
            name: Some("Fan".to_string()),
            mode: hivemind_chain::StageMode::FanOut,
            perspectives: vec![
                BuiltInPerspective::Analyst.into(),
                BuiltInPerspective::Critic.into(),
            ],
            ..hivemind_chain::Stage::default()
        }],
    };
    let phases = compile(def).unwrap();
    let tasks = phases[0].source.resolve(&[]);

    assert_eq!(tasks.len(), 2);
    assert_ne!(tasks[0].system_prompt, tasks[1].system_prompt);
    assert!(tasks.iter().all(|t| t.input == "the data"));

    let outcome = dispatcher().orchestrate(phases).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.phases[0].results.len(), 2);
}
