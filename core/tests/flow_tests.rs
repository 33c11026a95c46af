// tests/flow_tests.rs
mod common;

use common::*;
use storefront_core::flow::skip_when;
use storefront_core::{ContextData, FlowRegistry, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn steps_run_in_declaration_order() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("step1", false, None), ("step2", false, None), ("step3", false, None)]);
  pipeline.on("step3", recording_handler("step3"));
  pipeline.on("step1", recording_handler("step1"));
  pipeline.on("step2", recording_handler("step2"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result, Ok(PipelineResult::Completed));
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_that_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);
  pipeline.after("only", recording_handler("after"));
  pipeline.on("only", recording_handler("on"));
  pipeline.before("only", recording_handler("before"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().steps_executed, vec!["before", "on", "after"]);
}

#[tokio::test]
#[serial]
async fn stop_halts_remaining_steps() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("a", false, None), ("b", false, None), ("c", false, None)]);
  pipeline.on("a", recording_handler("a"));
  pipeline.on("b", recording_handler("b"));
  pipeline.on("c", recording_handler("c"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("b".to_string()),
    ..Default::default()
  });
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result, Ok(PipelineResult::Stopped));
  assert_eq!(ctx.read().steps_executed, vec!["a", "b"]);
}

#[tokio::test]
#[serial]
async fn handler_error_is_returned_and_nothing_after_runs() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("good", false, None), ("bad", false, None), ("never", false, None)]);
  pipeline.on("good", recording_handler("good"));
  pipeline.on("bad", failing_handler("bad", "boom"));
  pipeline.after("bad", recording_handler("bad_after"));
  pipeline.on("never", recording_handler("never"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result, Err(TestError::Handler("boom".to_string())));
  assert_eq!(ctx.read().steps_executed, vec!["good", "bad"]);
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_fails_but_optional_is_passed_over() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("optional", true, None), ("required", false, None)]);
  let ctx = ContextData::new(TestContext::default());

  let result = pipeline.run(ctx.clone()).await;
  match result {
    Err(TestError::Flow(msg)) => assert!(msg.contains("HandlerMissing") && msg.contains("required")),
    other => panic!("expected HandlerMissing, got {:?}", other),
  }

  pipeline.on("required", recording_handler("required"));
  assert_eq!(pipeline.run(ctx.clone()).await, Ok(PipelineResult::Completed));
}

#[tokio::test]
#[serial]
async fn skip_condition_is_evaluated_against_current_state() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("first", false, None),
    ("second", false, skip_when(|c: &TestContext| c.skip_second)),
    ("third", false, None),
  ]);
  pipeline.on("first", |ctx: ContextData<TestContext>| async move {
    ctx.update(|c| {
      c.skip_second = true;
      c.steps_executed.push("first".to_string());
    });
    Ok::<_, TestError>(PipelineControl::Continue)
  });
  pipeline.on("second", recording_handler("second"));
  pipeline.on("third", recording_handler("third"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().steps_executed, vec!["first", "third"]);
}

#[test]
#[should_panic(expected = "not found in pipeline definition")]
fn registering_unknown_step_panics() {
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("known", false, None)]);
  pipeline.on("typo", recording_handler("typo"));
}

#[tokio::test]
#[serial]
async fn registry_dispatches_by_context_type() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();
  assert!(!registry.is_registered::<TestContext>());

  let unregistered = registry.run(ContextData::new(TestContext::default())).await;
  match unregistered {
    Err(TestError::Flow(msg)) => assert!(msg.contains("NotRegistered")),
    other => panic!("expected NotRegistered, got {:?}", other),
  }

  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("one", false, None)]);
  pipeline.on("one", recording_handler("one"));
  registry.register(pipeline);
  assert!(registry.is_registered::<TestContext>());

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(registry.run(ctx.clone()).await, Ok(PipelineResult::Completed));
  assert_eq!(ctx.read().steps_executed, vec!["one"]);
}
