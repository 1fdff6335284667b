#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
    use crate::config::{TestflowConfig, WorkflowConfig};
    use crate::core::{EventKind, StageId};
    use crate::errors::{StageError, WorkflowError};
    use crate::events::{CollectingEventSink, ProgressChannel};
    use crate::extract::FAILURE_PREFIX;
    use crate::llm::LlmClient;
    use crate::stages::{FnStage, Stage};
    use crate::state::{fields, Message, RunId, SessionState, StateUpdate};
    use crate::testing::{
        assert_failure_mentions, assert_full_progress, assert_generated, assert_no_errors,
        assert_single_error, EventRecorder, FailingStage, RecordingStage, ScriptedLlmClient,
        SlowStage, SuccessStage,
    };
    use crate::workflow::{failure_string, RunRequest, WorkflowBuilder, WorkflowExecutor};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const SOURCE: &str = "public class Calculator {\n  int add(int a, int b) { return a + b; }\n}\n";
    const GENERATED: &str = "class CalculatorTest {}";

    fn recorded_channel() -> (Arc<ProgressChannel>, EventRecorder) {
        let channel = Arc::new(ProgressChannel::new());
        let recorder = EventRecorder::attach(&channel);
        (channel, recorder)
    }

    fn happy_builder(channel: Arc<ProgressChannel>) -> WorkflowBuilder {
        WorkflowBuilder::new()
            .stage(SuccessStage::answering(StageId::Dependency, "deps"))
            .stage(SuccessStage::answering(StageId::Context, "ctx"))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
    }

    #[derive(Debug)]
    struct PanickingStage(StageId);

    #[async_trait]
    impl Stage for PanickingStage {
        fn id(&self) -> StageId {
            self.0
        }

        async fn run(&self, _state: &SessionState) -> Result<StateUpdate, StageError> {
            panic!("stage exploded");
        }
    }

    #[tokio::test]
    async fn test_happy_path_reports_every_stage_once() {
        let (channel, recorder) = recorded_channel();
        let executor = happy_builder(channel).build().unwrap();

        let outcome = executor.run(SOURCE).await.unwrap();

        assert_eq!(outcome.result, GENERATED);
        assert_eq!(outcome.stages_completed, StageId::ALL.to_vec());
        assert_full_progress(&recorder);
        assert_no_errors(&recorder);
        assert!(!executor.is_active(&outcome.run_id));
    }

    #[tokio::test]
    async fn test_execute_returns_plain_result() {
        let (channel, recorder) = recorded_channel();
        let executor = happy_builder(channel).build().unwrap();

        let output = executor.execute(SOURCE).await;

        assert_generated(&output);
        assert_eq!(output, GENERATED);
        assert_eq!(recorder.progress().len(), 3);
    }

    #[tokio::test]
    async fn test_events_follow_stage_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = happy_builder(Arc::new(ProgressChannel::new()))
            .event_sink(sink.clone())
            .build()
            .unwrap();

        executor.run(SOURCE).await.unwrap();

        let mut expected = vec![EventKind::RunStarted];
        for _ in StageId::ALL {
            expected.extend([
                EventKind::StageStarted,
                EventKind::CheckpointSaved,
                EventKind::StageCompleted,
            ]);
        }
        expected.push(EventKind::RunCompleted);
        assert_eq!(sink.kinds(), expected);

        let stages: Vec<_> = sink
            .events_of_kind(EventKind::StageCompleted)
            .into_iter()
            .filter_map(|e| e.stage)
            .collect();
        assert_eq!(stages, StageId::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_source_reaches_every_stage_unchanged() {
        let dependency = Arc::new(RecordingStage::with_update(
            StageId::Dependency,
            StateUpdate::new()
                .set(fields::CODE, SOURCE)
                .set(fields::DEPENDENCY_ANALYSIS, "uses nothing"),
        ));
        let context = Arc::new(RecordingStage::new(StageId::Context));
        let generation = Arc::new(RecordingStage::with_update(
            StageId::Generation,
            StateUpdate::new().append(Message::assistant(GENERATED)),
        ));
        let executor = WorkflowBuilder::new()
            .shared_stage(dependency.clone())
            .shared_stage(context.clone())
            .shared_stage(generation.clone())
            .build()
            .unwrap();

        executor.run(SOURCE).await.unwrap();

        for stage in [&dependency, &context, &generation] {
            let seen = stage.seen();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].get_str(fields::CODE), Some(SOURCE));
        }
        assert_eq!(
            generation.seen()[0].get_str(fields::DEPENDENCY_ANALYSIS),
            Some("uses nothing")
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_any_stage() {
        let (channel, recorder) = recorded_channel();
        let dependency = Arc::new(RecordingStage::new(StageId::Dependency));
        let executor = WorkflowBuilder::new()
            .shared_stage(dependency.clone())
            .stage(SuccessStage::new(StageId::Context))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
            .build()
            .unwrap();

        for input in ["", "  \n\t"] {
            let err = executor.run(input).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Consistency(_)));
        }

        assert_eq!(dependency.execution_count(), 0);
        assert!(recorder.progress().is_empty());
        assert_eq!(recorder.error_phases(), vec!["execution", "execution"]);
    }

    #[tokio::test]
    async fn test_stage_failure_is_reported_once() {
        let (channel, recorder) = recorded_channel();
        let context = Arc::new(RecordingStage::new(StageId::Context));
        let generation = Arc::new(RecordingStage::new(StageId::Generation));
        let executor = WorkflowBuilder::new()
            .stage(FailingStage::new(StageId::Dependency, "manifest unreadable"))
            .shared_stage(context.clone())
            .shared_stage(generation.clone())
            .channel(channel)
            .build()
            .unwrap();

        let output = executor.execute(SOURCE).await;

        assert_failure_mentions(&output, "manifest unreadable");
        assert!(output.starts_with(&format!("{FAILURE_PREFIX}[dependency]")));
        assert_single_error(&recorder, "dependency");
        assert!(recorder.progress().is_empty());
        assert_eq!(context.execution_count(), 0);
        assert_eq!(generation.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_stage_may_not_rewrite_source() {
        let (channel, recorder) = recorded_channel();
        let store = Arc::new(MemoryCheckpointStore::new());
        let generation = Arc::new(RecordingStage::new(StageId::Generation));
        let executor = WorkflowBuilder::new()
            .stage(FnStage::new(StageId::Dependency, |_: &SessionState| {
                Ok(StateUpdate::new().set(fields::CODE, "tampered"))
            }))
            .stage(SuccessStage::new(StageId::Context))
            .shared_stage(generation.clone())
            .checkpoint_store(store.clone())
            .channel(channel)
            .build()
            .unwrap();
        let run_id = RunId::new();

        let err = executor
            .run_request(RunRequest::new(SOURCE).with_run_id(run_id))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(StageId::Dependency));
        assert!(err.to_string().contains("source text"));
        assert_single_error(&recorder, "dependency");
        assert!(recorder.progress().is_empty());
        assert_eq!(generation.execution_count(), 0);
        assert!(store.load(&run_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_output_validation_failure_carries_generation_phase() {
        let (channel, recorder) = recorded_channel();
        let executor = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SuccessStage::new(StageId::Context))
            .stage(FailingStage::output_validation(
                StageId::Generation,
                "generated output is empty",
            ))
            .channel(channel)
            .build()
            .unwrap();

        let err = executor.run(SOURCE).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::OutputValidation {
                stage: StageId::Generation,
                ..
            }
        ));
        assert_eq!(recorder.progress(), vec![StageId::Dependency, StageId::Context]);
        assert_single_error(&recorder, "generation");
    }

    #[tokio::test]
    async fn test_missing_terminal_message_is_a_consistency_error() {
        let (channel, recorder) = recorded_channel();
        let executor = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SuccessStage::new(StageId::Context))
            .stage(SuccessStage::new(StageId::Generation))
            .channel(channel)
            .build()
            .unwrap();

        let err = executor.run(SOURCE).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Consistency(ref m) if m == "no result produced"));
        assert_full_progress(&recorder);
        assert_single_error(&recorder, "execution");
    }

    #[tokio::test]
    async fn test_panicking_stage_becomes_stage_error() {
        let (channel, recorder) = recorded_channel();
        let executor = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(PanickingStage(StageId::Context))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
            .build()
            .unwrap();

        let err = executor.run(SOURCE).await.unwrap_err();

        assert_eq!(err.stage(), Some(StageId::Context));
        assert!(err.to_string().contains("panicked"));
        assert_single_error(&recorder, "context");
    }

    #[tokio::test]
    async fn test_builder_rejects_missing_stage() {
        let (channel, recorder) = recorded_channel();

        let err = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SuccessStage::new(StageId::Context))
            .channel(channel)
            .build()
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Initialization(_)));
        assert!(err.to_string().contains("generation"));
        assert_single_error(&recorder, "initialization");
    }

    #[tokio::test]
    async fn test_builder_rejects_duplicate_stage() {
        let err = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SuccessStage::new(StageId::Context))
            .stage(SuccessStage::new(StageId::Generation))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("bound 2 times"));
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let (channel, recorder) = recorded_channel();
        let executor = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SlowStage::new(StageId::Context, Duration::from_secs(5)))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
            .stage_timeout(Some(Duration::from_millis(50)))
            .build()
            .unwrap();

        let err = executor.run(SOURCE).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Timeout {
                stage: StageId::Context,
                ..
            }
        ));
        assert_eq!(recorder.progress(), vec![StageId::Dependency]);
        assert_single_error(&recorder, "context");
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (channel, recorder) = recorded_channel();
        let dependency = Arc::new(RecordingStage::new(StageId::Dependency));
        let executor = WorkflowBuilder::new()
            .shared_stage(dependency.clone())
            .stage(SuccessStage::new(StageId::Context))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
            .build()
            .unwrap();

        let token = Arc::new(CancellationToken::new());
        token.cancel("user abort");
        let err = executor
            .run_request(RunRequest::new(SOURCE).with_cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled(ref r) if r == "user abort"));
        assert_eq!(dependency.execution_count(), 0);
        assert_single_error(&recorder, "execution");
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_stage() {
        let (channel, recorder) = recorded_channel();
        let executor = WorkflowBuilder::new()
            .stage(SuccessStage::new(StageId::Dependency))
            .stage(SlowStage::new(StageId::Context, Duration::from_secs(5)))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .channel(channel)
            .build()
            .unwrap();

        let token = Arc::new(CancellationToken::new());
        let trigger = Arc::clone(&token);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel("shutdown");
        });

        let err = executor
            .run_request(RunRequest::new(SOURCE).with_cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled(ref r) if r == "shutdown"));
        assert_eq!(recorder.progress(), vec![StageId::Dependency]);
        assert_single_error(&recorder, "execution");
    }

    #[tokio::test]
    async fn test_resume_skips_completed_stages() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let run_id = RunId::derive("Calculator.java", SOURCE);

        let failing = WorkflowBuilder::new()
            .stage(SuccessStage::answering(StageId::Dependency, "deps"))
            .stage(FailingStage::new(StageId::Context, "model unavailable"))
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .checkpoint_store(store.clone())
            .build()
            .unwrap();
        let err = failing
            .run_request(RunRequest::new(SOURCE).with_run_id(run_id))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(StageId::Context));

        let record = store.load(&run_id).await.unwrap().unwrap();
        assert_eq!(record.last_stage, StageId::Dependency);

        let dependency = Arc::new(RecordingStage::new(StageId::Dependency));
        let context = Arc::new(RecordingStage::new(StageId::Context));
        let (channel, recorder) = recorded_channel();
        let retry = WorkflowBuilder::new()
            .shared_stage(dependency.clone())
            .shared_stage(context.clone())
            .stage(SuccessStage::answering(StageId::Generation, GENERATED))
            .checkpoint_store(store.clone())
            .channel(channel)
            .build()
            .unwrap();

        let outcome = retry.resume(run_id).await.unwrap();

        assert_eq!(outcome.result, GENERATED);
        assert_eq!(
            outcome.stages_completed,
            vec![StageId::Context, StageId::Generation]
        );
        assert_eq!(dependency.execution_count(), 0);
        assert_eq!(context.seen()[0].get_str(fields::CODE), Some(SOURCE));
        assert_eq!(recorder.progress(), vec![StageId::Context, StageId::Generation]);
        assert_no_errors(&recorder);
    }

    #[tokio::test]
    async fn test_resume_of_completed_run_returns_stored_result() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let sink = Arc::new(CollectingEventSink::new());
        let executor = happy_builder(Arc::new(ProgressChannel::new()))
            .checkpoint_store(store.clone())
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let first = executor.run(SOURCE).await.unwrap();
        sink.clear();
        let again = executor.resume(first.run_id).await.unwrap();

        assert_eq!(again.result, first.result);
        assert!(again.stages_completed.is_empty());
        assert_eq!(
            sink.kinds(),
            vec![EventKind::RunResumed, EventKind::RunCompleted]
        );
    }

    #[tokio::test]
    async fn test_resume_unknown_run() {
        let (channel, recorder) = recorded_channel();
        let executor = happy_builder(channel).build().unwrap();
        let run_id = RunId::new();

        let err = executor.resume(run_id).await.unwrap_err();

        assert!(matches!(err, WorkflowError::CheckpointNotFound(id) if id == run_id));
        assert_single_error(&recorder, "execution");
    }

    #[tokio::test]
    async fn test_concurrent_run_with_same_id_is_rejected() {
        let executor = Arc::new(
            WorkflowBuilder::new()
                .stage(SlowStage::with_delay_ms(StageId::Dependency, 200))
                .stage(SuccessStage::new(StageId::Context))
                .stage(SuccessStage::answering(StageId::Generation, GENERATED))
                .build()
                .unwrap(),
        );
        let run_id = RunId::new();

        let background = Arc::clone(&executor);
        let first = tokio::spawn(async move {
            background
                .run_request(RunRequest::new(SOURCE).with_run_id(run_id))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(executor.is_active(&run_id));
        let err = executor
            .run_request(RunRequest::new(SOURCE).with_run_id(run_id))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::RunInProgress(id) if id == run_id));

        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.result, GENERATED);
        assert!(!executor.is_active(&run_id));
    }

    #[tokio::test]
    async fn test_spawned_runs_are_independent() {
        let executor = Arc::new(happy_builder(Arc::new(ProgressChannel::new())).build().unwrap());

        let handles: Vec<_> = (0..4)
            .map(|i| executor.spawn(format!("class C{i} {{}}")))
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.result, GENERATED);
        }
    }

    #[tokio::test]
    async fn test_file_checkpoints_survive_executor() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = RunId::new();

        let executor = happy_builder(Arc::new(ProgressChannel::new()))
            .checkpoint_store(Arc::new(FileCheckpointStore::new(dir.path())))
            .build()
            .unwrap();
        executor
            .run_request(RunRequest::new(SOURCE).with_run_id(run_id))
            .await
            .unwrap();
        drop(executor);

        let store = FileCheckpointStore::new(dir.path());
        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_complete());
        assert!(records[0].is_intact());

        let reopened = happy_builder(Arc::new(ProgressChannel::new()))
            .checkpoint_store(Arc::new(store))
            .build()
            .unwrap();
        let outcome = reopened.resume(run_id).await.unwrap();
        assert_eq!(outcome.result, GENERATED);
    }

    #[tokio::test]
    async fn test_standard_workflow_with_scripted_model() {
        let client = Arc::new(ScriptedLlmClient::with_texts([
            "JUnit 5 and Mockito are available.",
            "Calculator has one pure method.",
            "Here you go:\n```java\nclass CalculatorTest {}\n```\n",
        ]));
        let (channel, recorder) = recorded_channel();
        let config = TestflowConfig::new()
            .with_workflow(WorkflowConfig::default().with_stage_timeout_seconds(30));

        let executor = WorkflowExecutor::standard(
            client.clone() as Arc<dyn LlmClient>,
            &config,
            channel,
        )
        .unwrap();
        let output = executor.execute(SOURCE).await;

        assert_eq!(output, GENERATED);
        assert_full_progress(&recorder);
        assert_no_errors(&recorder);
        assert_eq!(client.requests().len(), 3);
        assert_eq!(client.remaining(), 0);
    }

    #[tokio::test]
    async fn test_standard_workflow_reports_model_failure() {
        let client = Arc::new(ScriptedLlmClient::with_texts(["deps"]));
        let (channel, recorder) = recorded_channel();

        let executor =
            WorkflowExecutor::standard(client as Arc<dyn LlmClient>, &TestflowConfig::new(), channel)
                .unwrap();
        let output = executor.execute(SOURCE).await;

        assert_failure_mentions(&output, "script exhausted");
        assert_eq!(recorder.progress(), vec![StageId::Dependency]);
        assert_single_error(&recorder, "context");
    }

    #[test]
    fn test_failure_string_format() {
        let err = WorkflowError::Consistency("no result produced".to_string());
        assert_eq!(
            failure_string(&err),
            format!("{FAILURE_PREFIX}[execution] {err}")
        );
    }
}
