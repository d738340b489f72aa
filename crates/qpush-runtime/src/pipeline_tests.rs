//! Tests for the message pipeline.

use super::*;
use crate::message::QueueName;
use crate::provider::FileProviderConfig;
use crate::providers::{CleanupPolicy, FileProvider};
use serde_json::json;
use std::sync::Mutex;
use tempfile::TempDir;

/// Records the order handlers ran in and optionally rejects bodies
struct StepHandler {
    label: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
    reject_when: Option<serde_json::Value>,
}

#[async_trait]
impl MessageHandler for StepHandler {
    fn name(&self) -> &str {
        self.label
    }

    async fn handle(&self, event: &MessageEvent) -> Result<(), HandlerError> {
        self.calls.lock().unwrap().push(self.label.to_string());
        match &self.reject_when {
            Some(body) if body == event.message().body() => {
                Err(HandlerError::rejected("body is not accepted"))
            }
            _ => Ok(()),
        }
    }
}

fn step(
    label: &'static str,
    calls: &Arc<Mutex<Vec<String>>>,
    reject_when: Option<serde_json::Value>,
) -> Arc<dyn MessageHandler> {
    Arc::new(StepHandler {
        label,
        calls: Arc::clone(calls),
        reject_when,
    })
}

async fn file_provider(temp_dir: &TempDir, batch: u32) -> Arc<FileProvider> {
    let mut config =
        FileProviderConfig::new(temp_dir.path().join("jobs")).with_cleanup(CleanupPolicy::Never);
    config.options.message_expiration = 0;
    config.options.messages_to_receive = batch;

    let provider = FileProvider::new(QueueName::new("jobs".to_string()).unwrap(), config).unwrap();
    provider.create().await.unwrap();
    Arc::new(provider)
}

#[tokio::test]
async fn test_dispatch_runs_handlers_in_order_then_acknowledges() {
    let temp_dir = TempDir::new().unwrap();
    let provider = file_provider(&temp_dir, 1).await;
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MessagePipeline::new(provider.clone())
        .with_handler(step("validate", &calls, None))
        .with_handler(step("store", &calls, None));

    provider.publish(&json!({"job": 1}), &OptionOverrides::new()).await.unwrap();
    let message = provider.receive(&OptionOverrides::new()).await.unwrap().remove(0);
    let path = provider.store().path_for(message.id().as_str());

    let outcome = pipeline.dispatch(message).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Acknowledged);
    assert_eq!(*calls.lock().unwrap(), vec!["validate", "store"]);
    assert!(!path.exists());
    assert_eq!(provider.in_flight(), 0);
}

#[tokio::test]
async fn test_rejection_stops_chain_and_keeps_message_in_flight() {
    let temp_dir = TempDir::new().unwrap();
    let provider = file_provider(&temp_dir, 1).await;
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MessagePipeline::new(provider.clone())
        .with_handler(step("validate", &calls, Some(json!({"job": "bad"}))))
        .with_handler(step("store", &calls, None));

    provider.publish(&json!({"job": "bad"}), &OptionOverrides::new()).await.unwrap();
    let message = provider.receive(&OptionOverrides::new()).await.unwrap().remove(0);
    let path = provider.store().path_for(message.id().as_str());

    let outcome = pipeline.dispatch(message).await.unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected {
            handler: "validate".to_string(),
            reason: "Message rejected: body is not accepted".to_string(),
        }
    );
    assert_eq!(*calls.lock().unwrap(), vec!["validate"]);
    assert!(path.exists());
    assert_eq!(provider.in_flight(), 1);
}

#[tokio::test]
async fn test_poll_once_reports_batch_outcome() {
    let temp_dir = TempDir::new().unwrap();
    let provider = file_provider(&temp_dir, 10).await;
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MessagePipeline::new(provider.clone())
        .with_handler(step("only", &calls, Some(json!("poison"))));

    for body in [json!(1), json!("poison"), json!(3)] {
        provider.publish(&body, &OptionOverrides::new()).await.unwrap();
    }

    let report = pipeline.poll_once().await.unwrap();
    assert_eq!(
        report,
        PollReport {
            received: 3,
            acknowledged: 2,
            failed: 1,
        }
    );

    // The rejected message is still held by this provider
    assert_eq!(pipeline.poll_once().await.unwrap(), PollReport::default());
    assert_eq!(provider.in_flight(), 1);
}

#[tokio::test]
async fn test_poll_once_honors_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let provider = file_provider(&temp_dir, 1).await;
    let pipeline = MessagePipeline::new(provider.clone())
        .with_overrides(OptionOverrides::new().with_messages_to_receive(2));

    for n in 0..3 {
        provider.publish(&json!(n), &OptionOverrides::new()).await.unwrap();
    }

    assert_eq!(pipeline.poll_once().await.unwrap().acknowledged, 2);
    assert_eq!(pipeline.poll_once().await.unwrap().acknowledged, 1);
    assert_eq!(pipeline.handler_count(), 0);
}

#[tokio::test]
async fn test_poll_once_propagates_receive_errors() {
    let temp_dir = TempDir::new().unwrap();
    let provider = file_provider(&temp_dir, 1).await;
    provider.destroy().await.unwrap();

    let pipeline = MessagePipeline::new(provider);
    assert!(matches!(
        pipeline.poll_once().await,
        Err(QueueError::Io { .. })
    ));
}

#[test]
fn test_handler_error_messages() {
    assert_eq!(
        HandlerError::failed("database offline").to_string(),
        "Handler failed: database offline"
    );
}
