//! Tests for the log sinks.

use super::*;
use serde_json::json;

#[test]
fn test_context_renders_as_json_object() {
    let context = LogContext::new()
        .with("QueueUrl", "https://sqs.local/orders")
        .with("publish_time", 0.25);

    assert_eq!(
        context.to_string(),
        r#"{"QueueUrl":"https://sqs.local/orders","publish_time":0.25}"#
    );
    assert_eq!(context.get("publish_time"), Some(&json!(0.25)));
}

#[test]
fn test_recording_sink_keeps_entries_in_order() {
    let sink = RecordingLogSink::new();
    sink.log(200, "Message published", &LogContext::new().with("id", "a"));
    sink.log(500, "Cleanup failed", &LogContext::new());

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, 200);
    assert_eq!(entries[0].context.get("id"), Some(&json!("a")));
    assert_eq!(entries[1].message, "Cleanup failed");
    assert_eq!(sink.entries_with_message("Message published").len(), 1);
}

#[test]
fn test_tracing_sink_accepts_every_status_class() {
    let sink = TracingLogSink;
    for status in [100, 200, 404, 503] {
        sink.log(status, "status check", &LogContext::new());
    }
}
