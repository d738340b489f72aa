//! Tests for message types.

use super::*;
use serde_json::json;

#[test]
fn test_queue_name_validation() {
    assert!(QueueName::new("orders".to_string()).is_ok());
    assert!(QueueName::new("orders_v2-dlq".to_string()).is_ok());

    assert!(QueueName::new(String::new()).is_err());
    assert!(QueueName::new("a".repeat(81)).is_err());
    assert!(QueueName::new("orders/../../etc".to_string()).is_err());
    assert!(QueueName::new("orders queue".to_string()).is_err());
}

#[test]
fn test_queue_name_from_str() {
    let name: QueueName = "notifications".parse().unwrap();
    assert_eq!(name.as_str(), "notifications");
    assert_eq!(name.to_string(), "notifications");
}

#[test]
fn test_generated_message_ids_are_unique() {
    let ids: std::collections::HashSet<MessageId> =
        (0..500).map(|_| MessageId::generate()).collect();
    assert_eq!(ids.len(), 500);
}

#[test]
fn test_generated_message_id_is_filename_safe() {
    let id = MessageId::generate();
    assert_eq!(id.as_str().len(), 26);
    assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn test_message_id_from_str_rejects_empty() {
    assert!("".parse::<MessageId>().is_err());
    let id: MessageId = "4d1b6e0c-receipt".parse().unwrap();
    assert_eq!(id.as_str(), "4d1b6e0c-receipt");
}

#[test]
fn test_metadata_is_ordered() {
    let metadata = MessageMetadata::new()
        .with("ReceiptHandle", "rh-1")
        .with("MD5OfBody", "abc");

    let keys: Vec<&str> = metadata.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["MD5OfBody", "ReceiptHandle"]);
    assert_eq!(metadata.get("ReceiptHandle"), Some("rh-1"));
    assert_eq!(metadata.get("missing"), None);
    assert_eq!(metadata.len(), 2);
}

#[test]
fn test_message_serializes_with_metadata_map() {
    let message = Message::new(
        "abc".parse().unwrap(),
        json!({"order": 7}),
        MessageMetadata::new().with("ReceiptHandle", "rh"),
    );

    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(
        value,
        json!({"id": "abc", "body": {"order": 7}, "metadata": {"ReceiptHandle": "rh"}})
    );
}

#[test]
fn test_message_event_exposes_message() {
    let message = Message::new(MessageId::generate(), json!("hi"), MessageMetadata::new());
    let event = MessageEvent::new("orders".parse().unwrap(), message.clone());

    assert_eq!(event.queue_name().as_str(), "orders");
    assert_eq!(event.message(), &message);
}
