//! Tests for provider options.

use super::*;

#[test]
fn test_default_options() {
    let options = ProviderOptions::default();
    assert_eq!(options.message_delay, 0);
    assert_eq!(options.message_expiration, 86_400);
    assert_eq!(options.messages_to_receive, 1);
    assert_eq!(options.receive_wait_time, 3);
    assert!(options.logging_enabled);
    assert!(options.validate().is_ok());
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let options = ProviderOptions {
        messages_to_receive: 0,
        ..Default::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ValidationError::OutOfRange { ref field, .. }) if field == "messages_to_receive"
    ));
}

#[test]
fn test_empty_overrides_keep_base() {
    let base = ProviderOptions {
        message_delay: 5,
        message_expiration: 60,
        messages_to_receive: 4,
        receive_wait_time: 10,
        logging_enabled: false,
    };

    let merged = OptionOverrides::new().merge(&base).unwrap();
    assert_eq!(merged, base);
}

#[test]
fn test_overrides_replace_only_set_fields() {
    let base = ProviderOptions::default();
    let merged = OptionOverrides::new()
        .with_messages_to_receive(10)
        .with_message_delay(30)
        .merge(&base)
        .unwrap();

    assert_eq!(merged.messages_to_receive, 10);
    assert_eq!(merged.message_delay, 30);
    assert_eq!(merged.message_expiration, base.message_expiration);
    assert_eq!(merged.receive_wait_time, base.receive_wait_time);
}

#[test]
fn test_overrides_are_validated() {
    let result = OptionOverrides::new()
        .with_messages_to_receive(0)
        .merge(&ProviderOptions::default());
    assert!(result.is_err());
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ProviderOptions =
        serde_json::from_str(r#"{"messages_to_receive": 25}"#).unwrap();
    assert_eq!(options.messages_to_receive, 25);
    assert_eq!(options.message_expiration, 86_400);
}
