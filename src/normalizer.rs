//! Turns webhook events into inputs for the host framework.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::bot::{Enqueue, Input};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::input::{source_to_sender_key, InputKind, LineInput, Location, MediaType, UserInput};
use crate::webhook::{Event, EventKind, Message};

/// Convert a message or postback event into a user input.
///
/// Follow, unfollow, join, leave, beacon and the other state-change events are
/// not user input. Supply a custom [`EventHandler`] to act on those.
pub fn event_to_user_input(config: &Config, event: &Event) -> Result<UserInput> {
    let source = event.source.as_ref().ok_or(Error::UnrecognizedEventSource)?;
    let sender_key = source_to_sender_key(source)?;

    let build = |id: Option<&String>, kind: InputKind| LineInput {
        id: id.cloned(),
        source_type: source.source_type.clone(),
        sender_key: sender_key.clone(),
        reply_token: event.reply_token.clone(),
        timestamp: event.timestamp,
        kind,
    };

    match &event.kind {
        EventKind::Message { message } => {
            let input = match message {
                Message::Text { id, text } => {
                    let input = build(Some(id), InputKind::Text { text: text.clone() });
                    return Ok(apply_triggers(config, input));
                }
                Message::Image { id } => build(Some(id), InputKind::File { media: MediaType::Image }),
                Message::Video { id } => build(Some(id), InputKind::File { media: MediaType::Video }),
                Message::Audio { id } => build(Some(id), InputKind::File { media: MediaType::Audio }),
                Message::Location {
                    id,
                    title,
                    address,
                    latitude,
                    longitude,
                } => build(
                    Some(id),
                    InputKind::Location(Location {
                        title: title.clone(),
                        address: address.clone(),
                        latitude: *latitude,
                        longitude: *longitude,
                    }),
                ),
                Message::Sticker {
                    id,
                    package_id,
                    sticker_id,
                } => build(
                    Some(id),
                    InputKind::Sticker {
                        package_id: package_id.clone(),
                        sticker_id: sticker_id.clone(),
                    },
                ),
                other => return Err(Error::UnknownMessageType(other.type_name().to_string())),
            };
            Ok(UserInput::Plain(input))
        }

        EventKind::Postback { postback } => {
            let input = build(
                None,
                InputKind::Postback {
                    data: postback.data.clone(),
                    params: postback.params.clone(),
                },
            );
            Ok(apply_triggers(config, input))
        }

        other => Err(Error::NotUserInput(other.name().to_string())),
    }
}

/// Wrap the input as a help or abort signal when its trimmed message equals a configured trigger.
fn apply_triggers(config: &Config, input: LineInput) -> UserInput {
    let trimmed = input.message().trim();
    if !config.help_command.is_empty() && trimmed == config.help_command {
        UserInput::Help(input)
    } else if !config.abort_command.is_empty() && trimmed == config.abort_command {
        UserInput::Abort(input)
    } else {
        UserInput::Plain(input)
    }
}

/// Handles each parsed webhook batch.
///
/// Runs on the listener's request path, so implementations should hand work
/// off rather than block.
pub trait EventHandler: Send + Sync {
    fn handle(&self, cancel: &CancellationToken, config: &Config, events: Vec<Event>, enqueue: &dyn Enqueue);
}

impl<F> EventHandler for F
where
    F: Fn(&CancellationToken, &Config, Vec<Event>, &dyn Enqueue) + Send + Sync,
{
    fn handle(&self, cancel: &CancellationToken, config: &Config, events: Vec<Event>, enqueue: &dyn Enqueue) {
        self(cancel, config, events, enqueue)
    }
}

pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Enqueues every message and postback event, skipping anything that fails.
#[derive(Clone, Default)]
pub struct DefaultEventHandler {
    on_error: Option<ErrorCallback>,
}

impl DefaultEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report conversion and enqueue failures to `on_error`.
    pub fn with_error_callback(on_error: ErrorCallback) -> Self {
        Self {
            on_error: Some(on_error),
        }
    }

    fn report(&self, err: Error) {
        if let Some(on_error) = &self.on_error {
            on_error(&err);
        }
    }
}

impl EventHandler for DefaultEventHandler {
    fn handle(&self, _cancel: &CancellationToken, config: &Config, events: Vec<Event>, enqueue: &dyn Enqueue) {
        for event in &events {
            if !matches!(event.kind, EventKind::Message { .. } | EventKind::Postback { .. }) {
                debug!("Ignoring {} event", event.kind.name());
                continue;
            }

            let input = match event_to_user_input(config, event) {
                Ok(input) => input,
                Err(e) => {
                    error!("Error on event handling: {}", e);
                    self.report(e);
                    continue;
                }
            };

            debug!("Enqueueing input from {}", input.sender_key());
            if let Err(e) = enqueue.enqueue(input) {
                error!("Failed to enqueue input: {}", e);
                self.report(Error::Enqueue(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::EnqueueError;
    use crate::webhook::CallbackRequest;
    use std::sync::Mutex;

    fn events(json: &str) -> Vec<Event> {
        let request: CallbackRequest =
            serde_json::from_str(&format!(r#"{{"destination": "U0", "events": [{}]}}"#, json)).unwrap();
        request.into_events()
    }

    fn text_event(text: &str) -> String {
        format!(
            r#"{{"type": "message", "replyToken": "rt", "timestamp": 1462629479859,
                "source": {{"type": "user", "userId": "U1"}},
                "message": {{"id": "m1", "type": "text", "text": {}}}}}"#,
            serde_json::to_string(text).unwrap()
        )
    }

    fn single(json: &str) -> Event {
        events(json).remove(0)
    }

    #[derive(Default)]
    struct Recorder {
        inputs: Mutex<Vec<UserInput>>,
    }

    impl Enqueue for Recorder {
        fn enqueue(&self, input: UserInput) -> std::result::Result<(), EnqueueError> {
            self.inputs.lock().unwrap().push(input);
            Ok(())
        }
    }

    #[test]
    fn test_plain_text_keeps_original_text() {
        let config = Config::default();
        let input = event_to_user_input(&config, &single(&text_event("  hello  "))).unwrap();
        match input {
            UserInput::Plain(inner) => {
                assert_eq!(inner.message(), "  hello  ");
                assert_eq!(inner.sender_key, "user|U1");
                assert_eq!(inner.reply_token, "rt");
                assert_eq!(inner.id.as_deref(), Some("m1"));
                assert!(inner.is_source_user());
            }
            other => panic!("expected plain input, got {:?}", other),
        }
    }

    #[test]
    fn test_help_and_abort_triggers() {
        let config = Config::default();
        assert!(event_to_user_input(&config, &single(&text_event(".help"))).unwrap().is_help());
        assert!(event_to_user_input(&config, &single(&text_event(" .abort\n"))).unwrap().is_abort());
        assert!(matches!(
            event_to_user_input(&config, &single(&text_event(".helpme"))).unwrap(),
            UserInput::Plain(_)
        ));
    }

    #[test]
    fn test_empty_triggers_disable_checks() {
        let config = Config {
            help_command: String::new(),
            abort_command: String::new(),
            ..Config::default()
        };
        assert!(matches!(
            event_to_user_input(&config, &single(&text_event(""))).unwrap(),
            UserInput::Plain(_)
        ));
        assert!(matches!(
            event_to_user_input(&config, &single(&text_event(".help"))).unwrap(),
            UserInput::Plain(_)
        ));
    }

    #[test]
    fn test_media_messages() {
        let config = Config::default();
        for (kind, media) in [
            ("image", MediaType::Image),
            ("video", MediaType::Video),
            ("audio", MediaType::Audio),
        ] {
            let event = single(&format!(
                r#"{{"type": "message", "replyToken": "rt", "timestamp": 1,
                    "source": {{"type": "room", "roomId": "R1"}},
                    "message": {{"id": "m2", "type": "{}"}}}}"#,
                kind
            ));
            let input = event_to_user_input(&config, &event).unwrap().into_inner();
            assert_eq!(input.kind, InputKind::File { media });
            assert_eq!(input.message(), "");
            assert_eq!(input.sender_key, "room|R1");
        }
    }

    #[test]
    fn test_location_message() {
        let event = single(
            r#"{"type": "message", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "group", "groupId": "G1", "userId": "U1"},
                "message": {"id": "m3", "type": "location", "title": ".help",
                            "address": "Tokyo", "latitude": 35.6, "longitude": 139.7}}"#,
        );
        // Trigger matching applies to text and postback inputs only.
        let input = event_to_user_input(&Config::default(), &event).unwrap();
        let UserInput::Plain(inner) = input else {
            panic!("location must not be wrapped");
        };
        assert_eq!(inner.message(), ".help");
        assert_eq!(inner.sender_key, "group|G1");
        match inner.kind {
            InputKind::Location(location) => {
                assert_eq!(location.address, "Tokyo");
                assert_eq!(location.latitude, 35.6);
                assert_eq!(location.longitude, 139.7);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_sticker_message() {
        let event = single(
            r#"{"type": "message", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "user", "userId": "U1"},
                "message": {"id": "m4", "type": "sticker", "packageId": "446", "stickerId": "1988"}}"#,
        );
        let input = event_to_user_input(&Config::default(), &event).unwrap().into_inner();
        assert_eq!(
            input.kind,
            InputKind::Sticker {
                package_id: "446".to_string(),
                sticker_id: "1988".to_string(),
            }
        );
        assert_eq!(input.message(), "");
    }

    #[test]
    fn test_unknown_message_type() {
        let event = single(
            r#"{"type": "message", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "user", "userId": "U1"},
                "message": {"id": "m5", "type": "file", "fileName": "a.pdf", "fileSize": 10}}"#,
        );
        let err = event_to_user_input(&Config::default(), &event).unwrap_err();
        assert!(matches!(err, Error::UnknownMessageType(ref t) if t == "file"));
    }

    #[test]
    fn test_postback_with_params_and_trigger() {
        let event = single(
            r#"{"type": "postback", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "user", "userId": "U1"},
                "postback": {"data": "pick", "params": {"datetime": "2017-12-25T01:00"}}}"#,
        );
        let input = event_to_user_input(&Config::default(), &event).unwrap().into_inner();
        assert!(input.id.is_none());
        assert_eq!(input.message(), "pick");
        match input.kind {
            InputKind::Postback { params: Some(params), .. } => {
                assert_eq!(params.datetime.as_deref(), Some("2017-12-25T01:00"));
                assert!(params.date.is_none());
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let abort = single(
            r#"{"type": "postback", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "user", "userId": "U1"},
                "postback": {"data": " .abort "}}"#,
        );
        assert!(event_to_user_input(&Config::default(), &abort).unwrap().is_abort());
    }

    #[test]
    fn test_unrecognized_source() {
        let event = single(
            r#"{"type": "message", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "channel", "userId": "U1"},
                "message": {"id": "m1", "type": "text", "text": "hi"}}"#,
        );
        assert!(matches!(
            event_to_user_input(&Config::default(), &event),
            Err(Error::UnrecognizedEventSource)
        ));
    }

    #[test]
    fn test_state_change_event_is_not_input() {
        let event = single(
            r#"{"type": "follow", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "user", "userId": "U1"}}"#,
        );
        assert!(matches!(
            event_to_user_input(&Config::default(), &event),
            Err(Error::NotUserInput(ref kind)) if kind == "follow"
        ));
    }

    #[test]
    fn test_default_handler_preserves_order() {
        let recorder = Recorder::default();
        let batch = events(&format!("{},{}", text_event("hello"), text_event(".abort")));

        DefaultEventHandler::new().handle(&CancellationToken::new(), &Config::default(), batch, &recorder);

        let inputs = recorder.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(matches!(&inputs[0], UserInput::Plain(i) if i.message() == "hello"));
        assert!(inputs[1].is_abort());
    }

    #[test]
    fn test_default_handler_skips_failures() {
        let recorder = Recorder::default();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let handler = DefaultEventHandler::with_error_callback(Arc::new(move |e: &Error| {
            sink.lock().unwrap().push(e.to_string());
        }));

        let unknown = r#"{"type": "message", "replyToken": "rt", "timestamp": 1,
            "source": {"type": "user", "userId": "U1"},
            "message": {"id": "m9", "type": "hologram"}}"#;
        let follow = r#"{"type": "follow", "replyToken": "rt", "timestamp": 1,
            "source": {"type": "user", "userId": "U1"}}"#;
        let batch = events(&format!(
            "{},{},{},{}",
            text_event("one"),
            unknown,
            follow,
            text_event("two")
        ));

        handler.handle(&CancellationToken::new(), &Config::default(), batch, &recorder);

        let inputs = recorder.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].message(), "one");
        assert_eq!(inputs[1].message(), "two");

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown message type"));
    }

    #[test]
    fn test_default_handler_reports_enqueue_failure() {
        let errors = Arc::new(Mutex::new(0usize));
        let count = Arc::clone(&errors);
        let handler = DefaultEventHandler::with_error_callback(Arc::new(move |e: &Error| {
            assert!(matches!(e, Error::Enqueue(EnqueueError::Closed)));
            *count.lock().unwrap() += 1;
        }));
        let closed = |_input: UserInput| -> std::result::Result<(), EnqueueError> {
            Err(EnqueueError::Closed)
        };

        let batch = events(&format!("{},{}", text_event("a"), text_event("b")));
        handler.handle(&CancellationToken::new(), &Config::default(), batch, &closed);

        assert_eq!(*errors.lock().unwrap(), 2);
    }

    #[test]
    fn test_closure_event_handler() {
        let seen = Mutex::new(Vec::new());
        let handler = |_cancel: &CancellationToken, _config: &Config, events: Vec<Event>, _enqueue: &dyn Enqueue| {
            for event in events {
                seen.lock().unwrap().push(event.kind.name());
            }
        };
        let recorder = Recorder::default();
        let batch = events(
            r#"{"type": "join", "replyToken": "rt", "timestamp": 1,
                "source": {"type": "group", "groupId": "G1"}}"#,
        );

        handler.handle(&CancellationToken::new(), &Config::default(), batch, &recorder);
        assert_eq!(*seen.lock().unwrap(), vec!["join"]);
    }
}
