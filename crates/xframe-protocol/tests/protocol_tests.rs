//! Protocol integration tests
//!
//! Exercise the public surface the way a peer does: raw JSON text in, guard,
//! decode, encode, raw JSON text out.

use serde_json::{json, Value};
use xframe_protocol::{
    guard, Dialect, FilePayload, Inbound, IframeState, MessageFromIframe, MessageToIframe,
    ProtocolError, Signal, UploadResult, ViewType,
};

fn through_wire(value: &Value) -> Value {
    let text = serde_json::to_string(value).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn view_submission() -> Value {
    json!({
        "view_type": "view-submission",
        "exercise_task_id": "b2c1",
        "user_information": { "pseudonymous_id": "anon-7", "signed_in": true },
        "user_variables": { "seed": 4 },
        "data": {
            "grading": {
                "grading_progress": "FullyGraded",
                "score_given": 0.5,
                "score_maximum": 1.0,
                "feedback_text": null,
                "feedback_json": [{ "line": 3 }]
            },
            "user_answer": { "selected": [1] },
            "public_spec": { "options": ["a", "b"] },
            "model_solution_spec": { "correct": [1] }
        }
    })
}

fn editor_state() -> Value {
    json!({
        "view_type": "exercise-editor",
        "exercise_task_id": "e-1",
        "user_information": { "pseudonymous_id": "instructor", "signed_in": true },
        "repository_exercises": [{
            "id": "r1",
            "repository_id": "repo",
            "part": "part01",
            "name": "hello",
            "repository_url": "https://git.example.com/repo",
            "checksum": [0, 17, 255],
            "download_url": "https://files.example.com/r1.tar"
        }],
        "data": { "private_spec": null }
    })
}

// ============================================================================
// Decoding after a trip through the wire
// ============================================================================

#[test]
fn test_every_frame_message_survives_the_wire() {
    let messages = [
        MessageFromIframe::CurrentState { data: json!({ "answer": "x" }), valid: true },
        MessageFromIframe::HeightChanged { height: 512.0 },
        MessageFromIframe::OpenLink { url: "https://example.com/docs".into() },
    ];
    for msg in messages {
        let wire = through_wire(&msg.to_value().unwrap());
        assert!(guard::is_message_from_iframe(&wire));
        assert_eq!(MessageFromIframe::from_value(&wire).unwrap(), msg);
    }
}

fn answer_exercise() -> Value {
    json!({
        "view_type": "answer-exercise",
        "exercise_task_id": "a-3",
        "user_information": { "pseudonymous_id": "anon-2", "signed_in": false },
        "data": { "public_spec": { "foo": 1 }, "previous_submission": null }
    })
}

#[test]
fn test_states_survive_the_wire() {
    for raw in [answer_exercise(), view_submission(), editor_state()] {
        assert!(guard::is_iframe_state(&raw));
        let state = IframeState::from_value(&raw).unwrap();
        assert_eq!(through_wire(&state.to_value().unwrap()), raw);

        let wire = through_wire(&MessageToIframe::SetState(state.clone()).to_value().unwrap());
        assert!(guard::is_set_state_message(&wire));
        assert_eq!(MessageToIframe::from_value(&wire).unwrap(), MessageToIframe::SetState(state));
    }
}

#[test]
fn test_absent_nullable_data_fields_are_rejected() {
    let cases = [
        (answer_exercise(), "previous_submission"),
        (view_submission(), "model_solution_spec"),
        (editor_state(), "private_spec"),
    ];
    for (mut raw, field) in cases {
        raw["data"].as_object_mut().unwrap().remove(field);
        assert!(!guard::is_iframe_state(&raw), "accepted without {}", field);
        assert_eq!(
            IframeState::from_value(&raw),
            Err(ProtocolError::MissingField { field })
        );
    }
}

#[test]
fn test_checksum_bytes_are_kept() {
    match IframeState::from_value(&editor_state()).unwrap() {
        IframeState::ExerciseEditor(editor) => {
            let exercises = editor.repository_exercises.unwrap();
            assert_eq!(exercises[0].checksum, vec![0, 17, 255]);
        }
        other => panic!("expected editor state, got {:?}", other.view_type()),
    }
}

// ============================================================================
// Guards agree with decoders
// ============================================================================

#[test]
fn test_guard_and_decoder_agree() {
    let candidates = [
        json!({ "message": "height-changed", "data": 10 }),
        json!({ "message": "height-changed", "data": "10" }),
        json!({ "message": "file-upload", "files": { "a": "text" } }),
        json!({ "message": "file-upload", "files": [] }),
        json!({ "message": "open-link" }),
        json!({ "message": "current-state", "valid": "yes" }),
        json!("ready"),
        json!(null),
    ];
    for candidate in &candidates {
        assert_eq!(
            guard::is_message_from_iframe(candidate),
            MessageFromIframe::from_value(candidate).is_ok(),
            "disagreement on {}",
            candidate
        );
    }
}

#[test]
fn test_view_guards_are_exclusive() {
    let states = [view_submission(), editor_state()];
    for state in &states {
        let hits = [
            guard::is_answer_exercise_iframe_state(state),
            guard::is_view_submission_iframe_state(state),
            guard::is_exercise_editor_iframe_state(state),
        ];
        assert_eq!(hits.iter().filter(|hit| **hit).count(), 1);
    }
}

// ============================================================================
// Strict vs forgiving set-state
// ============================================================================

#[test]
fn test_set_state_extra_field_strict_and_forgiving() {
    let mut value = view_submission();
    value["message"] = json!("set-state");
    value["extra_field"] = json!("drift");

    assert!(!guard::is_set_state_message(&value));
    assert!(matches!(
        MessageToIframe::from_value(&value),
        Err(ProtocolError::UnexpectedField(ref name)) if name == "extra_field"
    ));

    let warned = std::cell::Cell::new(0);
    assert!(guard::forgiving_is_set_state_message(&value, &|_| warned.set(warned.get() + 1)));
    assert_eq!(warned.get(), 1);

    let lenient = IframeState::from_value_lenient(&value).unwrap();
    assert_eq!(lenient.view_type(), ViewType::ViewSubmission);
}

// ============================================================================
// Dialects
// ============================================================================

#[test]
fn test_editor_dialect_round_trip() {
    let reply = MessageToIframe::UploadResult(UploadResult::Failure { error: "denied".into() })
        .to_value()
        .unwrap();
    let wrapped = through_wire(&Dialect::EditorEnvelope.wrap(reply.clone()));

    let classified = Inbound::classify(&wrapped).unwrap();
    assert_eq!(classified.dialect, Dialect::EditorEnvelope);
    assert_eq!(classified.inbound, Inbound::Envelope(reply));
}

#[test]
fn test_signals_are_not_envelopes() {
    let classified = Inbound::classify(&json!("communication-port")).unwrap();
    assert_eq!(classified.inbound, Inbound::Signal(Signal::CommunicationPort));
    assert!(!guard::is_message_to_iframe(&json!("communication-port")));
}

#[test]
fn test_file_upload_blob_descriptor() {
    let raw = json!({
        "message": "file-upload",
        "files": { "photo.jpg": { "type": "image/jpeg", "size": 2048, "lastModified": 1 } }
    });
    match MessageFromIframe::from_value(&through_wire(&raw)).unwrap() {
        MessageFromIframe::FileUpload { files } => match &files["photo.jpg"] {
            FilePayload::Blob(blob) => {
                assert_eq!(blob.content_type, "image/jpeg");
                assert_eq!(blob.size, 2048);
            }
            other => panic!("expected blob, got {:?}", other),
        },
        other => panic!("unexpected message {:?}", other),
    }
}
