//! Iframe state: the view the parent asks the frame to render
//!
//! Three views exist, discriminated by `view_type`:
//!
//! - `answer-exercise`: the learner answers the exercise
//! - `view-submission`: the learner reviews a graded submission
//! - `exercise-editor`: an instructor edits the exercise definition
//!
//! Specs (`public_spec`, `private_spec`, ...) are opaque to the protocol and
//! kept as raw JSON values.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::fields::{self, Object};
use crate::{MESSAGE_FIELD, VIEW_TYPE_FIELD};

/// Free-form per-user variables shared between exercises
pub type UserVariables = Map<String, Value>;

/// View discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewType {
    AnswerExercise,
    ViewSubmission,
    ExerciseEditor,
}

impl ViewType {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::AnswerExercise => "answer-exercise",
            ViewType::ViewSubmission => "view-submission",
            ViewType::ExerciseEditor => "exercise-editor",
        }
    }

    /// Returns `None` for values outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "answer-exercise" => Some(ViewType::AnswerExercise),
            "view-submission" => Some(ViewType::ViewSubmission),
            "exercise-editor" => Some(ViewType::ExerciseEditor),
            _ => None,
        }
    }
}

/// Who is looking at the exercise
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInformation {
    pub pseudonymous_id: String,
    pub signed_in: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingProgress {
    Failed,
    NotReady,
    PendingManual,
    Pending,
    FullyGraded,
}

impl GradingProgress {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "Failed" => Some(GradingProgress::Failed),
            "NotReady" => Some(GradingProgress::NotReady),
            "PendingManual" => Some(GradingProgress::PendingManual),
            "Pending" => Some(GradingProgress::Pending),
            "FullyGraded" => Some(GradingProgress::FullyGraded),
            _ => None,
        }
    }
}

/// Grading attached to a submission under review
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grading {
    pub grading_progress: GradingProgress,
    pub score_given: f64,
    pub score_maximum: f64,
    pub feedback_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_user_variables: Option<UserVariables>,
}

/// Exercise template available in a course repository (editor view)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryExercise {
    pub id: String,
    pub repository_id: String,
    pub part: String,
    pub name: String,
    pub repository_url: String,
    pub checksum: Vec<u8>,
    pub download_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerExerciseData {
    pub public_spec: Value,
    #[serde(default)]
    pub previous_submission: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewSubmissionData {
    pub grading: Option<Grading>,
    pub user_answer: Value,
    pub public_spec: Value,
    #[serde(default)]
    pub model_solution_spec: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEditorData {
    #[serde(default)]
    pub private_spec: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerExerciseState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_variables: Option<UserVariables>,
    pub data: AnswerExerciseData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewSubmissionState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_variables: Option<UserVariables>,
    pub data: ViewSubmissionData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEditorState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_exercises: Option<Vec<RepositoryExercise>>,
    pub data: ExerciseEditorData,
}

/// The view pushed into the frame with `set-state`
///
/// A `set-state` always replaces the frame's whole view; there is no partial
/// update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view_type", rename_all = "kebab-case")]
pub enum IframeState {
    AnswerExercise(AnswerExerciseState),
    ViewSubmission(ViewSubmissionState),
    ExerciseEditor(ExerciseEditorState),
}

impl IframeState {
    pub fn view_type(&self) -> ViewType {
        match self {
            IframeState::AnswerExercise(_) => ViewType::AnswerExercise,
            IframeState::ViewSubmission(_) => ViewType::ViewSubmission,
            IframeState::ExerciseEditor(_) => ViewType::ExerciseEditor,
        }
    }

    pub fn exercise_task_id(&self) -> &str {
        match self {
            IframeState::AnswerExercise(s) => &s.exercise_task_id,
            IframeState::ViewSubmission(s) => &s.exercise_task_id,
            IframeState::ExerciseEditor(s) => &s.exercise_task_id,
        }
    }

    pub fn user_information(&self) -> &UserInformation {
        match self {
            IframeState::AnswerExercise(s) => &s.user_information,
            IframeState::ViewSubmission(s) => &s.user_information,
            IframeState::ExerciseEditor(s) => &s.user_information,
        }
    }

    /// Strict decode: the value must pass [`check_strict`] first.
    ///
    /// A `message` field is tolerated so that a whole `set-state` envelope can
    /// be decoded directly.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        check_strict(value, true)?;
        Self::from_value_lenient(value)
    }

    /// Lenient decode: undeclared fields are ignored, required fields must
    /// still be present and well typed.
    pub fn from_value_lenient(value: &Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(value.clone()).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        serde_json::to_value(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

// =============================================================================
// Strict structural checks
// =============================================================================

const ANSWER_EXERCISE_FIELDS: &[&str] = &[
    VIEW_TYPE_FIELD,
    "exercise_task_id",
    "user_information",
    "user_variables",
    "data",
];

const VIEW_SUBMISSION_FIELDS: &[&str] = ANSWER_EXERCISE_FIELDS;

const EXERCISE_EDITOR_FIELDS: &[&str] = &[
    VIEW_TYPE_FIELD,
    "exercise_task_id",
    "user_information",
    "repository_exercises",
    "data",
];

/// Validate a state object against the declared schema.
///
/// `allow_message` admits the envelope's own `message` field. Any other
/// undeclared top-level field is rejected; payloads inside the specs are
/// never inspected.
pub fn check_strict(value: &Value, allow_message: bool) -> Result<(), ProtocolError> {
    let obj = fields::as_object(value)?;
    let view_type = fields::tag(obj, VIEW_TYPE_FIELD)?;
    let view_type =
        ViewType::parse(view_type).ok_or_else(|| ProtocolError::UnknownTag(view_type.to_string()))?;

    let declared = match view_type {
        ViewType::AnswerExercise => ANSWER_EXERCISE_FIELDS,
        ViewType::ViewSubmission => VIEW_SUBMISSION_FIELDS,
        ViewType::ExerciseEditor => EXERCISE_EDITOR_FIELDS,
    };
    check_declared(obj, declared, allow_message)?;

    fields::string(obj, "exercise_task_id")?;
    check_user_information(fields::present(obj, "user_information")?)?;
    let data = fields::object(obj, "data")?;

    match view_type {
        ViewType::AnswerExercise => {
            fields::optional_object(obj, "user_variables")?;
            fields::present(data, "public_spec")?;
            fields::present(data, "previous_submission")?;
        }
        ViewType::ViewSubmission => {
            fields::optional_object(obj, "user_variables")?;
            fields::present(data, "public_spec")?;
            fields::present(data, "user_answer")?;
            fields::present(data, "model_solution_spec")?;
            match fields::present(data, "grading")? {
                Value::Null => {}
                grading => check_grading(grading)?,
            }
        }
        ViewType::ExerciseEditor => {
            fields::present(data, "private_spec")?;
            check_repository_exercises(obj)?;
        }
    }

    Ok(())
}

fn check_repository_exercises(obj: &Object) -> Result<(), ProtocolError> {
    match obj.get("repository_exercises") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                check_repository_exercise(item)?;
            }
        }
        Some(_) => {
            return Err(ProtocolError::InvalidField {
                field: "repository_exercises",
                expected: "array",
            })
        }
    }
    Ok(())
}

fn check_declared(obj: &Object, declared: &[&str], allow_message: bool) -> Result<(), ProtocolError> {
    match obj.keys().find(|key| {
        let key = key.as_str();
        !declared.contains(&key) && !(allow_message && key == MESSAGE_FIELD)
    }) {
        Some(key) => Err(ProtocolError::UnexpectedField(key.to_string())),
        None => Ok(()),
    }
}

pub(crate) fn check_user_information(value: &Value) -> Result<(), ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidField {
        field: "user_information",
        expected: "object",
    })?;
    fields::string(obj, "pseudonymous_id")?;
    fields::boolean(obj, "signed_in")?;
    Ok(())
}

fn check_grading(value: &Value) -> Result<(), ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidField {
        field: "grading",
        expected: "object or null",
    })?;
    let progress = fields::string(obj, "grading_progress")?;
    if GradingProgress::parse(progress).is_none() {
        return Err(ProtocolError::InvalidField {
            field: "grading_progress",
            expected: "grading progress",
        });
    }
    fields::number(obj, "score_given")?;
    fields::number(obj, "score_maximum")?;
    fields::nullable_string(obj, "feedback_text")?;
    fields::optional_object(obj, "set_user_variables")?;
    Ok(())
}

fn check_repository_exercise(value: &Value) -> Result<(), ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidField {
        field: "repository_exercises",
        expected: "array of objects",
    })?;
    for field in ["id", "repository_id", "part", "name", "repository_url", "download_url"] {
        fields::string(obj, field)?;
    }
    let checksum = fields::present(obj, "checksum")?
        .as_array()
        .ok_or(ProtocolError::InvalidField { field: "checksum", expected: "array" })?;
    if !checksum.iter().all(|b| b.as_u64().map_or(false, |b| b <= u8::MAX as u64)) {
        return Err(ProtocolError::InvalidField {
            field: "checksum",
            expected: "array of bytes",
        });
    }
    Ok(())
}

/// Human-readable one-line summary used in diagnostics.
pub fn describe(state: &IframeState) -> String {
    format!(
        "{} (task {})",
        state.view_type().as_str(),
        state.exercise_task_id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer_state() -> Value {
        json!({
            "view_type": "answer-exercise",
            "exercise_task_id": "abc",
            "user_information": { "pseudonymous_id": "u1", "signed_in": true },
            "data": { "public_spec": { "foo": 1 }, "previous_submission": null }
        })
    }

    #[test]
    fn test_view_type_parse() {
        assert_eq!(ViewType::parse("answer-exercise"), Some(ViewType::AnswerExercise));
        assert_eq!(ViewType::parse("exercise"), None);
        assert_eq!(ViewType::ExerciseEditor.as_str(), "exercise-editor");
    }

    #[test]
    fn test_answer_exercise_decodes() {
        let state = IframeState::from_value(&answer_state()).unwrap();
        assert_eq!(state.view_type(), ViewType::AnswerExercise);
        assert_eq!(state.exercise_task_id(), "abc");
        assert!(state.user_information().signed_in);
        match state {
            IframeState::AnswerExercise(s) => {
                assert_eq!(s.data.public_spec, json!({ "foo": 1 }));
                assert_eq!(s.data.previous_submission, Value::Null);
                assert!(s.user_variables.is_none());
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_encoding_matches_input() {
        let state = IframeState::from_value(&answer_state()).unwrap();
        assert_eq!(state.to_value().unwrap(), answer_state());
    }

    #[test]
    fn test_strict_rejects_extra_top_level_field() {
        let mut value = answer_state();
        value["extra_field"] = json!(123);
        assert_eq!(
            check_strict(&value, true),
            Err(ProtocolError::UnexpectedField("extra_field".to_string()))
        );
        // Lenient decoding ignores it
        assert!(IframeState::from_value_lenient(&value).is_ok());
    }

    #[test]
    fn test_strict_allows_extra_fields_inside_specs() {
        let mut value = answer_state();
        value["data"]["public_spec"]["anything"] = json!([1, 2, 3]);
        assert!(check_strict(&value, false).is_ok());
    }

    #[test]
    fn test_message_field_only_when_allowed() {
        let mut value = answer_state();
        value["message"] = json!("set-state");
        assert!(check_strict(&value, true).is_ok());
        assert!(check_strict(&value, false).is_err());
    }

    #[test]
    fn test_user_information_types_checked() {
        let mut value = answer_state();
        value["user_information"]["signed_in"] = json!("yes");
        assert_eq!(
            check_strict(&value, false),
            Err(ProtocolError::InvalidField { field: "signed_in", expected: "boolean" })
        );
    }

    #[test]
    fn test_view_submission_grading() {
        let value = json!({
            "view_type": "view-submission",
            "exercise_task_id": "t1",
            "user_information": { "pseudonymous_id": "u1", "signed_in": true },
            "data": {
                "grading": {
                    "grading_progress": "FullyGraded",
                    "score_given": 1.0,
                    "score_maximum": 2.0,
                    "feedback_text": null
                },
                "user_answer": { "selected": [1] },
                "public_spec": {},
                "model_solution_spec": null
            }
        });
        let state = IframeState::from_value(&value).unwrap();
        match state {
            IframeState::ViewSubmission(s) => {
                let grading = s.data.grading.unwrap();
                assert_eq!(grading.grading_progress, GradingProgress::FullyGraded);
                assert!((grading.score_maximum - 2.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_view_submission_bad_progress() {
        let value = json!({
            "view_type": "view-submission",
            "exercise_task_id": "t1",
            "user_information": { "pseudonymous_id": "u1", "signed_in": false },
            "data": {
                "grading": {
                    "grading_progress": "Done",
                    "score_given": 1,
                    "score_maximum": 1,
                    "feedback_text": null
                },
                "user_answer": null,
                "public_spec": null,
                "model_solution_spec": null
            }
        });
        assert!(check_strict(&value, false).is_err());
    }

    #[test]
    fn test_exercise_editor_repository_exercises() {
        let mut value = json!({
            "view_type": "exercise-editor",
            "exercise_task_id": "t1",
            "user_information": { "pseudonymous_id": "instructor", "signed_in": true },
            "repository_exercises": [{
                "id": "e1",
                "repository_id": "r1",
                "part": "part01",
                "name": "hello",
                "repository_url": "https://example.com/repo",
                "checksum": [1, 2, 255],
                "download_url": "https://example.com/e1.tar.zst"
            }],
            "data": { "private_spec": null }
        });
        let state = IframeState::from_value(&value).unwrap();
        match &state {
            IframeState::ExerciseEditor(s) => {
                let exercises = s.repository_exercises.as_ref().unwrap();
                assert_eq!(exercises[0].checksum, alloc::vec![1, 2, 255]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }

        value["repository_exercises"][0]["checksum"] = json!([256]);
        assert!(check_strict(&value, false).is_err());
    }

    #[test]
    fn test_unknown_view_type() {
        let mut value = answer_state();
        value["view_type"] = json!("exercise");
        assert_eq!(
            check_strict(&value, false),
            Err(ProtocolError::UnknownTag("exercise".to_string()))
        );
    }

    #[test]
    fn test_describe() {
        let state = IframeState::from_value(&answer_state()).unwrap();
        assert_eq!(describe(&state), "answer-exercise (task abc)");
    }
}
