//! Schema validation for candidate create/update payloads.
//!
//! Raw payloads are deserialized into tri-state [`Field`]s over untyped JSON so
//! that every problem is reported against the offending field instead of
//! failing the whole body at parse time.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{CandidatePatch, CandidateStatus, NewCandidate};

pub const MAX_EXPERIENCE_YEARS: i64 = 50;
pub const MAX_EMAIL_LEN: usize = 255;

/// Presence-aware wrapper for an input key: absent, explicitly `null`, or carrying a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Missing,
    Null,
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Present(value),
            None => Self::Null,
        })
    }
}

/// Machine-readable reason attached to each [`FieldError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorCode {
    Required,
    InvalidType,
    TooShort,
    TooLong,
    InvalidEmail,
    NotInteger,
    TooSmall,
    TooBig,
    InvalidEnum,
}

impl FieldErrorCode {
    /// Returns `true` for numeric range violations.
    pub fn is_range_error(self) -> bool {
        matches!(self, Self::TooSmall | Self::TooBig)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: FieldErrorCode,
    pub message: String,
}

/// All field errors found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid input: {}", summarize(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Builds an error set holding a single field error.
    pub fn single(field: &'static str, code: FieldErrorCode, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field,
                code,
                message: message.into(),
            }],
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the first error reported for `field`.
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    /// Message of the first error, suitable for a one-line notification.
    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|error| error.message.as_str())
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

struct TextRule {
    field: &'static str,
    max: usize,
    required: &'static str,
    too_long: &'static str,
}

const FIRST_NAME: TextRule = TextRule {
    field: "firstName",
    max: 50,
    required: "First name is required",
    too_long: "First name must be less than 50 characters",
};

const LAST_NAME: TextRule = TextRule {
    field: "lastName",
    max: 50,
    required: "Last name is required",
    too_long: "Last name must be less than 50 characters",
};

const TITLE: TextRule = TextRule {
    field: "title",
    max: 100,
    required: "Job title is required",
    too_long: "Job title must be less than 100 characters",
};

const LOCATION: TextRule = TextRule {
    field: "location",
    max: 100,
    required: "Location is required",
    too_long: "Location must be less than 100 characters",
};

/// Raw `candidates.create` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCandidateInput {
    pub first_name: Field<Value>,
    pub last_name: Field<Value>,
    pub email: Field<Value>,
    pub phone: Field<Value>,
    pub title: Field<Value>,
    pub experience: Field<Value>,
    pub location: Field<Value>,
    pub status: Field<Value>,
    pub skills: Field<Value>,
}

impl CreateCandidateInput {
    /// Checks every field, returning the typed payload or every problem found.
    pub fn validate(self) -> Result<NewCandidate, ValidationErrors> {
        let mut check = Collector::default();
        let first_name = check.text(&FIRST_NAME, self.first_name, true);
        let last_name = check.text(&LAST_NAME, self.last_name, true);
        let email = check.email(self.email, true);
        let phone = check.nullable_string("phone", self.phone);
        let title = check.text(&TITLE, self.title, true);
        let experience = check.experience(self.experience, true);
        let location = check.text(&LOCATION, self.location, true);
        let status = check.status(self.status, true);
        let skills = check.nullable_string("skills", self.skills);

        match (
            first_name, last_name, email, title, experience, location, status,
        ) {
            (
                Some(first_name),
                Some(last_name),
                Some(email),
                Some(title),
                Some(experience),
                Some(location),
                Some(status),
            ) if check.is_clean() => Ok(NewCandidate {
                first_name,
                last_name,
                email,
                phone: phone.flatten(),
                title,
                experience,
                location,
                status,
                skills: skills.flatten(),
            }),
            _ => Err(check.into_errors()),
        }
    }
}

/// Raw `candidates.update` patch; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateCandidateInput {
    pub first_name: Field<Value>,
    pub last_name: Field<Value>,
    pub email: Field<Value>,
    pub phone: Field<Value>,
    pub title: Field<Value>,
    pub experience: Field<Value>,
    pub location: Field<Value>,
    pub status: Field<Value>,
    pub skills: Field<Value>,
}

impl UpdateCandidateInput {
    pub fn validate(self) -> Result<CandidatePatch, ValidationErrors> {
        let mut check = Collector::default();
        let patch = CandidatePatch {
            first_name: check.text(&FIRST_NAME, self.first_name, false),
            last_name: check.text(&LAST_NAME, self.last_name, false),
            email: check.email(self.email, false),
            phone: check.nullable_string("phone", self.phone),
            title: check.text(&TITLE, self.title, false),
            experience: check.experience(self.experience, false),
            location: check.text(&LOCATION, self.location, false),
            status: check.status(self.status, false),
            skills: check.nullable_string("skills", self.skills),
        };

        if check.is_clean() {
            Ok(patch)
        } else {
            Err(check.into_errors())
        }
    }
}

/// Envelope of `candidates.update`: `{ id, data }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateCandidateRequest {
    pub id: Field<Value>,
    pub data: Field<UpdateCandidateInput>,
}

impl UpdateCandidateRequest {
    pub fn validate(self) -> Result<(String, CandidatePatch), ValidationErrors> {
        let mut check = Collector::default();
        let id = check.string("id", self.id, true);
        let patch = match self.data {
            Field::Missing => {
                check.push("data", FieldErrorCode::Required, "Required");
                None
            }
            Field::Null => {
                check.push(
                    "data",
                    FieldErrorCode::InvalidType,
                    "Expected object, received null",
                );
                None
            }
            Field::Present(data) => match data.validate() {
                Ok(patch) => Some(patch),
                Err(errors) => {
                    check.extend(errors);
                    None
                }
            },
        };

        match (id, patch) {
            (Some(id), Some(patch)) if check.is_clean() => Ok((id, patch)),
            _ => Err(check.into_errors()),
        }
    }
}

/// Envelope carrying only a candidate id (`candidates.delete`, `candidates.getOne`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CandidateIdInput {
    pub id: Field<Value>,
}

impl CandidateIdInput {
    pub fn validate(self) -> Result<String, ValidationErrors> {
        let mut check = Collector::default();
        match check.string("id", self.id, true) {
            Some(id) if check.is_clean() => Ok(id),
            _ => Err(check.into_errors()),
        }
    }
}

/// Returns `true` when `value` looks like a deliverable email address.
pub fn is_valid_email(value: &str) -> bool {
    !value.starts_with('.') && !value.contains("..") && email_regex().is_match(value)
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@(?:[A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Integer(i64),
    Float(f64),
}

impl Numeric {
    fn parse(value: &Value) -> Option<Self> {
        let numeric = match value {
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float))?,
            Value::String(raw) => {
                let trimmed = raw.trim();
                if let Ok(integer) = trimmed.parse::<i64>() {
                    Self::Integer(integer)
                } else {
                    let float = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
                    Self::Float(float)
                }
            }
            _ => return None,
        };

        Some(match numeric {
            Self::Float(float)
                if float.fract() == 0.0 && float.abs() < i64::MAX as f64 =>
            {
                Self::Integer(float as i64)
            }
            other => other,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn push(&mut self, field: &'static str, code: FieldErrorCode, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            code,
            message: message.into(),
        });
    }

    fn extend(&mut self, errors: ValidationErrors) {
        self.errors.extend(errors.errors);
    }

    fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_errors(self) -> ValidationErrors {
        ValidationErrors {
            errors: self.errors,
        }
    }

    fn string(
        &mut self,
        field: &'static str,
        input: Field<Value>,
        required: bool,
    ) -> Option<String> {
        match input {
            Field::Missing => {
                if required {
                    self.push(field, FieldErrorCode::Required, "Required");
                }
                None
            }
            Field::Null => {
                self.push(
                    field,
                    FieldErrorCode::InvalidType,
                    "Expected string, received null",
                );
                None
            }
            Field::Present(Value::String(value)) => Some(value),
            Field::Present(other) => {
                self.push(
                    field,
                    FieldErrorCode::InvalidType,
                    format!("Expected string, received {}", json_type(&other)),
                );
                None
            }
        }
    }

    fn text(&mut self, rule: &TextRule, input: Field<Value>, required: bool) -> Option<String> {
        let value = self.string(rule.field, input, required)?;
        let len = value.chars().count();
        if len == 0 {
            self.push(rule.field, FieldErrorCode::TooShort, rule.required);
            return None;
        }
        if len > rule.max {
            self.push(rule.field, FieldErrorCode::TooLong, rule.too_long);
            return None;
        }
        Some(value)
    }

    fn email(&mut self, input: Field<Value>, required: bool) -> Option<String> {
        let value = self.string("email", input, required)?;
        let mut valid = true;
        if !is_valid_email(&value) {
            self.push("email", FieldErrorCode::InvalidEmail, "Invalid email address");
            valid = false;
        }
        if value.chars().count() > MAX_EMAIL_LEN {
            self.push(
                "email",
                FieldErrorCode::TooLong,
                "Email must be less than 255 characters",
            );
            valid = false;
        }
        valid.then_some(value)
    }

    /// Outer `None`: key absent or invalid. `Some(None)`: explicit `null`.
    fn nullable_string(&mut self, field: &'static str, input: Field<Value>) -> Option<Option<String>> {
        match input {
            Field::Missing => None,
            Field::Null => Some(None),
            Field::Present(Value::String(value)) => Some(Some(value)),
            Field::Present(other) => {
                self.push(
                    field,
                    FieldErrorCode::InvalidType,
                    format!("Expected string, received {}", json_type(&other)),
                );
                None
            }
        }
    }

    fn experience(&mut self, input: Field<Value>, required: bool) -> Option<u32> {
        const FIELD: &str = "experience";
        let raw = match input {
            Field::Missing => {
                if required {
                    self.push(FIELD, FieldErrorCode::Required, "Required");
                }
                return None;
            }
            Field::Null => {
                self.push(
                    FIELD,
                    FieldErrorCode::InvalidType,
                    "Expected number, received null",
                );
                return None;
            }
            Field::Present(raw) => raw,
        };

        let Some(numeric) = Numeric::parse(&raw) else {
            self.push(
                FIELD,
                FieldErrorCode::InvalidType,
                format!("Expected number, received {}", json_type(&raw)),
            );
            return None;
        };

        let (whole, below, above) = match numeric {
            Numeric::Integer(value) => (Some(value), value < 0, value > MAX_EXPERIENCE_YEARS),
            Numeric::Float(value) => (None, value < 0.0, value > MAX_EXPERIENCE_YEARS as f64),
        };
        if whole.is_none() {
            self.push(
                FIELD,
                FieldErrorCode::NotInteger,
                "Experience must be a whole number",
            );
        }
        if below {
            self.push(
                FIELD,
                FieldErrorCode::TooSmall,
                "Experience cannot be negative",
            );
        }
        if above {
            self.push(
                FIELD,
                FieldErrorCode::TooBig,
                "Experience cannot exceed 50 years",
            );
        }

        match whole {
            Some(value) if !below && !above => u32::try_from(value).ok(),
            _ => None,
        }
    }

    fn status(&mut self, input: Field<Value>, required: bool) -> Option<CandidateStatus> {
        let value = self.string("status", input, required)?;
        match value.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                self.push(
                    "status",
                    FieldErrorCode::InvalidEnum,
                    "Status must be one of: active, inactive, placed",
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_payload() -> Value {
        json!({
            "firstName": "John",
            "lastName": "Doe",
            "email": "john.doe@example.com",
            "phone": "+1 (555) 123-4567",
            "title": "Software Engineer",
            "experience": 5,
            "location": "San Francisco, CA",
            "status": "active",
            "skills": "Rust, SQL"
        })
    }

    fn create_with(key: &str, value: Value) -> Result<NewCandidate, ValidationErrors> {
        let mut payload = create_payload();
        payload[key] = value;
        serde_json::from_value::<CreateCandidateInput>(payload)
            .expect("payload shape")
            .validate()
    }

    #[test]
    fn accepts_complete_create_payload() {
        let candidate = serde_json::from_value::<CreateCandidateInput>(create_payload())
            .expect("payload shape")
            .validate()
            .expect("valid payload");
        assert_eq!(candidate.first_name, "John");
        assert_eq!(candidate.experience, 5);
        assert_eq!(candidate.status, CandidateStatus::Active);
        assert_eq!(candidate.skills.as_deref(), Some("Rust, SQL"));
    }

    #[test]
    fn experience_bounds_are_inclusive() {
        let err = create_with("experience", json!(51)).unwrap_err();
        let field = err.field("experience").expect("experience error");
        assert!(field.code.is_range_error());
        assert_eq!(field.message, "Experience cannot exceed 50 years");

        let err = create_with("experience", json!(-1)).unwrap_err();
        let field = err.field("experience").expect("experience error");
        assert!(field.code.is_range_error());
        assert_eq!(field.message, "Experience cannot be negative");

        assert_eq!(
            create_with("experience", json!(50)).expect("50 is valid").experience,
            50
        );
        assert_eq!(
            create_with("experience", json!(0)).expect("0 is valid").experience,
            0
        );
    }

    #[test]
    fn experience_accepts_numeric_strings_only() {
        assert_eq!(create_with("experience", json!("7")).unwrap().experience, 7);
        assert_eq!(create_with("experience", json!(7.0)).unwrap().experience, 7);

        let err = create_with("experience", json!(3.5)).unwrap_err();
        assert_eq!(
            err.field("experience").map(|e| e.code),
            Some(FieldErrorCode::NotInteger)
        );

        let err = create_with("experience", json!("seven")).unwrap_err();
        assert_eq!(
            err.field("experience").map(|e| e.message.as_str()),
            Some("Expected number, received string")
        );

        let err = create_with("experience", json!(true)).unwrap_err();
        assert_eq!(
            err.field("experience").map(|e| e.code),
            Some(FieldErrorCode::InvalidType)
        );
    }

    #[test]
    fn reports_every_failing_field() {
        let payload = json!({
            "firstName": "",
            "email": "not-an-email",
            "title": "x".repeat(101),
            "experience": 12,
            "location": "Berlin",
            "status": "hired"
        });
        let err = serde_json::from_value::<CreateCandidateInput>(payload)
            .unwrap()
            .validate()
            .unwrap_err();

        let fields: Vec<_> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["firstName", "lastName", "email", "title", "status"]
        );
        assert_eq!(
            err.field("firstName").unwrap().message,
            "First name is required"
        );
        assert_eq!(err.field("lastName").unwrap().code, FieldErrorCode::Required);
        assert_eq!(err.field("email").unwrap().message, "Invalid email address");
        assert_eq!(
            err.field("title").unwrap().message,
            "Job title must be less than 100 characters"
        );
        assert_eq!(err.field("status").unwrap().code, FieldErrorCode::InvalidEnum);
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let name = "é".repeat(50);
        assert_eq!(create_with("firstName", json!(name)).unwrap().first_name.chars().count(), 50);

        let err = create_with("lastName", json!("é".repeat(51))).unwrap_err();
        assert_eq!(err.field("lastName").unwrap().code, FieldErrorCode::TooLong);
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("jdoe@example.com"));
        assert!(is_valid_email("first.o'neil+tag@mail.example.co"));
        assert!(!is_valid_email(".jdoe@example.com"));
        assert!(!is_valid_email("j..doe@example.com"));
        assert!(!is_valid_email("jdoe@example"));
        assert!(!is_valid_email("jdoe@-example.com"));
        assert!(!is_valid_email(""));

        let long = format!("{}@example.com", "a".repeat(250));
        let err = create_with("email", json!(long)).unwrap_err();
        assert_eq!(err.field("email").unwrap().code, FieldErrorCode::TooLong);
    }

    #[test]
    fn create_ignores_identifiers_and_accepts_null_optionals() {
        let mut payload = create_payload();
        payload["id"] = json!("chosen-id");
        payload["userId"] = json!("someone-else");
        payload["phone"] = Value::Null;
        payload.as_object_mut().unwrap().remove("skills");

        let candidate = serde_json::from_value::<CreateCandidateInput>(payload)
            .unwrap()
            .validate()
            .expect("valid");
        assert_eq!(candidate.phone, None);
        assert_eq!(candidate.skills, None);
    }

    #[test]
    fn create_rejects_wrong_types_per_field() {
        let err = create_with("firstName", json!(42)).unwrap_err();
        let field = err.field("firstName").unwrap();
        assert_eq!(field.code, FieldErrorCode::InvalidType);
        assert_eq!(field.message, "Expected string, received number");

        let err = create_with("lastName", Value::Null).unwrap_err();
        assert_eq!(
            err.field("lastName").unwrap().message,
            "Expected string, received null"
        );
    }

    #[test]
    fn update_distinguishes_absent_and_null() {
        let patch = serde_json::from_value::<UpdateCandidateInput>(json!({
            "title": "Lead",
            "phone": null,
        }))
        .unwrap()
        .validate()
        .expect("valid patch");

        assert_eq!(patch.title.as_deref(), Some("Lead"));
        assert_eq!(patch.phone, Some(None));
        assert_eq!(patch.skills, None);
        assert_eq!(patch.first_name, None);
    }

    #[test]
    fn empty_update_is_valid_and_empty() {
        let patch = serde_json::from_value::<UpdateCandidateInput>(json!({}))
            .unwrap()
            .validate()
            .expect("valid patch");
        assert!(patch.is_empty());
    }

    #[test]
    fn update_applies_same_rules_to_present_fields() {
        let err = serde_json::from_value::<UpdateCandidateInput>(json!({
            "experience": 51,
            "firstName": null,
        }))
        .unwrap()
        .validate()
        .unwrap_err();

        assert!(err.field("experience").unwrap().code.is_range_error());
        assert_eq!(
            err.field("firstName").unwrap().code,
            FieldErrorCode::InvalidType
        );
    }

    #[test]
    fn update_request_requires_id_and_data() {
        let err = serde_json::from_value::<UpdateCandidateRequest>(json!({}))
            .unwrap()
            .validate()
            .unwrap_err();
        assert_eq!(err.field("id").unwrap().code, FieldErrorCode::Required);
        assert_eq!(err.field("data").unwrap().code, FieldErrorCode::Required);

        let (id, patch) = serde_json::from_value::<UpdateCandidateRequest>(json!({
            "id": "c-1",
            "data": { "status": "placed" }
        }))
        .unwrap()
        .validate()
        .expect("valid request");
        assert_eq!(id, "c-1");
        assert_eq!(patch.status, Some(CandidateStatus::Placed));
    }

    #[test]
    fn id_input_requires_string() {
        let err = serde_json::from_value::<CandidateIdInput>(json!({ "id": 7 }))
            .unwrap()
            .validate()
            .unwrap_err();
        assert_eq!(err.field("id").unwrap().code, FieldErrorCode::InvalidType);

        let id = serde_json::from_value::<CandidateIdInput>(json!({ "id": "c-9" }))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(id, "c-9");
    }

    #[test]
    fn display_lists_fields() {
        let err = ValidationErrors::single("id", FieldErrorCode::Required, "Required");
        assert_eq!(err.to_string(), "invalid input: id: Required");
        assert_eq!(err.first_message(), Some("Required"));
    }
}
