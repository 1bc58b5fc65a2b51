//! Structured intent schema and validation of raw language-model output.
//!
//! The extraction step is advisory: nothing it returns is trusted until it has
//! passed through [`parse_intent`]. Namespace defaulting happens here and
//! nowhere else.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    Status,
    Logs,
    Scale,
    Description,
    Help,
    Irrelevant,
}

impl IntentAction {
    pub const ALL: [Self; 6] = [
        Self::Status,
        Self::Logs,
        Self::Scale,
        Self::Description,
        Self::Help,
        Self::Irrelevant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Logs => "logs",
            Self::Scale => "scale",
            Self::Description => "description",
            Self::Help => "help",
            Self::Irrelevant => "irrelevant",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "status" => Some(Self::Status),
            "logs" | "log" => Some(Self::Logs),
            "scale" => Some(Self::Scale),
            "description" | "describe" | "desc" => Some(Self::Description),
            "help" => Some(Self::Help),
            "irrelevant" => Some(Self::Irrelevant),
            _ => None,
        }
    }

    pub fn requires_service(self) -> bool {
        matches!(
            self,
            Self::Status | Self::Logs | Self::Scale | Self::Description
        )
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::Status => "show pod phase, node and restart count for a service",
            Self::Logs => "fetch recent logs for a service and ask questions about them",
            Self::Scale => "set the replica count of a service's deployment",
            Self::Description => "describe a service's pod and ask questions about it",
            Self::Help => "list what can be asked",
            Self::Irrelevant => "anything unrelated to the cluster",
        }
    }
}

impl Display for IntentAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Intent {
    pub action: IntentAction,
    pub service: String,
    pub namespace: String,
    pub replicas: Option<i64>,
}

impl Intent {
    #[cfg(test)]
    pub fn new(action: IntentAction, service: impl Into<String>) -> Self {
        Self {
            action,
            service: service.into().trim().to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            replicas: None,
        }
    }

    #[cfg(test)]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = resolve_namespace(Some(namespace));
        self
    }

    #[cfg(test)]
    pub fn with_replicas(mut self, replicas: i64) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Replica count usable for a scale mutation.
    pub fn scale_replicas(&self) -> Option<i32> {
        self.replicas
            .filter(|replicas| *replicas >= 0)
            .and_then(|replicas| i32::try_from(replicas).ok())
    }

    pub fn validate(&self) -> Result<(), ParseError> {
        if self.action.requires_service() && self.service.is_empty() {
            return Err(ParseError::IncompleteForAction {
                action: self.action,
                field: "service",
            });
        }

        if self.action == IntentAction::Scale && self.scale_replicas().is_none() {
            return Err(ParseError::IncompleteForAction {
                action: self.action,
                field: "replicas",
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseError {
    #[error("language model unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("could not parse model output ({reason})")]
    Malformed { raw: String, reason: String },
    #[error("model returned an unknown action '{action}'")]
    UnknownAction { action: String },
    #[error("'{action}' request is missing a valid '{field}'")]
    IncompleteForAction {
        action: IntentAction,
        field: &'static str,
    },
}

impl ParseError {
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "service unavailable",
            Self::Malformed { .. } => "malformed",
            Self::UnknownAction { .. } => "unknown action",
            Self::IncompleteForAction { .. } => "incomplete",
        }
    }

    /// Original model text, kept for operator diagnosis.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Malformed { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

enum ReplicaField {
    Count(i64),
    NotInteger,
}

pub fn parse_intent(raw: &str) -> Result<Intent, ParseError> {
    let (payload, fenced) = strip_code_fence(raw);
    if fenced {
        warn!("model output was wrapped in a code fence; stripped before parsing");
    }

    let malformed = |reason: String| ParseError::Malformed {
        raw: raw.to_string(),
        reason,
    };

    let value: Value =
        serde_json::from_str(payload).map_err(|error| malformed(format!("invalid JSON: {error}")))?;
    let Value::Object(fields) = value else {
        return Err(malformed(format!(
            "expected a JSON object, got {}",
            json_type(&value)
        )));
    };

    let action_token = match fields.get("action") {
        Some(Value::String(token)) => token.clone(),
        Some(other) => {
            return Err(malformed(format!(
                "'action' must be a string, got {}",
                json_type(other)
            )));
        }
        None => return Err(malformed("missing 'action'".to_string())),
    };
    let service = optional_string(&fields, "service").map_err(malformed)?;
    let namespace = optional_string(&fields, "namespace").map_err(malformed)?;
    let replicas = replica_field(&fields).map_err(malformed)?;

    let action =
        IntentAction::from_token(&action_token).ok_or_else(|| ParseError::UnknownAction {
            action: action_token.trim().to_string(),
        })?;

    let replicas = match replicas {
        _ if action != IntentAction::Scale => None,
        Some(ReplicaField::Count(count)) => Some(count),
        Some(ReplicaField::NotInteger) => {
            return Err(ParseError::IncompleteForAction {
                action,
                field: "replicas",
            });
        }
        None => None,
    };

    let intent = Intent {
        action,
        service: service.unwrap_or_default(),
        namespace: resolve_namespace(namespace.as_deref()),
        replicas,
    };
    intent.validate()?;
    Ok(intent)
}

/// Removes a surrounding Markdown code fence, reporting whether one was found.
pub fn strip_code_fence(raw: &str) -> (&str, bool) {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return (trimmed, false);
    };

    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.trim_end();
    let body = rest.strip_suffix("```").unwrap_or(rest);
    (body.trim(), true)
}

pub fn resolve_namespace(namespace: Option<&str>) -> String {
    namespace
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string()
}

fn optional_string(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let value = value.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Some(other) => Err(format!(
            "'{key}' must be a string, got {}",
            json_type(other)
        )),
    }
}

fn replica_field(fields: &Map<String, Value>) -> Result<Option<ReplicaField>, String> {
    match fields.get("replicas") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => {
            if let Some(count) = number.as_i64() {
                return Ok(Some(ReplicaField::Count(count)));
            }
            match number.as_f64() {
                Some(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 => {
                    Ok(Some(ReplicaField::Count(value as i64)))
                }
                _ => Ok(Some(ReplicaField::NotInteger)),
            }
        }
        Some(Value::String(value)) => value
            .trim()
            .parse::<i64>()
            .map(|count| Some(ReplicaField::Count(count)))
            .map_err(|_| format!("'replicas' must be an integer, got string '{value}'")),
        Some(other) => Err(format!(
            "'replicas' must be an integer, got {}",
            json_type(other)
        )),
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

#[cfg(test)]
mod tests {
    use super::{Intent, IntentAction, ParseError, parse_intent, strip_code_fence};
    use pretty_assertions::assert_eq;

    #[test]
    fn logs_intent_defaults_null_namespace() {
        let intent = parse_intent(
            r#"{"action":"logs","service":"cartservice","namespace":null,"replicas":null}"#,
        )
        .expect("valid intent");
        assert_eq!(intent, Intent::new(IntentAction::Logs, "cartservice"));
        assert_eq!(intent.namespace, "default");
    }

    #[test]
    fn fenced_output_parses_like_bare_output() {
        let bare = r#"{"action":"scale","service":"checkoutservice","namespace":"shop","replicas":3}"#;
        let expected = parse_intent(bare).expect("bare output parses");

        for wrapped in [
            format!("```json\n{bare}\n```"),
            format!("```\n{bare}\n```"),
            format!("  ```JSON\n{bare}\n```  \n"),
            format!("```json{bare}```"),
            format!("```json\n{bare}"),
        ] {
            assert_eq!(parse_intent(&wrapped), Ok(expected.clone()), "{wrapped}");
        }
    }

    #[test]
    fn strip_code_fence_reports_unwrapped_input() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), ("{\"a\":1}", false));
        assert_eq!(strip_code_fence("```json\n{}\n```"), ("{}", true));
    }

    #[test]
    fn omitted_and_explicit_default_namespace_are_identical() {
        let omitted = parse_intent(r#"{"action":"status","service":"frontend"}"#);
        let blank = parse_intent(r#"{"action":"status","service":"frontend","namespace":"  "}"#);
        let explicit =
            parse_intent(r#"{"action":"status","service":"frontend","namespace":"default"}"#);
        assert_eq!(omitted, explicit);
        assert_eq!(blank, explicit);
    }

    #[test]
    fn scale_without_usable_replicas_is_incomplete() {
        for raw in [
            r#"{"action":"scale","service":"checkoutservice"}"#,
            r#"{"action":"scale","service":"checkoutservice","replicas":null}"#,
            r#"{"action":"scale","service":"checkoutservice","replicas":-1}"#,
            r#"{"action":"scale","service":"checkoutservice","replicas":2.5}"#,
            r#"{"action":"scale","service":"checkoutservice","replicas":9999999999}"#,
        ] {
            assert_eq!(
                parse_intent(raw),
                Err(ParseError::IncompleteForAction {
                    action: IntentAction::Scale,
                    field: "replicas",
                }),
                "{raw}"
            );
        }
    }

    #[test]
    fn scale_accepts_integral_numbers_and_numeric_strings() {
        let zero = parse_intent(r#"{"action":"scale","service":"adservice","replicas":0}"#)
            .expect("zero replicas is valid");
        assert_eq!(zero.scale_replicas(), Some(0));

        let quoted = parse_intent(r#"{"action":"scale","service":"adservice","replicas":"4"}"#)
            .expect("numeric string is accepted");
        assert_eq!(quoted.replicas, Some(4));

        let float = parse_intent(r#"{"action":"scale","service":"adservice","replicas":2.0}"#)
            .expect("integral float is accepted");
        assert_eq!(float.replicas, Some(2));
    }

    #[test]
    fn replicas_of_the_wrong_type_are_malformed() {
        for raw in [
            r#"{"action":"scale","service":"adservice","replicas":true}"#,
            r#"{"action":"scale","service":"adservice","replicas":"three"}"#,
            r#"{"action":"status","service":"adservice","replicas":[1]}"#,
        ] {
            assert!(
                matches!(parse_intent(raw), Err(ParseError::Malformed { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn non_scale_actions_ignore_replicas() {
        let intent =
            parse_intent(r#"{"action":"status","service":"adservice","replicas":-4}"#).unwrap();
        assert_eq!(intent, Intent::new(IntentAction::Status, "adservice"));

        let counted =
            parse_intent(r#"{"action":"describe","service":"adservice","replicas":3}"#).unwrap();
        assert_eq!(counted.replicas, None);

        let fractional =
            parse_intent(r#"{"action":"logs","service":"adservice","replicas":1.5}"#).unwrap();
        assert_eq!(fractional.replicas, None);
    }

    #[test]
    fn prose_output_is_malformed_and_keeps_raw_text() {
        let raw = "Sure! You want the logs for the cart service.";
        let error = parse_intent(raw).unwrap_err();
        assert_eq!(error.kind_label(), "malformed");
        assert_eq!(error.raw(), Some(raw));
    }

    #[test]
    fn structural_failures_are_malformed() {
        for raw in [
            "[1, 2, 3]",
            r#"{"service":"frontend"}"#,
            r#"{"action":5,"service":"frontend"}"#,
            r#"{"action":"status","service":42}"#,
            r#"{"action":"status","service":"frontend","namespace":{}}"#,
            "",
        ] {
            assert!(
                matches!(parse_intent(raw), Err(ParseError::Malformed { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn unrecognized_action_is_distinguishable() {
        assert_eq!(
            parse_intent(r#"{"action":"restart","service":"frontend"}"#),
            Err(ParseError::UnknownAction {
                action: "restart".to_string()
            })
        );
    }

    #[test]
    fn action_tokens_are_case_insensitive_with_aliases() {
        let intent = parse_intent(r#"{"action":" Describe ","service":"emailservice"}"#).unwrap();
        assert_eq!(intent.action, IntentAction::Description);
    }

    #[test]
    fn workload_actions_require_a_service() {
        for action in IntentAction::ALL
            .into_iter()
            .filter(|action| action.requires_service())
        {
            let raw = format!(r#"{{"action":"{action}","service":"","replicas":1}}"#);
            assert_eq!(
                parse_intent(&raw),
                Err(ParseError::IncompleteForAction {
                    action,
                    field: "service"
                })
            );
        }
    }

    #[test]
    fn help_and_irrelevant_need_no_service() {
        let help = parse_intent(r#"{"action":"help"}"#).unwrap();
        assert_eq!(help.service, "");
        let irrelevant =
            parse_intent(r#"{"action":"irrelevant","service":null,"namespace":null}"#).unwrap();
        assert_eq!(irrelevant.namespace, "default");
    }
}
