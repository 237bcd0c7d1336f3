//! Structured view of `<rpc-reply>` documents, including the Juniper
//! `<load-configuration-results>` envelope.
//!
//! Parsing is lenient where RFC 6241 allows servers latitude: unknown
//! error-type/tag/severity values become `None` while the raw document keeps
//! the original text. A reply parsed from the wire serializes back to that
//! exact document; a reply built from fields synthesizes one. Equality and
//! hashing are defined on the serialized form.

use crate::NETCONF_NS;
use quick_xml::se::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Transport,
    Rpc,
    Protocol,
    Application,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Transport => "transport",
            ErrorType::Rpc => "rpc",
            ErrorType::Protocol => "protocol",
            ErrorType::Application => "application",
        }
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transport" => Ok(ErrorType::Transport),
            "rpc" => Ok(ErrorType::Rpc),
            "protocol" => Ok(ErrorType::Protocol),
            "application" => Ok(ErrorType::Application),
            other => Err(format!("unknown error-type '{}'", other)),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Error,
    Warning,
}

impl ErrorSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
        }
    }
}

impl FromStr for ErrorSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(ErrorSeverity::Error),
            "warning" => Ok(ErrorSeverity::Warning),
            other => Err(format!("unknown error-severity '{}'", other)),
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 6241 Appendix A error tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    TooBig,
    MissingAttribute,
    BadAttribute,
    UnknownAttribute,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    AccessDenied,
    LockDenied,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    PartialOperation,
    MalformedMessage,
}

impl ErrorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::TooBig => "too-big",
            ErrorTag::MissingAttribute => "missing-attribute",
            ErrorTag::BadAttribute => "bad-attribute",
            ErrorTag::UnknownAttribute => "unknown-attribute",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::AccessDenied => "access-denied",
            ErrorTag::LockDenied => "lock-denied",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::PartialOperation => "partial-operation",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }
}

impl FromStr for ErrorTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in-use" => Ok(ErrorTag::InUse),
            "invalid-value" => Ok(ErrorTag::InvalidValue),
            "too-big" => Ok(ErrorTag::TooBig),
            "missing-attribute" => Ok(ErrorTag::MissingAttribute),
            "bad-attribute" => Ok(ErrorTag::BadAttribute),
            "unknown-attribute" => Ok(ErrorTag::UnknownAttribute),
            "missing-element" => Ok(ErrorTag::MissingElement),
            "bad-element" => Ok(ErrorTag::BadElement),
            "unknown-element" => Ok(ErrorTag::UnknownElement),
            "unknown-namespace" => Ok(ErrorTag::UnknownNamespace),
            "access-denied" => Ok(ErrorTag::AccessDenied),
            "lock-denied" => Ok(ErrorTag::LockDenied),
            "data-exists" => Ok(ErrorTag::DataExists),
            "data-missing" => Ok(ErrorTag::DataMissing),
            "operation-not-supported" => Ok(ErrorTag::OperationNotSupported),
            "operation-failed" => Ok(ErrorTag::OperationFailed),
            "partial-operation" => Ok(ErrorTag::PartialOperation),
            "malformed-message" => Ok(ErrorTag::MalformedMessage),
            other => Err(format!("unknown error-tag '{}'", other)),
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The optional `<error-info>` sub-record (RFC 6241 Appendix A).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    #[serde(rename = "bad-attribute", skip_serializing_if = "Option::is_none")]
    pub bad_attribute: Option<String>,
    #[serde(rename = "bad-element", skip_serializing_if = "Option::is_none")]
    pub bad_element: Option<String>,
    #[serde(rename = "bad-namespace", skip_serializing_if = "Option::is_none")]
    pub bad_namespace: Option<String>,
    #[serde(rename = "session-id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "ok-element", skip_serializing_if = "Option::is_none")]
    pub ok_element: Option<String>,
    #[serde(rename = "err-element", skip_serializing_if = "Option::is_none")]
    pub err_element: Option<String>,
    #[serde(rename = "noop-element", skip_serializing_if = "Option::is_none")]
    pub no_op_element: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ErrorMessage {
    #[serde(rename = "@xml:lang", default, skip_serializing_if = "Option::is_none")]
    lang: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

/// One `<rpc-error>` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcError {
    #[serde(
        rename = "error-type",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient",
        serialize_with = "wire"
    )]
    pub error_type: Option<ErrorType>,
    #[serde(
        rename = "error-tag",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient",
        serialize_with = "wire"
    )]
    pub error_tag: Option<ErrorTag>,
    #[serde(
        rename = "error-severity",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient",
        serialize_with = "wire"
    )]
    pub error_severity: Option<ErrorSeverity>,
    #[serde(rename = "error-app-tag", skip_serializing_if = "Option::is_none")]
    pub error_app_tag: Option<String>,
    #[serde(rename = "error-path", skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
    #[serde(rename = "error-message", skip_serializing_if = "Option::is_none")]
    error_message: Option<ErrorMessage>,
    #[serde(rename = "error-info", skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

impl RpcError {
    pub fn new() -> RpcError {
        RpcError::default()
    }

    pub fn with_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_tag(mut self, error_tag: ErrorTag) -> Self {
        self.error_tag = Some(error_tag);
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.error_severity = Some(severity);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.error_path = Some(path.into());
        self
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let message = self.error_message.get_or_insert_with(ErrorMessage::default);
        message.text = text.into();
        self
    }

    pub fn with_message_language(mut self, lang: impl Into<String>) -> Self {
        let message = self.error_message.get_or_insert_with(ErrorMessage::default);
        message.lang = Some(lang.into());
        self
    }

    pub fn with_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_ref().map(|m| m.text.as_str())
    }

    pub fn error_message_language(&self) -> Option<&str> {
        self.error_message.as_ref().and_then(|m| m.lang.as_deref())
    }

    /// Whether this entry counts as a failure. A missing severity is treated
    /// as `error`; only an explicit `warning` is downgraded.
    pub fn is_error_severity(&self) -> bool {
        !matches!(self.error_severity, Some(ErrorSeverity::Warning))
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

fn wire<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    match value {
        Some(inner) => serializer.collect_str(inner),
        None => serializer.serialize_none(),
    }
}

/// The Juniper `<load-configuration-results>` envelope. Unlike a plain
/// reply it may carry `<ok/>` next to warning-severity `<rpc-error>`
/// entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadConfigResults {
    pub action: Option<String>,
    pub ok: bool,
    pub errors: Vec<RpcError>,
}

/// A parsed (or built) `<rpc-reply>`.
#[derive(Debug, Clone)]
pub struct RpcReply {
    message_id: Option<String>,
    ok: bool,
    errors: Vec<RpcError>,
    load_results: Option<LoadConfigResults>,
    raw: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename = "rpc-reply")]
struct RpcReplyWire {
    #[serde(rename = "@xmlns", skip_serializing_if = "Option::is_none")]
    xmlns: Option<String>,
    #[serde(rename = "@message-id", skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ok: Option<()>,
    #[serde(rename = "rpc-error", skip_serializing_if = "Vec::is_empty")]
    rpc_error: Vec<RpcError>,
    #[serde(
        rename = "load-configuration-results",
        skip_serializing_if = "Option::is_none"
    )]
    load_configuration_results: Option<LoadResultsWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LoadResultsWire {
    #[serde(rename = "@action", skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ok: Option<()>,
    #[serde(rename = "rpc-error", skip_serializing_if = "Vec::is_empty")]
    rpc_error: Vec<RpcError>,
}

impl RpcReply {
    /// Parses an `<rpc-reply>` document. `<load-configuration-results>` takes
    /// precedence; otherwise `<ok/>` and `<rpc-error>` are read directly
    /// under the reply root.
    pub fn parse(document: &str) -> Result<RpcReply, quick_xml::DeError> {
        let parsed: RpcReplyWire = quick_xml::de::from_str(document)?;
        let (ok, errors, load_results) = match parsed.load_configuration_results {
            Some(results) => {
                let results = LoadConfigResults {
                    action: results.action,
                    ok: results.ok.is_some(),
                    errors: results.rpc_error,
                };
                (results.ok, results.errors.clone(), Some(results))
            }
            None => (parsed.ok.is_some(), parsed.rpc_error, None),
        };
        Ok(RpcReply {
            message_id: parsed.message_id,
            ok,
            errors,
            load_results,
            raw: Some(document.to_string()),
        })
    }

    pub fn build(message_id: impl Into<String>) -> RpcReplyBuilder {
        RpcReplyBuilder {
            message_id: Some(message_id.into()),
            ok: false,
            errors: Vec::new(),
            load_results: None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// The `<ok/>` flag; for load replies, the flag inside
    /// `<load-configuration-results>`.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn errors(&self) -> &[RpcError] {
        &self.errors
    }

    /// Any entry of severity error, wherever it sits in the reply.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(RpcError::is_error_severity)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|e| !e.is_error_severity())
    }

    pub fn load_results(&self) -> Option<&LoadConfigResults> {
        self.load_results.as_ref()
    }

    /// The reply as an XML document: the original text when this reply was
    /// parsed from the wire, a synthesized document otherwise.
    pub fn to_xml(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => self.synthesize(),
        }
    }

    fn synthesize(&self) -> String {
        let wire = RpcReplyWire {
            xmlns: Some(NETCONF_NS.to_string()),
            message_id: self.message_id.clone(),
            ok: (self.load_results.is_none() && self.ok).then_some(()),
            rpc_error: match self.load_results {
                None => self.errors.clone(),
                Some(_) => Vec::new(),
            },
            load_configuration_results: self.load_results.as_ref().map(|results| {
                LoadResultsWire {
                    action: results.action.clone(),
                    ok: results.ok.then_some(()),
                    rpc_error: results.errors.clone(),
                }
            }),
        };
        let mut buffer = String::with_capacity(256);
        let ser = Serializer::new(&mut buffer);
        wire.serialize(ser).expect("rpc-reply serialization");
        buffer
    }
}

impl PartialEq for RpcReply {
    fn eq(&self, other: &Self) -> bool {
        self.to_xml() == other.to_xml()
    }
}

impl Eq for RpcReply {}

impl Hash for RpcReply {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_xml().hash(state);
    }
}

impl fmt::Display for RpcReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Builds a reply from fields, for fixtures and round-tripping.
#[derive(Debug)]
pub struct RpcReplyBuilder {
    message_id: Option<String>,
    ok: bool,
    errors: Vec<RpcError>,
    load_results: Option<LoadConfigResults>,
}

impl RpcReplyBuilder {
    pub fn ok(mut self) -> Self {
        self.ok = true;
        self
    }

    pub fn error(mut self, error: RpcError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn load_results(mut self, results: LoadConfigResults) -> Self {
        self.load_results = Some(results);
        self
    }

    pub fn finish(self) -> RpcReply {
        let (ok, errors) = match &self.load_results {
            Some(results) => (results.ok, results.errors.clone()),
            None => (self.ok, self.errors),
        };
        RpcReply {
            message_id: self.message_id,
            ok,
            errors,
            load_results: self.load_results,
            raw: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_ok_reply() {
        let document = concat!(
            r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
            "<ok/></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        assert_eq!(reply.message_id(), Some("1"));
        assert!(reply.is_ok());
        assert!(reply.errors().is_empty());
        assert!(!reply.has_errors());
        assert_eq!(reply.to_xml(), document);
    }

    #[test]
    fn parses_data_reply_without_ok() {
        let document = concat!(
            r#"<rpc-reply message-id="4" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
            "<data><configuration><system/></configuration></data></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        assert!(!reply.is_ok());
        assert!(!reply.has_errors());
    }

    #[test]
    fn parses_rpc_error_with_error_info() {
        let document = concat!(
            r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
            "<rpc-error>",
            "<error-type>protocol</error-type>",
            "<error-tag>missing-attribute</error-tag>",
            "<error-severity>error</error-severity>",
            r#"<error-message xml:lang="en">missing x</error-message>"#,
            "<error-info><bad-attribute>x</bad-attribute><bad-element>y</bad-element></error-info>",
            "</rpc-error></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        assert!(!reply.is_ok());
        assert!(reply.has_errors());
        assert_eq!(reply.errors().len(), 1);
        let error = &reply.errors()[0];
        assert_eq!(error.error_type, Some(ErrorType::Protocol));
        assert_eq!(error.error_tag, Some(ErrorTag::MissingAttribute));
        assert_eq!(error.error_severity, Some(ErrorSeverity::Error));
        assert_eq!(error.error_message(), Some("missing x"));
        assert_eq!(error.error_message_language(), Some("en"));
        let info = error.error_info.as_ref().expect("error-info");
        assert_eq!(info.bad_attribute.as_deref(), Some("x"));
        assert_eq!(info.bad_element.as_deref(), Some("y"));
        assert_eq!(info.bad_namespace, None);
    }

    #[test]
    fn unknown_enum_values_parse_to_none() {
        let document = concat!(
            "<rpc-reply message-id=\"2\"><rpc-error>",
            "<error-type>gremlin</error-type>",
            "<error-tag>resource-denied</error-tag>",
            "<error-severity>error</error-severity>",
            "</rpc-error></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        let error = &reply.errors()[0];
        assert_eq!(error.error_type, None);
        assert_eq!(error.error_tag, None);
        assert_eq!(error.error_severity, Some(ErrorSeverity::Error));
        // the raw document still carries the original values
        assert!(reply.to_xml().contains("gremlin"));
    }

    #[test]
    fn load_results_with_ok_and_warning() {
        let document = concat!(
            r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
            r#"<load-configuration-results action="merge">"#,
            "<rpc-error>",
            "<error-severity>warning</error-severity>",
            "<error-message>statement ignored</error-message>",
            "</rpc-error>",
            "<ok/>",
            "</load-configuration-results></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        let results = reply.load_results().expect("load results");
        assert_eq!(results.action.as_deref(), Some("merge"));
        assert!(results.ok);
        assert!(reply.is_ok());
        assert!(!reply.has_errors());
        assert_eq!(reply.warnings().count(), 1);
    }

    #[test]
    fn load_results_with_real_error() {
        let document = concat!(
            r#"<rpc-reply message-id="9"><load-configuration-results action="replace">"#,
            "<rpc-error>",
            "<error-type>protocol</error-type>",
            "<error-tag>operation-failed</error-tag>",
            "<error-severity>error</error-severity>",
            "</rpc-error>",
            "</load-configuration-results></rpc-reply>"
        );
        let reply = RpcReply::parse(document).expect("parse reply");
        assert!(!reply.is_ok());
        assert!(reply.has_errors());
        assert_eq!(
            reply.load_results().expect("load results").errors.len(),
            1
        );
    }

    #[test]
    fn reply_without_message_id_parses() {
        let reply = RpcReply::parse("<rpc-reply><ok/></rpc-reply>").expect("parse reply");
        assert_eq!(reply.message_id(), None);
        assert!(reply.is_ok());
    }

    #[test]
    fn built_reply_round_trips_through_xml() {
        let reply = RpcReply::build("5")
            .error(
                RpcError::new()
                    .with_type(ErrorType::Application)
                    .with_tag(ErrorTag::LockDenied)
                    .with_severity(ErrorSeverity::Error)
                    .with_path("/rpc/edit-config")
                    .with_message("configuration database locked")
                    .with_message_language("en")
                    .with_info(ErrorInfo {
                        session_id: Some("17".to_string()),
                        ..ErrorInfo::default()
                    }),
            )
            .finish();
        let document = reply.to_xml();
        let reparsed = RpcReply::parse(&document).expect("reparse");
        assert_eq!(reparsed, reply);
        let error = &reparsed.errors()[0];
        assert_eq!(error.error_tag, Some(ErrorTag::LockDenied));
        assert_eq!(error.error_path.as_deref(), Some("/rpc/edit-config"));
        assert_eq!(error.error_message_language(), Some("en"));
        assert_eq!(
            error.error_info.as_ref().expect("info").session_id.as_deref(),
            Some("17")
        );
    }

    #[test]
    fn built_ok_reply_serializes_minimal_document() {
        let reply = RpcReply::build("1").ok().finish();
        let document = reply.to_xml();
        assert!(document.contains("<ok/>"));
        assert!(document.contains(r#"message-id="1""#));
        let reparsed = RpcReply::parse(&document).expect("reparse");
        assert!(reparsed.is_ok());
        assert_eq!(reparsed, reply);
    }

    #[test]
    fn built_load_results_round_trips() {
        let reply = RpcReply::build("3")
            .load_results(LoadConfigResults {
                action: Some("merge".to_string()),
                ok: true,
                errors: vec![RpcError::new()
                    .with_severity(ErrorSeverity::Warning)
                    .with_message("statement ignored")],
            })
            .finish();
        let reparsed = RpcReply::parse(&reply.to_xml()).expect("reparse");
        assert_eq!(reparsed, reply);
        assert!(reparsed.is_ok());
        assert_eq!(reparsed.warnings().count(), 1);
        assert_eq!(
            reparsed.load_results().expect("results").action.as_deref(),
            Some("merge")
        );
    }

    #[test]
    fn equality_is_on_the_serialized_document() {
        let a = RpcReply::parse("<rpc-reply message-id=\"1\"><ok/></rpc-reply>").expect("a");
        let b = RpcReply::parse("<rpc-reply message-id=\"1\"><ok/></rpc-reply>").expect("b");
        let c = RpcReply::parse("<rpc-reply message-id=\"1\">\n  <ok/>\n</rpc-reply>").expect("c");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
