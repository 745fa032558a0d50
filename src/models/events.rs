use serde_json::{Map, Value};

const REQUEST_ID_KEYS: &[&str] = &["request_id", "requestId"];
const IMAGE_ID_KEYS: &[&str] = &["id", "imageId", "image_id"];
const STATUS_KEYS: &[&str] = &["current_status", "currentStatus"];
const PROGRESS_KEYS: &[&str] = &["progress", "percentage_complete", "percentageComplete"];
const URL_KEYS: &[&str] = &["url", "imageUrl", "image_url"];
const ERROR_CODE_KEYS: &[&str] = &["err_code", "errCode"];
const ERROR_MESSAGE_KEYS: &[&str] = &["err_message", "err_msg", "error"];

const COMPLETED_STATUSES: &[&str] = &["completed", "done", "success"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Content,
    Error { code: String, message: String },
    Unclassified,
}

/// One decoded message from the imagine socket.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub request_id: Option<String>,
    pub kind: EventKind,
    pub image_id: Option<String>,
    /// Always within [0, 100].
    pub progress: Option<f64>,
    /// Lower-cased status label.
    pub status: Option<String>,
    pub url: Option<String>,
}

impl InboundEvent {
    /// Decode a raw text frame. Anything that is not a JSON object yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let msg = value.as_object()?;

        let request_id = first_string(msg, REQUEST_ID_KEYS);
        let status = first_string(msg, STATUS_KEYS).map(|s| s.to_lowercase());
        let msg_type = msg
            .get("type")
            .and_then(scalar_to_string)
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let image_id = first_string(msg, IMAGE_ID_KEYS);
        let progress = extract_progress(msg);
        let url = first_string(msg, URL_KEYS);

        let kind = if msg_type == "error" || status.as_deref() == Some("error") {
            EventKind::Error {
                code: first_string(msg, ERROR_CODE_KEYS).unwrap_or_else(|| "unknown".into()),
                message: first_string(msg, ERROR_MESSAGE_KEYS)
                    .unwrap_or_else(|| "unknown error".into()),
            }
        } else if image_id.is_some() || progress.is_some() || url.is_some() || status.is_some() {
            EventKind::Content
        } else {
            EventKind::Unclassified
        };

        Some(Self {
            request_id,
            kind,
            image_id,
            progress,
            status,
            url,
        })
    }

    /// True when this event belongs to another request.
    pub fn is_foreign(&self, request_id: &str) -> bool {
        matches!(&self.request_id, Some(id) if id != request_id)
    }

    pub fn is_completed(&self) -> bool {
        if let Some(status) = &self.status {
            if COMPLETED_STATUSES.contains(&status.as_str()) {
                return true;
            }
        }
        matches!(self.progress, Some(p) if p >= 100.0)
    }
}

pub fn clamp_progress(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn extract_progress(msg: &Map<String, Value>) -> Option<f64> {
    PROGRESS_KEYS.iter().find_map(|key| {
        let parsed = match msg.get(*key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|p| p.is_finite()).map(clamp_progress)
    })
}

fn first_string(msg: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| msg.get(*key))
        .filter_map(scalar_to_string)
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_object_messages_are_dropped() {
        assert!(InboundEvent::parse("not json").is_none());
        assert!(InboundEvent::parse("[1, 2, 3]").is_none());
        assert!(InboundEvent::parse("\"hello\"").is_none());
    }

    #[test]
    fn test_tolerant_key_names() {
        let event = InboundEvent::parse(
            r#"{"requestId":"r1","imageId":"img-a","percentageComplete":"42.5","imageUrl":"  https://x/y.png "}"#,
        )
        .unwrap();
        assert_eq!(event.request_id.as_deref(), Some("r1"));
        assert_eq!(event.image_id.as_deref(), Some("img-a"));
        assert_eq!(event.progress, Some(42.5));
        assert_eq!(event.url.as_deref(), Some("https://x/y.png"));
        assert_eq!(event.kind, EventKind::Content);
    }

    #[test]
    fn test_numeric_image_id() {
        let event = InboundEvent::parse(r#"{"id": 7}"#).unwrap();
        assert_eq!(event.image_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_progress_is_clamped() {
        let high = InboundEvent::parse(r#"{"progress": 250}"#).unwrap();
        assert_eq!(high.progress, Some(100.0));
        let low = InboundEvent::parse(r#"{"progress": -12}"#).unwrap();
        assert_eq!(low.progress, Some(0.0));
        let text = InboundEvent::parse(r#"{"progress": "1e9"}"#).unwrap();
        assert_eq!(text.progress, Some(100.0));
    }

    #[test]
    fn test_unparseable_progress_falls_through_to_next_key() {
        let event =
            InboundEvent::parse(r#"{"progress": "abc", "percentage_complete": 30}"#).unwrap();
        assert_eq!(event.progress, Some(30.0));
        let none = InboundEvent::parse(r#"{"progress": "nan"}"#).unwrap();
        assert_eq!(none.progress, None);
    }

    #[test]
    fn test_error_classification() {
        let event = InboundEvent::parse(
            r#"{"type":"ERROR","err_code":"blocked","err_msg":"content policy"}"#,
        )
        .unwrap();
        assert_eq!(
            event.kind,
            EventKind::Error {
                code: "blocked".into(),
                message: "content policy".into()
            }
        );

        let by_status = InboundEvent::parse(r#"{"currentStatus":"Error"}"#).unwrap();
        assert_eq!(
            by_status.kind,
            EventKind::Error {
                code: "unknown".into(),
                message: "unknown error".into()
            }
        );
    }

    #[test]
    fn test_unclassified() {
        let event = InboundEvent::parse(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Unclassified);
    }

    #[test]
    fn test_completion_detection() {
        let by_status = InboundEvent::parse(r#"{"current_status":"DONE"}"#).unwrap();
        assert!(by_status.is_completed());
        let by_progress = InboundEvent::parse(r#"{"progress": 100}"#).unwrap();
        assert!(by_progress.is_completed());
        let pending = InboundEvent::parse(r#"{"progress": 99.9, "current_status":"running"}"#)
            .unwrap();
        assert!(!pending.is_completed());
    }

    #[test]
    fn test_foreign_request_ids() {
        let own = InboundEvent::parse(r#"{"request_id":"abc"}"#).unwrap();
        assert!(!own.is_foreign("abc"));
        let other = InboundEvent::parse(r#"{"request_id":"xyz"}"#).unwrap();
        assert!(other.is_foreign("abc"));
        let empty = InboundEvent::parse(r#"{"request_id":""}"#).unwrap();
        assert!(!empty.is_foreign("abc"));
    }
}
