/// Analytics capture validation and sanitization.
///
/// Capture is silent-by-design: callers always get 204, so this module's
/// job is deciding what actually gets persisted. Unknown event types are
/// dropped, sensitive property keys are stripped, and strings are
/// truncated before anything touches the database.
use serde_json::{Map, Value};

use crate::models::CaptureRequest;

/// Closed vocabulary of accepted event types.
pub const EVENT_TYPES: [&str; 10] = [
    "page_view",
    "ad_impression",
    "ad_click",
    "ad_play",
    "ad_complete",
    "search",
    "share",
    "filter_apply",
    "outbound_click",
    "client_error",
];

/// Property keys dropped before persistence.
const SENSITIVE_KEYS: [&str; 9] = [
    "email",
    "phone",
    "password",
    "token",
    "authorization",
    "cookie",
    "ip",
    "ip_address",
    "user_agent",
];

const MAX_STRING_LEN: usize = 256;
const MAX_URL_LEN: usize = 512;
const MAX_PROPERTIES: usize = 32;
const MAX_SESSION_ID_LEN: usize = 128;

/// A capture request that passed validation and sanitization.
#[derive(Debug)]
pub struct SanitizedEvent {
    pub event_type: String,
    pub session_id: String,
    pub device_hash: Option<String>,
    pub ad_id: Option<String>,
    pub properties: Option<Value>,
}

/// Why a capture request was dropped. The caller still gets 204; this
/// only feeds logs and metrics.
#[derive(Debug, PartialEq, Eq)]
pub enum DropReason {
    UnknownEventType,
    MissingSessionId,
}

pub fn sanitize(raw: CaptureRequest) -> Result<SanitizedEvent, DropReason> {
    if !EVENT_TYPES.contains(&raw.event_type.as_str()) {
        return Err(DropReason::UnknownEventType);
    }

    let session_id = raw.session_id.trim();
    if session_id.is_empty() {
        return Err(DropReason::MissingSessionId);
    }

    Ok(SanitizedEvent {
        event_type: raw.event_type,
        session_id: truncate(session_id, MAX_SESSION_ID_LEN),
        device_hash: raw
            .device_hash
            .as_deref()
            .map(|h| truncate(h, MAX_SESSION_ID_LEN)),
        ad_id: raw.ad_id.as_deref().map(|a| truncate(a, MAX_STRING_LEN)),
        properties: raw.properties.map(sanitize_properties),
    })
}

/// Strip sensitive keys, truncate strings, and bound the property count.
/// Non-object payloads are discarded entirely.
fn sanitize_properties(value: Value) -> Value {
    let Value::Object(map) = value else {
        return Value::Object(Map::new());
    };

    let mut clean = Map::new();
    for (key, val) in map {
        if clean.len() >= MAX_PROPERTIES {
            break;
        }
        let lower = key.to_ascii_lowercase();
        if SENSITIVE_KEYS.contains(&lower.as_str()) {
            continue;
        }
        let bounded = match val {
            Value::String(s) => {
                let max = if lower.contains("url") {
                    MAX_URL_LEN
                } else {
                    MAX_STRING_LEN
                };
                Value::String(truncate(&s, max))
            }
            // Nested structures are kept as-is; the top-level property
            // cap bounds the overall payload.
            other => other,
        };
        clean.insert(truncate(&key, MAX_STRING_LEN), bounded);
    }

    Value::Object(clean)
}

/// Truncate on a char boundary so multi-byte input cannot panic.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(event_type: &str) -> CaptureRequest {
        CaptureRequest {
            event_type: event_type.to_string(),
            session_id: "sess-1".to_string(),
            device_hash: None,
            ad_id: None,
            properties: None,
        }
    }

    #[test]
    fn accepts_known_event_types() {
        for event_type in EVENT_TYPES {
            assert!(sanitize(request(event_type)).is_ok(), "{}", event_type);
        }
    }

    #[test]
    fn rejects_unknown_event_type() {
        assert_eq!(
            sanitize(request("totally_made_up")).unwrap_err(),
            DropReason::UnknownEventType
        );
    }

    #[test]
    fn rejects_blank_session() {
        let mut raw = request("page_view");
        raw.session_id = "  ".into();
        assert_eq!(sanitize(raw).unwrap_err(), DropReason::MissingSessionId);
    }

    #[test]
    fn strips_sensitive_keys() {
        let mut raw = request("ad_click");
        raw.properties = Some(json!({
            "email": "user@example.com",
            "Ip_Address": "10.0.0.1",
            "label": "hero-banner"
        }));

        let event = sanitize(raw).unwrap();
        let props = event.properties.unwrap();
        assert!(props.get("email").is_none());
        assert!(props.get("Ip_Address").is_none());
        assert_eq!(props["label"], "hero-banner");
    }

    #[test]
    fn truncates_long_strings() {
        let mut raw = request("search");
        raw.properties = Some(json!({ "query": "x".repeat(1000) }));

        let event = sanitize(raw).unwrap();
        let query = event.properties.unwrap()["query"].as_str().unwrap().len();
        assert_eq!(query, MAX_STRING_LEN);
    }

    #[test]
    fn urls_get_a_longer_budget() {
        let mut raw = request("outbound_click");
        raw.properties = Some(json!({ "target_url": format!("https://example.com/{}", "y".repeat(1000)) }));

        let event = sanitize(raw).unwrap();
        let len = event.properties.unwrap()["target_url"]
            .as_str()
            .unwrap()
            .len();
        assert_eq!(len, MAX_URL_LEN);
    }

    #[test]
    fn bounds_property_count() {
        let mut props = Map::new();
        for i in 0..100 {
            props.insert(format!("k{}", i), json!(i));
        }
        let mut raw = request("page_view");
        raw.properties = Some(Value::Object(props));

        let event = sanitize(raw).unwrap();
        let count = event.properties.unwrap().as_object().unwrap().len();
        assert_eq!(count, MAX_PROPERTIES);
    }

    #[test]
    fn non_object_properties_are_discarded() {
        let mut raw = request("page_view");
        raw.properties = Some(json!([1, 2, 3]));
        let event = sanitize(raw).unwrap();
        assert_eq!(event.properties.unwrap(), json!({}));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let truncated = truncate(&"é".repeat(300), MAX_STRING_LEN);
        assert_eq!(truncated.chars().count(), MAX_STRING_LEN);
    }
}
