use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// Lower bound for the overall wait on the socket.
pub const MIN_GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// One generation call. The request id is generated here and used to
/// filter every inbound event.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub request_id: String,
    pub prompt: String,
    pub target_count: usize,
    pub aspect_ratio: String,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        target_count: usize,
        aspect_ratio: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            target_count: target_count.max(1),
            aspect_ratio: aspect_ratio.into(),
            timeout: timeout.max(MIN_GENERATION_TIMEOUT),
        }
    }

    /// The single outbound `conversation.item.create` message.
    pub fn to_ws_payload(&self, timestamp_ms: i64) -> Value {
        json!({
            "type": "conversation.item.create",
            "timestamp": timestamp_ms,
            "item": {
                "type": "message",
                "content": [
                    {
                        "requestId": self.request_id,
                        "text": self.prompt,
                        "type": "input_scroll",
                        "properties": {
                            "section_count": 0,
                            "is_kids_mode": false,
                            "enable_nsfw": true,
                            "skip_upsampler": false,
                            "is_initial": false,
                            "aspect_ratio": self.aspect_ratio
                        }
                    }
                ]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps_count_and_timeout() {
        let request = GenerationRequest::new("a cat", 0, "2:3", Duration::from_secs(3));
        assert_eq!(request.target_count, 1);
        assert_eq!(request.timeout, Duration::from_secs(10));

        let request = GenerationRequest::new("a cat", 4, "1:1", Duration::from_secs(90));
        assert_eq!(request.target_count, 4);
        assert_eq!(request.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = GenerationRequest::new("x", 1, "2:3", Duration::from_secs(10));
        let b = GenerationRequest::new("x", 1, "2:3", Duration::from_secs(10));
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_ws_payload_shape() {
        let request = GenerationRequest::new("a red fox", 2, "16:9", Duration::from_secs(60));
        let payload = request.to_ws_payload(1_700_000_000_000);

        assert_eq!(payload["type"], "conversation.item.create");
        assert_eq!(payload["timestamp"], 1_700_000_000_000i64);
        let content = &payload["item"]["content"][0];
        assert_eq!(content["requestId"], request.request_id.as_str());
        assert_eq!(content["text"], "a red fox");
        assert_eq!(content["type"], "input_scroll");
        assert_eq!(content["properties"]["aspect_ratio"], "16:9");
        assert_eq!(content["properties"]["enable_nsfw"], true);
        assert_eq!(content["properties"]["is_initial"], false);
    }
}
