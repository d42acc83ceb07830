// Request body construction

/// Build the streaming request body for one stream. The prompt embeds the
/// stream ordinal so individual streams can be traced in target logs.
pub fn build_request_body(model: &str, max_tokens: u32, stream_id: usize) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": format!("Stress test stream {}. Respond with a long passage.", stream_id),
            }
        ],
        "max_tokens": max_tokens,
        "stream": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body() {
        let body = build_request_body("mock,mock-model", 4096, 42);

        assert_eq!(body["model"], "mock,mock-model");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
        assert!(body["messages"].is_array());
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("stream 42"));
    }

    #[test]
    fn test_stream_ids_produce_distinct_prompts() {
        let a = build_request_body("m", 16, 0);
        let b = build_request_body("m", 16, 1);
        assert_ne!(a["messages"][0]["content"], b["messages"][0]["content"]);
    }
}
