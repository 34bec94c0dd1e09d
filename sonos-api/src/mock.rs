//! Scriptable in-memory [`Transport`] for tests
//!
//! Records every request and answers from responses scripted per
//! (method, path). Unscripted requests succeed with `null`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::transport::{Method, Transport};

/// A request observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<(Method, String), std::result::Result<Value, ApiError>>,
    delays: HashMap<(Method, String), Duration>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `method path` request with `value`
    pub fn respond(&self, method: Method, path: impl Into<String>, value: Value) {
        self.script
            .lock()
            .responses
            .insert((method, path.into()), Ok(value));
    }

    /// Fail every `method path` request with `error`
    pub fn fail(&self, method: Method, path: impl Into<String>, error: ApiError) {
        self.script
            .lock()
            .responses
            .insert((method, path.into()), Err(error));
    }

    /// Hold every `method path` request for `delay` before answering
    pub fn delay(&self, method: Method, path: impl Into<String>, delay: Duration) {
        self.script.lock().delays.insert((method, path.into()), delay);
    }

    /// All calls in the order they were issued
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }

    /// Number of calls made with `method` to `path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.calls.lock().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        let key = (method, path.to_string());
        let (delay, response) = {
            let script = self.script.lock();
            (
                script.delays.get(&key).copied(),
                script.responses.get(&key).cloned(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            Some(result) => result,
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_and_scripts() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/households", json!({"households": []}));

        let value = mock.request(Method::Get, "/households", None).await.unwrap();
        assert_eq!(value, json!({"households": []}));

        let value = mock
            .request(Method::Post, "/other", Some(json!({})))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);

        assert_eq!(mock.calls().len(), 2);
        assert_eq!(mock.count(Method::Post, "/other"), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_repeats() {
        let mock = MockTransport::new();
        mock.fail(Method::Get, "/x", ApiError::NetworkError("down".into()));

        for _ in 0..2 {
            assert!(mock.request(Method::Get, "/x", None).await.is_err());
        }
    }
}
