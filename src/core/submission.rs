//! Result submission for completed testing paradigms.
//!
//! Paradigm screens hand their collected answers to a [`ResultSink`] and
//! move on; submission is fire-and-forget. A failure is surfaced to the user
//! once, with no retry. The rest of the application only depends on the
//! trait, so tests swap in a recording sink.

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::Serialize;
use thiserror::Error;

/// Collected answers from one paradigm run
#[derive(Debug, Clone, Serialize)]
pub struct ParadigmResult {
    /// Paradigm identifier, e.g. "EMAQuestion" or "AuditoryOddball"
    pub paradigm: String,
    #[serde(rename = "ambulatoryUUID")]
    pub ambulatory_uuid: String,
    /// ISO-8601 completion timestamp
    pub time: String,
    /// Paradigm-specific response payload
    pub responses: serde_json::Value,
    /// Extra paradigm-specific fields, flattened into the payload
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ParadigmResult {
    /// Builds a result stamped with the current time
    pub fn new(
        paradigm: impl Into<String>,
        ambulatory_uuid: impl Into<String>,
        responses: serde_json::Value,
    ) -> Self {
        Self {
            paradigm: paradigm.into(),
            ambulatory_uuid: ambulatory_uuid.into(),
            time: Utc::now().to_rfc3339(),
            responses,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("could not reach the submission endpoint: {0}")]
    Transport(String),

    #[error("submission rejected with status {status}")]
    Rejected { status: u16 },
}

/// Destination for completed paradigm results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn submit(&self, result: &ParadigmResult) -> Result<(), SubmitError>;
}

/// Posts results as JSON to the study's collection endpoint
pub struct HttpResultSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResultSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    async fn submit(&self, result: &ParadigmResult) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(result)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SubmitError::Rejected {
                status: response.status().as_u16(),
            });
        }
        info!("Submitted {} result", result.paradigm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn payload_uses_the_wire_field_names() {
        let result = ParadigmResult::new("EMAQuestion", "dummy", json!({ "mood": 4 }))
            .with_extra("sessionIndex", json!(2));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["paradigm"], "EMAQuestion");
        assert_eq!(value["ambulatoryUUID"], "dummy");
        assert_eq!(value["responses"]["mood"], 4);
        assert_eq!(value["sessionIndex"], 2);
        assert!(value["time"].as_str().unwrap().contains('T'));
    }

    struct RecordingSink {
        submissions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn submit(&self, result: &ParadigmResult) -> Result<(), SubmitError> {
            self.submissions
                .lock()
                .unwrap()
                .push(result.paradigm.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn sinks_are_swappable_behind_the_trait() {
        let sink = RecordingSink {
            submissions: Mutex::new(Vec::new()),
        };
        let result = ParadigmResult::new("MotorImagery", "dummy", json!({}));
        sink.submit(&result).await.unwrap();
        assert_eq!(*sink.submissions.lock().unwrap(), vec!["MotorImagery"]);
    }
}
