//! The idempotency record.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an idempotency record.
///
/// A record is created `Started` when a key is first seen and transitions
/// to `Finished` exactly once; a `Finished` record is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// The guarded execution is (or was) underway.
    Started,
    /// The guarded execution completed and its response is stored.
    Finished,
}

/// One record per distinct idempotency key, owned by the guard.
///
/// Serialized as JSON into the store with the long record TTL (hours),
/// as opposed to the short lock TTL (seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Current lifecycle status.
    pub status: RecordStatus,

    /// Status code of the stored response, once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Serialized response body, once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Redirect target, for operations that answer with a redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl IdempotencyRecord {
    /// Creates a fresh `Started` record.
    #[must_use]
    pub fn started() -> Self {
        Self {
            status: RecordStatus::Started,
            status_code: None,
            body: None,
            redirect_url: None,
        }
    }

    /// Creates a `Finished` record carrying the stored response.
    #[must_use]
    pub fn finished(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Finished,
            status_code: Some(status_code),
            body: Some(body.into()),
            redirect_url: None,
        }
    }

    /// Sets the redirect target.
    #[must_use]
    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Returns `true` once the record reached `Finished`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == RecordStatus::Finished
    }

    /// Returns the stored response, if this record is finished *and*
    /// carries its payload.
    ///
    /// A finished record with no body is a storage-consistency failure;
    /// callers must treat `None` from a finished record as such rather
    /// than replaying an empty result.
    #[must_use]
    pub fn stored_response(&self) -> Option<(u16, &str)> {
        if !self.is_finished() {
            return None;
        }
        match (self.status_code, self.body.as_deref()) {
            (Some(code), Some(body)) => Some((code, body)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_record_has_no_response() {
        let record = IdempotencyRecord::started();
        assert!(!record.is_finished());
        assert!(record.stored_response().is_none());
    }

    #[test]
    fn test_finished_record_exposes_response() {
        let record = IdempotencyRecord::finished(201, r#"{"id":7}"#);
        assert!(record.is_finished());
        assert_eq!(record.stored_response(), Some((201, r#"{"id":7}"#)));
    }

    #[test]
    fn test_finished_record_missing_body_is_not_replayable() {
        let record = IdempotencyRecord {
            status: RecordStatus::Finished,
            status_code: Some(200),
            body: None,
            redirect_url: None,
        };
        assert!(record.stored_response().is_none());
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = IdempotencyRecord::finished(200, "{}").with_redirect("/books/7");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: IdempotencyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_started_record_serializes_compactly() {
        let json = serde_json::to_string(&IdempotencyRecord::started()).unwrap();
        assert_eq!(json, r#"{"status":"started"}"#);
    }
}
