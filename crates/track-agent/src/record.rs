//! The unit of telemetry shared by the agent and the ingestion server.

use serde::{Deserialize, Serialize};

/// One user-interaction event, captured at `track()` time.
///
/// Serialized field names are the wire format accepted by `POST /track`.
/// Unknown fields are rejected on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRecord {
    /// Event identifier, e.g. `"click"`. Never empty.
    pub event: String,
    /// Free-form tags, order preserved.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Address of the page the event originated on
    pub url: String,
    /// Title of the page the event originated on
    pub title: String,
    /// Seconds since the Unix epoch
    pub ts: u64,
}

impl EventRecord {
    /// Create a record stamped with the current wall-clock time
    pub fn new(
        event: impl Into<String>,
        tags: Vec<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::with_ts(event, tags, url, title, now_secs())
    }

    pub fn with_ts(
        event: impl Into<String>,
        tags: Vec<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        ts: u64,
    ) -> Self {
        EventRecord {
            event: event.into(),
            tags,
            url: url.into(),
            title: title.into(),
            ts,
        }
    }

    /// Check the string fields the ingestion server requires to be non-empty.
    ///
    /// Returns the reason for the first violation found.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.event.is_empty() {
            return Err("`event` must not be empty".to_string());
        }
        if self.url.is_empty() {
            return Err("`url` must not be empty".to_string());
        }
        if self.title.is_empty() {
            return Err("`title` must not be empty".to_string());
        }
        if let Some(index) = self.tags.iter().position(String::is_empty) {
            return Err(format!("`tags[{index}]` must not be empty"));
        }
        Ok(())
    }
}

/// Current Unix time in whole seconds (clamped at zero for pre-epoch clocks)
pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let record = EventRecord::with_ts(
            "click",
            vec!["button-a".to_string()],
            "http://a/1.html",
            "Home",
            1_700_000_000,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "event": "click",
                "tags": ["button-a"],
                "url": "http://a/1.html",
                "title": "Home",
                "ts": 1_700_000_000u64,
            })
        );
    }

    #[test]
    fn test_missing_tags_default_to_empty() {
        let record: EventRecord =
            serde_json::from_str(r#"{"event":"x","url":"http://a","title":"t","ts":1}"#).unwrap();
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<EventRecord, _> = serde_json::from_str(
            r#"{"event":"x","tags":[],"url":"u","title":"t","ts":1,"extra":true}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_check_rejects_empty_strings() {
        let ok = EventRecord::with_ts("click", vec!["a".into()], "http://a", "Home", 1);
        assert!(ok.check().is_ok());

        let mut no_url = ok.clone();
        no_url.url.clear();
        assert!(no_url.check().unwrap_err().contains("url"));

        let mut no_title = ok.clone();
        no_title.title.clear();
        assert!(no_title.check().unwrap_err().contains("title"));

        let mut empty_tag = ok.clone();
        empty_tag.tags.push(String::new());
        assert!(empty_tag.check().unwrap_err().contains("tags[1]"));
    }

    #[test]
    fn test_new_captures_current_time() {
        let before = now_secs();
        let record = EventRecord::new("scroll", Vec::new(), "http://a", "t");
        assert!(record.ts >= before);
        assert!(record.ts <= now_secs());
    }
}
