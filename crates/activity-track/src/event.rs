//! Validation of incoming event batches.

use serde_json::Value;
use thiserror::Error;
use track_agent::EventRecord;

/// Why a submitted batch was refused (answered with 422)
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("body is not valid JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("body must be an event object or an array of event objects")]
    NotABatch,

    #[error("event {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },
}

/// Parse and validate a `POST /track` body.
///
/// Accepts an array of event objects or a single bare object, which becomes
/// a batch of one. Every element must be a complete [`EventRecord`] whose
/// `event`, `url`, `title` and tags are non-empty strings; one bad element
/// rejects the whole batch. A whole-valued float `ts` such as `1.0` counts as
/// an integer.
pub fn parse_batch(body: &[u8]) -> Result<Vec<EventRecord>, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(ValidationError::Malformed)?;

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(ValidationError::NotABatch),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_event(index, item))
        .collect()
}

fn parse_event(index: usize, mut item: Value) -> Result<EventRecord, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidEvent { index, reason };

    let Some(fields) = item.as_object_mut() else {
        return Err(invalid("not an object".to_string()));
    };
    if let Some(ts) = fields.get_mut("ts") {
        integral_ts(ts);
    }

    let record: EventRecord = serde_json::from_value(item).map_err(|e| invalid(e.to_string()))?;

    record.check().map_err(invalid)?;
    // Stored as a signed 64-bit integer
    if i64::try_from(record.ts).is_err() {
        return Err(invalid(format!("`ts` out of range: {}", record.ts)));
    }

    Ok(record)
}

/// Rewrite a whole-valued float such as `1.0` as an integer
fn integral_ts(ts: &mut Value) {
    if let Some(f) = ts.as_f64()
        && ts.is_f64()
        && f.fract() == 0.0
        && (0.0..=i64::MAX as f64).contains(&f)
    {
        *ts = Value::from(f as u64);
    }
}
