//! Record classification for agent output lines
//!
//! Agents emit newline-delimited JSON (`--output-format stream-json`)
//! interleaved with plain diagnostic text. Structured records are reduced to
//! the text a reader cares about; anything else passes through verbatim.

use serde_json::Value;

use crate::types::records::OutputRecord;

/// Classify a structured record
///
/// Priority order: nested `delta.text`, assistant `content` (string or array
/// of parts, joined with `\n`), `result` string, `message` string. Records
/// matching none of these carry no displayable text and yield `None`.
#[must_use]
pub fn classify_record(value: &Value) -> Option<OutputRecord> {
    if let Some(text) = delta_text(value) {
        return Some(OutputRecord::StreamDelta(text.to_string()));
    }

    if let Some(text) = content_text(value) {
        return Some(OutputRecord::AssistantText(text));
    }

    if let Some(text) = value.get("result").and_then(Value::as_str) {
        return Some(OutputRecord::ResultText(text.to_string()));
    }

    if let Some(text) = value.get("message").and_then(Value::as_str) {
        return Some(OutputRecord::GenericMessage(text.to_string()));
    }

    None
}

/// Interpret one extracted line, terminator included
///
/// Lines that are not JSON objects come back as [`OutputRecord::RawLine`]
/// holding the line exactly as received. Whitespace-only lines yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<OutputRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() => {
            let record = classify_record(&value);
            if record.is_none() {
                log::trace!("Skipping record without text: {trimmed}");
            }
            record
        }
        _ => Some(OutputRecord::RawLine(line.to_string())),
    }
}

/// `delta.text`, either top-level or inside a partial-message `event`
fn delta_text(value: &Value) -> Option<&str> {
    value
        .pointer("/delta/text")
        .or_else(|| value.pointer("/event/delta/text"))
        .and_then(Value::as_str)
}

/// Assistant content, either top-level or inside `message`
fn content_text(value: &Value) -> Option<String> {
    let content = value
        .get("content")
        .or_else(|| value.pointer("/message/content"))?;

    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts.iter().filter_map(part_text).collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn part_text(part: &Value) -> Option<&str> {
    match part {
        Value::String(text) => Some(text.as_str()),
        Value::Object(_) => part.get("text").and_then(Value::as_str),
        _ => None,
    }
}
