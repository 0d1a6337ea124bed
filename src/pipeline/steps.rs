//! Pure string-list transforms used between command steps.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde_json::Value;

use crate::error::PipelineError;

/// A pure `list of strings -> list of strings` step.
#[derive(Debug)]
pub enum Transform {
    /// Rewrite every match of `pattern` in each line.
    Replace { pattern: Regex, replacement: String },
    /// Break each line apart on `pattern`, dropping empty pieces.
    Split(Regex),
    /// Keep lines matching `pattern` (or not matching, when `keep` is false).
    Filter { pattern: Regex, keep: bool },
    /// Drop repeated lines, keeping the first occurrence.
    Dedup,
    /// Parse the working set as one XML document and collect `attribute`
    /// from every `element`.
    XmlAttribute { element: String, attribute: String },
    /// Parse the working set as one JSON document and collect every string
    /// stored under `field`, at any depth.
    JsonField(String),
}

impl Transform {
    pub fn apply(&self, lines: Vec<String>) -> Result<Vec<String>, PipelineError> {
        match self {
            Transform::Replace {
                pattern,
                replacement,
            } => Ok(lines
                .into_iter()
                .map(|l| pattern.replace_all(&l, replacement.as_str()).into_owned())
                .collect()),
            Transform::Split(pattern) => Ok(lines
                .iter()
                .flat_map(|l| pattern.split(l))
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()),
            Transform::Filter { pattern, keep } => Ok(lines
                .into_iter()
                .filter(|l| pattern.is_match(l) == *keep)
                .collect()),
            Transform::Dedup => Ok(dedup(lines)),
            Transform::XmlAttribute { element, attribute } => {
                xml_attribute_values(&lines.join("\n"), element, attribute)
            }
            Transform::JsonField(field) => json_field_values(&lines.join("\n"), field),
        }
    }
}

/// Order-preserving deduplication.
pub fn dedup(lines: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    lines
        .into_iter()
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

fn xml_attribute_values(
    xml: &str,
    element: &str,
    attribute: &str,
) -> Result<Vec<String>, PipelineError> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut values = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().local_name().as_ref() == element.as_bytes() =>
            {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PipelineError::parse("xml attribute", err))?;
                    if attr.key.local_name().as_ref() == attribute.as_bytes() {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PipelineError::parse("xml attribute", err))?;
                        values.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(PipelineError::parse("xml document", err)),
            _ => {}
        }
    }

    Ok(values)
}

fn json_field_values(json: &str, field: &str) -> Result<Vec<String>, PipelineError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let root: Value =
        serde_json::from_str(json).map_err(|err| PipelineError::parse("json document", err))?;
    let mut values = Vec::new();
    collect_field(&root, field, &mut values);
    Ok(values)
}

fn collect_field(value: &Value, field: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            // A node's own field comes before its children.
            if let Some(s) = map.get(field).and_then(Value::as_str) {
                out.push(s.to_string());
            }
            for (key, child) in map {
                if key != field {
                    collect_field(child, field, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field(item, field, out);
            }
        }
        _ => {}
    }
}
