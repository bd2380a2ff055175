//! Parsing of the model's raw output into candidate detections.
//!
//! Expected payload: `{"detections": [{"mistake_slug", "reason", "how_starts", "how_ends"}]}`.
//! Models sometimes wrap it in markdown fences or prose, or return the list
//! bare; all of those are accepted.

use serde_json::Value;

/// A detection as reported by the model, before it is tied to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDetection {
    pub mistake_slug: String,
    pub reason: String,
    pub how_starts: String,
    pub how_ends: String,
}

/// Outcome of parsing one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Detections(Vec<CandidateDetection>),
    /// Not interpretable as a detections payload; the reason is for logs.
    Malformed(String),
}

impl ParsedResponse {
    /// Candidates, treating a malformed response as empty.
    pub fn into_candidates(self) -> Vec<CandidateDetection> {
        match self {
            ParsedResponse::Detections(candidates) => candidates,
            ParsedResponse::Malformed(_) => Vec::new(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ParsedResponse::Malformed(_))
    }
}

/// Parse a raw model response.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let payload = strip_fences(raw);

    let Some(value) = parse_json(payload) else {
        return ParsedResponse::Malformed(format!(
            "not valid JSON: {}",
            preview(raw, 200)
        ));
    };

    let items = match value {
        Value::Object(mut map) => match map.remove("detections") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return ParsedResponse::Malformed(format!("\"detections\" is not a list: {}", other))
            }
            None => return ParsedResponse::Malformed("no \"detections\" key".to_string()),
        },
        Value::Array(items) => items,
        other => return ParsedResponse::Malformed(format!("unexpected payload: {}", other)),
    };

    ParsedResponse::Detections(items.iter().filter_map(candidate_from).collect())
}

/// Take the contents of the first markdown code fence, if any.
fn strip_fences(raw: &str) -> &str {
    for fence in ["```json", "```"] {
        if let Some(pos) = raw.find(fence) {
            let start = pos + fence.len();
            let end = raw[start..].find("```").map_or(raw.len(), |e| start + e);
            return raw[start..end].trim();
        }
    }
    raw.trim()
}

/// Parse JSON, falling back to the outermost object or list in the text.
fn parse_json(payload: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(payload) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (payload.find(open), payload.rfind(close)) {
            if end > start {
                if let Ok(value) = serde_json::from_str(&payload[start..=end]) {
                    return Some(value);
                }
            }
        }
    }

    None
}

fn candidate_from(item: &Value) -> Option<CandidateDetection> {
    let obj = item.as_object()?;
    let mistake_slug = text_of(obj.get("mistake_slug")).trim().to_string();
    if mistake_slug.is_empty() {
        return None;
    }

    Some(CandidateDetection {
        mistake_slug,
        reason: text_of(obj.get("reason")).trim().to_string(),
        how_starts: text_of(obj.get("how_starts")),
        how_ends: text_of(obj.get("how_ends")),
    })
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detections_object() {
        let raw = r#"{"detections": [
            {"mistake_slug": "Straw Man", "reason": " Misrepresents the plan. ", "how_starts": "So you", "how_ends": "no borders"},
            {"mistake_slug": "Hyperbole", "reason": "Exaggerates.", "how_starts": null}
        ]}"#;

        let candidates = parse_response(raw).into_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].reason, "Misrepresents the plan.");
        assert_eq!(candidates[1].how_starts, "");
        assert_eq!(candidates[1].how_ends, "");
    }

    #[test]
    fn test_parse_empty_detections_is_not_malformed() {
        let parsed = parse_response(r#"{"detections": []}"#);
        assert_eq!(parsed, ParsedResponse::Detections(vec![]));
    }

    #[test]
    fn test_parse_fenced_payload() {
        let raw = "Here is my analysis:\n\n```json\n{\"detections\": [{\"mistake_slug\": \"Ad Hominem\", \"reason\": \"r\"}]}\n```\nDone.";
        let candidates = parse_response(raw).into_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].mistake_slug, "Ad Hominem");
    }

    #[test]
    fn test_parse_bare_list_and_prose() {
        let bare = parse_response(r#"[{"mistake_slug": "Hyperbole", "reason": "r"}]"#);
        assert_eq!(bare.into_candidates().len(), 1);

        let prose = parse_response(r#"Sure! {"detections": [{"mistake_slug": "Hyperbole"}]} Hope this helps."#);
        assert_eq!(prose.into_candidates().len(), 1);
    }

    #[test]
    fn test_parse_drops_entries_without_slug() {
        let raw = r#"{"detections": [{"mistake_slug": "  ", "reason": "r"}, {"reason": "r"}, "junk"]}"#;
        assert_eq!(parse_response(raw), ParsedResponse::Detections(vec![]));
    }

    #[test]
    fn test_parse_malformed_yields_empty() {
        for raw in [
            "I could not find anything.",
            r#"{"detections": "none"}"#,
            r#"{"results": []}"#,
            "42",
            "",
        ] {
            let parsed = parse_response(raw);
            assert!(parsed.is_malformed(), "expected malformed for {:?}", raw);
            assert!(parsed.into_candidates().is_empty());
        }
    }
}
