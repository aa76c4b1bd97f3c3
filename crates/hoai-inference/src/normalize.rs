//! Normalization of raw model output into an [`AiSearchResult`].
//!
//! Models asked for JSON still occasionally wrap it in a Markdown fence,
//! prepend `<think>` reasoning, or answer in plain prose. Every shape is
//! accepted:
//!
//! - a JSON object `{title, content, sources}` is used as-is, with blank
//!   fields filled in;
//! - anything else becomes `{title: query, content: text, sources: []}`.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use hoai_core::{AiSearchResult, AiSource};

/// Fields are kept loose so one malformed field never discards the answer.
#[derive(Deserialize, Default)]
struct RawAnswer {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    sources: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Object {
        #[serde(default, alias = "url")]
        uri: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    Uri(String),
}

/// Remove `<think>...</think>` blocks. An unclosed block swallows the rest.
pub fn strip_thinking(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "<think>".len()..];
        match after.find("</think>") {
            Some(end) => rest = &after[end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Unwrap a single surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = body.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Turn raw model output for `query` into a normalized result.
pub fn normalize_response(query: &str, raw: &str) -> AiSearchResult {
    let visible = strip_thinking(raw);
    let text = strip_code_fence(&visible);

    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => serde_json::from_value::<RawAnswer>(value).ok(),
        _ => None,
    };

    match parsed {
        Some(answer) => from_answer(query, answer),
        None => AiSearchResult {
            title: query.to_string(),
            content: text.to_string(),
            sources: Vec::new(),
        },
    }
}

fn from_answer(query: &str, answer: RawAnswer) -> AiSearchResult {
    let title = answer
        .title
        .and_then(|t| match t {
            Value::String(s) => Some(s),
            _ => None,
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| query.to_string());

    let content = match answer.content {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let mut seen = HashSet::new();
    let entries = match answer.sources {
        Some(Value::Array(entries)) => entries,
        _ => Vec::new(),
    };
    let sources = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawSource>(entry).ok())
        .filter_map(|source| {
            let (uri, title) = match source {
                RawSource::Object { uri, title } => (uri.unwrap_or_default(), title),
                RawSource::Uri(uri) => (uri, None),
            };
            let uri = uri.trim().to_string();
            if uri.is_empty() || !seen.insert(uri.clone()) {
                return None;
            }
            let title = title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| uri.clone());
            Some(AiSource { uri, title })
        })
        .collect();

    AiSearchResult {
        title,
        content,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_answer() {
        let raw = r#"{"title":"Leistungsphase 1","content":"Grundlagenermittlung","sources":[{"uri":"https://www.hoai.de/hoai/volltext/hoai-2021/","title":"HOAI 2021"}]}"#;
        let result = normalize_response("lp1", raw);
        assert_eq!(result.title, "Leistungsphase 1");
        assert_eq!(result.content, "Grundlagenermittlung");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].title, "HOAI 2021");
    }

    #[test]
    fn test_prose_falls_back_to_query_title() {
        let result = normalize_response("Was ist LP 8?", "Objektüberwachung und Dokumentation.");
        assert_eq!(result.title, "Was ist LP 8?");
        assert_eq!(result.content, "Objektüberwachung und Dokumentation.");
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_json_array_is_treated_as_text() {
        let result = normalize_response("q", "[1, 2]");
        assert_eq!(result.title, "q");
        assert_eq!(result.content, "[1, 2]");
    }

    #[test]
    fn test_blank_title_falls_back_to_query() {
        let result = normalize_response("Honorarzonen", r#"{"title":"  ","content":"Fünf Zonen."}"#);
        assert_eq!(result.title, "Honorarzonen");
        assert_eq!(result.content, "Fünf Zonen.");
    }

    #[test]
    fn test_sources_are_cleaned() {
        let raw = r#"{
            "title": "t",
            "content": "c",
            "sources": [
                {"uri": "", "title": "leer"},
                {"uri": "https://a.example", "title": ""},
                {"uri": "https://a.example", "title": "Duplikat"},
                {"url": "https://b.example", "title": "B"},
                "https://c.example"
            ]
        }"#;
        let result = normalize_response("q", raw);
        let uris: Vec<_> = result.sources.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
        assert_eq!(result.sources[0].title, "https://a.example");
        assert_eq!(result.sources[1].title, "B");
        assert_eq!(result.sources[2].title, "https://c.example");
    }

    #[test]
    fn test_null_sources_keep_the_answer() {
        let result = normalize_response(
            "q",
            r#"{"title":"HOAI","content":"Antwort","sources":null}"#,
        );
        assert_eq!(result.title, "HOAI");
        assert_eq!(result.content, "Antwort");
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_malformed_fields_are_skipped() {
        let raw = r#"{
            "title": 42,
            "content": "Antwort",
            "sources": [7, {"uri": ["x"]}, {"uri": "https://ok.example", "title": null}]
        }"#;
        let result = normalize_response("Honorar", raw);
        assert_eq!(result.title, "Honorar");
        assert_eq!(result.content, "Antwort");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].uri, "https://ok.example");

        let result = normalize_response("q", r#"{"title":"t","content":"c","sources":"none"}"#);
        assert_eq!(result.title, "t");
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_fenced_json_with_thinking() {
        let raw = "<think>Die Frage betrifft §34.</think>\n```json\n{\"title\":\"§34\",\"content\":\"Leistungsbild\"}\n```";
        let result = normalize_response("q", raw);
        assert_eq!(result.title, "§34");
        assert_eq!(result.content, "Leistungsbild");
    }

    #[test]
    fn test_non_string_content_is_serialized() {
        let result = normalize_response("q", r#"{"title":"t","content":["a","b"]}"#);
        assert_eq!(result.content, r#"["a","b"]"#);
    }

    #[test]
    fn test_strip_thinking_unclosed() {
        assert_eq!(strip_thinking("answer<think>still going"), "answer");
        assert_eq!(strip_thinking("no tags"), "no tags");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
        assert_eq!(strip_code_fence("  plain  "), "plain");
        assert_eq!(strip_code_fence("```unterminated"), "```unterminated");
    }
}
