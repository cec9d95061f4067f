//! # Artifact Extractor
//!
//! Recovers one source file from the final stage's free-text response.
//! The response may be fenced JSON, bare JSON with an escaped code field,
//! JSON too broken to parse, a fenced code block, or prose around code.
//!
//! Strategies are pure functions tried in order; the first non-empty
//! result wins even if it later fails syntax validation.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

use crate::schema::TargetLanguage;

/// Key holding the reviewed source in the final stage's JSON
pub const FINAL_CODE_KEY: &str = "final_code";

/// A named extraction strategy
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub apply: fn(&str, TargetLanguage) -> Option<String>,
}

/// Strategies in precedence order
pub const STRATEGIES: [Strategy; 5] = [
    Strategy {
        name: "fenced_json",
        apply: fenced_json,
    },
    Strategy {
        name: "inline_json",
        apply: inline_json,
    },
    Strategy {
        name: "final_code_field",
        apply: final_code_field,
    },
    Strategy {
        name: "fenced_code",
        apply: fenced_code,
    },
    Strategy {
        name: "bare_code",
        apply: bare_code,
    },
];

/// Source text recovered from a response, with the strategy that found it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub code: String,
    pub strategy: &'static str,
}

/// Run the strategies in order and return the first non-empty result.
///
/// `None` means no artifact was found; callers must treat it as an
/// extraction failure rather than an empty artifact.
pub fn extract_artifact(raw: &str, language: TargetLanguage) -> Option<Extraction> {
    for strategy in STRATEGIES {
        if let Some(code) = (strategy.apply)(raw, language) {
            if !code.trim().is_empty() {
                tracing::debug!(strategy = strategy.name, "Artifact extracted");
                return Some(Extraction {
                    code,
                    strategy: strategy.name,
                });
            }
        }
    }
    tracing::debug!("No extraction strategy matched");
    None
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```json\s*\n?(\{.*?\})\s*\n?```").expect("fenced json regex")
    })
}

fn any_fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json.*?```").expect("json block regex"))
}

fn final_code_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)"final_code"\s*:\s*["']+(.*?)["']+\s*[,}]"#)
            .expect("final_code field regex")
    })
}

fn fence_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("fence marker regex"))
}

/// One fenced-block pattern per fence tag of `language`, in tag order
fn fenced_code_res(language: TargetLanguage) -> &'static [Regex] {
    static PYTHON: OnceLock<Vec<Regex>> = OnceLock::new();
    let cell = match language {
        TargetLanguage::Python => &PYTHON,
    };
    cell.get_or_init(|| {
        language
            .fence_tags()
            .iter()
            .map(|tag| {
                let pattern = format!(r"(?s)```{}[ \t]*\r?\n(.*?)```", regex::escape(tag));
                Regex::new(&pattern).expect("fenced code regex")
            })
            .collect()
    })
}

/// Turn literal `\n`, `\"` and `\'` sequences into the characters they name
pub fn unescape(code: &str) -> String {
    code.replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
}

fn final_code_of(json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(json).ok()?;
    let code = value.get(FINAL_CODE_KEY)?.as_str()?;
    let code = unescape(code).trim().to_string();
    (!code.is_empty()).then_some(code)
}

/// 1. A ```json fenced object carrying a `final_code` field
pub fn fenced_json(raw: &str, _language: TargetLanguage) -> Option<String> {
    fenced_json_re()
        .captures_iter(raw)
        .find_map(|caps| final_code_of(&caps[1]))
}

/// 2. Any brace-balanced object carrying a `final_code` field, fenced or not
pub fn inline_json(raw: &str, _language: TargetLanguage) -> Option<String> {
    balanced_objects(raw)
        .filter(|candidate| candidate.contains(FINAL_CODE_KEY))
        .find_map(final_code_of)
}

/// 3. The `final_code` value pulled straight out of JSON a parser rejects
pub fn final_code_field(raw: &str, _language: TargetLanguage) -> Option<String> {
    let caps = final_code_field_re().captures(raw)?;
    let code = unescape(&caps[1]).trim().to_string();
    (!code.is_empty()).then_some(code)
}

/// 4. The interior of a fenced block tagged for the target language
pub fn fenced_code(raw: &str, language: TargetLanguage) -> Option<String> {
    fenced_code_res(language).iter().find_map(|re| {
        let caps = re.captures(raw)?;
        let code = caps[1].trim().to_string();
        (!code.is_empty()).then_some(code)
    })
}

/// 5. Free text that looks like test code, with fences and JSON blocks removed
pub fn bare_code(raw: &str, language: TargetLanguage) -> Option<String> {
    if !language
        .framework_markers()
        .iter()
        .any(|marker| raw.contains(marker))
    {
        return None;
    }
    let without_json = any_fenced_json_re().replace_all(raw, "");
    let code = fence_marker_re()
        .replace_all(&without_json, "")
        .trim()
        .to_string();
    (!code.is_empty()).then_some(code)
}

/// Iterate over every brace-balanced `{...}` substring, in order of its
/// opening brace. Braces inside JSON strings are ignored.
pub fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(move |(start, _)| matching_brace(text, start).map(|end| &text[start..=end]))
}

fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the first JSON object in `raw` that deserializes as `T`.
///
/// Tries ```json fenced blocks first, then any balanced object.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    fenced_json_re()
        .captures_iter(raw)
        .find_map(|caps| serde_json::from_str(&caps[1]).ok())
        .or_else(|| balanced_objects(raw).find_map(|obj| serde_json::from_str(obj).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY: TargetLanguage = TargetLanguage::Python;

    #[test]
    fn test_fenced_json_example() {
        let raw = "```json\n{\"final_code\": \"import pytest\\ndef test_x():\\n    assert True\"}\n```";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.code, "import pytest\ndef test_x():\n    assert True");
        assert_eq!(extraction.strategy, "fenced_json");
    }

    #[test]
    fn test_fenced_json_unescapes_double_escaped_sequences() {
        let raw = r#"```json
{"is_valid": true, "final_code": "def test_q():\\n    assert \\\"a\\\" == \\'a\\'"}
```"#;
        assert_eq!(
            fenced_json(raw, PY).unwrap(),
            "def test_q():\n    assert \"a\" == 'a'"
        );
    }

    #[test]
    fn test_fenced_json_beats_fenced_code() {
        let raw = "Here is the fix:\n```python\ndef test_old():\n    pass\n```\n\
                   ```json\n{\"final_code\": \"def test_new():\\n    pass\"}\n```";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.code, "def test_new():\n    pass");
        assert_eq!(extraction.strategy, "fenced_json");
    }

    #[test]
    fn test_first_match_wins_even_when_broken() {
        let raw = "```json\n{\"final_code\": \"def test_x(:\\n    assert True\"}\n```\n\n\
                   ```python\ndef test_x():\n    assert True\n```";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.strategy, "fenced_json");
        assert_eq!(extraction.code, "def test_x(:\n    assert True");
    }

    #[test]
    fn test_fence_patterns_compiled_once() {
        let first = fenced_code_res(PY);
        assert_eq!(first.len(), PY.fence_tags().len());
        assert!(std::ptr::eq(first, fenced_code_res(PY)));
    }

    #[test]
    fn test_inline_json_without_fences() {
        let raw = "Review done. {\"review_notes\": [\"ok\"], \"final_code\": \"import pytest\\n\\ndef test_a():\\n    assert 1\"} Thanks.";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.strategy, "inline_json");
        assert_eq!(extraction.code, "import pytest\n\ndef test_a():\n    assert 1");
    }

    #[test]
    fn test_inline_json_finds_nested_object() {
        let raw = r#"{"review": {"final_code": "def test_n():\n    pass"}, "braces": "}{"}"#;
        assert_eq!(inline_json(raw, PY).unwrap(), "def test_n():\n    pass");
    }

    #[test]
    fn test_field_regex_tolerates_unescaped_quotes() {
        // Inner quotes are not escaped, so no JSON parser accepts this.
        let raw = r#"{"is_valid": true, "final_code": "def test_a():\n    assert "x" in y"}"#;
        assert!(fenced_json(raw, PY).is_none());
        assert!(inline_json(raw, PY).is_none());
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.strategy, "final_code_field");
        assert_eq!(extraction.code, "def test_a():\n    assert \"x\" in y");
    }

    #[test]
    fn test_fenced_python_block() {
        let raw = "The test:\n```python\nimport pytest\n\ndef test_b():\n    assert 2 > 1\n```\nDone.";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.strategy, "fenced_code");
        assert_eq!(extraction.code, "import pytest\n\ndef test_b():\n    assert 2 > 1");
    }

    #[test]
    fn test_bare_code_strips_fences_and_json_blocks() {
        let raw = "```\nimport pytest\n\ndef test_c():\n    assert True\n```\n```json\n{\"notes\": 1}\n```";
        let extraction = extract_artifact(raw, PY).unwrap();
        assert_eq!(extraction.strategy, "bare_code");
        assert_eq!(extraction.code, "import pytest\n\ndef test_c():\n    assert True");
    }

    #[test]
    fn test_prose_only_yields_nothing() {
        assert!(extract_artifact("I could not generate a test for this scenario.", PY).is_none());
        assert!(extract_artifact("", PY).is_none());
        assert!(extract_artifact("{\"final_code\": \"\"}", PY).is_none());
    }

    #[test]
    fn test_bare_code_is_stable_on_its_own_output() {
        let responses = [
            "```json\n{\"final_code\": \"import pytest\\ndef test_x():\\n    assert True\"}\n```",
            "```python\nimport pytest\n\ndef test_y():\n    assert 1 == 1\n```",
            "import pytest\n\n\ndef test_z():\n    assert True\n",
        ];
        for raw in responses {
            let code = extract_artifact(raw, PY).unwrap().code;
            assert_eq!(bare_code(&code, PY).as_deref(), Some(code.as_str()));
        }
    }

    #[test]
    fn test_balanced_objects_ignore_braces_in_strings() {
        let objects: Vec<&str> = balanced_objects(r#"x {"a": "}", "b": {"c": 1}} y"#).collect();
        assert_eq!(objects[0], r#"{"a": "}", "b": {"c": 1}}"#);
        assert_eq!(objects[1], r#"{"c": 1}"#);
    }

    #[test]
    fn test_decode_json_prefers_fenced_block() {
        #[derive(serde::Deserialize)]
        struct Count {
            n: u32,
        }
        let raw = "{\"n\": 1}\n```json\n{\"n\": 2}\n```";
        assert_eq!(decode_json::<Count>(raw).unwrap().n, 2);
        assert!(decode_json::<Count>("nothing").is_none());
    }
}
