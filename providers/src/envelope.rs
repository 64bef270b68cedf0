use serde::Deserialize;
use serde_json::Value;

/// Location of the answer text within a response envelope, as an RFC 6901 JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct AnswerPath(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("answer path {0:?} is not a JSON pointer (must start with '/')")]
pub struct InvalidAnswerPath(String);

impl AnswerPath {
    /// `candidates[0].content.parts[0].text` of a `generateContent` response.
    pub const GEMINI: &'static str = "/candidates/0/content/parts/0/text";

    pub fn new(pointer: impl Into<String>) -> Result<Self, InvalidAnswerPath> {
        let pointer = pointer.into();
        if pointer.starts_with('/') {
            Ok(Self(pointer))
        } else {
            Err(InvalidAnswerPath(pointer))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The answer text, or `None` if the path is absent or not a string.
    #[must_use]
    pub fn extract<'a>(&self, envelope: &'a Value) -> Option<&'a str> {
        envelope.pointer(&self.0).and_then(Value::as_str)
    }
}

impl Default for AnswerPath {
    fn default() -> Self {
        Self(Self::GEMINI.to_string())
    }
}

impl TryFrom<String> for AnswerPath {
    type Error = InvalidAnswerPath;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerPath, InvalidAnswerPath};
    use serde_json::json;

    #[test]
    fn extracts_gemini_answer() {
        let envelope = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "hello" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(AnswerPath::default().extract(&envelope), Some("hello"));
    }

    #[test]
    fn missing_candidates_yields_none() {
        let envelope = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(AnswerPath::default().extract(&envelope), None);
    }

    #[test]
    fn non_string_answer_yields_none() {
        let envelope = json!({ "candidates": [{ "content": { "parts": [{ "text": 42 }] } }] });
        assert_eq!(AnswerPath::default().extract(&envelope), None);
    }

    #[test]
    fn empty_answer_is_still_present() {
        let envelope = json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] } }] });
        assert_eq!(AnswerPath::default().extract(&envelope), Some(""));
    }

    #[test]
    fn custom_pointer() {
        let path = AnswerPath::new("/choices/0/message/content").unwrap();
        let envelope = json!({ "choices": [{ "message": { "content": "hi" } }] });
        assert_eq!(path.extract(&envelope), Some("hi"));
    }

    #[test]
    fn rejects_dotted_path() {
        assert_eq!(
            AnswerPath::new("candidates.0.text"),
            Err(InvalidAnswerPath("candidates.0.text".to_string()))
        );
    }
}
