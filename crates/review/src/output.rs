use argus_core::{Category, FilePath, Severity};
use serde::{Deserialize, Serialize};

/// One review finding, anchored to a line of the new file version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub path: FilePath,
    pub line: u32,
    pub severity: Severity,
    pub category: Category,
    /// Generator confidence in `[0, 1]`; the noise filter thresholds it.
    pub confidence: f64,
    pub message: String,
}

/// Structured output of the opaque review generator.
///
/// This is the wire schema: the generator is asked for exactly this JSON
/// shape and everything downstream (filter, publisher) consumes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub summary: String,
    #[serde(default)]
    pub comments: Vec<ReviewComment>,
}

impl ReviewOutput {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.comments.iter().map(|c| c.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_schema_round_trips() {
        let json = r#"{
            "summary": "looks fine",
            "comments": [
                {"path": "a/x.py", "line": 3, "severity": "warning",
                 "category": "bug", "confidence": 0.8, "message": "off by one"}
            ]
        }"#;
        let output: ReviewOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.comments.len(), 1);
        assert_eq!(output.comments[0].severity, Severity::Warning);
        assert_eq!(output.comments[0].category, Category::Bug);
        assert_eq!(output.highest_severity(), Some(Severity::Warning));

        let back = serde_json::to_string(&output).unwrap();
        let reparsed: ReviewOutput = serde_json::from_str(&back).unwrap();
        assert_eq!(output, reparsed);
    }

    #[test]
    fn comments_default_to_empty() {
        let output: ReviewOutput = serde_json::from_str(r#"{"summary": "clean"}"#).unwrap();
        assert!(output.comments.is_empty());
        assert_eq!(output.highest_severity(), None);
    }
}
