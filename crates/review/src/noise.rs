use crate::output::ReviewComment;
use globset::GlobSet;

const MAX_COMMENTS_PER_FILE: usize = 10;

/// Drops findings the author should never see: low-confidence guesses,
/// comments on ignored paths, and per-file floods.
///
/// Comments arrive in generator order and leave in severity order
/// (highest first) within each file.
pub struct NoiseFilter {
    confidence_threshold: f64,
    ignored: GlobSet,
    max_per_file: usize,
}

impl NoiseFilter {
    pub fn new(confidence_threshold: f64, ignored: GlobSet) -> Self {
        NoiseFilter {
            confidence_threshold,
            ignored,
            max_per_file: MAX_COMMENTS_PER_FILE,
        }
    }

    pub fn filter(&self, comments: Vec<ReviewComment>) -> Vec<ReviewComment> {
        let mut kept: Vec<ReviewComment> = comments
            .into_iter()
            .filter(|c| c.confidence >= self.confidence_threshold)
            .filter(|c| !self.ignored.is_match(c.path.as_str()))
            .collect();

        kept.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.line.cmp(&b.line))
        });

        let mut result: Vec<ReviewComment> = Vec::new();
        let mut current_file_count = 0usize;
        let mut current_path: Option<&str> = None;
        for comment in &kept {
            if current_path != Some(comment.path.as_str()) {
                current_path = Some(comment.path.as_str());
                current_file_count = 0;
            }
            if current_file_count < self.max_per_file {
                result.push(comment.clone());
                current_file_count += 1;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{Category, FilePath, Severity};
    use globset::{Glob, GlobSetBuilder};

    fn comment(path: &str, line: u32, severity: Severity, confidence: f64) -> ReviewComment {
        ReviewComment {
            path: FilePath::new(path),
            line,
            severity,
            category: Category::Bug,
            confidence,
            message: "finding".into(),
        }
    }

    fn ignored(globs: &[&str]) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for g in globs {
            builder.add(Glob::new(g).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn low_confidence_is_dropped() {
        let filter = NoiseFilter::new(0.7, ignored(&[]));
        let kept = filter.filter(vec![
            comment("a.py", 1, Severity::Warning, 0.9),
            comment("a.py", 2, Severity::Warning, 0.5),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].line, 1);
    }

    #[test]
    fn ignored_paths_are_dropped() {
        let filter = NoiseFilter::new(0.0, ignored(&["vendor/**"]));
        let kept = filter.filter(vec![
            comment("vendor/lib.py", 1, Severity::Critical, 1.0),
            comment("src/app.py", 1, Severity::Suggestion, 1.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path.as_str(), "src/app.py");
    }

    #[test]
    fn per_file_flood_is_capped_keeping_highest_severity() {
        let filter = NoiseFilter::new(0.0, ignored(&[]));
        let mut flood: Vec<ReviewComment> = (0..15)
            .map(|i| comment("big.py", i, Severity::Suggestion, 1.0))
            .collect();
        flood.push(comment("big.py", 99, Severity::Critical, 1.0));

        let kept = filter.filter(flood);
        assert_eq!(kept.len(), MAX_COMMENTS_PER_FILE);
        assert_eq!(kept[0].severity, Severity::Critical);
    }
}
