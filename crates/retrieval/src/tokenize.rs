use std::collections::BTreeSet;

/// Split text into lowercase identifier tokens.
///
/// camelCase, snake_case, and dot-paths all split into their components,
/// and the compound itself is kept too, so `getUserName` matches both
/// "get user name" queries and exact-identifier queries.
pub fn split_identifiers(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.is_empty() {
            continue;
        }
        let compound = word.to_lowercase();
        let parts = split_word(word);
        if parts.len() > 1 {
            tokens.extend(parts);
        }
        tokens.push(compound);
    }
    tokens
}

/// Split one word on underscores and camelCase humps.
fn split_word(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in word.split('_') {
        if piece.is_empty() {
            continue;
        }
        let mut current = String::new();
        let mut prev_lower = false;
        for c in piece.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                parts.push(current.to_lowercase());
                current = String::new();
            }
            prev_lower = c.is_lowercase() || c.is_numeric();
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

/// Unique identifiers appearing in a unified diff, in first-seen order.
///
/// Only changed lines (`+`/`-`) contribute; context lines and hunk headers
/// would drown the query in noise.
pub fn extract_identifiers(diff: &str) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut ordered: Vec<String> = Vec::new();

    for line in diff.lines() {
        let is_change = (line.starts_with('+') && !line.starts_with("+++"))
            || (line.starts_with('-') && !line.starts_with("---"));
        if !is_change {
            continue;
        }
        for token in line[1..].split(|c: char| !c.is_alphanumeric() && c != '_') {
            if token.len() < 3 || token.chars().all(|c| c.is_numeric()) {
                continue;
            }
            if seen.insert(token.to_string()) {
                ordered.push(token.to_string());
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_splits() {
        let tokens = split_identifiers("getUserName");
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"name".to_string()));
        assert!(tokens.contains(&"getusername".to_string()));
    }

    #[test]
    fn snake_case_and_dot_paths_split() {
        let tokens = split_identifiers("shard_store.load_selected");
        assert!(tokens.contains(&"shard".to_string()));
        assert!(tokens.contains(&"store".to_string()));
        assert!(tokens.contains(&"load".to_string()));
        assert!(tokens.contains(&"selected".to_string()));
    }

    #[test]
    fn diff_identifiers_come_from_changed_lines_only() {
        let diff = "\
--- a/a/y.py
+++ b/a/y.py
@@ -1,3 +1,4 @@
 import os
+from b.z import compute_total
-    return legacy_total()
 # trailing context
";
        let ids = extract_identifiers(diff);
        assert!(ids.contains(&"compute_total".to_string()));
        assert!(ids.contains(&"legacy_total".to_string()));
        // Context lines contribute nothing.
        assert!(!ids.iter().any(|i| i == "trailing"));
    }

    #[test]
    fn short_and_numeric_tokens_are_dropped() {
        let ids = extract_identifiers("+x = 12345 + do_work()\n");
        assert!(!ids.contains(&"12345".to_string()));
        assert!(ids.contains(&"do_work".to_string()));
    }
}
