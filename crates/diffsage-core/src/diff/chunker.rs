use std::sync::OnceLock;

use regex::Regex;

use crate::constants::defaults;
use crate::diff::parse::{parse_diff, FileDiff};

/// One file's diff, rebuilt as a standalone fenced block ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffChunk {
    pub path: String,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedDiff {
    pub chunks: Vec<DiffChunk>,
    /// Set when at least one chunk was cut to the size limit.
    pub truncated: bool,
}

impl ChunkedDiff {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.text.as_str())
    }
}

fn binary_patch() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)GIT\sbinary\spatch.*?literal\s0").expect("valid regex"))
}

/// Drop `GIT binary patch` payloads; they carry nothing reviewable.
pub fn strip_binary_patches(patch: &str) -> String {
    binary_patch().replace_all(patch, "").into_owned()
}

/// Splits a raw patch into per-file prompt blocks.
pub struct DiffChunker {
    max_chars: usize,
    ignored_paths: Vec<String>,
    hold_reply_note: String,
}

impl DiffChunker {
    /// `hold_reply_note` is appended to every block to keep the model quiet
    /// until the whole diff has been sent.
    pub fn new(hold_reply_note: impl Into<String>) -> Self {
        Self {
            max_chars: defaults::MAX_CHUNK_CHARS,
            ignored_paths: defaults::IGNORED_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            hold_reply_note: hold_reply_note.into(),
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_ignored_paths(mut self, ignored: Vec<String>) -> Self {
        self.ignored_paths = ignored;
        self
    }

    /// Matches the source path only; a file created by the change has
    /// `/dev/null` there and is always kept.
    fn is_ignored(&self, file: &FileDiff) -> bool {
        let Some(ref path) = file.from else {
            return false;
        };
        self.ignored_paths
            .iter()
            .any(|pattern| !pattern.is_empty() && path.contains(pattern.as_str()))
    }

    pub fn chunk(&self, patch: &str) -> ChunkedDiff {
        let cleaned = strip_binary_patches(patch);
        let mut result = ChunkedDiff::default();

        for file in parse_diff(&cleaned) {
            if self.is_ignored(&file) {
                tracing::debug!("Skipping ignored file {:?}", file.source_path());
                continue;
            }

            let mut text = self.render_block(&file);
            let mut truncated = false;
            if text.chars().count() > self.max_chars {
                text = text.chars().take(self.max_chars).collect();
                truncated = true;
                result.truncated = true;
                tracing::warn!(
                    "Diff for {} truncated to {} characters",
                    file.source_path().unwrap_or("<unknown>"),
                    self.max_chars
                );
            }

            result.chunks.push(DiffChunk {
                path: file.source_path().unwrap_or_default().to_string(),
                text,
                truncated,
            });
        }

        result
    }

    fn render_block(&self, file: &FileDiff) -> String {
        let mut parts: Vec<String> = vec!["```diff".to_string()];
        if let (Some(from), Some(to)) = (file.source_path(), file.target_path()) {
            parts.push(format!("diff --git a/{} b/{}", from, to));
        }
        if file.is_new {
            if let Some(ref mode) = file.new_mode {
                parts.push(format!("new file mode {}", mode));
            }
        }
        if let Some(ref from) = file.from {
            parts.push(format!("--- {}", from));
        }
        if let Some(ref to) = file.to {
            parts.push(format!("+++ {}", to));
        }
        for hunk in &file.hunks {
            parts.push(hunk.header.clone());
            parts.extend(hunk.lines.iter().cloned());
        }
        parts.push("```".to_string());
        parts.push(format!("\n{}", self.hold_reply_note));
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_block_removed_across_lines() {
        let patch = "before\nGIT binary patch\nliteral 12\nzcmZ?\n\nliteral 0\nHcmV?d00001\nafter";
        let stripped = strip_binary_patches(patch);
        assert!(!stripped.contains("GIT binary patch"));
        assert!(!stripped.contains("zcmZ?"));
        assert!(stripped.starts_with("before\n"));
        assert!(stripped.ends_with("after"));
    }

    #[test]
    fn binary_match_is_case_insensitive() {
        assert_eq!(strip_binary_patches("git BINARY patch\r\nxyz LITERAL 0"), "");
    }

    #[test]
    fn block_layout() {
        let patch = "\
diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1 +1 @@
-a
+b
";
        let chunked = DiffChunker::new("WAIT").chunk(patch);
        assert_eq!(chunked.chunks.len(), 1);
        assert_eq!(
            chunked.chunks[0].text,
            "```diff\ndiff --git a/a.txt b/a.txt\n--- a.txt\n+++ a.txt\n@@ -1 +1 @@\n-a\n+b\n```\n\nWAIT"
        );
        assert!(!chunked.truncated);
    }
}
