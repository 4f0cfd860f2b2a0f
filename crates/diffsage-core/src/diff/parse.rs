//! Unified diff parsing into per-file records.
//!
//! Accepts plain `git diff` output as well as `git format-patch` mails, where
//! commit headers precede each diff and a signature trails the last hunk.

use std::sync::OnceLock;

use regex::Regex;

pub const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub from: Option<String>,
    pub to: Option<String>,
    pub is_new: bool,
    pub new_mode: Option<String>,
    pub is_deleted: bool,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Path the file had before the change, or its new path when it was created.
    pub fn source_path(&self) -> Option<&str> {
        match self.from.as_deref() {
            Some(DEV_NULL) | None => self.to.as_deref(),
            Some(path) => Some(path),
        }
    }

    /// Path after the change, or the old path when the file was deleted.
    pub fn target_path(&self) -> Option<&str> {
        match self.to.as_deref() {
            Some(DEV_NULL) | None => self.from.as_deref(),
            Some(path) => Some(path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    /// The `@@ -a,b +c,d @@` line.
    pub header: String,
    /// Context, added, removed and `\ No newline` lines, prefixes included.
    pub lines: Vec<String>,
}

fn git_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^diff --git a/(.+) b/(.+)$").expect("valid regex"))
}

fn hunk_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -\d+(?:,(\d+))? \+\d+(?:,(\d+))? @@").expect("valid regex")
    })
}

fn strip_prefix_path(raw: &str) -> String {
    // `--- a/src/main.rs\t2024-01-01` style timestamps are dropped.
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == DEV_NULL {
        return path.to_string();
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

struct HunkBudget {
    old: usize,
    new: usize,
}

impl HunkBudget {
    fn exhausted(&self) -> bool {
        self.old == 0 && self.new == 0
    }
}

pub fn parse_diff(input: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut budget: Option<HunkBudget> = None;

    for line in input.lines() {
        if let Some(caps) = git_header().captures(line) {
            files.push(FileDiff {
                from: Some(caps[1].to_string()),
                to: Some(caps[2].to_string()),
                ..FileDiff::default()
            });
            budget = None;
            continue;
        }

        // Lines inside an open hunk belong to it until its counts run out.
        if let (Some(b), Some(file)) = (budget.as_mut(), files.last_mut()) {
            if !b.exhausted() || line.starts_with('\\') {
                let consumed = match line.chars().next() {
                    Some('+') => {
                        b.new = b.new.saturating_sub(1);
                        true
                    }
                    Some('-') => {
                        b.old = b.old.saturating_sub(1);
                        true
                    }
                    Some(' ') | None => {
                        b.old = b.old.saturating_sub(1);
                        b.new = b.new.saturating_sub(1);
                        true
                    }
                    Some('\\') => true,
                    _ => false,
                };
                if consumed {
                    if let Some(hunk) = file.hunks.last_mut() {
                        hunk.lines.push(line.to_string());
                    }
                    continue;
                }
            }
        }

        if let Some(caps) = hunk_header().captures(line) {
            let Some(file) = files.last_mut() else {
                continue;
            };
            let count = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<usize>().ok())
                    .unwrap_or(1)
            };
            budget = Some(HunkBudget {
                old: count(1),
                new: count(2),
            });
            file.hunks.push(Hunk {
                header: line.to_string(),
                lines: Vec::new(),
            });
            continue;
        }

        let Some(file) = files.last_mut() else {
            continue;
        };
        if budget.is_some() {
            // A closed hunk followed by anything but a new header ends the file's
            // diff, e.g. the `-- ` signature of a format-patch mail.
            continue;
        }

        if let Some(mode) = line.strip_prefix("new file mode ") {
            file.is_new = true;
            file.new_mode = Some(mode.trim().to_string());
        } else if line.starts_with("deleted file mode ") {
            file.is_deleted = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            file.from = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("rename to ") {
            file.to = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("--- ") {
            file.from = Some(strip_prefix_path(path));
        } else if let Some(path) = line.strip_prefix("+++ ") {
            file.to = Some(strip_prefix_path(path));
        }
    }

    files
}
