// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Line-oriented diff with semantic tags.
//!
//! Comparison between current and desired state is expressed as a sequence
//! of tagged display lines. The tags carry just enough semantics for an
//! output collaborator to colorize them; nothing here touches a terminal.

use similar::{ChangeTag, TextDiff};

/// Semantic role of a single diff line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffTag {
    /// File label line (`---` / `+++`).
    Header,

    /// Hunk range line (`@@ -a,b +c,d @@`).
    HunkHeader,

    /// Line present only in the desired state.
    Added,

    /// Line present only in the current state.
    Removed,

    /// Line shared by both states.
    Context,
}

/// One display line of a rendered comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub text: String,
}

impl DiffLine {
    pub fn new(tag: DiffTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }
}

/// Produce a unified line diff from `old` to `new`.
///
/// Returns an empty sequence when both sides are identical, so callers can
/// treat "no lines" as "nothing to show".
pub fn unified_diff(old: &str, new: &str, from_label: &str, to_label: &str) -> Vec<DiffLine> {
    if old == new {
        return Vec::new();
    }

    let mut lines = vec![
        DiffLine::new(DiffTag::Header, format!("--- {from_label}")),
        DiffLine::new(DiffTag::Header, format!("+++ {to_label}")),
    ];

    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.context_radius(3);

    for hunk in unified.iter_hunks() {
        lines.push(DiffLine::new(DiffTag::HunkHeader, hunk.header().to_string()));
        for change in hunk.iter_changes() {
            let (tag, sign) = match change.tag() {
                ChangeTag::Delete => (DiffTag::Removed, '-'),
                ChangeTag::Insert => (DiffTag::Added, '+'),
                ChangeTag::Equal => (DiffTag::Context, ' '),
            };

            let text = change.value();
            let text = text.strip_suffix('\n').unwrap_or(text);
            let text = text.strip_suffix('\r').unwrap_or(text);
            lines.push(DiffLine::new(tag, format!("{sign}{text}")));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_content_yields_no_lines() {
        assert!(unified_diff("a\nb\n", "a\nb\n", "old", "new").is_empty());
    }

    #[test]
    fn single_line_change_renders_one_hunk() {
        let lines = unified_diff("a\nb\nc\n", "a\nx\nc\n", "current", "desired");

        let expect = vec![
            DiffLine::new(DiffTag::Header, "--- current"),
            DiffLine::new(DiffTag::Header, "+++ desired"),
            DiffLine::new(DiffTag::HunkHeader, "@@ -1,3 +1,3 @@"),
            DiffLine::new(DiffTag::Context, " a"),
            DiffLine::new(DiffTag::Removed, "-b"),
            DiffLine::new(DiffTag::Added, "+x"),
            DiffLine::new(DiffTag::Context, " c"),
        ];
        assert_eq!(lines, expect);
    }

    #[test]
    fn pure_addition_has_no_removed_lines() {
        let lines = unified_diff("a\n", "a\nb\n", "current", "desired");
        assert!(lines.iter().all(|line| line.tag != DiffTag::Removed));
        assert!(lines
            .iter()
            .any(|line| line.tag == DiffTag::Added && line.text == "+b"));
    }
}
