use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One requested edit against a line-addressed text.
///
/// A change is pinned by two [`Anchor`]s: the first and last affected lines
/// (or, for [`ChangeKind::InsertBetween`], the lines on either side of the
/// insertion point). Both anchors are re-verified against the live text
/// before any mutation happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "a Change does nothing until it is applied"]
pub struct Change {
    /// Label of the file this change targets. A grouping key from the
    /// description header; the applier itself is file-agnostic.
    pub file_tag: String,
    /// Validated `YYYY-MM-DD HH:MM:SS` stamp from the description header.
    /// Carried for traceability, never used in ordering.
    pub timestamp: String,
    /// What to do with the anchored span
    pub kind: ChangeKind,
    /// First affected line (or the line just above the insertion point)
    pub from: Anchor,
    /// Last affected line (or the line just below the insertion point)
    pub to: Anchor,
    /// Replacement text, newline-joined; present for `Replace` and
    /// `InsertBetween`, absent for `Remove`
    pub content: Option<String>,
}

/// The closed set of supported edit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    /// Delete the anchored span
    Remove,
    /// Delete the anchored span and splice the content in its place
    Replace,
    /// Splice the content after the `from` line, removing nothing
    InsertBetween,
}

impl ChangeKind {
    /// Map a section label to its kind. Any other label is rejected by the
    /// parser as an unknown change type.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Remove" => Some(ChangeKind::Remove),
            "Replace" => Some(ChangeKind::Replace),
            "InsertBetween" => Some(ChangeKind::InsertBetween),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Remove => "Remove",
            ChangeKind::Replace => "Replace",
            ChangeKind::InsertBetween => "InsertBetween",
        };
        write!(f, "{}", name)
    }
}

/// Which end of a change's span an anchor pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSide {
    From,
    To,
}

impl fmt::Display for AnchorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorSide::From => write!(f, "From"),
            AnchorSide::To => write!(f, "To"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed anchor '{input}': expected '<line>. <text>'")]
pub struct AnchorError {
    pub input: String,
}

/// A 1-based line number paired with the exact text the change expects to
/// find there. The text is stored trimmed; comparison against the live
/// text trims as well, so indentation and line endings never participate
/// in matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub line: usize,
    pub text: String,
}

impl Anchor {
    /// Parse the textual `<line>. <text>` form.
    ///
    /// Only the first dot separates the line number, so the text part may
    /// itself contain dots. A bare number (`"12"`) anchors line 12 with
    /// empty expected text.
    ///
    /// # Examples
    ///
    /// ```
    /// use mdpatch::Anchor;
    ///
    /// let anchor = Anchor::parse("42. let total = 0;").unwrap();
    /// assert_eq!(anchor.line, 42);
    /// assert_eq!(anchor.text, "let total = 0;");
    /// ```
    pub fn parse(input: &str) -> Result<Self, AnchorError> {
        let (number, text) = match input.split_once('.') {
            Some((number, text)) => (number, text),
            None => (input, ""),
        };
        let line = number.trim().parse::<usize>().map_err(|_| AnchorError {
            input: input.to_string(),
        })?;
        Ok(Self {
            line,
            text: text.trim().to_string(),
        })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.line, self.text)
    }
}
