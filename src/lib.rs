//! mdpatch: verified application of markdown-described line edits.
//!
//! A change description is a small markdown dialect: `# ` headers name a
//! file tag and timestamp, `**Remove**` / `**Replace**` / `**InsertBetween**`
//! sections describe one edit each, and four-backtick fences carry literal
//! replacement content. [`process`] parses a description and applies it to
//! a source text in one verified pass.
//!
//! # Architecture
//!
//! The pipeline is two stages behind one entry point. [`parse_changes`]
//! turns the description into typed [`Change`] records; [`apply_changes`]
//! sorts them ascending by line, walks them in reverse, and splices the
//! line sequence bottom-up so earlier changes keep the line numbers they
//! were computed against. Every change re-verifies both of its [`Anchor`]s
//! against the live text immediately before mutating it.
//!
//! # Verification
//!
//! - Anchors carry the expected (trimmed) text of their line and must still
//!   match at application time
//! - The first mismatch aborts the run with a line-numbered diagnostic and
//!   a five-line context window
//! - A failed run never yields a partially patched text
//!
//! # Example
//!
//! ```
//! let source = "fn main() {\n    old();\n}";
//! let changes = "# main.rs 2024-05-01 12:00:00\n**Replace**\n* From: `2. old();`\n* To: `2. old();`\n````\n    new();\n````";
//!
//! let patched = mdpatch::process(source, changes)?;
//! assert_eq!(patched, "fn main() {\n    new();\n}");
//! # Ok::<(), mdpatch::ProcessError>(())
//! ```

pub mod apply;
pub mod change;
pub mod parse;
pub mod process;

// Re-exports
pub use apply::{apply_changes, resolve_range, ApplyError};
pub use change::{Anchor, AnchorError, AnchorSide, Change, ChangeKind};
pub use parse::{parse_changes, ParseError};
pub use process::{process, ProcessError, ProcessOutcome};
