//! Markdown change-description parser.
//!
//! The description dialect is line-oriented: `# ` headers open file blocks,
//! `**...**` labels open change sections, and four-backtick fences delimit
//! literal replacement content. One forward scan groups raw lines into
//! blocks; each block is then validated into [`Change`] records.

use crate::change::{Anchor, AnchorError, AnchorSide, Change, ChangeKind};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Fence delimiter for literal content inside a change section.
const FENCE: &str = "````";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Empty file name")]
    EmptyFileTag,

    #[error("Invalid or missing timestamp for file {file_tag}")]
    InvalidTimestamp { file_tag: String },

    #[error("Unknown change type {label}")]
    UnknownChangeKind { label: String },

    #[error("Missing From or To in {kind} section")]
    MissingAnchor { kind: ChangeKind },

    #[error("Invalid {side} anchor in {kind} section: {source}")]
    InvalidAnchor {
        side: AnchorSide,
        kind: ChangeKind,
        source: AnchorError,
    },

    #[error("Invalid content format in {kind} section")]
    InvalidContent { kind: ChangeKind },

    #[error("No valid changes found")]
    NoChanges,
}

/// Raw lines of one `# `-headed region, grouped but not yet validated.
struct FileBlock {
    header: String,
    sections: Vec<Section>,
}

/// One `**...**`-labelled section and the raw lines under it.
struct Section {
    label: String,
    lines: Vec<String>,
}

/// Parse a change description into an ordered list of changes.
///
/// The scan recognizes structure markers only outside fenced content, so
/// replacement text may freely contain `# ` and `**` lines. Parsing stops
/// at the first structurally invalid block; an input that yields no changes
/// at all is an error rather than an empty success.
pub fn parse_changes(input: &str) -> Result<Vec<Change>, ParseError> {
    let mut changes = Vec::new();
    let mut current: Option<FileBlock> = None;
    let mut in_fence = false;

    for line in input.split('\n') {
        if line.starts_with("# ") && !in_fence {
            if let Some(block) = current.take() {
                changes.extend(parse_file_block(&block)?);
            }
            current = Some(FileBlock {
                header: line[2..].trim().to_string(),
                sections: Vec::new(),
            });
        } else if line.starts_with("**") && !in_fence {
            if let Some(block) = current.as_mut() {
                block.sections.push(Section {
                    label: line[2..].trim().to_string(),
                    lines: Vec::new(),
                });
            }
        } else {
            if line.starts_with(FENCE) {
                in_fence = !in_fence;
            }
            if let Some(block) = current.as_mut() {
                if let Some(section) = block.sections.last_mut() {
                    section.lines.push(line.to_string());
                }
            }
        }
    }

    if let Some(block) = current.take() {
        changes.extend(parse_file_block(&block)?);
    }

    if changes.is_empty() {
        return Err(ParseError::NoChanges);
    }
    Ok(changes)
}

/// Validate one file block: header first, then every section in order.
///
/// A block whose header is valid but which holds no sections contributes
/// nothing (and is not itself an error).
fn parse_file_block(block: &FileBlock) -> Result<Vec<Change>, ParseError> {
    // Header is "<tag> <date> <time>"; anything after the time is ignored.
    let mut tokens = block.header.split(' ');
    let file_tag = tokens.next().unwrap_or("").trim();
    let date = tokens.next();
    let time = tokens.next();

    if file_tag.is_empty() {
        return Err(ParseError::EmptyFileTag);
    }

    let timestamp = match (date, time) {
        (Some(date), Some(time)) => format!("{} {}", date, time),
        _ => String::new(),
    };
    if !valid_timestamp(&timestamp) {
        return Err(ParseError::InvalidTimestamp {
            file_tag: file_tag.to_string(),
        });
    }

    let mut changes = Vec::with_capacity(block.sections.len());
    for section in &block.sections {
        changes.push(parse_section(file_tag, &timestamp, section)?);
    }
    Ok(changes)
}

fn parse_section(
    file_tag: &str,
    timestamp: &str,
    section: &Section,
) -> Result<Change, ParseError> {
    // The kind is the text before the closing "**". A label with no closing
    // marker can never name a valid kind, so it is rejected as unknown.
    let Some((label, _)) = section.label.split_once("**") else {
        return Err(ParseError::UnknownChangeKind {
            label: section.label.clone(),
        });
    };
    let kind = ChangeKind::from_label(label).ok_or_else(|| ParseError::UnknownChangeKind {
        label: label.to_string(),
    })?;

    let from_line = section
        .lines
        .iter()
        .find(|line| line.trim().starts_with("* From:"));
    let to_line = section
        .lines
        .iter()
        .find(|line| line.trim().starts_with("* To:"));
    let (Some(from_line), Some(to_line)) = (from_line, to_line) else {
        return Err(ParseError::MissingAnchor { kind });
    };

    let from = parse_anchor_value(from_line, "* From:", AnchorSide::From, kind)?;
    let to = parse_anchor_value(to_line, "* To:", AnchorSide::To, kind)?;

    let content = match kind {
        ChangeKind::Remove => None,
        ChangeKind::Replace | ChangeKind::InsertBetween => {
            Some(extract_content(&section.lines, kind)?)
        }
    };

    Ok(Change {
        file_tag: file_tag.to_string(),
        timestamp: timestamp.to_string(),
        kind,
        from,
        to,
        content,
    })
}

fn parse_anchor_value(
    line: &str,
    marker: &str,
    side: AnchorSide,
    kind: ChangeKind,
) -> Result<Anchor, ParseError> {
    let value = line.replacen(marker, "", 1);
    let value = strip_wrapping_backticks(value.trim());
    Anchor::parse(value).map_err(|source| ParseError::InvalidAnchor { side, kind, source })
}

/// Strip at most one backtick from each end. The wrapping is presentation,
/// not content, so a lone or absent backtick is tolerated.
fn strip_wrapping_backticks(value: &str) -> &str {
    let value = value.strip_prefix('`').unwrap_or(value);
    value.strip_suffix('`').unwrap_or(value)
}

/// Extract the text between the section's content fences.
///
/// The opening fence is the first line trim-starting with four backticks;
/// the closing fence is the first later line that is exactly four backticks
/// after trimming. The content is everything strictly between them, joined
/// with `\n` (an immediately closed fence yields empty content).
fn extract_content(lines: &[String], kind: ChangeKind) -> Result<String, ParseError> {
    let open = lines
        .iter()
        .position(|line| line.trim().starts_with(FENCE))
        .ok_or(ParseError::InvalidContent { kind })?;
    let close = lines
        .iter()
        .enumerate()
        .skip(open + 1)
        .find(|(_, line)| line.trim() == FENCE)
        .map(|(index, _)| index)
        .ok_or(ParseError::InvalidContent { kind })?;
    Ok(lines[open + 1..close].join("\n"))
}

static TIMESTAMP_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("literal regex"));

/// Shape first, then calendar validity: the regex pins the exact
/// `YYYY-MM-DD HH:MM:SS` layout, chrono rejects values that fit the shape
/// but name no real moment (month 13, hour 99).
fn valid_timestamp(timestamp: &str) -> bool {
    TIMESTAMP_SHAPE.is_match(timestamp)
        && NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_remove_section() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* From: `2. let unused = 1;`
* To: `2. let unused = 1;`"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes.len(), 1);

        let change = &changes[0];
        assert_eq!(change.file_tag, "app.js");
        assert_eq!(change.timestamp, "2024-05-01 10:30:00");
        assert_eq!(change.kind, ChangeKind::Remove);
        assert_eq!(change.from, Anchor::parse("2. let unused = 1;").unwrap());
        assert_eq!(change.to, change.from);
        assert_eq!(change.content, None);
    }

    #[test]
    fn parses_replace_with_content() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Replace**
* From: `3. old();`
* To: `4. older();`
````
new();
newer();
````"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].kind, ChangeKind::Replace);
        assert_eq!(changes[0].from.line, 3);
        assert_eq!(changes[0].to.line, 4);
        assert_eq!(changes[0].content.as_deref(), Some("new();\nnewer();"));
    }

    #[test]
    fn parses_insert_between() {
        let input = r#"# app.js 2024-05-01 10:30:00
**InsertBetween**
* From: `1. fn main() {`
* To: `2. }`
````
    body();
````"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].kind, ChangeKind::InsertBetween);
        assert_eq!(changes[0].content.as_deref(), Some("    body();"));
    }

    #[test]
    fn parses_multiple_sections_and_files_in_order() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* From: `5. a`
* To: `6. b`
**InsertBetween**
* From: `1. c`
* To: `2. d`
````
inserted
````
# util.js 2024-06-02 08:00:00
**Replace**
* From: `3. e`
* To: `3. e`
````
x
````"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(
            changes.iter().map(|c| c.kind).collect::<Vec<_>>(),
            vec![
                ChangeKind::Remove,
                ChangeKind::InsertBetween,
                ChangeKind::Replace
            ]
        );
        assert_eq!(
            changes.iter().map(|c| c.from.line).collect::<Vec<_>>(),
            vec![5, 1, 3]
        );
        assert_eq!(changes[0].file_tag, "app.js");
        assert_eq!(changes[2].file_tag, "util.js");
        assert_eq!(changes[2].timestamp, "2024-06-02 08:00:00");
    }

    #[test]
    fn anchors_parse_without_backtick_wrapping() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* From: 2. plain
* To: 2. plain"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].from.text, "plain");
    }

    #[test]
    fn fenced_content_shields_structure_markers() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Replace**
* From: `1. a`
* To: `1. a`
````
# not a header 2024-01-01 00:00:00
**not a section**
````"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].content.as_deref(),
            Some("# not a header 2024-01-01 00:00:00\n**not a section**")
        );
    }

    #[test]
    fn heading_outside_fence_starts_new_block() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* From: `1. a`
* To: `1. a`
# stray note"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid or missing timestamp for file stray"
        );
    }

    #[test]
    fn missing_from_is_an_error() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* To: `2. x`"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(err.to_string(), "Missing From or To in Remove section");
    }

    #[test]
    fn unknown_change_type_is_an_error() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Delete**
* From: `1. a`
* To: `1. a`"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(err.to_string(), "Unknown change type Delete");
    }

    #[test]
    fn unterminated_kind_label_is_an_error() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove
* From: `1. a`
* To: `1. a`"#;

        let err = parse_changes(input).unwrap_err();
        assert!(matches!(err, ParseError::UnknownChangeKind { .. }));
    }

    #[test]
    fn empty_file_name_is_an_error() {
        let input = "# \n**Remove**\n* From: `1. a`\n* To: `1. a`";
        let err = parse_changes(input).unwrap_err();
        assert_eq!(err.to_string(), "Empty file name");
    }

    #[test]
    fn impossible_calendar_date_is_an_error() {
        // Shape-valid but not a real moment.
        let input = r#"# app.js 2024-13-40 99:99:99
**Remove**
* From: `1. a`
* To: `1. a`"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid or missing timestamp for file app.js"
        );
    }

    #[test]
    fn malformed_timestamp_shape_is_an_error() {
        let input = r#"# app.js 2024/05/01 10:30:00
**Remove**
* From: `1. a`
* To: `1. a`"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid or missing timestamp for file app.js"
        );
    }

    #[test]
    fn header_tokens_after_time_are_ignored() {
        let input = r#"# app.js 2024-05-01 10:30:00 rev7 draft
**Remove**
* From: `1. a`
* To: `1. a`"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].timestamp, "2024-05-01 10:30:00");
    }

    #[test]
    fn replace_without_fences_is_an_error() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Replace**
* From: `1. a`
* To: `1. a`
no fences here"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(err.to_string(), "Invalid content format in Replace section");
    }

    #[test]
    fn unclosed_fence_is_an_error() {
        let input = r#"# app.js 2024-05-01 10:30:00
**InsertBetween**
* From: `1. a`
* To: `2. b`
````
dangling"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid content format in InsertBetween section"
        );
    }

    #[test]
    fn immediately_closed_fence_yields_empty_content() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Replace**
* From: `1. a`
* To: `1. a`
````
````"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].content.as_deref(), Some(""));
    }

    #[test]
    fn header_only_block_contributes_no_changes() {
        let input = r#"# notes.md 2024-05-01 10:30:00
# app.js 2024-05-01 10:30:00
**Remove**
* From: `1. a`
* To: `1. a`"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].file_tag, "app.js");
    }

    #[test]
    fn input_without_markers_has_no_changes() {
        let err = parse_changes("just some text\nwith no markers").unwrap_err();
        assert_eq!(err.to_string(), "No valid changes found");
    }

    #[test]
    fn section_before_any_header_is_ignored() {
        let input = r#"**Remove**
* From: `1. orphan`
* To: `1. orphan`
# app.js 2024-05-01 10:30:00
**Remove**
* From: `1. real`
* To: `1. real`"#;

        let changes = parse_changes(input).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from.text, "real");
    }

    #[test]
    fn crlf_descriptions_parse_cleanly() {
        let input = "# app.js 2024-05-01 10:30:00\r\n**Replace**\r\n* From: `1. a`\r\n* To: `1. a`\r\n````\r\nb\r\n````\r\n";
        let changes = parse_changes(input).unwrap();
        assert_eq!(changes[0].from.text, "a");
        assert_eq!(changes[0].content.as_deref(), Some("b\r"));
    }

    #[test]
    fn first_failing_block_aborts_the_parse() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Bogus**
* From: `1. a`
* To: `1. a`
# util.js 2024-05-01 10:30:00
**Remove**
* From: `1. b`
* To: `1. b`"#;

        let err = parse_changes(input).unwrap_err();
        assert_eq!(err.to_string(), "Unknown change type Bogus");
    }

    #[test]
    fn non_numeric_anchor_reports_its_side() {
        let input = r#"# app.js 2024-05-01 10:30:00
**Remove**
* From: `x. foo`
* To: `1. a`"#;

        let err = parse_changes(input).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid From anchor in Remove section"));
    }
}
