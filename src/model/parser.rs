// File: src/model/parser.rs
use crate::model::ChecklistItem;

/// Tag marking the start of a checklist region.
pub const TADA_TAG: &str = "#tada";

const ITEM_PREFIX: &str = "- [";
const CHECKED_MARKERS: [&str; 2] = ["- [X]", "- [x]"];

fn is_item_line(line: &str) -> bool {
    line.starts_with(ITEM_PREFIX)
}

fn parse_item_line(line: &str) -> ChecklistItem {
    let checked = CHECKED_MARKERS.iter().any(|m| line.contains(m));
    // No closing bracket: the whole line is the content.
    let content = match line.find(']') {
        Some(idx) => &line[idx + 1..],
        None => line,
    };
    ChecklistItem::new(content, checked)
}

/// Extracts the checklist block starting at `start_line` (0-based).
///
/// Lines are taken verbatim: no trimming, so indented or blank lines end the
/// block. Returns an empty list when `start_line` is past the end of `text`.
pub fn extract(text: &str, start_line: usize) -> Vec<ChecklistItem> {
    text.split('\n')
        .skip(start_line)
        .take_while(|line| is_item_line(line))
        .map(parse_item_line)
        .collect()
}

/// First line holding the tag as a whitespace-separated token.
pub fn find_tag_line(text: &str) -> Option<usize> {
    text.split('\n')
        .position(|line| line.split_whitespace().any(|token| token == TADA_TAG))
}

/// `None` when the document carries no tag.
pub fn extract_after_tag(text: &str) -> Option<Vec<ChecklistItem>> {
    let tag_line = find_tag_line(text)?;
    Some(extract(text, tag_line + 1))
}
