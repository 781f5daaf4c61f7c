// File: ./src/model/mod.rs
pub mod item;
pub mod parser;

pub use item::{ChecklistItem, FileItems, SelectedItems};
pub use parser::{TADA_TAG, extract, extract_after_tag, find_tag_line};
