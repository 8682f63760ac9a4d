//! Page contract shared by the to-do web app and its functional tests.

use std::{
    error::Error,
    fmt::{Display, Formatter},
    str::FromStr,
};

pub const PAGE_TITLE: &str = "To-Do lists";
pub const HOME_HEADER: &str = "Start a new To-Do list";
pub const LIST_HEADER: &str = "Your To-Do list";

/// `id` of the text input used to enter a new item.
pub const NEW_ITEM_INPUT_ID: &str = "id_new_item";
/// Form field name carrying the new item's text.
pub const NEW_ITEM_FIELD: &str = "item_text";
pub const NEW_ITEM_PLACEHOLDER: &str = "Enter a to-do item";

/// `id` of the table listing the items of a list.
pub const LIST_TABLE_ID: &str = "id_list_table";

pub const NEW_LIST_PATH: &str = "/lists/new";

pub fn list_path(list_id: usize) -> String {
    format!("/lists/{}", list_id)
}

pub fn add_item_path(list_id: usize) -> String {
    format!("/lists/{}/add_item", list_id)
}

/// One rendered row of the list table, `"<index>: <text>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub text: String,
}

impl Row {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Row {
            index,
            text: text.into(),
        }
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.index, self.text)
    }
}

impl FromStr for Row {
    type Err = MalformedRow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, text) = s.split_once(": ").ok_or_else(|| MalformedRow(s.to_owned()))?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| MalformedRow(s.to_owned()))?;
        Ok(Row::new(index, text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow(pub String);

impl Display for MalformedRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} is not of the form \"<index>: <text>\"", self.0)
    }
}

impl Error for MalformedRow {}

/// Checks that `rows` are numbered 1, 2, 3... in order.
///
/// Returns the position and content of the first row that is malformed or
/// out of sequence.
pub fn check_sequential<S: AsRef<str>>(rows: &[S]) -> Result<(), (usize, String)> {
    for (position, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        match row.parse::<Row>() {
            Ok(parsed) if parsed.index == position + 1 => {}
            _ => return Err((position, row.to_owned())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_renders_with_one_based_index() {
        assert_eq!(Row::new(1, "Buy milk").to_string(), "1: Buy milk");
    }

    #[test]
    fn row_parses_text_containing_separator() {
        let row = "2: Note: call mum".parse::<Row>().unwrap();
        assert_eq!(row, Row::new(2, "Note: call mum"));
    }

    #[test]
    fn row_rejects_missing_index() {
        assert!("Buy milk".parse::<Row>().is_err());
        assert!("one: Buy milk".parse::<Row>().is_err());
    }

    #[test]
    fn sequential_rows_pass() {
        let rows = ["1: Buy new swingline stapler", "2: Burn down office"];
        assert_eq!(check_sequential(&rows), Ok(()));
        assert_eq!(check_sequential::<&str>(&[]), Ok(()));
    }

    #[test]
    fn gap_in_numbering_is_reported() {
        let rows = ["1: a", "3: b"];
        assert_eq!(check_sequential(&rows), Err((1, "3: b".to_owned())));
    }

    #[test]
    fn paths() {
        assert_eq!(list_path(7), "/lists/7");
        assert_eq!(add_item_path(7), "/lists/7/add_item");
    }
}
