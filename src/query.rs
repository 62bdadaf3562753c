//! Field search over the in-memory book list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Book;

/// What a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BookField {
    #[default]
    Any,
    Author,
    Title,
    TotalPages,
    PublishYear,
}

impl BookField {
    pub const ALL: [BookField; 5] = [
        BookField::Any,
        BookField::Author,
        BookField::Title,
        BookField::TotalPages,
        BookField::PublishYear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BookField::Any => "Any",
            BookField::Author => "Author",
            BookField::Title => "Title",
            BookField::TotalPages => "TotalPages",
            BookField::PublishYear => "PublishYear",
        }
    }
}

impl fmt::Display for BookField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BookField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace(['_', '-', ' '], "").to_lowercase();
        match normalized.as_str() {
            "any" | "all" => Ok(BookField::Any),
            "author" => Ok(BookField::Author),
            "title" => Ok(BookField::Title),
            "totalpages" | "pages" => Ok(BookField::TotalPages),
            "publishyear" | "year" => Ok(BookField::PublishYear),
            _ => Err(format!("Unknown search field: {}", value)),
        }
    }
}

/// Books matching `term` in `field`, in collection order.
///
/// Text fields match case-insensitive substrings. Numeric fields need the
/// term to parse as an integer and match exactly. `Any` tries author, title,
/// genre, ISBN and description, plus both numeric fields when the term is a
/// number. A blank term matches nothing.
pub fn search(books: &[Book], field: BookField, term: &str) -> Vec<Book> {
    let term = term.trim();
    if term.is_empty() {
        return vec![];
    }
    let needle = term.to_lowercase();
    let number = term.parse::<i64>().ok();

    books
        .iter()
        .filter(|book| matches(book, field, &needle, number))
        .cloned()
        .collect()
}

fn matches(book: &Book, field: BookField, needle: &str, number: Option<i64>) -> bool {
    match field {
        BookField::Author => contains(&book.author, needle),
        BookField::Title => contains(&book.title, needle),
        BookField::TotalPages => number == Some(i64::from(book.total_pages)),
        BookField::PublishYear => number == Some(i64::from(book.publish_year)),
        BookField::Any => {
            [&book.author, &book.title, &book.genre, &book.isbn, &book.description]
                .iter()
                .any(|value| contains(value, needle))
                || number.is_some_and(|n| {
                    n == i64::from(book.total_pages) || n == i64::from(book.publish_year)
                })
        }
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
