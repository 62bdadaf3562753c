//! Multi-key ordering of books.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::models::Book;

pub const MAX_SORT_KEYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortField {
    #[default]
    None,
    Id,
    Author,
    Title,
    PublishYear,
    TotalPages,
    Genre,
    Isbn,
}

impl SortField {
    pub const SORTABLE: [SortField; 7] = [
        SortField::Id,
        SortField::Author,
        SortField::Title,
        SortField::PublishYear,
        SortField::TotalPages,
        SortField::Genre,
        SortField::Isbn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortField::None => "None",
            SortField::Id => "Id",
            SortField::Author => "Author",
            SortField::Title => "Title",
            SortField::PublishYear => "PublishYear",
            SortField::TotalPages => "TotalPages",
            SortField::Genre => "Genre",
            SortField::Isbn => "ISBN",
        }
    }

    /// Resolve a field by name. Unknown names resolve to `None`, which sorts
    /// as a no-op.
    pub fn resolve(name: &str) -> SortField {
        let normalized = name.trim().replace(['_', '-', ' '], "").to_lowercase();
        match normalized.as_str() {
            "id" => SortField::Id,
            "author" => SortField::Author,
            "title" => SortField::Title,
            "publishyear" | "year" => SortField::PublishYear,
            "totalpages" | "pages" => SortField::TotalPages,
            "genre" => SortField::Genre,
            "isbn" => SortField::Isbn,
            "" | "none" => SortField::None,
            _ => {
                log::warn!("unknown sort field {:?}, ignoring", name);
                SortField::None
            }
        }
    }

    fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            SortField::None => Ordering::Equal,
            SortField::Id => a.id.cmp(&b.id),
            SortField::Author => compare_text(&a.author, &b.author),
            SortField::Title => compare_text(&a.title, &b.title),
            SortField::PublishYear => a.publish_year.cmp(&b.publish_year),
            SortField::TotalPages => a.total_pages.cmp(&b.total_pages),
            SortField::Genre => compare_text(&a.genre, &b.genre),
            SortField::Isbn => compare_text(&a.isbn, &b.isbn),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field plus direction. Up to [`MAX_SORT_KEYS`] of these compose an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn new(field: SortField, descending: bool) -> Self {
        Self { field, descending }
    }

    pub fn ascending(field: SortField) -> Self {
        Self::new(field, false)
    }

    pub fn descending(field: SortField) -> Self {
        Self::new(field, true)
    }

    /// Parse `Field` or `Field:desc` / `Field:asc`.
    pub fn parse(value: &str) -> SortKey {
        let (name, direction) = match value.rsplit_once(':') {
            Some((name, direction)) => (name, direction.trim().to_lowercase()),
            None => (value, String::new()),
        };
        SortKey::new(
            SortField::resolve(name),
            matches!(direction.as_str(), "desc" | "descending"),
        )
    }

    fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let ordering = self.field.compare(a, b);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Stable sort by `keys` in priority order. Keys on `None` are skipped and
/// keys past [`MAX_SORT_KEYS`] are ignored. Returns whether any key applied.
pub fn sort_books(books: &mut [Book], keys: &[SortKey]) -> bool {
    if keys.len() > MAX_SORT_KEYS {
        log::warn!(
            "{} sort keys given, only the first {} are used",
            keys.len(),
            MAX_SORT_KEYS
        );
    }
    let active: Vec<SortKey> = keys
        .iter()
        .take(MAX_SORT_KEYS)
        .filter(|key| key.field != SortField::None)
        .copied()
        .collect();
    if active.is_empty() {
        return false;
    }

    books.sort_by(|a, b| {
        active
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    true
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::{sort_books, SortField, SortKey};
    use crate::models::Book;

    fn book(id: u32, author: &str, year: i32, pages: u32) -> Book {
        Book {
            id,
            author: author.to_string(),
            title: format!("Book {}", id),
            publish_year: year,
            total_pages: pages,
            ..Book::default()
        }
    }

    fn ids(books: &[Book]) -> Vec<u32> {
        books.iter().map(|book| book.id).collect()
    }

    #[test]
    fn third_key_breaks_ties() {
        let mut books = vec![
            book(1, "Atwood", 1985, 311),
            book(2, "atwood", 1985, 400),
            book(3, "Banks", 1987, 100),
        ];
        let keys = [
            SortKey::ascending(SortField::PublishYear),
            SortKey::ascending(SortField::Author),
            SortKey::descending(SortField::TotalPages),
        ];
        assert!(sort_books(&mut books, &keys));
        // "atwood" and "Atwood" differ only by case; exact fallback puts "Atwood" first
        assert_eq!(ids(&books), vec![1, 2, 3]);

        let keys = [
            SortKey::ascending(SortField::PublishYear),
            SortKey::ascending(SortField::Genre),
            SortKey::descending(SortField::TotalPages),
        ];
        sort_books(&mut books, &keys);
        assert_eq!(ids(&books), vec![2, 1, 3]);

        let keys = [
            SortKey::ascending(SortField::PublishYear),
            SortKey::ascending(SortField::Genre),
            SortKey::ascending(SortField::TotalPages),
        ];
        sort_books(&mut books, &keys);
        assert_eq!(ids(&books), vec![1, 2, 3]);
    }

    #[test]
    fn no_keys_leave_order_unchanged() {
        let mut books = vec![book(3, "C", 3, 3), book(1, "A", 1, 1), book(2, "B", 2, 2)];
        assert!(!sort_books(&mut books, &[]));
        assert!(!sort_books(
            &mut books,
            &[SortKey::default(), SortKey::descending(SortField::None)]
        ));
        assert_eq!(ids(&books), vec![3, 1, 2]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut books = vec![
            book(5, "Same", 2000, 10),
            book(2, "Same", 2000, 20),
            book(9, "Same", 2000, 30),
        ];
        sort_books(&mut books, &[SortKey::descending(SortField::Author)]);
        assert_eq!(ids(&books), vec![5, 2, 9]);
    }

    #[test]
    fn keys_past_the_third_are_ignored() {
        let mut books = vec![book(2, "A", 1, 1), book(1, "A", 1, 1)];
        let keys = [
            SortKey::ascending(SortField::Author),
            SortKey::ascending(SortField::PublishYear),
            SortKey::ascending(SortField::TotalPages),
            SortKey::ascending(SortField::Id),
        ];
        sort_books(&mut books, &keys);
        assert_eq!(ids(&books), vec![2, 1]);
    }

    #[test]
    fn keys_parse_from_text() {
        assert_eq!(SortKey::parse("Author"), SortKey::ascending(SortField::Author));
        assert_eq!(SortKey::parse("total_pages:desc"), SortKey::descending(SortField::TotalPages));
        assert_eq!(SortKey::parse("ISBN:asc"), SortKey::ascending(SortField::Isbn));
        assert_eq!(SortKey::parse("publisher").field, SortField::None);
        for field in SortField::SORTABLE {
            assert_eq!(SortField::resolve(field.name()), field);
        }
    }
}
