//! Sample data for trying the application out.

use crate::error::Result;
use crate::manager::LibraryManager;
use crate::models::{Book, Library};

const AUTHORS: [&str; 8] = [
    "Ursula K. Le Guin",
    "Italo Calvino",
    "Octavia E. Butler",
    "Jorge Luis Borges",
    "Stanisław Lem",
    "Toni Morrison",
    "Haruki Murakami",
    "Chinua Achebe",
];

const TITLE_WORDS: [&str; 10] = [
    "Winter", "Cities", "Mirror", "Garden", "Signal", "River", "Library", "Harvest", "Orbit",
    "Lantern",
];

const GENRES: [&str; 5] = ["Science fiction", "Fantasy", "Literary fiction", "Essays", "Mystery"];

/// A library of `count` made-up books. The same `count` always produces the
/// same library.
pub fn demo_library(count: usize) -> Result<Library> {
    let mut manager = LibraryManager::new(Library::new(
        "Demo library",
        format!("{} generated books", count),
    ));
    for index in 0..count {
        manager.add_book(demo_book(index))?;
    }
    Ok(manager.into_library())
}

fn demo_book(index: usize) -> Book {
    let first = TITLE_WORDS[index % TITLE_WORDS.len()];
    let second = TITLE_WORDS[(index * 7 + 3) % TITLE_WORDS.len()];
    let title = if first == second {
        format!("The {}", first)
    } else {
        format!("The {} of the {}", first, second)
    };
    let author = AUTHORS[(index * 3) % AUTHORS.len()];
    Book {
        author: author.to_string(),
        title: title.clone(),
        publish_year: 1950 + ((index * 13) % 70) as i32,
        total_pages: 120 + ((index * 37) % 600) as u32,
        description: format!("{} by {}, volume {} of the demo set.", title, author, index + 1),
        genre: GENRES[index % GENRES.len()].to_string(),
        isbn: demo_isbn(index),
        ..Book::default()
    }
}

/// A valid ISBN-13 in the 979-8 range built from `index`.
fn demo_isbn(index: usize) -> String {
    let body = format!("9798{:08}", index % 100_000_000);
    let sum: u32 = body
        .chars()
        .enumerate()
        .map(|(position, ch)| {
            let digit = ch.to_digit(10).unwrap_or(0);
            if position % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();
    format!("{}{}", body, (10 - sum % 10) % 10)
}

#[cfg(test)]
mod tests {
    use super::demo_library;
    use crate::parser::normalize_isbn;

    #[test]
    fn demo_is_deterministic_with_sequential_ids() {
        let library = demo_library(12).expect("demo");
        assert_eq!(library, demo_library(12).expect("demo"));
        assert_eq!(library.total_books(), 12);
        let ids: Vec<u32> = library.books.iter().map(|book| book.id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<u32>>());
    }

    #[test]
    fn demo_isbns_are_valid() {
        for book in demo_library(30).expect("demo").books {
            assert_eq!(normalize_isbn(&book.isbn), Some(book.isbn.clone()));
        }
    }

    #[test]
    fn empty_demo() {
        assert!(demo_library(0).expect("demo").books.is_empty());
    }
}
