//! Owner of the in-memory library.
//!
//! Every mutation goes through [`LibraryManager`], which assigns ids and
//! tells registered listeners what changed. Listeners run synchronously on
//! the thread that made the change; a front-end that needs delivery on a
//! particular thread forwards from its listener.

use serde::Serialize;
use std::path::Path;

use crate::error::{LibraryError, Result};
use crate::models::{Book, Library};
use crate::persistence;
use crate::query::{self, BookField};
use crate::sort::{self, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LibraryEvent {
    Added(u32),
    Removed(u32),
    Updated(u32),
    /// The book list was rebuilt wholesale (sort, load, clear).
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&LibraryEvent)>;

pub struct LibraryManager {
    library: Library,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for LibraryManager {
    fn default() -> Self {
        Self::new(Library::default())
    }
}

impl LibraryManager {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn into_library(self) -> Library {
        self.library
    }

    pub fn books(&self) -> &[Book] {
        &self.library.books
    }

    pub fn book(&self, id: u32) -> Option<&Book> {
        self.library.books.iter().find(|book| book.id == id)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.library.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.library.description = description.into();
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LibraryEvent) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn publish(&mut self, event: LibraryEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    /// Append `book` under a fresh id and return that id. Any id already on
    /// the book is replaced. Fails without changing anything when the
    /// library already holds `u32::MAX`.
    pub fn add_book(&mut self, mut book: Book) -> Result<u32> {
        let id = self
            .library
            .next_book_id()
            .ok_or(LibraryError::IdsExhausted(u32::MAX))?;
        book.id = id;
        log::debug!("adding book {} ({})", id, book.title);
        self.library.books.push(book);
        self.publish(LibraryEvent::Added(id));
        Ok(id)
    }

    pub fn remove_book(&mut self, id: u32) -> Option<Book> {
        let index = self.library.books.iter().position(|book| book.id == id)?;
        let removed = self.library.books.remove(index);
        log::debug!("removed book {} ({})", id, removed.title);
        self.publish(LibraryEvent::Removed(id));
        Some(removed)
    }

    /// Replace the stored book that has the same id.
    pub fn update_book(&mut self, book: Book) -> Result<()> {
        let id = book.id;
        let slot = self
            .library
            .books
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or(LibraryError::NotFound(id))?;
        *slot = book;
        self.publish(LibraryEvent::Updated(id));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.library.books.clear();
        self.publish(LibraryEvent::Reset);
    }

    pub fn search(&self, field: BookField, term: &str) -> Vec<Book> {
        query::search(&self.library.books, field, term)
    }

    /// Reorder the collection by `keys`. The list is rebuilt from the sorted
    /// copy and listeners get a single `Reset`; nothing is published when no
    /// key applies.
    pub fn sort(&mut self, keys: &[SortKey]) {
        let mut ordered = self.library.books.clone();
        if !sort::sort_books(&mut ordered, keys) {
            return;
        }
        self.library.books.clear();
        self.library.books.extend(ordered);
        self.publish(LibraryEvent::Reset);
    }

    /// Replace the current library with the one stored at `path`. On failure
    /// the current library is left as it was.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.library = persistence::load_library(path)?;
        self.publish(LibraryEvent::Reset);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save_library(&self.library, path)
    }

    /// Add the book stored at `path` under a fresh id.
    pub fn load_book(&mut self, path: &Path) -> Result<u32> {
        let book = persistence::load_book(path)?;
        self.add_book(book)
    }

    pub fn save_book(&self, id: u32, path: &Path) -> Result<()> {
        let book = self.book(id).ok_or(LibraryError::NotFound(id))?;
        persistence::save_book(book, path)
    }
}
