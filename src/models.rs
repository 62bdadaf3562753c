use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{LibraryError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Book {
    pub id: u32,
    pub author: String,
    pub title: String,
    pub publish_year: i32,
    pub total_pages: u32,
    pub description: String,
    pub genre: String,
    pub isbn: String,
    pub content: Option<MediaData>,
}

impl Book {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Library {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub books: Vec<Book>,
}

impl Library {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 1,
            name: name.into(),
            description: description.into(),
            books: Vec::new(),
        }
    }

    pub fn total_books(&self) -> usize {
        self.books.len()
    }

    /// Next id to hand out: one past the highest id ever present, so ids
    /// freed by deletion are never handed out again while a higher id exists.
    /// `None` once the highest id is `u32::MAX`.
    pub fn next_book_id(&self) -> Option<u32> {
        self.books
            .iter()
            .map(|book| book.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }
}

/// Binary payload attached to a book.
///
/// `content` is only meaningful while `is_loaded` is set. Media marked
/// `is_stored_separately` keeps its bytes at `original_path` and is never
/// embedded in a saved document. An empty cover is the same as no cover.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, Default)]
pub struct MediaData {
    pub file_name: String,
    pub original_path: String,
    pub extension: String,
    pub is_stored_separately: bool,
    pub is_loaded: bool,
    #[serde(skip)]
    pub content: Vec<u8>,
    #[serde(skip)]
    pub cover: Option<Vec<u8>>,
}

impl PartialEq for MediaData {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
            && self.original_path == other.original_path
            && self.extension == other.extension
            && self.is_stored_separately == other.is_stored_separately
            && self.is_loaded == other.is_loaded
            && self.content == other.content
            && self.cover_bytes() == other.cover_bytes()
    }
}

impl MediaData {
    /// Describe the file at `path`. Files up to `max_content_length` bytes are
    /// read into memory; larger ones stay on disk and are marked as stored
    /// separately.
    pub fn from_path(path: &Path, max_content_length: u64) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(LibraryError::Import(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let mut media = MediaData {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            original_path: path.to_string_lossy().to_string(),
            extension: path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
                .to_lowercase(),
            ..MediaData::default()
        };

        if metadata.len() > max_content_length {
            log::info!(
                "{} is {} bytes (limit {}), keeping it on disk",
                media.file_name,
                metadata.len(),
                max_content_length
            );
            media.is_stored_separately = true;
        } else {
            media.content = fs::read(path)?;
            media.is_loaded = true;
        }

        Ok(media)
    }

    /// Read the content of stored-separately media back from `original_path`.
    pub fn load_content(&mut self) -> Result<()> {
        if self.is_loaded {
            return Ok(());
        }
        if self.original_path.is_empty() {
            return Err(LibraryError::Import(format!(
                "no source path recorded for {}",
                self.file_name
            )));
        }
        self.content = fs::read(&self.original_path)?;
        self.is_loaded = true;
        log::debug!("loaded {} bytes from {}", self.content.len(), self.original_path);
        Ok(())
    }

    pub fn unload(&mut self) {
        self.content = Vec::new();
        self.is_loaded = false;
    }

    pub fn size(&self) -> usize {
        if self.is_loaded {
            self.content.len()
        } else {
            0
        }
    }

    /// Cover image bytes, empty when there is none.
    pub fn cover_bytes(&self) -> &[u8] {
        self.cover.as_deref().unwrap_or(&[])
    }

    /// Whether a saved document records this content as loaded and carries
    /// it in `Source`.
    pub fn is_embedded(&self) -> bool {
        self.is_loaded && !self.is_stored_separately
    }
}

#[cfg(test)]
mod tests {
    use super::{Book, Library, MediaData};
    use std::fs;

    #[test]
    fn next_id_starts_at_one() {
        let library = Library::new("Home", "");
        assert_eq!(library.next_book_id(), Some(1));
    }

    #[test]
    fn next_id_skips_past_gaps() {
        let mut library = Library::new("Home", "");
        for id in [1, 3, 7] {
            library.books.push(Book {
                id,
                ..Book::default()
            });
        }
        assert_eq!(library.next_book_id(), Some(8));
        assert_eq!(library.total_books(), 3);
    }

    #[test]
    fn no_id_left_after_the_maximum() {
        let mut library = Library::new("Home", "");
        library.books.push(Book {
            id: u32::MAX,
            ..Book::default()
        });
        assert_eq!(library.next_book_id(), None);
    }

    #[test]
    fn empty_cover_equals_missing_cover() {
        let with_empty = MediaData {
            cover: Some(Vec::new()),
            ..MediaData::default()
        };
        assert_eq!(with_empty, MediaData::default());
        assert_ne!(
            with_empty,
            MediaData {
                cover: Some(vec![1]),
                ..MediaData::default()
            }
        );
    }

    #[test]
    fn empty_file_is_loaded_and_embedded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blank.txt");
        fs::write(&path, b"").expect("write");

        let media = MediaData::from_path(&path, 1024).expect("media");
        assert!(media.is_loaded);
        assert!(media.is_embedded());
        assert_eq!(media.size(), 0);
    }

    #[test]
    fn small_files_are_loaded_into_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Notes.TXT");
        fs::write(&path, b"chapter one").expect("write");

        let media = MediaData::from_path(&path, 1024).expect("media");
        assert_eq!(media.file_name, "Notes.TXT");
        assert_eq!(media.extension, "txt");
        assert!(media.is_loaded);
        assert!(!media.is_stored_separately);
        assert_eq!(media.content, b"chapter one");
        assert!(media.is_embedded());
    }

    #[test]
    fn large_files_stay_on_disk_until_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.epub");
        fs::write(&path, vec![7u8; 64]).expect("write");

        let mut media = MediaData::from_path(&path, 16).expect("media");
        assert!(media.is_stored_separately);
        assert!(!media.is_loaded);
        assert_eq!(media.size(), 0);

        media.load_content().expect("load");
        assert_eq!(media.size(), 64);
        assert!(!media.is_embedded());

        media.unload();
        assert!(!media.is_loaded);
        assert!(media.content.is_empty());
    }
}
