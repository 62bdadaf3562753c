use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{LibraryError, Result};
use crate::manager::LibraryManager;
use crate::models::{Book, MediaData};
use crate::parser::epub;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["epub", "pdf", "txt", "fb2", "mobi"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub added: u64,
    pub skipped: u64,
    pub errors: u64,
}

pub fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Build a book for the file at `path`. The title defaults to the file stem;
/// EPUB files also contribute their package metadata and cover.
pub fn book_from_file(path: &Path, max_content_length: u64) -> Result<Book> {
    let media = MediaData::from_path(path, max_content_length)?;
    let mut book = Book {
        title: path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
        ..Book::default()
    };

    if media.extension == "epub" {
        match epub::parse_epub(path) {
            Ok(meta) => apply_epub_metadata(&mut book, meta),
            Err(err) => log::warn!("could not read epub metadata from {}: {}", path.display(), err),
        }
    }

    let cover = book.content.take().and_then(|media| media.cover);
    book.content = Some(MediaData { cover, ..media });
    Ok(book)
}

/// `book.content` only carries the cover here; the caller attaches the
/// file media afterwards.
fn apply_epub_metadata(book: &mut Book, meta: epub::EpubMetadata) {
    let isbn = meta.isbn();
    if let Some(title) = meta.title {
        book.title = title;
    }
    if !meta.authors.is_empty() {
        book.author = meta.authors.join(", ");
    }
    if let Some(description) = meta.description {
        book.description = description;
    }
    if let Some(year) = meta.published_year {
        book.publish_year = year;
    }
    if let Some(genre) = meta.subjects.into_iter().next() {
        book.genre = genre;
    }
    if let Some(isbn) = isbn {
        book.isbn = isbn;
    }
    if meta.cover_image.is_some() {
        book.content = Some(MediaData {
            cover: meta.cover_image,
            ..MediaData::default()
        });
    }
}

/// Walk `root` and add every supported file to `manager`. Files whose
/// content hash matches something already in the library, or an earlier
/// file of this scan, are skipped.
pub fn scan_directory(
    root: &Path,
    manager: &mut LibraryManager,
    max_content_length: u64,
) -> Result<ScanStats> {
    if !root.exists() {
        return Err(LibraryError::Import(format!(
            "Path does not exist: {}",
            root.display()
        )));
    }

    let mut seen: HashSet<String> = manager
        .books()
        .iter()
        .filter_map(|book| book.content.as_ref())
        .filter_map(|media| {
            if media.is_loaded {
                Some(hash_bytes(&media.content))
            } else if !media.original_path.is_empty() {
                hash_file(Path::new(&media.original_path)).ok()
            } else {
                None
            }
        })
        .collect();

    let mut stats = ScanStats::default();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_supported(path) {
            continue;
        }

        let hash = match hash_file(path) {
            Ok(hash) => hash,
            Err(err) => {
                log::warn!("could not hash {}: {}", path.display(), err);
                stats.errors += 1;
                continue;
            }
        };
        if !seen.insert(hash) {
            log::info!("skipping duplicate {}", path.display());
            stats.skipped += 1;
            continue;
        }

        match book_from_file(path, max_content_length) {
            Ok(book) => {
                let id = manager.add_book(book)?;
                log::debug!("imported {} as book {}", path.display(), id);
                stats.added += 1;
            }
            Err(err) => {
                log::warn!("could not import {}: {}", path.display(), err);
                stats.errors += 1;
            }
        }
    }

    log::info!(
        "scan of {} finished: {} added, {} skipped, {} errors",
        root.display(),
        stats.added,
        stats.skipped,
        stats.errors
    );
    Ok(stats)
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex(&hasher.finalize()))
}

fn hash_bytes(bytes: &[u8]) -> String {
    hex(&Sha256::digest(bytes))
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::{book_from_file, is_supported, scan_directory, ScanStats};
    use crate::manager::LibraryManager;
    use crate::parser::epub::tests::{build_epub, OPF};
    use std::fs;
    use std::path::Path;

    #[test]
    fn plain_file_uses_stem_as_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Field Notes.txt");
        fs::write(&path, "notes").expect("write");

        let book = book_from_file(&path, 1024).expect("book");
        assert_eq!(book.title, "Field Notes");
        let media = book.content.expect("media");
        assert_eq!(media.content, b"notes");
        assert!(media.cover.is_none());
    }

    #[test]
    fn epub_metadata_fills_the_book() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lhod.epub");
        fs::write(&path, build_epub(OPF, Some(b"JPEG"))).expect("write");

        let book = book_from_file(&path, 1 << 20).expect("book");
        assert_eq!(book.title, "The Left Hand of Darkness");
        assert_eq!(book.author, "Ursula K. Le Guin");
        assert_eq!(book.publish_year, 1969);
        assert_eq!(book.genre, "Science fiction");
        assert_eq!(book.isbn, "9780306406157");
        let media = book.content.expect("media");
        assert!(media.is_loaded);
        assert_eq!(media.extension, "epub");
        assert_eq!(media.cover.as_deref(), Some(&b"JPEG"[..]));
    }

    #[test]
    fn scan_skips_duplicates_and_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir(root.join("nested")).expect("mkdir");
        fs::write(root.join("a.txt"), "same").expect("write");
        fs::write(root.join("nested/b.txt"), "same").expect("write");
        fs::write(root.join("c.pdf"), "%PDF other").expect("write");
        fs::write(root.join("notes.docx"), "ignored").expect("write");

        let mut manager = LibraryManager::default();
        let stats = scan_directory(root, &mut manager, 1024).expect("scan");
        assert_eq!(
            stats,
            ScanStats {
                added: 2,
                skipped: 1,
                errors: 0
            }
        );
        assert_eq!(manager.books().len(), 2);

        let again = scan_directory(root, &mut manager, 1024).expect("rescan");
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let mut manager = LibraryManager::default();
        assert!(scan_directory(Path::new("/nonexistent/libris"), &mut manager, 10).is_err());
        assert!(is_supported(Path::new("book.EPUB")));
        assert!(!is_supported(Path::new("book")));
    }
}
