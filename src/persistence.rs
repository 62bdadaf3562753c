//! File load/save for libraries and single books.
//!
//! The `load_*`/`save_*` functions report what went wrong. The `try_*`
//! variants collapse that to success or failure for callers that only show
//! a message; the error is logged before it is dropped.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::Result;
use crate::models::{Book, Library};

pub fn load_library(path: &Path) -> Result<Library> {
    let file = File::open(path)?;
    let library = codec::read_library(BufReader::new(file))?;
    log::info!(
        "loaded library \"{}\" with {} books from {}",
        library.name,
        library.total_books(),
        path.display()
    );
    Ok(library)
}

pub fn save_library(library: &Library, path: &Path) -> Result<()> {
    write_atomically(path, |writer| codec::write_library(library, writer))?;
    log::info!(
        "saved library \"{}\" with {} books to {}",
        library.name,
        library.total_books(),
        path.display()
    );
    Ok(())
}

pub fn load_book(path: &Path) -> Result<Book> {
    let file = File::open(path)?;
    let book = codec::read_book(BufReader::new(file))?;
    log::info!("loaded book \"{}\" from {}", book.title, path.display());
    Ok(book)
}

pub fn save_book(book: &Book, path: &Path) -> Result<()> {
    write_atomically(path, |writer| codec::write_book(book, writer))?;
    log::info!("saved book \"{}\" to {}", book.title, path.display());
    Ok(())
}

pub fn try_load_library(path: &Path) -> Option<Library> {
    load_library(path)
        .map_err(|err| log::error!("failed to load library {}: {}", path.display(), err))
        .ok()
}

pub fn try_save_library(library: &Library, path: &Path) -> bool {
    save_library(library, path)
        .map_err(|err| log::error!("failed to save library {}: {}", path.display(), err))
        .is_ok()
}

pub fn try_load_book(path: &Path) -> Option<Book> {
    load_book(path)
        .map_err(|err| log::error!("failed to load book {}: {}", path.display(), err))
        .ok()
}

pub fn try_save_book(book: &Book, path: &Path) -> bool {
    save_book(book, path)
        .map_err(|err| log::error!("failed to save book {}: {}", path.display(), err))
        .is_ok()
}

/// Write into `<path>.tmp` and rename over `path`, so a failed write never
/// leaves a truncated document behind.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = temp_path_for(path);
    if let Err(err) = write_file(&temp_path, write) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
