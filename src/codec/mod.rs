//! XML document format for libraries and single books.
//!
//! Elements appear in a fixed order and the reader expects exactly that
//! order; anything else fails the whole read. Binary media travels as base64
//! text inside `<Source>` and `<BookCover>`.

mod reader;
mod writer;

pub use reader::{read_book, read_library};
pub use writer::{write_book, write_library};

pub(crate) mod tags {
    pub const LIBRARY: &str = "Library";
    pub const ID: &str = "Id";
    pub const NAME: &str = "Name";
    pub const DESCRIPTION: &str = "Description";
    pub const BOOK_LIST: &str = "BookList";
    pub const BOOK: &str = "Book";
    pub const AUTHOR: &str = "Author";
    pub const TITLE: &str = "Title";
    pub const PUBLISH_YEAR: &str = "PublishYear";
    pub const TOTAL_PAGES: &str = "TotalPages";
    pub const GENRE: &str = "Genre";
    pub const ISBN: &str = "ISBN";
    pub const CONTENT: &str = "Content";
    pub const FILE_NAME: &str = "FileName";
    pub const ORIGINAL_PATH: &str = "OriginalPath";
    pub const EXTENSION: &str = "Extension";
    pub const IS_STORED_SEPARATELY: &str = "IsStoredSeparately";
    pub const IS_LOADED: &str = "IsLoaded";
    pub const SOURCE: &str = "Source";
    pub const BOOK_COVER: &str = "BookCover";
}
