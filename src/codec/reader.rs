use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::io::BufRead;
use std::str::FromStr;

use super::tags;
use crate::error::{LibraryError, Result};
use crate::models::{Book, Library, MediaData};

pub fn read_library<R: BufRead>(source: R) -> Result<Library> {
    let mut cursor = XmlCursor::new(source);
    let has_body = cursor.expect_start(tags::LIBRARY)?;
    if !has_body {
        return Err(LibraryError::format("<Library> with children", "<Library/>"));
    }

    let mut library = Library {
        id: cursor.read_number(tags::ID)?,
        name: cursor.read_text(tags::NAME)?,
        description: cursor.read_text(tags::DESCRIPTION)?,
        books: Vec::new(),
    };

    if cursor.expect_start(tags::BOOK_LIST)? {
        let mut seen = HashSet::new();
        while cursor.next_is_start(tags::BOOK)? {
            let book = read_book_element(&mut cursor)?;
            if book.id == 0 {
                log::debug!("skipping book without id: {}", book.title);
                continue;
            }
            if !seen.insert(book.id) {
                return Err(LibraryError::format(
                    "unique book ids",
                    format!("id {} repeated", book.id),
                ));
            }
            library.books.push(book);
        }
        cursor.expect_end(tags::BOOK_LIST)?;
    }

    cursor.expect_end(tags::LIBRARY)?;
    cursor.expect_eof()?;
    Ok(library)
}

pub fn read_book<R: BufRead>(source: R) -> Result<Book> {
    let mut cursor = XmlCursor::new(source);
    let book = read_book_element(&mut cursor)?;
    cursor.expect_eof()?;
    Ok(book)
}

fn read_book_element<R: BufRead>(cursor: &mut XmlCursor<R>) -> Result<Book> {
    if !cursor.expect_start(tags::BOOK)? {
        return Err(LibraryError::format("<Book> with children", "<Book/>"));
    }
    let mut book = Book {
        id: cursor.read_number(tags::ID)?,
        author: cursor.read_text(tags::AUTHOR)?,
        title: cursor.read_text(tags::TITLE)?,
        publish_year: cursor.read_number(tags::PUBLISH_YEAR)?,
        total_pages: cursor.read_number(tags::TOTAL_PAGES)?,
        description: cursor.read_text(tags::DESCRIPTION)?,
        genre: cursor.read_text(tags::GENRE)?,
        isbn: cursor.read_text(tags::ISBN)?,
        content: None,
    };

    if cursor.expect_start(tags::CONTENT)? {
        let mut media = MediaData {
            file_name: cursor.read_text(tags::FILE_NAME)?,
            original_path: cursor.read_text(tags::ORIGINAL_PATH)?,
            extension: cursor.read_text(tags::EXTENSION)?,
            is_stored_separately: cursor.read_bool(tags::IS_STORED_SEPARATELY)?,
            is_loaded: cursor.read_bool(tags::IS_LOADED)?,
            ..MediaData::default()
        };
        let source = cursor.read_base64(tags::SOURCE)?;
        if media.is_loaded {
            media.content = source;
        }
        let cover = cursor.read_base64(tags::BOOK_COVER)?;
        if !cover.is_empty() {
            media.cover = Some(cover);
        }
        cursor.expect_end(tags::CONTENT)?;
        book.content = Some(media);
    }

    cursor.expect_end(tags::BOOK)?;
    Ok(book)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Start(String),
    Empty(String),
    End(String),
    Text(String),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Start(name) => format!("<{}>", name),
            Token::Empty(name) => format!("<{}/>", name),
            Token::End(name) => format!("</{}>", name),
            Token::Text(text) => format!("text {:?}", truncate(text, 24)),
            Token::Eof => "end of document".to_string(),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

/// Forward-only view over the event stream with one token of lookahead.
/// Structural reads skip whitespace between elements; text reads keep it.
struct XmlCursor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    peeked: Option<Token>,
}

impl<R: BufRead> XmlCursor<R> {
    fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            peeked: None,
        }
    }

    fn raw_next(&mut self) -> Result<Token> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }
        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Token::Start(String::from_utf8_lossy(e.name().as_ref()).to_string()),
                Event::Empty(e) => Token::Empty(String::from_utf8_lossy(e.name().as_ref()).to_string()),
                Event::End(e) => Token::End(String::from_utf8_lossy(e.name().as_ref()).to_string()),
                Event::Text(e) => Token::Text(e.unescape()?.into_owned()),
                Event::CData(e) => Token::Text(String::from_utf8_lossy(&e.into_inner()).to_string()),
                Event::Eof => Token::Eof,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => continue,
            };
            return Ok(token);
        }
    }

    fn next_structural(&mut self) -> Result<Token> {
        loop {
            match self.raw_next()? {
                Token::Text(text) if text.trim().is_empty() => continue,
                token => return Ok(token),
            }
        }
    }

    /// Consume the opening tag of `name`. Returns `false` for `<name/>`.
    fn expect_start(&mut self, name: &str) -> Result<bool> {
        match self.next_structural()? {
            Token::Start(found) if found == name => Ok(true),
            Token::Empty(found) if found == name => Ok(false),
            other => Err(LibraryError::format(format!("<{}>", name), other.describe())),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<()> {
        match self.next_structural()? {
            Token::End(found) if found == name => Ok(()),
            other => Err(LibraryError::format(format!("</{}>", name), other.describe())),
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        match self.next_structural()? {
            Token::Eof => Ok(()),
            other => Err(LibraryError::format("end of document", other.describe())),
        }
    }

    /// Peek whether the next element opens `name`, leaving it unconsumed.
    fn next_is_start(&mut self, name: &str) -> Result<bool> {
        let token = self.next_structural()?;
        let is_start = matches!(&token, Token::Start(found) | Token::Empty(found) if found == name);
        self.peeked = Some(token);
        Ok(is_start)
    }

    fn read_text(&mut self, name: &str) -> Result<String> {
        if !self.expect_start(name)? {
            return Ok(String::new());
        }
        let mut value = String::new();
        loop {
            match self.raw_next()? {
                Token::Text(text) => value.push_str(&text),
                Token::End(found) if found == name => return Ok(value),
                other => {
                    return Err(LibraryError::format(format!("text or </{}>", name), other.describe()))
                }
            }
        }
    }

    fn read_number<N: FromStr>(&mut self, name: &str) -> Result<N> {
        let value = self.read_text(name)?;
        value.trim().parse().map_err(|_| LibraryError::InvalidNumber {
            element: name.to_string(),
            value,
        })
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        let value = self.read_text(name)?;
        match value.trim() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            _ => Err(LibraryError::format(format!("true or false in <{}>", name), value)),
        }
    }

    /// Decode base64 text as it arrives. Whole quanta are decoded per text
    /// event; at most three trailing characters wait for the next one.
    fn read_base64(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        if !self.expect_start(name)? {
            return Ok(bytes);
        }
        let mut pending = String::new();
        let mut padded = false;
        loop {
            match self.raw_next()? {
                Token::Text(text) => {
                    if !text.is_ascii() {
                        return Err(LibraryError::format(
                            format!("base64 text in <{}>", name),
                            "non-ASCII characters",
                        ));
                    }
                    pending.extend(text.chars().filter(|ch| !ch.is_ascii_whitespace()));
                    let ready = pending.len() - pending.len() % 4;
                    if ready == 0 {
                        continue;
                    }
                    if padded {
                        return Err(LibraryError::format(
                            format!("end of <{}> after padding", name),
                            "more base64 data",
                        ));
                    }
                    STANDARD.decode_vec(&pending[..ready], &mut bytes)?;
                    padded = pending[..ready].ends_with('=');
                    pending.replace_range(..ready, "");
                }
                Token::End(found) if found == name => {
                    if !pending.is_empty() {
                        STANDARD.decode_vec(&pending, &mut bytes)?;
                    }
                    return Ok(bytes);
                }
                other => {
                    return Err(LibraryError::format(
                        format!("base64 text or </{}>", name),
                        other.describe(),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Token, XmlCursor};

    #[test]
    fn cursor_skips_layout_whitespace_but_keeps_text() {
        let xml = "<Book>\n  <Title>  spaced  </Title>\n</Book>";
        let mut cursor = XmlCursor::new(xml.as_bytes());
        assert!(cursor.expect_start("Book").expect("start"));
        assert_eq!(cursor.read_text("Title").expect("title"), "  spaced  ");
        cursor.expect_end("Book").expect("end");
        cursor.expect_eof().expect("eof");
    }

    #[test]
    fn peeked_token_is_replayed() {
        let mut cursor = XmlCursor::new("<A/>".as_bytes());
        assert!(!cursor.next_is_start("B").expect("peek"));
        assert_eq!(cursor.raw_next().expect("token"), Token::Empty("A".to_string()));
    }

    #[test]
    fn base64_split_across_chunks_decodes() {
        let xml = "<Source>aGVs<!-- split -->bG8gd29y<![CDATA[bGQ=]]></Source>";
        let mut cursor = XmlCursor::new(xml.as_bytes());
        assert_eq!(cursor.read_base64("Source").expect("decode"), b"hello world");
    }

    #[test]
    fn data_after_padding_is_rejected() {
        let xml = "<Source>aGk=<!-- x -->aGVsbG8=</Source>";
        let mut cursor = XmlCursor::new(xml.as_bytes());
        assert!(cursor.read_base64("Source").is_err());
    }

    #[test]
    fn empty_number_is_invalid() {
        let mut cursor = XmlCursor::new("<Id/>".as_bytes());
        assert!(cursor.read_number::<u32>("Id").is_err());
    }
}
