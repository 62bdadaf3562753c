use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::tags;
use crate::error::{LibraryError, Result};
use crate::models::{Book, Library, MediaData};

/// Raw bytes per base64 text chunk. Multiple of 3 so chunks concatenate
/// without inner padding.
const BASE64_CHUNK: usize = 3 * 1024;

pub fn write_library<W: Write>(library: &Library, sink: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    write_declaration(&mut writer)?;

    start(&mut writer, tags::LIBRARY)?;
    write_number(&mut writer, tags::ID, library.id)?;
    write_text(&mut writer, tags::NAME, &library.name)?;
    write_text(&mut writer, tags::DESCRIPTION, &library.description)?;

    if library.books.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(tags::BOOK_LIST)))?;
    } else {
        start(&mut writer, tags::BOOK_LIST)?;
        for book in &library.books {
            write_book_element(&mut writer, book)?;
        }
        end(&mut writer, tags::BOOK_LIST)?;
    }

    end(&mut writer, tags::LIBRARY)?;
    finish(writer)
}

pub fn write_book<W: Write>(book: &Book, sink: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    write_declaration(&mut writer)?;
    write_book_element(&mut writer, book)?;
    finish(writer)
}

fn write_book_element<W: Write>(writer: &mut Writer<W>, book: &Book) -> Result<()> {
    start(writer, tags::BOOK)?;
    write_number(writer, tags::ID, book.id)?;
    write_text(writer, tags::AUTHOR, &book.author)?;
    write_text(writer, tags::TITLE, &book.title)?;
    write_number(writer, tags::PUBLISH_YEAR, book.publish_year)?;
    write_number(writer, tags::TOTAL_PAGES, book.total_pages)?;
    write_text(writer, tags::DESCRIPTION, &book.description)?;
    write_text(writer, tags::GENRE, &book.genre)?;
    write_text(writer, tags::ISBN, &book.isbn)?;

    let media = match book.content.as_ref().map(media_events) {
        Some(Ok(events)) => events,
        Some(Err(err)) => {
            log::warn!(
                "dropping media of book {} ({}): {}",
                book.id,
                book.title,
                err
            );
            vec![]
        }
        None => vec![],
    };
    if media.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(tags::CONTENT)))?;
    } else {
        start(writer, tags::CONTENT)?;
        for event in media {
            writer.write_event(event)?;
        }
        end(writer, tags::CONTENT)?;
    }

    end(writer, tags::BOOK)
}

/// Render the children of `<Content>` up front so a media record that cannot
/// be represented leaves nothing half-written in the document.
fn media_events(media: &MediaData) -> Result<Vec<Event<'static>>> {
    for value in [&media.file_name, &media.original_path, &media.extension] {
        if let Some(ch) = value.chars().find(|ch| !is_xml_char(*ch)) {
            return Err(LibraryError::format(
                "XML 1.0 text",
                format!("character U+{:04X} in {:?}", ch as u32, value),
            ));
        }
    }

    let embedded = media.is_embedded();
    let mut events = Vec::new();
    push_text(&mut events, tags::FILE_NAME, &media.file_name);
    push_text(&mut events, tags::ORIGINAL_PATH, &media.original_path);
    push_text(&mut events, tags::EXTENSION, &media.extension);
    push_text(
        &mut events,
        tags::IS_STORED_SEPARATELY,
        &media.is_stored_separately.to_string(),
    );
    push_text(&mut events, tags::IS_LOADED, &embedded.to_string());

    let source: &[u8] = if embedded { &media.content } else { &[] };
    push_base64(&mut events, tags::SOURCE, source);
    push_base64(&mut events, tags::BOOK_COVER, media.cover_bytes());
    Ok(events)
}

fn push_text(events: &mut Vec<Event<'static>>, name: &'static str, value: &str) {
    if value.is_empty() {
        events.push(Event::Empty(BytesStart::new(name)));
        return;
    }
    events.push(Event::Start(BytesStart::new(name)));
    events.push(Event::Text(BytesText::new(value).into_owned()));
    events.push(Event::End(BytesEnd::new(name)));
}

fn push_base64(events: &mut Vec<Event<'static>>, name: &'static str, bytes: &[u8]) {
    if bytes.is_empty() {
        events.push(Event::Empty(BytesStart::new(name)));
        return;
    }
    events.push(Event::Start(BytesStart::new(name)));
    for chunk in bytes.chunks(BASE64_CHUNK) {
        events.push(Event::Text(BytesText::from_escaped(STANDARD.encode(chunk))));
    }
    events.push(Event::End(BytesEnd::new(name)));
}

fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn write_declaration<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    Ok(())
}

fn write_text<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }
    start(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    end(writer, name)
}

fn write_number<W: Write, N: ToString>(writer: &mut Writer<W>, name: &str, value: N) -> Result<()> {
    write_text(writer, name, &value.to_string())
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn finish<W: Write>(writer: Writer<W>) -> Result<()> {
    let mut sink = writer.into_inner();
    sink.write_all(b"\n")?;
    sink.flush()?;
    Ok(())
}
