use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use super::{extract_isbn_candidates, extract_year, normalize_description, normalize_isbn};
use crate::error::{LibraryError, Result};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EpubMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub identifiers: Vec<String>,
    pub subjects: Vec<String>,
    pub cover_image: Option<Vec<u8>>,
}

impl EpubMetadata {
    /// First identifier that is a valid ISBN, normalized.
    pub fn isbn(&self) -> Option<String> {
        self.identifiers
            .iter()
            .find_map(|value| normalize_isbn(value))
    }
}

pub fn parse_epub(path: &Path) -> Result<EpubMetadata> {
    let file = File::open(path)?;
    read_epub(file)
}

pub fn read_epub<R: Read + Seek>(source: R) -> Result<EpubMetadata> {
    let mut archive = ZipArchive::new(source)?;

    // 1. META-INF/container.xml points at the OPF package document
    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = find_opf_path(&container)?;

    // 2. OPF carries the metadata and the manifest
    let opf = read_entry(&mut archive, &opf_path)?;
    let (mut metadata, cover_href) = parse_opf(&opf)?;

    // 3. cover bytes, href is relative to the OPF folder
    if let Some(href) = cover_href {
        let opf_dir = Path::new(&opf_path).parent().unwrap_or(Path::new(""));
        let candidates = [
            opf_dir.join(&href).to_string_lossy().replace('\\', "/"),
            href.trim_start_matches("./").to_string(),
        ];
        for candidate in candidates {
            if let Ok(mut entry) = archive.by_name(&candidate) {
                let mut bytes = Vec::new();
                if entry.read_to_end(&mut bytes).is_ok() && !bytes.is_empty() {
                    metadata.cover_image = Some(bytes);
                    break;
                }
            }
        }
        if metadata.cover_image.is_none() {
            log::debug!("epub cover {} listed but not found in archive", href);
        }
    }

    Ok(metadata)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(text)
}

fn find_opf_path(container: &str) -> Result<String> {
    let mut reader = Reader::from_str(container);
    let mut buf = Vec::new();

    // <rootfile full-path="OEBPS/content.opf" ... />
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) => {
                if e.local_name().as_ref() == b"rootfile" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"full-path" {
                            return Ok(attr.unescape_value()?.into_owned());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    Err(LibraryError::Import(
        "Could not find OPF path in container.xml".to_string(),
    ))
}

struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: String,
}

impl ManifestItem {
    fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

fn attribute(event: &BytesStart, key: &[u8]) -> Option<String> {
    event
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

fn parse_opf(opf: &str) -> Result<(EpubMetadata, Option<String>)> {
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut meta = EpubMetadata::default();
    let mut current_tag: Option<String> = None;
    let mut cover_id: Option<String> = None;
    let mut manifest: Vec<ManifestItem> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                handle_element(&e, &mut cover_id, &mut manifest);
                current_tag = Some(String::from_utf8_lossy(e.name().as_ref()).to_string());
            }
            Event::Empty(e) => handle_element(&e, &mut cover_id, &mut manifest),
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map(|value| value.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                if let Some(tag) = current_tag.as_deref() {
                    apply_text(&mut meta, tag, text);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).to_string();
                if let Some(tag) = current_tag.as_deref() {
                    apply_text(&mut meta, tag, text);
                }
            }
            Event::End(_) => current_tag = None,
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    if meta.identifiers.iter().all(|value| normalize_isbn(value).is_none()) {
        meta.identifiers.extend(extract_isbn_candidates(opf));
    }

    let cover = resolve_cover(&manifest, cover_id.as_deref());
    Ok((meta, cover))
}

fn handle_element(e: &BytesStart, cover_id: &mut Option<String>, manifest: &mut Vec<ManifestItem>) {
    match e.local_name().as_ref() {
        // <meta name="cover" content="cover-image-id" />
        b"meta" => {
            if attribute(e, b"name").as_deref() == Some("cover") {
                *cover_id = attribute(e, b"content");
            }
        }
        b"item" => {
            if let (Some(id), Some(href)) = (attribute(e, b"id"), attribute(e, b"href")) {
                manifest.push(ManifestItem {
                    id,
                    href,
                    media_type: attribute(e, b"media-type").unwrap_or_default(),
                    properties: attribute(e, b"properties").unwrap_or_default(),
                });
            }
        }
        _ => (),
    }
}

fn apply_text(meta: &mut EpubMetadata, tag: &str, text: String) {
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }
    match tag {
        "dc:title" => {
            if meta.title.is_none() {
                meta.title = Some(text);
            }
        }
        "dc:creator" => meta.authors.push(text),
        "dc:description" => {
            if meta.description.is_none() {
                meta.description = normalize_description(&text);
            }
        }
        "dc:date" => {
            if meta.published_year.is_none() {
                meta.published_year = extract_year(&text);
            }
        }
        "dc:identifier" => meta.identifiers.push(text),
        "dc:subject" => meta.subjects.push(text),
        _ => (),
    }
}

/// The explicit cover meta wins, then the EPUB 3 `cover-image` property,
/// then any image whose id or href mentions "cover", then the first image.
fn resolve_cover(manifest: &[ManifestItem], cover_id: Option<&str>) -> Option<String> {
    cover_id
        .and_then(|id| manifest.iter().find(|item| item.id == id))
        .or_else(|| {
            manifest
                .iter()
                .find(|item| item.properties.split_whitespace().any(|p| p == "cover-image"))
        })
        .or_else(|| {
            manifest.iter().find(|item| {
                item.is_image()
                    && format!("{} {}", item.id, item.href)
                        .to_lowercase()
                        .contains("cover")
            })
        })
        .or_else(|| manifest.iter().find(|item| item.is_image()))
        .map(|item| item.href.clone())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{parse_opf, read_epub};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Left Hand of Darkness</dc:title>
    <dc:creator>Ursula K. Le Guin</dc:creator>
    <dc:language>en</dc:language>
    <dc:date>1969-03-01</dc:date>
    <dc:identifier>uuid:5b7d0d1e</dc:identifier>
    <dc:identifier>978-0-306-40615-7</dc:identifier>
    <dc:subject>Science fiction</dc:subject>
    <dc:description>&lt;p&gt;A planet of winter.&lt;/p&gt;</dc:description>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="chapter1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
  </manifest>
</package>"#;

    pub(crate) fn build_epub(opf: &str, cover: Option<&[u8]>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("mimetype", options).expect("mimetype");
        zip.write_all(b"application/epub+zip").expect("write");
        zip.start_file("META-INF/container.xml", options).expect("container");
        zip.write_all(
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        )
        .expect("write");
        zip.start_file("OEBPS/content.opf", options).expect("opf");
        zip.write_all(opf.as_bytes()).expect("write");
        if let Some(cover) = cover {
            zip.start_file("OEBPS/images/cover.jpg", options).expect("cover");
            zip.write_all(cover).expect("write");
        }
        zip.finish().expect("finish").into_inner()
    }

    #[test]
    fn reads_metadata_and_cover() {
        let bytes = build_epub(OPF, Some(b"JPEGDATA"));
        let meta = read_epub(Cursor::new(bytes)).expect("epub");
        assert_eq!(meta.title.as_deref(), Some("The Left Hand of Darkness"));
        assert_eq!(meta.authors, vec!["Ursula K. Le Guin".to_string()]);
        assert_eq!(meta.published_year, Some(1969));
        assert_eq!(meta.isbn().as_deref(), Some("9780306406157"));
        assert_eq!(meta.subjects, vec!["Science fiction".to_string()]);
        assert_eq!(meta.description.as_deref(), Some("A planet of winter."));
        assert_eq!(meta.cover_image.as_deref(), Some(&b"JPEGDATA"[..]));
    }

    #[test]
    fn cover_falls_back_to_property_and_images() {
        let opf = r#"<package><manifest>
            <item id="a" href="a.png" media-type="image/png"/>
            <item id="b" href="b.jpg" media-type="image/jpeg" properties="cover-image"/>
        </manifest></package>"#;
        let (_, cover) = parse_opf(opf).expect("opf");
        assert_eq!(cover.as_deref(), Some("b.jpg"));

        let opf = r#"<package><manifest>
            <item id="x" href="x.xhtml" media-type="application/xhtml+xml"/>
            <item id="art" href="art.png" media-type="image/png"/>
        </manifest></package>"#;
        let (_, cover) = parse_opf(opf).expect("opf");
        assert_eq!(cover.as_deref(), Some("art.png"));
    }

    #[test]
    fn missing_container_is_an_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("mimetype", SimpleFileOptions::default())
            .expect("mimetype");
        zip.write_all(b"application/epub+zip").expect("write");
        let bytes = zip.finish().expect("finish").into_inner();
        assert!(read_epub(Cursor::new(bytes)).is_err());
    }
}
