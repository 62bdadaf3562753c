use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use libris_lib::demo::demo_library;
use libris_lib::persistence;
use libris_lib::scanner;
use libris_lib::settings::{AppSettings, Preferences};
use libris_lib::sort::MAX_SORT_KEYS;
use libris_lib::{Book, BookField, Config, Library, LibraryManager, SortKey};

#[derive(Parser)]
#[command(name = "libris", about = "Manage a book library stored as XML")]
struct Cli {
    /// Library file to operate on (defaults to LIBRIS_LIBRARY_FILE)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty library file
    Init {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        force: bool,
    },
    /// List books in stored order
    List,
    /// Show one book
    Show { id: u32 },
    /// Add a book. With `--file`, fields not given on the command line
    /// come from the file.
    Add {
        #[command(flatten)]
        fields: BookFields,
        /// Attach this file as the book's content
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Remove a book by id
    Remove { id: u32 },
    /// Search one field (Any, Author, Title, TotalPages, PublishYear)
    Search { field: String, term: String },
    /// List books sorted by up to three keys, e.g. `--key Author --key PublishYear:desc`.
    /// Without keys the stored sort preferences are used.
    Sort {
        #[arg(long = "key")]
        keys: Vec<String>,
    },
    /// Import a file or every supported file under a directory
    Import { path: PathBuf },
    /// Write one book to its own XML file
    ExportBook { id: u32, output: PathBuf },
    /// Add a book from a single-book XML file
    ImportBook { path: PathBuf },
    /// Replace the library with generated sample books
    Demo {
        #[arg(long, default_value_t = 25)]
        count: usize,
        #[arg(long)]
        force: bool,
    },
    /// Read or change preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args, Default)]
struct BookFields {
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    pages: Option<u32>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl BookFields {
    /// Overwrite only the fields that were given.
    fn apply(self, book: &mut Book) {
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(year) = self.year {
            book.publish_year = year;
        }
        if let Some(pages) = self.pages {
            book.total_pages = pages;
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = isbn;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
    }
}

#[derive(Subcommand)]
enum SettingsAction {
    List,
    Get { key: String },
    Set { key: String, value: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let library_path = cli
        .library
        .clone()
        .unwrap_or_else(|| config.library_file.clone());
    let prefs = Preferences::open(&config.preferences_file)
        .with_context(|| format!("opening {}", config.preferences_file.display()))?;
    let settings = AppSettings::load(&prefs)?;

    match cli.command {
        Command::Init {
            name,
            description,
            force,
        } => {
            refuse_overwrite(&library_path, force)?;
            persistence::save_library(&Library::new(name, description), &library_path)?;
            println!("Created {}", library_path.display());
        }
        Command::List => {
            let manager = open(&library_path)?;
            print_books(manager.books(), cli.json)?;
        }
        Command::Show { id } => {
            let manager = open(&library_path)?;
            let Some(book) = manager.book(id) else {
                bail!("no book with id {}", id);
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(book)?);
            } else {
                print_details(book);
            }
        }
        Command::Add { fields, file } => {
            let mut book = match file {
                Some(path) => scanner::book_from_file(&path, settings.max_content_length())?,
                None if fields.title.is_none() => bail!("--title is required without --file"),
                None => Book::default(),
            };
            fields.apply(&mut book);
            let mut manager = open(&library_path)?;
            let id = manager.add_book(book)?;
            manager.save(&library_path)?;
            println!("Added book {}", id);
        }
        Command::Remove { id } => {
            let mut manager = open(&library_path)?;
            let Some(book) = manager.remove_book(id) else {
                bail!("no book with id {}", id);
            };
            manager.save(&library_path)?;
            println!("Removed {} ({})", id, book.title);
        }
        Command::Search { field, term } => {
            let field: BookField = field.parse().map_err(anyhow::Error::msg)?;
            let manager = open(&library_path)?;
            print_books(&manager.search(field, &term), cli.json)?;
        }
        Command::Sort { keys } => {
            if keys.len() > MAX_SORT_KEYS {
                bail!("at most {} sort keys are supported", MAX_SORT_KEYS);
            }
            let keys: Vec<SortKey> = if keys.is_empty() {
                settings.sort_keys().to_vec()
            } else {
                keys.iter().map(String::as_str).map(SortKey::parse).collect()
            };
            let mut manager = open(&library_path)?;
            manager.sort(&keys);
            print_books(manager.books(), cli.json)?;
        }
        Command::Import { path } => {
            let mut manager = open(&library_path)?;
            if path.is_dir() {
                let stats =
                    scanner::scan_directory(&path, &mut manager, settings.max_content_length())?;
                println!(
                    "Added {}, skipped {} duplicates, {} errors",
                    stats.added, stats.skipped, stats.errors
                );
            } else {
                let book = scanner::book_from_file(&path, settings.max_content_length())?;
                let id = manager.add_book(book)?;
                println!("Added book {}", id);
            }
            manager.save(&library_path)?;
        }
        Command::ExportBook { id, output } => {
            let manager = open(&library_path)?;
            manager.save_book(id, &output)?;
            println!("Wrote book {} to {}", id, output.display());
        }
        Command::ImportBook { path } => {
            let mut manager = open(&library_path)?;
            let id = manager.load_book(&path)?;
            manager.save(&library_path)?;
            println!("Added book {}", id);
        }
        Command::Demo { count, force } => {
            refuse_overwrite(&library_path, force)?;
            persistence::save_library(&demo_library(count)?, &library_path)?;
            println!("Wrote {} demo books to {}", count, library_path.display());
        }
        Command::Settings { action } => match action {
            SettingsAction::List => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                } else {
                    println!("{:#?}", settings);
                }
            }
            SettingsAction::Get { key } => {
                let entry = prefs
                    .entries()?
                    .into_iter()
                    .find(|(name, _, _)| *name == key);
                match entry {
                    Some((_, value, value_type)) => println!("{} ({})", value, value_type),
                    None => println!("{} is not set", key),
                }
            }
            SettingsAction::Set { key, value } => {
                AppSettings::set_by_name(&prefs, &key, &value)?;
                println!("{} updated", key);
            }
        },
    }

    Ok(())
}

fn open(path: &Path) -> anyhow::Result<LibraryManager> {
    let mut manager = LibraryManager::default();
    manager
        .load(path)
        .with_context(|| format!("loading {} (run `libris init` first?)", path.display()))?;
    Ok(manager)
}

fn refuse_overwrite(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to replace it", path.display());
    }
    Ok(())
}

fn print_books(books: &[Book], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(books)?);
        return Ok(());
    }
    if books.is_empty() {
        println!("No books.");
        return Ok(());
    }
    for book in books {
        println!(
            "{:>4}  {:<28}  {:<36}  {:>4}  {:>5}p",
            book.id,
            truncate(&book.author, 28),
            truncate(&book.title, 36),
            book.publish_year,
            book.total_pages
        );
    }
    Ok(())
}

fn print_details(book: &Book) {
    println!("Id:          {}", book.id);
    println!("Title:       {}", book.title);
    println!("Author:      {}", book.author);
    println!("Year:        {}", book.publish_year);
    println!("Pages:       {}", book.total_pages);
    println!("Genre:       {}", book.genre);
    println!("ISBN:        {}", book.isbn);
    if let Some(media) = &book.content {
        let state = if media.is_stored_separately {
            format!("stored separately at {}", media.original_path)
        } else if media.is_loaded {
            format!("{} bytes embedded", media.size())
        } else {
            "not loaded".to_string()
        };
        println!("File:        {} ({})", media.file_name, state);
        if let Some(cover) = &media.cover {
            println!("Cover:       {} bytes", cover.len());
        }
    }
    if !book.description.is_empty() {
        println!();
        println!("{}", book.description);
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let cut: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::BookFields;
    use libris_lib::Book;

    #[test]
    fn only_given_fields_overwrite_file_metadata() {
        let mut book = Book {
            author: "Ursula K. Le Guin".to_string(),
            title: "lhod".to_string(),
            publish_year: 1969,
            isbn: "9780306406157".to_string(),
            genre: "Science fiction".to_string(),
            ..Book::default()
        };
        let fields = BookFields {
            title: Some("The Left Hand of Darkness".to_string()),
            pages: Some(304),
            ..BookFields::default()
        };
        fields.apply(&mut book);

        assert_eq!(book.title, "The Left Hand of Darkness");
        assert_eq!(book.total_pages, 304);
        assert_eq!(book.author, "Ursula K. Le Guin");
        assert_eq!(book.publish_year, 1969);
        assert_eq!(book.isbn, "9780306406157");
        assert_eq!(book.genre, "Science fiction");
    }
}
