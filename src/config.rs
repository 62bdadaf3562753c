use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub library_file: PathBuf,
    pub preferences_file: PathBuf,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("LIBRIS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        Self {
            library_file: std::env::var("LIBRIS_LIBRARY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("library.xml")),
            preferences_file: std::env::var("LIBRIS_PREFERENCES")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("preferences.db")),
            log_filter: std::env::var("LIBRIS_LOG").unwrap_or_else(|_| "info".to_string()),
            data_dir,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.library_file.as_os_str().is_empty() {
            return Err("LIBRIS_LIBRARY_FILE cannot be empty".to_string());
        }
        if self.preferences_file.as_os_str().is_empty() {
            return Err("LIBRIS_PREFERENCES cannot be empty".to_string());
        }
        if self.library_file == self.preferences_file {
            return Err("library file and preferences file must differ".to_string());
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("libris")
}
