use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Episode {
    pub title: String,
    #[serde(default)]
    pub members: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Whole seconds.
    pub duration: u32,
    pub url: String,
}

impl Episode {
    pub fn new(title: &str, duration: u32, url: &str) -> Self {
        Self {
            title: title.to_string(),
            members: String::new(),
            thumbnail: String::new(),
            duration,
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_seek_step_seconds")]
    pub seek_step_seconds: u16,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub episodes_file: Option<PathBuf>,
    #[serde(default)]
    pub null_audio: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_seek_step_seconds() -> u16 {
    5
}

fn default_volume() -> f32 {
    1.0
}

fn default_log_filter() -> String {
    String::from("info")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seek_step_seconds: default_seek_step_seconds(),
            volume: default_volume(),
            episodes_file: None,
            null_audio: false,
            log_filter: default_log_filter(),
        }
    }
}
