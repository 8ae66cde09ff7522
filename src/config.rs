use anyhow::{Context, Result};
use fiche_core::card::RevisionCardBuilder;
use fiche_core::summary::SummaryGenerator;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub stopwords: StopwordsConfig,
    #[serde(default)]
    pub summary: SummaryGenerator,
    #[serde(default)]
    pub card: RevisionCardBuilder,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StopwordsConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// NLTK-style `stopwords` directory; built-in lists are used without it.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for StopwordsConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dir: None,
        }
    }
}

fn default_languages() -> Vec<String> {
    vec!["fr".to_string(), "en".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./data/reports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["txt", "md", "rtf", "docx", "pdf"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    let ratio = config.summary.compression_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        anyhow::bail!("summary.compression_ratio must be in (0.0, 1.0]");
    }
    if config.summary.max_sentences == 0 {
        anyhow::bail!("summary.max_sentences must be > 0");
    }

    if config.card.section_budget_chars == 0 {
        anyhow::bail!("card.section_budget_chars must be > 0");
    }
    if config.card.max_group_docs == 0 {
        anyhow::bail!("card.max_group_docs must be > 0");
    }

    if config.stopwords.languages.is_empty() {
        anyhow::bail!("stopwords.languages must name at least one language");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let file = write_config("[db]\npath = \"./data/fiche.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.stopwords.languages, vec!["fr", "en"]);
        assert_eq!(config.summary.min_chars, 200);
        assert_eq!(config.summary.max_sentences, 12);
        assert_eq!(config.card.section_budget_chars, 600);
        assert_eq!(config.log.level, "info");
        assert!(config.sync.include_globs.contains(&"**/*.pdf".to_string()));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let file = write_config(
            "[db]\npath = \"x.sqlite\"\n[summary]\ncompression_ratio = 0.0\n",
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("compression_ratio"));
    }

    #[test]
    fn test_rejects_empty_languages() {
        let file = write_config("[db]\npath = \"x.sqlite\"\n[stopwords]\nlanguages = []\n");
        assert!(load_config(file.path()).is_err());
    }
}
