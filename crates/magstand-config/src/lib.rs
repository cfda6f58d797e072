// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use magstand_domain::MagazineRule;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory scanned for candidate issue files.
    pub import_dir: PathBuf,
    /// The calibredb executable to drive.
    pub calibredb: PathBuf,
    /// Path to the calibre library; calibredb's own default when absent.
    pub library_path: Option<PathBuf>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            import_dir: PathBuf::from("."),
            calibredb: PathBuf::from("calibredb"),
            library_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// One `[[magazines]]` table. The optional `volume`/`index`/`year`/`month`
/// entries are arithmetic formulas over the captured `V`, `I`, `Y`, `M`
/// values; when absent the captured value is used verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagazineConfig {
    pub name: String,
    pub pattern: String,
    pub title: String,
    pub authors: String,
    pub languages: String,
    pub publisher: String,
    pub tags: Option<String>,
    pub archive_dir: Option<PathBuf>,
    pub volume: Option<String>,
    pub index: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

impl MagazineConfig {
    pub fn to_rule(&self) -> MagazineRule {
        MagazineRule {
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            languages: self.languages.clone(),
            publisher: self.publisher.clone(),
            tags: self.tags.clone(),
            archive_dir: self.archive_dir.clone(),
            volume_formula: self.volume.clone(),
            index_formula: self.index.clone(),
            year_formula: self.year.clone(),
            month_formula: self.month.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub import: ImportConfig,
    pub telemetry: TelemetryConfig,
    /// Ordered: match results are reported in configuration order.
    pub magazines: Vec<MagazineConfig>,
}

impl AppConfig {
    pub fn magazine_rules(&self) -> Vec<MagazineRule> {
        self.magazines.iter().map(MagazineConfig::to_rule).collect()
    }
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: MAGSTAND_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("MAGSTAND_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        magazines = config.magazines.len(),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.import.calibredb, PathBuf::from("calibredb"));
        assert!(config.import.library_path.is_none());
        assert!(config.magazines.is_empty());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn magazines_parse_in_order() {
        let toml = r#"
            [import]
            import_dir = "/inbox"

            [[magazines]]
            name = "Linux Weekly"
            pattern = "lw-{V}-{I}.pdf"
            title = "Linux Weekly {volume}/{index}"
            authors = "Linux Weekly"
            languages = "eng"
            publisher = "LW Press"

            [[magazines]]
            name = "Monthly Mag"
            pattern = "mm{Y}{M}.pdf"
            title = "Monthly Mag {month:s} {year}"
            authors = "Monthly Mag"
            languages = "eng"
            publisher = "MM Media"
            tags = "magazine"
            archive_dir = "/archive/mm"
            index = "M"
            volume = "Y - 2000"
        "#;

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .expect("config parses");

        assert_eq!(config.import.import_dir, PathBuf::from("/inbox"));
        assert_eq!(config.magazines.len(), 2);
        assert_eq!(config.magazines[0].name, "Linux Weekly");
        assert_eq!(config.magazines[1].name, "Monthly Mag");

        let rules = config.magazine_rules();
        assert_eq!(rules[0].name, "Linux Weekly");
        assert!(rules[0].volume_formula.is_none());
        assert_eq!(rules[1].volume_formula.as_deref(), Some("Y - 2000"));
        assert_eq!(rules[1].index_formula.as_deref(), Some("M"));
        assert_eq!(rules[1].archive_dir, Some(PathBuf::from("/archive/mm")));
    }

    #[test]
    fn missing_required_magazine_field_is_an_error() {
        let toml = r#"
            [[magazines]]
            name = "Broken"
            pattern = "b-{I}.pdf"
        "#;

        let result: std::result::Result<AppConfig, _> =
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Toml::string(toml))
                .extract();
        assert!(result.is_err());
    }
}
