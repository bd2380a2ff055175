//! The catalog of fallacies the analyzer looks for.
//!
//! Two presets are built in; custom catalogs are TOML files:
//!
//! ```toml
//! [[fallacy]]
//! slug = "Ad Hominem"
//! description = "Attacking the person instead of the argument."
//! ```

use crate::error::{FallaxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One rhetorical-error category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallacy {
    /// Unique key, reported back by the model.
    pub slug: String,
    pub description: String,
}

impl Fallacy {
    pub fn new(slug: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            description: description.into(),
        }
    }
}

/// Built-in catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogPreset {
    #[default]
    Short,
    Extended,
}

impl std::str::FromStr for CatalogPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(CatalogPreset::Short),
            "extended" => Ok(CatalogPreset::Extended),
            _ => Err(format!("Unknown catalog preset: {}", s)),
        }
    }
}

/// An ordered, read-only list of fallacies with unique slugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallacyCatalog {
    fallacies: Vec<Fallacy>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    fallacy: Vec<Fallacy>,
}

impl FallacyCatalog {
    /// Build a catalog, rejecting empty lists, empty slugs and duplicates.
    pub fn new(fallacies: Vec<Fallacy>) -> Result<Self> {
        if fallacies.is_empty() {
            return Err(FallaxError::Catalog("catalog contains no fallacies".to_string()));
        }

        let mut seen = HashSet::new();
        for fallacy in &fallacies {
            let slug = fallacy.slug.trim();
            if slug.is_empty() {
                return Err(FallaxError::Catalog("fallacy slug must not be empty".to_string()));
            }
            if !seen.insert(slug.to_string()) {
                return Err(FallaxError::Catalog(format!("duplicate fallacy slug: {}", slug)));
            }
        }

        Ok(Self { fallacies })
    }

    pub fn preset(preset: CatalogPreset) -> Self {
        match preset {
            CatalogPreset::Short => Self::short(),
            CatalogPreset::Extended => Self::extended(),
        }
    }

    /// The five most common fallacies.
    pub fn short() -> Self {
        Self {
            fallacies: short_fallacies(),
        }
    }

    /// The full fifteen-entry catalog.
    pub fn extended() -> Self {
        let mut fallacies = short_fallacies();
        fallacies.extend([
            Fallacy::new("Change of Subject", "Switching the topic of discussion to avoid the point."),
            Fallacy::new("Insinuation", "Hints and indirect accusations."),
            Fallacy::new("False Suspicion", "Unfounded suspicions about the opponent."),
            Fallacy::new("Categorical Disagreement", "Flat disagreement without arguments."),
            Fallacy::new("Authoritarian Style", "Relying on authority or power instead of facts."),
            Fallacy::new("Lady's Argument", "Emotional arguments beside the point."),
            Fallacy::new("Imposed Consequence", "Presenting a consequence as the only possible outcome."),
            Fallacy::new("Fact Sifting", "Selective use of facts."),
            Fallacy::new("Suspicion Construction", "Building up suspicion without grounds."),
            Fallacy::new("Ironic Repetition", "Ironically repeating the opponent's arguments."),
        ]);
        Self { fallacies }
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&content)?;
        Self::new(file.fallacy)
            .map_err(|e| FallaxError::Catalog(format!("{}: {}", path.display(), e)))
    }

    pub fn fallacies(&self) -> &[Fallacy] {
        &self.fallacies
    }

    pub fn len(&self) -> usize {
        self.fallacies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fallacies.is_empty()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.fallacies.iter().any(|f| f.slug == slug)
    }

    /// One `- slug: description` line per fallacy, for prompts.
    pub fn render_for_prompt(&self) -> String {
        self.fallacies
            .iter()
            .map(|f| format!("- {}: {}", f.slug, f.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn short_fallacies() -> Vec<Fallacy> {
    vec![
        Fallacy::new("Ad Hominem", "Attacking the person instead of the argument."),
        Fallacy::new("Straw Man", "Distorting the opponent's argument."),
        Fallacy::new("Complex Question", "A loaded question that presupposes contested premises."),
        Fallacy::new(
            "False Accusation of Lack of Evidence",
            "Falsely claiming the opponent has offered no evidence.",
        ),
        Fallacy::new("Hyperbole", "Exaggeration used to strengthen an argument."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets() {
        assert_eq!(FallacyCatalog::short().len(), 5);
        assert_eq!(FallacyCatalog::extended().len(), 15);
        assert!(FallacyCatalog::extended().contains("Insinuation"));
        assert!(!FallacyCatalog::short().contains("Insinuation"));
    }

    #[test]
    fn test_render_for_prompt() {
        let catalog = FallacyCatalog::new(vec![
            Fallacy::new("Ad Hominem", "Attack on the person."),
            Fallacy::new("Hyperbole", "Exaggeration."),
        ])
        .unwrap();

        assert_eq!(
            catalog.render_for_prompt(),
            "- Ad Hominem: Attack on the person.\n- Hyperbole: Exaggeration."
        );
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(FallacyCatalog::new(vec![]).is_err());
        assert!(FallacyCatalog::new(vec![Fallacy::new(" ", "blank")]).is_err());
        assert!(FallacyCatalog::new(vec![
            Fallacy::new("Straw Man", "a"),
            Fallacy::new("Straw Man", "b"),
        ])
        .is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[fallacy]]\nslug = \"Whataboutism\"\ndescription = \"Deflecting with a counter-accusation.\"\n"
        )
        .unwrap();

        let catalog = FallacyCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.fallacies(), &[Fallacy::new("Whataboutism", "Deflecting with a counter-accusation.")]);
    }
}
