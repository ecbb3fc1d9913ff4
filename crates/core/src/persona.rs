//! Persona Catalog
//!
//! Personas are loaded once at startup and never mutated afterwards. Each
//! session receives an `Arc` to its persona, so concurrent sessions share
//! read-only configuration and nothing else.

use crate::{error::BridgeError, guardrail::ControlPolicy, synthesis::VoiceConfig};
use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::Arc,
};

/// Everything a session needs to know about the persona it speaks as.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaConfig {
    pub key: String,
    pub display_name: String,
    pub policy: ControlPolicy,
    pub voice: VoiceConfig,
}

/// Immutable map from persona key to configuration, with a default entry.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: HashMap<String, Arc<PersonaConfig>>,
    default_key: String,
}

impl PersonaCatalog {
    /// Builds the catalog. Fails if `default_key` is not among `personas`.
    pub fn new(
        personas: impl IntoIterator<Item = PersonaConfig>,
        default_key: &str,
    ) -> Result<Self, BridgeError> {
        let personas: HashMap<_, _> = personas
            .into_iter()
            .map(|p| (p.key.clone(), Arc::new(p)))
            .collect();
        if !personas.contains_key(default_key) {
            return Err(BridgeError::PersonaNotFound(default_key.to_string()));
        }
        Ok(Self {
            personas,
            default_key: default_key.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<Arc<PersonaConfig>> {
        self.personas.get(key).cloned()
    }

    pub fn default_persona(&self) -> Arc<PersonaConfig> {
        // Presence is checked in `new`.
        self.personas[&self.default_key].clone()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    /// Resolves a raw `persona` request parameter.
    ///
    /// Anything from the first `?` on is discarded (meeting pages tend to glue
    /// their own query onto ours). A missing or empty key yields the default
    /// persona; an unknown key is an error.
    pub fn resolve(&self, raw: Option<&str>) -> Result<Arc<PersonaConfig>, BridgeError> {
        match raw.map(sanitize_key) {
            None | Some("") => Ok(self.default_persona()),
            Some(key) => self
                .get(key)
                .ok_or_else(|| BridgeError::PersonaNotFound(key.to_string())),
        }
    }
}

/// Truncates a persona key at the first `?` and trims surrounding whitespace.
pub fn sanitize_key(raw: &str) -> &str {
    raw.split('?').next().unwrap_or_default().trim()
}

/// Title-cases a persona key for use as a participant name (`"munffett"` ->
/// `"Munffett"`).
pub fn display_name(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Loads persona instructions from `*.md` files in a directory, keyed by file
/// stem.
pub fn load_instructions(dir: &Path) -> Result<HashMap<String, String>> {
    let mut instructions = HashMap::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Could not read persona directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read persona file {}", path.display()))?;
            instructions.insert(key, content.trim().to_string());
        }
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(key: &str) -> PersonaConfig {
        PersonaConfig {
            key: key.into(),
            display_name: display_name(key),
            policy: ControlPolicy {
                instructions: format!("You are {key}."),
                voice: "alloy".into(),
                model: "gpt-4o-realtime-preview".into(),
                output_modalities: vec!["text".into()],
            },
            voice: VoiceConfig::default(),
        }
    }

    fn catalog() -> PersonaCatalog {
        PersonaCatalog::new([persona("munffett"), persona("oracle")], "munffett").unwrap()
    }

    #[test]
    fn test_resolve_strips_trailing_query() {
        let p = catalog().resolve(Some("munffett?x=1")).unwrap();
        assert_eq!(p.key, "munffett");
        let p = catalog().resolve(Some("oracle?wss=foo?bar")).unwrap();
        assert_eq!(p.key, "oracle");
    }

    #[test]
    fn test_resolve_missing_uses_default() {
        assert_eq!(catalog().resolve(None).unwrap().key, "munffett");
        assert_eq!(catalog().resolve(Some("")).unwrap().key, "munffett");
        assert_eq!(catalog().resolve(Some("?x=1")).unwrap().key, "munffett");
    }

    #[test]
    fn test_resolve_unknown_is_error() {
        let err = catalog().resolve(Some("nobody")).unwrap_err();
        assert!(matches!(err, BridgeError::PersonaNotFound(k) if k == "nobody"));
    }

    #[test]
    fn test_catalog_requires_default() {
        let err = PersonaCatalog::new([persona("oracle")], "munffett").unwrap_err();
        assert!(matches!(err, BridgeError::PersonaNotFound(_)));
    }

    #[test]
    fn test_sessions_share_the_same_persona() {
        let catalog = catalog();
        let a = catalog.resolve(Some("oracle")).unwrap();
        let b = catalog.resolve(Some("oracle")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("munffett"), "Munffett");
        assert_eq!(display_name("warren_buffett"), "Warren Buffett");
    }

    #[test]
    fn test_load_instructions_reads_markdown_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("munffett.md"), "  Speak like Munffett.\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_instructions(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["munffett"], "Speak like Munffett.");
    }

    #[test]
    fn test_load_instructions_missing_dir() {
        assert!(load_instructions(Path::new("/definitely/not/here")).is_err());
    }
}
