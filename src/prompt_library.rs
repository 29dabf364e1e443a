//! Prompt templates loaded from a folder of `.txt` files.
//!
//! File naming convention:
//!
//! | File | Result |
//! |------|--------|
//! | `greet.txt` | `greet` → [`PromptTemplate::Plain`] |
//! | `review.system.txt` + `review.user.txt` | `review` → [`PromptTemplate::SystemUser`] |
//! | `summary.schema.txt` | ignored (schema files belong to the schema store) |
//!
//! The prompt name is the file name up to its first `.`.

use crate::error::{AiError, Result};
use crate::prompt::PromptTemplate;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Default)]
struct PartialPair {
    system: Option<String>,
    user: Option<String>,
}

/// An immutable set of named prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptTemplate>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template (builder style).
    pub fn with_prompt(mut self, name: impl Into<String>, template: PromptTemplate) -> Self {
        self.prompts.insert(name.into(), template);
        self
    }

    /// Load every prompt file in `dir`.
    ///
    /// Empty or unreadable files are skipped with a warning. A missing
    /// directory yields an empty library.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            error!(path = %dir.display(), "prompt folder does not exist");
            return Ok(Self::new());
        }
        if !dir.is_dir() {
            return Err(AiError::InvalidConfig(format!(
                "prompt folder {} is not a directory",
                dir.display()
            )));
        }

        let mut plain: HashMap<String, String> = HashMap::new();
        let mut pairs: HashMap<String, PartialPair> = HashMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(".txt") || file_name.ends_with(".schema.txt") {
                continue;
            }
            let name = file_name.split('.').next().unwrap_or(file_name).to_string();

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = file_name, error = %e, "skipping unreadable prompt file");
                    continue;
                }
            };
            if content.trim().is_empty() {
                warn!(file = file_name, "skipping empty prompt file");
                continue;
            }

            if file_name.ends_with(".system.txt") {
                pairs.entry(name).or_default().system = Some(content);
            } else if file_name.ends_with(".user.txt") {
                pairs.entry(name).or_default().user = Some(content);
            } else {
                plain.insert(name, content);
            }
        }

        let mut prompts: HashMap<String, PromptTemplate> = plain
            .into_iter()
            .map(|(name, text)| (name, PromptTemplate::Plain(text)))
            .collect();

        for (name, pair) in pairs {
            match (&pair.system, &pair.user) {
                (Some(_), None) => warn!(prompt = %name, "prompt has a system part but no user part"),
                (None, Some(_)) => warn!(prompt = %name, "prompt has a user part but no system part"),
                _ => {}
            }
            let template = PromptTemplate::SystemUser {
                system: pair.system.unwrap_or_default(),
                user: pair.user.unwrap_or_default(),
            };
            if prompts.insert(name.clone(), template).is_some() {
                warn!(prompt = %name, "system/user pair replaces a plain prompt of the same name");
            }
        }

        info!(path = %dir.display(), count = prompts.len(), "loaded prompts");
        Ok(Self { prompts })
    }

    pub fn resolve(&self, name: &str) -> Option<&PromptTemplate> {
        self.prompts.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prompts.contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.prompts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_dir_conventions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greet.txt"), "Say hello to {name}").unwrap();
        fs::write(dir.path().join("review.system.txt"), "You are a strict reviewer.").unwrap();
        fs::write(dir.path().join("review.user.txt"), "Review: {code}").unwrap();
        fs::write(dir.path().join("draft.v2.txt"), "Draft about {topic}").unwrap();
        fs::write(dir.path().join("summary.schema.txt"), "{\"title\": \"...\"}").unwrap();
        fs::write(dir.path().join("blank.txt"), "  \n").unwrap();
        fs::write(dir.path().join("readme.md"), "not a prompt").unwrap();

        let library = PromptLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(
            library.names().into_iter().collect::<Vec<_>>(),
            vec!["draft", "greet", "review"]
        );
        assert_eq!(
            library.resolve("greet"),
            Some(&PromptTemplate::Plain("Say hello to {name}".into()))
        );
        assert_eq!(
            library.resolve("review"),
            Some(&PromptTemplate::SystemUser {
                system: "You are a strict reviewer.".into(),
                user: "Review: {code}".into(),
            })
        );
        assert!(library.resolve("summary").is_none());
        assert!(library.resolve("blank").is_none());
    }

    #[test]
    fn test_half_pair_loads_with_empty_other_half() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lonely.system.txt"), "System only").unwrap();

        let library = PromptLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(
            library.resolve("lonely"),
            Some(&PromptTemplate::SystemUser {
                system: "System only".into(),
                user: String::new(),
            })
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::load_dir(dir.path().join("missing")).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_file_path_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prompts.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            PromptLibrary::load_dir(&file),
            Err(AiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_with_prompt_builder() {
        let library = PromptLibrary::new()
            .with_prompt("a", PromptTemplate::Plain("A".into()))
            .with_prompt("b", PromptTemplate::Plain("B".into()));
        assert_eq!(library.len(), 2);
        assert!(library.contains("a"));
    }
}
