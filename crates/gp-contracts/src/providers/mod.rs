use anyhow::{bail, Result};

/// Anything that can be looked up by a provider name such as `gemini`.
pub trait NamedProvider {
    fn name(&self) -> &str;
}

/// Provider entries keyed by name. Lookups ignore ASCII case and
/// surrounding whitespace.
#[derive(Debug, Clone)]
pub struct ProviderRegistry<T: NamedProvider> {
    entries: Vec<T>,
}

impl<T: NamedProvider> Default for ProviderRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: NamedProvider> ProviderRegistry<T> {
    /// Adds `entry`; a later entry with the same name replaces the earlier one.
    pub fn register(&mut self, entry: T) {
        self.entries
            .retain(|existing| !existing.name().eq_ignore_ascii_case(entry.name()));
        self.entries.push(entry);
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
    }

    pub fn resolve(&self, name: &str) -> Result<&T> {
        match self.get(name) {
            Some(entry) => Ok(entry),
            None => bail!(
                "unknown provider '{}' (available: {})",
                name.trim(),
                self.names().join(", ")
            ),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(NamedProvider::name).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::{NamedProvider, ProviderRegistry};

    struct Fake {
        name: &'static str,
        revision: u8,
    }

    impl NamedProvider for Fake {
        fn name(&self) -> &str {
            self.name
        }
    }

    fn registry() -> ProviderRegistry<Fake> {
        let mut registry = ProviderRegistry::default();
        registry.register(Fake {
            name: "gemini",
            revision: 1,
        });
        registry.register(Fake {
            name: "dryrun",
            revision: 1,
        });
        registry
    }

    #[test]
    fn lookups_ignore_case_and_padding() {
        let registry = registry();
        assert_eq!(registry.get(" Gemini ").map(|entry| entry.name), Some("gemini"));
        assert!(registry.get("openai").is_none());
        assert_eq!(registry.names(), vec!["dryrun", "gemini"]);
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Fake {
            name: "GEMINI",
            revision: 2,
        });
        assert_eq!(registry.names(), vec!["GEMINI", "dryrun"]);
        assert_eq!(registry.get("gemini").map(|entry| entry.revision), Some(2));
    }

    #[test]
    fn resolve_lists_known_names_on_miss() {
        let registry = registry();
        assert_eq!(registry.resolve("dryrun").map(|entry| entry.revision).ok(), Some(1));
        let err = registry.resolve("openai").err().map(|err| err.to_string());
        assert_eq!(
            err.as_deref(),
            Some("unknown provider 'openai' (available: dryrun, gemini)")
        );
    }
}
