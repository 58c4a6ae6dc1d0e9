use indexmap::IndexMap;

pub const CAPABILITY_TEXT: &str = "text";
pub const CAPABILITY_VISION: &str = "vision";
pub const CAPABILITY_IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Models for `capability` served by `provider`, in registration order.
    pub fn by_capability(&self, capability: &str, provider: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.provider == provider && model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str, provider: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.provider == provider && model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert =
        |name: &str, provider: &str, capabilities: &[&str], context_window: Option<u64>| {
            map.insert(
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: provider.to_string(),
                    capabilities: capabilities
                        .iter()
                        .map(|item| (*item).to_string())
                        .collect(),
                    context_window,
                },
            );
        };

    insert("gemini-2.5-pro", "gemini", &[CAPABILITY_TEXT], Some(1_048_576));
    insert(
        "gemini-2.5-flash",
        "gemini",
        &[CAPABILITY_VISION, CAPABILITY_TEXT],
        Some(1_048_576),
    );
    insert(
        "gemini-2.5-flash-lite",
        "gemini",
        &[CAPABILITY_TEXT, CAPABILITY_VISION],
        Some(1_048_576),
    );
    insert("imagen-4.0-generate-001", "gemini", &[CAPABILITY_IMAGE], None);
    insert(
        "imagen-4.0-ultra-generate-001",
        "gemini",
        &[CAPABILITY_IMAGE],
        None,
    );
    insert(
        "imagen-4.0-fast-generate-001",
        "gemini",
        &[CAPABILITY_IMAGE],
        None,
    );
    insert(
        "dryrun-text-1",
        "dryrun",
        &[CAPABILITY_TEXT, CAPABILITY_VISION],
        Some(8192),
    );
    insert("dryrun-image-1", "dryrun", &[CAPABILITY_IMAGE], None);

    map
}
