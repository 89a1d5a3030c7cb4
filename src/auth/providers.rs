use serde::Serialize;
use std::collections::HashMap;

/// An enabled external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub name: String,
    pub label: String,
}

impl Provider {
    pub fn named(name: &str) -> Self {
        let mut chars = name.chars();
        let label = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        Self {
            name: name.to_string(),
            label,
        }
    }
}

/// Fixed at startup from configuration; lookups never mutate it.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// All enabled providers, ordered by name for a stable listing.
    pub fn list(&self) -> Vec<&Provider> {
        let mut providers: Vec<&Provider> = self.providers.values().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_capitalizes_label() {
        let provider = Provider::named("github");
        assert_eq!(provider.name, "github");
        assert_eq!(provider.label, "Github");
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = ProviderRegistry::new([Provider::named("google"), Provider::named("github")]);
        assert!(registry.get("github").is_some());
        assert!(registry.get("gitlab").is_none());

        let names: Vec<&str> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["github", "google"]);
    }
}
