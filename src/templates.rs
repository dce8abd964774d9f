//! Style template catalog.
//!
//! Templates are reusable style requests. Built-in templates seed the
//! catalog on first load and are read-only apart from likes; user-authored
//! templates may be renamed and deleted. Every mutation persists the full
//! catalog through the key-value collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CatalogError;
use crate::persist::{KvStore, load_or_default, save_logged};
use crate::types::StyleTemplate;

/// Storage key for the persisted template catalog.
pub const TEMPLATES_KEY: &str = "style-templates";

static TEMPLATE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Built-in templates seeded when no catalog has been persisted yet.
fn builtin_templates() -> Vec<StyleTemplate> {
    let presets = [
        (
            "tpl-minimalist",
            "Minimalist",
            "Rewrite in a spare, minimalist register: short declarative sentences, \
             generous whitespace, monochrome styling with a single accent color.",
        ),
        (
            "tpl-editorial",
            "Editorial",
            "Rewrite as long-form magazine copy: serif typography, drop caps, \
             pull quotes for key claims, warm paper-like background.",
        ),
        (
            "tpl-technical",
            "Technical manual",
            "Rewrite as a precise technical manual: numbered sections, monospace \
             for identifiers, admonition boxes for warnings, high-contrast styling.",
        ),
        (
            "tpl-playful",
            "Playful",
            "Rewrite with a light, conversational voice: rounded corners, bold \
             friendly headings, soft pastel palette.",
        ),
    ];
    presets
        .into_iter()
        .map(|(id, name, prompt)| StyleTemplate {
            id: id.to_string(),
            name: name.to_string(),
            prompt: prompt.to_string(),
            like_count: 0,
            is_liked: false,
            is_user_authored: false,
        })
        .collect()
}

/// Mutable, persisted catalog of style templates.
pub struct TemplateCatalog {
    templates: Vec<StyleTemplate>,
    store: Arc<dyn KvStore>,
}

impl TemplateCatalog {
    /// Load the persisted catalog; absent or malformed data seeds the
    /// built-in templates.
    #[must_use]
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let mut templates: Vec<StyleTemplate> = load_or_default(store.as_ref(), TEMPLATES_KEY);
        if templates.is_empty() {
            templates = builtin_templates();
        }
        Self { templates, store }
    }

    /// All templates in catalog order.
    #[must_use]
    pub fn list(&self) -> &[StyleTemplate] {
        &self.templates
    }

    /// Look up a template by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StyleTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Toggle the like flag, adjusting the like count by ±1 accordingly.
    pub fn like(&mut self, id: &str) -> Result<(), CatalogError> {
        let template = self.get_mut(id)?;
        if template.is_liked {
            template.is_liked = false;
            template.like_count = template.like_count.saturating_sub(1);
        } else {
            template.is_liked = true;
            template.like_count += 1;
        }
        self.persist();
        Ok(())
    }

    /// Rename a user-authored template.
    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), CatalogError> {
        let template = self.get_mut(id)?;
        if !template.is_user_authored {
            return Err(CatalogError::BuiltinImmutable { id: id.to_string() });
        }
        template.name = name.into();
        self.persist();
        Ok(())
    }

    /// Delete a user-authored template.
    pub fn delete(&mut self, id: &str) -> Result<(), CatalogError> {
        let template = self.get(id).ok_or_else(|| CatalogError::NotFound {
            id: id.to_string(),
        })?;
        if !template.is_user_authored {
            return Err(CatalogError::BuiltinImmutable { id: id.to_string() });
        }
        self.templates.retain(|t| t.id != id);
        self.persist();
        Ok(())
    }

    /// Create a new user-authored template with zero likes; returns its id.
    pub fn save(&mut self, name: impl Into<String>, prompt: impl Into<String>) -> String {
        let seq = TEMPLATE_SEQ.fetch_add(1, Ordering::Relaxed);
        let id = format!("tpl-user-{seq}");
        self.templates.push(StyleTemplate {
            id: id.clone(),
            name: name.into(),
            prompt: prompt.into(),
            like_count: 0,
            is_liked: false,
            is_user_authored: true,
        });
        self.persist();
        id
    }

    /// Case-insensitive containment search over name and prompt text.
    #[must_use]
    pub fn search(&self, needle: &str) -> Vec<&StyleTemplate> {
        let needle = needle.to_lowercase();
        self.templates
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.prompt.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut StyleTemplate, CatalogError> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })
    }

    fn persist(&self) {
        save_logged(self.store.as_ref(), TEMPLATES_KEY, &self.templates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::load(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn fresh_catalog_seeds_builtins() {
        let catalog = catalog();
        assert!(!catalog.list().is_empty());
        assert!(catalog.list().iter().all(|t| !t.is_user_authored));
    }

    #[test]
    fn like_toggles_and_adjusts_count() {
        let mut catalog = catalog();
        let id = catalog.list()[0].id.clone();

        catalog.like(&id).unwrap();
        assert!(catalog.get(&id).unwrap().is_liked);
        assert_eq!(catalog.get(&id).unwrap().like_count, 1);

        catalog.like(&id).unwrap();
        assert!(!catalog.get(&id).unwrap().is_liked);
        assert_eq!(catalog.get(&id).unwrap().like_count, 0);
    }

    #[test]
    fn rename_rejected_for_builtin() {
        let mut catalog = catalog();
        let id = catalog.list()[0].id.clone();
        assert!(matches!(
            catalog.rename(&id, "Renamed"),
            Err(CatalogError::BuiltinImmutable { .. })
        ));
    }

    #[test]
    fn save_rename_delete_user_template() {
        let mut catalog = catalog();
        let id = catalog.save("Mine", "make it mine");
        assert!(catalog.get(&id).unwrap().is_user_authored);
        assert_eq!(catalog.get(&id).unwrap().like_count, 0);

        catalog.rename(&id, "Ours").unwrap();
        assert_eq!(catalog.get(&id).unwrap().name, "Ours");

        catalog.delete(&id).unwrap();
        assert!(catalog.get(&id).is_none());
    }

    #[test]
    fn delete_unknown_id_reports_not_found() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.delete("tpl-ghost"),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_prompt() {
        let mut catalog = catalog();
        catalog.save("Gothic novel", "heavy blackletter headings");

        let by_name = catalog.search("gothic");
        assert_eq!(by_name.len(), 1);

        let by_prompt = catalog.search("BLACKLETTER");
        assert_eq!(by_prompt.len(), 1);

        assert!(catalog.search("no such thing").is_empty());
    }

    #[test]
    fn mutations_survive_reload() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
        let saved_id = {
            let mut catalog = TemplateCatalog::load(store.clone());
            catalog.save("Persisted", "prompt text")
        };
        let reloaded = TemplateCatalog::load(store);
        assert!(reloaded.get(&saved_id).is_some());
    }
}
