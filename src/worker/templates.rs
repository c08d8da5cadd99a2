use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::worker::task::{DetailRecord, ListPage};

/// A site-specific parsing strategy, resolved once per task.
pub trait PageTemplate: Send + Sync {
    /// Extract candidate detail URLs and the next-page link from a list page.
    fn parse_list(&self, body: &str) -> Result<ListPage>;

    /// Extract one record's content from a detail page.
    fn parse_detail(&self, body: &str) -> Result<DetailRecord>;
}

/// Static dispatch table from `(site_id, template_id)` to a parsing
/// strategy. Templates are registered at startup; there is no dynamic
/// reloading.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<(String, String), Arc<dyn PageTemplate>>,
    fallback: Option<Arc<dyn PageTemplate>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, site_id: &str, template_id: &str, template: Arc<dyn PageTemplate>) {
        self.templates
            .insert((site_id.to_string(), template_id.to_string()), template);
    }

    /// Template used when no site-specific one is registered.
    pub fn set_fallback(&mut self, template: Arc<dyn PageTemplate>) {
        self.fallback = Some(template);
    }

    pub fn resolve(&self, site_id: &str, template_id: &str) -> Result<Arc<dyn PageTemplate>> {
        self.templates
            .get(&(site_id.to_string(), template_id.to_string()))
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| Error::UnknownTemplate {
                site_id: site_id.to_string(),
                template_id: template_id.to_string(),
            })
    }
}

/// Template for sites whose list and detail endpoints already return JSON.
///
/// List bodies are expected to carry `detail_urls` and an optional
/// `next_page_url`; detail bodies are stored as the record they decode to.
pub struct JsonTemplate;

impl PageTemplate for JsonTemplate {
    fn parse_list(&self, body: &str) -> Result<ListPage> {
        serde_json::from_str(body)
            .map_err(|e| Error::Parse(format!("list body is not the expected JSON shape: {e}")))
    }

    fn parse_detail(&self, body: &str) -> Result<DetailRecord> {
        serde_json::from_str(body)
            .map_err(|e| Error::Parse(format!("detail body is not a JSON object: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_template_parses_list_pages() {
        let body = r#"{
            "detail_urls": ["https://example.com/a", "https://example.com/b"],
            "next_page_url": "https://example.com/list?page=2"
        }"#;

        let page = JsonTemplate.parse_list(body).unwrap();
        assert_eq!(page.detail_urls.len(), 2);
        assert_eq!(
            page.next_page_url.as_deref(),
            Some("https://example.com/list?page=2")
        );
    }

    #[test]
    fn json_template_rejects_malformed_list_pages() {
        let err = JsonTemplate.parse_list("<html>not json</html>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn registry_resolves_registered_then_fallback() {
        let mut registry = TemplateRegistry::new();
        registry.register("42", "7", Arc::new(JsonTemplate));

        assert!(registry.resolve("42", "7").is_ok());
        assert!(matches!(
            registry.resolve("42", "8"),
            Err(Error::UnknownTemplate { .. })
        ));

        registry.set_fallback(Arc::new(JsonTemplate));
        assert!(registry.resolve("42", "8").is_ok());
    }
}
