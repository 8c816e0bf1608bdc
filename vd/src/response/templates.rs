//! Template-based response generation

use std::collections::HashMap;
use std::sync::Mutex;

use handlebars::Handlebars;
use rand::seq::IndexedRandom;
use serde_json::{Map, Value};
use tracing::debug;

use super::embedded::{default_templates, DEFAULT_INTENT};

/// Response when even the fallback pool cannot render
const APOLOGY: &str = "I'm having trouble formulating a response. Please try again.";

/// Picks a template for the detected intent and fills in its entities.
///
/// Avoids repeating the template used last time for an intent when more than
/// one is available. Unknown intents and missing entities fall back to the
/// default pool rather than failing.
pub struct TemplateResponseGenerator {
    templates: HashMap<String, Vec<String>>,
    renderer: Handlebars<'static>,
    /// Last template chosen per intent
    last_used: Mutex<HashMap<String, String>>,
}

impl TemplateResponseGenerator {
    /// Generator with the built-in template pools
    pub fn new() -> Self {
        let templates = default_templates()
            .into_iter()
            .map(|(intent, pool)| {
                (
                    intent.to_string(),
                    pool.into_iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self::with_templates(templates)
    }

    /// Generator with custom template pools.
    ///
    /// The default pool is always present; if the given map lacks one (or has
    /// an empty one), the built-in defaults are used for it.
    pub fn with_templates(mut templates: HashMap<String, Vec<String>>) -> Self {
        let needs_default = templates.get(DEFAULT_INTENT).is_none_or(|pool| pool.is_empty());
        if needs_default {
            let defaults = default_templates()
                .into_iter()
                .find(|(intent, _)| *intent == DEFAULT_INTENT)
                .map(|(_, pool)| pool.into_iter().map(|t| t.to_string()).collect())
                .unwrap_or_default();
            templates.insert(DEFAULT_INTENT.to_string(), defaults);
        }

        let mut renderer = Handlebars::new();
        renderer.set_strict_mode(true);
        // responses are spoken text, not HTML
        renderer.register_escape_fn(handlebars::no_escape);

        Self {
            templates,
            renderer,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a response for an intent.
    ///
    /// `entities` fill the template placeholders; `context` values are also
    /// available to templates but are shadowed by entities of the same name.
    pub fn generate_response(
        &self,
        intent_name: &str,
        entities: &Map<String, Value>,
        context: Option<&Map<String, Value>>,
    ) -> String {
        let pool = self.pool_for(intent_name);
        let template = self.choose_template(intent_name, pool);

        let mut data = context.cloned().unwrap_or_default();
        for (key, value) in entities {
            data.insert(key.clone(), value.clone());
        }

        match self.renderer.render_template(&template, &data) {
            Ok(text) => text,
            Err(e) => {
                debug!(intent = intent_name, error = %e, "template render failed, using default pool");
                self.render_default()
            }
        }
    }

    fn pool_for(&self, intent_name: &str) -> &[String] {
        self.templates
            .get(intent_name)
            .filter(|pool| !pool.is_empty())
            .unwrap_or_else(|| &self.templates[DEFAULT_INTENT])
    }

    /// Choose a template, avoiding the one used last time when possible
    fn choose_template(&self, intent_name: &str, pool: &[String]) -> String {
        let mut last_used = self.last_used.lock().expect("last-used lock poisoned");
        let last = last_used.get(intent_name);

        let available: Vec<&String> = pool.iter().filter(|t| Some(*t) != last).collect();
        let candidates = if available.is_empty() {
            pool.iter().collect::<Vec<_>>()
        } else {
            available
        };

        let template = candidates
            .choose(&mut rand::rng())
            .map(|t| t.to_string())
            .unwrap_or_else(|| APOLOGY.to_string());
        last_used.insert(intent_name.to_string(), template.clone());
        template
    }

    fn render_default(&self) -> String {
        let pool = &self.templates[DEFAULT_INTENT];
        pool.choose(&mut rand::rng())
            .map(|t| {
                self.renderer
                    .render_template(t, &Map::new())
                    .unwrap_or_else(|_| APOLOGY.to_string())
            })
            .unwrap_or_else(|| APOLOGY.to_string())
    }
}

impl Default for TemplateResponseGenerator {
    fn default() -> Self {
        Self::new()
    }
}
