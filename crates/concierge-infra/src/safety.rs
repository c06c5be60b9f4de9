//! Config-driven safety content.
//!
//! Supplies the crisis keyword list and the degraded-mode templates from the
//! `[safety]` section of `config.toml`.

use std::collections::BTreeMap;

use concierge_core::safety::SafetyContent;
use concierge_types::config::SafetyConfig;
use concierge_types::dispatch::DispatchRequest;

#[derive(Debug, Clone)]
pub struct StaticSafetyContent {
    crisis_keywords: Vec<String>,
    default_template: String,
    templates: BTreeMap<String, String>,
}

impl StaticSafetyContent {
    pub fn from_config(config: &SafetyConfig) -> Self {
        let templates = config
            .degraded_templates
            .iter()
            .map(|(locale, text)| (locale.to_lowercase(), text.clone()))
            .collect();
        Self {
            crisis_keywords: config.crisis_keywords.clone(),
            default_template: config.degraded_template.clone(),
            templates,
        }
    }
}

impl SafetyContent for StaticSafetyContent {
    fn crisis_keywords(&self) -> &[String] {
        &self.crisis_keywords
    }

    /// Template for the request's locale: exact tag, then primary language
    /// (`pt-BR` -> `pt`), then the default.
    fn degraded_template(&self, request: &DispatchRequest) -> String {
        let Some(locale) = request.context.locale.as_deref().map(str::to_lowercase) else {
            return self.default_template.clone();
        };
        let language = locale.split(['-', '_']).next().unwrap_or_default();
        self.templates
            .get(&locale)
            .or_else(|| self.templates.get(language))
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&self.default_template)
            .clone()
    }
}
