use std::sync::Arc;

use crate::bridge::{PatternMatcher, Screenshot};
use crate::templates::template::tokenize;
use crate::templates::{ElementType, HybridTemplateManager, Template};

use super::element::{DetectionMethod, ElementMatch};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Template-backed detector over the current template snapshot.
#[derive(Clone)]
pub struct PatternDetector {
    matcher: Arc<dyn PatternMatcher>,
    library: Arc<HybridTemplateManager>,
}

impl PatternDetector {
    pub fn new(matcher: Arc<dyn PatternMatcher>, library: Arc<HybridTemplateManager>) -> Self {
        Self { matcher, library }
    }

    /// Matches every template named like `query` (and of one of `types`,
    /// when given) against the screenshot.
    pub fn detect(
        &self,
        query: &str,
        types: &[ElementType],
        screenshot: &Screenshot,
    ) -> Vec<ElementMatch> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        self.library
            .get_templates()
            .iter()
            .filter(|template| types.is_empty() || types.contains(&template.element_type))
            .filter(|template| names_query(template, &query_tokens))
            .filter_map(|template| self.match_one(template, screenshot))
            .collect()
    }

    fn match_one(&self, template: &Template, screenshot: &Screenshot) -> Option<ElementMatch> {
        match self.matcher.match_template(&screenshot.image, template) {
            Ok(hit) => hit.map(|hit| {
                ElementMatch::new(
                    template.name.clone(),
                    hit.bounds,
                    hit.score,
                    DetectionMethod::Pattern,
                )
            }),
            Err(err) => {
                log_warn!("pattern match failed for template {}: {err:#}", template.name);
                None
            }
        }
    }
}

fn names_query(template: &Template, query_tokens: &[String]) -> bool {
    let tokens = template.name_tokens();
    query_tokens.iter().all(|q| tokens.contains(q))
}
