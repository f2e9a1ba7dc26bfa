//! Query intent analysis.
//!
//! A free-text query plus the workspace vocabulary (tag and category names)
//! is sent to a language model that answers with a structured
//! [`SearchAnalysis`]. Any model failure yields [`SearchAnalysis::basic`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

use crate::{
    items::{ItemStore, StoreError},
    semantic::{LanguageModel, ModelError},
};

const BASIC_INTENT: &str = "basic search";
const BASIC_CONFIDENCE: f32 = 0.5;

const INSTRUCTIONS: &str = r#"You analyze search queries for a personal bookmark and notes collection.

Given the user's query and the tags and categories that exist in the workspace:
- classify the intent of the query in a few words
- extract the search terms that should be matched literally against titles and content
- fill in filters only when the query clearly implies them:
  contentTypes ("bookmark" or "note"), tags and categories (prefer the existing names listed below),
  dateRange (relativePeriod such as "last week", or ISO startDate/endDate), sentiment, urgency, scope
- suggest ways the user could improve the query, if any
- rate your confidence in this analysis between 0 and 1 and explain it in one sentence"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub confidence: f32,
    pub explanation: String,
}

/// Structured intent derived from a query. Lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalysis {
    pub intent: String,
    pub search_terms: Vec<String>,
    pub filters: SearchFilters,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl SearchAnalysis {
    /// Analysis used whenever the model is unavailable: match the raw query.
    pub fn basic(query: &str) -> Self {
        SearchAnalysis {
            intent: BASIC_INTENT.to_string(),
            search_terms: vec![query.to_string()],
            filters: SearchFilters {
                confidence: BASIC_CONFIDENCE,
                explanation: "Query analysis unavailable, searching for the query as typed"
                    .to_string(),
                ..Default::default()
            },
            suggestions: vec![],
        }
    }

    pub fn confidence(&self) -> f32 {
        self.filters.confidence
    }
}

/// Model reply as constrained by [`analysis_schema`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    intent: String,
    search_terms: Vec<String>,
    filters: ReplyFilters,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
    confidence: f32,
    explanation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyFilters {
    #[serde(default)]
    content_types: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    date_range: Option<DateRange>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TryFrom<ModelReply> for SearchAnalysis {
    type Error = ModelError;

    fn try_from(reply: ModelReply) -> Result<Self, Self::Error> {
        if !reply.confidence.is_finite() || !(0.0..=1.0).contains(&reply.confidence) {
            return Err(ModelError::Schema(format!(
                "confidence out of range: {}",
                reply.confidence
            )));
        }

        let filters = reply.filters;
        Ok(SearchAnalysis {
            intent: reply.intent,
            search_terms: reply
                .search_terms
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            filters: SearchFilters {
                content_types: filters.content_types.unwrap_or_default(),
                tags: filters.tags.unwrap_or_default(),
                categories: filters.categories.unwrap_or_default(),
                date_range: filters.date_range,
                sentiment: filters.sentiment,
                urgency: filters.urgency,
                scope: filters.scope,
                confidence: reply.confidence,
                explanation: reply.explanation,
            },
            suggestions: reply.suggestions.unwrap_or_default(),
        })
    }
}

/// JSON schema the model output must conform to.
pub fn analysis_schema() -> Value {
    let strings = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "properties": {
            "intent": {"type": "string"},
            "searchTerms": strings,
            "filters": {
                "type": "object",
                "properties": {
                    "contentTypes": strings,
                    "tags": strings,
                    "categories": strings,
                    "dateRange": {
                        "type": "object",
                        "properties": {
                            "relativePeriod": {"type": "string"},
                            "startDate": {"type": "string"},
                            "endDate": {"type": "string"}
                        }
                    },
                    "sentiment": {"type": "string"},
                    "urgency": {"type": "string"},
                    "scope": {"type": "string"}
                }
            },
            "suggestions": strings,
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "explanation": {"type": "string"}
        },
        "required": ["intent", "searchTerms", "filters", "confidence", "explanation"]
    })
}

fn format_vocabulary(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

pub fn build_prompt(query: &str, tags: &[String], categories: &[String]) -> String {
    format!(
        "{INSTRUCTIONS}\n\n---\n\nExisting tags: {tags}\nExisting categories: {categories}\n\n---\n\n**Query:** {query}",
        tags = format_vocabulary(tags),
        categories = format_vocabulary(categories),
    )
}

/// Turns queries into [`SearchAnalysis`] using a language model.
///
/// Without a model every query gets the basic analysis.
pub struct QueryAnalyzer {
    store: Arc<dyn ItemStore>,
    model: Option<Arc<dyn LanguageModel>>,
    timeout: Duration,
}

impl QueryAnalyzer {
    pub fn new(
        store: Arc<dyn ItemStore>,
        model: Option<Arc<dyn LanguageModel>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            model,
            timeout,
        }
    }

    /// Analyze `query`. Only a store failure while loading the workspace
    /// vocabulary is an error; model failures degrade to the basic analysis.
    pub async fn analyze(
        &self,
        query: &str,
        workspace_id: Option<&str>,
    ) -> Result<SearchAnalysis, StoreError> {
        let (tags, categories) = match workspace_id {
            Some(ws) => (self.store.tag_names(ws)?, self.store.category_names(ws)?),
            None => (vec![], vec![]),
        };

        let Some(model) = &self.model else {
            return Ok(SearchAnalysis::basic(query));
        };

        let prompt = build_prompt(query, &tags, &categories);
        match self.ask(model.as_ref(), &prompt).await {
            Ok(analysis) => {
                log::debug!(
                    "query {query:?} analyzed as {:?} (confidence {:.2})",
                    analysis.intent,
                    analysis.confidence()
                );
                Ok(analysis)
            }
            Err(err) => {
                log::warn!("query analysis failed, using basic search: {err}");
                Ok(SearchAnalysis::basic(query))
            }
        }
    }

    async fn ask(
        &self,
        model: &dyn LanguageModel,
        prompt: &str,
    ) -> Result<SearchAnalysis, ModelError> {
        let schema = analysis_schema();
        let value = tokio::time::timeout(self.timeout, model.generate_object(prompt, &schema))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))??;

        let reply: ModelReply = serde_json::from_value(value)?;
        SearchAnalysis::try_from(reply)
    }
}
