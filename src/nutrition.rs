//! Nutrition lookup against the CalorieNinjas API with a static fallback.
//!
//! The external service is best effort: any failure (no key, transport error,
//! timeout, non-success status, empty result, unexpected payload) is logged
//! and answered from [`LabelTable::fallback_nutrition`]. A lookup never fails
//! the request that triggered it. There are no retries.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    config::NutritionClientConfig,
    errors::NutritionError,
    labels::{LabelTable, NutritionRecord},
};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Expected response body. Fields this service does not use are ignored.
#[derive(Debug, Deserialize)]
struct NutritionResponse {
    items: Vec<NutritionItem>,
}

#[derive(Debug, Deserialize)]
struct NutritionItem {
    #[serde(default)]
    name: Option<String>,
    calories: f64,
    carbohydrates_total_g: f64,
    protein_g: f64,
    fat_total_g: f64,
}

impl NutritionItem {
    fn into_record(self, query: &str) -> NutritionRecord {
        NutritionRecord {
            name: self.name.unwrap_or_else(|| query.to_string()),
            calories: self.calories,
            carbs: self.carbohydrates_total_g,
            protein: self.protein_g,
            fat: self.fat_total_g,
        }
    }
}

pub struct NutritionResolver {
    config: NutritionClientConfig,
    http_client: reqwest::Client,
    labels: Arc<LabelTable>,
}

impl NutritionResolver {
    pub fn new(config: NutritionClientConfig, labels: Arc<LabelTable>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            config,
            http_client,
            labels,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Nutrition for a raw class label; never fails.
    pub async fn resolve(&self, label: &str) -> NutritionRecord {
        match self.lookup(label).await {
            Ok(record) => {
                tracing::debug!(label, name = %record.name, "nutrition from external service");
                record
            }
            Err(err) => {
                tracing::warn!(label, error = %err, "nutrition lookup failed, using fallback table");
                self.labels.fallback_nutrition(label)
            }
        }
    }

    /// One attempt against the external service.
    pub async fn lookup(&self, label: &str) -> Result<NutritionRecord, NutritionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(NutritionError::MissingApiKey)?;
        let query = self.labels.nutrition_query(label);

        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&[("query", query.as_str())])
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NutritionError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: NutritionResponse = serde_json::from_slice(&body)
            .map_err(|err| NutritionError::Malformed(err.to_string()))?;

        parsed
            .items
            .into_iter()
            .next()
            .map(|item| item.into_record(&query))
            .ok_or(NutritionError::Empty { query })
    }
}
