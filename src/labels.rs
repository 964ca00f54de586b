//! Class labels, display names and the static nutrition fallback table.
//!
//! Label order is the alphabetical folder order used when the weights were
//! trained: output index `i` of the network is `FOOD_CLASSES[i]`.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

/// Output classes of the classifier, in training index order.
pub const FOOD_CLASSES: [&str; 10] = [
    "bibimbap",
    "chicken_wings",
    "chocolate_cake",
    "french_fries",
    "fried_rice",
    "hamburger",
    "pizza",
    "ramen",
    "steak",
    "sushi",
];

/// Curated display names where title-casing the raw label reads poorly.
/// Every current class title-cases cleanly.
const DISPLAY_OVERRIDES: [(&str, &str); 0] = [];

/// Search terms the nutrition service resolves better than the raw label.
const QUERY_OVERRIDES: [(&str, &str); 0] = [];

/// (label, calories, carbs, protein, fat) per serving.
const NUTRITION_FALLBACK: [(&str, f64, f64, f64, f64); 10] = [
    ("bibimbap", 600.0, 85.0, 20.0, 16.0),
    ("chicken_wings", 420.0, 10.0, 35.0, 25.0),
    ("chocolate_cake", 350.0, 45.0, 5.0, 15.0),
    ("french_fries", 365.0, 48.0, 4.0, 18.0),
    ("fried_rice", 520.0, 70.0, 15.0, 15.0),
    ("hamburger", 550.0, 45.0, 30.0, 28.0),
    ("pizza", 285.0, 36.0, 12.0, 10.0),
    ("ramen", 430.0, 55.0, 12.0, 16.0),
    ("steak", 679.0, 0.0, 62.0, 48.0),
    ("sushi", 300.0, 65.0, 12.0, 3.0),
];

/// Macro nutrients for one food item, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRecord {
    pub name: String,
    #[serde(serialize_with = "serialize_amount")]
    pub calories: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub carbs: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub protein: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub fat: f64,
}

impl NutritionRecord {
    /// Same amounts under a different name.
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }
}

/// Whole amounts go out as JSON integers (`285`, not `285.0`).
fn serialize_amount<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Macros {
    calories: f64,
    carbs: f64,
    protein: f64,
    fat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("class index {index} out of range for {len} labels")]
pub struct LabelIndexError {
    pub index: usize,
    pub len: usize,
}

/// Immutable lookup tables shared by the classifier and the handlers.
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: Vec<String>,
    display: HashMap<String, String>,
    queries: HashMap<String, String>,
    fallback: HashMap<String, Macros>,
}

impl LabelTable {
    /// The ten food classes the shipped weights were trained on.
    pub fn food_classes() -> Self {
        Self {
            labels: FOOD_CLASSES.iter().map(|s| s.to_string()).collect(),
            display: DISPLAY_OVERRIDES
                .iter()
                .map(|(raw, shown)| (raw.to_string(), shown.to_string()))
                .collect(),
            queries: QUERY_OVERRIDES
                .iter()
                .map(|(raw, query)| (raw.to_string(), query.to_string()))
                .collect(),
            fallback: NUTRITION_FALLBACK
                .iter()
                .map(|&(raw, calories, carbs, protein, fat)| {
                    (
                        raw.to_string(),
                        Macros {
                            calories,
                            carbs,
                            protein,
                            fat,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_to_label(&self, index: usize) -> Result<&str, LabelIndexError> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(LabelIndexError {
                index,
                len: self.labels.len(),
            })
    }

    pub fn raw_to_display(&self, raw: &str) -> String {
        match self.display.get(raw) {
            Some(shown) => shown.clone(),
            None => title_case(raw),
        }
    }

    /// Term sent to the nutrition service for `raw`.
    pub fn nutrition_query(&self, raw: &str) -> String {
        match self.queries.get(raw) {
            Some(query) => query.clone(),
            None => raw.replace('_', " "),
        }
    }

    /// Static record for `raw`; unknown labels get zeroed amounts.
    pub fn fallback_nutrition(&self, raw: &str) -> NutritionRecord {
        let macros = self.fallback.get(raw).copied().unwrap_or(Macros {
            calories: 0.0,
            carbs: 0.0,
            protein: 0.0,
            fat: 0.0,
        });
        NutritionRecord {
            name: self.raw_to_display(raw),
            calories: macros.calories,
            carbs: macros.carbs,
            protein: macros.protein,
            fat: macros.fat,
        }
    }
}

/// `chicken_wings` -> `Chicken Wings`.
fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
