//! Food photo classification service.
//!
//! `POST /analyze` takes a multipart image upload, classifies it with a
//! ResNet18 trained on ten food classes and answers with the predicted
//! dish's macro nutrients, looked up from CalorieNinjas or, when that is
//! unavailable, from a built-in table.

pub mod config;
pub mod errors;
pub mod labels;
pub mod logging;
pub mod model;
pub mod nutrition;
pub mod preprocess;
pub mod routes;
pub mod utils;
