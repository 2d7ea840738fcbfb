//! The movie record and its key.

use std::fmt;

use rust_decimal::Decimal;
use serde_json::{Map, Value, json};

use crate::error::ServiceError;
use crate::number::{decimal_to_value, value_to_decimal};

/// Primary key of a movie: partition `year`, sort `title`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieKey {
    pub year: i32,
    pub title: String,
}

impl MovieKey {
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Self {
            year,
            title: title.into(),
        }
    }

    /// The key object sent to the service.
    pub fn to_key(&self) -> Value {
        json!({"year": self.year, "title": self.title})
    }
}

impl fmt::Display for MovieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.year)
    }
}

/// The nested `info` map. Attributes other than plot, rating and actors are
/// kept in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieInfo {
    pub plot: Option<String>,
    pub rating: Option<Decimal>,
    pub actors: Option<Vec<String>>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub year: i32,
    pub title: String,
    pub info: MovieInfo,
}

impl Movie {
    pub fn key(&self) -> MovieKey {
        MovieKey::new(self.title.clone(), self.year)
    }

    /// Decode an item. Projected items may lack `info` or any of its fields.
    pub fn from_item(item: &Value) -> Result<Self, ServiceError> {
        let malformed = |what: &str| ServiceError::malformed_item(format!("movie item {what}"));

        let obj = item
            .as_object()
            .ok_or_else(|| malformed("is not a map"))?;
        let year = obj
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| malformed("has no integer year"))?;
        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("has no string title"))?
            .to_string();

        let mut info = MovieInfo::default();
        match obj.get("info") {
            None => {}
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    match k.as_str() {
                        "plot" => {
                            info.plot =
                                Some(v.as_str().ok_or_else(|| malformed("has non-string plot"))?.to_string());
                        }
                        "rating" => {
                            info.rating =
                                Some(value_to_decimal(v).ok_or_else(|| malformed("has non-numeric rating"))?);
                        }
                        "actors" => {
                            let list = v
                                .as_array()
                                .ok_or_else(|| malformed("has non-list actors"))?;
                            let actors = list
                                .iter()
                                .map(|a| a.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                                .ok_or_else(|| malformed("has non-string actor"))?;
                            info.actors = Some(actors);
                        }
                        _ => {
                            info.extra.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
            Some(_) => return Err(malformed("has non-map info")),
        }

        Ok(Self { year, title, info })
    }

    /// Encode as an item. Fails only if the rating cannot be written as a
    /// JSON number.
    pub fn to_item(&self) -> Result<Value, ServiceError> {
        let mut info = self.info.extra.clone();
        if let Some(plot) = &self.info.plot {
            info.insert("plot".to_string(), Value::String(plot.clone()));
        }
        if let Some(rating) = self.info.rating {
            let rating = decimal_to_value(rating).map_err(|e| {
                ServiceError::validation(format!("rating {rating} is not a JSON number: {e}"))
            })?;
            info.insert("rating".to_string(), rating);
        }
        if let Some(actors) = &self.info.actors {
            info.insert(
                "actors".to_string(),
                Value::Array(actors.iter().cloned().map(Value::String).collect()),
            );
        }
        Ok(json!({"year": self.year, "title": self.title, "info": info}))
    }
}
