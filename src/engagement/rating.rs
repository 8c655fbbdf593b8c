use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

pub const MIN_RATING: f64 = 0.5;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RatingError {
    #[error("Invalid rating value")]
    NotNumeric,
    #[error("Rating must be between 0.5 and 5.0")]
    OutOfRange,
    #[error("Rating must be in 0.5 increments (e.g., 1.5, 2.0, 4.5)")]
    WrongIncrement,
}

impl From<RatingError> for AppError {
    fn from(err: RatingError) -> Self {
        AppError::validation(err.to_string())
    }
}

/// A star rating in `[0.5, 5.0]` on a half-point grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingValue(f64);

impl RatingValue {
    /// Accepts a JSON number or a numeric string.
    pub fn parse(raw: &Value) -> Result<Self, RatingError> {
        let value = match raw {
            Value::Number(n) => n.as_f64().ok_or(RatingError::NotNumeric)?,
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| RatingError::NotNumeric)?,
            _ => return Err(RatingError::NotNumeric),
        };
        Self::new(value)
    }

    pub fn new(value: f64) -> Result<Self, RatingError> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(RatingError::OutOfRange);
        }
        if (value * 2.0).fract() != 0.0 {
            return Err(RatingError::WrongIncrement);
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Live aggregate over a recipe's ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: i64,
}

impl RatingSummary {
    /// Mean and count; an unrated recipe averages 0.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let (sum, count) = values
            .into_iter()
            .fold((0.0_f64, 0_i64), |(sum, n), v| (sum + v, n + 1));
        let average_rating = if count == 0 { 0.0 } else { sum / count as f64 };
        Self {
            average_rating,
            total_ratings: count,
        }
    }
}
