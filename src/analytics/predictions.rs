//! Per-category spending predictions.
//!
//! For each expense category the engine looks at the trailing six months of
//! ledger data, takes the mean of the observed monthly totals, classifies the
//! direction of movement by comparing the recent couple of months against
//! that mean, and extrapolates next month's spend from the mean nudged in the
//! trend's direction. The confidence score rewards longer histories and
//! punishes volatile ones.

use std::collections::{BTreeMap, HashMap};

use rusqlite::Connection;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, category,
    database_id::{CategoryId, UserId},
};

use super::{engine::expenses_in_window, window::month_start};

/// How many trailing months of ledger data feed a prediction.
pub const LOOKBACK_MONTHS: u32 = 6;

/// How many of the most recent observed months the trend classifier compares
/// against the full window.
const RECENT_WINDOW: usize = 2;

/// A movement of ten percent against the window average flips the trend away
/// from stable.
const TREND_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 1); // 0.1

/// The direction a category's spending is moving in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Recent months run well above the window average.
    Rising,
    /// Recent months run well below the window average.
    Falling,
    /// Recent months track the window average.
    Stable,
}

/// Next month's predicted spend for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The category the prediction covers.
    pub category_id: CategoryId,
    /// The category's display name.
    pub category_name: String,
    /// The extrapolated spend for next month.
    pub predicted_amount: Decimal,
    /// The mean of the observed monthly totals in the lookback window.
    pub historical_average: Decimal,
    /// The direction the category's spending is moving in.
    pub trend: Trend,
    /// How much to trust the prediction, 0-100.
    ///
    /// Grows with the number of observed months and shrinks with the
    /// volatility of the monthly totals.
    pub confidence_score: f64,
}

/// Predict next month's spend for every category with expenses in the
/// lookback window, largest predicted amount first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn predictions(
    user_id: UserId,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Prediction>, Error> {
    let expenses = expenses_in_window(user_id, LOOKBACK_MONTHS, today, connection)?;

    // Month totals per category, ordered oldest month first.
    let mut by_category: HashMap<CategoryId, BTreeMap<Date, Decimal>> = HashMap::new();
    for transaction in &expenses {
        let Some(category_id) = transaction.category_id else {
            continue;
        };

        *by_category
            .entry(category_id)
            .or_default()
            .entry(month_start(transaction.date))
            .or_insert(Decimal::ZERO) += transaction.amount;
    }

    let names = category::category_names(user_id, connection)?;

    let mut results: Vec<Prediction> = by_category
        .into_iter()
        .map(|(category_id, monthly)| {
            let totals: Vec<Decimal> = monthly.into_values().collect();
            let category_name = names
                .get(&category_id)
                .cloned()
                .unwrap_or_else(|| format!("Category {category_id}"));

            predict_for_category(category_id, category_name, &totals)
        })
        .collect();

    results.sort_by(|a, b| {
        b.predicted_amount
            .cmp(&a.predicted_amount)
            .then(a.category_id.cmp(&b.category_id))
    });

    Ok(results)
}

fn predict_for_category(
    category_id: CategoryId,
    category_name: String,
    monthly_totals: &[Decimal],
) -> Prediction {
    let historical_average = mean(monthly_totals);
    let trend = classify_trend(monthly_totals);

    let adjustment = match trend {
        Trend::Rising => Decimal::new(105, 2),
        Trend::Falling => Decimal::new(95, 2),
        Trend::Stable => Decimal::ONE,
    };

    Prediction {
        category_id,
        category_name,
        predicted_amount: (historical_average * adjustment).round_dp(2),
        historical_average: historical_average.round_dp(2),
        trend,
        confidence_score: confidence(monthly_totals),
    }
}

/// Compare the mean of the most recent months against the full window mean.
fn classify_trend(monthly_totals: &[Decimal]) -> Trend {
    if monthly_totals.len() < 2 {
        return Trend::Stable;
    }

    let average = mean(monthly_totals);
    let recent_start = monthly_totals.len().saturating_sub(RECENT_WINDOW);
    let recent_average = mean(&monthly_totals[recent_start..]);

    if recent_average > average * (Decimal::ONE + TREND_THRESHOLD) {
        Trend::Rising
    } else if recent_average < average * (Decimal::ONE - TREND_THRESHOLD) {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

/// Score a prediction between 0 and 100.
///
/// The score is the product of two factors: the share of the lookback window
/// that has data at all, and the inverse of the coefficient of variation of
/// the monthly totals. Holding volatility fixed, more observed months always
/// score higher; holding the month count fixed, noisier series always score
/// lower. Six steady months score the full 100.
fn confidence(monthly_totals: &[Decimal]) -> f64 {
    if monthly_totals.is_empty() {
        return 0.0;
    }

    let totals: Vec<f64> = monthly_totals
        .iter()
        .map(|total| total.to_f64().unwrap_or(0.0))
        .collect();

    let count = totals.len() as f64;
    let mean = totals.iter().sum::<f64>() / count;
    if mean <= 0.0 {
        return 0.0;
    }

    let variance = totals
        .iter()
        .map(|total| (total - mean).powi(2))
        .sum::<f64>()
        / count;
    let coefficient_of_variation = variance.sqrt() / mean;

    let months_factor = count / LOOKBACK_MONTHS as f64;
    let score = 100.0 * months_factor / (1.0 + coefficient_of_variation);

    (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

fn mean(totals: &[Decimal]) -> Decimal {
    if totals.is_empty() {
        return Decimal::ZERO;
    }

    totals.iter().copied().sum::<Decimal>() / Decimal::from(totals.len())
}

// ============================================================================
// TESTS
// ============================================================================
