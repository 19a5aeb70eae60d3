use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::glucose::repo::GlucoseReading;
use crate::patch::Patch;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct CreateReadingRequest {
    pub value: Option<f64>,
    pub notes: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReadingRequest {
    #[serde(default)]
    pub value: Patch<f64>,
    #[serde(default)]
    pub notes: Patch<String>,
    #[serde(default, deserialize_with = "crate::patch::rfc3339_patch")]
    pub timestamp: Patch<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub value: f64,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl ReadingResponse {
    pub fn plain(r: GlucoseReading) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            value: r.value,
            notes: r.notes,
            timestamp: r.timestamp,
            status: None,
        }
    }

    pub fn with_status(r: GlucoseReading, target: Option<(f64, f64)>) -> Self {
        let status = glucose_status(r.value, target);
        Self {
            status: Some(status),
            ..Self::plain(r)
        }
    }
}

/// Classifies a reading against the target band. Computed at read/write
/// time, never stored.
pub fn glucose_status(value: f64, target: Option<(f64, f64)>) -> &'static str {
    match target {
        Some((min, _)) if value < min => "low",
        Some((_, max)) if value > max => "high",
        _ => "in-range",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseStats {
    pub average_glucose: f64,
    pub high_readings: u32,
    pub low_readings: u32,
    pub in_range_readings: u32,
    pub total_readings: u32,
}

pub fn compute_stats(values: &[f64], target: Option<(f64, f64)>) -> GlucoseStats {
    let mut stats = GlucoseStats {
        average_glucose: 0.0,
        high_readings: 0,
        low_readings: 0,
        in_range_readings: 0,
        total_readings: values.len() as u32,
    };
    if values.is_empty() {
        return stats;
    }
    for &v in values {
        match glucose_status(v, target) {
            "low" => stats.low_readings += 1,
            "high" => stats.high_readings += 1,
            _ => stats.in_range_readings += 1,
        }
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    stats.average_glucose = (avg * 10.0).round() / 10.0;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Option<(f64, f64)> = Some((70.0, 180.0));

    #[test]
    fn status_below_min_is_low() {
        assert_eq!(glucose_status(65.0, TARGET), "low");
    }

    #[test]
    fn status_above_max_is_high() {
        assert_eq!(glucose_status(181.0, TARGET), "high");
    }

    #[test]
    fn status_within_band_is_in_range() {
        assert_eq!(glucose_status(120.0, TARGET), "in-range");
        assert_eq!(glucose_status(70.0, TARGET), "in-range");
        assert_eq!(glucose_status(180.0, TARGET), "in-range");
    }

    #[test]
    fn status_without_target_is_always_in_range() {
        assert_eq!(glucose_status(65.0, None), "in-range");
        assert_eq!(glucose_status(400.0, None), "in-range");
    }

    #[test]
    fn stats_count_by_band_and_average() {
        let stats = compute_stats(&[65.0, 120.0, 181.0, 100.0], TARGET);
        assert_eq!(stats.low_readings, 1);
        assert_eq!(stats.high_readings, 1);
        assert_eq!(stats.in_range_readings, 2);
        assert_eq!(stats.total_readings, 4);
        assert_eq!(stats.average_glucose, 116.5);
    }

    #[test]
    fn stats_of_empty_set_are_zero() {
        let stats = compute_stats(&[], TARGET);
        assert_eq!(stats.total_readings, 0);
        assert_eq!(stats.average_glucose, 0.0);
    }
}
