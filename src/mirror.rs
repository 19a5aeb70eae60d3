//! Write-side synchronization between origin records (glucose readings,
//! insulin doses, meals, predictions) and their denormalized `activities`
//! feed rows.
//!
//! Every mirror row stores the origin's id in `origin_id` and copies the
//! origin's `user_id` and `timestamp`, so for each origin row there is
//! exactly one feed entry with the same user, timestamp and kind. All
//! mutations here run on the caller's transaction; an origin write and its
//! mirror write either both land or neither does.

use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// Scalar fields copied onto the feed row; which ones are populated depends
/// on the origin kind.
#[derive(Debug, Clone, Default)]
pub struct MirrorFields {
    pub value: Option<f64>,
    pub carbs: Option<f64>,
    pub units: Option<f64>,
    pub meal_type: Option<String>,
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    kind: &str,
    origin_id: Uuid,
    timestamp: OffsetDateTime,
    fields: MirrorFields,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activities (user_id, type, value, carbs, units, meal_type, origin_id, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(fields.value)
    .bind(fields.carbs)
    .bind(fields.units)
    .bind(fields.meal_type)
    .bind(origin_id)
    .bind(timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Re-copies the mirrored scalars and the timestamp onto the feed row(s) of
/// an origin record. Matching is by `origin_id`, so editing the origin's
/// timestamp moves the feed entry along with it.
pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    origin_id: Uuid,
    timestamp: OffsetDateTime,
    fields: MirrorFields,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE activities
        SET value = $3, carbs = $4, units = $5,
            meal_type = COALESCE($6, meal_type), timestamp = $7
        WHERE user_id = $1 AND origin_id = $2
        "#,
    )
    .bind(user_id)
    .bind(origin_id)
    .bind(fields.value)
    .bind(fields.carbs)
    .bind(fields.units)
    .bind(fields.meal_type)
    .bind(timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Removes the feed row(s) of an origin record. Zero matches is not an
/// error; the delete protocol tolerates an already-missing mirror.
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    origin_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM activities WHERE user_id = $1 AND origin_id = $2")
        .bind(user_id)
        .bind(origin_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}
