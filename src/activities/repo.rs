use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::activities::dto::{CreateActivityRequest, UpdateActivityRequest};

#[derive(Debug, Clone, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub value: Option<f64>,
    pub meal_type: Option<String>,
    pub carbs: Option<f64>,
    pub units: Option<f64>,
    pub origin_id: Option<Uuid>,
    pub timestamp: OffsetDateTime,
}

const ACTIVITY_COLUMNS: &str =
    "id, user_id, type, value, meal_type, carbs, units, origin_id, timestamp";

impl Activity {
    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        kind: Option<&str>,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        limit: i64,
    ) -> anyhow::Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(&format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
            FROM activities
            WHERE user_id = $1
              AND ($2::text IS NULL OR type = $2)
              AND ($3::timestamptz IS NULL OR timestamp >= $3)
              AND ($4::timestamptz IS NULL OR timestamp <= $4)
            ORDER BY timestamp DESC
            LIMIT $5
            "#
        ))
        .bind(user_id)
        .bind(kind)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Activity>> {
        let row = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Inserts a feed entry. An 'insulin' entry carrying units is mirroring
    /// in the inverse direction: a companion InsulinDose row is created in
    /// the same transaction and referenced through `origin_id`.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        kind: &str,
        payload: CreateActivityRequest,
    ) -> anyhow::Result<Activity> {
        let timestamp = payload.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let mut tx = db.begin().await?;

        let origin_id = if kind == "insulin" && payload.units.is_some() {
            let dose_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO insulin_doses (user_id, units, glucose_level, carb_intake, timestamp)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(user_id)
            .bind(payload.units)
            .bind(payload.value)
            .bind(payload.carbs)
            .bind(timestamp)
            .fetch_one(&mut *tx)
            .await?;
            Some(dose_id)
        } else {
            None
        };

        let activity = sqlx::query_as::<_, Activity>(&format!(
            r#"
            INSERT INTO activities (user_id, type, value, meal_type, carbs, units, origin_id, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(kind)
        .bind(payload.value)
        .bind(&payload.meal_type)
        .bind(payload.carbs)
        .bind(payload.units)
        .bind(origin_id)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(activity)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        patch: UpdateActivityRequest,
    ) -> anyhow::Result<Option<Activity>> {
        let Some(current) = Self::find(db, user_id, id).await? else {
            return Ok(None);
        };

        let value = patch.value.resolve(current.value);
        let meal_type = patch.meal_type.resolve(current.meal_type.clone());
        let carbs = patch.carbs.resolve(current.carbs);
        let units = patch.units.resolve(current.units);
        let timestamp = patch.timestamp.value_or(current.timestamp);

        let updated = sqlx::query_as::<_, Activity>(&format!(
            r#"
            UPDATE activities
            SET value = $3, meal_type = $4, carbs = $5, units = $6, timestamp = $7
            WHERE id = $1 AND user_id = $2
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(value)
        .bind(&meal_type)
        .bind(carbs)
        .bind(units)
        .bind(timestamp)
        .fetch_one(db)
        .await?;

        Ok(Some(updated))
    }

    /// Deletes a feed entry; an insulin entry that spawned a companion dose
    /// cascades to it inside one transaction.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let Some(activity) = Self::find(db, user_id, id).await? else {
            return Ok(false);
        };

        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM activities WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if activity.kind == "insulin" {
            if let Some(origin_id) = activity.origin_id {
                // Zero matches is fine; the companion may be a prediction.
                sqlx::query("DELETE FROM insulin_doses WHERE id = $1 AND user_id = $2")
                    .bind(origin_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }
}
