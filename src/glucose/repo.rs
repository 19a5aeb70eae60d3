use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::glucose::dto::UpdateReadingRequest;
use crate::mirror::{self, MirrorFields};

#[derive(Debug, Clone, FromRow)]
pub struct GlucoseReading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub value: f64,
    pub notes: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl GlucoseReading {
    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        limit: i64,
    ) -> anyhow::Result<Vec<GlucoseReading>> {
        let rows = sqlx::query_as::<_, GlucoseReading>(
            r#"
            SELECT id, user_id, value, notes, timestamp
            FROM glucose_readings
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp <= $3)
            ORDER BY timestamp DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<GlucoseReading>> {
        let row = sqlx::query_as::<_, GlucoseReading>(
            r#"
            SELECT id, user_id, value, notes, timestamp
            FROM glucose_readings
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Inserts the reading and its feed mirror in one transaction.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        value: f64,
        notes: Option<String>,
        timestamp: Option<OffsetDateTime>,
    ) -> anyhow::Result<GlucoseReading> {
        let timestamp = timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let mut tx = db.begin().await?;

        let reading = sqlx::query_as::<_, GlucoseReading>(
            r#"
            INSERT INTO glucose_readings (user_id, value, notes, timestamp)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, value, notes, timestamp
            "#,
        )
        .bind(user_id)
        .bind(value)
        .bind(&notes)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        mirror::insert(
            &mut tx,
            user_id,
            "glucose",
            reading.id,
            reading.timestamp,
            MirrorFields {
                value: Some(reading.value),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;
        Ok(reading)
    }

    /// Sparse-merges the patch and keeps the feed mirror in step when the
    /// value or the timestamp changed.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        patch: UpdateReadingRequest,
    ) -> anyhow::Result<Option<GlucoseReading>> {
        let Some(current) = Self::find(db, user_id, id).await? else {
            return Ok(None);
        };

        let value = patch.value.value_or(current.value);
        let notes = patch.notes.resolve(current.notes.clone());
        let timestamp = patch.timestamp.value_or(current.timestamp);
        let mirror_changed = value != current.value || timestamp != current.timestamp;

        let mut tx = db.begin().await?;
        let updated = sqlx::query_as::<_, GlucoseReading>(
            r#"
            UPDATE glucose_readings
            SET value = $3, notes = $4, timestamp = $5
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, value, notes, timestamp
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(value)
        .bind(&notes)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        if mirror_changed {
            mirror::update(
                &mut tx,
                user_id,
                id,
                timestamp,
                MirrorFields {
                    value: Some(value),
                    ..Default::default()
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Removes the reading and its mirror atomically; returns false when the
    /// reading does not exist for this user.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        if Self::find(db, user_id, id).await?.is_none() {
            return Ok(false);
        }

        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM glucose_readings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        mirror::delete(&mut tx, user_id, id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
