use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::dto::{CreateMealRequest, UpdateMealRequest};
use crate::mirror::{self, MirrorFields};

#[derive(Debug, Clone, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub calories: f64,
    pub quantity: f64,
    pub photo: Option<String>,
    pub timestamp: OffsetDateTime,
}

const MEAL_COLUMNS: &str =
    "id, user_id, name, description, carbs, protein, fat, calories, quantity, photo, timestamp";

impl Meal {
    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        limit: i64,
    ) -> anyhow::Result<Vec<Meal>> {
        let rows = sqlx::query_as::<_, Meal>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp <= $3)
            ORDER BY timestamp DESC
            LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Meal>> {
        let row = sqlx::query_as::<_, Meal>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Inserts the meal and its feed mirror (type 'meal', value = calories)
    /// in one transaction. Quantity defaults to 1.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        payload: CreateMealRequest,
    ) -> anyhow::Result<Meal> {
        let timestamp = payload.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let meal_type = payload.meal_type.unwrap_or_else(|| "other".to_string());
        let mut tx = db.begin().await?;

        let meal = sqlx::query_as::<_, Meal>(&format!(
            r#"
            INSERT INTO meals (user_id, name, description, carbs, protein, fat, calories,
                               quantity, photo, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(payload.name.unwrap_or_default())
        .bind(&payload.description)
        .bind(payload.carbs.unwrap_or_default())
        .bind(payload.protein.unwrap_or_default())
        .bind(payload.fat.unwrap_or_default())
        .bind(payload.calories.unwrap_or_default())
        .bind(payload.quantity.unwrap_or(1.0))
        .bind(&payload.photo)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        mirror::insert(
            &mut tx,
            user_id,
            "meal",
            meal.id,
            meal.timestamp,
            MirrorFields {
                value: Some(meal.calories),
                carbs: Some(meal.carbs),
                meal_type: Some(meal_type),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;
        Ok(meal)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        patch: UpdateMealRequest,
    ) -> anyhow::Result<Option<Meal>> {
        let Some(current) = Self::find(db, user_id, id).await? else {
            return Ok(None);
        };

        let name = patch.name.value_or(current.name.clone());
        let description = patch.description.resolve(current.description.clone());
        let carbs = patch.carbs.value_or(current.carbs);
        let protein = patch.protein.value_or(current.protein);
        let fat = patch.fat.value_or(current.fat);
        let calories = patch.calories.value_or(current.calories);
        let quantity = patch.quantity.value_or(current.quantity);
        let photo = patch.photo.resolve(current.photo.clone());
        let timestamp = patch.timestamp.value_or(current.timestamp);

        let mirror_changed = calories != current.calories
            || carbs != current.carbs
            || timestamp != current.timestamp;

        let mut tx = db.begin().await?;
        let updated = sqlx::query_as::<_, Meal>(&format!(
            r#"
            UPDATE meals
            SET name = $3, description = $4, carbs = $5, protein = $6, fat = $7,
                calories = $8, quantity = $9, photo = $10, timestamp = $11
            WHERE id = $1 AND user_id = $2
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&name)
        .bind(&description)
        .bind(carbs)
        .bind(protein)
        .bind(fat)
        .bind(calories)
        .bind(quantity)
        .bind(&photo)
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
                    value: Some(calories),
                    carbs: Some(carbs),
                    ..Default::default()
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        if Self::find(db, user_id, id).await?.is_none() {
            return Ok(false);
        }

        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        mirror::delete(&mut tx, user_id, id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
