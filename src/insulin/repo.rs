use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::insulin::dto::{CreateDoseRequest, PredictionRequest, UpdateDoseRequest};
use crate::mirror::{self, MirrorFields};
use crate::predict::DoseRecommendation;

#[derive(Debug, Clone, FromRow)]
pub struct InsulinDose {
    pub id: Uuid,
    pub user_id: Uuid,
    pub units: f64,
    pub glucose_level: Option<f64>,
    pub carb_intake: Option<f64>,
    pub timestamp: OffsetDateTime,
}

const DOSE_COLUMNS: &str = "id, user_id, units, glucose_level, carb_intake, timestamp";

impl InsulinDose {
    fn mirror_fields(units: f64, glucose_level: Option<f64>, carbs: Option<f64>) -> MirrorFields {
        MirrorFields {
            value: glucose_level,
            carbs,
            units: Some(units),
            ..Default::default()
        }
    }

    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        limit: i64,
    ) -> anyhow::Result<Vec<InsulinDose>> {
        let rows = sqlx::query_as::<_, InsulinDose>(&format!(
            r#"
            SELECT {DOSE_COLUMNS}
            FROM insulin_doses
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

    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<InsulinDose>> {
        let row = sqlx::query_as::<_, InsulinDose>(&format!(
            "SELECT {DOSE_COLUMNS} FROM insulin_doses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Inserts the dose and its feed mirror in one transaction.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        units: f64,
        payload: CreateDoseRequest,
    ) -> anyhow::Result<InsulinDose> {
        let timestamp = payload.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let mut tx = db.begin().await?;

        let dose = sqlx::query_as::<_, InsulinDose>(&format!(
            r#"
            INSERT INTO insulin_doses (user_id, units, glucose_level, carb_intake, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {DOSE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(units)
        .bind(payload.glucose_level)
        .bind(payload.carb_intake)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        mirror::insert(
            &mut tx,
            user_id,
            "insulin",
            dose.id,
            dose.timestamp,
            Self::mirror_fields(dose.units, dose.glucose_level, dose.carb_intake),
        )
        .await?;

        tx.commit().await?;
        Ok(dose)
    }

    /// Sparse-merges the patch and keeps the feed mirror in step when a
    /// mirrored field or the timestamp changed.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        patch: UpdateDoseRequest,
    ) -> anyhow::Result<Option<InsulinDose>> {
        let Some(current) = Self::find(db, user_id, id).await? else {
            return Ok(None);
        };

        let units = patch.units.value_or(current.units);
        let glucose_level = patch.glucose_level.resolve(current.glucose_level);
        let carb_intake = patch.carb_intake.resolve(current.carb_intake);
        let timestamp = patch.timestamp.value_or(current.timestamp);
        let mirror_changed = units != current.units
            || glucose_level != current.glucose_level
            || carb_intake != current.carb_intake
            || timestamp != current.timestamp;

        let mut tx = db.begin().await?;
        let updated = sqlx::query_as::<_, InsulinDose>(&format!(
            r#"
            UPDATE insulin_doses
            SET units = $3, glucose_level = $4, carb_intake = $5, timestamp = $6
            WHERE id = $1 AND user_id = $2
            RETURNING {DOSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(units)
        .bind(glucose_level)
        .bind(carb_intake)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;

        if mirror_changed {
            mirror::update(
                &mut tx,
                user_id,
                id,
                timestamp,
                Self::mirror_fields(units, glucose_level, carb_intake),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Removes the dose and its mirror atomically; returns false when the
    /// dose does not exist for this user.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        if Self::find(db, user_id, id).await?.is_none() {
            return Ok(false);
        }

        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM insulin_doses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        mirror::delete(&mut tx, user_id, id).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InsulinPrediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: OffsetDateTime,
    pub cgm_prev: Vec<f64>,
    pub glucose_objective: Option<f64>,
    pub carbs: f64,
    pub insulin_on_board: Option<f64>,
    pub sleep_level: Option<f64>,
    pub work_level: Option<f64>,
    pub activity_level: Option<f64>,
    pub recommended_dose: f64,
    pub correction_dose: f64,
    pub meal_dose: f64,
    pub activity_adjustment: f64,
    pub time_adjustment: f64,
    pub apply_dose: Option<f64>,
    pub cgm_post: Vec<f64>,
}

const PREDICTION_COLUMNS: &str = "id, user_id, date, cgm_prev, glucose_objective, carbs, \
     insulin_on_board, sleep_level, work_level, activity_level, recommended_dose, \
     correction_dose, meal_dose, activity_adjustment, time_adjustment, apply_dose, cgm_post";

impl InsulinPrediction {
    pub async fn list(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<InsulinPrediction>> {
        let rows = sqlx::query_as::<_, InsulinPrediction>(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM insulin_predictions
            WHERE user_id = $1
            ORDER BY date DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Stores the prediction together with its 'insulin' feed mirror. The
    /// mirror carries the recommended dose as its units so the feed reads
    /// like a logged dose.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        request: PredictionRequest,
        date: OffsetDateTime,
        carbs: f64,
        recommendation: &DoseRecommendation,
    ) -> anyhow::Result<InsulinPrediction> {
        let mut tx = db.begin().await?;

        let prediction = sqlx::query_as::<_, InsulinPrediction>(&format!(
            r#"
            INSERT INTO insulin_predictions
                (user_id, date, cgm_prev, glucose_objective, carbs, insulin_on_board,
                 sleep_level, work_level, activity_level, recommended_dose,
                 correction_dose, meal_dose, activity_adjustment, time_adjustment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PREDICTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(date)
        .bind(&request.cgm_prev)
        .bind(request.glucose_objective)
        .bind(carbs)
        .bind(request.insulin_on_board)
        .bind(request.sleep_level)
        .bind(request.work_level)
        .bind(request.activity_level)
        .bind(recommendation.total)
        .bind(recommendation.breakdown.correction_dose)
        .bind(recommendation.breakdown.meal_dose)
        .bind(recommendation.breakdown.activity_adjustment)
        .bind(recommendation.breakdown.time_adjustment)
        .fetch_one(&mut *tx)
        .await?;

        mirror::insert(
            &mut tx,
            user_id,
            "insulin",
            prediction.id,
            prediction.date,
            MirrorFields {
                value: Some(prediction.recommended_dose),
                units: Some(prediction.recommended_dose),
                carbs: Some(prediction.carbs),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;
        Ok(prediction)
    }

    /// Records what the user actually injected and the post-dose CGM trace.
    pub async fn set_result(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        apply_dose: Option<f64>,
        cgm_post: Vec<f64>,
    ) -> anyhow::Result<Option<InsulinPrediction>> {
        let row = sqlx::query_as::<_, InsulinPrediction>(&format!(
            r#"
            UPDATE insulin_predictions
            SET apply_dose = COALESCE($3, apply_dose),
                cgm_post = CASE WHEN cardinality($4::float8[]) > 0 THEN $4 ELSE cgm_post END
            WHERE id = $1 AND user_id = $2
            RETURNING {PREDICTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(apply_dose)
        .bind(&cgm_post)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Removes the prediction and its mirror atomically; returns false when
    /// it does not exist for this user.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM insulin_predictions WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM insulin_predictions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        mirror::delete(&mut tx, user_id, id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
