use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. The glucose target range lives directly on
/// the user row; there is no separate target table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_day: i32,
    pub birth_month: i32,
    pub birth_year: i32,
    pub weight: f64,
    pub height: f64,
    pub glucose_profile: String,
    pub min_target_glucose: f64,
    pub max_target_glucose: f64,
    pub profile_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub birth_day: i32,
    pub birth_month: i32,
    pub birth_year: i32,
    pub weight: f64,
    pub height: f64,
    pub glucose_profile: &'a str,
    pub min_target_glucose: f64,
    pub max_target_glucose: f64,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, birth_day, \
    birth_month, birth_year, weight, height, glucose_profile, min_target_glucose, \
    max_target_glucose, profile_image, created_at, updated_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, birth_day,
                               birth_month, birth_year, weight, height, glucose_profile,
                               min_target_glucose, max_target_glucose)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.birth_day)
        .bind(new.birth_month)
        .bind(new.birth_year)
        .bind(new.weight)
        .bind(new.height)
        .bind(new.glucose_profile)
        .bind(new.min_target_glucose)
        .bind(new.max_target_glucose)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Persist the merged profile. The caller applies the sparse merge first;
    /// this writes the full set of profile columns.
    pub async fn update_profile(&self, db: &PgPool) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
                birth_day = $6, birth_month = $7, birth_year = $8, weight = $9,
                height = $10, glucose_profile = $11, profile_image = $12,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(self.birth_day)
        .bind(self.birth_month)
        .bind(self.birth_year)
        .bind(self.weight)
        .bind(self.height)
        .bind(&self.glucose_profile)
        .bind(&self.profile_image)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_target_range(
        db: &PgPool,
        user_id: Uuid,
        min_target: f64,
        max_target: f64,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET min_target_glucose = $2, max_target_glucose = $3, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(min_target)
        .bind(max_target)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Delete the account and every owned row in one transaction.
    pub async fn delete_cascade(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM glucose_readings WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM activities WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM insulin_doses WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM insulin_predictions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM meals WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
