use crate::db_error;
use async_trait::async_trait;
use feira_core::identity::{CallerProfile, PartyDirectory, Role};
use feira_core::{CoreError, CoreResult};
use feira_shared::pii::Masked;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
    full_name: String,
    email: Option<String>,
    city_id: Option<i64>,
    district_id: Option<i64>,
    street: Option<String>,
    number: Option<String>,
    landmark: Option<String>,
    whatsapp: Option<String>,
    is_available: bool,
    pending_balance: Decimal,
    payment_token: Option<String>,
}

impl UserRow {
    fn into_profile(self) -> CoreResult<CallerProfile> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| CoreError::Integrity(format!("user {} has unknown role", self.id)))?;
        Ok(CallerProfile {
            id: self.id,
            role,
            full_name: self.full_name,
            email: self.email,
            city_id: self.city_id,
            district_id: self.district_id,
            street: self.street,
            number: self.number,
            landmark: self.landmark,
            whatsapp: self.whatsapp,
            is_available: self.is_available,
            pending_balance: self.pending_balance,
            payment_token: self.payment_token.map(Masked),
        })
    }
}

#[async_trait]
impl PartyDirectory for PgDirectory {
    async fn load_caller(&self, id: Uuid) -> CoreResult<Option<CallerProfile>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, role, full_name, email, city_id, district_id, street, number,
                   landmark, whatsapp, is_available, pending_balance, payment_token
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(UserRow::into_profile).transpose()
    }
}
