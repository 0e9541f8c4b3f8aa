use crate::database::error::DatabaseError;
use crate::database::repository::ContactMessageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Message left through the public contact form
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

#[derive(Clone)]
pub struct ContactMessageRepository {
    pool: PgPool,
}

impl ContactMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactMessageStore for ContactMessageRepository {
    async fn create(&self, message: NewContactMessage) -> Result<ContactMessage, DatabaseError> {
        sqlx::query_as::<_, ContactMessage>(
            "INSERT INTO contact_messages (name, email, phone, message)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, email, phone, message, created_at",
        )
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.phone)
        .bind(&message.message)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn list(&self) -> Result<Vec<ContactMessage>, DatabaseError> {
        sqlx::query_as::<_, ContactMessage>(
            "SELECT id, name, email, phone, message, created_at
             FROM contact_messages
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contact_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
