//! SeaORM-backed notification storage (SQLite or PostgreSQL).

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::entity::{self, Column, Entity};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{Notification, PageRequest};
use crate::repository::NotificationRepository;

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS notifications (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BIGINT NOT NULL,
        message TEXT NOT NULL,
        task_id BIGINT NOT NULL,
        event_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_created
        ON notifications (user_id, created_at DESC)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        user_id BIGINT NOT NULL,
        message TEXT NOT NULL,
        task_id BIGINT NOT NULL,
        event_type TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_created
        ON notifications (user_id, created_at DESC)",
];

pub struct SqlNotificationRepository {
    db: DatabaseConnection,
}

impl SqlNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the pool described by `config`. The schema is created by `init`.
    pub async fn connect(config: StorageConfig) -> NotificationResult<Self> {
        let url = config.url.clone();
        let db = Database::connect(config.into_connect_options()).await?;
        info!(url = %url, "Connected to notification storage");
        Ok(Self::new(db))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn schema(&self) -> NotificationResult<&'static [&'static str]> {
        match self.db.get_database_backend() {
            DatabaseBackend::Sqlite => Ok(SQLITE_SCHEMA),
            DatabaseBackend::Postgres => Ok(POSTGRES_SCHEMA),
            other => Err(NotificationError::Internal(format!(
                "Unsupported notification storage backend: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn init(&self) -> NotificationResult<()> {
        for statement in self.schema()? {
            self.db.execute_unprepared(statement).await?;
        }
        info!("Notification storage initialized");
        Ok(())
    }

    async fn insert(&self, notification: &Notification) -> NotificationResult<()> {
        let active_model: entity::ActiveModel = notification.clone().into();
        Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await?;

        debug!(notification_id = %notification.id, "Inserted notification");
        Ok(())
    }

    async fn query_by_user(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> NotificationResult<Vec<Notification>> {
        let models = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_read(&self, id: Uuid) -> NotificationResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn mark_all_read(&self, user_id: i64) -> NotificationResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn close(&self) -> NotificationResult<()> {
        self.db.clone().close().await?;
        info!("Notification storage closed");
        Ok(())
    }
}
