use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::Notification;

/// Sea-ORM Entity for the notifications table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub task_id: i64,
    pub event_type: String,
    pub created_at: DateTimeUtc,
    pub is_read: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            message: model.message,
            task_id: model.task_id,
            event_type: model.event_type,
            created_at: model.created_at,
            is_read: model.is_read,
        }
    }
}

impl From<Notification> for ActiveModel {
    fn from(notification: Notification) -> Self {
        ActiveModel {
            id: Set(notification.id),
            user_id: Set(notification.user_id),
            message: Set(notification.message),
            task_id: Set(notification.task_id),
            event_type: Set(notification.event_type),
            created_at: Set(notification.created_at),
            is_read: Set(notification.is_read),
        }
    }
}
