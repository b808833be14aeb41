use sea_orm::entity::prelude::*;

/// Append-only audit log of every login attempt. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "login_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `None` when the identifier did not resolve to an account.
    pub account_id: Option<Uuid>,
    pub email: String,
    pub succeeded: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
