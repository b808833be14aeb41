use sea_orm::entity::prelude::*;

/// Account row as seen by the security core.
/// Business fields live elsewhere; only authentication state is mapped here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    /// `active` | `inactive`
    pub status: String,
    pub password_hash: String,
    pub pin_hash: Option<String>,
    pub security_question: Option<String>,
    pub security_answer_hash: Option<String>,
    pub blocked: bool,
    pub block_started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Bumped to invalidate every signed credential issued so far.
    pub token_generation: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::active_sessions::Entity")]
    ActiveSessions,
    #[sea_orm(has_many = "super::one_time_codes::Entity")]
    OneTimeCodes,
}

impl Related<super::active_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActiveSessions.def()
    }
}

impl Related<super::one_time_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OneTimeCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
