use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use gatekeep_auth_schema::{accounts, active_sessions, login_attempts, one_time_codes};

use crate::domain::repository::{
    AccountRepository, LoginAttemptRepository, OneTimeCodeRepository, SessionRepository,
};
use crate::domain::types::{
    Account, AccountStatus, ActionKind, ActiveSession, LoginAttempt, OneTimeCode,
};
use crate::error::AuthServiceError;

// ── Account repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAccountRepository {
    pub db: DatabaseConnection,
}

impl AccountRepository for DbAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find account by email")?;
        model.map(account_from_model).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthServiceError> {
        let model = accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find account by id")?;
        model.map(account_from_model).transpose()
    }

    async fn set_block_if_clear(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError> {
        // Conditional update: concurrent callers cannot restart a running block.
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Blocked, Expr::value(true))
            .col_expr(accounts::Column::BlockStartedAt, Expr::value(started_at))
            .filter(accounts::Column::Id.eq(id))
            .filter(accounts::Column::Blocked.eq(false))
            .exec(&self.db)
            .await
            .context("set account block")?;
        Ok(result.rows_affected > 0)
    }

    async fn clear_block(&self, id: Uuid) -> Result<(), AuthServiceError> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::Blocked, Expr::value(false))
            .col_expr(
                accounts::Column::BlockStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("clear account block")?;
        Ok(())
    }

    async fn bump_token_generation(&self, id: Uuid) -> Result<u64, AuthServiceError> {
        let updated = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::TokenGeneration,
                Expr::col(accounts::Column::TokenGeneration).add(1),
            )
            .filter(accounts::Column::Id.eq(id))
            .exec_with_returning(&self.db)
            .await
            .context("bump token generation")?;
        let model = updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("account {id} vanished during generation bump"))?;
        Ok(model.token_generation.max(0) as u64)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AuthServiceError> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::PasswordHash, Expr::value(hash))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("update password hash")?;
        Ok(())
    }
}

fn account_from_model(model: accounts::Model) -> Result<Account, AuthServiceError> {
    let status = model
        .status
        .parse::<AccountStatus>()
        .with_context(|| format!("account {} status", model.id))?;
    Ok(Account {
        id: model.id,
        email: model.email,
        role: model.role,
        status,
        password_hash: model.password_hash,
        pin_hash: model.pin_hash,
        security_question: model.security_question,
        security_answer_hash: model.security_answer_hash,
        blocked: model.blocked,
        block_started_at: model.block_started_at,
        token_generation: model.token_generation.max(0) as u64,
    })
}

// ── Login attempt repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbLoginAttemptRepository {
    pub db: DatabaseConnection,
}

impl LoginAttemptRepository for DbLoginAttemptRepository {
    async fn append(&self, attempt: &LoginAttempt) -> Result<(), AuthServiceError> {
        login_attempts::ActiveModel {
            id: Set(attempt.id),
            account_id: Set(attempt.account_id),
            email: Set(attempt.email.clone()),
            succeeded: Set(attempt.succeeded),
            client_ip: Set(attempt.client_ip.clone()),
            user_agent: Set(attempt.user_agent.clone()),
            failure_reason: Set(attempt.failure_reason.clone()),
            created_at: Set(attempt.created_at),
        }
        .insert(&self.db)
        .await
        .context("append login attempt")?;
        Ok(())
    }

    async fn last_success_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, AuthServiceError> {
        let model = login_attempts::Entity::find()
            .filter(login_attempts::Column::AccountId.eq(account_id))
            .filter(login_attempts::Column::Succeeded.eq(true))
            .filter(login_attempts::Column::CreatedAt.gt(since))
            .order_by_desc(login_attempts::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find last successful login")?;
        Ok(model.map(|m| m.created_at))
    }

    async fn count_failures_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        let count = login_attempts::Entity::find()
            .filter(login_attempts::Column::AccountId.eq(account_id))
            .filter(login_attempts::Column::Succeeded.eq(false))
            .filter(login_attempts::Column::CreatedAt.gt(since))
            .count(&self.db)
            .await
            .context("count failed logins")?;
        Ok(count)
    }
}

// ── One-time code repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOneTimeCodeRepository {
    pub db: DatabaseConnection,
}

impl OneTimeCodeRepository for DbOneTimeCodeRepository {
    async fn invalidate_active(
        &self,
        account_id: Uuid,
        action: ActionKind,
    ) -> Result<u64, AuthServiceError> {
        let result = one_time_codes::Entity::update_many()
            .col_expr(one_time_codes::Column::Used, Expr::value(true))
            .filter(one_time_codes::Column::AccountId.eq(account_id))
            .filter(one_time_codes::Column::Action.eq(action.as_str()))
            .filter(one_time_codes::Column::Used.eq(false))
            .exec(&self.db)
            .await
            .context("invalidate active codes")?;
        Ok(result.rows_affected)
    }

    async fn create(&self, code: &OneTimeCode) -> Result<(), AuthServiceError> {
        one_time_codes::ActiveModel {
            id: Set(code.id),
            account_id: Set(code.account_id),
            code: Set(code.code.clone()),
            action: Set(code.action.as_str().to_owned()),
            client_ip: Set(code.client_ip.clone()),
            user_agent: Set(code.user_agent.clone()),
            created_at: Set(code.created_at),
            expires_at: Set(code.expires_at),
            used: Set(code.used),
        }
        .insert(&self.db)
        .await
        .context("create one-time code")?;
        Ok(())
    }

    async fn find_latest(
        &self,
        account_id: Uuid,
        action: ActionKind,
        code: &str,
    ) -> Result<Option<OneTimeCode>, AuthServiceError> {
        let model = one_time_codes::Entity::find()
            .filter(one_time_codes::Column::AccountId.eq(account_id))
            .filter(one_time_codes::Column::Action.eq(action.as_str()))
            .filter(one_time_codes::Column::Code.eq(code))
            .order_by_desc(one_time_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find one-time code")?;
        model.map(code_from_model).transpose()
    }

    async fn has_unused(&self, account_id: Uuid, action: ActionKind) -> Result<bool, AuthServiceError> {
        let model = one_time_codes::Entity::find()
            .filter(one_time_codes::Column::AccountId.eq(account_id))
            .filter(one_time_codes::Column::Action.eq(action.as_str()))
            .filter(one_time_codes::Column::Used.eq(false))
            .one(&self.db)
            .await
            .context("find unused one-time code")?;
        Ok(model.is_some())
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, AuthServiceError> {
        let result = one_time_codes::Entity::update_many()
            .col_expr(one_time_codes::Column::Used, Expr::value(true))
            .filter(one_time_codes::Column::Id.eq(id))
            .filter(one_time_codes::Column::Used.eq(false))
            .exec(&self.db)
            .await
            .context("mark one-time code used")?;
        Ok(result.rows_affected > 0)
    }
}

fn code_from_model(model: one_time_codes::Model) -> Result<OneTimeCode, AuthServiceError> {
    let action = model
        .action
        .parse::<ActionKind>()
        .with_context(|| format!("one-time code {} action", model.id))?;
    Ok(OneTimeCode {
        id: model.id,
        account_id: model.account_id,
        code: model.code,
        action,
        client_ip: model.client_ip,
        user_agent: model.user_agent,
        created_at: model.created_at,
        expires_at: model.expires_at,
        used: model.used,
    })
}

// ── Session repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSessionRepository {
    pub db: DatabaseConnection,
}

impl SessionRepository for DbSessionRepository {
    async fn replace_for_account(&self, session: &ActiveSession) -> Result<u64, AuthServiceError> {
        let revoked = self
            .db
            .transaction::<_, u64, sea_orm::DbErr>(|txn| {
                let session = session.clone();
                Box::pin(async move {
                    // Row lock on the account serializes concurrent logins; the last
                    // transaction to take it leaves its own session behind.
                    accounts::Entity::find_by_id(session.account_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?;
                    let deleted = active_sessions::Entity::delete_many()
                        .filter(active_sessions::Column::AccountId.eq(session.account_id))
                        .exec(txn)
                        .await?;
                    insert_session(txn, &session).await?;
                    Ok(deleted.rows_affected)
                })
            })
            .await
            .context("replace account session")?;
        Ok(revoked)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ActiveSession>, AuthServiceError> {
        let model = active_sessions::Entity::find()
            .filter(active_sessions::Column::Token.eq(token))
            .one(&self.db)
            .await
            .context("find session by token")?;
        Ok(model.map(session_from_model))
    }

    async fn list_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ActiveSession>, AuthServiceError> {
        let models = active_sessions::Entity::find()
            .filter(active_sessions::Column::AccountId.eq(account_id))
            .order_by_desc(active_sessions::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list sessions by account")?;
        Ok(models.into_iter().map(session_from_model).collect())
    }

    async fn touch(&self, token: &str, at: DateTime<Utc>) -> Result<bool, AuthServiceError> {
        let result = active_sessions::Entity::update_many()
            .col_expr(active_sessions::Column::LastActivityAt, Expr::value(at))
            .filter(active_sessions::Column::Token.eq(token))
            .exec(&self.db)
            .await
            .context("touch session")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthServiceError> {
        let result = active_sessions::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("delete session")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool, AuthServiceError> {
        let result = active_sessions::Entity::delete_many()
            .filter(active_sessions::Column::Token.eq(token))
            .exec(&self.db)
            .await
            .context("delete session by token")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_by_account(&self, account_id: Uuid) -> Result<u64, AuthServiceError> {
        let result = active_sessions::Entity::delete_many()
            .filter(active_sessions::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await
            .context("delete sessions by account")?;
        Ok(result.rows_affected)
    }

    async fn delete_idle(&self, before: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let result = active_sessions::Entity::delete_many()
            .filter(active_sessions::Column::LastActivityAt.lt(before))
            .exec(&self.db)
            .await
            .context("delete idle sessions")?;
        Ok(result.rows_affected)
    }
}

async fn insert_session(
    txn: &DatabaseTransaction,
    session: &ActiveSession,
) -> Result<(), sea_orm::DbErr> {
    active_sessions::ActiveModel {
        id: Set(session.id),
        account_id: Set(session.account_id),
        token: Set(session.token.clone()),
        client_ip: Set(session.client_ip.clone()),
        user_agent: Set(session.user_agent.clone()),
        created_at: Set(session.created_at),
        last_activity_at: Set(session.last_activity_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn session_from_model(model: active_sessions::Model) -> ActiveSession {
    ActiveSession {
        id: model.id,
        account_id: model.account_id,
        token: model.token,
        client_ip: model.client_ip,
        user_agent: model.user_agent,
        created_at: model.created_at,
        last_activity_at: model.last_activity_at,
    }
}
