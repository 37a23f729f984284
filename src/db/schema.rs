//! Idempotent schema bootstrap.
//!
//! Development and test environments call [`ensure_schema`] once at startup;
//! production deployments run the same statements through their migration
//! tooling. Every statement is `IF NOT EXISTS` so repeated calls are no-ops.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tournaments (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        format TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        max_players INTEGER NOT NULL,
        enrollment_cost BIGINT NOT NULL,
        campus_ids BIGINT[] NOT NULL DEFAULT '{}',
        number_of_rounds INTEGER,
        game_config JSONB NOT NULL,
        reward_config JSONB NOT NULL,
        rewards_distributed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        started_at TIMESTAMP,
        completed_at TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enrollments (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        user_id BIGINT NOT NULL,
        status TEXT NOT NULL DEFAULT 'approved',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        approved_at TIMESTAMP,
        withdrawn_at TIMESTAMP
    )
    "#,
    // The authoritative duplicate guard: one active enrollment per
    // (tournament, user), enforced by the store rather than application reads.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS enrollments_active_unique
        ON enrollments (tournament_id, user_id) WHERE is_active
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credit_accounts (
        user_id BIGINT PRIMARY KEY,
        balance BIGINT NOT NULL DEFAULT 0,
        xp BIGINT NOT NULL DEFAULT 0,
        updated_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        entry_type TEXT NOT NULL,
        amount BIGINT NOT NULL,
        balance_after BIGINT NOT NULL,
        tournament_id BIGINT,
        enrollment_id BIGINT,
        distribution_id UUID,
        idempotency_key TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        campus_id BIGINT NOT NULL,
        field_index INTEGER NOT NULL,
        scheduled_at TIMESTAMP NOT NULL,
        phase TEXT NOT NULL,
        round_number INTEGER NOT NULL,
        bracket_slot INTEGER,
        participants BIGINT[] NOT NULL,
        auto_generated BOOLEAN NOT NULL DEFAULT TRUE,
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        forfeited BOOLEAN NOT NULL DEFAULT FALSE,
        result JSONB
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ranking_entries (
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        user_id BIGINT NOT NULL,
        rank INTEGER NOT NULL,
        points BIGINT NOT NULL DEFAULT 0,
        wins INTEGER NOT NULL DEFAULT 0,
        draws INTEGER NOT NULL DEFAULT 0,
        losses INTEGER NOT NULL DEFAULT 0,
        goals_for BIGINT NOT NULL DEFAULT 0,
        goals_against BIGINT NOT NULL DEFAULT 0,
        average_placement DOUBLE PRECISION,
        finalized_at TIMESTAMP NOT NULL DEFAULT NOW(),
        PRIMARY KEY (tournament_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS skill_ratings (
        user_id BIGINT NOT NULL,
        skill TEXT NOT NULL,
        level DOUBLE PRECISION NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
        PRIMARY KEY (user_id, skill)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reward_distributions (
        id BIGSERIAL PRIMARY KEY,
        distribution_id UUID NOT NULL,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        user_id BIGINT NOT NULL,
        credits BIGINT NOT NULL,
        xp BIGINT NOT NULL,
        skill_deltas JSONB NOT NULL,
        reversed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id BIGSERIAL PRIMARY KEY,
        actor_id BIGINT,
        action TEXT NOT NULL,
        tournament_id BIGINT,
        detail JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Create all engine tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
