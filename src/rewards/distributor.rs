//! Reward distribution.
//!
//! Pays credits, XP and skill-level changes to every ranked participant of a
//! completed tournament in one transaction. Idempotency is carried by the
//! `rewards_distributed` flag on the locked tournament row: a repeat call is
//! a no-op, and a forced call first reverses the previous distribution using
//! the per-participant applied amounts recorded at payout time.

use super::errors::{RewardError, RewardResult};
use super::models::{DistributionRecord, DistributionSummary, SkillRating};
use crate::audit;
use crate::ledger::{CreditLedger, EntryRefs, EntryType};
use crate::tournament::lifecycle;
use crate::tournament::models::{Actor, RewardConfig, TournamentId, TournamentStatus, UserId};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Reward distributor
#[derive(Clone)]
pub struct RewardDistributor {
    pool: Arc<PgPool>,
    ledger: CreditLedger,
}

impl RewardDistributor {
    /// Create a new reward distributor
    pub fn new(pool: Arc<PgPool>, ledger: CreditLedger) -> Self {
        Self { pool, ledger }
    }

    /// Distribute rewards for a completed tournament.
    ///
    /// A second call without `force` returns a no-op summary. With `force`,
    /// the previous distribution is reversed exactly (stored applied deltas,
    /// not current configuration) and rewards are paid out fresh.
    ///
    /// Retried once internally on transient store contention.
    pub async fn distribute(
        &self,
        tournament_id: TournamentId,
        force: bool,
        actor: Actor,
    ) -> RewardResult<DistributionSummary> {
        match self.try_distribute(tournament_id, force, actor).await {
            Err(RewardError::ConcurrentConflict) => {
                log::warn!("distribute(t={tournament_id}) hit contention, retrying once");
                self.try_distribute(tournament_id, force, actor).await
            }
            other => other,
        }
    }

    async fn try_distribute(
        &self,
        tournament_id: TournamentId,
        force: bool,
        actor: Actor,
    ) -> RewardResult<DistributionSummary> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.status != TournamentStatus::Completed {
            return Err(RewardError::NotCompleted(tournament.status));
        }
        if tournament.rewards_distributed && !force {
            log::info!("Rewards for tournament {tournament_id} already distributed, skipping");
            return Ok(DistributionSummary::noop(tournament_id));
        }
        tournament
            .reward_config
            .validate()
            .map_err(RewardError::Configuration)?;

        let ranking = sqlx::query(
            "SELECT user_id, rank FROM ranking_entries WHERE tournament_id = $1 ORDER BY rank",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?;
        if ranking.is_empty() {
            return Err(RewardError::NotFinalized(tournament_id));
        }

        let reversed_previous = if tournament.rewards_distributed {
            self.reverse_previous(&mut tx, tournament_id).await?
        } else {
            0
        };

        let distribution_id = Uuid::new_v4();
        let field = ranking.len();
        let config = &tournament.reward_config;
        let mut credits_paid = 0i64;
        let mut xp_granted = 0i64;

        for row in &ranking {
            let user_id: UserId = row.get("user_id");
            let rank = row.get::<i32, _>("rank") as u32;
            let tier = config.tier_for_rank(rank);

            ensure_account(&mut tx, user_id).await?;
            if tier.credits > 0 {
                self.ledger
                    .credit(
                        &mut tx,
                        user_id,
                        tier.credits,
                        EntryType::RewardPayout,
                        EntryRefs::distribution(tournament_id, distribution_id),
                        Some(format!("Rank {rank} reward for tournament {tournament_id}")),
                    )
                    .await?;
                credits_paid += tier.credits;
            }
            if tier.xp > 0 {
                self.ledger.add_xp(&mut tx, user_id, tier.xp).await?;
                xp_granted += tier.xp;
            }

            let deltas = apply_skill_updates(&mut tx, user_id, rank, field, config).await?;
            let deltas_json = serde_json::to_value(&deltas)
                .map_err(|e| RewardError::Configuration(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO reward_distributions
                    (distribution_id, tournament_id, user_id, credits, xp, skill_deltas)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(distribution_id)
            .bind(tournament_id)
            .bind(user_id)
            .bind(tier.credits)
            .bind(tier.xp)
            .bind(deltas_json)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE tournaments SET rewards_distributed = TRUE WHERE id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "rewards.distribute",
            Some(tournament_id),
            json!({
                "distribution_id": distribution_id,
                "participants": field,
                "credits_paid": credits_paid,
                "xp_granted": xp_granted,
                "reversed_previous": reversed_previous,
                "force": force,
            }),
        )
        .await;
        tx.commit().await?;

        log::info!(
            "Distributed rewards for tournament {tournament_id}: \
             {credits_paid} credits, {xp_granted} xp across {field} participants"
        );
        Ok(DistributionSummary {
            tournament_id,
            distribution_id: Some(distribution_id),
            applied: true,
            reversed_previous,
            participants: field,
            credits_paid,
            xp_granted,
        })
    }

    /// Reverse every live record of the previous distribution using the
    /// amounts applied then.
    async fn reverse_previous(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tournament_id: TournamentId,
    ) -> RewardResult<usize> {
        let rows = sqlx::query(
            "SELECT id, distribution_id, user_id, credits, xp, skill_deltas
             FROM reward_distributions
             WHERE tournament_id = $1 AND NOT reversed
             ORDER BY id
             FOR UPDATE",
        )
        .bind(tournament_id)
        .fetch_all(&mut **tx)
        .await?;

        for row in &rows {
            let user_id: UserId = row.get("user_id");
            let credits: i64 = row.get("credits");
            let xp: i64 = row.get("xp");
            let distribution_id: Uuid = row.get("distribution_id");
            let deltas: BTreeMap<String, f64> = serde_json::from_value(row.get("skill_deltas"))
                .map_err(|e| RewardError::Configuration(format!("stored skill_deltas: {e}")))?;

            if credits > 0 {
                self.ledger
                    .reverse(
                        tx,
                        user_id,
                        credits,
                        EntryRefs::distribution(tournament_id, distribution_id),
                        Some(format!("Reversal of distribution for tournament {tournament_id}")),
                    )
                    .await?;
            }
            if xp > 0 {
                self.ledger.add_xp(tx, user_id, -xp).await?;
            }
            for (skill, delta) in &deltas {
                // Applied deltas are post-clamp, so subtracting restores the
                // exact prior level without re-clamping
                sqlx::query(
                    "UPDATE skill_ratings SET level = level - $1, updated_at = NOW()
                     WHERE user_id = $2 AND skill = $3",
                )
                .bind(delta)
                .bind(user_id)
                .bind(skill)
                .execute(&mut **tx)
                .await?;
            }

            sqlx::query("UPDATE reward_distributions SET reversed = TRUE WHERE id = $1")
                .bind(row.get::<i64, _>("id"))
                .execute(&mut **tx)
                .await?;
        }

        log::info!(
            "Reversed {} distribution records for tournament {tournament_id}",
            rows.len()
        );
        Ok(rows.len())
    }

    /// All distribution records of a tournament, newest run first
    pub async fn distributions(
        &self,
        tournament_id: TournamentId,
    ) -> RewardResult<Vec<DistributionRecord>> {
        let rows = sqlx::query(
            "SELECT distribution_id, tournament_id, user_id, credits, xp,
                    skill_deltas, reversed, created_at
             FROM reward_distributions
             WHERE tournament_id = $1
             ORDER BY id DESC",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter()
            .map(|row| {
                let skill_deltas = serde_json::from_value(row.get("skill_deltas"))
                    .map_err(|e| RewardError::Configuration(format!("stored skill_deltas: {e}")))?;
                Ok(DistributionRecord {
                    distribution_id: row.get("distribution_id"),
                    tournament_id: row.get("tournament_id"),
                    user_id: row.get("user_id"),
                    credits: row.get("credits"),
                    xp: row.get("xp"),
                    skill_deltas,
                    reversed: row.get("reversed"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect()
    }

    /// A user's current skill ratings
    pub async fn skill_ratings(&self, user_id: UserId) -> RewardResult<Vec<SkillRating>> {
        let rows = sqlx::query(
            "SELECT user_id, skill, level, updated_at FROM skill_ratings
             WHERE user_id = $1 ORDER BY skill",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .iter()
            .map(|row| SkillRating {
                user_id: row.get("user_id"),
                skill: row.get("skill"),
                level: row.get("level"),
                updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
            })
            .collect())
    }
}

/// Apply the placement-curve skill updates for one participant.
///
/// Each configured skill moves by `weight * factor(rank)`, clamped into the
/// configured bounds; the returned map holds the post-clamp deltas that
/// actually landed.
async fn apply_skill_updates(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    rank: u32,
    field: usize,
    config: &RewardConfig,
) -> RewardResult<BTreeMap<String, f64>> {
    let factor = config.curve.factor(rank as usize, field);
    let mut deltas = BTreeMap::new();

    for reward in &config.skills {
        let current = sqlx::query(
            "SELECT level FROM skill_ratings WHERE user_id = $1 AND skill = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(&reward.skill)
        .fetch_optional(&mut **tx)
        .await?
        .map(|row| row.get::<f64, _>("level"))
        .unwrap_or(config.bounds.default_level);

        let target = config.bounds.clamp(current + reward.weight * factor);
        let applied = target - current;

        sqlx::query(
            r#"
            INSERT INTO skill_ratings (user_id, skill, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, skill)
            DO UPDATE SET level = EXCLUDED.level, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&reward.skill)
        .bind(target)
        .execute(&mut **tx)
        .await?;

        deltas.insert(reward.skill.clone(), applied);
    }
    Ok(deltas)
}

/// Participants of free tournaments may have never touched the ledger
async fn ensure_account(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO credit_accounts (user_id, balance) VALUES ($1, 0)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
