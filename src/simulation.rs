//! Skill-weighted match outcome simulator.
//!
//! Produces plausible scorelines and round placements from the participants'
//! current skill levels and the tournament's game configuration. Demos and
//! tests drive schedules through it; the managers themselves never call it.

use crate::schedule::models::SessionResult;
use crate::tournament::models::{GameConfig, UserId};
use rand::rngs::ThreadRng;
use rand::Rng;
use std::collections::HashMap;

/// Per-user skill levels, as read from `skill_ratings`
pub type SkillLevels = HashMap<UserId, HashMap<String, f64>>;

/// Match outcome simulator
pub struct MatchSimulator<R: Rng = ThreadRng> {
    config: GameConfig,
    default_level: f64,
    rng: R,
}

impl MatchSimulator<ThreadRng> {
    /// Create a simulator seeded from the thread RNG
    pub fn new(config: GameConfig, default_level: f64) -> Self {
        Self {
            config,
            default_level,
            rng: rand::rng(),
        }
    }
}

impl<R: Rng> MatchSimulator<R> {
    /// Create a simulator over a caller-supplied RNG (deterministic in tests)
    pub fn with_rng(config: GameConfig, default_level: f64, rng: R) -> Self {
        Self {
            config,
            default_level,
            rng,
        }
    }

    /// Weighted composite strength of one user across the configured skills.
    ///
    /// Unknown users and unrated skills fall back to the default level; with
    /// no weights configured the plain average of known levels is used.
    pub fn strength(&self, user_id: UserId, levels: &SkillLevels) -> f64 {
        let user = levels.get(&user_id);
        if self.config.skill_weights.is_empty() {
            return match user {
                Some(skills) if !skills.is_empty() => {
                    skills.values().sum::<f64>() / skills.len() as f64
                }
                _ => self.default_level,
            };
        }

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (skill, weight) in &self.config.skill_weights {
            let level = user
                .and_then(|skills| skills.get(skill))
                .copied()
                .unwrap_or(self.default_level);
            weighted += level * weight;
            total_weight += weight;
        }
        if total_weight == 0.0 {
            self.default_level
        } else {
            weighted / total_weight
        }
    }

    /// Probability that `home` beats `away`, given the match is not drawn.
    ///
    /// A logistic curve over the strength difference; `upset_factor` above 1
    /// flattens it (more upsets), below 1 sharpens it.
    pub fn win_probability(&self, home_strength: f64, away_strength: f64) -> f64 {
        let spread = 10.0 * self.config.upset_factor;
        1.0 / (1.0 + ((away_strength - home_strength) / spread).exp())
    }

    /// Simulate a head-to-head scoreline.
    pub fn simulate_match(
        &mut self,
        home: UserId,
        away: UserId,
        levels: &SkillLevels,
    ) -> SessionResult {
        if self.rng.random_bool(self.config.draw_probability) {
            let goals = self.rng.random_range(0..=3);
            return SessionResult::Score {
                home_goals: goals,
                away_goals: goals,
            };
        }

        let p_home = self.win_probability(
            self.strength(home, levels),
            self.strength(away, levels),
        );
        let home_wins = self.rng.random_bool(p_home.clamp(0.01, 0.99));
        let margin = self.rng.random_range(1..=3);
        let losing_goals = self.rng.random_range(0..=2);
        if home_wins {
            SessionResult::Score {
                home_goals: losing_goals + margin,
                away_goals: losing_goals,
            }
        } else {
            SessionResult::Score {
                home_goals: losing_goals,
                away_goals: losing_goals + margin,
            }
        }
    }

    /// Simulate one round of a shared session as an ordered placement list.
    ///
    /// Participants are ordered by noisy strength, so stronger players place
    /// better on average without the order being deterministic.
    pub fn simulate_placements(
        &mut self,
        participants: &[UserId],
        levels: &SkillLevels,
    ) -> SessionResult {
        let noise_span = 10.0 * self.config.upset_factor;
        let mut scored: Vec<(f64, UserId)> = participants
            .iter()
            .map(|&user| {
                let noise = self.rng.random_range(-noise_span..=noise_span);
                (self.strength(user, levels) + noise, user)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        SessionResult::Placements {
            placements: scored.into_iter().map(|(_, user)| user).collect(),
        }
    }
}
