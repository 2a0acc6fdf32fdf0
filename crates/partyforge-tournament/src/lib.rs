//! Tournament Controller (spec §4.6): wraps a mode simulation to aggregate
//! results across N rounds.
//!
//! The room actor drives a [`TournamentState`] *alongside* the mode's
//! `GameLogic::State`, never inside it — per the spec invariant
//! "tournament-level counters are updated only in the controller;
//! simulations never mutate tournament state." The state machine mirrors
//! `partyforge_room::config::RoomState`'s style: a small, explicit enum
//! with `is_*` predicates rather than scattered booleans.

use partyforge_protocol::PlayerId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tournament configuration, set once at `start-game` time (spec §4.6
/// `configure(rounds)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Total rounds to play. Always clamped to at least 1 — a single-round
    /// "tournament" is just a normal match.
    pub total_rounds: u32,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self { total_rounds: 1 }
    }
}

/// What a mode reports when a round concludes, handed to
/// [`TournamentState::record_round`]. Mirrors `GameLogic::RoundOutcome`
/// but lives here so the tournament crate doesn't depend on `partyforge-room`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner_id: Option<PlayerId>,
    pub winner_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The tournament's own small state machine, tracked separately from
/// `RoomState` (which the room actor derives from this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentPhase {
    /// Rounds remain; the current round hasn't reported a winner yet.
    RoundInProgress,
    /// The current round just ended; waiting for the room's transition
    /// timer before the next round starts.
    RoundTransition,
    /// `current_round == total_rounds` and that round has concluded —
    /// the aggregate champion is final.
    Complete,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Aggregates round wins across a multi-round match.
///
/// `current_round` always refers to the round currently being played (or
/// that just concluded) — it advances only when [`TournamentState::advance_round`]
/// is called, which the room actor does once per round transition, never
/// from inside `record_round` (so a just-ended round's own `round-ended`
/// broadcast reports the round that ended, not the next one — spec §8
/// scenario S5).
#[derive(Debug, Clone)]
pub struct TournamentState {
    config: TournamentConfig,
    current_round: u32,
    phase: TournamentPhase,
    /// Win counts, in the order each player's first win was recorded —
    /// stable enough for deterministic `player_scores` output without
    /// pulling in a `PlayerId: Ord` requirement.
    wins: Vec<(PlayerId, u32)>,
    /// Winner of the most recently recorded round — the tie-break key
    /// per spec §9 Open Question 2 ("ties broken by latest round win").
    last_round_winner: Option<PlayerId>,
}

impl TournamentState {
    /// Starts (or restarts, on rematch) a tournament at round 1.
    pub fn new(config: TournamentConfig) -> Self {
        let config = TournamentConfig {
            total_rounds: config.total_rounds.max(1),
        };
        Self {
            config,
            current_round: 1,
            phase: TournamentPhase::RoundInProgress,
            wins: Vec::new(),
            last_round_winner: None,
        }
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn phase(&self) -> TournamentPhase {
        self.phase
    }

    /// Records the outcome of the round currently in progress. Returns the
    /// updated `player_scores` table (spec `round-ended.playerScores`).
    ///
    /// Idempotent with respect to `current_round`: this only mutates win
    /// counts and the transition phase, never `current_round` itself —
    /// call [`Self::advance_round`] separately to move to the next round.
    pub fn record_round(&mut self, result: RoundResult) -> Vec<(PlayerId, u32)> {
        if let Some(winner) = result.winner_id {
            match self.wins.iter_mut().find(|(id, _)| *id == winner) {
                Some((_, count)) => *count += 1,
                None => self.wins.push((winner, 1)),
            }
        }
        self.last_round_winner = result.winner_id;

        self.phase = if self.current_round >= self.config.total_rounds {
            TournamentPhase::Complete
        } else {
            TournamentPhase::RoundTransition
        };

        tracing::info!(
            round = self.current_round,
            winner = ?result.winner_id,
            complete = self.is_complete(),
            "tournament round recorded"
        );

        self.wins.clone()
    }

    /// `true` once the last configured round has been recorded.
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, TournamentPhase::Complete)
    }

    /// Advances to the next round. No-op (and logs a warning) if the
    /// tournament is already complete — the room actor must not call this
    /// after `is_complete()` returns `true`.
    pub fn advance_round(&mut self) {
        if self.is_complete() {
            tracing::warn!(
                round = self.current_round,
                "advance_round called on a completed tournament"
            );
            return;
        }
        self.current_round += 1;
        self.phase = TournamentPhase::RoundInProgress;
    }

    /// The aggregate winner once the tournament is complete: whoever has
    /// the most round wins, ties broken by who won the latest round
    /// (spec §9 Open Question 2). Returns `None` if no round produced a
    /// winner at all.
    pub fn champion(&self) -> Option<PlayerId> {
        let max_wins = self.wins.iter().map(|(_, c)| *c).max()?;
        let tied: Vec<PlayerId> = self
            .wins
            .iter()
            .filter(|(_, c)| *c == max_wins)
            .map(|(id, _)| *id)
            .collect();

        if tied.len() == 1 {
            return Some(tied[0]);
        }
        match self.last_round_winner {
            Some(winner) if tied.contains(&winner) => Some(winner),
            // Tie not resolved by the latest round (e.g. that round's
            // winner already had the max before this one) — fall back to
            // whichever tied player was recorded first for determinism.
            _ => tied.into_iter().next(),
        }
    }

    /// Current win counts, in first-win order.
    pub fn player_scores(&self) -> &[(PlayerId, u32)] {
        &self.wins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u64) -> PlayerId {
        PlayerId(id)
    }

    #[test]
    fn test_new_starts_at_round_one_in_progress() {
        let t = TournamentState::new(TournamentConfig { total_rounds: 3 });
        assert_eq!(t.current_round(), 1);
        assert!(!t.is_complete());
    }

    #[test]
    fn test_total_rounds_clamped_to_at_least_one() {
        let t = TournamentState::new(TournamentConfig { total_rounds: 0 });
        assert_eq!(t.config().total_rounds, 1);
    }

    #[test]
    fn test_record_round_does_not_advance_current_round() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 3 });
        let scores = t.record_round(RoundResult {
            winner_id: Some(p(1)),
            winner_name: Some("Edgar".into()),
        });
        assert_eq!(t.current_round(), 1);
        assert_eq!(scores, vec![(p(1), 1)]);
        assert!(!t.is_complete());
    }

    #[test]
    fn test_advance_round_moves_forward_and_resets_phase() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 3 });
        t.record_round(RoundResult {
            winner_id: Some(p(1)),
            winner_name: None,
        });
        t.advance_round();
        assert_eq!(t.current_round(), 2);
        assert_eq!(t.phase(), TournamentPhase::RoundInProgress);
    }

    #[test]
    fn test_complete_after_final_round_recorded() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 2 });
        t.record_round(RoundResult { winner_id: Some(p(1)), winner_name: None });
        t.advance_round();
        assert!(!t.is_complete());
        t.record_round(RoundResult { winner_id: Some(p(2)), winner_name: None });
        assert!(t.is_complete());
    }

    #[test]
    fn test_advance_round_after_complete_is_noop() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 1 });
        t.record_round(RoundResult { winner_id: Some(p(1)), winner_name: None });
        assert!(t.is_complete());
        t.advance_round();
        assert_eq!(t.current_round(), 1);
    }

    #[test]
    fn test_champion_picks_most_wins() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 3 });
        t.record_round(RoundResult { winner_id: Some(p(1)), winner_name: None });
        t.advance_round();
        t.record_round(RoundResult { winner_id: Some(p(1)), winner_name: None });
        t.advance_round();
        t.record_round(RoundResult { winner_id: Some(p(2)), winner_name: None });
        assert_eq!(t.champion(), Some(p(1)));
    }

    /// Spec §8 scenario S5: three rounds, P1/P2/P1 — aggregate champion P1
    /// with playerScores P1:2, P2:1.
    #[test]
    fn test_scenario_s5_tournament_of_three() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 3 });

        let scores = t.record_round(RoundResult {
            winner_id: Some(p(1)),
            winner_name: Some("P1".into()),
        });
        assert_eq!(t.current_round(), 1);
        assert_eq!(scores, vec![(p(1), 1)]);
        t.advance_round();

        let scores = t.record_round(RoundResult {
            winner_id: Some(p(2)),
            winner_name: Some("P2".into()),
        });
        assert_eq!(t.current_round(), 2);
        assert_eq!(scores, vec![(p(1), 1), (p(2), 1)]);
        t.advance_round();

        let scores = t.record_round(RoundResult {
            winner_id: Some(p(1)),
            winner_name: Some("P1".into()),
        });
        assert_eq!(t.current_round(), 3);
        assert!(t.is_complete());
        assert_eq!(scores, vec![(p(1), 2), (p(2), 1)]);
        assert_eq!(t.champion(), Some(p(1)));
    }

    /// Spec §9 Open Question 2: equal wins broken by the latest round's winner.
    #[test]
    fn test_tie_broken_by_latest_round_winner() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 2 });
        t.record_round(RoundResult { winner_id: Some(p(1)), winner_name: None });
        t.advance_round();
        t.record_round(RoundResult { winner_id: Some(p(2)), winner_name: None });
        // Both have 1 win; P2 won the latest round.
        assert_eq!(t.champion(), Some(p(2)));
    }

    #[test]
    fn test_champion_none_when_no_round_had_a_winner() {
        let mut t = TournamentState::new(TournamentConfig { total_rounds: 1 });
        t.record_round(RoundResult { winner_id: None, winner_name: None });
        assert_eq!(t.champion(), None);
    }
}
