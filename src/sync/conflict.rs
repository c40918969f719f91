//! Conflict resolution strategies applied when a synced record differs from the
//! locally stored one (§4.3).

use chrono::NaiveDateTime;

use crate::models::sync_log::ConflictStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    UseRemote,
    UseLocal,
    /// `manual` strategy never mutates the record; it only flags it. Queue semantics
    /// for the human-review workflow are left to a downstream collaborator (§9).
    FlagForReview,
}

/// Decides which side wins, given the configured strategy and both sides' timestamps.
/// `local_updated_at`/`remote_updated_at` are compared as naive UTC per §5's timestamp
/// discipline — never compare a naive and an aware instant directly.
pub fn resolve(
    strategy: ConflictStrategy,
    local_updated_at: NaiveDateTime,
    remote_updated_at: NaiveDateTime,
) -> ConflictOutcome {
    match strategy {
        ConflictStrategy::EmagPriority => ConflictOutcome::UseRemote,
        ConflictStrategy::LocalPriority => ConflictOutcome::UseLocal,
        ConflictStrategy::NewestWins => {
            if remote_updated_at >= local_updated_at {
                ConflictOutcome::UseRemote
            } else {
                ConflictOutcome::UseLocal
            }
        }
        ConflictStrategy::Manual => ConflictOutcome::FlagForReview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn emag_priority_always_uses_remote() {
        assert_eq!(resolve(ConflictStrategy::EmagPriority, t(100), t(0)), ConflictOutcome::UseRemote);
    }

    #[test]
    fn local_priority_always_uses_local() {
        assert_eq!(resolve(ConflictStrategy::LocalPriority, t(0), t(100)), ConflictOutcome::UseLocal);
    }

    #[test]
    fn newest_wins_picks_the_later_timestamp() {
        assert_eq!(resolve(ConflictStrategy::NewestWins, t(0), t(100)), ConflictOutcome::UseRemote);
        assert_eq!(resolve(ConflictStrategy::NewestWins, t(100), t(0)), ConflictOutcome::UseLocal);
    }

    #[test]
    fn newest_wins_ties_favor_remote() {
        assert_eq!(resolve(ConflictStrategy::NewestWins, t(50), t(50)), ConflictOutcome::UseRemote);
    }

    #[test]
    fn manual_never_mutates() {
        assert_eq!(resolve(ConflictStrategy::Manual, t(0), t(100)), ConflictOutcome::FlagForReview);
        assert_eq!(resolve(ConflictStrategy::Manual, t(100), t(0)), ConflictOutcome::FlagForReview);
    }
}
