//! Score arithmetic, round summaries and the final ranking.

use crate::models::{Question, OPTION_COUNT};
use crate::protocol::{PlayerEntry, ServerMessage, RANKING_SLOTS};
use crate::session::Participant;

/// Points for a correct answer before any time bonus.
pub const BASE_SCORE: u64 = 100;
/// Bonus for a correct answer given with the whole question time left.
pub const MAX_TIME_BONUS: u64 = 100;

/// Bonus for answering with `remaining` (a fraction of the question time) left.
pub fn time_bonus(remaining: f64) -> u64 {
    if !remaining.is_finite() {
        return 0;
    }
    (remaining.clamp(0.0, 1.0) * MAX_TIME_BONUS as f64).round() as u64
}

pub fn roster(participants: &[&Participant]) -> Vec<PlayerEntry> {
    participants
        .iter()
        .map(|p| PlayerEntry {
            name: p.name.clone(),
            score: p.score,
        })
        .collect()
}

/// Build the `RoundClosed` message for question `number` from the answers
/// currently recorded on `participants`.
pub fn round_summary(number: usize, question: &Question, participants: &[&Participant]) -> ServerMessage {
    let mut votes = [0usize; OPTION_COUNT];
    for answer in participants.iter().filter_map(|p| p.last_answer) {
        if let Some(slot) = (answer as usize).checked_sub(1).and_then(|i| votes.get_mut(i)) {
            *slot += 1;
        }
    }

    let answered: usize = votes.iter().sum();
    let percentages = votes.map(|count| percentage(count, answered));

    ServerMessage::RoundClosed {
        number,
        votes,
        percentages,
        correct_option: question.correct,
        answered,
        total: participants.len(),
    }
}

fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count * 100 + total / 2) / total) as u32
}

/// Names of the five best players, best first. Equal scores keep join
/// order; missing slots are empty strings.
pub fn ranking(participants: &[&Participant]) -> [String; RANKING_SLOTS] {
    let mut sorted: Vec<&Participant> = participants.to_vec();
    // Stable sort keeps join order among equal scores
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    let mut top: [String; RANKING_SLOTS] = Default::default();
    for (slot, participant) in top.iter_mut().zip(sorted) {
        *slot = participant.name.clone();
    }
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionId, ParticipantRegistry, SessionId};

    fn question() -> Question {
        Question {
            text: "?".to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct: 3,
        }
    }

    fn players(entries: &[(&str, u64, Option<u8>)]) -> (ParticipantRegistry, SessionId) {
        let mut registry = ParticipantRegistry::new();
        let session = SessionId::new();
        for (name, score, answer) in entries {
            let id = ConnectionId::new();
            registry.add(session, id, name.to_string());
            let p = registry.get_mut(id).unwrap();
            p.score = *score;
            p.last_answer = *answer;
        }
        (registry, session)
    }

    #[test]
    fn test_time_bonus() {
        assert_eq!(time_bonus(1.0), 100);
        assert_eq!(time_bonus(0.5), 50);
        assert_eq!(time_bonus(0.0), 0);
        assert_eq!(time_bonus(1.5), 100);
        assert_eq!(time_bonus(-2.0), 0);
        assert_eq!(time_bonus(f64::NAN), 0);
    }

    #[test]
    fn test_round_summary_counts_votes() {
        let (registry, session) = players(&[
            ("a", 0, Some(3)),
            ("b", 0, Some(3)),
            ("c", 0, Some(1)),
            ("d", 0, None),
        ]);
        let msg = round_summary(2, &question(), &registry.for_session(session));
        assert_eq!(
            msg,
            ServerMessage::RoundClosed {
                number: 2,
                votes: [1, 0, 2, 0],
                percentages: [33, 0, 67, 0],
                correct_option: 3,
                answered: 3,
                total: 4,
            }
        );
    }

    #[test]
    fn test_round_summary_with_no_answers() {
        let (registry, session) = players(&[("a", 0, None)]);
        let ServerMessage::RoundClosed { percentages, answered, .. } =
            round_summary(1, &question(), &registry.for_session(session))
        else {
            panic!("expected RoundClosed");
        };
        assert_eq!(percentages, [0; OPTION_COUNT]);
        assert_eq!(answered, 0);
    }

    #[test]
    fn test_ranking_orders_by_score_then_join_order() {
        let (registry, session) = players(&[
            ("Ana", 100, None),
            ("Bo", 250, None),
            ("Cy", 100, None),
            ("Di", 0, None),
            ("Ed", 300, None),
            ("Fa", 100, None),
        ]);
        let top = ranking(&registry.for_session(session));
        assert_eq!(top, ["Ed", "Bo", "Ana", "Cy", "Fa"].map(String::from));
    }

    #[test]
    fn test_ranking_pads_empty_slots() {
        let (registry, session) = players(&[("Ana", 180, None)]);
        let top = ranking(&registry.for_session(session));
        assert_eq!(top, ["Ana", "", "", "", ""].map(String::from));
    }

    #[test]
    fn test_roster() {
        let (registry, session) = players(&[("Ana", 5, None), ("Bo", 0, None)]);
        let entries = roster(&registry.for_session(session));
        assert_eq!(entries[0], PlayerEntry { name: "Ana".into(), score: 5 });
        assert_eq!(entries.len(), 2);
    }
}
