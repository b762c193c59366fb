//! Ballot allocation: turning the normalized synopsis into a winners
//! list for the wallet subsystem.

use crate::scoring;
use crate::synopsis::PublisherSnapshot;

/// One winning publisher and the ballots it receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub publisher: PublisherSnapshot,
    pub votes: u32,
}

/// Distributes `ballots` across the ranked publisher set.
///
/// Zero-percent publishers receive nothing and are dropped from the
/// list. Votes of the remaining winners sum to exactly `ballots`
/// whenever at least one percent is positive.
pub fn allocate(ranked: &[PublisherSnapshot], ballots: u32) -> Vec<Winner> {
    let contenders: Vec<&PublisherSnapshot> =
        ranked.iter().filter(|p| p.percent > 0).collect();
    if contenders.is_empty() {
        return Vec::new();
    }

    let percents: Vec<u32> = contenders.iter().map(|p| p.percent).collect();
    let votes = scoring::round_votes(&percents, ballots);

    contenders
        .into_iter()
        .zip(votes)
        .map(|(publisher, votes)| Winner {
            publisher: publisher.clone(),
            votes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, score: f64, percent: u32) -> PublisherSnapshot {
        PublisherSnapshot {
            id: id.to_string(),
            duration: 60_000,
            visits: 1,
            score,
            percent,
            weight: 0.0,
        }
    }

    #[test]
    fn votes_sum_to_the_budget() {
        let ranked = vec![
            snapshot("c.com", 70.0, 70),
            snapshot("b.com", 20.0, 20),
            snapshot("a.com", 10.0, 10),
        ];
        let winners = allocate(&ranked, 13);
        let votes: Vec<u32> = winners.iter().map(|w| w.votes).collect();
        assert_eq!(votes, vec![9, 3, 1]);
        assert_eq!(votes.iter().sum::<u32>(), 13);
    }

    #[test]
    fn zero_percent_publishers_are_dropped() {
        let ranked = vec![snapshot("a.com", 9.0, 100), snapshot("b.com", 0.0, 0)];
        let winners = allocate(&ranked, 5);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].publisher.id, "a.com");
        assert_eq!(winners[0].votes, 5);
    }

    #[test]
    fn all_zero_percents_yield_an_empty_list() {
        let ranked = vec![snapshot("a.com", 0.0, 0), snapshot("b.com", 0.0, 0)];
        assert!(allocate(&ranked, 10).is_empty());
    }

    #[test]
    fn empty_budget_leaves_zero_votes() {
        let ranked = vec![snapshot("a.com", 1.0, 100)];
        let winners = allocate(&ranked, 0);
        assert_eq!(winners[0].votes, 0);
    }
}
