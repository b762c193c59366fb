//! Scoring kernel: concave attention score and integer rounding.
//!
//! All arithmetic is IEEE-754 f64 and `round` is half-away-from-zero,
//! so results are identical across platforms. Both adjustment loops
//! iterate in input order with a documented tie-break.

/// Cached coefficients of the concave score.
///
/// For a visit of `d` ms the contribution is
/// `(sqrt(b^2 + 4*a*d) - b) / (2*a)` with `a = 1/(2*s) - m` and
/// `b = m - a`, where `m` is the minimum visit duration and `s` the
/// configured time scale. The function is strictly increasing, concave,
/// and equals 1 exactly at `d = m`. The derived products are cached and
/// must be recomputed whenever `m` changes.
#[derive(Debug, Clone, Copy)]
pub struct ScoreConstants {
    a: f64,
    a2: f64,
    a4: f64,
    b: f64,
    b2: f64,
}

impl ScoreConstants {
    pub fn new(min_duration_ms: u64, time_scale: f64) -> Self {
        let m = min_duration_ms as f64;
        let a = 1.0 / (time_scale * 2.0) - m;
        let a2 = a * 2.0;
        let a4 = a2 * 2.0;
        let b = m - a;
        let b2 = b * b;
        Self { a, a2, a4, b, b2 }
    }

    /// Concave score of a single visit of `duration` milliseconds.
    pub fn concave_score(&self, duration: u64) -> f64 {
        ((self.b2 + self.a4 * duration as f64).sqrt() - self.b) / self.a2
    }

    #[cfg(test)]
    fn coefficient_a(&self) -> f64 {
        self.a
    }
}

/// Half-away-from-zero rounding, the semantics of C `lround`.
fn round_half_away(value: f64) -> i64 {
    value.round() as i64
}

/// Largest-remainder rounding of real percentages to integers summing
/// to exactly 100.
///
/// Initial values are rounded; while the sum is off, the entry with the
/// largest residual |rounded - real| is nudged towards 100 and its
/// residual cleared. Ties pick the lowest index. Callers guarantee the
/// reals sum to 100 (they are `score / total * 100`).
pub fn round_percents(reals: &[f64]) -> Vec<u32> {
    let mut percents: Vec<i64> = reals.iter().map(|r| round_half_away(*r)).collect();
    let mut residuals: Vec<f64> = percents
        .iter()
        .zip(reals)
        .map(|(p, r)| (*p as f64 - r).abs())
        .collect();
    let mut total: i64 = percents.iter().sum();

    while total != 100 && !percents.is_empty() {
        let decrementing = total > 100;
        let mut k = usize::MAX;
        let mut best = f64::NEG_INFINITY;
        for (i, residual) in residuals.iter().enumerate() {
            // Never push an entry below zero.
            if decrementing && percents[i] == 0 {
                continue;
            }
            if *residual > best {
                best = *residual;
                k = i;
            }
        }
        if k == usize::MAX {
            break;
        }
        if decrementing {
            percents[k] -= 1;
            total -= 1;
        } else {
            percents[k] += 1;
            total += 1;
        }
        residuals[k] = 0.0;
    }

    percents.into_iter().map(|p| p.max(0) as u32).collect()
}

/// Rounds integer percents into vote counts for a ballot budget.
///
/// Initial votes are `round(percent * budget / 100)`. While the total
/// exceeds the budget, the entry with the most votes loses one; ties
/// pick the highest index. A shortfall is left as-is: the contract is
/// a total of at most `budget`, and exactly `budget` whenever some
/// entry had a positive percent.
pub fn round_votes(percents: &[u32], budget: u32) -> Vec<u32> {
    let mut votes: Vec<u32> = percents
        .iter()
        .map(|p| round_half_away(*p as f64 * budget as f64 / 100.0) as u32)
        .collect();
    let mut total: u64 = votes.iter().map(|v| *v as u64).sum();

    while total > budget as u64 {
        let mut k = 0;
        let mut best = 0u32;
        for (i, v) in votes.iter().enumerate() {
            if *v >= best {
                best = *v;
                k = i;
            }
        }
        votes[k] -= 1;
        total -= 1;
    }
    votes
}
