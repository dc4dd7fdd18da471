//! Piece composition: packing a milligram target from dispensable pieces.
//!
//! Decomposition tries the largest pieces first. When a target cannot be
//! hit exactly, composition re-targets one grid step lower at a time and
//! never rounds up past the requested amount.

use crate::types::{Dose, Piece, Pieces, SplitRule};

/// Expand strengths into the pieces a split rule permits, largest first
pub fn allowed_pieces(strengths: &[Dose], split: SplitRule) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = strengths
        .iter()
        .filter(|s| !s.is_zero())
        .flat_map(|strength| {
            split.fractions().iter().map(move |fraction| Piece {
                strength: *strength,
                fraction: *fraction,
            })
        })
        .collect();

    // Equal magnitudes (a whole 5 and half of a 10) prefer the whole tablet
    pieces.sort_by(|a, b| {
        b.magnitude()
            .cmp(&a.magnitude())
            .then(a.fraction.cmp(&b.fraction))
    });
    pieces.dedup_by(|a, b| a.magnitude() == b.magnitude());
    pieces
}

/// Smallest piece magnitude, the default grid for most classes
pub fn smallest_piece(pieces: &[Piece]) -> Option<Dose> {
    pieces.iter().map(Piece::magnitude).min()
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Greatest common step of all piece magnitudes
pub fn common_step(pieces: &[Piece]) -> Option<Dose> {
    let ticks = pieces
        .iter()
        .map(|p| p.magnitude().ticks())
        .fold(0, gcd);
    (ticks > 0).then_some(Dose::from_ticks(ticks))
}

/// Exact decomposition of `target`, or `None`.
///
/// Counts are tried from the most of the largest piece downwards, so the
/// first solution found is the greedy one whenever greedy succeeds.
pub fn decompose_exact(target: Dose, pieces: &[Piece]) -> Option<Pieces> {
    let mut counts = Vec::with_capacity(pieces.len());
    if !search(target.ticks(), pieces, &mut counts) {
        return None;
    }

    let mut result = Pieces::new();
    for (piece, count) in pieces.iter().zip(counts) {
        result.add_piece(*piece, count);
    }
    Some(result)
}

fn search(remaining: u64, pieces: &[Piece], counts: &mut Vec<u32>) -> bool {
    if remaining == 0 {
        counts.resize(counts.len() + pieces.len(), 0);
        return true;
    }
    let Some((first, rest)) = pieces.split_first() else {
        return false;
    };

    let magnitude = first.magnitude().ticks();
    let most = remaining / magnitude;
    for count in (0..=most).rev() {
        counts.push(count as u32);
        if search(remaining - count * magnitude, rest, counts) {
            return true;
        }
        counts.pop();
    }
    false
}

/// Compose `target` from `pieces`, falling back `step` at a time.
///
/// Returns empty pieces when nothing at or below the target (other than
/// zero) can be composed, including when `pieces` is empty.
pub fn compose(target: Dose, pieces: &[Piece], step: Dose) -> Pieces {
    if pieces.is_empty() {
        tracing::debug!("No pieces available to compose {}", target);
        return Pieces::new();
    }

    let mut candidate = target;
    while !candidate.is_zero() {
        if let Some(found) = decompose_exact(candidate, pieces) {
            if candidate != target {
                tracing::debug!("Composed {} instead of {}", candidate, target);
            }
            return found;
        }
        if step.is_zero() {
            break;
        }
        candidate = candidate.saturating_sub(step);
    }
    Pieces::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fraction;

    fn mg(values: &[f64]) -> Vec<Dose> {
        values.iter().map(|v| Dose::from_mg(*v)).collect()
    }

    #[test]
    fn test_allowed_pieces_whole_only() {
        let pieces = allowed_pieces(&mg(&[10.0, 20.0, 40.0]), SplitRule::WholeOnly);
        let mags: Vec<Dose> = pieces.iter().map(Piece::magnitude).collect();
        assert_eq!(mags, mg(&[40.0, 20.0, 10.0]));
    }

    #[test]
    fn test_allowed_pieces_halves_prefer_whole() {
        let pieces = allowed_pieces(&mg(&[5.0, 10.0]), SplitRule::Halves);
        let mags: Vec<Dose> = pieces.iter().map(Piece::magnitude).collect();
        assert_eq!(mags, mg(&[10.0, 5.0, 2.5]));
        // 5 mg comes from a whole 5 mg tablet, not half a 10
        assert_eq!(pieces[1].fraction, Fraction::Whole);
    }

    #[test]
    fn test_common_step() {
        let pieces = allowed_pieces(&mg(&[3.75, 7.5]), SplitRule::Halves);
        assert_eq!(common_step(&pieces), Some(Dose::from_mg(1.875)));
        assert_eq!(common_step(&[]), None);
    }

    #[test]
    fn test_compose_exact() {
        let pieces = allowed_pieces(&mg(&[10.0, 20.0, 40.0]), SplitRule::WholeOnly);
        let composed = compose(Dose::from_mg(30.0), &pieces, Dose::from_mg(10.0));
        assert_eq!(composed.total(), Dose::from_mg(30.0));
        assert_eq!(composed.quarters_of(Dose::from_mg(20.0)), 4);
        assert_eq!(composed.quarters_of(Dose::from_mg(10.0)), 4);
    }

    #[test]
    fn test_compose_backtracks_when_greedy_fails() {
        let pieces = allowed_pieces(&mg(&[30.0, 40.0]), SplitRule::WholeOnly);
        let composed = compose(Dose::from_mg(60.0), &pieces, Dose::from_mg(10.0));
        assert_eq!(composed.total(), Dose::from_mg(60.0));
        assert_eq!(composed.quarters_of(Dose::from_mg(30.0)), 8);
    }

    #[test]
    fn test_compose_falls_back_below_target() {
        let pieces = allowed_pieces(&mg(&[20.0]), SplitRule::WholeOnly);
        let composed = compose(Dose::from_mg(50.0), &pieces, Dose::from_mg(10.0));
        assert_eq!(composed.total(), Dose::from_mg(40.0));
    }

    #[test]
    fn test_compose_never_exceeds_target() {
        let pieces = allowed_pieces(&mg(&[25.0, 75.0, 150.0]), SplitRule::WholeOnly);
        for target in [10.0, 40.0, 110.0, 260.0] {
            let composed = compose(Dose::from_mg(target), &pieces, Dose::from_mg(25.0));
            assert!(composed.total() <= Dose::from_mg(target));
        }
    }

    #[test]
    fn test_compose_empty_units() {
        let composed = compose(Dose::from_mg(10.0), &[], Dose::from_mg(5.0));
        assert!(composed.is_empty());
    }

    #[test]
    fn test_compose_with_halves() {
        let pieces = allowed_pieces(&mg(&[10.0]), SplitRule::Halves);
        let composed = compose(Dose::from_mg(15.0), &pieces, Dose::from_mg(5.0));
        assert_eq!(composed.quarters_of(Dose::from_mg(10.0)), 6);
        assert_eq!(composed.unit_count(), 2);
    }
}
