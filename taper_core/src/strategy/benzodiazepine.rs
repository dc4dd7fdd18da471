//! Benzodiazepine / Z-drug reduction: one night dose on a GCD grid.
//!
//! Exact midpoints are resolved by the product selection: with strengths
//! selected, the option needing fewer pieces wins (then the higher dose);
//! with nothing selected the lower dose wins.

use super::{progress_guard, raw_target, Outcome, ReductionContext};
use crate::types::{Dose, OralRegimen, Regimen, Slot};

pub(crate) fn reduce(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    let current = regimen.total();
    let raw = raw_target(current, percent);
    let chosen = snap_night_dose(raw, ctx);
    let target = progress_guard(current, chosen, ctx.step);

    tracing::debug!("Benzodiazepine: {} -> raw {} -> {}", current, raw, target);
    let night = ctx.compose(target);
    Outcome::Dose(Regimen::Oral(OralRegimen::new().with_slot(Slot::Night, night)))
}

fn snap_night_dose(raw: Dose, ctx: &ReductionContext) -> Dose {
    let step = ctx.step;
    let lower = raw.floor_to(step);
    if lower == raw {
        return raw;
    }
    let upper = lower + step;

    let below = raw - lower;
    let above = upper - raw;
    if below != above {
        return if below < above { lower } else { upper };
    }

    if !ctx.selection_active {
        return lower;
    }
    let lower_units = ctx.compose(lower).unit_count();
    let upper_units = ctx.compose(upper).unit_count();
    if lower_units < upper_units {
        lower
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::compose::common_step;
    use crate::types::SplitRule;

    fn bzra_context(strengths: &[f64], selected: bool) -> ReductionContext {
        let mut ctx = context(strengths, SplitRule::Halves, None);
        ctx.step = common_step(&ctx.pieces).unwrap();
        ctx.selection_active = selected;
        ctx
    }

    #[test]
    fn test_tie_rounds_down_without_selection() {
        // temazepam 20 mg: grid 5, 62.5% cut lands on 7.5 between 5 and 10
        let ctx = bzra_context(&[10.0, 20.0], false);
        let regimen = oral(&[(Slot::Night, &[(20.0, 1)])]);

        let outcome = reduce(&regimen, 62.5, &ctx);
        assert_eq!(dose_of(&outcome).total(), mg(5.0));
    }

    #[test]
    fn test_tie_prefers_fewer_pieces_with_selection() {
        // 10 mg only: 5 (half) and 10 (whole) are one piece each, so round up
        let ctx = bzra_context(&[10.0], true);
        let regimen = oral(&[(Slot::Night, &[(10.0, 2)])]);

        let outcome = reduce(&regimen, 62.5, &ctx);
        assert_eq!(dose_of(&outcome).total(), mg(10.0));
    }

    #[test]
    fn test_fewer_pieces_beats_rounding_up() {
        // 3 mg halves: 3.75 sits between 3 (one tablet) and 4.5 (one and a half)
        let ctx = bzra_context(&[3.0], true);
        let regimen = oral(&[(Slot::Night, &[(3.0, 2)])]);

        let outcome = reduce(&regimen, 37.5, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.total(), mg(3.0));
        assert_eq!(next.get(Slot::Night).map(|p| p.unit_count()), Some(1));
    }

    #[test]
    fn test_always_night_only() {
        let ctx = bzra_context(&[5.0], false);
        let regimen = oral(&[(Slot::Night, &[(5.0, 2)])]);

        let outcome = reduce(&regimen, 25.0, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.occupied(), vec![Slot::Night]);
        assert_eq!(next.total(), mg(7.5));
    }

    #[test]
    fn test_reaches_zero_from_smallest_piece() {
        let ctx = bzra_context(&[5.0], false);
        let regimen = oral(&[(Slot::Night, &[(5.0, 1)])]);

        // 5 -> 2.5 (half), then 2.5 -> 1.25 ties down to 0
        let outcome = reduce(&regimen, 50.0, &ctx);
        let half = dose_of(&outcome).clone();
        assert_eq!(half.total(), mg(2.5));

        let outcome = reduce(&half, 50.0, &ctx);
        assert!(dose_of(&outcome).total().is_zero());
    }
}
