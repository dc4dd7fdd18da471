//! Oral solid, multi-dose-per-day reduction.
//!
//! Dinner is shaved first, then midday; whatever is left comes out of an
//! even morning/night split with night ≥ morning. Once the regimen is one
//! unit of the lowest selected strength morning and night, the taper either
//! collapses to a single evening dose and stops, or hands off to review when
//! a lower commercial strength exists but is not selected.

use super::{next_total, take_from, Outcome, ReductionContext, Tie};
use crate::types::{Dose, OralRegimen, Pieces, Regimen, Slot};

pub(crate) fn reduce(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    if let Some(outcome) = floor_outcome(regimen, ctx) {
        return outcome;
    }

    let current = regimen.total();
    let target = next_total(current, percent, ctx.step, Tie::Up);
    tracing::debug!("Multi-dose: {} -> target {}", current, target);
    Outcome::Dose(Regimen::Oral(shave_to(regimen, target, ctx)))
}

/// Terminal branch at an exact twice-daily split of the lowest selected strength
pub(crate) fn floor_outcome(regimen: &OralRegimen, ctx: &ReductionContext) -> Option<Outcome> {
    let floor = Pieces::whole(ctx.lowest_selected, 1);
    let at_floor = regimen.occupied() == [Slot::Morning, Slot::Night]
        && regimen.get(Slot::Morning) == Some(&floor)
        && regimen.get(Slot::Night) == Some(&floor);
    if !at_floor {
        return None;
    }

    if ctx.lowest_selected == ctx.lowest_available {
        tracing::info!(
            "Reached {} twice daily; moving to a single evening dose",
            ctx.lowest_selected
        );
        Some(Outcome::SingleSided(Regimen::Oral(
            OralRegimen::new().with_slot(Slot::Night, floor),
        )))
    } else {
        tracing::info!(
            "Reached {} twice daily but {} exists unselected; scheduling review",
            ctx.lowest_selected,
            ctx.lowest_available
        );
        Some(Outcome::Review)
    }
}

/// Remove `current − target` following the dinner → midday → morning/night order
pub(crate) fn shave_to(regimen: &OralRegimen, target: Dose, ctx: &ReductionContext) -> OralRegimen {
    let mut next = regimen.clone();
    let mut remaining = regimen.total() - target;

    for slot in [Slot::Dinner, Slot::Midday] {
        remaining = take_from(&mut next, slot, remaining, ctx);
    }
    if remaining.is_zero() {
        return next;
    }

    let morning = next.slot_total(Slot::Morning);
    let night = next.slot_total(Slot::Night);
    match (morning.is_zero(), night.is_zero()) {
        (false, false) => {
            let combined = (morning + night) - remaining;
            let new_morning = combined.div_floor(2).floor_to(ctx.step);
            let new_night = combined - new_morning;
            next.set(Slot::Morning, ctx.compose(new_morning));
            next.set(Slot::Night, ctx.compose(new_night));
        }
        (false, true) => {
            take_from(&mut next, Slot::Morning, remaining, ctx);
        }
        (true, false) => {
            take_from(&mut next, Slot::Night, remaining, ctx);
        }
        (true, true) => {}
    }
    next
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::SplitRule;

    #[test]
    fn test_even_split_from_bid() {
        let ctx = context(&[10.0, 20.0, 40.0], SplitRule::WholeOnly, None);
        let regimen = oral(&[
            (Slot::Morning, &[(40.0, 1)]),
            (Slot::Night, &[(40.0, 1)]),
        ]);

        let outcome = reduce(&regimen, 25.0, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.slot_total(Slot::Morning), mg(30.0));
        assert_eq!(next.slot_total(Slot::Night), mg(30.0));
        assert_eq!(next.total(), mg(60.0));
    }

    #[test]
    fn test_dinner_then_midday_first() {
        let ctx = context(&[10.0, 20.0], SplitRule::WholeOnly, None);
        let regimen = oral(&[
            (Slot::Morning, &[(20.0, 1)]),
            (Slot::Midday, &[(20.0, 1)]),
            (Slot::Dinner, &[(10.0, 1)]),
            (Slot::Night, &[(20.0, 1)]),
        ]);

        // 70 -> 52.5 -> snaps to 50: dinner 10 then 10 of midday
        let outcome = reduce(&regimen, 25.0, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.slot_total(Slot::Dinner), Dose::ZERO);
        assert_eq!(next.slot_total(Slot::Midday), mg(10.0));
        assert_eq!(next.slot_total(Slot::Morning), mg(20.0));
        assert_eq!(next.slot_total(Slot::Night), mg(20.0));
    }

    #[test]
    fn test_uneven_split_favours_night() {
        let ctx = context(&[10.0], SplitRule::WholeOnly, None);
        let regimen = oral(&[
            (Slot::Morning, &[(10.0, 2)]),
            (Slot::Night, &[(10.0, 2)]),
        ]);

        let outcome = reduce(&regimen, 25.0, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.slot_total(Slot::Morning), mg(10.0));
        assert_eq!(next.slot_total(Slot::Night), mg(20.0));
    }

    #[test]
    fn test_floor_collapses_to_evening_when_lowest_available() {
        let ctx = context(&[10.0, 20.0], SplitRule::WholeOnly, None);
        let regimen = oral(&[
            (Slot::Morning, &[(10.0, 1)]),
            (Slot::Night, &[(10.0, 1)]),
        ]);

        let outcome = reduce(&regimen, 50.0, &ctx);
        match outcome {
            Outcome::SingleSided(Regimen::Oral(next)) => {
                assert_eq!(next.occupied(), vec![Slot::Night]);
                assert_eq!(next.total(), mg(10.0));
            }
            other => panic!("expected single-sided hold, got {:?}", other),
        }
    }

    #[test]
    fn test_floor_reviews_when_lower_strength_unselected() {
        let mut ctx = context(&[20.0, 40.0], SplitRule::WholeOnly, None);
        ctx.lowest_available = mg(10.0);
        ctx.selection_active = true;
        let regimen = oral(&[
            (Slot::Morning, &[(20.0, 1)]),
            (Slot::Night, &[(20.0, 1)]),
        ]);

        assert_eq!(reduce(&regimen, 25.0, &ctx), Outcome::Review);
    }

    #[test]
    fn test_single_slot_is_shaved_in_place() {
        let ctx = context(&[10.0], SplitRule::WholeOnly, None);
        let regimen = oral(&[(Slot::Night, &[(10.0, 4)])]);

        let outcome = reduce(&regimen, 50.0, &ctx);
        let next = dose_of(&outcome);
        assert_eq!(next.occupied(), vec![Slot::Night]);
        assert_eq!(next.total(), mg(20.0));
    }

    #[test]
    fn test_repeated_reduction_always_progresses() {
        let ctx = context(&[5.0, 10.0, 20.0], SplitRule::WholeOnly, None);
        let mut regimen = oral(&[
            (Slot::Morning, &[(20.0, 2)]),
            (Slot::Dinner, &[(10.0, 1)]),
            (Slot::Night, &[(20.0, 2)]),
        ]);

        for _ in 0..40 {
            match reduce(&regimen, 10.0, &ctx) {
                Outcome::Dose(Regimen::Oral(next)) => {
                    assert!(next.total() < regimen.total());
                    if next.total().is_zero() {
                        return;
                    }
                    regimen = next;
                }
                Outcome::SingleSided(_) => return,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        panic!("taper did not terminate");
    }
}
