//! Acid-suppressant reduction: a fixed shave order with no special ending.

use super::{next_total, take_from, Outcome, ReductionContext, Tie};
use crate::types::{OralRegimen, Regimen, Slot};

const SHAVE_ORDER: [Slot; 4] = [Slot::Midday, Slot::Night, Slot::Morning, Slot::Dinner];

pub(crate) fn reduce(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    let current = regimen.total();
    let target = next_total(current, percent, ctx.step, Tie::Up);

    let mut next = regimen.clone();
    let mut remaining = current - target;
    for slot in SHAVE_ORDER {
        if remaining.is_zero() {
            break;
        }
        remaining = take_from(&mut next, slot, remaining, ctx);
    }

    tracing::debug!("Acid suppressant: {} -> {}", current, next.total());
    Outcome::Dose(Regimen::Oral(next))
}
