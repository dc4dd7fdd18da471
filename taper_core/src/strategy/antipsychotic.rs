//! Immediate-release antipsychotic reduction.
//!
//! The clinician orders the four slots; one grid increment is taken from
//! each occupied slot in that order, round and round, until the whole
//! reduction is absorbed.

use super::{next_total, Outcome, ReductionContext, Tie};
use crate::types::{Dose, OralRegimen, Regimen};
use std::collections::BTreeMap;

pub(crate) fn reduce(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    let current = regimen.total();
    let target = next_total(current, percent, ctx.step, Tie::Up);
    let mut remaining = current - target;

    let mut totals: BTreeMap<_, Dose> = ctx
        .slot_order
        .iter()
        .map(|slot| (*slot, regimen.slot_total(*slot)))
        .collect();

    while !remaining.is_zero() {
        let mut took = false;
        for slot in &ctx.slot_order {
            let have = totals.get(slot).copied().unwrap_or_default();
            if have.is_zero() {
                continue;
            }
            let take = remaining.min(ctx.step).min(have);
            totals.insert(*slot, have - take);
            remaining = remaining - take;
            took = true;
            if remaining.is_zero() {
                break;
            }
        }
        if !took {
            break;
        }
    }

    let mut next = regimen.clone();
    for (slot, total) in totals {
        if total != regimen.slot_total(slot) {
            next.set(slot, ctx.compose(total));
        }
    }

    tracing::debug!("Antipsychotic: {} -> {}", current, next.total());
    Outcome::Dose(Regimen::Oral(next))
}
