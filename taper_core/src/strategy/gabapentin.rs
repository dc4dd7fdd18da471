//! Gabapentin reduction across four-, three- and twice-daily patterns.
//!
//! - QID: only dinner is shaved; once it is gone the pattern is TID.
//! - TID: a bounded search over the two nearby grid totals picks the most
//!   balanced split with evening ≥ morning ≥ middle.
//! - BID and below: the multi-dose rules, including their terminal branch.

use super::{multi_dose, next_total, raw_target, step_below, Outcome, ReductionContext, Tie};
use crate::compose::decompose_exact;
use crate::types::{Dose, OralRegimen, Pieces, Regimen, Slot};
use std::cmp::Reverse;

pub(crate) fn reduce(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    let occupied = regimen.occupied();
    match occupied.len() {
        4 => reduce_four_times(regimen, percent, ctx),
        3 => {
            let roles = [occupied[0], occupied[1], occupied[2]];
            reduce_three_times(regimen, roles, percent, ctx)
        }
        _ => multi_dose::reduce(regimen, percent, ctx),
    }
}

fn reduce_four_times(regimen: &OralRegimen, percent: f64, ctx: &ReductionContext) -> Outcome {
    let current = regimen.total();
    let target = next_total(current, percent, ctx.step, Tie::Up);
    let others = current - regimen.slot_total(Slot::Dinner);

    if target >= others {
        let next = regimen
            .clone()
            .with_slot(Slot::Dinner, ctx.compose(target - others));
        tracing::debug!("Gabapentin QID: dinner shaved, {} -> {}", current, next.total());
        return Outcome::Dose(Regimen::Oral(next));
    }

    // Dinner is exhausted this step; the rest is balanced as TID
    let roles = [Slot::Morning, Slot::Midday, Slot::Night];
    let raw = raw_target(current, percent);
    match balance_three(roles, current, raw, ctx) {
        Some(next) => Outcome::Dose(Regimen::Oral(next)),
        None => multi_dose::reduce(regimen, percent, ctx),
    }
}

fn reduce_three_times(
    regimen: &OralRegimen,
    roles: [Slot; 3],
    percent: f64,
    ctx: &ReductionContext,
) -> Outcome {
    let current = regimen.total();
    let raw = raw_target(current, percent);
    match balance_three(roles, current, raw, ctx) {
        Some(next) => Outcome::Dose(Regimen::Oral(next)),
        None => {
            tracing::debug!("Gabapentin TID: no balanced split, falling back to multi-dose");
            multi_dose::reduce(regimen, percent, ctx)
        }
    }
}

/// Ranking for a candidate split; smaller is better
type SplitKey = (u64, u64, bool, u32, u64, Reverse<u64>);

/// Best milligram-conserving split of a nearby grid total over three slots.
///
/// `roles` are `[morning, middle, evening]`. Every slot must be composable
/// exactly within the per-slot unit cap.
fn balance_three(
    roles: [Slot; 3],
    current: Dose,
    raw: Dose,
    ctx: &ReductionContext,
) -> Option<OralRegimen> {
    let step = ctx.step;
    let lower = raw.floor_to(step);
    let mut totals = vec![lower];
    if lower != raw {
        totals.push(lower + step);
    }
    totals.retain(|t| *t < current);
    if totals.is_empty() {
        totals.push(step_below(current, step));
    }

    let mut best: Option<(SplitKey, [Pieces; 3])> = None;
    for total in totals {
        let n = total.ticks() / step.ticks();
        for morning in 0..=n {
            for middle in 0..=morning.min(n - morning) {
                let evening = n - morning - middle;
                if evening < morning {
                    continue;
                }

                let Some(pieces) = compose_split([morning, middle, evening], step, ctx) else {
                    continue;
                };

                let values = [morning, middle, evening].map(|k| step * k);
                let units: u32 = pieces.iter().map(Pieces::unit_count).sum();
                let key = split_key(values, units, raw);

                if best.as_ref().map_or(true, |(k, _)| key < *k) {
                    best = Some((key, pieces));
                }
            }
        }
    }

    let (key, [morning, middle, evening]) = best?;
    tracing::debug!("Gabapentin TID split chosen with key {:?}", key);
    Some(
        OralRegimen::new()
            .with_slot(roles[0], morning)
            .with_slot(roles[1], middle)
            .with_slot(roles[2], evening),
    )
}

/// Rank `[morning, middle, evening]`: spread, deviation from the mean,
/// morning = evening, units, distance from `raw`, then the larger total
fn split_key(values: [Dose; 3], units: u32, raw: Dose) -> SplitKey {
    let total: Dose = values.iter().copied().sum();
    let [morning, middle, evening] = values.map(|v| v.ticks());
    let deviation: u64 = [morning, middle, evening]
        .iter()
        .map(|v| (3 * v).abs_diff(total.ticks()))
        .sum();
    (
        evening - middle,
        deviation,
        morning != evening,
        units,
        total.abs_diff(raw).ticks(),
        Reverse(total.ticks()),
    )
}

fn compose_split(counts: [u64; 3], step: Dose, ctx: &ReductionContext) -> Option<[Pieces; 3]> {
    let [a, b, c] = counts.map(|k| {
        decompose_exact(step * k, &ctx.pieces).filter(|p| p.unit_count() <= ctx.max_units_per_slot)
    });
    Some([a?, b?, c?])
}
