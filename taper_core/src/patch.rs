//! Patch combination optimizer.
//!
//! Totals are built from at most two concurrent patches. The chosen total
//! never exceeds the previous one and always moves strictly lower when any
//! lower combination exists.

use crate::strategy::{snap, Tie};
use crate::types::{Dose, PatchRules};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Most patches worn at the same time
pub const MAX_CONCURRENT_PATCHES: usize = 2;

/// Total delivery rate and the patches that make it up, strongest first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchChoice {
    pub total: Dose,
    pub combo: Vec<Dose>,
}

/// Every total reachable with up to [`MAX_CONCURRENT_PATCHES`] patches, keyed by total.
///
/// Zero (no patch) is always present. Each total keeps the combination with
/// the fewest patches, then the strongest single patch.
pub fn achievable_totals(strengths: &[Dose]) -> BTreeMap<Dose, Vec<Dose>> {
    let mut totals: BTreeMap<Dose, Vec<Dose>> = BTreeMap::new();
    totals.insert(Dose::ZERO, Vec::new());

    let mut sorted: Vec<Dose> = strengths.iter().copied().filter(|s| !s.is_zero()).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut offer = |combo: Vec<Dose>| {
        let total: Dose = combo.iter().copied().sum();
        let better = match totals.get(&total) {
            None => true,
            Some(existing) => {
                (combo.len(), Reverse(combo.first().copied()))
                    < (existing.len(), Reverse(existing.first().copied()))
            }
        };
        if better {
            totals.insert(total, combo);
        }
    };

    // Combinations grow one patch per round, strongest first, so each
    // multiset is visited once
    let mut frontier: Vec<(usize, Vec<Dose>)> = vec![(0, Vec::new())];
    for _ in 0..MAX_CONCURRENT_PATCHES {
        let mut grown = Vec::new();
        for (from, combo) in &frontier {
            for (i, strength) in sorted.iter().enumerate().skip(*from) {
                let mut next = combo.clone();
                next.push(*strength);
                offer(next.clone());
                grown.push((i, next));
            }
        }
        frontier = grown;
    }
    totals
}

/// Choose the next patch total after `previous` given an unrounded target
pub fn choose_patch_total(
    previous: Dose,
    raw_target: Dose,
    strengths: &[Dose],
    rules: &PatchRules,
) -> PatchChoice {
    let candidates: Vec<PatchChoice> = achievable_totals(strengths)
        .into_iter()
        .filter(|(total, _)| *total <= previous)
        .map(|(total, combo)| PatchChoice { total, combo })
        .collect();

    let desired = match rules.grid {
        Some(grid) if !grid.is_zero() => snap(raw_target, grid, Tie::Up),
        _ => raw_target,
    };

    let mut choice = candidates
        .iter()
        .min_by_key(|c| (c.total.abs_diff(desired), c.combo.len(), Reverse(c.total)))
        .cloned()
        .unwrap_or(PatchChoice {
            total: Dose::ZERO,
            combo: Vec::new(),
        });

    if let Some(collapse) = rules.collapse {
        let lows = choice.combo.iter().filter(|p| **p == collapse.low).count();
        if lows >= 2 && collapse.double <= previous {
            let mut combo: Vec<Dose> = choice
                .combo
                .iter()
                .copied()
                .filter(|p| *p != collapse.low)
                .collect();
            combo.push(collapse.double);
            combo.sort_unstable_by(|a, b| b.cmp(a));
            tracing::debug!("Collapsed {} x {} into {}", lows, collapse.low, collapse.double);
            choice = PatchChoice {
                total: combo.iter().copied().sum(),
                combo,
            };
        }
    }

    if choice.total >= previous {
        if let Some(lower) = candidates.iter().rev().find(|c| c.total < previous) {
            tracing::debug!(
                "Patch total {} would not move; stepping down to {}",
                choice.total,
                lower.total
            );
            choice = lower.clone();
        }
    }

    tracing::debug!(
        "Patch: previous {}, raw {}, desired {} -> {}",
        previous,
        raw_target,
        desired,
        choice.total
    );
    choice
}
