//! Per-class reduction strategies.
//!
//! Every strategy follows the same skeleton:
//! 1. raw target = current total × (1 − percent/100)
//! 2. snap to the class grid (ties round up unless the class says otherwise)
//! 3. if the snapped target did not move, force one grid step down
//! 4. shave the difference from slots in the class order and recompose

mod acid;
mod antipsychotic;
mod benzodiazepine;
mod gabapentin;
mod multi_dose;

use crate::catalog::Product;
use crate::compose::{allowed_pieces, common_step, compose, smallest_piece};
use crate::config::CompositionConfig;
use crate::patch;
use crate::types::*;
use crate::{Error, Result};

/// What a strategy decided for the next boundary
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Continue with this regimen; a zero regimen means stop
    Dose(Regimen),
    /// Evening-only hold; the following boundary is a Stop
    SingleSided(Regimen),
    /// Hand off to clinical review
    Review,
    Stop,
}

/// Direction for exact ties when snapping to the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tie {
    Up,
    Down,
}

/// Everything a strategy needs besides the regimen, fixed for one plan
#[derive(Clone, Debug)]
pub struct ReductionContext {
    /// Pieces composition may use, largest first
    pub pieces: Vec<Piece>,
    /// Grid increment
    pub step: Dose,
    pub selection_active: bool,
    pub lowest_selected: Dose,
    pub lowest_available: Dose,
    /// Antipsychotic shave order; always lists all four slots
    pub slot_order: Vec<Slot>,
    pub max_units_per_slot: u32,
    /// Strengths in use for patch combinations
    pub patch_strengths: Vec<Dose>,
    pub patch_rules: Option<PatchRules>,
}

impl ReductionContext {
    /// Build the context for a product and an optional strength selection
    pub fn new(
        product: &Product<'_>,
        selection: &[Dose],
        slot_order: Option<&[Slot]>,
        composition: &CompositionConfig,
    ) -> Result<Self> {
        let available = product.strengths();
        if let Some(missing) = selection.iter().find(|s| !available.contains(s)) {
            return Err(Error::Config(format!(
                "Selected strength {} is not available for {}",
                missing, product.medicine.name
            )));
        }

        let mut in_use: Vec<Dose> = if selection.is_empty() {
            available.to_vec()
        } else {
            selection.to_vec()
        };
        in_use.sort_unstable();
        in_use.dedup();

        let strategy = product.strategy();
        let pieces = allowed_pieces(&in_use, product.effective_split(composition));
        let step = match strategy {
            StrategyKind::Benzodiazepine => common_step(&pieces),
            StrategyKind::Patch => product
                .formulation
                .patch
                .as_ref()
                .and_then(|rules| rules.grid)
                .or_else(|| in_use.first().copied()),
            _ => product
                .formulation
                .rounding_step
                .or_else(|| smallest_piece(&pieces)),
        }
        .filter(|s| !s.is_zero())
        .ok_or_else(|| {
            Error::Config(format!(
                "No dispensable strengths for {} ({})",
                product.medicine.name, product.formulation.form
            ))
        })?;

        let mut order: Vec<Slot> = Vec::with_capacity(Slot::ALL.len());
        for slot in slot_order.unwrap_or(&Slot::ALL[..]).iter().chain(Slot::ALL.iter()) {
            if !order.contains(slot) {
                order.push(*slot);
            }
        }

        let lowest_available = product.lowest_strength().unwrap_or(step);
        let lowest_selected = in_use.first().copied().unwrap_or(lowest_available);

        tracing::debug!(
            "Reduction context for {}: {:?}, grid {}, {} piece sizes",
            product.medicine.name,
            strategy,
            step,
            pieces.len()
        );

        Ok(Self {
            pieces,
            step,
            selection_active: !selection.is_empty(),
            lowest_selected,
            lowest_available,
            slot_order: order,
            max_units_per_slot: composition.max_units_per_slot,
            patch_strengths: in_use,
            patch_rules: product.formulation.patch.clone(),
        })
    }

    pub(crate) fn compose(&self, target: Dose) -> Pieces {
        compose(target, &self.pieces, self.step)
    }
}

impl StrategyKind {
    /// Compute the regimen for the next boundary
    pub fn reduce(self, regimen: &Regimen, percent: f64, ctx: &ReductionContext) -> Outcome {
        match (self, regimen) {
            (StrategyKind::Patch, Regimen::Patch(set)) => reduce_patches(set, percent, ctx),
            (StrategyKind::MultiDose, Regimen::Oral(oral)) => multi_dose::reduce(oral, percent, ctx),
            (StrategyKind::AcidSuppressant, Regimen::Oral(oral)) => acid::reduce(oral, percent, ctx),
            (StrategyKind::Benzodiazepine, Regimen::Oral(oral)) => {
                benzodiazepine::reduce(oral, percent, ctx)
            }
            (StrategyKind::Antipsychotic, Regimen::Oral(oral)) => {
                antipsychotic::reduce(oral, percent, ctx)
            }
            (StrategyKind::Gabapentin, Regimen::Oral(oral)) => gabapentin::reduce(oral, percent, ctx),
            (kind, _) => {
                tracing::error!("{:?} cannot reduce a regimen of the other form", kind);
                Outcome::Review
            }
        }
    }

    pub fn is_patch(self) -> bool {
        self == StrategyKind::Patch
    }
}

fn reduce_patches(set: &PatchSet, percent: f64, ctx: &ReductionContext) -> Outcome {
    let Some(rules) = ctx.patch_rules.as_ref() else {
        tracing::error!("Patch regimen without patch rules");
        return Outcome::Review;
    };
    let previous = set.total();
    let choice = patch::choose_patch_total(
        previous,
        raw_target(previous, percent),
        &ctx.patch_strengths,
        rules,
    );
    if choice.total.is_zero() {
        Outcome::Stop
    } else {
        Outcome::Dose(Regimen::Patch(PatchSet::new(choice.combo)))
    }
}

// ============================================================================
// Shared grid arithmetic
// ============================================================================

/// Unrounded target after a percentage cut
pub fn raw_target(current: Dose, percent: f64) -> Dose {
    current.scale(1.0 - percent / 100.0)
}

/// Nearest grid value to `raw`; `tie` decides exact midpoints
pub fn snap(raw: Dose, step: Dose, tie: Tie) -> Dose {
    let lower = raw.floor_to(step);
    if lower == raw || step.is_zero() {
        return raw;
    }
    let upper = lower + step;
    match (raw - lower).cmp(&(upper - raw)) {
        std::cmp::Ordering::Less => lower,
        std::cmp::Ordering::Greater => upper,
        std::cmp::Ordering::Equal => match tie {
            Tie::Up => upper,
            Tie::Down => lower,
        },
    }
}

/// Largest grid value strictly below `current`
pub fn step_below(current: Dose, step: Dose) -> Dose {
    if current.is_multiple_of(step) {
        current - step
    } else {
        current.floor_to(step)
    }
}

/// A computed step must reduce the dose or reach zero
pub fn progress_guard(current: Dose, candidate: Dose, step: Dose) -> Dose {
    if candidate >= current {
        step_below(current, step)
    } else {
        candidate
    }
}

/// Snapped, progress-guarded total for the next boundary
pub fn next_total(current: Dose, percent: f64, step: Dose, tie: Tie) -> Dose {
    let snapped = snap(raw_target(current, percent), step, tie);
    progress_guard(current, snapped, step)
}

/// Take up to `amount` out of one slot and recompose it.
///
/// Returns the part of `amount` still to be absorbed elsewhere.
pub(crate) fn take_from(
    regimen: &mut OralRegimen,
    slot: Slot,
    amount: Dose,
    ctx: &ReductionContext,
) -> Dose {
    let have = regimen.slot_total(slot);
    if have.is_zero() || amount.is_zero() {
        return amount;
    }
    let kept = ctx.compose(have - amount.min(have));
    let removed = have - kept.total();
    regimen.set(slot, kept);
    amount - removed
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn mg(v: f64) -> Dose {
        Dose::from_mg(v)
    }

    /// Context over explicit strengths, without a catalogue
    pub fn context(strengths: &[f64], split: SplitRule, step: Option<f64>) -> ReductionContext {
        let in_use: Vec<Dose> = strengths.iter().map(|s| mg(*s)).collect();
        let pieces = allowed_pieces(&in_use, split);
        let step = step.map(mg).or_else(|| smallest_piece(&pieces)).unwrap();
        ReductionContext {
            pieces,
            step,
            selection_active: false,
            lowest_selected: in_use[0],
            lowest_available: in_use[0],
            slot_order: Slot::ALL.to_vec(),
            max_units_per_slot: 4,
            patch_strengths: in_use,
            patch_rules: None,
        }
    }

    pub fn oral(slots: &[(Slot, &[(f64, u32)])]) -> OralRegimen {
        let mut regimen = OralRegimen::new();
        for (slot, units) in slots {
            let mut pieces = Pieces::new();
            for (strength, count) in units.iter() {
                pieces.add_quarters(mg(*strength), count * 4);
            }
            regimen.set(*slot, pieces);
        }
        regimen
    }

    pub fn dose_of(outcome: &Outcome) -> &OralRegimen {
        match outcome {
            Outcome::Dose(Regimen::Oral(oral)) | Outcome::SingleSided(Regimen::Oral(oral)) => oral,
            other => panic!("expected an oral dose, got {:?}", other),
        }
    }
}
