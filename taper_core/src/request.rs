//! Plan requests: the captured starting regimen and phase configuration.

use crate::catalog::Product;
use crate::config::CompositionConfig;
use crate::types::*;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One captured dose line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseLine {
    /// Slot for once-daily codes; ignored for BID/TID/QID and patches
    #[serde(default)]
    pub slot: Option<Slot>,
    pub strength: Dose,
    /// Tablets (possibly fractional) or patches per occurrence
    pub quantity: f64,
    #[serde(default)]
    pub frequency: Frequency,
}

/// Everything needed to generate one plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub class: MedicineClass,
    pub medicine: String,
    pub form: DoseForm,
    pub lines: Vec<DoseLine>,
    pub phase1: Phase,
    #[serde(default)]
    pub phase2: Option<Phase>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub review_date: Option<NaiveDate>,
    /// Restrict composition to these strengths; empty means all
    #[serde(default)]
    pub selected_strengths: Vec<Dose>,
    /// Antipsychotic shave order
    #[serde(default)]
    pub slot_order: Option<Vec<Slot>>,
}

fn check_phase(label: &str, phase: &Phase) -> Result<()> {
    if !phase.percent.is_finite() || phase.percent <= 0.0 || phase.percent > 100.0 {
        return Err(Error::Config(format!(
            "{} percent must be above 0 and at most 100 (got {})",
            label, phase.percent
        )));
    }
    if phase.interval_days == 0 {
        return Err(Error::Config(format!(
            "{} interval must be at least one day",
            label
        )));
    }
    Ok(())
}

impl PlanRequest {
    /// Reject configurations that cannot produce a plan
    pub fn validate(&self) -> Result<()> {
        check_phase("Phase 1", &self.phase1)?;

        if let Some(phase2) = &self.phase2 {
            check_phase("Phase 2", phase2)?;
            match phase2.start {
                Some(start) if start < self.start_date => {
                    return Err(Error::Config(format!(
                        "Phase 2 start {} is before the plan start {}",
                        start, self.start_date
                    )));
                }
                None => tracing::warn!("Phase 2 has no start date and will not be used"),
                _ => {}
            }
        }

        if let Some(review) = self.review_date {
            if review <= self.start_date {
                return Err(Error::Config(format!(
                    "Review date {} must be after the plan start {}",
                    review, self.start_date
                )));
            }
        }

        if self.lines.is_empty() {
            return Err(Error::Config("Please add at least one dose line".into()));
        }
        Ok(())
    }

    /// Switch medicine or form; any strength selection no longer applies
    pub fn change_formulation(&mut self, medicine: &str, form: DoseForm) {
        if self.medicine != medicine || self.form != form {
            self.selected_strengths.clear();
        }
        self.medicine = medicine.to_string();
        self.form = form;
    }

    /// Build the starting regimen from the dose lines
    pub fn capture_regimen(
        &self,
        product: &Product<'_>,
        composition: &CompositionConfig,
    ) -> Result<Regimen> {
        let strengths = product.strengths();
        for line in &self.lines {
            if !strengths.contains(&line.strength) {
                return Err(Error::Config(format!(
                    "{} is not a {} strength of {}",
                    line.strength, product.formulation.form, product.medicine.name
                )));
            }
        }
        let lines = self.lines.iter().filter(|line| {
            let keep = line.quantity.is_finite() && line.quantity > 0.0;
            if !keep {
                tracing::debug!("Skipping dose line with quantity {}", line.quantity);
            }
            keep
        });

        let regimen = if product.strategy().is_patch() {
            let mut patches = Vec::new();
            for line in lines {
                if line.quantity.fract() != 0.0 {
                    return Err(Error::Config(format!(
                        "Patches cannot be split (got {} x {})",
                        line.quantity, line.strength
                    )));
                }
                patches.extend(std::iter::repeat(line.strength).take(line.quantity as usize));
            }
            Regimen::Patch(PatchSet::new(patches))
        } else {
            let night_only = product.strategy() == StrategyKind::Benzodiazepine;
            let min_quarters = product.effective_split(composition).min_quarters();
            let mut oral = OralRegimen::new();

            for line in lines {
                let quarters_f = line.quantity * 4.0;
                let quarters = quarters_f.round() as u32;
                if (quarters_f - quarters as f64).abs() > 1e-6 || quarters % min_quarters != 0 {
                    return Err(Error::Config(format!(
                        "{} x {} mg cannot be dispensed as {}",
                        line.quantity,
                        line.strength,
                        product.effective_split(composition).describe()
                    )));
                }

                let default_slot = if night_only { Slot::Night } else { Slot::Morning };
                for slot in line.frequency.slots(line.slot.or(Some(default_slot))) {
                    if night_only && slot != Slot::Night {
                        tracing::warn!(
                            "Dropping {} dose of {}: this class is dosed at night only",
                            slot,
                            product.medicine.name
                        );
                        continue;
                    }
                    let mut pieces = oral.get(slot).cloned().unwrap_or_default();
                    pieces.add_quarters(line.strength, quarters);
                    oral.set(slot, pieces);
                }
            }
            Regimen::Oral(oral)
        };

        if regimen.is_zero() {
            return Err(Error::Config("The starting regimen is empty".into()));
        }
        tracing::debug!("Captured starting regimen totalling {}", regimen.total());
        Ok(regimen)
    }
}

/// Read a plan request from a JSON file
pub fn load_request(path: &Path) -> Result<PlanRequest> {
    let contents = std::fs::read_to_string(path)?;
    let request: PlanRequest = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded plan request from {:?}", path);
    Ok(request)
}
