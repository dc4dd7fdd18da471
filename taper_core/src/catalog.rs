//! Default catalogue of medicine classes, medicines and commercial strengths.
//!
//! Strengths are commercial-only; halves and quarters are derived from the
//! splitting rules, never listed.

use crate::config::CompositionConfig;
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::path::Path;

/// Cached default catalogue - built once and reused across all operations
static DEFAULT_CATALOGUE: Lazy<Catalogue> = Lazy::new(build_default_catalogue);

/// Get a reference to the cached default catalogue
pub fn get_default_catalogue() -> &'static Catalogue {
    &DEFAULT_CATALOGUE
}

fn mg(values: &[f64]) -> Vec<Dose> {
    values.iter().map(|v| Dose::from_mg(*v)).collect()
}

fn formulation(form: DoseForm, strengths: &[f64]) -> Formulation {
    Formulation {
        form,
        strengths: mg(strengths),
        split: None,
        strategy: None,
        rounding_step: None,
        patch: None,
    }
}

fn medicine(key: &str, name: &str, formulations: Vec<Formulation>) -> Medicine {
    Medicine {
        key: key.into(),
        name: name.into(),
        split: None,
        strategy: None,
        formulations,
    }
}

/// Builds the default catalogue
///
/// **Note**: For production use, prefer `get_default_catalogue()` which
/// returns a cached reference.
pub fn build_default_catalogue() -> Catalogue {
    let mut classes = Vec::new();

    // ========================================================================
    // Oral solid, multi-dose-per-day
    // ========================================================================

    classes.push(ClassEntry {
        class: MedicineClass::Opioid,
        label: "Opioid (sustained release)".into(),
        split: SplitRule::WholeOnly,
        strategy: StrategyKind::MultiDose,
        medicines: vec![
            medicine(
                "morphine_sr",
                "Morphine SR",
                vec![formulation(DoseForm::ModifiedRelease, &[5.0, 10.0, 15.0, 30.0, 60.0, 100.0])],
            ),
            medicine(
                "oxycodone_sr",
                "Oxycodone SR",
                vec![formulation(DoseForm::ModifiedRelease, &[5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 80.0])],
            ),
            medicine(
                "hydromorphone_sr",
                "Hydromorphone SR",
                vec![formulation(DoseForm::ModifiedRelease, &[4.0, 8.0, 16.0, 32.0, 64.0])],
            ),
            medicine(
                "tapentadol_sr",
                "Tapentadol SR",
                vec![formulation(DoseForm::ModifiedRelease, &[50.0, 100.0, 150.0, 200.0, 250.0])],
            ),
        ],
    });

    // ========================================================================
    // Acid suppressants
    // ========================================================================

    classes.push(ClassEntry {
        class: MedicineClass::ProtonPumpInhibitor,
        label: "Proton pump inhibitor".into(),
        split: SplitRule::WholeOnly,
        strategy: StrategyKind::AcidSuppressant,
        medicines: vec![
            medicine("esomeprazole", "Esomeprazole", vec![formulation(DoseForm::Tablet, &[20.0, 40.0])]),
            medicine("omeprazole", "Omeprazole", vec![formulation(DoseForm::Capsule, &[10.0, 20.0])]),
            medicine("lansoprazole", "Lansoprazole", vec![formulation(DoseForm::Capsule, &[15.0, 30.0])]),
            medicine("pantoprazole", "Pantoprazole", vec![formulation(DoseForm::Tablet, &[20.0, 40.0])]),
            medicine("rabeprazole", "Rabeprazole", vec![formulation(DoseForm::Tablet, &[10.0, 20.0])]),
        ],
    });

    // ========================================================================
    // Benzodiazepines and Z-drugs (night only)
    // ========================================================================

    let mut zolpidem = medicine(
        "zolpidem_cr",
        "Zolpidem CR",
        vec![formulation(DoseForm::ModifiedRelease, &[6.25, 12.5])],
    );
    zolpidem.split = Some(SplitRule::WholeOnly);

    classes.push(ClassEntry {
        class: MedicineClass::Benzodiazepine,
        label: "Benzodiazepine / Z-drug".into(),
        split: SplitRule::Halves,
        strategy: StrategyKind::Benzodiazepine,
        medicines: vec![
            medicine("alprazolam", "Alprazolam", vec![formulation(DoseForm::Tablet, &[0.25, 0.5, 1.0, 2.0])]),
            medicine("clonazepam", "Clonazepam", vec![formulation(DoseForm::Tablet, &[0.5, 2.0])]),
            medicine("diazepam", "Diazepam", vec![formulation(DoseForm::Tablet, &[2.0, 5.0, 10.0])]),
            medicine("flunitrazepam", "Flunitrazepam", vec![formulation(DoseForm::Tablet, &[1.0])]),
            medicine("lorazepam", "Lorazepam", vec![formulation(DoseForm::Tablet, &[0.5, 1.0, 2.5])]),
            medicine("nitrazepam", "Nitrazepam", vec![formulation(DoseForm::Tablet, &[5.0])]),
            medicine("oxazepam", "Oxazepam", vec![formulation(DoseForm::Tablet, &[15.0, 30.0])]),
            medicine("temazepam", "Temazepam", vec![formulation(DoseForm::Tablet, &[10.0])]),
            zolpidem,
            medicine("zopiclone", "Zopiclone", vec![formulation(DoseForm::Tablet, &[3.75, 7.5])]),
        ],
    });

    // ========================================================================
    // Antipsychotics (immediate release; MR routed to multi-dose)
    // ========================================================================

    let mut quetiapine_ir = formulation(DoseForm::Tablet, &[25.0, 100.0, 200.0, 300.0]);
    quetiapine_ir.rounding_step = Some(Dose::from_mg(12.5));
    let mut quetiapine_xr =
        formulation(DoseForm::ModifiedRelease, &[50.0, 150.0, 200.0, 300.0, 400.0]);
    quetiapine_xr.split = Some(SplitRule::WholeOnly);
    quetiapine_xr.strategy = Some(StrategyKind::MultiDose);

    let mut olanzapine = formulation(DoseForm::Tablet, &[2.5, 5.0, 7.5, 10.0, 15.0, 20.0]);
    olanzapine.rounding_step = Some(Dose::from_mg(1.25));
    let mut risperidone = formulation(DoseForm::Tablet, &[0.5, 1.0, 2.0, 3.0, 4.0]);
    risperidone.rounding_step = Some(Dose::from_mg(0.25));

    classes.push(ClassEntry {
        class: MedicineClass::Antipsychotic,
        label: "Antipsychotic".into(),
        split: SplitRule::Halves,
        strategy: StrategyKind::Antipsychotic,
        medicines: vec![
            medicine("quetiapine", "Quetiapine", vec![quetiapine_ir, quetiapine_xr]),
            medicine("olanzapine", "Olanzapine", vec![olanzapine]),
            medicine("risperidone", "Risperidone", vec![risperidone]),
        ],
    });

    // ========================================================================
    // Gabapentinoids
    // ========================================================================

    let mut gabapentin = medicine(
        "gabapentin",
        "Gabapentin",
        vec![
            formulation(DoseForm::Capsule, &[100.0, 300.0, 400.0]),
            formulation(DoseForm::Tablet, &[600.0, 800.0]),
        ],
    );
    gabapentin.strategy = Some(StrategyKind::Gabapentin);

    classes.push(ClassEntry {
        class: MedicineClass::Gabapentinoid,
        label: "Gabapentinoid".into(),
        split: SplitRule::WholeOnly,
        strategy: StrategyKind::MultiDose,
        medicines: vec![
            medicine(
                "pregabalin",
                "Pregabalin",
                vec![formulation(DoseForm::Capsule, &[25.0, 75.0, 150.0, 300.0])],
            ),
            gabapentin,
        ],
    });

    // ========================================================================
    // Opioid patches
    // ========================================================================

    let mut fentanyl = formulation(DoseForm::Patch, &[12.5, 25.0, 50.0, 75.0, 100.0]);
    fentanyl.patch = Some(PatchRules {
        change_interval_days: 3,
        grid: Some(Dose::from_mg(12.5)),
        collapse: Some(CollapseRule {
            low: Dose::from_mg(12.5),
            double: Dose::from_mg(25.0),
        }),
    });
    let mut buprenorphine = formulation(DoseForm::Patch, &[5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 40.0]);
    buprenorphine.patch = Some(PatchRules {
        change_interval_days: 7,
        grid: None,
        collapse: None,
    });

    classes.push(ClassEntry {
        class: MedicineClass::OpioidPatch,
        label: "Opioid patch".into(),
        split: SplitRule::WholeOnly,
        strategy: StrategyKind::Patch,
        medicines: vec![
            medicine("fentanyl", "Fentanyl", vec![fentanyl]),
            medicine("buprenorphine", "Buprenorphine", vec![buprenorphine]),
        ],
    });

    Catalogue { classes }
}

/// A fully resolved class → medicine → formulation lookup
#[derive(Clone, Copy, Debug)]
pub struct Product<'a> {
    pub class: &'a ClassEntry,
    pub medicine: &'a Medicine,
    pub formulation: &'a Formulation,
}

impl<'a> Product<'a> {
    /// Splitting rule, most specific override first
    pub fn split(&self) -> SplitRule {
        self.formulation
            .split
            .or(self.medicine.split)
            .unwrap_or(self.class.split)
    }

    /// Reduction strategy, most specific override first
    pub fn strategy(&self) -> StrategyKind {
        self.formulation
            .strategy
            .or(self.medicine.strategy)
            .unwrap_or(self.class.strategy)
    }

    /// Splitting rule after composition settings are applied
    pub fn effective_split(&self, composition: &CompositionConfig) -> SplitRule {
        let split = self.split();
        if self.class.class == MedicineClass::Benzodiazepine
            && composition.allow_benzodiazepine_quarters
            && split == SplitRule::Halves
        {
            SplitRule::Quarters
        } else {
            split
        }
    }

    pub fn strengths(&self) -> &'a [Dose] {
        &self.formulation.strengths
    }

    /// Lowest commercially available strength
    pub fn lowest_strength(&self) -> Option<Dose> {
        self.formulation.strengths.iter().copied().min()
    }
}

impl Catalogue {
    /// Load a catalogue from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalogue: Catalogue = toml::from_str(&contents)?;
        let errors = catalogue.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }
        tracing::info!("Loaded catalogue from {:?}", path);
        Ok(catalogue)
    }

    pub fn class(&self, class: MedicineClass) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.class == class)
    }

    /// Resolve a product; errors name what could not be found
    pub fn product(
        &self,
        class: MedicineClass,
        medicine_key: &str,
        form: DoseForm,
    ) -> Result<Product<'_>> {
        let entry = self
            .class(class)
            .ok_or_else(|| Error::UnknownMedicine(format!("class '{}' not in catalogue", class)))?;
        let medicine = entry
            .medicines
            .iter()
            .find(|m| m.key == medicine_key)
            .ok_or_else(|| {
                Error::UnknownMedicine(format!("'{}' is not a {} medicine", medicine_key, class))
            })?;
        let formulation = medicine
            .formulations
            .iter()
            .find(|f| f.form == form)
            .ok_or_else(|| {
                Error::UnknownMedicine(format!("'{}' has no {} form", medicine_key, form))
            })?;
        Ok(Product {
            class: entry,
            medicine,
            formulation,
        })
    }

    /// Validate the catalogue for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (i, entry) in self.classes.iter().enumerate() {
            if self.classes[..i].iter().any(|c| c.class == entry.class) {
                errors.push(format!("Class '{}' listed more than once", entry.class));
            }
            if entry.medicines.is_empty() {
                errors.push(format!("Class '{}' has no medicines", entry.class));
            }

            for med in &entry.medicines {
                if med.key.is_empty() {
                    errors.push(format!("Class '{}' has a medicine with empty key", entry.class));
                }
                if med.name.is_empty() {
                    errors.push(format!("Medicine '{}' has empty name", med.key));
                }
                if med.formulations.is_empty() {
                    errors.push(format!("Medicine '{}' has no formulations", med.key));
                }

                for form in &med.formulations {
                    let product = Product {
                        class: entry,
                        medicine: med,
                        formulation: form,
                    };
                    if form.strengths.is_empty() {
                        errors.push(format!("Medicine '{}' ({}) has no strengths", med.key, form.form));
                    }
                    if form.strengths.iter().any(|s| s.is_zero()) {
                        errors.push(format!(
                            "Medicine '{}' ({}) lists a non-positive strength",
                            med.key, form.form
                        ));
                    }
                    if form.strengths.windows(2).any(|w| w[0] >= w[1]) {
                        errors.push(format!(
                            "Medicine '{}' ({}) strengths must be strictly ascending",
                            med.key, form.form
                        ));
                    }
                    if form.rounding_step.is_some_and(|s| s.is_zero()) {
                        errors.push(format!(
                            "Medicine '{}' ({}) has a zero rounding step",
                            med.key, form.form
                        ));
                    }

                    let is_patch = product.strategy() == StrategyKind::Patch;
                    match (&form.patch, is_patch) {
                        (None, true) => errors.push(format!(
                            "Patch medicine '{}' has no patch rules",
                            med.key
                        )),
                        (Some(_), false) => errors.push(format!(
                            "Medicine '{}' ({}) has patch rules but is not a patch",
                            med.key, form.form
                        )),
                        (Some(rules), true) if rules.change_interval_days == 0 => {
                            errors.push(format!(
                                "Patch medicine '{}' has a zero change interval",
                                med.key
                            ))
                        }
                        _ => {}
                    }
                }
            }
        }

        errors
    }
}
