//! Core domain types for the taper planner.
//!
//! This module defines the fundamental types used throughout the system:
//! - Fixed-point dose magnitudes and dispensable pieces
//! - Time-of-day slots and regimens (oral and patch)
//! - Phases and the steps of a generated plan
//! - Catalogue structure (classes, medicines, formulations)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

// ============================================================================
// Dose Magnitudes
// ============================================================================

/// Ticks per milligram (or per mcg/hr for patches).
pub const DOSE_SCALE: u64 = 10_000;

/// A non-negative dose magnitude stored as fixed-point ticks.
///
/// One tick is 1/10000 of a milligram, which keeps quarter pieces of every
/// commercial strength exact. Serialised as a plain number of milligrams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Dose(u64);

impl Dose {
    pub const ZERO: Dose = Dose(0);

    /// Convert from milligrams; negative or non-finite input maps to zero.
    pub fn from_mg(mg: f64) -> Self {
        if !mg.is_finite() || mg <= 0.0 {
            return Dose::ZERO;
        }
        Dose((mg * DOSE_SCALE as f64).round() as u64)
    }

    pub const fn from_ticks(ticks: u64) -> Self {
        Dose(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    pub fn as_mg(self) -> f64 {
        self.0 as f64 / DOSE_SCALE as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiply by a non-negative factor, rounding to the nearest tick.
    pub fn scale(self, factor: f64) -> Dose {
        if !factor.is_finite() || factor <= 0.0 {
            return Dose::ZERO;
        }
        Dose((self.0 as f64 * factor).round() as u64)
    }

    /// Largest multiple of `step` that is not above `self`.
    pub fn floor_to(self, step: Dose) -> Dose {
        if step.is_zero() {
            return self;
        }
        Dose(self.0 / step.0 * step.0)
    }

    pub fn is_multiple_of(self, step: Dose) -> bool {
        step.is_zero() || self.0 % step.0 == 0
    }

    pub fn saturating_sub(self, rhs: Dose) -> Dose {
        Dose(self.0.saturating_sub(rhs.0))
    }

    pub fn abs_diff(self, other: Dose) -> Dose {
        Dose(self.0.abs_diff(other.0))
    }

    /// Split into `parts` equal shares, rounding down to the tick.
    pub fn div_floor(self, parts: u64) -> Dose {
        if parts == 0 {
            return self;
        }
        Dose(self.0 / parts)
    }
}

impl From<f64> for Dose {
    fn from(mg: f64) -> Self {
        Dose::from_mg(mg)
    }
}

impl From<Dose> for f64 {
    fn from(dose: Dose) -> Self {
        dose.as_mg()
    }
}

impl Add for Dose {
    type Output = Dose;
    fn add(self, rhs: Dose) -> Dose {
        Dose(self.0 + rhs.0)
    }
}

impl AddAssign for Dose {
    fn add_assign(&mut self, rhs: Dose) {
        self.0 += rhs.0;
    }
}

/// Saturates at zero; a dose is never negative.
impl Sub for Dose {
    type Output = Dose;
    fn sub(self, rhs: Dose) -> Dose {
        self.saturating_sub(rhs)
    }
}

impl Mul<u64> for Dose {
    type Output = Dose;
    fn mul(self, rhs: u64) -> Dose {
        Dose(self.0 * rhs)
    }
}

impl Sum for Dose {
    fn sum<I: Iterator<Item = Dose>>(iter: I) -> Dose {
        iter.fold(Dose::ZERO, Add::add)
    }
}

impl fmt::Display for Dose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mg())
    }
}

// ============================================================================
// Pieces
// ============================================================================

/// Portion of a tablet that may be dispensed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fraction {
    Whole,
    Half,
    Quarter,
}

impl Fraction {
    /// Number of quarter-tablets this portion represents
    pub fn quarters(self) -> u32 {
        match self {
            Fraction::Whole => 4,
            Fraction::Half => 2,
            Fraction::Quarter => 1,
        }
    }
}

/// Which fractions of a strength a formulation may be split into.
///
/// Quarters always imply halves.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    WholeOnly,
    Halves,
    Quarters,
}

impl SplitRule {
    pub fn fractions(self) -> &'static [Fraction] {
        match self {
            SplitRule::WholeOnly => &[Fraction::Whole],
            SplitRule::Halves => &[Fraction::Whole, Fraction::Half],
            SplitRule::Quarters => &[Fraction::Whole, Fraction::Half, Fraction::Quarter],
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            SplitRule::WholeOnly => "whole units",
            SplitRule::Halves => "whole or half tablets",
            SplitRule::Quarters => "whole, half or quarter tablets",
        }
    }

    /// Smallest permitted portion, in quarter-tablets
    pub fn min_quarters(self) -> u32 {
        match self {
            SplitRule::WholeOnly => 4,
            SplitRule::Halves => 2,
            SplitRule::Quarters => 1,
        }
    }
}

/// A dispensable portion of one commercial strength
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub strength: Dose,
    pub fraction: Fraction,
}

impl Piece {
    pub fn magnitude(&self) -> Dose {
        Dose::from_ticks(self.strength.ticks() * self.fraction.quarters() as u64 / 4)
    }
}

/// A multiset of pieces for one slot, keyed by strength.
///
/// Counts are held in quarter-tablets so 1.5 tablets of 10 mg is `{10: 6}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<PieceCount>", from = "Vec<PieceCount>")]
pub struct Pieces {
    quarters: BTreeMap<Dose, u32>,
}

/// Serialised form of one entry in [`Pieces`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PieceCount {
    pub strength: Dose,
    /// Tablets or capsules, possibly fractional
    pub quantity: f64,
}

impl Pieces {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` whole units of one strength
    pub fn whole(strength: Dose, count: u32) -> Self {
        let mut pieces = Self::new();
        pieces.add_quarters(strength, count * 4);
        pieces
    }

    pub fn add_quarters(&mut self, strength: Dose, quarters: u32) {
        if quarters == 0 || strength.is_zero() {
            return;
        }
        *self.quarters.entry(strength).or_insert(0) += quarters;
    }

    pub fn add_piece(&mut self, piece: Piece, count: u32) {
        self.add_quarters(piece.strength, piece.fraction.quarters() * count);
    }

    pub fn quarters_of(&self, strength: Dose) -> u32 {
        self.quarters.get(&strength).copied().unwrap_or(0)
    }

    pub fn total(&self) -> Dose {
        self.quarters
            .iter()
            .map(|(strength, q)| Dose::from_ticks(strength.ticks() * *q as u64 / 4))
            .sum()
    }

    /// Number of physical pieces handed out (a tablet and a half counts as two)
    pub fn unit_count(&self) -> u32 {
        self.quarters
            .values()
            .map(|q| q / 4 + (q % 4).count_ones())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.quarters.is_empty()
    }

    /// Iterate `(strength, quarters)` from the highest strength down
    pub fn iter(&self) -> impl Iterator<Item = (Dose, u32)> + '_ {
        self.quarters.iter().rev().map(|(s, q)| (*s, *q))
    }
}

impl From<Pieces> for Vec<PieceCount> {
    fn from(pieces: Pieces) -> Self {
        pieces
            .iter()
            .map(|(strength, q)| PieceCount {
                strength,
                quantity: q as f64 / 4.0,
            })
            .collect()
    }
}

impl From<Vec<PieceCount>> for Pieces {
    fn from(counts: Vec<PieceCount>) -> Self {
        let mut pieces = Pieces::new();
        for c in counts {
            if c.quantity.is_finite() && c.quantity > 0.0 {
                pieces.add_quarters(c.strength, (c.quantity * 4.0).round() as u32);
            }
        }
        pieces
    }
}

/// Render a quarter-tablet count as a table cell (`1 + ½`, `¾`, `2`)
pub fn quarters_to_cell(quarters: u32) -> String {
    let whole = quarters / 4;
    let glyph = match quarters % 4 {
        1 => "¼",
        2 => "½",
        3 => "¾",
        _ => return whole.to_string(),
    };
    if whole == 0 {
        glyph.to_string()
    } else {
        format!("{} + {}", whole, glyph)
    }
}

impl fmt::Display for Pieces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(strength, q)| format!("{} x {} mg", quarters_to_cell(q), strength))
            .collect();
        write!(f, "{}", parts.join(" + "))
    }
}

// ============================================================================
// Slots and Regimens
// ============================================================================

/// Time-of-day dosing occasion, in clock order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Morning,
    Midday,
    Dinner,
    Night,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Morning, Slot::Midday, Slot::Dinner, Slot::Night];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Slot::Morning => "Morning",
            Slot::Midday => "Midday",
            Slot::Dinner => "Dinner",
            Slot::Night => "Night",
        };
        f.write_str(label)
    }
}

/// Daily oral regimen; only occupied slots are stored
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OralRegimen {
    slots: BTreeMap<Slot, Pieces>,
}

impl OralRegimen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<&Pieces> {
        self.slots.get(&slot)
    }

    pub fn slot_total(&self, slot: Slot) -> Dose {
        self.slots.get(&slot).map(Pieces::total).unwrap_or_default()
    }

    /// Replace a slot; empty pieces clear it
    pub fn set(&mut self, slot: Slot, pieces: Pieces) {
        if pieces.is_empty() {
            self.slots.remove(&slot);
        } else {
            self.slots.insert(slot, pieces);
        }
    }

    pub fn with_slot(mut self, slot: Slot, pieces: Pieces) -> Self {
        self.set(slot, pieces);
        self
    }

    pub fn total(&self) -> Dose {
        self.slots.values().map(Pieces::total).sum()
    }

    /// Slots holding a non-zero dose, in clock order
    pub fn occupied(&self) -> Vec<Slot> {
        self.slots
            .iter()
            .filter(|(_, p)| !p.total().is_zero())
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Pieces)> + '_ {
        self.slots.iter().map(|(s, p)| (*s, p))
    }
}

/// Concurrently worn patches, strongest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    patches: Vec<Dose>,
}

impl PatchSet {
    pub fn new(mut patches: Vec<Dose>) -> Self {
        patches.retain(|p| !p.is_zero());
        patches.sort_unstable_by(|a, b| b.cmp(a));
        Self { patches }
    }

    pub fn patches(&self) -> &[Dose] {
        &self.patches
    }

    pub fn total(&self) -> Dose {
        self.patches.iter().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl fmt::Display for PatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .patches
            .iter()
            .map(|p| format!("{} mcg/hr", p))
            .collect();
        write!(f, "{}", parts.join(" + "))
    }
}

/// Everything scheduled for one day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Regimen {
    Oral(OralRegimen),
    Patch(PatchSet),
}

impl Regimen {
    /// Total daily dose (mg), or total delivery rate (mcg/hr) for patches
    pub fn total(&self) -> Dose {
        match self {
            Regimen::Oral(oral) => oral.total(),
            Regimen::Patch(set) => set.total(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }

    pub fn as_oral(&self) -> Option<&OralRegimen> {
        match self {
            Regimen::Oral(oral) => Some(oral),
            Regimen::Patch(_) => None,
        }
    }

    pub fn as_patch(&self) -> Option<&PatchSet> {
        match self {
            Regimen::Patch(set) => Some(set),
            Regimen::Oral(_) => None,
        }
    }
}

// ============================================================================
// Phases and Plan Steps
// ============================================================================

/// A reduction policy: cut `percent` every `interval_days`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub percent: f64,
    pub interval_days: u32,
    /// Ignored for phase 1, which always starts with the plan
    #[serde(default)]
    pub start: Option<NaiveDate>,
}

/// What a plan row instructs
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    Dose { regimen: Regimen, phase: u8 },
    Stop,
    Review,
}

/// One dated row of a plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, StepKind::Dose { .. })
    }

    pub fn regimen(&self) -> Option<&Regimen> {
        match &self.kind {
            StepKind::Dose { regimen, .. } => Some(regimen),
            _ => None,
        }
    }
}

/// A generated taper plan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaperPlan {
    pub class: MedicineClass,
    pub medicine: String,
    pub form: DoseForm,
    pub steps: Vec<Step>,
}

// ============================================================================
// Request Vocabulary
// ============================================================================

/// Frequency code captured with each dose line
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Once,
    #[default]
    Od,
    Bid,
    Tid,
    Qid,
}

impl Frequency {
    /// Slots a line at this frequency occupies; `slot` applies to single-dose codes
    pub fn slots(self, slot: Option<Slot>) -> Vec<Slot> {
        match self {
            Frequency::Once | Frequency::Od => vec![slot.unwrap_or(Slot::Morning)],
            Frequency::Bid => vec![Slot::Morning, Slot::Night],
            Frequency::Tid => vec![Slot::Morning, Slot::Midday, Slot::Night],
            Frequency::Qid => Slot::ALL.to_vec(),
        }
    }
}

// ============================================================================
// Catalogue Types
// ============================================================================

/// Medicine class; each class has its own reduction policy
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MedicineClass {
    Opioid,
    ProtonPumpInhibitor,
    Benzodiazepine,
    Antipsychotic,
    Gabapentinoid,
    OpioidPatch,
}

impl fmt::Display for MedicineClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MedicineClass::Opioid => "opioid",
            MedicineClass::ProtonPumpInhibitor => "proton_pump_inhibitor",
            MedicineClass::Benzodiazepine => "benzodiazepine",
            MedicineClass::Antipsychotic => "antipsychotic",
            MedicineClass::Gabapentinoid => "gabapentinoid",
            MedicineClass::OpioidPatch => "opioid_patch",
        };
        f.write_str(label)
    }
}

/// Dose form of a formulation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseForm {
    Tablet,
    Capsule,
    ModifiedRelease,
    Patch,
}

impl fmt::Display for DoseForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DoseForm::Tablet => "tablet",
            DoseForm::Capsule => "capsule",
            DoseForm::ModifiedRelease => "modified_release",
            DoseForm::Patch => "patch",
        };
        f.write_str(label)
    }
}

/// Reduction policy applied at each boundary
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Dinner, then midday, then an even morning/night split
    MultiDose,
    /// Fixed order: midday, night, morning, dinner
    AcidSuppressant,
    /// Night-only dosing on a GCD grid
    Benzodiazepine,
    /// Clinician-ordered slots on a per-medicine grid
    Antipsychotic,
    /// QID dinner shave, balanced TID search, BID as multi-dose
    Gabapentin,
    /// Discrete patch combinations
    Patch,
}

/// Merge two `low` patches into one `double` patch
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollapseRule {
    pub low: Dose,
    pub double: Dose,
}

/// Patch-specific configuration for one formulation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatchRules {
    /// Days each patch is worn; reduction intervals must be a multiple
    pub change_interval_days: u32,
    /// Clinical grid the desired total is snapped to before comparison
    #[serde(default)]
    pub grid: Option<Dose>,
    #[serde(default)]
    pub collapse: Option<CollapseRule>,
}

/// One dispensable product line of a medicine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Formulation {
    pub form: DoseForm,
    /// Commercial strengths, ascending
    pub strengths: Vec<Dose>,
    #[serde(default)]
    pub split: Option<SplitRule>,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    /// Fixed clinical rounding increment; smallest piece otherwise
    #[serde(default)]
    pub rounding_step: Option<Dose>,
    #[serde(default)]
    pub patch: Option<PatchRules>,
}

/// A medicine within a class
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Medicine {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub split: Option<SplitRule>,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    pub formulations: Vec<Formulation>,
}

/// A medicine class with its defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassEntry {
    pub class: MedicineClass,
    pub label: String,
    pub split: SplitRule,
    pub strategy: StrategyKind,
    pub medicines: Vec<Medicine>,
}

/// The complete catalogue of classes, medicines and strengths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalogue {
    pub classes: Vec<ClassEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_fixed_point() {
        assert_eq!(Dose::from_mg(12.5).ticks(), 125_000);
        assert_eq!(Dose::from_mg(-3.0), Dose::ZERO);
        assert_eq!(Dose::from_mg(f64::NAN), Dose::ZERO);
        assert_eq!(Dose::from_mg(30.0) - Dose::from_mg(40.0), Dose::ZERO);
        assert_eq!(Dose::from_mg(37.0).floor_to(Dose::from_mg(10.0)), Dose::from_mg(30.0));
        assert_eq!(Dose::from_mg(1.875).to_string(), "1.875");
        assert_eq!(Dose::from_mg(30.0).to_string(), "30");
    }

    #[test]
    fn test_pieces_totals_and_units() {
        let mut pieces = Pieces::whole(Dose::from_mg(10.0), 1);
        pieces.add_quarters(Dose::from_mg(10.0), 2);
        pieces.add_quarters(Dose::from_mg(2.0), 3);

        assert_eq!(pieces.total(), Dose::from_mg(16.5));
        // 1 whole + 1 half of 10, then a half and a quarter of 2
        assert_eq!(pieces.unit_count(), 4);
    }

    #[test]
    fn test_quarters_to_cell() {
        assert_eq!(quarters_to_cell(4), "1");
        assert_eq!(quarters_to_cell(2), "½");
        assert_eq!(quarters_to_cell(6), "1 + ½");
        assert_eq!(quarters_to_cell(11), "2 + ¾");
    }

    #[test]
    fn test_pieces_serde_as_quantities() {
        let mut pieces = Pieces::whole(Dose::from_mg(20.0), 1);
        pieces.add_quarters(Dose::from_mg(5.0), 2);

        let json = serde_json::to_string(&pieces).unwrap();
        assert!(json.contains("\"quantity\":0.5"));

        let parsed: Pieces = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pieces);
    }

    #[test]
    fn test_oral_regimen_drops_empty_slots() {
        let regimen = OralRegimen::new()
            .with_slot(Slot::Morning, Pieces::whole(Dose::from_mg(40.0), 1))
            .with_slot(Slot::Midday, Pieces::new())
            .with_slot(Slot::Night, Pieces::whole(Dose::from_mg(20.0), 2));

        assert_eq!(regimen.occupied(), vec![Slot::Morning, Slot::Night]);
        assert_eq!(regimen.total(), Dose::from_mg(80.0));
    }

    #[test]
    fn test_patch_set_sorted() {
        let set = PatchSet::new(vec![Dose::from_mg(12.5), Dose::ZERO, Dose::from_mg(25.0)]);
        assert_eq!(set.patches(), &[Dose::from_mg(25.0), Dose::from_mg(12.5)]);
        assert_eq!(set.total(), Dose::from_mg(37.5));
    }

    #[test]
    fn test_frequency_expansion() {
        assert_eq!(Frequency::Bid.slots(None), vec![Slot::Morning, Slot::Night]);
        assert_eq!(Frequency::Od.slots(Some(Slot::Dinner)), vec![Slot::Dinner]);
        assert_eq!(Frequency::Qid.slots(Some(Slot::Night)).len(), 4);
    }

    #[test]
    fn test_step_serializes_kind() {
        let step = Step {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            kind: StepKind::Stop,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"kind\":\"stop\""));
    }
}
