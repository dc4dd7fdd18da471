//! Plan export: CSV rows and a plain-text table.

use crate::types::*;
use crate::Result;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    kind: &'static str,
    phase: Option<u8>,
    morning: String,
    midday: String,
    dinner: String,
    night: String,
    patches: String,
    total: Option<f64>,
}

impl From<&Step> for CsvRow {
    fn from(step: &Step) -> Self {
        let mut row = CsvRow {
            date: step.date.to_string(),
            kind: "",
            phase: None,
            morning: String::new(),
            midday: String::new(),
            dinner: String::new(),
            night: String::new(),
            patches: String::new(),
            total: None,
        };

        match &step.kind {
            StepKind::Dose { regimen, phase } => {
                row.kind = "dose";
                row.phase = Some(*phase);
                row.total = Some(regimen.total().as_mg());
                match regimen {
                    Regimen::Oral(oral) => {
                        row.morning = slot_cell(oral, Slot::Morning);
                        row.midday = slot_cell(oral, Slot::Midday);
                        row.dinner = slot_cell(oral, Slot::Dinner);
                        row.night = slot_cell(oral, Slot::Night);
                    }
                    Regimen::Patch(set) => row.patches = set.to_string(),
                }
            }
            StepKind::Stop => row.kind = "stop",
            StepKind::Review => row.kind = "review",
        }
        row
    }
}

fn slot_cell(oral: &OralRegimen, slot: Slot) -> String {
    oral.get(slot).map(ToString::to_string).unwrap_or_default()
}

/// Write one CSV row per step, with headers
pub fn write_csv<W: io::Write>(plan: &TaperPlan, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for step in &plan.steps {
        writer.serialize(CsvRow::from(step))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(plan: &TaperPlan) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(plan, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the plan as CSV to `path`, creating parent directories
pub fn write_csv_file(plan: &TaperPlan, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(plan, file)?;
    tracing::info!("Wrote {} plan steps to {:?}", plan.steps.len(), path);
    Ok(())
}

/// Human-readable plan, one line per step
pub fn render_table(plan: &TaperPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}, {})", plan.medicine, plan.class, plan.form);

    for step in &plan.steps {
        let line = match &step.kind {
            StepKind::Dose {
                regimen: Regimen::Oral(oral),
                phase,
            } => {
                let slots: Vec<String> = oral
                    .iter()
                    .map(|(slot, pieces)| format!("{}: {}", slot, pieces))
                    .collect();
                format!(
                    "P{}  {} mg/day  {}",
                    phase,
                    oral.total(),
                    slots.join("; ")
                )
            }
            StepKind::Dose {
                regimen: Regimen::Patch(set),
                phase,
            } => format!("P{}  {} mcg/hr  {}", phase, set.total(), set),
            StepKind::Stop => "Stop".to_string(),
            StepKind::Review => "Review with prescriber".to_string(),
        };
        let _ = writeln!(out, "{}  {}", step.date, line);
    }
    out
}
