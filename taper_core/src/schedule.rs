//! Schedule orchestrator: turns a request into a dated list of steps.
//!
//! The loop visits one boundary per iteration. At each boundary it either
//! ends the plan (review date or cap reached, pending stop) or asks the
//! class strategy for the next regimen and records the resulting step.
//! Termination decisions made at one boundary and carried out at the next
//! travel in [`PlanState`], never in shared flags.

use crate::config::{ScheduleConfig, TaperConfig};
use crate::request::PlanRequest;
use crate::strategy::{Outcome, ReductionContext};
use crate::types::*;
use crate::{Error, Result};
use chrono::{Days, NaiveDate};

/// Where the plan stands between boundaries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanState {
    Phase1Active,
    Phase2Active,
    /// The single evening dose has been scheduled; the next boundary stops
    ForcedSingleSided,
    Stopped,
    ReviewScheduled,
}

impl PlanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanState::Stopped | PlanState::ReviewScheduled)
    }
}

/// Phase and boundary date arithmetic for one request
#[derive(Clone, Debug)]
pub struct Timeline {
    phase1: Phase,
    /// Phase 2 with its start date; a phase 2 without one is never entered
    phase2: Option<(Phase, NaiveDate)>,
    /// Review date or the absolute cap, whichever comes first
    limit: NaiveDate,
}

fn add_days(date: NaiveDate, days: u32) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| Error::Config(format!("{} + {} days is out of range", date, days)))
}

impl Timeline {
    pub fn new(request: &PlanRequest, schedule: &ScheduleConfig) -> Result<Self> {
        let cap = add_days(request.start_date, schedule.cap_days)?;
        let limit = match request.review_date {
            Some(review) => review.min(cap),
            None => cap,
        };
        let phase2 = request
            .phase2
            .as_ref()
            .and_then(|p| p.start.map(|start| (p.clone(), start)));

        Ok(Self {
            phase1: request.phase1.clone(),
            phase2,
            limit,
        })
    }

    /// Phase number and parameters in force on `date`
    pub fn phase_at(&self, date: NaiveDate) -> (u8, &Phase) {
        match &self.phase2 {
            Some((phase, start)) if date >= *start => (2, phase),
            _ => (1, &self.phase1),
        }
    }

    /// Date of the boundary after `date`
    pub fn next_boundary(&self, date: NaiveDate) -> Result<NaiveDate> {
        match &self.phase2 {
            Some((phase2, start)) if date < *start => {
                let by_phase1 = add_days(date, self.phase1.interval_days)?;
                let by_phase2 = add_days(date, phase2.interval_days)?.max(*start);
                Ok(by_phase1.min(by_phase2))
            }
            _ => add_days(date, self.phase_at(date).1.interval_days),
        }
    }

    /// The review/cap date once `date` has reached it
    pub fn terminal_at(&self, date: NaiveDate) -> Option<NaiveDate> {
        (date >= self.limit).then_some(self.limit)
    }
}

fn check_patch_intervals(request: &PlanRequest, rules: Option<&PatchRules>) -> Result<()> {
    let rules = rules.ok_or_else(|| {
        Error::Config(format!("{} has no patch change interval", request.medicine))
    })?;
    let every = rules.change_interval_days;
    let phases = std::iter::once(&request.phase1).chain(request.phase2.as_ref());
    for phase in phases {
        if every == 0 || phase.interval_days % every != 0 {
            return Err(Error::Config(format!(
                "{} patches are changed every {} days; a {}-day interval does not fit",
                request.medicine, every, phase.interval_days
            )));
        }
    }
    Ok(())
}

/// Generate a taper plan
///
/// Configuration errors are returned before any stepping. The plan always
/// ends with a Stop or Review step.
pub fn generate_plan(
    request: &PlanRequest,
    catalogue: &Catalogue,
    config: &TaperConfig,
) -> Result<TaperPlan> {
    config.validate()?;
    request.validate()?;

    let product = catalogue.product(request.class, &request.medicine, request.form)?;
    let strategy = product.strategy();
    if strategy.is_patch() {
        check_patch_intervals(request, product.formulation.patch.as_ref())?;
    }

    let ctx = ReductionContext::new(
        &product,
        &request.selected_strengths,
        request.slot_order.as_deref(),
        &config.composition,
    )?;
    let mut current = request.capture_regimen(&product, &config.composition)?;
    let timeline = Timeline::new(request, &config.schedule)?;

    tracing::info!(
        "Generating {} plan for {} from {} (start total {})",
        request.class,
        product.medicine.name,
        request.start_date,
        current.total()
    );

    let mut steps: Vec<Step> = Vec::new();
    let mut state = PlanState::Phase1Active;
    let mut date = request.start_date;
    let mut iterations = 0;

    while !state.is_terminal() {
        // Review and cap dates outrank every other ending
        if let Some(limit) = timeline.terminal_at(date) {
            tracing::debug!("Review or cap date {} reached", limit);
            steps.push(Step {
                date: limit,
                kind: StepKind::Review,
            });
            state = PlanState::ReviewScheduled;
            continue;
        }

        if iterations >= config.schedule.max_iterations {
            tracing::warn!(
                "Iteration ceiling of {} reached; handing off to review",
                config.schedule.max_iterations
            );
            steps.push(Step {
                date,
                kind: StepKind::Review,
            });
            state = PlanState::ReviewScheduled;
            continue;
        }
        iterations += 1;

        if state == PlanState::ForcedSingleSided {
            steps.push(Step {
                date,
                kind: StepKind::Stop,
            });
            state = PlanState::Stopped;
            continue;
        }

        let (phase_number, phase) = timeline.phase_at(date);
        if phase_number == 2 && state == PlanState::Phase1Active {
            tracing::info!("Phase 2 begins on {}", date);
            state = PlanState::Phase2Active;
        }

        let outcome = strategy.reduce(&current, phase.percent, &ctx);
        let (next, single_sided) = match outcome {
            Outcome::Dose(regimen) => (regimen, false),
            Outcome::SingleSided(regimen) => (regimen, true),
            Outcome::Review => {
                steps.push(Step {
                    date,
                    kind: StepKind::Review,
                });
                state = PlanState::ReviewScheduled;
                continue;
            }
            Outcome::Stop => {
                steps.push(Step {
                    date,
                    kind: StepKind::Stop,
                });
                state = PlanState::Stopped;
                continue;
            }
        };

        if next.is_zero() {
            steps.push(Step {
                date,
                kind: StepKind::Stop,
            });
            state = PlanState::Stopped;
            continue;
        }
        if next.total() >= current.total() {
            tracing::error!(
                "Reduction did not progress ({} -> {}); handing off to review",
                current.total(),
                next.total()
            );
            steps.push(Step {
                date,
                kind: StepKind::Review,
            });
            state = PlanState::ReviewScheduled;
            continue;
        }

        tracing::debug!("{}: phase {} total {}", date, phase_number, next.total());
        steps.push(Step {
            date,
            kind: StepKind::Dose {
                regimen: next.clone(),
                phase: phase_number,
            },
        });
        current = next;
        if single_sided {
            state = PlanState::ForcedSingleSided;
        }
        date = timeline.next_boundary(date)?;
    }

    tracing::info!("Plan has {} steps", steps.len());
    Ok(TaperPlan {
        class: request.class,
        medicine: product.medicine.name.clone(),
        form: request.form,
        steps,
    })
}
