// src/run_controller.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregator::aggregate;
use crate::balance::{
    postings_for_revision, postings_for_run, resolve_outstanding_balance, LedgerPosting,
};
use crate::clock::Clock;
use crate::deductions::apply_to_payment;
use crate::models::{new_run_id, Employee, EmployeePayment, PayrollRun, PayrollStatus, TimeLog};
use crate::payment_editor::{EditError, PaymentEditor};
use crate::store::{PayrollStore, StoreError};
use crate::week_window::WeekWindow;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("No payments to confirm for the week of {week}")]
    EmptyDraft { week: NaiveDate },

    #[error("No draft is open")]
    NoActiveDraft,

    #[error("Week out of range: {0}")]
    WeekOutOfRange(String),

    #[error("Week navigation is disabled while editing payroll run {run_id}")]
    WeekPinned { run_id: String },

    #[error("Payroll run {run_id} is already paid")]
    RunAlreadyPaid { run_id: String },

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("Failed to save payroll run: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStateKind {
    Empty,
    Draft,
    Confirmed,
    Paid,
}

/// What `confirm` hands to the store: the frozen run and the ledger entries it implies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfirmation {
    pub run: PayrollRun,
    pub postings: Vec<LedgerPosting>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub state: RunStateKind,
    pub week_start_date: NaiveDate,
    pub week_display: String,
    pub editing_run_id: Option<String>,
    pub payments: Vec<EmployeePayment>,
    pub total_paid: Decimal,
}

/// Builds the draft for a week from scratch: aggregation, then the standard deductions
/// against each employee's outstanding balance. Calling it twice on the same inputs
/// gives identical payments.
pub fn rebuild_draft(
    week_start: NaiveDate,
    time_logs: &[TimeLog],
    employees: &[Employee],
    flat_tax_rate: Decimal,
) -> Vec<EmployeePayment> {
    let roster: HashMap<&str, &Employee> = employees.iter().map(|e| (e.id.as_str(), e)).collect();

    aggregate(time_logs, employees, week_start)
        .into_iter()
        .map(|payment| {
            let outstanding = roster
                .get(payment.employee_id.as_str())
                .map(|employee| resolve_outstanding_balance(employee))
                .unwrap_or(Decimal::ZERO);
            debug!(
                "Standard deductions: Emp={}, Gross={}, Outstanding={}",
                payment.employee_id, payment.gross_pay, outstanding
            );
            apply_to_payment(payment, outstanding, flat_tax_rate)
        })
        .collect()
}

fn week_containing(date: NaiveDate) -> Result<WeekWindow, RunError> {
    WeekWindow::containing(date)
        .ok_or_else(|| RunError::WeekOutOfRange(format!("no payroll week contains {}", date)))
}

#[derive(Debug, Clone)]
enum Session {
    Empty,
    Draft(PaymentEditor),
    Confirmed(PayrollRun),
}

/// One operator's payroll session: pick a week (or an existing run), edit, confirm.
#[derive(Debug, Clone)]
pub struct RunController {
    flat_tax_rate: Decimal,
    week: WeekWindow,
    draft_run_id: String,
    editing: Option<PayrollRun>,
    session: Session,
}

impl RunController {
    pub fn new(flat_tax_rate: Decimal, today: NaiveDate) -> Result<Self, RunError> {
        Ok(Self {
            flat_tax_rate,
            week: week_containing(today)?,
            draft_run_id: new_run_id(),
            editing: None,
            session: Session::Empty,
        })
    }

    pub fn week(&self) -> WeekWindow {
        self.week
    }

    pub fn flat_tax_rate(&self) -> Decimal {
        self.flat_tax_rate
    }

    pub fn editing_run_id(&self) -> Option<&str> {
        self.editing.as_ref().map(|run| run.id.as_str())
    }

    pub fn state(&self) -> RunStateKind {
        match &self.session {
            Session::Empty => RunStateKind::Empty,
            Session::Draft(_) => RunStateKind::Draft,
            Session::Confirmed(run) if run.is_paid() => RunStateKind::Paid,
            Session::Confirmed(_) => RunStateKind::Confirmed,
        }
    }

    /// Rebuilds the draft for the week containing `date`, dropping unsaved edits.
    pub fn select_week(
        &mut self,
        date: NaiveDate,
        time_logs: &[TimeLog],
        employees: &[Employee],
    ) -> Result<RunStateKind, RunError> {
        if let Some(run_id) = self.editing_run_id() {
            return Err(RunError::WeekPinned {
                run_id: run_id.to_string(),
            });
        }
        self.week = week_containing(date)?;
        self.rebuild(time_logs, employees);
        Ok(self.state())
    }

    pub fn shift_week(
        &mut self,
        weeks: i64,
        time_logs: &[TimeLog],
        employees: &[Employee],
    ) -> Result<RunStateKind, RunError> {
        let target = self.week.shift(weeks).ok_or_else(|| {
            RunError::WeekOutOfRange(format!(
                "cannot shift the week of {} by {} weeks",
                self.week.start(),
                weeks
            ))
        })?;
        self.select_week(target.start(), time_logs, employees)
    }

    fn rebuild(&mut self, time_logs: &[TimeLog], employees: &[Employee]) {
        let payments = rebuild_draft(self.week.start(), time_logs, employees, self.flat_tax_rate);
        self.draft_run_id = new_run_id();
        info!(
            "Draft rebuilt: Week={}, Run={}, Payments={}",
            self.week.start(),
            self.draft_run_id,
            payments.len()
        );
        self.session = if payments.is_empty() {
            Session::Empty
        } else {
            Session::Draft(PaymentEditor::new(payments))
        };
    }

    /// Opens a stored run for editing. Its payments are loaded as stored, without
    /// re-aggregating, and the week stays pinned to the run's week until confirm or discard.
    pub fn edit_run(&mut self, run: PayrollRun) -> Result<(), RunError> {
        if run.is_paid() {
            warn!("Refusing to edit paid run: Run={}", run.id);
            return Err(RunError::RunAlreadyPaid { run_id: run.id });
        }
        info!(
            "Editing run: Run={}, Week={}, Payments={}",
            run.id,
            run.week_start_date,
            run.payments.len()
        );
        self.week = week_containing(run.week_start_date)?;
        self.session = Session::Draft(PaymentEditor::new(run.payments.clone()));
        self.editing = Some(run);
        Ok(())
    }

    pub fn editor(&mut self) -> Result<&mut PaymentEditor, RunError> {
        match &mut self.session {
            Session::Draft(editor) => Ok(editor),
            _ => Err(RunError::NoActiveDraft),
        }
    }

    /// Freezes the draft into a run and saves it with its ledger postings. The session
    /// only moves to `Confirmed` once the store accepted the write. A new draft keeps
    /// one run id until it is rebuilt, so retrying after a failed save replaces the
    /// same run.
    pub fn confirm(
        &mut self,
        store: &mut dyn PayrollStore,
        clock: &dyn Clock,
    ) -> Result<RunConfirmation, RunError> {
        let editor = match &self.session {
            Session::Draft(editor) if !editor.is_empty() => editor,
            Session::Confirmed(_) => return Err(RunError::NoActiveDraft),
            _ => {
                return Err(RunError::EmptyDraft {
                    week: self.week.start(),
                })
            }
        };

        let payments: Vec<EmployeePayment> = editor
            .payments()
            .iter()
            .cloned()
            .map(EmployeePayment::settled)
            .collect();

        let confirmation = match &self.editing {
            Some(previous) => {
                let run = PayrollRun {
                    id: previous.id.clone(),
                    week_start_date: previous.week_start_date,
                    processing_date: previous.processing_date,
                    status: PayrollStatus::PendingPayment,
                    total_amount: PayrollRun::total_of(&payments),
                    payments,
                };
                let postings = postings_for_revision(previous, &run, clock.today());
                RunConfirmation { run, postings }
            }
            None => {
                let run = PayrollRun::with_id(
                    self.draft_run_id.clone(),
                    self.week.start(),
                    clock.today(),
                    payments,
                );
                let postings = postings_for_run(&run);
                RunConfirmation { run, postings }
            }
        };

        store.save_run(&confirmation)?;
        info!(
            "Run confirmed: Run={}, Week={}, Total={}, Postings={}",
            confirmation.run.id,
            confirmation.run.week_start_date,
            confirmation.run.total_amount,
            confirmation.postings.len()
        );

        self.session = Session::Confirmed(confirmation.run.clone());
        self.editing = None;
        Ok(confirmation)
    }

    pub fn discard(&mut self) {
        if let Some(run_id) = self.editing_run_id() {
            info!("Discarding edits: Run={}", run_id);
        }
        self.session = Session::Empty;
        self.editing = None;
    }

    /// Mirrors an externally recorded payment onto the confirmed run shown in the session.
    pub fn observe_paid(&mut self, run_id: &str) {
        if let Session::Confirmed(run) = &mut self.session {
            if run.id == run_id {
                run.status = PayrollStatus::Paid;
            }
        }
    }

    pub fn view(&self) -> DraftView {
        let (payments, total_paid) = match &self.session {
            Session::Empty => (Vec::new(), Decimal::ZERO),
            Session::Draft(editor) => (editor.payments().to_vec(), editor.total_paid()),
            Session::Confirmed(run) => (run.payments.clone(), run.total_amount),
        };
        DraftView {
            state: self.state(),
            week_start_date: self.week.start(),
            week_display: self.week.display(),
            editing_run_id: self.editing_run_id().map(str::to_string),
            payments,
            total_paid,
        }
    }
}
