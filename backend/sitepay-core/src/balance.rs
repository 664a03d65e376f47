// src/balance.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{
    BalanceEntry, DeductionKind, Employee, EmployeeId, EmployeePayment, PayrollRun,
};
use crate::week_window;

/// Folds the employee's ledger, oldest entry first, into one outstanding balance.
/// Positive means the employee owes the company.
pub fn resolve_outstanding_balance(employee: &Employee) -> Decimal {
    chronological(&employee.balance_history)
        .iter()
        .fold(Decimal::ZERO, |balance, entry| balance + entry.signed_amount())
}

/// Ledger entries sorted by date ascending. Entries sharing a date keep their recorded order.
fn chronological(history: &[BalanceEntry]) -> Vec<&BalanceEntry> {
    let mut entries: Vec<&BalanceEntry> = history.iter().collect();
    entries.sort_by_key(|entry| entry.date);
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub entry: BalanceEntry,
    pub running_balance: Decimal,
}

/// Chronological ledger with the balance after each entry.
pub fn statement(employee: &Employee) -> Vec<StatementLine> {
    let mut running_balance = Decimal::ZERO;
    chronological(&employee.balance_history)
        .into_iter()
        .map(|entry| {
            running_balance += entry.signed_amount();
            StatementLine {
                entry: entry.clone(),
                running_balance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeLedger {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub outstanding_balance: Decimal,
    pub lines: Vec<StatementLine>,
}

pub fn ledger(employee: &Employee) -> EmployeeLedger {
    let lines = statement(employee);
    EmployeeLedger {
        employee_id: employee.id.clone(),
        employee_name: employee.name.clone(),
        outstanding_balance: lines
            .last()
            .map_or(Decimal::ZERO, |line| line.running_balance),
        lines,
    }
}

// --- Ledger Postings ---

/// A ledger entry the store appends to an employee's balance history once a run is saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPosting {
    pub employee_id: EmployeeId,
    pub entry: BalanceEntry,
}

fn postings_for_payment(payment: &EmployeePayment, date: NaiveDate, week_label: &str) -> Vec<BalanceEntry> {
    let mut entries = Vec::new();

    if payment.balance_paid > Decimal::ZERO {
        entries.push(BalanceEntry::credit(
            date,
            payment.balance_paid,
            format!("Balance recovered in payroll week of {}", week_label),
        ));
    }

    for deduction in payment
        .deductions
        .iter()
        .filter(|d| d.kind() == DeductionKind::PendingBalance && d.amount > Decimal::ZERO)
    {
        entries.push(BalanceEntry::debit(
            date,
            deduction.amount,
            format!("Pending balance from payroll week of {}", week_label),
        ));
    }

    if payment.new_balance_created > Decimal::ZERO {
        entries.push(BalanceEntry::credit(
            date,
            payment.new_balance_created,
            format!("Under-payment in payroll week of {}", week_label),
        ));
    } else if payment.new_balance_created < Decimal::ZERO {
        entries.push(BalanceEntry::debit(
            date,
            -payment.new_balance_created,
            format!("Over-payment in payroll week of {}", week_label),
        ));
    }

    entries
}

/// Ledger entries produced by confirming `run` for the first time.
pub fn postings_for_run(run: &PayrollRun) -> Vec<LedgerPosting> {
    let week_label = week_window::display(run.week_start_date);
    run.payments
        .iter()
        .flat_map(|payment| {
            postings_for_payment(payment, run.processing_date, &week_label)
                .into_iter()
                .map(|entry| LedgerPosting {
                    employee_id: payment.employee_id.clone(),
                    entry,
                })
        })
        .collect()
}

fn ledger_effect(run: &PayrollRun) -> BTreeMap<&str, Decimal> {
    let week_label = week_window::display(run.week_start_date);
    let mut effect = BTreeMap::new();
    for payment in &run.payments {
        let net: Decimal = postings_for_payment(payment, run.processing_date, &week_label)
            .iter()
            .map(BalanceEntry::signed_amount)
            .sum();
        *effect.entry(payment.employee_id.as_str()).or_insert(Decimal::ZERO) += net;
    }
    effect
}

/// Corrective entries for re-confirming an edited run: one entry per employee whose
/// ledger effect changed between `previous` and `updated`, dated `date`.
pub fn postings_for_revision(
    previous: &PayrollRun,
    updated: &PayrollRun,
    date: NaiveDate,
) -> Vec<LedgerPosting> {
    let before = ledger_effect(previous);
    let after = ledger_effect(updated);
    let week_label = week_window::display(updated.week_start_date);
    let description = format!("Correction to payroll week of {}", week_label);

    let mut employee_ids: Vec<&str> = before.keys().chain(after.keys()).copied().collect();
    employee_ids.sort_unstable();
    employee_ids.dedup();

    employee_ids
        .into_iter()
        .filter_map(|employee_id| {
            let delta = after.get(employee_id).copied().unwrap_or_default()
                - before.get(employee_id).copied().unwrap_or_default();
            debug!("Ledger revision: Emp={}, Delta={}", employee_id, delta);
            let entry = if delta > Decimal::ZERO {
                BalanceEntry::debit(date, delta, description.clone())
            } else if delta < Decimal::ZERO {
                BalanceEntry::credit(date, -delta, description.clone())
            } else {
                return None;
            };
            Some(LedgerPosting {
                employee_id: employee_id.to_string(),
                entry,
            })
        })
        .collect()
}
