// src/models.rs

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type EmployeeId = String;
pub type ClientId = String;

// --- Deduction labels ---

pub const WITHHOLDING_LABEL: &str = "Tax Withholding";
pub const BALANCE_RECOVERY_LABEL: &str = "Balance Recovery";
pub const PENDING_BALANCE_LABEL: &str = "Pending Balance";

/// Rounds a money amount to cents, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// --- Balance Ledger ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Employee owes the company more (advance, over-payment).
    Debit,
    /// Employee owes the company less (repayment, reconciliation).
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub description: String,
}

impl BalanceEntry {
    pub fn debit(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            date,
            entry_type: EntryType::Debit,
            amount,
            description: description.into(),
        }
    }

    pub fn credit(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            date,
            entry_type: EntryType::Credit,
            amount,
            description: description.into(),
        }
    }

    /// Effect on the outstanding balance: `+amount` for debits, `-amount` for credits.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }
}

// --- Employees ---

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub hourly_rate: Decimal,
    pub overtime_rate: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub balance_history: Vec<BalanceEntry>,
}

impl Employee {
    pub fn new(id: &str, name: &str, hourly_rate: Decimal, overtime_rate: Decimal) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            hourly_rate,
            overtime_rate,
            is_active: true,
            balance_history: Vec::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_entry(mut self, entry: BalanceEntry) -> Self {
        self.balance_history.push(entry);
        self
    }
}

// --- Time Tracking ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(default)]
    pub regular: Decimal,
    #[serde(default)]
    pub overtime: Decimal,
}

impl DayHours {
    pub fn new(regular: Decimal, overtime: Decimal) -> Self {
        Self { regular, overtime }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekHours {
    #[serde(default)]
    pub mon: DayHours,
    #[serde(default)]
    pub tue: DayHours,
    #[serde(default)]
    pub wed: DayHours,
    #[serde(default)]
    pub thu: DayHours,
    #[serde(default)]
    pub fri: DayHours,
    #[serde(default)]
    pub sat: DayHours,
    #[serde(default)]
    pub sun: DayHours,
}

impl WeekHours {
    pub fn days(&self) -> [DayHours; 7] {
        [
            self.mon, self.tue, self.wed, self.thu, self.fri, self.sat, self.sun,
        ]
    }

    pub fn total_regular(&self) -> Decimal {
        self.days().iter().map(|d| d.regular).sum()
    }

    pub fn total_overtime(&self) -> Decimal {
        self.days().iter().map(|d| d.overtime).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLog {
    pub client_id: ClientId,
    pub week_start_date: NaiveDate,
    #[serde(default)]
    pub employee_hours: HashMap<EmployeeId, WeekHours>,
}

impl TimeLog {
    pub fn new(client_id: &str, week_start_date: NaiveDate) -> Self {
        Self {
            client_id: client_id.to_string(),
            week_start_date,
            employee_hours: HashMap::new(),
        }
    }

    pub fn hours(mut self, employee_id: &str, hours: WeekHours) -> Self {
        self.employee_hours.insert(employee_id.to_string(), hours);
        self
    }
}

// --- Deductions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionKind {
    Withholding,
    BalanceRecovery,
    PendingBalance,
    Adjustment,
}

impl DeductionKind {
    /// Classifies a deduction that was stored without a kind tag by its label.
    pub fn classify(description: &str) -> Self {
        let label = description.trim().to_lowercase();
        if label.starts_with(&PENDING_BALANCE_LABEL.to_lowercase()) {
            DeductionKind::PendingBalance
        } else if label.starts_with(&BALANCE_RECOVERY_LABEL.to_lowercase()) {
            DeductionKind::BalanceRecovery
        } else if label.starts_with(&WITHHOLDING_LABEL.to_lowercase())
            || label
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == "tax" || word == "withholding")
        {
            DeductionKind::Withholding
        } else {
            DeductionKind::Adjustment
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub description: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<DeductionKind>,
}

impl Deduction {
    pub fn new(kind: DeductionKind, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            description: description.into(),
            amount,
            kind: Some(kind),
        }
    }

    pub fn adjustment(description: impl Into<String>, amount: Decimal) -> Self {
        Self::new(DeductionKind::Adjustment, description, amount)
    }

    pub fn kind(&self) -> DeductionKind {
        self.kind
            .unwrap_or_else(|| DeductionKind::classify(&self.description))
    }
}

// --- Payments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePayment {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub gross_pay: Decimal,
    #[serde(default)]
    pub deductions: Vec<Deduction>,
    pub calculated_net_pay: Decimal,
    pub paid_amount: Decimal,
    #[serde(default)]
    pub balance_paid: Decimal,
    #[serde(default)]
    pub new_balance_created: Decimal,
}

impl EmployeePayment {
    /// A draft row with no deductions yet: net pay and paid amount equal gross pay.
    pub fn draft(
        employee: &Employee,
        regular_hours: Decimal,
        overtime_hours: Decimal,
        gross_pay: Decimal,
    ) -> Self {
        Self {
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            regular_hours,
            overtime_hours,
            gross_pay,
            deductions: Vec::new(),
            calculated_net_pay: gross_pay,
            paid_amount: gross_pay,
            balance_paid: Decimal::ZERO,
            new_balance_created: Decimal::ZERO,
        }
    }

    pub fn total_deductions(&self) -> Decimal {
        self.deductions.iter().map(|d| d.amount).sum()
    }

    /// Re-derives net pay and the recovered balance from gross pay and the deduction list.
    pub fn recompute(&mut self) {
        self.calculated_net_pay = self.gross_pay - self.total_deductions();
        self.balance_paid = self
            .deductions
            .iter()
            .filter(|d| d.kind() == DeductionKind::BalanceRecovery)
            .map(|d| d.amount)
            .sum();
    }

    pub fn with_deduction(mut self, deduction: Deduction) -> Self {
        self.deductions.push(deduction);
        self.recompute();
        self.paid_amount = self.calculated_net_pay;
        self
    }

    /// Returns `None` when `index` is out of range.
    pub fn without_deduction(mut self, index: usize) -> Option<Self> {
        if index >= self.deductions.len() {
            return None;
        }
        self.deductions.remove(index);
        self.recompute();
        self.paid_amount = self.calculated_net_pay;
        Some(self)
    }

    pub fn with_paid_amount(mut self, amount: Decimal) -> Self {
        self.paid_amount = amount;
        self
    }

    /// Freezes the payment for a run: records the shortfall (or excess) against net pay.
    pub fn settled(mut self) -> Self {
        self.recompute();
        self.new_balance_created = self.calculated_net_pay - self.paid_amount;
        self
    }
}

// --- Payroll Runs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    PendingPayment,
    Paid,
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRun {
    pub id: String,
    pub week_start_date: NaiveDate,
    pub processing_date: NaiveDate,
    pub status: PayrollStatus,
    pub total_amount: Decimal,
    pub payments: Vec<EmployeePayment>,
}

impl PayrollRun {
    pub fn new(
        week_start_date: NaiveDate,
        processing_date: NaiveDate,
        payments: Vec<EmployeePayment>,
    ) -> Self {
        Self::with_id(new_run_id(), week_start_date, processing_date, payments)
    }

    /// Builds a pending run under an id minted earlier, so saving it again replaces it.
    pub fn with_id(
        id: String,
        week_start_date: NaiveDate,
        processing_date: NaiveDate,
        payments: Vec<EmployeePayment>,
    ) -> Self {
        Self {
            id,
            week_start_date,
            processing_date,
            status: PayrollStatus::PendingPayment,
            total_amount: Self::total_of(&payments),
            payments,
        }
    }

    pub fn total_of(payments: &[EmployeePayment]) -> Decimal {
        payments.iter().map(|p| p.paid_amount).sum()
    }

    pub fn is_paid(&self) -> bool {
        self.status == PayrollStatus::Paid
    }

    pub fn payment(&self, employee_id: &str) -> Option<&EmployeePayment> {
        self.payments.iter().find(|p| p.employee_id == employee_id)
    }
}
