// src/payment_editor.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    Deduction, DeductionKind, EmployeeId, EmployeePayment, PayrollRun, PENDING_BALANCE_LABEL,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Deduction amount must not be negative (got {amount})")]
    NegativeDeduction { amount: Decimal },
}

/// Which draft payments a deduction applies to. Bulk selections receive the same
/// description and amount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    One(EmployeeId),
    Many(Vec<EmployeeId>),
}

impl Selection {
    pub fn contains(&self, employee_id: &str) -> bool {
        match self {
            Selection::One(id) => id == employee_id,
            Selection::Many(ids) => ids.iter().any(|id| id == employee_id),
        }
    }
}

impl From<&str> for Selection {
    fn from(employee_id: &str) -> Self {
        Selection::One(employee_id.to_string())
    }
}

impl From<Vec<EmployeeId>> for Selection {
    fn from(employee_ids: Vec<EmployeeId>) -> Self {
        Selection::Many(employee_ids)
    }
}

/// Operator edits on an unconfirmed draft. Every edit swaps in a rebuilt payment rather
/// than mutating rows in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentEditor {
    payments: Vec<EmployeePayment>,
}

impl PaymentEditor {
    pub fn new(payments: Vec<EmployeePayment>) -> Self {
        Self { payments }
    }

    pub fn payments(&self) -> &[EmployeePayment] {
        &self.payments
    }

    pub fn into_payments(self) -> Vec<EmployeePayment> {
        self.payments
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }

    pub fn payment(&self, employee_id: &str) -> Option<&EmployeePayment> {
        self.payments.iter().find(|p| p.employee_id == employee_id)
    }

    pub fn total_paid(&self) -> Decimal {
        PayrollRun::total_of(&self.payments)
    }

    /// Overrides the disbursed amount. Any value is accepted: above net pay pays extra,
    /// negative is a clawback. Returns `false` when the employee has no payment.
    pub fn set_paid_amount(&mut self, employee_id: &str, amount: Decimal) -> bool {
        let Some(slot) = self
            .payments
            .iter_mut()
            .find(|p| p.employee_id == employee_id)
        else {
            warn!("Paid amount override for employee without a payment: Emp={}", employee_id);
            return false;
        };

        if amount < Decimal::ZERO {
            warn!(
                "Negative paid amount recorded as clawback: Emp={}, Amount={}",
                employee_id, amount
            );
        }
        info!(
            "Paid amount override: Emp={}, Net={}, Paid={}",
            employee_id, slot.calculated_net_pay, amount
        );
        *slot = slot.clone().with_paid_amount(amount);
        true
    }

    /// Appends the same deduction to every selected payment, recomputes net pay and resets
    /// the paid amount to it. Returns how many payments were changed.
    pub fn add_deduction(
        &mut self,
        targets: &Selection,
        description: &str,
        amount: Decimal,
    ) -> Result<usize, EditError> {
        self.append_to_selection(
            targets,
            Deduction::adjustment(description.trim(), amount),
        )
    }

    /// Like [`add_deduction`](Self::add_deduction) with the fixed pending-balance label; the
    /// amount becomes a ledger debit once the run is confirmed.
    pub fn add_pending_balance(
        &mut self,
        targets: &Selection,
        amount: Decimal,
    ) -> Result<usize, EditError> {
        self.append_to_selection(
            targets,
            Deduction::new(DeductionKind::PendingBalance, PENDING_BALANCE_LABEL, amount),
        )
    }

    /// Removes one deduction and recomputes. Returns `false` for an unknown employee or an
    /// out-of-range index.
    pub fn remove_deduction(&mut self, employee_id: &str, index: usize) -> bool {
        let Some(slot) = self
            .payments
            .iter_mut()
            .find(|p| p.employee_id == employee_id)
        else {
            return false;
        };
        match slot.clone().without_deduction(index) {
            Some(updated) => {
                info!(
                    "Removed deduction: Emp={}, Index={}, Net={}",
                    employee_id, index, updated.calculated_net_pay
                );
                *slot = updated;
                true
            }
            None => {
                warn!(
                    "Deduction index out of range: Emp={}, Index={}, Count={}",
                    employee_id,
                    index,
                    slot.deductions.len()
                );
                false
            }
        }
    }

    fn append_to_selection(
        &mut self,
        targets: &Selection,
        deduction: Deduction,
    ) -> Result<usize, EditError> {
        if deduction.amount < Decimal::ZERO {
            return Err(EditError::NegativeDeduction {
                amount: deduction.amount,
            });
        }

        let mut changed = 0;
        for slot in self
            .payments
            .iter_mut()
            .filter(|p| targets.contains(&p.employee_id))
        {
            *slot = slot.clone().with_deduction(deduction.clone());
            changed += 1;
        }
        info!(
            "Added deduction '{}' ({}) to {} payments",
            deduction.description, deduction.amount, changed
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deductions::{apply_to_payment, DEFAULT_FLAT_TAX_RATE};
    use crate::models::Employee;
    use rust_decimal_macros::dec;

    fn assert_net_invariant(editor: &PaymentEditor) {
        for payment in editor.payments() {
            assert_eq!(
                payment.calculated_net_pay,
                payment.gross_pay - payment.total_deductions(),
                "Net pay out of sync for {}",
                payment.employee_id
            );
        }
    }

    fn editor() -> PaymentEditor {
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        let bo = Employee::new("E2", "Bo", dec!(25), dec!(37.5));
        PaymentEditor::new(vec![
            apply_to_payment(
                EmployeePayment::draft(&ana, dec!(40), dec!(5), dec!(950)),
                dec!(100),
                DEFAULT_FLAT_TAX_RATE,
            ),
            apply_to_payment(
                EmployeePayment::draft(&bo, dec!(20), dec!(0), dec!(500)),
                dec!(0),
                DEFAULT_FLAT_TAX_RATE,
            ),
        ])
    }

    #[test]
    fn set_paid_amount_leaves_deductions_alone() {
        let mut editor = editor();
        let before = editor.payment("E1").unwrap().deductions.clone();

        assert!(editor.set_paid_amount("E1", dec!(500)));
        let payment = editor.payment("E1").unwrap();
        assert_eq!(payment.paid_amount, dec!(500));
        assert_eq!(payment.calculated_net_pay, dec!(707.50));
        assert_eq!(payment.deductions, before);
        assert_net_invariant(&editor);
    }

    #[test]
    fn set_paid_amount_accepts_extra_and_negative() {
        let mut editor = editor();
        assert!(editor.set_paid_amount("E2", dec!(1000)));
        assert!(editor.set_paid_amount("E1", dec!(-50)));
        assert_eq!(editor.payment("E2").unwrap().paid_amount, dec!(1000));
        assert_eq!(editor.payment("E1").unwrap().paid_amount, dec!(-50));
    }

    #[test]
    fn set_paid_amount_for_unknown_employee_is_a_no_op() {
        let mut editor = editor();
        let before = editor.clone();
        assert!(!editor.set_paid_amount("NOPE", dec!(1)));
        assert_eq!(editor, before);
    }

    #[test]
    fn add_deduction_resets_manual_override() {
        let mut editor = editor();
        editor.set_paid_amount("E1", dec!(500));

        let changed = editor
            .add_deduction(&Selection::from("E1"), "Safety boots", dec!(60))
            .unwrap();
        assert_eq!(changed, 1);

        let payment = editor.payment("E1").unwrap();
        assert_eq!(payment.calculated_net_pay, dec!(647.50));
        assert_eq!(payment.paid_amount, dec!(647.50));
        assert_eq!(payment.deductions.last().unwrap().description, "Safety boots");
        assert_net_invariant(&editor);
    }

    #[test]
    fn bulk_deduction_applies_the_same_amount_to_each_selected() {
        let mut editor = editor();
        let targets = Selection::from(vec!["E1".to_string(), "E2".to_string()]);
        let changed = editor.add_deduction(&targets, "Site parking", dec!(15)).unwrap();
        assert_eq!(changed, 2);

        for payment in editor.payments() {
            let last = payment.deductions.last().unwrap();
            assert_eq!(last.description, "Site parking");
            assert_eq!(last.amount, dec!(15));
        }
        assert_eq!(editor.payment("E2").unwrap().calculated_net_pay, dec!(410));
        assert_net_invariant(&editor);
    }

    #[test]
    fn pending_balance_uses_fixed_label() {
        let mut editor = editor();
        editor
            .add_pending_balance(&Selection::from("E2"), dec!(40))
            .unwrap();
        let last = editor.payment("E2").unwrap().deductions.last().unwrap().clone();
        assert_eq!(last.description, PENDING_BALANCE_LABEL);
        assert_eq!(last.kind(), DeductionKind::PendingBalance);
        assert_eq!(editor.payment("E2").unwrap().paid_amount, dec!(385));
        assert_net_invariant(&editor);
    }

    #[test]
    fn negative_deduction_is_rejected_without_changes() {
        let mut editor = editor();
        let before = editor.clone();
        let result = editor.add_deduction(&Selection::from("E1"), "Oops", dec!(-5));
        assert_eq!(
            result,
            Err(EditError::NegativeDeduction { amount: dec!(-5) })
        );
        assert_eq!(editor, before);
    }

    #[test]
    fn remove_deduction_recomputes_and_updates_balance_paid() {
        let mut editor = editor();
        // E1: [withholding, balance recovery]
        assert!(editor.remove_deduction("E1", 1));
        let payment = editor.payment("E1").unwrap();
        assert_eq!(payment.balance_paid, dec!(0));
        assert_eq!(payment.calculated_net_pay, dec!(807.50));
        assert_eq!(payment.paid_amount, dec!(807.50));

        assert!(!editor.remove_deduction("E1", 9));
        assert!(!editor.remove_deduction("NOPE", 0));
        assert_net_invariant(&editor);
    }

    #[test]
    fn selection_deserializes_from_single_id_or_list() {
        let one: Selection = serde_json::from_str(r#""E1""#).unwrap();
        let many: Selection = serde_json::from_str(r#"["E1","E2"]"#).unwrap();
        assert!(one.contains("E1") && !one.contains("E2"));
        assert!(many.contains("E2"));
    }
}
