// src/deductions.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::models::{
    round_money, Deduction, DeductionKind, EmployeePayment, BALANCE_RECOVERY_LABEL,
    WITHHOLDING_LABEL,
};

pub const DEFAULT_FLAT_TAX_RATE: Decimal = dec!(0.15);

/// `Tax Withholding (15%)` for a rate of `0.15`.
pub fn withholding_label(flat_tax_rate: Decimal) -> String {
    format!(
        "{} ({}%)",
        WITHHOLDING_LABEL,
        (flat_tax_rate * dec!(100)).normalize()
    )
}

/// Standard deduction lines for a week's gross pay: flat withholding first, then
/// recovery of any outstanding balance, capped at what is left after withholding.
pub fn apply_standard_deductions(
    gross_pay: Decimal,
    outstanding_balance: Decimal,
    flat_tax_rate: Decimal,
) -> Vec<Deduction> {
    let withholding = round_money(gross_pay * flat_tax_rate);
    let mut deductions = vec![Deduction::new(
        DeductionKind::Withholding,
        withholding_label(flat_tax_rate),
        withholding,
    )];

    if outstanding_balance > Decimal::ZERO {
        let potential_net_pay = gross_pay - withholding;
        let recovery = potential_net_pay.max(Decimal::ZERO).min(outstanding_balance);
        if recovery > Decimal::ZERO {
            deductions.push(Deduction::new(
                DeductionKind::BalanceRecovery,
                BALANCE_RECOVERY_LABEL,
                recovery,
            ));
        }
    }

    deductions
}

/// Runs the standard deductions against a payment and merges them into its list.
///
/// An existing withholding line absorbs the new withholding amount instead of a second
/// line being added; a recovery line is only added when none exists. Standard lines that
/// are new go ahead of any ad-hoc deductions. Net pay is recomputed and the paid amount
/// is reset to it.
pub fn apply_to_payment(
    mut payment: EmployeePayment,
    outstanding_balance: Decimal,
    flat_tax_rate: Decimal,
) -> EmployeePayment {
    for line in apply_standard_deductions(payment.gross_pay, outstanding_balance, flat_tax_rate) {
        match line.kind() {
            DeductionKind::Withholding => {
                if let Some(existing) = payment
                    .deductions
                    .iter_mut()
                    .find(|d| d.kind() == DeductionKind::Withholding)
                {
                    debug!(
                        "Merging withholding into existing line: Emp={}, Amount={}",
                        payment.employee_id, line.amount
                    );
                    existing.amount += line.amount;
                } else {
                    payment.deductions.insert(0, line);
                }
            }
            kind => {
                if payment.deductions.iter().any(|d| d.kind() == kind) {
                    continue;
                }
                let position = payment
                    .deductions
                    .iter()
                    .position(|d| d.kind() == DeductionKind::Withholding)
                    .map_or(0, |i| i + 1);
                payment.deductions.insert(position, line);
            }
        }
    }

    payment.recompute();
    payment.paid_amount = payment.calculated_net_pay;
    payment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Employee;

    fn draft(gross: Decimal) -> EmployeePayment {
        let employee = Employee::new("E1", "Ana", dec!(20), dec!(30));
        EmployeePayment::draft(&employee, dec!(40), dec!(5), gross)
    }

    #[test]
    fn withholding_only_when_nothing_is_owed() {
        let lines = apply_standard_deductions(dec!(950), dec!(0), DEFAULT_FLAT_TAX_RATE);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind(), DeductionKind::Withholding);
        assert_eq!(lines[0].amount, dec!(142.50));
        assert_eq!(lines[0].description, "Tax Withholding (15%)");
    }

    #[test]
    fn negative_balance_is_not_recovered() {
        let lines = apply_standard_deductions(dec!(950), dec!(-200), DEFAULT_FLAT_TAX_RATE);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn recovery_is_capped_by_pay_left_after_withholding() {
        let lines = apply_standard_deductions(dec!(100), dec!(5000), DEFAULT_FLAT_TAX_RATE);
        assert_eq!(lines[0].amount, dec!(15));
        assert_eq!(lines[1].kind(), DeductionKind::BalanceRecovery);
        assert_eq!(lines[1].amount, dec!(85));
    }

    #[test]
    fn recovery_is_capped_by_outstanding_balance() {
        let lines = apply_standard_deductions(dec!(950), dec!(100), DEFAULT_FLAT_TAX_RATE);
        assert_eq!(lines[1].amount, dec!(100));
    }

    #[test]
    fn withholding_is_rounded_to_cents() {
        let lines = apply_standard_deductions(dec!(123.45), dec!(0), DEFAULT_FLAT_TAX_RATE);
        // 123.45 * 0.15 = 18.5175
        assert_eq!(lines[0].amount, dec!(18.52));
    }

    #[test]
    fn label_reflects_configured_rate() {
        assert_eq!(withholding_label(dec!(0.2)), "Tax Withholding (20%)");
        assert_eq!(withholding_label(dec!(0.125)), "Tax Withholding (12.5%)");
    }

    #[test]
    fn apply_to_payment_computes_net_and_paid() {
        let payment = apply_to_payment(draft(dec!(950)), dec!(100), DEFAULT_FLAT_TAX_RATE);
        assert_eq!(payment.calculated_net_pay, dec!(707.50));
        assert_eq!(payment.paid_amount, dec!(707.50));
        assert_eq!(payment.balance_paid, dec!(100));
    }

    #[test]
    fn reapplying_merges_withholding_instead_of_duplicating() {
        let once = apply_to_payment(draft(dec!(950)), dec!(100), DEFAULT_FLAT_TAX_RATE);
        let twice = apply_to_payment(once, dec!(100), DEFAULT_FLAT_TAX_RATE);

        let withholding_lines: Vec<&Deduction> = twice
            .deductions
            .iter()
            .filter(|d| d.kind() == DeductionKind::Withholding)
            .collect();
        assert_eq!(withholding_lines.len(), 1);
        assert_eq!(withholding_lines[0].amount, dec!(285.00));

        let recovery_lines = twice
            .deductions
            .iter()
            .filter(|d| d.kind() == DeductionKind::BalanceRecovery)
            .count();
        assert_eq!(recovery_lines, 1);
        assert_eq!(
            twice.calculated_net_pay,
            twice.gross_pay - twice.total_deductions()
        );
    }

    #[test]
    fn standard_lines_go_ahead_of_ad_hoc_deductions() {
        let payment = draft(dec!(950)).with_deduction(Deduction::adjustment("Boots", dec!(60)));
        let payment = apply_to_payment(payment, dec!(100), DEFAULT_FLAT_TAX_RATE);
        let kinds: Vec<DeductionKind> = payment.deductions.iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                DeductionKind::Withholding,
                DeductionKind::BalanceRecovery,
                DeductionKind::Adjustment,
            ]
        );
        assert_eq!(payment.calculated_net_pay, dec!(647.50));
    }
}
