// src/export.rs

use csv::Writer;
use rust_decimal::Decimal;
use std::io::Write;
use thiserror::Error;
use tracing::info;

use crate::models::PayrollRun;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV writer error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

const HEADER: [&str; 12] = [
    "Run ID",
    "Week Start",
    "Employee ID",
    "Employee Name",
    "Regular Hours",
    "Overtime Hours",
    "Gross Pay",
    "Total Deductions",
    "Net Pay",
    "Paid Amount",
    "Balance Paid",
    "New Balance",
];

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// One row per payment, amounts with two decimals.
pub fn write_run_csv<W: Write>(run: &PayrollRun, writer: W) -> Result<(), ExportError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for payment in &run.payments {
        wtr.write_record([
            run.id.clone(),
            run.week_start_date.to_string(),
            payment.employee_id.clone(),
            payment.employee_name.clone(),
            payment.regular_hours.normalize().to_string(),
            payment.overtime_hours.normalize().to_string(),
            money(payment.gross_pay),
            money(payment.total_deductions()),
            money(payment.calculated_net_pay),
            money(payment.paid_amount),
            money(payment.balance_paid),
            money(payment.new_balance_created),
        ])?;
    }

    wtr.flush().map_err(|e| ExportError::Io {
        source: e,
        context: format!("Failed to flush CSV export for run {}", run.id),
    })?;
    info!("Exported run: Run={}, Rows={}", run.id, run.payments.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deductions::{apply_to_payment, DEFAULT_FLAT_TAX_RATE};
    use crate::models::{Employee, EmployeePayment};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn export_writes_header_and_one_row_per_payment() {
        let ana = Employee::new("E1", "Ana, Jr.", dec!(20), dec!(30));
        let payment = apply_to_payment(
            EmployeePayment::draft(&ana, dec!(40), dec!(5), dec!(950)),
            dec!(100),
            DEFAULT_FLAT_TAX_RATE,
        )
        .with_paid_amount(dec!(500))
        .settled();
        let mut run = PayrollRun::new(d("2025-01-06"), d("2025-01-13"), vec![payment]);
        run.id = "run-1".to_string();

        let mut buffer = Vec::new();
        write_run_csv(&run, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Run ID,Week Start,Employee ID"));
        assert_eq!(
            lines[1],
            "run-1,2025-01-06,E1,\"Ana, Jr.\",40,5,950.00,242.50,707.50,500.00,100.00,207.50"
        );
    }

    #[test]
    fn empty_run_exports_header_only() {
        let run = PayrollRun::new(d("2025-01-06"), d("2025-01-13"), Vec::new());
        let mut buffer = Vec::new();
        write_run_csv(&run, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 1);
    }
}
