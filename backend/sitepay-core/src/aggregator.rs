// src/aggregator.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{round_money, Employee, EmployeePayment, TimeLog};

#[derive(Debug, Default, Clone, Copy)]
struct HourTotals {
    regular: Decimal,
    overtime: Decimal,
}

impl HourTotals {
    fn is_zero(&self) -> bool {
        self.regular.is_zero() && self.overtime.is_zero()
    }
}

pub fn gross_pay(employee: &Employee, regular_hours: Decimal, overtime_hours: Decimal) -> Decimal {
    round_money(regular_hours * employee.hourly_rate + overtime_hours * employee.overtime_rate)
}

/// Sums every time log recorded for `week_start` into one draft payment per active
/// employee. Logs for other weeks, unknown employees, inactive employees and employees
/// with no hours are left out. Payments follow the order of `employees`.
pub fn aggregate(
    time_logs: &[TimeLog],
    employees: &[Employee],
    week_start: NaiveDate,
) -> Vec<EmployeePayment> {
    let roster: HashMap<&str, &Employee> = employees.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut totals: HashMap<&str, HourTotals> = HashMap::new();

    let week_logs: Vec<&TimeLog> = time_logs
        .iter()
        .filter(|log| log.week_start_date == week_start)
        .collect();

    for log in &week_logs {
        for (employee_id, hours) in &log.employee_hours {
            match roster.get(employee_id.as_str()) {
                Some(employee) if employee.is_active => {}
                Some(_) => {
                    debug!(
                        "Skipping hours for inactive employee: Emp={}, Client={}",
                        employee_id, log.client_id
                    );
                    continue;
                }
                None => {
                    debug!(
                        "Skipping hours for unknown employee: Emp={}, Client={}",
                        employee_id, log.client_id
                    );
                    continue;
                }
            }

            let running = totals.entry(employee_id.as_str()).or_default();
            running.regular += hours.total_regular();
            running.overtime += hours.total_overtime();
        }
    }

    let payments: Vec<EmployeePayment> = employees
        .iter()
        .filter_map(|employee| {
            let hours = totals.get(employee.id.as_str())?;
            if hours.is_zero() {
                return None;
            }
            let gross = gross_pay(employee, hours.regular, hours.overtime);
            Some(EmployeePayment::draft(
                employee,
                hours.regular,
                hours.overtime,
                gross,
            ))
        })
        .collect();

    info!(
        "Aggregated week {}: {} payments from {} time logs",
        week_start,
        payments.len(),
        week_logs.len()
    );
    payments
}
