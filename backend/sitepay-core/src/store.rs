// src/store.rs

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{Employee, PayrollRun, PayrollStatus, TimeLog};
use crate::run_controller::RunConfirmation;
use crate::week_window;

pub const EMPLOYEES_FILE: &str = "employees.json";
pub const TIME_LOGS_FILE: &str = "time_logs.json";
pub const PAYROLL_RUNS_FILE: &str = "payroll_runs.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid employee record {employee_id}: {reason}")]
    InvalidEmployee { employee_id: String, reason: String },

    #[error("Payroll run not found: {id}")]
    RunNotFound { id: String },

    #[error("Payroll run {id} is already paid")]
    RunAlreadyPaid { id: String },
}

fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> StoreError {
    StoreError::Io {
        source: source.into(),
        context: context.into(),
    }
}

/// Where employees, time logs and confirmed runs live. Reads return owned snapshots.
pub trait PayrollStore: Send {
    fn employees(&self) -> Result<Vec<Employee>, StoreError>;

    fn time_logs(&self) -> Result<Vec<TimeLog>, StoreError>;

    fn runs(&self) -> Result<Vec<PayrollRun>, StoreError>;

    fn run(&self, id: &str) -> Result<PayrollRun, StoreError> {
        self.runs()?
            .into_iter()
            .find(|run| run.id == id)
            .ok_or_else(|| StoreError::RunNotFound { id: id.to_string() })
    }

    /// Upserts the run by id and appends its postings to the employees' ledgers.
    fn save_run(&mut self, confirmation: &RunConfirmation) -> Result<(), StoreError>;

    fn mark_run_paid(&mut self, id: &str) -> Result<PayrollRun, StoreError>;
}

pub fn validate_employee(employee: &Employee) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidEmployee {
        employee_id: employee.id.clone(),
        reason,
    };
    if employee.hourly_rate < Decimal::ZERO {
        return Err(invalid(format!("negative hourly rate {}", employee.hourly_rate)));
    }
    if employee.overtime_rate < Decimal::ZERO {
        return Err(invalid(format!("negative overtime rate {}", employee.overtime_rate)));
    }
    if let Some(entry) = employee
        .balance_history
        .iter()
        .find(|entry| entry.amount <= Decimal::ZERO)
    {
        return Err(invalid(format!(
            "ledger entry '{}' on {} has non-positive amount {}",
            entry.description, entry.date, entry.amount
        )));
    }
    Ok(())
}

// --- Shared write logic ---

fn apply_confirmation(
    runs: &mut Vec<PayrollRun>,
    employees: &mut [Employee],
    confirmation: &RunConfirmation,
) -> Result<(), StoreError> {
    let run = &confirmation.run;
    match runs.iter_mut().find(|existing| existing.id == run.id) {
        Some(existing) if existing.is_paid() => {
            return Err(StoreError::RunAlreadyPaid { id: run.id.clone() });
        }
        Some(existing) => {
            debug!("Replacing stored run: Run={}", run.id);
            *existing = run.clone();
        }
        None => runs.push(run.clone()),
    }

    for posting in &confirmation.postings {
        match employees.iter_mut().find(|e| e.id == posting.employee_id) {
            Some(employee) => employee.balance_history.push(posting.entry.clone()),
            None => warn!(
                "Dropping ledger posting for unknown employee: Emp={}, Amount={}",
                posting.employee_id, posting.entry.amount
            ),
        }
    }
    Ok(())
}

fn apply_paid(runs: &mut [PayrollRun], id: &str) -> Result<PayrollRun, StoreError> {
    let run = runs
        .iter_mut()
        .find(|run| run.id == id)
        .ok_or_else(|| StoreError::RunNotFound { id: id.to_string() })?;
    if run.is_paid() {
        debug!("Run already marked paid: Run={}", id);
    }
    run.status = PayrollStatus::Paid;
    Ok(run.clone())
}

// --- JSON files ---

/// Keeps each collection as a pretty-printed JSON array in `data_dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    fn read_list<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>, StoreError> {
        let path = self.path(file_name);
        if !path.exists() {
            debug!("No data file yet, treating as empty: {:?}", path);
            return Ok(Vec::new());
        }
        let json_string = fs::read_to_string(&path)
            .map_err(|e| io_context(e, format!("Failed to read data file: {:?}", path)))?;
        Ok(serde_json::from_str(&json_string)?)
    }

    fn staged_path(&self, file_name: &str) -> PathBuf {
        self.path(&format!("{}.tmp", file_name))
    }

    /// Writes `items` to `<file_name>.tmp`. The live file is untouched until `commit`.
    fn stage_list<T: Serialize>(&self, file_name: &str, items: &[T]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            io_context(
                e,
                format!("Failed to create data directory: {:?}", self.data_dir),
            )
        })?;
        let staged = self.staged_path(file_name);
        let json_string = serde_json::to_string_pretty(items)?;
        if let Err(e) = fs::write(&staged, json_string) {
            self.discard_staged(file_name);
            return Err(io_context(e, format!("Failed to write data file: {:?}", staged)));
        }
        Ok(staged)
    }

    fn commit(&self, file_name: &str) -> Result<(), StoreError> {
        let path = self.path(file_name);
        fs::rename(self.staged_path(file_name), &path)
            .map_err(|e| io_context(e, format!("Failed to replace data file: {:?}", path)))
    }

    fn discard_staged(&self, file_name: &str) {
        let staged = self.staged_path(file_name);
        if staged.is_file() {
            if let Err(e) = fs::remove_file(&staged) {
                warn!("Could not remove staged file: Path={:?}, Error={}", staged, e);
            }
        }
    }

    fn write_list<T: Serialize>(&self, file_name: &str, items: &[T]) -> Result<(), StoreError> {
        let staged = self.stage_list(file_name, items)?;
        if let Err(e) = self.commit(file_name) {
            self.discard_staged(file_name);
            return Err(e);
        }
        debug!("Wrote {} records via {:?}", items.len(), staged);
        Ok(())
    }

    pub fn write_employees(&self, employees: &[Employee]) -> Result<(), StoreError> {
        self.write_list(EMPLOYEES_FILE, employees)
    }

    pub fn write_time_logs(&self, time_logs: &[TimeLog]) -> Result<(), StoreError> {
        self.write_list(TIME_LOGS_FILE, time_logs)
    }
}

impl PayrollStore for JsonFileStore {
    fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        let employees: Vec<Employee> = self.read_list(EMPLOYEES_FILE)?;
        for employee in &employees {
            validate_employee(employee)?;
        }
        Ok(employees)
    }

    fn time_logs(&self) -> Result<Vec<TimeLog>, StoreError> {
        let time_logs: Vec<TimeLog> = self.read_list(TIME_LOGS_FILE)?;
        for log in time_logs
            .iter()
            .filter(|log| !week_window::is_week_start(log.week_start_date))
        {
            warn!(
                "Time log week does not start on a Monday and will never be aggregated: Client={}, Week={}",
                log.client_id, log.week_start_date
            );
        }
        Ok(time_logs)
    }

    fn runs(&self) -> Result<Vec<PayrollRun>, StoreError> {
        self.read_list(PAYROLL_RUNS_FILE)
    }

    /// Both files are staged before either is replaced. If the employees file cannot
    /// be replaced after the runs file was, the previous runs are written back.
    fn save_run(&mut self, confirmation: &RunConfirmation) -> Result<(), StoreError> {
        let previous_runs = self.runs()?;
        let mut runs = previous_runs.clone();
        let mut employees = self.employees()?;
        apply_confirmation(&mut runs, &mut employees, confirmation)?;
        let with_postings = !confirmation.postings.is_empty();

        self.stage_list(PAYROLL_RUNS_FILE, &runs)?;
        if with_postings {
            if let Err(e) = self.stage_list(EMPLOYEES_FILE, &employees) {
                self.discard_staged(PAYROLL_RUNS_FILE);
                return Err(e);
            }
        }

        if let Err(e) = self.commit(PAYROLL_RUNS_FILE) {
            self.discard_staged(PAYROLL_RUNS_FILE);
            self.discard_staged(EMPLOYEES_FILE);
            return Err(e);
        }
        if with_postings {
            if let Err(e) = self.commit(EMPLOYEES_FILE) {
                self.discard_staged(EMPLOYEES_FILE);
                if let Err(rollback) = self.write_list(PAYROLL_RUNS_FILE, &previous_runs) {
                    error!(
                        "Could not roll back payroll runs: Run={}, Error={}",
                        confirmation.run.id, rollback
                    );
                }
                return Err(e);
            }
        }
        info!(
            "Saved run: Run={}, Postings={}, Dir={:?}",
            confirmation.run.id,
            confirmation.postings.len(),
            self.data_dir
        );
        Ok(())
    }

    fn mark_run_paid(&mut self, id: &str) -> Result<PayrollRun, StoreError> {
        let mut runs = self.runs()?;
        let run = apply_paid(&mut runs, id)?;
        self.write_list(PAYROLL_RUNS_FILE, &runs)?;
        info!("Run marked paid: Run={}", id);
        Ok(run)
    }
}

// --- In memory ---

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    employees: Vec<Employee>,
    time_logs: Vec<TimeLog>,
    runs: Vec<PayrollRun>,
}

impl InMemoryStore {
    pub fn new(employees: Vec<Employee>, time_logs: Vec<TimeLog>) -> Self {
        Self {
            employees,
            time_logs,
            runs: Vec::new(),
        }
    }
}

impl PayrollStore for InMemoryStore {
    fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self.employees.clone())
    }

    fn time_logs(&self) -> Result<Vec<TimeLog>, StoreError> {
        Ok(self.time_logs.clone())
    }

    fn runs(&self) -> Result<Vec<PayrollRun>, StoreError> {
        Ok(self.runs.clone())
    }

    fn save_run(&mut self, confirmation: &RunConfirmation) -> Result<(), StoreError> {
        apply_confirmation(&mut self.runs, &mut self.employees, confirmation)
    }

    fn mark_run_paid(&mut self, id: &str) -> Result<PayrollRun, StoreError> {
        apply_paid(&mut self.runs, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{postings_for_run, LedgerPosting};
    use crate::models::{BalanceEntry, EmployeePayment};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn get_test_dir(test_name: &str) -> PathBuf {
        PathBuf::from(format!("./test_sitepay_data_{}", test_name))
    }

    fn setup(test_name: &str) -> JsonFileStore {
        teardown(test_name);
        JsonFileStore::new(get_test_dir(test_name))
    }

    fn teardown(test_name: &str) {
        let _ = fs::remove_dir_all(get_test_dir(test_name));
    }

    fn confirmation(employee: &Employee, paid: Decimal) -> RunConfirmation {
        let payment = EmployeePayment::draft(employee, dec!(10), dec!(0), dec!(200))
            .with_paid_amount(paid)
            .settled();
        let run = PayrollRun::new(d("2025-01-06"), d("2025-01-13"), vec![payment]);
        let postings = postings_for_run(&run);
        RunConfirmation { run, postings }
    }

    #[test]
    fn missing_files_read_as_empty() {
        let test_name = "missing_files";
        let store = setup(test_name);
        assert!(store.employees().unwrap().is_empty());
        assert!(store.time_logs().unwrap().is_empty());
        assert!(store.runs().unwrap().is_empty());
        assert!(matches!(
            store.run("nope"),
            Err(StoreError::RunNotFound { .. })
        ));
        teardown(test_name);
    }

    #[test]
    fn save_run_persists_run_and_ledger_postings() {
        let test_name = "save_run";
        let mut store = setup(test_name);
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        store.write_employees(&[ana.clone()]).unwrap();

        let confirmation = confirmation(&ana, dec!(150));
        store.save_run(&confirmation).unwrap();

        let reopened = JsonFileStore::new(get_test_dir(test_name));
        assert_eq!(reopened.run(&confirmation.run.id).unwrap(), confirmation.run);
        let history = &reopened.employees().unwrap()[0].balance_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, dec!(50));
        teardown(test_name);
    }

    #[test]
    fn save_run_upserts_by_id() {
        let test_name = "upsert";
        let mut store = setup(test_name);
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        store.write_employees(&[ana.clone()]).unwrap();

        let mut confirmation = confirmation(&ana, dec!(200));
        store.save_run(&confirmation).unwrap();
        confirmation.run.total_amount = dec!(1);
        store.save_run(&confirmation).unwrap();

        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].total_amount, dec!(1));
        teardown(test_name);
    }

    #[test]
    fn failed_save_leaves_both_files_untouched() {
        let test_name = "failed_save";
        let mut store = setup(test_name);
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        store.write_employees(&[ana.clone()]).unwrap();
        // a directory in the way makes staging the employees file fail
        let blocker = store.data_dir().join(format!("{}.tmp", EMPLOYEES_FILE));
        fs::create_dir_all(&blocker).unwrap();

        let confirmation = confirmation(&ana, dec!(150));
        assert!(matches!(
            store.save_run(&confirmation),
            Err(StoreError::Io { .. })
        ));
        assert!(store.runs().unwrap().is_empty());
        assert!(store.employees().unwrap()[0].balance_history.is_empty());
        assert!(!store
            .data_dir()
            .join(format!("{}.tmp", PAYROLL_RUNS_FILE))
            .exists());

        fs::remove_dir_all(&blocker).unwrap();
        store.save_run(&confirmation).unwrap();
        assert_eq!(store.runs().unwrap().len(), 1);
        assert_eq!(store.employees().unwrap()[0].balance_history.len(), 1);
        assert!(!blocker.exists());
        teardown(test_name);
    }

    #[test]
    fn paid_runs_are_not_overwritten() {
        let test_name = "paid_runs";
        let mut store = setup(test_name);
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        let confirmation = confirmation(&ana, dec!(200));
        store.save_run(&confirmation).unwrap();

        let paid = store.mark_run_paid(&confirmation.run.id).unwrap();
        assert!(paid.is_paid());
        assert!(matches!(
            store.save_run(&confirmation),
            Err(StoreError::RunAlreadyPaid { .. })
        ));
        assert!(matches!(
            store.mark_run_paid("nope"),
            Err(StoreError::RunNotFound { .. })
        ));
        teardown(test_name);
    }

    #[test]
    fn invalid_employees_are_rejected_on_load() {
        let test_name = "invalid_employee";
        let store = setup(test_name);
        let broke = Employee::new("E9", "Broke", dec!(-1), dec!(0));
        store.write_employees(&[broke]).unwrap();
        assert!(matches!(
            store.employees(),
            Err(StoreError::InvalidEmployee { employee_id, .. }) if employee_id == "E9"
        ));

        let zero_entry = Employee::new("E8", "Zed", dec!(20), dec!(30)).with_entry(
            BalanceEntry::debit(d("2025-01-01"), dec!(0), "Nothing"),
        );
        assert!(validate_employee(&zero_entry).is_err());
        teardown(test_name);
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let test_name = "malformed";
        let store = setup(test_name);
        fs::create_dir_all(store.data_dir()).unwrap();
        fs::write(store.data_dir().join(PAYROLL_RUNS_FILE), "{not json").unwrap();
        assert!(matches!(store.runs(), Err(StoreError::Json(_))));
        teardown(test_name);
    }

    #[test]
    fn in_memory_store_drops_postings_for_unknown_employees() {
        let ana = Employee::new("E1", "Ana", dec!(20), dec!(30));
        let mut store = InMemoryStore::new(vec![ana.clone()], Vec::new());
        let mut confirmation = confirmation(&ana, dec!(150));
        confirmation.postings.push(LedgerPosting {
            employee_id: "GHOST".to_string(),
            entry: BalanceEntry::debit(d("2025-01-13"), dec!(5), "Stray"),
        });
        store.save_run(&confirmation).unwrap();

        let employees = store.employees().unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].balance_history.len(), 1);
    }
}
