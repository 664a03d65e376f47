// src/lib.rs

pub mod aggregator;
pub mod api;
pub mod balance;
pub mod clock;
pub mod config;
pub mod deductions;
pub mod export;
pub mod models;
pub mod payment_editor;
pub mod run_controller;
pub mod store;
pub mod week_window;


pub use api::{router, AppState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, PayrollConfig};
pub use models::{
    BalanceEntry, Deduction, DeductionKind, Employee, EmployeePayment, EntryType, PayrollRun,
    PayrollStatus, TimeLog, WeekHours,
};
pub use payment_editor::{EditError, PaymentEditor, Selection};
pub use run_controller::{rebuild_draft, RunConfirmation, RunController, RunError};
pub use store::{InMemoryStore, JsonFileStore, PayrollStore, StoreError};
pub use week_window::WeekWindow;
