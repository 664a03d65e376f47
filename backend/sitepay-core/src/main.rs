// src/main.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum_server::tls_rustls::RustlsConfig;
use sitepay_core::balance::ledger;
use sitepay_core::export::write_run_csv;
use sitepay_core::week_window;
use sitepay_core::{
    rebuild_draft, router, AppState, Clock, JsonFileStore, PayrollConfig, PayrollStore,
    RunController, SystemClock, WeekWindow,
};

#[derive(Parser)]
#[command(name = "sitepay", about = "Weekly payroll and balance ledger")]
struct Cli {
    /// Data directory (overrides SITEPAY_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the draft payroll for the week containing a date
    Draft {
        /// Any date in the week, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        week: Option<NaiveDate>,
    },
    /// List confirmed payroll runs
    Runs,
    /// Write a run's payments to CSV
    Export {
        #[arg(long)]
        run: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Show an employee's balance ledger
    Ledger { employee_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = PayrollConfig::from_env().context("Loading configuration failed")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    info!(
        "Configuration loaded: DataDir={:?}, FlatTaxRate={}",
        config.data_dir, config.flat_tax_rate
    );
    let store = JsonFileStore::new(&config.data_dir);

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server_host = host;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            serve(config, store).await
        }
        Commands::Draft { week } => print_draft(&config, &store, week),
        Commands::Runs => print_runs(&store),
        Commands::Export { run, output } => export_run(&store, &run, &output),
        Commands::Ledger { employee_id } => print_ledger(&store, &employee_id),
    }
}

async fn serve(config: PayrollConfig, store: JsonFileStore) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let controller = RunController::new(config.flat_tax_rate, clock.today())
        .context("Cannot open a payroll week for today")?;
    let app = router(AppState::new(controller, Box::new(store), clock));

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("Invalid server address")?;

    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .context("Failed to load TLS cert/key")?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Starting server on http://{}", addr);
            axum::serve(listener, app).await.context("HTTP server failed")?;
        }
    }
    Ok(())
}

fn print_draft(config: &PayrollConfig, store: &JsonFileStore, week: Option<NaiveDate>) -> Result<()> {
    let date = week.unwrap_or_else(|| SystemClock.today());
    let week = WeekWindow::containing(date)
        .with_context(|| format!("No payroll week contains {}", date))?;
    let payments = rebuild_draft(
        week.start(),
        &store.time_logs()?,
        &store.employees()?,
        config.flat_tax_rate,
    );

    println!("Payroll draft for {}", week);
    if payments.is_empty() {
        println!("  No hours logged.");
        return Ok(());
    }
    for payment in &payments {
        println!(
            "  {:<24} reg {:>6} ot {:>6}  gross {:>10.2}  net {:>10.2}",
            payment.employee_name,
            payment.regular_hours.normalize(),
            payment.overtime_hours.normalize(),
            payment.gross_pay,
            payment.calculated_net_pay
        );
        for deduction in &payment.deductions {
            println!("      - {:<32} {:>10.2}", deduction.description, deduction.amount);
        }
    }
    let total: rust_decimal::Decimal = payments.iter().map(|p| p.paid_amount).sum();
    println!("  Total to pay: {:.2}", total);
    Ok(())
}

fn print_runs(store: &JsonFileStore) -> Result<()> {
    let mut runs = store.runs()?;
    runs.sort_by(|a, b| b.week_start_date.cmp(&a.week_start_date));
    if runs.is_empty() {
        println!("No payroll runs.");
    }
    for run in &runs {
        println!(
            "{}  {}  {:<16}  {:>3} payments  total {:.2}",
            run.id,
            week_window::display(run.week_start_date),
            format!("{:?}", run.status),
            run.payments.len(),
            run.total_amount
        );
    }
    Ok(())
}

fn export_run(store: &JsonFileStore, run_id: &str, output: &Path) -> Result<()> {
    let run = store.run(run_id)?;
    let file = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    write_run_csv(&run, file)?;
    println!("Wrote {} payments to {:?}", run.payments.len(), output);
    Ok(())
}

fn print_ledger(store: &JsonFileStore, employee_id: &str) -> Result<()> {
    let employee = store
        .employees()?
        .into_iter()
        .find(|e| e.id == employee_id)
        .with_context(|| format!("Employee not found: {}", employee_id))?;
    let account = ledger(&employee);

    println!("{} ({})", account.employee_name, account.employee_id);
    for line in &account.lines {
        println!(
            "  {}  {:<6} {:>10.2}  {:>10.2}  {}",
            line.entry.date,
            format!("{:?}", line.entry.entry_type),
            line.entry.amount,
            line.running_balance,
            line.entry.description
        );
    }
    println!("  Outstanding: {:.2}", account.outstanding_balance);
    Ok(())
}
