// src/main.rs

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentSummary {
    employee_id: String,
    employee_name: String,
    gross_pay: f64,
    calculated_net_pay: f64,
    paid_amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftView {
    state: String,
    week_display: String,
    payments: Vec<PaymentSummary>,
    total_paid: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    id: String,
    week_start_date: String,
    status: String,
    total_amount: f64,
}

async fn expect_ok(response: reqwest::Response) -> Result<Value, Box<dyn Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        return Err(format!("Request failed: Status={}, Body={}", status, body).into());
    }
    Ok(body)
}

fn print_draft(draft: &DraftView) {
    println!("Draft [{}] for {}", draft.state, draft.week_display);
    for payment in &draft.payments {
        println!(
            "  {:<6} {:<20} gross {:>9.2}  net {:>9.2}  paid {:>9.2}",
            payment.employee_id,
            payment.employee_name,
            payment.gross_pay,
            payment.calculated_net_pay,
            payment.paid_amount
        );
    }
    println!("  Total to pay: {:.2}", draft.total_paid);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("SITEPAY_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let week = env::args().nth(1).unwrap_or_else(|| "2025-01-06".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health_response);

    // Test 2: Build the draft
    println!("\n🔍 Selecting payroll week {}...", week);
    let body = expect_ok(
        client
            .post(format!("{}/api/payroll/draft/week", base_url))
            .json(&json!({ "week": week }))
            .send()
            .await?,
    )
    .await?;
    let draft: DraftView = serde_json::from_value(body)?;
    print_draft(&draft);

    let Some(first) = draft.payments.first() else {
        println!("\n⚠️ No hours logged for this week; nothing to confirm.");
        return Ok(());
    };

    // Test 3: Override a paid amount
    let reduced = (first.calculated_net_pay - 50.0).max(0.0);
    println!(
        "\n🔍 Paying {} {:.2} instead of {:.2}...",
        first.employee_name, reduced, first.calculated_net_pay
    );
    let body = expect_ok(
        client
            .put(format!(
                "{}/api/payroll/draft/payments/{}/paid-amount",
                base_url, first.employee_id
            ))
            .json(&json!({ "amount": reduced }))
            .send()
            .await?,
    )
    .await?;
    print_draft(&serde_json::from_value(body)?);

    // Test 4: Confirm
    println!("\n🔍 Confirming run...");
    let confirmation = expect_ok(
        client
            .post(format!("{}/api/payroll/draft/confirm", base_url))
            .send()
            .await?,
    )
    .await?;
    println!(
        "Confirmed run {} with {} ledger postings",
        confirmation["run"]["id"],
        confirmation["postings"].as_array().map_or(0, Vec::len)
    );

    // Test 5: List runs
    println!("\n🔍 Listing runs...");
    let runs: Vec<RunSummary> = client
        .get(format!("{}/api/payroll/runs", base_url))
        .send()
        .await?
        .json()
        .await?;
    for run in &runs {
        println!(
            "  {}  week {}  {:<16} total {:.2}",
            run.id, run.week_start_date, run.status, run.total_amount
        );
    }

    Ok(())
}
