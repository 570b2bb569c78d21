//! Capacity report CLI commands

use anyhow::Result;
use capdash_lib::{
    reconcile::has_profile_overage, AccountKey, AccountReport, CapacityReport, CapacityService,
    CapacityStatus, ClusterRecord, ComparisonRecord, UnapprovedRecord,
};
use colored::Colorize;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{
    color_cluster_status, color_status, format_capacity, print_heading, print_info, print_json,
    print_success, print_table, print_warning, OutputFormat,
};

/// Row for the approved-vs-current table
#[derive(Tabled)]
struct ComparisonRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Approved")]
    approved: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&ComparisonRecord> for ComparisonRow {
    fn from(record: &ComparisonRecord) -> Self {
        let mut status = color_status(record.status);
        if has_profile_overage(record) && record.status != CapacityStatus::Exceeded {
            status = format!("{} *", status);
        }
        Self {
            account: record.account.to_string(),
            region: record.region.to_string(),
            year: record.year,
            approved: format_capacity(&record.total),
            current: format_capacity(&record.current),
            available: format_capacity(&record.available),
            status,
        }
    }
}

/// Row for the unapproved-excess table
#[derive(Tabled)]
struct UnapprovedRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Excess")]
    excess: u32,
}

impl From<&UnapprovedRecord> for UnapprovedRow {
    fn from(record: &UnapprovedRecord) -> Self {
        Self {
            account: record.account.to_string(),
            region: record.region.to_string(),
            profile: record.profile.to_string(),
            excess: record.excess_count,
        }
    }
}

/// Row for the live cluster table
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Nodes")]
    nodes: u32,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&ClusterRecord> for ClusterRow {
    fn from(record: &ClusterRecord) -> Self {
        Self {
            account: record.account.to_string(),
            id: record.cluster_id.clone(),
            label: record.label.clone(),
            region: record.region.to_string(),
            profile: record.profile.to_string(),
            nodes: record.node_count,
            memory: if record.max_memory_gb > 0 {
                format!("{}GB", record.max_memory_gb)
            } else {
                "-".to_string()
            },
            status: color_cluster_status(&record.status, record.degraded),
        }
    }
}

async fn load(service: &CapacityService, accounts: &[AccountKey]) -> Result<CapacityReport> {
    Ok(service.report().await?.filter_accounts(accounts))
}

fn print_failures(report: &CapacityReport) {
    for failure in &report.failures {
        print_warning(&format!(
            "Inventory for {} unavailable: {}",
            failure.account, failure.error
        ));
    }
    let degraded = report.degraded_clusters();
    if degraded > 0 {
        print_warning(&format!(
            "{} cluster(s) counted as D without pool detail",
            degraded
        ));
    }
}

fn render_account(account: &AccountReport) {
    print_heading(&format!("Account: {}", account.account));
    println!("Approved: {}", format_capacity(&account.approved_total));
    println!("Current:  {}", format_capacity(&account.current_total()));
    println!();

    if account.regions.is_empty() {
        print_info("No approved capacity");
    } else {
        let rows: Vec<ComparisonRow> = account.regions.iter().map(Into::into).collect();
        print_table(&rows);
    }

    if !account.unapproved.is_empty() {
        println!("{}", "Unapproved capacity".bold());
        let rows: Vec<UnapprovedRow> = account.unapproved.iter().map(Into::into).collect();
        print_table(&rows);
    }

    if !account.clusters.is_empty() {
        println!("{}", "Clusters".bold());
        let rows: Vec<ClusterRow> = account.clusters.iter().map(Into::into).collect();
        print_table(&rows);
    }
    println!();
}

fn render_report(report: &CapacityReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!(
                "Generated at {}",
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().cyan()
            );
            println!();
            for account in &report.accounts {
                render_account(account);
            }
            print_failures(report);

            let exceeded = report.exceeded_regions().count();
            if exceeded == 0 {
                print_success("No region exceeds its approval");
            } else {
                print_warning(&format!("{} region(s) exceed their approval", exceeded));
            }
        }
    }
    Ok(())
}

/// Show the full per-account report
pub async fn show_report(
    service: &CapacityService,
    accounts: &[AccountKey],
    format: OutputFormat,
) -> Result<()> {
    let report = load(service, accounts).await?;
    render_report(&report, format)
}

/// Show approved vs. current capacity per region
pub async fn show_comparison(
    service: &CapacityService,
    accounts: &[AccountKey],
    format: OutputFormat,
) -> Result<()> {
    let report = load(service, accounts).await?;
    let records: Vec<&ComparisonRecord> = report.comparisons().collect();

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<ComparisonRow> = records.into_iter().map(Into::into).collect();
            print_table(&rows);
            print_failures(&report);
            println!("\n{} marks a profile over approval within an aggregate limit", "*".bold());
        }
    }
    Ok(())
}

/// Show live capacity that exceeds approval
pub async fn show_unapproved(
    service: &CapacityService,
    accounts: &[AccountKey],
    format: OutputFormat,
) -> Result<()> {
    let report = load(service, accounts).await?;
    let records: Vec<&UnapprovedRecord> = report.unapproved().collect();

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            if records.is_empty() {
                print_success("No unapproved capacity");
            } else {
                let rows: Vec<UnapprovedRow> = records.into_iter().map(Into::into).collect();
                print_table(&rows);
                println!(
                    "\nTotal excess: {}",
                    format_capacity(&report.unapproved_totals())
                );
            }
            print_failures(&report);
        }
    }
    Ok(())
}

/// Show live clusters with their classification
pub async fn show_clusters(
    service: &CapacityService,
    accounts: &[AccountKey],
    format: OutputFormat,
) -> Result<()> {
    let report = load(service, accounts).await?;
    let records: Vec<&ClusterRecord> = report.clusters().collect();

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<ClusterRow> = records.iter().copied().map(Into::into).collect();
            print_table(&rows);
            println!("\nTotal: {} clusters", records.len());
            print_failures(&report);
        }
    }
    Ok(())
}

/// Re-render the report every `interval` until Ctrl-C.
///
/// Each tick reads through the report cache, so figures change once the
/// cached report expires.
pub async fn watch(
    service: &CapacityService,
    accounts: &[AccountKey],
    format: OutputFormat,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match load(service, accounts).await {
                    Ok(report) => render_report(&report, format)?,
                    Err(e) => print_warning(&format!("Report unavailable: {:#}", e)),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                print_info("Stopped watching");
                return Ok(());
            }
        }
    }
}
