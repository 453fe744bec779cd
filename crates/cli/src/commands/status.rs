//! Status and health of a running operator

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_bool, color_status, format_time, print_json, print_table, OutputFormat};

/// Show the operator status snapshot
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status),
        OutputFormat::Table => {
            println!("{}", "Operator Status".bold());
            println!("{}", "=".repeat(60));
            println!("Cluster:              {}", status.cluster_id.cyan());
            println!("Commit:               {}", status.operator_commit);
            println!();

            let prometheus = &status.prometheus;
            println!("{}", "Prometheus".bold());
            println!("{}", "-".repeat(60));
            println!("Address:              {}", prometheus.address);
            println!("Configured:           {}", color_bool(prometheus.prometheus_configured));
            println!("Connected:            {}", color_bool(prometheus.prometheus_connected));
            if !prometheus.connection_error.is_empty() {
                println!("Connection Error:     {}", prometheus.connection_error.red());
            }
            println!("Last Query Start:     {}", format_time(prometheus.last_query_start_time));
            println!("Last Query Success:   {}", format_time(prometheus.last_query_success_time));
            println!();

            let reports = &status.reports;
            println!("{}", "Reports".bold());
            println!("{}", "-".repeat(60));
            println!("Last Hour Queried:    {}", reports.last_hour_queried);
            println!("Data Collected:       {}", color_bool(reports.data_collected));
            if !reports.data_collection_message.is_empty() {
                println!("Message:              {}", reports.data_collection_message);
            }
            println!();

            let packaging = &status.packaging;
            println!("{}", "Packaging".bold());
            println!("{}", "-".repeat(60));
            println!(
                "Last Success:         {}",
                format_time(packaging.last_successful_packaging_time)
            );
            println!(
                "Reports Stored:       {} / {}",
                packaging.report_count.unwrap_or(0),
                packaging.max_reports()
            );
            if !packaging.error.is_empty() {
                println!("Error:                {}", packaging.error.red());
            }
        }
    }
    Ok(())
}

#[derive(Tabled, Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Show component health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    if format == OutputFormat::Json {
        print_json(&health);
        return Ok(());
    }

    let overall = serde_json::to_value(health.status)?
        .as_str()
        .unwrap_or_default()
        .to_string();
    println!("Overall: {}", color_status(&overall));

    let rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| {
            let status = serde_json::to_value(component.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            ComponentRow {
                name: name.clone(),
                status: color_status(&status),
                message: component.message.clone().unwrap_or_default(),
            }
        })
        .collect();
    print_table(&rows, format);
    Ok(())
}
