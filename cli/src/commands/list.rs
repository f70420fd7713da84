//! List command - show processes bound to ports.

use anyhow::{Context, Result};
use portctl_core::config::OutputFormat;
use portctl_core::{FilterCriteria, SortField};

use super::{load_config, manager, print_details, print_json, print_table, print_tree};

#[derive(Debug, Default)]
pub struct ListArgs {
    pub port: Option<u16>,
    pub service: Option<String>,
    pub user: Option<String>,
    pub sort: Option<String>,
    pub mem_limit: Option<f64>,
    pub cpu_limit: Option<f64>,
    pub tree: bool,
    pub details: bool,
}

impl ListArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            service: self.service.clone(),
            user: self.user.clone(),
            min_memory_mb: self.mem_limit,
            min_cpu_percent: self.cpu_limit,
            ..Default::default()
        }
    }

    /// Flags win over the configured default format.
    fn format(&self, json: bool, configured: OutputFormat) -> OutputFormat {
        if json {
            OutputFormat::Json
        } else if self.details {
            OutputFormat::Details
        } else if self.tree {
            OutputFormat::Tree
        } else {
            configured
        }
    }
}

pub async fn run(args: ListArgs, json: bool) -> Result<()> {
    let config = load_config().await;
    let pm = manager();

    let records = match args.port {
        Some(port) => pm
            .list_on_port(port)
            .await
            .with_context(|| format!("Failed to list processes on port {}", port))?,
        None => pm.list_all().await.context("Failed to list processes")?,
    };

    let mut records = pm.filter(&records, &args.criteria());
    let sort = args
        .sort
        .as_deref()
        .map(SortField::parse)
        .unwrap_or(config.list.sort);
    pm.sort(&mut records, sort);

    let format = args.format(json, config.output.format);
    if format == OutputFormat::Json {
        return print_json(&records);
    }

    if records.is_empty() {
        match args.port {
            Some(port) => println!("No processes found on port {} matching filters", port),
            None => println!("No processes found matching filters"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Details => print_details(&records),
        OutputFormat::Tree => print_tree(&records),
        _ => print_table(&records),
    }
    Ok(())
}
