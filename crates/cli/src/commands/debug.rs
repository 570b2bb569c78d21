//! Debug and troubleshooting CLI commands
//!
//! These run the normalisation and classification rules on a single input
//! without touching approvals or inventory.

use anyhow::Result;
use capdash_lib::{NameNormalizer, ProfileClassifier};
use colored::Colorize;
use serde::Serialize;

use crate::output::{print_heading, print_json, OutputFormat};

#[derive(Serialize)]
struct Classification<'a> {
    instance_type: &'a str,
    description: &'a str,
    memory_gb: u32,
    nodes: u32,
    profile: String,
}

/// Classify a single-pool cluster of `nodes` nodes of `instance_type`
pub fn classify(
    classifier: &ProfileClassifier,
    instance_type: &str,
    nodes: u32,
    format: OutputFormat,
) -> Result<()> {
    let memory_gb = classifier.memory_gb(instance_type);
    let result = Classification {
        instance_type,
        description: classifier.description(instance_type),
        memory_gb,
        nodes,
        profile: ProfileClassifier::determine_profile(memory_gb, nodes).to_string(),
    };

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading("Classification");
            println!("Instance type: {}", result.instance_type.cyan());
            println!("Description:   {}", result.description);
            println!("Memory:        {}GB", result.memory_gb);
            println!("Nodes:         {}", result.nodes);
            println!("Profile:       {}", result.profile.bold());
        }
    }
    Ok(())
}

/// Apply the profile decision table directly
pub fn profile(memory_gb: u32, nodes: u32, format: OutputFormat) -> Result<()> {
    let profile = ProfileClassifier::determine_profile(memory_gb, nodes);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "memory_gb": memory_gb,
            "nodes": nodes,
            "profile": profile,
        }))?,
        OutputFormat::Table => println!("{}GB x {} nodes -> {}", memory_gb, nodes, profile.as_str().bold()),
    }
    Ok(())
}

/// Show how a region label or API slug normalises
pub fn region(normalizer: &NameNormalizer, raw: &str, format: OutputFormat) -> Result<()> {
    let label = normalizer.catalog().label_for(raw);
    let key = normalizer.normalize_region(raw);

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "input": raw,
            "catalog_label": label,
            "region": key,
        }))?,
        OutputFormat::Table => {
            if let Some(label) = label {
                println!("Slug {} is {}", raw.cyan(), label);
            }
            println!("{:?} -> {}", raw, key.as_str().bold());
        }
    }
    Ok(())
}

/// Show how an account name normalises
pub fn account(normalizer: &NameNormalizer, raw: &str, format: OutputFormat) -> Result<()> {
    let key = normalizer.normalize_account(raw);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "input": raw,
            "account": key,
        }))?,
        OutputFormat::Table => println!("{:?} -> {}", raw, key.as_str().bold()),
    }
    Ok(())
}
