//! `bind-preview`: show the HTTP request an operation call would produce,
//! without sending it.
//!
//! Usage:
//!
//! ```text
//! bind-preview <catalog.json> <operation> <args> [--endpoint <url>]
//! ```
//!
//! `<args>` is a JSON array of arguments, given inline (`'["Z1", null]'`) or
//! as the path of a file holding the array. Validators run exactly as they
//! would before a real call, so a rejected argument is reported instead of a
//! request.

use cloudbind::api::catalog_from_file;
use cloudbind::binder::RequestBinder;
use cloudbind::invocation::{Invocation, Operation};
use cloudbind::validation::{ValidatorRegistry, validate_invocation};
use serde_json::Value;
use std::process;
use std::sync::Arc;

const DEFAULT_ENDPOINT: &str = "http://localhost";

fn print_usage() {
    eprintln!("Usage: bind-preview <catalog.json> <operation> <args> [OPTIONS]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <catalog.json>      Path to the operation catalog JSON file");
    eprintln!("  <operation>         Name of the operation to bind");
    eprintln!("  <args>              JSON array of arguments, inline or a file path");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --endpoint <url>    Base URL to bind against (default: {DEFAULT_ENDPOINT})");
    eprintln!("  --help              Show this message");
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn load_args(raw: &str) -> anyhow::Result<Vec<Value>> {
    let text = if raw.trim_start().starts_with('[') {
        raw.to_string()
    } else {
        std::fs::read_to_string(raw)
            .map_err(|e| anyhow::anyhow!("Failed to read arguments file '{raw}': {e}"))?
    };
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Arguments are not valid JSON: {e}"))?;
    match value {
        Value::Array(args) => Ok(args),
        other => anyhow::bail!("Arguments must be a JSON array, got {other}"),
    }
}

fn run() -> anyhow::Result<()> {
    // --- Argument parsing ---------------------------------------------------
    let mut args = std::env::args().skip(1);
    let mut positional: Vec<String> = Vec::new();
    let mut endpoint = DEFAULT_ENDPOINT.to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--endpoint" => {
                endpoint = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--endpoint requires a URL argument"))?;
            }
            // Inline argument arrays start with '[', never '-'.
            _ if arg.starts_with('-') => {
                anyhow::bail!("Unknown option: {arg}");
            }
            _ => positional.push(arg),
        }
    }

    let [catalog_path, operation_name, raw_args]: [String; 3] =
        positional.try_into().map_err(|given: Vec<String>| {
            print_usage();
            anyhow::anyhow!("Expected 3 arguments, got {}", given.len())
        })?;

    // --- Resolve operation --------------------------------------------------
    let catalog = catalog_from_file(&catalog_path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog '{catalog_path}': {e}"))?;
    let spec = catalog
        .iter()
        .find(|s| s.name == operation_name)
        .ok_or_else(|| anyhow::anyhow!("Operation '{operation_name}' not in {catalog_path}"))?;
    let operation = Operation::resolve(spec, &ValidatorRegistry::with_builtins())?;

    // --- Validate and bind --------------------------------------------------
    let endpoint = url::Url::parse(&endpoint)
        .map_err(|e| anyhow::anyhow!("Invalid endpoint '{endpoint}': {e}"))?;
    let invocation = Invocation::new(Arc::new(operation), load_args(&raw_args)?)?;
    validate_invocation(&invocation)?;
    let request = RequestBinder::new(endpoint)?.bind(&invocation)?;

    println!("{} {}", request.method(), request.url());
    for (name, value) in request.headers().iter() {
        println!("{name}: {value}");
    }
    if let Some(payload) = request.payload() {
        println!("Content-Type: {}", payload.content_type());
        println!();
        println!("{}", payload.text());
    }
    Ok(())
}
