use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use entitydb::core::Value;
use entitydb::entity::{EntityKind, KindDescriptor};
use entitydb::query::{FilterCompiler, FilterRequest, Scope, parse_array_parameter};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "entity-tool")]
#[command(about = "Developer tooling for entity kinds and filter compilation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile keyword filters against a kind descriptor and print the predicate
    Compile {
        #[arg(long)]
        kind: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        owner: Option<Uuid>,
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        include_deleted: bool,
        #[arg(long)]
        strict: bool,
        /// `key=value`, repeatable
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
    /// Show how a raw membership parameter is split and deduplicated
    ParseArray { value: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile {
            kind,
            tenant,
            owner,
            id,
            include_deleted,
            strict,
            filters,
        } => {
            let mut scope = Scope::new().deleted(include_deleted);
            if let Some(tenant) = tenant {
                scope = scope.tenant(tenant);
            }
            if let Some(owner) = owner {
                scope = scope.owner(owner);
            }
            compile(&kind, &scope, id, &filters, strict)
        }
        Command::ParseArray { value } => {
            let items = parse_array_parameter(Value::from(value));
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
    }
}

fn load_kind(path: &Path) -> Result<EntityKind> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read kind descriptor '{}'", path.display()))?;
    let descriptor: KindDescriptor = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid kind descriptor JSON in '{}'", path.display()))?;
    EntityKind::try_from(descriptor)
        .with_context(|| format!("Invalid kind descriptor '{}'", path.display()))
}

fn parse_filters(input: &[String]) -> Result<FilterRequest> {
    let mut pairs = Vec::with_capacity(input.len());
    for item in input {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid filter '{}'. Expected key=value", item))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Invalid filter '{}'. Key is empty", item));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(FilterRequest::from_query_pairs(pairs))
}

fn compile(
    kind_path: &Path,
    scope: &Scope,
    identifier: Option<Uuid>,
    filters: &[String],
    strict: bool,
) -> Result<()> {
    let kind = load_kind(kind_path)?;
    let filters = parse_filters(filters)?;
    let compiler = if strict {
        FilterCompiler::strict()
    } else {
        FilterCompiler::lenient()
    };

    let predicate = compiler
        .compile(&kind, scope, identifier, &filters)
        .with_context(|| format!("Failed to compile filters for '{}'", kind.name()))?;

    let output = json!({
        "kind": kind.name(),
        "predicate": predicate.to_string(),
        "conditions": predicate.conditions(),
        "dropped": predicate.dropped(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
