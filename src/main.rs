//! thunderbit - inspect and exercise the Thunderbit Protocol
//!
//! Usage:
//!   thunderbit categories                 → print the effective taxonomy as JSON
//!   thunderbit check graph.json           → validate a proposed edge list
//!   thunderbit project context.json       → print the DTO projection of a stored context
//!   thunderbit demo                       → run the sensory → cognitive scenario
//!   thunderbit config                     → print the effective config as TOML

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thunderbit_core::{BitId, CategoryId, Edge, Relation};
use thunderbit_protocol::{Context, Protocol, SpawnAttrs, ThunderbitConfig};
use thunderbit_registry::RuntimeRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "thunderbit",
    about = "Typed, capability-constrained computational graphs",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(short, long, global = true, default_value = "thunderbit.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List every enabled category
    Categories,
    /// Validate an edge list and report every failing edge
    Check {
        /// JSON array of {from, to, relation[, from_id, to_id]}
        graph: PathBuf,
    },
    /// Print the view-model projection of a stored context map
    Project {
        context: PathBuf,
    },
    /// Spawn, bind and link a sensory and a cognitive bit
    Demo,
    /// Print the effective configuration
    Config,
}

/// One edge of a graph handed to `check`.
#[derive(Deserialize)]
struct ProposedEdge {
    from: CategoryId,
    to: CategoryId,
    relation: Relation,
    #[serde(default)]
    from_id: Option<BitId>,
    #[serde(default)]
    to_id: Option<BitId>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ThunderbitConfig::load(&cli.config);
    let protocol = Protocol::from_config(&config)?;

    match cli.command {
        Commands::Categories => {
            let all = protocol.taxonomy().all();
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        Commands::Check { graph } => check(&protocol, &graph)?,
        Commands::Project { context } => {
            let raw = std::fs::read_to_string(&context)
                .with_context(|| format!("reading {}", context.display()))?;
            let map: Map<String, Value> = serde_json::from_str(&raw)?;
            let ctx = Context::from_map(map)?;
            println!("{}", serde_json::to_string_pretty(&protocol.project(&ctx))?);
        }
        Commands::Demo => {
            let ctx = demo(&protocol, config.new_context())?;
            println!("{}", serde_json::to_string_pretty(&ctx.to_map()?)?);
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thunderbit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn check(protocol: &Protocol, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let proposed: Vec<ProposedEdge> = serde_json::from_str(&raw)?;
    let edges: Vec<Edge> = proposed
        .into_iter()
        .map(|p| {
            Edge::from_parts(
                p.from_id.unwrap_or_default(),
                p.from,
                p.to_id.unwrap_or_default(),
                p.to,
                p.relation,
            )
        })
        .collect();

    match protocol.validator().validate_graph(&edges) {
        Ok(()) => {
            println!("{} edges ok", edges.len());
            Ok(())
        }
        Err(failures) => {
            for (edge, err) in &failures {
                println!(
                    "{} -[{}]-> {}: {}",
                    edge.from_category(),
                    edge.relation(),
                    edge.to_category(),
                    err
                );
            }
            anyhow::bail!("{} of {} edges invalid", failures.len(), edges.len())
        }
    }
}

/// Sensory feeds Cognitive: spawn both, bind content onto the thinker, link.
/// Live bits are mirrored into a runtime registry along the way.
fn demo(protocol: &Protocol, ctx: Context) -> anyhow::Result<Context> {
    let registry = RuntimeRegistry::new();

    let (sensor, ctx) = protocol.spawn(
        CategoryId::Sensory,
        SpawnAttrs::new().content("motion at the door"),
        &ctx,
    )?;
    registry.register(sensor.clone())?;

    let (thinker, ctx) = protocol.spawn(CategoryId::Cognitive, SpawnAttrs::new(), &ctx)?;
    let (thinker, ctx) = protocol.bind(
        thinker.id(),
        |mut bit, ctx| {
            bit.content = Value::from("who is there?");
            Ok((bit, ctx.clone()))
        },
        &ctx,
    )?;
    registry.register(thinker.clone())?;

    let (edge, ctx) = protocol.link(sensor.id(), thinker.id(), Relation::Feeds, &ctx)?;
    tracing::info!(
        edge = %edge.id(),
        live = registry.count(),
        "demo graph wired"
    );
    Ok(ctx)
}
