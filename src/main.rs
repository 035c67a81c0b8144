use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paramodel::builtins::{COORDINATE_SYSTEM, LINE, POINT};
use paramodel::{
    Behavior, BehaviorAction, ContextKind, ElementId, ElementSpec, EngineConfig, Session,
    UpdateBinding,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build, update and query a parametric model", long_about = None)]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "paramodel=info")]
    log: String,

    /// Maximum re-entrant event rounds per dispatch
    #[arg(long, global = true)]
    max_event_cascade: Option<usize>,

    /// Skip behavior evaluation after updates
    #[arg(long, global = true)]
    no_behaviors: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Update the demo model and print the update report
    Demo,
    /// Run a selection query against the updated demo model
    Query {
        #[arg(value_name = "QUERY")]
        query: String,
        /// Context to evaluate in, relative to the model root
        #[arg(long, value_name = "PATH")]
        context: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = EngineConfig::default();
    if let Some(n) = cli.max_event_cascade {
        config.max_event_cascade = n;
    }
    config.run_behaviors = !cli.no_behaviors;

    let mut session = Session::new(config);
    let scenario = build_demo(&mut session).context("Failed to build the demo model")?;
    let report = session
        .update(scenario)
        .context("Failed to update the demo model")?;

    let json = match cli.command {
        Command::Demo => serde_json::to_string_pretty(&report)?,
        Command::Query { query, context } => {
            let model = session.model()?;
            let ctx = match context.as_deref() {
                Some(path) => model
                    .lookup_element(model.root(), path)
                    .with_context(|| format!("Unknown context {}", path))?,
                None => model.root(),
            };
            let selected = session
                .select(ctx, &query)
                .with_context(|| format!("Query failed: {}", query))?;
            let names = selected
                .values()
                .map(|id| model.canonical_name(*id))
                .collect::<paramodel::Result<Vec<_>>>()?;
            serde_json::to_string_pretty(&names)?
        }
    };
    println!("{}", json);
    Ok(())
}

/// `demo.scenario1.assembly1` holding `cs → p1 → line1` (plus `p2`), added
/// downstream first so the update has something to sort.
fn build_demo(session: &mut Session) -> paramodel::Result<ElementId> {
    let root = session.new_model("demo")?;
    let scenario = session.add_context(root, "scenario1", ContextKind::Scenario)?;
    let asm = session.add_context(scenario, "assembly1", ContextKind::Assembly)?;

    session.add_element(
        asm,
        ElementSpec::new("line1", LINE).with_binding(
            UpdateBinding::new()
                .reference("start", "p1")
                .reference("end", "p2.position"),
        ),
    )?;
    session.add_element(
        asm,
        ElementSpec::new("p2", POINT).with_binding(
            UpdateBinding::new()
                .with_method("offset")
                .reference("from", "p1")
                .literal("dx", 3.0)
                .literal("dy", 4.0)
                .literal("dz", 0.0),
        ),
    )?;
    session.add_element(
        asm,
        ElementSpec::new("p1", POINT).with_binding(
            UpdateBinding::new()
                .reference("cs", "cs")
                .literal("x", 1.0)
                .literal("y", 2.0)
                .literal("z", 0.0),
        ),
    )?;
    session.add_element(
        asm,
        ElementSpec::new("cs", COORDINATE_SYSTEM).with_binding(
            UpdateBinding::new()
                .literal("x", 10.0)
                .literal("y", 0.0)
                .literal("z", 0.0),
        ),
    )?;
    session.attach_behavior(Behavior::new(
        "relink",
        asm,
        "SELECT * WHERE length>4",
        Some(BehaviorAction::update("line1")),
    )?)?;
    Ok(scenario)
}
