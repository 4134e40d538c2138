use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use pinsync::client::RemoteClient;
use pinsync::config::{self, ConfigValue, Declaration};
use pinsync::resource::{self, PinResource, PlanOutcome};
use pinsync::state::{self, PinRecord};
use pinsync::{Error, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare the declaration against recorded state without touching the service
    Plan {
        /// Path to a pin declaration TOML
        decl: PathBuf,
        /// State file (defaults to pinsync.state.json next to the declaration)
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Reconcile every declared pin against the service
    Apply {
        /// Path to a pin declaration TOML
        decl: PathBuf,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Unpin every tracked pin and clear the recorded state
    Destroy {
        /// Path to a pin declaration TOML
        decl: PathBuf,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Adopt an existing remote pin under a declared id
    Import {
        /// Path to a pin declaration TOML
        decl: PathBuf,
        /// Declaration id to bind the pin to
        id: String,
        /// Remote pin id to adopt
        remote_id: String,
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Plan { decl, state } => cmd_plan(&decl, state),
        Command::Apply { decl, state } => cmd_apply(&decl, state),
        Command::Destroy { decl, state } => cmd_destroy(&decl, state),
        Command::Import {
            decl,
            id,
            remote_id,
            state,
        } => cmd_import(&decl, &id, &remote_id, state),
    }
}

fn decl_base(decl_path: &Path) -> &Path {
    decl_path.parent().unwrap_or_else(|| Path::new("."))
}

fn state_path(decl_path: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| decl_base(decl_path).join("pinsync.state.json"))
}

fn declared_ids(decl: &Declaration) -> BTreeSet<String> {
    decl.pins.iter().map(|p| p.id.clone()).collect()
}

fn connect(decl: &Declaration) -> Result<RemoteClient> {
    let provider = config::resolve_provider(
        ConfigValue::from_option(decl.provider.root.clone()),
        ConfigValue::from_option(decl.provider.token.clone()),
    )?;
    RemoteClient::new(Some(&provider.root), &provider.token)
}

fn cmd_plan(decl_path: &Path, state_override: Option<PathBuf>) -> Result<()> {
    let decl = config::load_declaration(decl_path)?;
    let doc = state::load(&state_path(decl_path, state_override))?;
    let base = decl_base(decl_path);

    for pin in &decl.pins {
        let inputs = pin.input_set(base);
        match doc.pins.get(&pin.id) {
            None => println!("{:<24} create", pin.id),
            Some(rec) => {
                let diff = resource::plan_diff(&inputs, &rec.state.checksum)
                    .map_err(|e| e.context(format!("plan pin '{}'", pin.id)))?;
                match diff.outcome {
                    PlanOutcome::NoChange => println!("{:<24} no change", pin.id),
                    PlanOutcome::ForcedReplace => {
                        println!("{:<24} replace (content changed)", pin.id)
                    }
                }
            }
        }
    }
    let declared = declared_ids(&decl);
    for key in doc.pins.keys() {
        if !declared.contains(key) {
            println!("{:<24} delete (no longer declared)", key);
        }
    }
    Ok(())
}

fn cmd_apply(decl_path: &Path, state_override: Option<PathBuf>) -> Result<()> {
    let decl = config::load_declaration(decl_path)?;
    let sp = state_path(decl_path, state_override);
    let mut doc = state::load(&sp)?;
    let base = decl_base(decl_path);

    let client = connect(&decl)?;
    let pin_resource = PinResource::new(&client);

    for pin in &decl.pins {
        let inputs = pin.input_set(base);
        let next = match doc.pins.get(&pin.id) {
            None => {
                println!("{:<24} creating", pin.id);
                pin_resource
                    .create(&inputs)
                    .map_err(|e| e.context(format!("pin '{}'", pin.id)))?
            }
            Some(rec) => {
                let diff = resource::plan_diff(&inputs, &rec.state.checksum)
                    .map_err(|e| e.context(format!("pin '{}'", pin.id)))?;
                match diff.outcome {
                    PlanOutcome::NoChange => {
                        println!("{:<24} up to date, refreshing", pin.id);
                        pin_resource
                            .read(&rec.state)
                            .map_err(|e| e.context(format!("pin '{}'", pin.id)))?
                    }
                    PlanOutcome::ForcedReplace => {
                        println!("{:<24} replacing", pin.id);
                        pin_resource
                            .update(&rec.state, &inputs)
                            .map_err(|e| e.context(format!("pin '{}'", pin.id)))?
                    }
                }
            }
        };
        doc.pins.insert(pin.id.clone(), PinRecord::new(next));
        state::save(&sp, &doc)?;
    }

    let declared = declared_ids(&decl);
    let stale = doc
        .pins
        .keys()
        .filter(|k| !declared.contains(*k))
        .cloned()
        .collect::<Vec<_>>();
    for key in stale {
        if let Some(rec) = doc.pins.get(&key).cloned() {
            println!("{:<24} deleting (no longer declared)", key);
            pin_resource
                .delete(&rec.state)
                .map_err(|e| e.context(format!("pin '{key}'")))?;
            doc.pins.remove(&key);
            state::save(&sp, &doc)?;
        }
    }
    Ok(())
}

fn cmd_destroy(decl_path: &Path, state_override: Option<PathBuf>) -> Result<()> {
    let decl = config::load_declaration(decl_path)?;
    let sp = state_path(decl_path, state_override);
    let mut doc = state::load(&sp)?;

    if doc.pins.is_empty() {
        println!("nothing to destroy");
        return Ok(());
    }

    let client = connect(&decl)?;
    let pin_resource = PinResource::new(&client);

    let keys = doc.pins.keys().cloned().collect::<Vec<_>>();
    for key in keys {
        if let Some(rec) = doc.pins.get(&key).cloned() {
            println!("{:<24} deleting", key);
            pin_resource
                .delete(&rec.state)
                .map_err(|e| e.context(format!("pin '{key}'")))?;
            doc.pins.remove(&key);
            state::save(&sp, &doc)?;
        }
    }
    Ok(())
}

fn cmd_import(
    decl_path: &Path,
    id: &str,
    remote_id: &str,
    state_override: Option<PathBuf>,
) -> Result<()> {
    let decl = config::load_declaration(decl_path)?;
    if !decl.pins.iter().any(|p| p.id == id) {
        return Err(Error::msg(format!(
            "declaration {} has no pin '{}' to import into",
            decl_path.display(),
            id
        )));
    }
    let sp = state_path(decl_path, state_override);
    let mut doc = state::load(&sp)?;

    let client = connect(&decl)?;
    let pin_resource = PinResource::new(&client);

    let imported = pin_resource.import_by_id(remote_id)?;
    println!(
        "{:<24} imported id={} cid={} (checksum unknown until next apply)",
        id, imported.id, imported.cid
    );
    doc.pins.insert(id.to_string(), PinRecord::new(imported));
    state::save(&sp, &doc)?;
    Ok(())
}
