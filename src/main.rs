use clap::{Parser, Subcommand};

use conductor::config::Config;
use conductor::orchestration::is_conversational_query;
use conductor::planner::TaskPlanner;
use conductor::state::ProjectState;
use conductor::{clog, Result};

/// Conductor - plans natural-language game-editing requests into agent tasks
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    CONDUCTOR_DEBUG=1     Enable debug logging (alternative to --debug)\n    CONDUCTOR_LOG=<level> Log level: error, warn, info, debug or trace")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.conductor/conductor.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build a plan for a request and print its parallel groups
    Plan {
        /// The request in natural language
        request: String,

        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report whether a request is conversational or actionable
    Classify {
        /// The request in natural language
        text: String,
    },

    /// Show the active configuration
    Config {
        /// Write the defaults to the config file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    conductor::log::init_with_debug(cli.debug);

    match cli.command {
        Command::Plan { request, json } => run_plan(&request, json),
        Command::Classify { text } => {
            let kind = if is_conversational_query(&text) {
                "conversational"
            } else {
                "actionable"
            };
            println!("{}", kind);
            Ok(())
        }
        Command::Config { init } => run_config(init),
    }
}

/// Plan offline: the deterministic planner against an empty project.
fn run_plan(request: &str, json: bool) -> Result<()> {
    let config = Config::load()?;
    let planner = TaskPlanner::new(config.planner);
    let plan = planner.create_plan(request, &ProjectState::default())?;
    clog!("CLI planned {} task(s) for: {}", plan.tasks.len(), request);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Plan {} ({} task(s))", plan.id.short(), plan.tasks.len());
    for (index, group) in plan.parallel_groups.iter().enumerate() {
        println!();
        println!("  Group {}:", index + 1);
        for task in plan.resolve_group(group) {
            println!(
                "    - [{}] {} -> {}",
                task.task_type, task.description, task.assigned_agent
            );
        }
    }

    let unscheduled = plan.unscheduled();
    if !unscheduled.is_empty() {
        println!();
        println!("  {} task(s) could not be scheduled (cyclic dependencies)", unscheduled.len());
    }
    Ok(())
}

fn run_config(init: bool) -> Result<()> {
    let path = Config::config_path()?;
    let config = Config::load()?;
    if init && !path.exists() {
        config.save()?;
        println!("Wrote {}", path.display());
    }
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
