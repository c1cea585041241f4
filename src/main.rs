use std::path::PathBuf;

use clap::{Parser, Subcommand};

use taskmaster::config::Config;
use taskmaster::core::Capability;
use taskmaster::planning::{DispatchReport, Plan, Taskmaster};
use taskmaster::queue::{DirectoryQueue, QueueMonitor, QueueStore};
use taskmaster::{tlog, Error, Result};

/// Taskmaster - split free-text requests into ordered, role-routed queue records
#[derive(Parser, Debug)]
#[command(name = "taskmaster")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKMASTER_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskmaster/taskmaster.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file to use instead of ~/.taskmaster/taskmaster.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Decompose a request and write its subtasks to the queue
    Plan {
        /// The request, in plain language
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,

        /// Print the ordered batch without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Queue directory (overrides config)
        #[arg(long)]
        queue_dir: Option<PathBuf>,
    },

    /// Show which roles a request would be routed to
    Route {
        /// The request, in plain language
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List pending queue records in FIFO order
    Pending {
        /// Only show records for this role
        #[arg(long, short = 'c')]
        capability: Option<String>,

        /// Queue directory (overrides config)
        #[arg(long)]
        queue_dir: Option<PathBuf>,
    },

    /// Show record counts per role and status
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Queue directory (overrides config)
        #[arg(long)]
        queue_dir: Option<PathBuf>,
    },

    /// Stream queue events until interrupted
    Watch {
        /// Queue directory (overrides config)
        #[arg(long)]
        queue_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    taskmaster::log::init(cli.debug);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let queue_dir = |override_dir: Option<PathBuf>| {
        override_dir.unwrap_or_else(|| config.effective_queue_dir())
    };

    match cli.command {
        Command::Plan {
            request,
            dry_run,
            json,
            queue_dir: dir,
        } => run_plan(&config, &request.join(" "), dry_run, json, queue_dir(dir)),
        Command::Route { request, json } => run_route(&config, &request.join(" "), json),
        Command::Pending {
            capability,
            queue_dir: dir,
        } => run_pending(queue_dir(dir), capability),
        Command::Status {
            json,
            queue_dir: dir,
        } => run_status(queue_dir(dir), json),
        Command::Watch { queue_dir: dir } => run_watch(queue_dir(dir)),
    }
}

fn run_plan(config: &Config, request: &str, dry_run: bool, json: bool, dir: PathBuf) -> Result<()> {
    tlog!(
        "Plan command: dry_run={}, queue_dir={}, request={:?}",
        dry_run,
        dir.display(),
        request
    );
    let taskmaster = Taskmaster::new(config)?;

    if let Some(suggestion) = taskmaster.route(request).suggestion {
        eprintln!("{}\n", suggestion);
    }

    if dry_run {
        let plan = taskmaster.plan(request)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let store = DirectoryQueue::new(&dir);
    let report = taskmaster.dispatch(request, &store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_plan(&report.plan);
        print_dispatch(&report, &store);
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    println!(
        "Complexity:  {} ({:?})",
        plan.complexity, plan.complexity_rule
    );
    println!(
        "Batch:       {} ({} task(s))",
        plan.batch.batch_id.short(),
        plan.batch.len()
    );
    println!();
    for (i, subtask) in plan.batch.iter().enumerate() {
        println!(
            "  {:>2}. [{}] P{} {}",
            i + 1,
            subtask.capability.label(),
            subtask.priority_tier,
            subtask.id
        );
        println!("      {}", truncate_string(&subtask.description, 72));
        if subtask.has_dependencies() {
            println!("      after: {}", subtask.dependencies.join(", "));
        }
    }
    for edge in &plan.batch.tolerated_cycles {
        println!("  warning: cycle, {} ordered anyway", edge);
    }

    println!();
    println!("Workload distribution:");
    for (capability, count) in &plan.summary.per_capability {
        println!("  {:<10} {}", capability.to_string(), count);
    }
    println!(
        "Estimated completion: ~{} minutes",
        plan.summary.estimated_minutes_ceil()
    );
}

fn print_dispatch(report: &DispatchReport, store: &DirectoryQueue) {
    println!();
    println!(
        "Queued {} record(s) in {}",
        report.records.len(),
        store.dir().display()
    );
    for record in &report.records {
        println!("  {}", record.file_name());
    }
}

fn run_route(config: &Config, request: &str, json: bool) -> Result<()> {
    let taskmaster = Taskmaster::new(config)?;
    let outcome = taskmaster.route(request);
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let decision = &outcome.decision;
    if decision.ambiguous {
        println!("Ambiguous request.");
    } else {
        let roles: Vec<String> = decision.capabilities.iter().map(|c| c.to_string()).collect();
        println!("Route to: {} ({})", roles.join(", "), decision.source);
    }
    if !decision.scores.is_empty() {
        println!("Scores:");
        for (capability, score) in &decision.scores {
            println!("  {:<10} {}", capability.to_string(), score);
        }
    }
    if let Some(suggestion) = outcome.suggestion {
        println!();
        println!("{}", suggestion);
    }
    Ok(())
}

fn run_pending(dir: PathBuf, capability: Option<String>) -> Result<()> {
    let capability = match capability {
        Some(name) => {
            let capability = Capability::new(&name);
            if !Capability::is_valid_name(capability.as_str()) {
                return Err(Error::Validation(format!("Invalid capability name: {}", name)));
            }
            Some(capability)
        }
        None => None,
    };

    let store = DirectoryQueue::new(&dir);
    let records = store.list_pending(capability.as_ref())?;
    if records.is_empty() {
        println!("No pending records in {}", dir.display());
        return Ok(());
    }
    for record in records {
        println!(
            "{}  [{}] P{}  {}",
            record.identity,
            record.capability().label(),
            record.priority_tier(),
            truncate_string(&record.subtask.description, 60)
        );
    }
    Ok(())
}

fn run_status(dir: PathBuf, json: bool) -> Result<()> {
    let store = DirectoryQueue::new(&dir);
    let counts = store.status_counts()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    println!("Queue: {}", dir.display());
    if counts.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    println!(
        "  {:<10} {:>8} {:>12} {:>10}",
        "ROLE", "PENDING", "IN_PROGRESS", "COMPLETED"
    );
    for (capability, c) in &counts {
        println!(
            "  {:<10} {:>8} {:>12} {:>10}",
            capability.to_string(),
            c.pending,
            c.in_progress,
            c.completed
        );
    }
    Ok(())
}

fn run_watch(dir: PathBuf) -> Result<()> {
    let monitor = QueueMonitor::start(&dir)?;
    println!("Watching {} (Ctrl-C to stop)", dir.display());
    for event in monitor.events().iter() {
        println!("{}", event);
    }
    Ok(())
}

fn truncate_string(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() <= max && !s.contains('\n') {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}
