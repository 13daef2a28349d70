use clap::Parser;
use nagare::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Validate and execute nagare flow graphs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flow JSON file (a bare graph or {"flow_graph": ...})
    flow_path: Option<String>,

    /// Directory of <name>.ndjson datasets for named DataSource inputs
    #[arg(short, long)]
    datasets: Option<String>,

    /// Compute output columns only, without running the transforms on rows
    #[arg(short, long)]
    metadata: bool,

    /// Print the columns each node receives from its first input
    #[arg(short, long, conflicts_with = "metadata")]
    allowed_fields: bool,

    /// Print one JSON line per node instead of a single JSON object
    #[arg(long)]
    ndjson: bool,

    /// Print row counts and column types per node instead of the rows
    #[arg(short, long, conflicts_with_all = ["metadata", "allowed_fields"])]
    summary: bool,

    /// Only print the output of this node
    #[arg(short, long)]
    node: Option<String>,

    /// Run in interactive mode to be prompted for inputs
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Metadata,
    AllowedFields,
}

impl Mode {
    fn from_cli(cli: &Cli) -> Self {
        if cli.metadata {
            Mode::Metadata
        } else if cli.allowed_fields {
            Mode::AllowedFields
        } else {
            Mode::Full
        }
    }
}

/// Renders a result as NDJSON lines.
type LinesFn<T> = fn(&ExecutionResult<T>) -> Result<Vec<String>, serde_json::Error>;

struct Run {
    flow_path: String,
    datasets: Option<String>,
    mode: Mode,
    ndjson: bool,
    summary: bool,
    node: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let run = if cli.human {
        run_interactive()
    } else {
        run_non_interactive(cli)
    };
    execute(run);
}

fn run_non_interactive(cli: Cli) -> Run {
    let mode = Mode::from_cli(&cli);
    let flow_path = cli.flow_path.unwrap_or_else(|| {
        exit_with_error("Flow path is required in non-interactive mode.");
    });
    Run {
        flow_path,
        datasets: cli.datasets,
        mode,
        ndjson: cli.ndjson,
        summary: cli.summary,
        node: cli.node,
    }
}

fn run_interactive() -> Run {
    eprintln!("--- Nagare Interactive Mode ---");

    let flow_path = prompt_for_input("Enter flow path", Some("data/flow.json"));
    let datasets = prompt_for_input("Enter datasets directory (optional)", Some(""));

    let mode = loop {
        eprintln!("\nPlease select an execution mode:");
        eprintln!("  1: Full (run every node on real rows)");
        eprintln!("  2: Metadata (output columns only)");
        eprintln!("  3: Allowed fields (columns each node receives)");
        let choice = prompt_for_input("Enter choice", Some("1"));

        match choice.trim() {
            "1" => break Mode::Full,
            "2" => break Mode::Metadata,
            "3" => break Mode::AllowedFields,
            _ => eprintln!("Invalid choice. Please enter 1, 2 or 3."),
        }
    };

    Run {
        flow_path,
        datasets: (!datasets.is_empty()).then_some(datasets),
        mode,
        ndjson: false,
        summary: false,
        node: None,
    }
}

fn execute(run: Run) {
    let total_start = Instant::now();

    // --- 1. Loading ---
    let load_start = Instant::now();
    let flow_json = fs::read_to_string(&run.flow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read flow file '{}': {}",
            run.flow_path, e
        ))
    });
    let graph = FlowGraph::from_json(&flow_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse flow: {}", e)));

    let mut builder = FlowEngine::builder();
    if let Some(dir) = &run.datasets {
        let datasets = NdjsonDirectory::open(dir).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to open datasets in '{}': {}", dir, e))
        });
        builder = builder.with_datasets(Arc::new(datasets));
    }
    let engine = builder.build();
    let load_duration = load_start.elapsed();

    if let Some(node) = &run.node {
        if graph.node(node).is_none() {
            exit_with_error(&format!("Flow has no node '{}'", node));
        }
    }

    // --- 2. Validation ---
    let validate_start = Instant::now();
    let order = engine
        .order(&graph)
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid flow: {}", e)));
    let validate_duration = validate_start.elapsed();
    eprintln!("Execution order: {}", order.join(" -> "));

    // --- 3. Execution ---
    let exec_start = Instant::now();
    match run.mode {
        Mode::Full => {
            let result = engine
                .execute(&graph)
                .unwrap_or_else(|e| exit_with_error(&format!("Execution failed: {}", e)));
            if run.summary {
                print_result(&result.summary(), &run, ExecutionResult::ndjson_lines);
            } else {
                print_result(&result, &run, ExecutionResult::ndjson_lines);
            }
            for (node_id, chart) in result.charts() {
                eprintln!(
                    "  -> Chart '{}': {} series over '{}'",
                    node_id,
                    chart.series.len(),
                    chart.x
                );
            }
        }
        Mode::Metadata => {
            let result = engine
                .execute_metadata(&graph)
                .unwrap_or_else(|e| exit_with_error(&format!("Execution failed: {}", e)));
            print_result(&result, &run, ExecutionResult::ndjson_lines);
        }
        Mode::AllowedFields => {
            let result = engine
                .allowed_fields(&graph)
                .unwrap_or_else(|e| exit_with_error(&format!("Execution failed: {}", e)));
            print_result(&result, &run, ExecutionResult::allowed_fields_lines);
        }
    }
    let exec_duration = exec_start.elapsed();

    // --- 4. Summary ---
    let total_duration = total_start.elapsed();
    eprintln!("\n--- Performance Summary ---");
    eprintln!("Loading:         {:?}", load_duration);
    eprintln!("Validation:      {:?}", validate_duration);
    eprintln!("Execution:       {:?}", exec_duration);
    eprintln!("-----------------------------");
    eprintln!("Total:           {:?}", total_duration);
    eprintln!("Nodes:           {}", order.len());
    eprintln!("Mode:            {:?}", run.mode);
}

/// Prints a result as one JSON object, or as the NDJSON lines `lines` renders.
fn print_result<T: Serialize>(result: &ExecutionResult<T>, run: &Run, lines: LinesFn<T>) {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(node) = &run.node {
        let Some(output) = result.get(node) else {
            exit_with_error(&format!("No output for node '{}'", node));
        };
        let json = serde_json::to_string_pretty(output)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize output: {}", e)));
        writeln!(out, "{}", json).unwrap_or_else(|e| exit_with_error(&e.to_string()));
        return;
    }

    if run.ndjson {
        let lines = lines(result)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize output: {}", e)));
        for line in lines {
            writeln!(out, "{}", line).unwrap_or_else(|e| exit_with_error(&e.to_string()));
        }
    } else {
        let json = serde_json::to_string_pretty(result)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize result: {}", e)));
        writeln!(out, "{}", json).unwrap_or_else(|e| exit_with_error(&e.to_string()));
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default
        .filter(|d| !d.is_empty())
        .map_or(String::new(), |d| format!(" [default: {}]", d));

    eprint!("> {}{}: ", prompt_text, default_prompt);
    io::stderr()
        .flush()
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));

    io::stdin()
        .read_line(&mut line)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read line: {}", e)));
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
