use appt_window::application::commands::{appointment_changed_impl, run_sweep_impl, AppState};
use appt_window::infrastructure::definition_mapper::ChangeEventPayload;
use appt_window::runtime::serve;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "appt-window", about = "Sliding-window appointment occurrence generator")]
struct Cli {
    /// Workspace root holding config/, state/ and logs/ (defaults to the
    /// current directory)
    #[arg(long)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one periodic sweep and print the result
    Sweep,
    /// Apply a change-event payload read from a JSON file, or stdin for "-"
    Apply { payload: String },
    /// Serve the HTTP trigger endpoints and the daily sweep loop
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let workspace_root = match cli.root {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(error) => {
                eprintln!("failed to resolve current directory: {error}");
                std::process::exit(1);
            }
        },
    };

    let state = match AppState::new(workspace_root) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            eprintln!("failed to initialize workspace: {error}");
            std::process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Commands::Sweep => sweep_command(&state),
        Commands::Apply { payload } => apply_command(&state, &payload),
        Commands::Serve => serve_command(state).await,
    };
    std::process::exit(exit_code);
}

fn sweep_command(state: &AppState) -> i32 {
    match run_sweep_impl(state) {
        Ok(response) => {
            print_json(&response);
            0
        }
        Err(error) => {
            eprintln!("{}", state.command_error("run_sweep", &error));
            1
        }
    }
}

fn apply_command(state: &AppState, payload_source: &str) -> i32 {
    let raw = if payload_source == "-" {
        let mut buffer = String::new();
        if let Err(error) = std::io::stdin().read_to_string(&mut buffer) {
            eprintln!("failed to read payload from stdin: {error}");
            return 1;
        }
        buffer
    } else {
        match std::fs::read_to_string(payload_source) {
            Ok(raw) => raw,
            Err(error) => {
                eprintln!("failed to read payload file {payload_source}: {error}");
                return 1;
            }
        }
    };

    let payload: ChangeEventPayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(error) => {
            eprintln!("invalid change payload: {error}");
            return 1;
        }
    };

    match appointment_changed_impl(state, payload) {
        Ok(response) => {
            print_json(&response);
            0
        }
        Err(error) => {
            eprintln!("{}", state.command_error("appointment_changed", &error));
            1
        }
    }
}

async fn serve_command(state: Arc<AppState>) -> i32 {
    match serve(state).await {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("server error: {error}");
            1
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(error) => eprintln!("failed to render response: {error}"),
    }
}
