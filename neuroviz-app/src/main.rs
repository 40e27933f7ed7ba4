//! Neuroviz
//!
//! Desktop host that turns recorded inference responses into a live 3D view
//! of the network's activations.
//!
//! Keys:
//! - Space: apply the next response
//! - C: clear to empty colors
//! - O: open a response file
//! - D: replay the drawing frames as live input
//! - Esc: quit

mod app;
mod delegate;
mod error;

use clap::Parser;
use std::path::PathBuf;

/// Neuroviz - 3D neural network activation viewer
#[derive(Parser, Debug)]
#[command(name = "neuroviz")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Inference response JSON to load (repeatable)
    #[arg(short, long)]
    response: Vec<PathBuf>,

    /// Directory of PNG/JPEG drawing frames to replay as live input
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,
}

fn main() {
    let args = Args::parse();

    let options = app::RunOptions {
        responses: args.response,
        frames: args.frames,
        config: args.config,
        width: args.width,
        height: args.height,
    };
    if let Err(e) = app::run(options) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
