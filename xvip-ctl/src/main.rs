// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;
use xvip::{config::MultiOutMode, graphdef::GraphDef};
use xvip_ctl::{load_config, load_json, run};

/// Stream a simulated Xilinx video pipeline and print the register trace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON description of the media graph.
    #[arg(short, long)]
    graph: PathBuf,

    /// JSON pipeline configuration; defaults apply to missing fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Multi-output mode (sync, async, 0 or 1), overriding the configuration.
    #[arg(short, long)]
    mode: Option<MultiOutMode>,

    /// DMA engines to stream, in start order. All of them when omitted.
    #[arg(short, long = "dma")]
    dmas: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = load_json::<GraphDef>(&args.graph)
        .and_then(|def| Ok((def, load_config(args.config.as_deref(), args.mode)?)))
        .and_then(|(def, config)| run(&def, config, &args.dmas));

    match result {
        Ok(events) => {
            for event in events {
                println!("{event}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
