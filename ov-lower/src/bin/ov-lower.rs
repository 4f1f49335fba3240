//! Developer front end for the lowering core.
//!
//! Usage:
//!   ov-lower check subgraph.json
//!   ov-lower lower subgraph.json --options opts.json

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use tflite_ov_lower::config::DelegateOptions;
use tflite_ov_lower::lower::{is_node_supported, lower_subgraph};
use tflite_ov_lower::tflite::SubgraphFile;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("check") => cmd_check(&args[1..]),
        Some("lower") => cmd_lower(&args[1..]),
        Some("--help") | Some("-h") | None => print_usage(),
        Some(other) => {
            eprintln!("error: unknown subcommand '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("ov-lower — TFLite partition lowering");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  ov-lower check <subgraph.json> [--options <opts.json>]");
    eprintln!("  ov-lower lower <subgraph.json> [--options <opts.json>]");
    eprintln!();
    eprintln!("Subcommands:");
    eprintln!("  check   Print the support decision for every node");
    eprintln!("  lower   Lower the partition and print the IR");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG=debug   Show why nodes are rejected");
}

/// Parsed `<subgraph.json> [--options <opts.json>]`.
struct Inputs {
    file: SubgraphFile,
    options: DelegateOptions,
}

fn parse_inputs(cmd: &str, args: &[String]) -> Inputs {
    let usage = format!("Usage: ov-lower {cmd} <subgraph.json> [--options <opts.json>]");
    let mut subgraph_path: Option<PathBuf> = None;
    let mut options_path: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--options" => {
                i += 1;
                options_path = Some(PathBuf::from(args.get(i).unwrap_or_else(|| {
                    eprintln!("--options requires a file path");
                    process::exit(1);
                })));
            }
            "--help" | "-h" => {
                eprintln!("{usage}");
                process::exit(0);
            }
            other => {
                if subgraph_path.is_none() {
                    subgraph_path = Some(PathBuf::from(other));
                } else {
                    eprintln!("unexpected argument: {other}");
                    eprintln!("{usage}");
                    process::exit(1);
                }
            }
        }
        i += 1;
    }

    let subgraph_path = subgraph_path.unwrap_or_else(|| {
        eprintln!("{usage}");
        process::exit(1);
    });

    let options = match &options_path {
        Some(path) => DelegateOptions::load(path).unwrap_or_else(|err| {
            eprintln!("error: {err}");
            process::exit(1);
        }),
        None => DelegateOptions::default(),
    };

    env_logger::Builder::new()
        .filter_level(options.log_level())
        .parse_default_env()
        .init();

    Inputs {
        file: read_subgraph(&subgraph_path),
        options,
    }
}

fn read_subgraph(path: &Path) -> SubgraphFile {
    let text = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("error reading {}: {err}", path.display());
        process::exit(1);
    });
    SubgraphFile::from_json(&text).unwrap_or_else(|err| {
        eprintln!("error parsing {}: {err}", path.display());
        process::exit(1);
    })
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(args: &[String]) {
    let Inputs { file, .. } = parse_inputs("check", args);

    let mut rejected = 0;
    for node in &file.subgraph.nodes {
        let supported = is_node_supported(node, &file.tensors);
        if !supported {
            rejected += 1;
        }
        println!(
            "node {:>3}  {:<28} {}",
            node.id,
            node.op.to_string(),
            if supported { "supported" } else { "not supported" }
        );
    }
    eprintln!(
        "==> {}/{} nodes can be delegated",
        file.subgraph.nodes.len() - rejected,
        file.subgraph.nodes.len()
    );
}

// ---------------------------------------------------------------------------
// lower
// ---------------------------------------------------------------------------

fn cmd_lower(args: &[String]) {
    let Inputs { file, options } = parse_inputs("lower", args);

    let lowered = lower_subgraph(&file.subgraph, &file.tensors, &options).unwrap_or_else(|err| {
        eprintln!("not accelerated: {err}");
        process::exit(1);
    });

    print!("{}", lowered.model);
    eprintln!(
        "==> {} IR nodes for {} (inputs {:?}, outputs {:?})",
        lowered.model.graph.len(),
        lowered.device,
        lowered.compute_inputs,
        lowered.outputs
    );
}
