#![forbid(unsafe_code)]
//! Walk through tamper evidence on a local ledger: append, edit history,
//! watch validation fail, then re-mine and inspect which blocks still carry
//! proof-of-work.

use centralchain::blockchain::{Block, Blockchain};
use centralchain::config::MAX_DIFFICULTY;
use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use serde_json::json;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "centralchain-demo",
    version,
    about = "Demonstrate tamper evidence on a local ledger"
)]
struct Args {
    /// Leading zero hex digits required of mined blocks
    #[arg(short, long, default_value_t = 3)]
    difficulty: usize,

    /// Number of blocks to append after genesis
    #[arg(short, long, default_value_t = 4)]
    blocks: usize,

    /// Index of the block to rewrite and re-mine
    #[arg(short, long, default_value_t = 1)]
    target: usize,
}

fn print_chain(chain: &Blockchain) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Hash").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Previous").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Nonce").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("PoW").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
        ]);

    for block in chain.blocks() {
        let pow = if block.is_genesis() {
            Cell::new("-").fg(TableColor::DarkGrey)
        } else if block.meets_difficulty(chain.difficulty()) {
            Cell::new("yes").fg(TableColor::Green)
        } else {
            Cell::new("no").fg(TableColor::Red)
        };
        table.add_row(vec![
            Cell::new(block.index()).fg(TableColor::White),
            Cell::new(short(block.hash())).fg(TableColor::Yellow),
            Cell::new(short(block.previous_hash())).fg(TableColor::DarkGrey),
            Cell::new(block.nonce()).fg(TableColor::White),
            pow,
        ]);
    }

    println!("{}\n", table);
}

fn short(hash: &str) -> String {
    hash.chars().take(16).collect()
}

fn print_validity(chain: &Blockchain) {
    match chain.validate_detailed() {
        Ok(()) => println!("{} {}\n", "Chain valid:".bold(), "true".green().bold()),
        Err(violation) => {
            println!("{} {}", "Chain valid:".bold(), "false".red().bold());
            println!("  {}\n", violation.to_string().red());
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if args.difficulty > MAX_DIFFICULTY {
        return Err(format!("difficulty must be at most {}", MAX_DIFFICULTY).into());
    }
    if args.target > args.blocks {
        return Err(format!("target must be between 0 and {}", args.blocks).into());
    }

    println!("{}", "CentralChain tamper-evidence demo".bright_cyan().bold());
    println!("{}\n", "--------------------------------".bright_cyan());

    let mut chain = Blockchain::new(args.difficulty);
    for n in 1..=args.blocks {
        let started = Instant::now();
        let block: &Block = chain.append(json!({ "entry": n }));
        println!(
            "⛏️  mined block {} (nonce {}) in {:.3}s",
            block.index(),
            block.nonce(),
            started.elapsed().as_secs_f64()
        );
    }
    println!();
    print_chain(&chain);
    print_validity(&chain);

    println!(
        "{}",
        format!("✏️  Rewriting payload of block {}", args.target).yellow().bold()
    );
    chain.rewrite_data(args.target, json!({ "entry": "tampered" }))?;
    print_chain(&chain);
    print_validity(&chain);

    println!(
        "{}",
        format!("⛏️  Re-mining block {} and re-linking descendants", args.target)
            .yellow()
            .bold()
    );
    let started = Instant::now();
    chain.remine(args.target)?;
    println!("   done in {:.3}s\n", started.elapsed().as_secs_f64());
    print_chain(&chain);
    print_validity(&chain);

    let unmined = chain
        .blocks()
        .iter()
        .skip(1)
        .filter(|b| !b.meets_difficulty(chain.difficulty()))
        .count();
    println!(
        "{} {} block(s) after the edit are linked but no longer carry proof-of-work.",
        "Note:".bold(),
        unmined
    );

    Ok(())
}
