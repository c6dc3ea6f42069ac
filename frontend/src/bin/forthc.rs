use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use stackarch_core::isa;
use stackarch_forthc::translate;

/// Translate Forth-like source into an addressed program image.
#[derive(Parser)]
#[command(name = "forthc")]
struct Args {
    /// Source file (UTF-8)
    source: PathBuf,
    /// Output image file (JSON)
    target: PathBuf,
    /// Address the program is loaded and started at
    #[arg(short = 's', long = "start-adr", default_value_t = 10)]
    start_adr: i32,
    /// Address mapped to the I/O port
    #[arg(short = 'd', long = "io-adr", default_value_t = 0)]
    io_adr: i32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let src = std::fs::read_to_string(&args.source)
        .with_context(|| format!("reading {}", args.source.display()))?;
    let code = translate(&src, args.io_adr, args.start_adr)?;
    isa::write_code(&args.target, &code)
        .with_context(|| format!("writing {}", args.target.display()))?;
    println!("Translated successfully: {} cells", code.len());
    Ok(())
}
