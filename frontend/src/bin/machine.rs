use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use stackarch_core::isa;
use stackarch_core::machine::{MachineConfig, run_image};

/// Run a program image on the stack machine simulator.
#[derive(Parser)]
#[command(name = "machine")]
struct Args {
    /// Program image produced by forthc
    source: PathBuf,
    /// Input buffer fed to the I/O port
    #[arg(short = 'i', long = "input", default_value = "")]
    input: String,
    /// Tick limit
    #[arg(short = 't', long = "ticks", default_value_t = 100_000)]
    ticks: u64,
    /// Memory size in cells
    #[arg(short = 'm', long = "mem-size", default_value_t = 1024)]
    mem_size: usize,
    /// Address the program is loaded and started at
    #[arg(short = 's', long = "start-adr", default_value_t = 10)]
    start_adr: i32,
    /// Address mapped to the I/O port
    #[arg(short = 'd', long = "io-adr", default_value_t = 0)]
    io_adr: i32,
    /// Journal every tick (very large output)
    #[arg(short = 'j', long = "journal")]
    journal: bool,
    /// Write the journal to a file instead of stderr
    #[arg(short = 'o', long = "out-file")]
    out_file: Option<PathBuf>,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if args.journal {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
    if let Some(path) = &args.out_file {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    let code = isa::read_code(&args.source)
        .with_context(|| format!("loading {}", args.source.display()))?;
    let config = MachineConfig {
        input: args.input.clone(),
        tick_limit: args.ticks,
        mem_size: args.mem_size,
        start_adr: args.start_adr,
        io_adr: args.io_adr,
        ..MachineConfig::default()
    };
    let run = run_image(&code, &config)?;
    println!("Ticks: {}", run.ticks);
    println!("{}", run.output);
    println!("Cache miss rate: {:.2}%", run.miss_rate() * 100.0);
    Ok(())
}
