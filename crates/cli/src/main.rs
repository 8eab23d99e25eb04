//! Z/stencil test stage simulator CLI.
//!
//! This binary runs a synthetic frame through the stage. It performs:
//! 1. **Setup:** Load a JSON configuration (or the defaults) and program the depth/stencil registers.
//! 2. **Frame:** Clear the buffer, draw overlapping layers of rectangles and swap.
//! 3. **Report:** Print the stage statistics, optionally restricted to some sections.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zstsim_core::common::SimError;
use zstsim_core::config::Config;
use zstsim_core::rop::{CompareMode, GpuRegister, RegisterValue, StencilOp};
use zstsim_core::sim::{Rect, workload};
use zstsim_core::stats::STATS_SECTIONS;
use zstsim_core::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "zstsim",
    author,
    version,
    about = "Cycle-accurate GPU Z/stencil test stage simulator",
    long_about = "Clear, draw and swap one synthetic frame through the Z/stencil test stage.\n\nEach layer is a rectangle shifted right and down from the previous one; even layers move closer to the viewer, odd layers fall behind and fail the depth test where they overlap.\n\nExamples:\n  zstsim\n  zstsim --config zst.json --width 128 --height 128 --layers 8\n  zstsim --stencil --stats test --stats cache\n  RUST_LOG=zstsim_core=trace zstsim --layers 1"
)]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Width of each layer in pixels.
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// Height of each layer in pixels.
    #[arg(long, default_value_t = 64)]
    height: u32,

    /// Number of layers drawn.
    #[arg(short, long, default_value_t = 4)]
    layers: u32,

    /// Also count layers in the stencil buffer (increment on depth pass).
    #[arg(long)]
    stencil: bool,

    /// Run the test after shading (output to color write instead of the fragment FIFO).
    #[arg(long)]
    late_z: bool,

    /// Statistics sections to print (summary, test, cache, memory); all when omitted.
    #[arg(long = "stats", value_parser = clap::builder::PossibleValuesParser::new(STATS_SECTIONS.iter().copied()))]
    sections: Vec<String>,

    /// Enable per-cycle trace logging.
    #[arg(long)]
    trace: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        }),
        None => Config::default(),
    };

    let level = if cli.trace || config.general.trace { "trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let mut sim = Simulator::new(&config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    println!("Configuration: {}", cli.config.as_ref().map_or_else(|| "default".to_owned(), |p| p.display().to_string()));
    println!(
        "  Stamp: {}x{}  Queue: {}  Cache: {} ways x {} lines x {} stamps  Memory latency: {}",
        config.zstencil.tiling.stamp_w,
        config.zstencil.tiling.stamp_h,
        config.zstencil.queue_size,
        config.cache.ways,
        config.cache.lines,
        config.cache.stamps_line,
        config.memory.latency
    );
    println!("  Frame: {} layers of {}x{}", cli.layers, cli.width, cli.height);
    println!();

    if let Err(e) = run_frame(&mut sim, &cli, &config) {
        eprintln!("\n[!] FATAL: {e}");
        eprintln!("    {}", sim.unit().state_summary());
        sim.unit().stats().print_sections(&cli.sections);
        process::exit(1);
    }

    let frame = sim.unit().frames();
    println!("[*] Frame {frame} done at cycle {}", sim.cycle());
    println!("    {} samples reached downstream", sim.output().len());
    sim.unit().stats().print_sections(&cli.sections);
}

/// Programs the registers, then clears, draws and swaps one frame.
///
/// # Errors
///
/// Returns the error that stopped the simulator.
fn run_frame(sim: &mut Simulator, cli: &Cli, config: &Config) -> Result<(), SimError> {
    let x_res = cli.width + cli.layers * (cli.width / 4);
    let y_res = cli.height + cli.layers * (cli.height / 4);

    sim.write_register(GpuRegister::DisplayXRes, RegisterValue::Uint(x_res));
    sim.write_register(GpuRegister::DisplayYRes, RegisterValue::Uint(y_res));
    sim.write_register(GpuRegister::ZBufferClear, RegisterValue::Uint(0x00ff_ffff));
    sim.write_register(GpuRegister::StencilBufferClear, RegisterValue::Uint(0));
    sim.write_register(GpuRegister::EarlyZ, RegisterValue::Bool(!cli.late_z));
    sim.write_register(GpuRegister::DepthTest, RegisterValue::Bool(true));
    sim.write_register(GpuRegister::DepthFunction, RegisterValue::Compare(CompareMode::Less));
    if cli.stencil {
        sim.write_register(GpuRegister::StencilTest, RegisterValue::Bool(true));
        sim.write_register(GpuRegister::StencilFunction, RegisterValue::Compare(CompareMode::Always));
        sim.write_register(GpuRegister::DepthPassUpdate, RegisterValue::StencilOp(StencilOp::Increment));
    }
    let _ = sim.settle()?;

    let cycles = sim.clear()?;
    info!(cycles, "buffer cleared");

    let layout = &config.zstencil.tiling;
    let near = 0x0080_0000u32;
    let step = 0x0000_1000u32;
    for layer in 0..cli.layers {
        let rect = Rect::new(
            (layer * (cli.width / 4)) as i32,
            (layer * (cli.height / 4)) as i32,
            cli.width,
            cli.height,
        );
        let z = if layer % 2 == 0 {
            near - layer * step
        } else {
            near + layer * step
        };
        let stamps = workload::rectangle(layout, rect, z, layer);
        let count = stamps.len();
        let cycles = sim.draw(stamps)?;
        println!("[*] Layer {layer}: {count} stamps in {cycles} cycles");
    }

    let cycles = sim.swap()?;
    info!(cycles, "buffer flushed");
    Ok(())
}
