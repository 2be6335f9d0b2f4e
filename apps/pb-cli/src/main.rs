use clap::{Parser, Subcommand};
use nalgebra::DMatrix;
use pb_app::{AppError, AppResult, AxesDef, BalanceConfig, RunProgress};
use pb_core::timing::synthesis_timing;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pb-cli")]
#[command(about = "Pole balancer CLI - online LQR synthesis for an inverted pendulum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config file syntax and values
    Validate {
        /// Path to the config YAML file
        config_path: PathBuf,
    },
    /// Synthesize a gain with the config's initial weights
    Gain {
        /// Path to the config YAML file
        config_path: PathBuf,
        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run the closed-loop scenario
    Run {
        /// Path to the config YAML file
        config_path: PathBuf,
        /// Output CSV file path (optional, summary only if absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a default config
    Init {
        /// Where to write the config
        config_path: PathBuf,
        /// Control the x axis only
        #[arg(long)]
        planar: bool,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Gain { config_path, json } => cmd_gain(&config_path, json),
        Commands::Run {
            config_path,
            output,
        } => cmd_run(&config_path, output.as_deref()),
        Commands::Init {
            config_path,
            planar,
        } => cmd_init(&config_path, planar),
    };
    synthesis_timing::print_summary();
    result
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating config: {}", config_path.display());
    let config = pb_app::load_config(config_path)?;
    pb_app::validate_config(&config)?;
    println!("✓ Config is valid ({:?}, {})", config.axes, config.name);
    Ok(())
}

#[derive(Serialize)]
struct GainReport {
    a: Vec<Vec<f64>>,
    b: Vec<Vec<f64>>,
    p: Vec<Vec<f64>>,
    k: Vec<Vec<f64>>,
    poles: Vec<[f64; 2]>,
    residual: f64,
}

fn rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

fn cmd_gain(config_path: &Path, json: bool) -> AppResult<()> {
    let config = pb_app::load_config(config_path)?;
    let ctx = pb_app::synthesize_once(&config)?;

    if json {
        let report = GainReport {
            a: rows(&ctx.a),
            b: rows(&ctx.b),
            p: rows(&ctx.p),
            k: rows(&ctx.k),
            poles: ctx.poles.iter().map(|z| [z.re, z.im]).collect(),
            residual: ctx.residual,
        };
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::Config(format!("Failed to serialize gain: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("A ={}", ctx.a);
    println!("B ={}", ctx.b);
    println!("P ={}", ctx.p);
    println!("K ={}", ctx.k);
    println!("Closed-loop poles:");
    for z in ctx.poles.iter() {
        println!("  {:>12.6} {:+.6}i", z.re, z.im);
    }
    println!("Riccati residual: {:.3e}", ctx.residual);
    println!("Spectral abscissa: {:.6}", ctx.spectral_abscissa());
    Ok(())
}

fn cmd_run(config_path: &Path, output: Option<&Path>) -> AppResult<()> {
    let config = pb_app::load_config(config_path)?;
    println!("Running scenario: {}", config.name);

    let mut last_emit = Instant::now();
    let record = pb_app::run_with_progress(
        &config,
        Some(&mut |p| {
            if last_emit.elapsed().as_millis() >= 100 {
                render_cli_progress(&p);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    let s = &record.summary;
    if s.fell {
        println!("✗ Pole fell");
    } else {
        println!("✓ Pole balanced");
    }
    println!("  Ticks: {} ({:.2}s simulated)", s.ticks, s.final_time_s);
    println!("  Max |tilt|: {:.4} rad", s.max_abs_tilt_rad);
    println!("  Final |tilt|: {:.4} rad", s.final_abs_tilt_rad);
    println!(
        "  Syntheses: {} ok, {} failed",
        s.syntheses_ok, s.syntheses_failed
    );
    for event in record.syntheses.iter().filter(|e| e.outcome.is_failure()) {
        println!("    t={:.3}s {:?}", event.t, event.outcome);
    }
    println!("  Wall time: {:.3}s", s.wall_time_s);

    if let Some(path) = output {
        std::fs::write(path, record.to_csv())?;
        println!("✓ Wrote {} samples to {}", record.t.len(), path.display());
    }
    Ok(())
}

fn cmd_init(config_path: &Path, planar: bool) -> AppResult<()> {
    let (axes, name) = if planar {
        (AxesDef::Planar, "planar")
    } else {
        (AxesDef::Spatial, "spatial")
    };
    let config = BalanceConfig::new(name, axes);
    pb_app::save_config(config_path, &config)?;
    println!("✓ Wrote default {} config to {}", name, config_path.display());
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(p: &RunProgress) {
    let width = 28usize;
    let filled = ((p.fraction_complete * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    print!(
        "\r[{}] {:>6.2}%  t={:.3}/{:.3}s  step={}",
        bar,
        p.fraction_complete * 100.0,
        p.sim_time_s,
        p.t_end_s,
        p.step
    );
    let _ = io::stdout().flush();
}
