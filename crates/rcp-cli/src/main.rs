//! rcp - Checkpoint Recovery CLI
//!
//! Usage:
//!   rcp dequant --src fp8.safetensors --dst f16.safetensors --dtype fp16
//!   rcp split --src model.safetensors --out-dir ./parts --components all
//!   rcp prepare --src model.safetensors --dst flat.safetensors --fix fix.safetensors
//!   rcp restore --src flat.safetensors --dst full.safetensors
//!   rcp remove-scalars --src model.safetensors --dst clean.safetensors
//!   rcp tensors --src model.safetensors --filter diffusion

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;
mod output;

use commands::{dequant, prepare, remove_scalars, restore, split, tensors, Precision};
use recuperar::rank::DEFAULT_MAX_RANK;

/// rcp - checkpoint recovery tool
///
/// Dequantize FP8 checkpoints, split them into components, and reshape
/// them for consumers with a tensor-rank ceiling.
#[derive(Parser)]
#[command(name = "rcp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore FP8 weights to full precision and normalize float dtypes
    Dequant {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Destination checkpoint
        #[arg(long, value_name = "FILE")]
        dst: PathBuf,

        /// Target precision
        #[arg(long, value_enum, default_value = "fp16")]
        dtype: Precision,

        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,

        /// Remove scale metadata keys after use
        #[arg(long)]
        strip_fp8: bool,

        /// Fail instead of defaulting when a scale cannot be resolved
        #[arg(long)]
        strict: bool,
    },

    /// Split a checkpoint into component files
    Split {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Directory for the component files
        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,

        /// Components to extract: all, or a comma-separated list
        /// (clip, clip_l, clip_g, unet, vae)
        #[arg(long, default_value = "all")]
        components: String,

        /// Replace existing component files
        #[arg(long)]
        overwrite: bool,
    },

    /// Merge an optional fix checkpoint and flatten over-rank tensors
    Prepare {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Destination checkpoint
        #[arg(long, value_name = "FILE")]
        dst: PathBuf,

        /// Fix checkpoint merged over the source before flattening
        #[arg(long, value_name = "FILE")]
        fix: Option<PathBuf>,

        /// Highest rank left untouched
        #[arg(long, default_value_t = DEFAULT_MAX_RANK)]
        max_rank: usize,

        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Restore flattened tensors to their recorded shapes
    Restore {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Destination checkpoint
        #[arg(long, value_name = "FILE")]
        dst: PathBuf,

        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Drop rank-0 tensors
    RemoveScalars {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Destination checkpoint
        #[arg(long, value_name = "FILE")]
        dst: PathBuf,

        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,
    },

    /// List tensor names, shapes, and classifications
    Tensors {
        /// Source checkpoint
        #[arg(long, value_name = "FILE")]
        src: PathBuf,

        /// Only show tensors whose name contains this pattern
        #[arg(long)]
        filter: Option<String>,

        /// Limit number of tensors shown
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dequant {
            src,
            dst,
            dtype,
            overwrite,
            strip_fp8,
            strict,
        } => dequant::run(&src, &dst, dtype, overwrite, strip_fp8, strict),

        Commands::Split {
            src,
            out_dir,
            components,
            overwrite,
        } => split::run(&src, &out_dir, &components, overwrite),

        Commands::Prepare {
            src,
            dst,
            fix,
            max_rank,
            overwrite,
        } => prepare::run(&src, &dst, fix.as_deref(), max_rank, overwrite),

        Commands::Restore { src, dst, overwrite } => restore::run(&src, &dst, overwrite),

        Commands::RemoveScalars { src, dst, overwrite } => {
            remove_scalars::run(&src, &dst, overwrite)
        }

        Commands::Tensors {
            src,
            filter,
            limit,
            json,
        } => tensors::run(&src, filter.as_deref(), limit, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
