//! `mdlx` — operator CLI for MBPU ECDSA accelerators.
//!
//! ```text
//! USAGE:
//!   mdlx enumerate                 List units present under /dev
//!   mdlx info <index>              Version and channel status of one unit
//!   mdlx reset <index>             Clear the C2H FIFO of one unit
//!   mdlx metrics <index>           Fetch a snapshot from a running manager
//! ```

use std::io::Read;
use std::os::unix::net::UnixStream;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdlx_driver::{DeviceIo, MdlxDevice};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mdlx", about = "MBPU ECDSA accelerator CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List MBPU units present under /dev.
    Enumerate,
    /// Print version and channel status for one unit (opens it exclusively).
    Info {
        /// Unit index (N in /dev/mdlxN_*).
        index: usize,
    },
    /// Pulse the ECC core reset of one unit, clearing its C2H FIFO.
    Reset {
        /// Unit index.
        index: usize,
    },
    /// Fetch one metric snapshot from a running manager's socket.
    Metrics {
        /// Unit index.
        index: usize,
        /// Directory holding the mbpu<N>.sock files.
        #[arg(long, default_value = "/var/run/")]
        socket_dir: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Enumerate => cmd_enumerate(),
        Cmd::Info { index } => cmd_info(index),
        Cmd::Reset { index } => cmd_reset(index),
        Cmd::Metrics { index, socket_dir } => cmd_metrics(index, &socket_dir),
    }
}

fn cmd_enumerate() -> Result<()> {
    let mut found = 0;
    for index in 0..16 {
        if !mdlx_chip::nodes::user(index).exists() {
            continue;
        }
        found += 1;
        println!("[{index}] {}", mdlx_chip::nodes::prefix(index));
    }

    if found == 0 {
        println!("No MBPU units found");
    } else {
        println!();
        println!("{found} unit(s); `mdlx info <index>` for details");
    }
    Ok(())
}

fn cmd_info(index: usize) -> Result<()> {
    let dev = MdlxDevice::open(index)
        .with_context(|| format!("opening unit {index} (is a manager holding it?)"))?;

    println!("Unit      : {}", mdlx_chip::nodes::prefix(index));
    println!("Version   : {}", dev.version()?);

    match dev.check_available() {
        Ok(()) => println!("Channels  : H2C/C2H ready"),
        Err(e) => println!("Channels  : {e}"),
    }
    Ok(())
}

fn cmd_reset(index: usize) -> Result<()> {
    let dev = MdlxDevice::open(index)
        .with_context(|| format!("opening unit {index} (is a manager holding it?)"))?;
    // open already pulses the reset once; a second pulse is harmless and
    // covers the case where the first left the FIFO mid-drain
    dev.reset()?;
    println!("Unit {index} reset");
    Ok(())
}

fn cmd_metrics(index: usize, socket_dir: &str) -> Result<()> {
    let socket = std::path::Path::new(socket_dir).join(format!("mbpu{index}.sock"));
    let mut stream = UnixStream::connect(&socket)
        .with_context(|| format!("connecting to {} (is a manager running?)", socket.display()))?;

    let mut line = String::new();
    stream.read_to_string(&mut line)?;
    println!("{line}");
    Ok(())
}
