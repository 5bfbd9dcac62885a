use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use weighbridge_link::config::{PipelineSettings, WeighbridgeSettings};
use weighbridge_link::serial::discovery::PortAvailability;
use weighbridge_link::serial::simulated::SIMULATED_PORT;
use weighbridge_link::weight::format_weight;
use weighbridge_link::{ReadingKind, WeighbridgeLink};

#[derive(Parser)]
#[command(name = "weighbridge-monitor", about = "Weighbridge serial monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports and whether they are free
    Ports,
    /// Connect and print raw and stable weights until Ctrl-C
    Watch(WatchArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Serial port, e.g. COM3 or /dev/ttyUSB0
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long)]
    data_bits: Option<u8>,
    /// None, Odd, Even, Mark or Space
    #[arg(long)]
    parity: Option<String>,
    #[arg(long)]
    stop_bits: Option<f64>,
    /// Settings JSON holding a "weighbridge" section
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Print raw samples as well as stable readings
    #[arg(long)]
    raw: bool,
    /// Use the simulated indicator instead of a real port
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ports => list_ports(),
        Command::Watch(args) => watch(args).await,
    }
}

fn list_ports() -> Result<()> {
    let link = WeighbridgeLink::system(PipelineSettings::default());
    let ports = link
        .discovery()
        .scan()
        .context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for (info, availability) in ports {
        let state = match availability {
            PortAvailability::Free => "free",
            PortAvailability::InUse => "in use",
            PortAvailability::Unknown => "unknown",
        };
        let product = info.product.unwrap_or_default();
        println!("{:<20} {:<8} {}", info.port_name, state, product);
    }
    Ok(())
}

async fn watch(args: WatchArgs) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => WeighbridgeSettings::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => WeighbridgeSettings::default(),
    };
    if let Some(port) = args.port {
        settings.com_port = port;
    }
    if let Some(baud) = args.baud {
        settings.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        settings.data_bits = bits;
    }
    if let Some(parity) = args.parity {
        settings.parity = parity;
    }
    if let Some(stop_bits) = args.stop_bits {
        settings.stop_bits = stop_bits;
    }

    let link = if args.simulate {
        settings.com_port = SIMULATED_PORT.to_string();
        WeighbridgeLink::simulated(25_000, PipelineSettings::default())
    } else {
        WeighbridgeLink::system(PipelineSettings::default())
    };

    let broadcaster = link.broadcaster();
    broadcaster.on_stable(|value| println!("STABLE {}", format_weight(value)));
    if args.raw {
        broadcaster.register(ReadingKind::Raw, |value| {
            println!("raw    {}", format_weight(value));
            Ok(())
        });
    }

    if let Err(e) = link.connect(settings.to_port_config()).await {
        bail!("{}\n{}", e, e.guidance());
    }
    println!("{}", link.state());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    link.disconnect().await;
    println!("{}", link.state());
    Ok(())
}
