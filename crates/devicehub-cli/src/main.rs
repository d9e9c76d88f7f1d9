//! devicehub CLI - screenshots and UI hierarchy dumps from any device
//!
//! Usage:
//!     devicehub [OPTIONS] <COMMAND>
//!
//! Environment Variables:
//!     DEVICE_HUB_PLATFORM: Platform tag: android, ios, or anything else for game targets
//!     DEVICE_HUB_ADDRESS: Device address (adb serial, host:port, WDA URL, game host)
//!     DEVICE_HUB_ADB_PATH: adb binary (default: adb)
//!     RUST_LOG: Log filter (default: info)

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use device_hub::adb::list_devices;
use device_hub::config::adb_path;
use device_hub::{
    connect_device, get_device, Capability, DeviceAdapter, DeviceId, Platform, ScreenshotSaver,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Device Hub - uniform access to Android, iOS and game devices
#[derive(Parser, Debug)]
#[command(name = "devicehub")]
#[command(about = "Device Hub - screenshots and UI hierarchy dumps from any device")]
#[command(after_help = r#"Examples:
    # Dump the UI tree of the only attached Android device
    devicehub --platform android dump

    # Extended dump (foreground app + window size) of a remote Android device
    devicehub --platform android --address 192.168.1.100:5555 dump --extended

    # Screenshot from an iPhone running WebDriverAgent
    devicehub --platform ios --address http://localhost:8100 screenshot --out shots

    # Address a device by its id
    devicehub --id game:10.0.0.7:15004 dump

    # Check that the device is reachable
    devicehub --platform android check
"#)]
struct Cli {
    /// Platform tag (android, ios; anything else selects a game target)
    #[arg(short = 'p', long, env = "DEVICE_HUB_PLATFORM", default_value = "android")]
    platform: String,

    /// Device address
    #[arg(short = 'a', long, env = "DEVICE_HUB_ADDRESS", default_value = "")]
    address: String,

    /// Device id (<platform>:<address>); overrides --platform and --address
    #[arg(long, value_name = "ID")]
    id: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print the device id and capabilities
    Connect,

    /// Capture a screenshot
    Screenshot {
        /// Directory to save into (creates a timestamped session subdirectory)
        #[arg(short = 'o', long, env = "DEVICE_HUB_SCREENSHOT_DIR", default_value = "screenshots")]
        out: PathBuf,
    },

    /// Print the UI hierarchy as JSON
    Dump {
        /// Include raw markup, foreground app and window size
        #[arg(short = 'e', long)]
        extended: bool,
    },

    /// Check tooling and device reachability
    Check,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Resolve the target device, connecting it if needed
async fn open_device(args: &Cli) -> Result<(DeviceId, Arc<DeviceAdapter>)> {
    let id = match &args.id {
        Some(id) => DeviceId::from(id.as_str()),
        None => connect_device(&args.platform, &args.address).await?,
    };
    debug!("using device {}", id);
    let device = get_device(id.as_str()).await?;
    Ok((id, device))
}

/// Check the adb binary and list what the adb server sees
async fn check_adb() -> bool {
    print!("1. Checking adb installation... ");
    io::stdout().flush().ok();

    let adb = adb_path();
    if which::which(&adb).is_err() {
        println!("\u{274C} FAILED");
        println!("   Error: {} is not installed or not in PATH.", adb);
        println!("   Solution:");
        println!("     - macOS: brew install android-platform-tools");
        println!("     - Linux: sudo apt install android-tools-adb");
        println!("     - Or set DEVICE_HUB_ADB_PATH to the adb binary");
        return false;
    }
    println!("\u{2705} OK");

    print!("2. Checking attached devices... ");
    io::stdout().flush().ok();

    match list_devices().await {
        Ok(devices) if devices.is_empty() => {
            println!("\u{274C} FAILED");
            println!("   Error: No devices attached.");
            println!("   Solution: enable USB debugging, or connect with --address <ip>:<port>");
            false
        }
        Ok(devices) => {
            println!("\u{2705} OK ({} device(s))", devices.len());
            for device in devices {
                let status_icon = if device.status == "device" {
                    "\u{2713}"
                } else {
                    "\u{2717}"
                };
                let model_info = device
                    .model
                    .map(|m| format!(" ({})", m))
                    .unwrap_or_default();
                println!(
                    "     {} {:<30} [{:?}]{}",
                    status_icon, device.serial, device.connection_type, model_info
                );
            }
            true
        }
        Err(e) => {
            println!("\u{274C} FAILED");
            println!("   Error: {}", e);
            false
        }
    }
}

async fn run_check(args: &Cli) -> Result<bool> {
    println!("\u{1F50D} Checking device requirements...");
    println!("{}", "-".repeat(50));

    let platform = match &args.id {
        Some(id) => DeviceId::from(id.as_str()).platform()?,
        None => Platform::from_tag(&args.platform),
    };

    let mut all_passed = true;
    if platform == Platform::Android {
        all_passed = check_adb().await;
    }

    if all_passed {
        print!("{}. Connecting to device... ", if platform == Platform::Android { 3 } else { 1 });
        io::stdout().flush().ok();

        match open_device(args).await {
            Ok((id, device)) => {
                println!("\u{2705} OK ({})", id);
                println!(
                    "   Extended hierarchy: {}",
                    if device.supports(Capability::ExtendedHierarchy) {
                        "supported"
                    } else {
                        "not supported"
                    }
                );
            }
            Err(e) => {
                println!("\u{274C} FAILED");
                println!("   Error: {}", e);
                all_passed = false;
            }
        }
    }

    println!("{}", "-".repeat(50));
    if all_passed {
        println!("\u{2705} All checks passed!");
    } else {
        println!("\u{274C} Check failed. Please fix the issues above.");
    }
    Ok(all_passed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Connect => {
            let (id, device) = open_device(&args).await?;
            println!("{}", id);
            println!("{}", serde_json::to_string_pretty(&device.capabilities())?);
        }
        Command::Screenshot { out } => {
            let (_, device) = open_device(&args).await?;
            let image = device.screenshot().await?;
            let (width, height) = (image.width(), image.height());

            let mut saver = ScreenshotSaver::new(out).await?;
            let path = saver.save(image).await?;
            println!("{} ({}x{})", path.display(), width, height);
        }
        Command::Dump { extended } => {
            let (_, device) = open_device(&args).await?;
            let output = if *extended {
                if !device.supports(Capability::ExtendedHierarchy) {
                    bail!(
                        "{} devices do not support extended hierarchy dumps",
                        device.platform()
                    );
                }
                serde_json::to_value(device.dump_hierarchy_extended().await?)?
            } else {
                device.dump_hierarchy().await?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Check => {
            if !run_check(&args).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
