mod poll;
mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "soniclens", about = "Live camera view with a caption overlay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the camera and keep the caption overlay fresh until Ctrl-C
    ///
    /// Camera capture needs a build with `--features webcam`. Without it the
    /// camera is always reported as unavailable and only captions are shown;
    /// that is not a device fault.
    Run {
        /// Caption endpoint URL (overrides config)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Capture device index (overrides config)
        #[arg(short, long)]
        device: Option<u32>,

        /// Do not request a capture stream
        #[arg(long)]
        no_camera: bool,
    },
    /// Poll the caption endpoint once and print what the overlay would show
    PollOnce {
        /// Caption endpoint URL (overrides config)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration and probe the caption server
    Health,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            endpoint,
            interval_ms,
            device,
            no_camera,
        } => {
            let mut config = soniclens_config::load_config()?;
            if let Some(endpoint) = endpoint {
                config.caption.endpoint = endpoint;
            }
            if let Some(interval_ms) = interval_ms {
                config.caption.interval_ms = interval_ms;
            }
            if let Some(device) = device {
                config.camera.device_index = device;
            }
            if no_camera {
                config.camera.enabled = false;
            }
            config.validate()?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run::run_overlay(config))?;
        }
        Commands::PollOnce { endpoint, json } => {
            let mut config = soniclens_config::load_config()?;
            if let Some(endpoint) = endpoint {
                config.caption.endpoint = endpoint;
            }
            config.validate()?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(poll::run_poll_once(config, json))?;
        }
        Commands::Health => {
            let config = soniclens_config::load_config()?;
            println!("soniclens configuration");
            println!("  caption endpoint: {}", config.caption.endpoint);
            println!("  poll interval: {} ms", config.caption.interval_ms);
            println!("  request timeout: {} ms", config.caption.request_timeout_ms);
            println!(
                "  camera: {}",
                if config.camera.enabled {
                    format!("device #{}", config.camera.device_index)
                } else {
                    "disabled".to_string()
                }
            );
            println!("  webcam support: {}", run::WEBCAM_SUPPORT);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(poll::run_health(config))?;
        }
    }

    Ok(())
}
