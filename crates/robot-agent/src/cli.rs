use clap::{Parser, Subcommand};
use domain::driver::TransportKind;
use domain::protocol::{LedState, MotorDirection};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a VietRobot controller over Bluetooth", long_about = None)]
pub struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    pub config_dir: String,

    /// Device id to connect to (defaults to the first robot found)
    #[arg(long)]
    pub device: Option<String>,

    /// Override transport type (serial, simulator)
    #[arg(long)]
    pub transport: Option<TransportKind>,

    /// How long to scan for devices
    #[arg(long, default_value_t = 3)]
    pub scan_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List robots in range
    Scan,
    /// Set the RGB LED, e.g. `led-rgb "#FF0080"`
    LedRgb {
        #[arg(value_parser = parse_hex_color)]
        color: (u8, u8, u8),
    },
    /// Switch the traffic light lamps (ON/OFF)
    Traffic {
        port: u8,
        red: LedState,
        yellow: LedState,
        green: LedState,
    },
    /// Drive a DC motor
    Motor {
        port: u8,
        /// cw or ccw
        #[arg(long)]
        direction: Option<MotorDirection>,
        /// 0-100
        #[arg(long)]
        power: Option<u8>,
    },
    /// Set the three servo angles of a port (clamped to 180)
    Servo { port: u8, a1: u8, a2: u8, a3: u8 },
    /// Read the ultrasonic distance
    Ultrasonic { port: u8 },
    /// Read the button state
    Button { port: u8 },
    /// Poll the configured sensors until Ctrl-C
    Watch,
    /// Zero the power of every stop port
    Stop,
}

/// Parse `#RRGGBB` (the `#` is optional)
pub fn parse_hex_color(s: &str) -> Result<(u8, u8, u8), String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected #RRGGBB, got {s:?}"));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|e| format!("invalid color {s:?}: {e}"))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
