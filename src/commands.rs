use std::{path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "geogate")]
#[command(about = "Location and heading gated capture with embedding matching", long_about = None)]
pub struct Cli {
    /// Defaults to `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Answer JSON-lines match requests on stdin
    Serve,
    /// Run one capture verification at a fixed position
    Verify {
        #[arg(allow_negative_numbers = true, value_parser = parse_finite::<f64>)]
        latitude: f64,
        #[arg(allow_negative_numbers = true, value_parser = parse_finite::<f64>)]
        longitude: f64,
        /// Compass heading in degrees; omitted means no orientation reading
        #[arg(allow_negative_numbers = true, value_parser = parse_finite::<f32>)]
        heading: Option<f32>,
    },
    /// Print the match request for an image
    Extract {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
    /// Rebuild per-label prototypes from stored features
    Prototypes {
        /// Also switch `serve` to rank against the prototypes
        #[arg(long)]
        activate: bool,
    },
}

/// Float parser for clap that refuses NaN and infinities, which `f64`'s own
/// `FromStr` accepts.
fn parse_finite<T>(value: &str) -> Result<T, String>
where
    T: FromStr + Into<f64> + Copy,
    T::Err: std::fmt::Display,
{
    let number: T = value.parse().map_err(|err| format!("{err}"))?;
    if number.into().is_finite() {
        Ok(number)
    } else {
        Err(format!("'{value}' is not a finite number"))
    }
}

pub(crate) fn require_finite(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("{field} must be finite, got {value}"))
    }
}
