// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use gpio_cdev_pins::{register_all, ChipOptions, Edge, Level, Pin, PinIn, PinOut, PinRegistry, Pull};
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, StructOpt)]
struct Cli {
    /// Enable debug logging
    #[structopt(short, long)]
    verbose: bool,
    /// Log as JSON lines
    #[structopt(long)]
    json: bool,
    /// Directory holding the gpiochip devices
    #[structopt(long, default_value = "/dev", parse(from_os_str))]
    dev_dir: PathBuf,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Register every chip and list its named pins
    Dump,
    /// Configure a pin as input and print its level
    Get { pin: String },
    /// Drive a pin to a level (1/0, true/false, t/f)
    Set { pin: String, value: String },
    /// Wait for an edge on a pin
    Wait {
        pin: String,
        /// rising, falling or both
        #[structopt(long, default_value = "both")]
        edge: String,
        /// Give up after this many milliseconds, wait forever if omitted
        #[structopt(long)]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing(args: &Cli) {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let ansi = std::env::var_os("NO_COLOR").is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if args.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn parse_level(value: &str) -> anyhow::Result<Level> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Level::High),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Level::Low),
        other => bail!("invalid level {:?}", other),
    }
}

fn parse_edge(edge: &str) -> anyhow::Result<Edge> {
    match edge {
        "rising" => Ok(Edge::Rising),
        "falling" => Ok(Edge::Falling),
        "both" => Ok(Edge::Both),
        other => bail!("invalid edge {:?}", other),
    }
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let options = ChipOptions {
        dev_dir: args.dev_dir,
        ..ChipOptions::default()
    };

    let registry = PinRegistry::new();
    let _chips = register_all(&registry, &options).context("failed to register gpiochips")?;

    let by_name = |name: &str| {
        registry
            .by_name(name)
            .ok_or_else(|| anyhow!("invalid pin {:?}", name))
    };

    match args.cmd {
        Command::Dump => {
            for header in registry.header_names() {
                println!("{}:", header);
                for pin in registry.header(&header).into_iter().flatten().flatten() {
                    println!("  {:>3} {:<16} {} pull={}", pin.number(), pin.name(), pin.func(), pin.pull());
                }
            }
        }
        Command::Get { pin } => {
            let pin = by_name(&pin)?;
            pin.configure_input(Pull::NoChange, Edge::NoEdge)
                .context("failed to set pin as input")?;
            match pin.read() {
                Level::High => println!("1"),
                Level::Low => println!("0"),
            }
        }
        Command::Set { pin, value } => {
            let level = parse_level(&value)?;
            by_name(&pin)?
                .configure_output(level)
                .context("failed to set pin as output")?;
        }
        Command::Wait {
            pin,
            edge,
            timeout_ms,
        } => {
            let pin = by_name(&pin)?;
            pin.configure_input(Pull::NoChange, parse_edge(&edge)?)
                .context("failed to set pin as input")?;
            if !pin.wait_for_edge(timeout_ms.map(Duration::from_millis)) {
                bail!("timed out waiting for an edge on {}", pin);
            }
            println!("{}", pin.read());
        }
    }

    Ok(())
}

fn main() {
    let args = Cli::from_args();
    init_tracing(&args);

    if let Err(err) = do_main(args) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}
