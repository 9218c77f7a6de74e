#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod cli;
mod core;
mod error;
mod input;
mod prelude;
mod quantity;
mod render;
mod tariff;

use clap::{Parser, crate_version};
use tracing::metadata::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cli::{Args, Command},
    prelude::*,
};

fn main() -> Result {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time().compact().with_filter(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env()?,
        ))
        .init();

    info!(version = crate_version!(), "starting…");
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    match args.command {
        Command::Simulate(args) => args.run(),
        Command::Sweep(args) => args.run(),
        Command::Search(args) => args.run(),
        Command::Scenarios(args) => args.run(),
    }
}
