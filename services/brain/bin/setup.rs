//! One-time setup: turns a seed file of users with plain PINs into the users
//! file the brain loads, hashing every PIN on the way.

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tutor_core::user::{User, UserSeed};

#[derive(Parser, Debug)]
#[command(about = "Hash user PINs from a seed file into the tutor's users file")]
struct Args {
    /// JSON array of `{username, pin, profile}` entries.
    #[arg(long, default_value = "./data/users.seed.json")]
    seed: PathBuf,

    /// Where to write the hashed users.
    #[arg(long, default_value = "./data/users.json")]
    out: PathBuf,

    /// Replace `out` if it already exists.
    #[arg(long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    let args = Args::parse();

    if args.out.exists() && !args.force {
        bail!("{} already exists; pass --force to replace it", args.out.display());
    }

    let raw = std::fs::read_to_string(&args.seed)
        .with_context(|| format!("Failed to read seed file {}", args.seed.display()))?;
    let seeds: Vec<UserSeed> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file {}", args.seed.display()))?;
    if seeds.is_empty() {
        warn!(seed = %args.seed.display(), "Seed file is empty. No users will be written.");
    }

    let users: Vec<User> = seeds
        .into_iter()
        .zip(1..)
        .map(|(seed, id)| {
            info!(id, username = %seed.username, "Adding user");
            seed.into_user(id)
        })
        .collect();

    let json = serde_json::to_string_pretty(&users)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    info!(users = users.len(), out = %args.out.display(), "User setup complete.");
    Ok(())
}
