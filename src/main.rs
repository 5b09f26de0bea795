use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = llrzip::cli::Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    llrzip::run(args)
}
