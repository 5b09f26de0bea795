pub mod cli;
pub mod decoders;
pub mod encoders;
pub mod hash;
pub mod llr;
pub mod media;
pub mod pipeline;
pub mod refs;
pub mod ui;

use anyhow::Result;

pub fn run(args: cli::Args) -> Result<()> {
    pipeline::execute(&args)
}
