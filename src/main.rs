use anyhow::{Context, Result};
use std::process::exit;

fn main() {
    match try_main() {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(2);
        }
    }
}

fn try_main() -> Result<i32> {
    maid_runner::run().context("validation run aborted")
}
