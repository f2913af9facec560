use anyhow::Context;
use argh::FromArgs;
use hbnb_console::{Interpreter, ObjectStore, Registry};
use log::info;
use std::path::PathBuf;

#[derive(FromArgs)]
/// Interactive console for the HBnB data file.
struct Options {
    /// data file to load at startup and save to after every change
    #[argh(option, default = "PathBuf::from(hbnb_console::store::DEFAULT_FILE)")]
    file: PathBuf,

    /// do not print the welcome banner
    #[argh(switch, short = 'q')]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let options: Options = argh::from_env();

    let registry = Registry::default();
    let mut store = ObjectStore::new(&options.file);
    let loaded = store
        .reload(&registry)
        .with_context(|| format!("cannot load {}", options.file.display()))?;
    info!("loaded {} entities from {}", loaded, options.file.display());

    if !options.quiet {
        println!("Welcome to the HBnB console. Type help to list commands.");
    }

    Interpreter::new(store, registry)
        .repl()
        .context("console terminated")?;
    Ok(())
}
