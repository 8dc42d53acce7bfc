use clap::Parser;
use std::path::PathBuf;

use shopshuffle_core::{
    run, Goal, KeyShuffle, Progressive, RandomiserSettings, ShopOptions, WorldMode,
};

#[derive(Debug, Parser)]
#[command(name = "shopshuffle", version, about = "Shop slot shuffle and shop table export")]
struct Args {
    /// World description JSON (regions, locations, item pool, spheres).
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    seed: u64,

    /// Shop shuffle flags: any of g, f, i, p, u, w.
    #[arg(long, default_value = "")]
    shop_shuffle: String,

    /// Number of shop slots that receive an item from the world.
    #[arg(long, default_value_t = 0)]
    shop_shuffle_slots: u32,

    #[arg(long, default_value_t = false)]
    retro: bool,

    #[arg(long, default_value = "original")]
    key_shuffle: KeyShuffle,

    #[arg(long, default_value = "ganon")]
    goal: Goal,

    #[arg(long, default_value = "open")]
    mode: WorldMode,

    #[arg(long, default_value = "on")]
    progressive: Progressive,

    /// Also write a text spoiler log.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = RandomiserSettings {
        seed: args.seed,
        options: ShopOptions {
            shop_shuffle: args.shop_shuffle,
            shop_shuffle_slots: args.shop_shuffle_slots,
            retro: args.retro,
            key_shuffle: args.key_shuffle,
            goal: args.goal,
            mode: args.mode,
            progressive: args.progressive,
        },
        debug: args.debug,
        input_path: args.input,
        output_path: args.output,
    };

    log::debug!("settings: {:?}", settings);

    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
