//! Headless replay checker (default binary).
//!
//! Reads an exported legacy replay (`{"c": meta, "d": base64}`), plays it
//! back and prints a JSON summary.
//!
//! ```text
//! blockstack <replay.json> [--ruleset <ruleset.json>] [--replay2 <out.bin>]
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;

use blockstack::core::Ruleset;
use blockstack::engine::PlaybackSession;
use blockstack::replay::replay2::Replay2Config;
use blockstack::replay::{content_hash, ReplayInfo};

struct Args {
    replay: PathBuf,
    ruleset: Option<PathBuf>,
    replay2: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut replay = None;
    let mut ruleset = None;
    let mut replay2 = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ruleset" => ruleset = Some(args.next().context("--ruleset needs a path")?.into()),
            "--replay2" => replay2 = Some(args.next().context("--replay2 needs a path")?.into()),
            _ if replay.is_none() => replay = Some(arg.into()),
            _ => bail!("unexpected argument {arg}"),
        }
    }
    Ok(Args {
        replay: replay.context("usage: blockstack <replay.json> [--ruleset <file>] [--replay2 <out>]")?,
        ruleset,
        replay2,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;

    let json = fs::read_to_string(&args.replay)
        .with_context(|| format!("failed to read {}", args.replay.display()))?;
    let info = ReplayInfo::from_json(&json)?;
    let replay = info.decode()?;
    info!("loaded {} actions from {}", replay.actions.len(), args.replay.display());

    let ruleset = match &args.ruleset {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ruleset::from_json(&json)?
        }
        None => Ruleset::default(),
    };
    let ruleset = Arc::new(ruleset);

    if let Some(out) = &args.replay2 {
        let session = PlaybackSession::new(ruleset.clone(), &replay);
        let (config, bytes) = session.render_replay2(Replay2Config::default())?;
        fs::write(out, &bytes).with_context(|| format!("failed to write {}", out.display()))?;
        info!("wrote {} bytes of frames (config {})", bytes.len(), serde_json::to_string(&config)?);
    }

    let summary = PlaybackSession::new(ruleset, &replay).run();
    let mut report = serde_json::to_value(&summary)?;
    report["hash"] = content_hash(info.d.trim().as_bytes()).into();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
