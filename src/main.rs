use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{bounded, unbounded};

use gesture_proximity::{
    config::{Config, Profile},
    gesture::{StatePolicy, classify},
    pipeline::{GestureStateHolder, GestureUpdate, JsonlReplay, start_classifier, start_replay},
    types::LandmarkPoint,
};

/// Classify "hand near head" and "mouth open" gestures from recorded landmarks
#[derive(Parser, Debug)]
#[command(name = "gesture-proximity", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a JSON Lines recording through the classifier pipeline
    Replay {
        /// Recording with one observation frame per line
        input: PathBuf,

        /// Threshold profile, ignored when --config is given
        #[arg(short, long, value_enum)]
        profile: Option<ProfileArg>,

        /// What to do with the state when a frame lacks evidence
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Classify a single pair of points given as x,y,confidence
    Classify {
        #[arg(long, value_parser = parse_point)]
        a: LandmarkPoint,

        #[arg(long, value_parser = parse_point)]
        b: LandmarkPoint,

        #[arg(long)]
        distance_threshold: Option<f32>,

        #[arg(long)]
        confidence_threshold: Option<f32>,

        #[arg(short, long, value_enum, default_value = "body-pose")]
        profile: ProfileArg,
    },

    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long, value_enum)]
        profile: Option<ProfileArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    BodyPose,
    FaceHand,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::BodyPose => Profile::BodyPose,
            ProfileArg::FaceHand => Profile::FaceHand,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Sticky,
    Strict,
}

impl From<PolicyArg> for StatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Sticky => StatePolicy::Sticky,
            PolicyArg::Strict => StatePolicy::Strict,
        }
    }
}

fn parse_point(value: &str) -> Result<LandmarkPoint, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in {value:?}: {e}"))?;

    match parts.as_slice() {
        [x, y] => Ok(LandmarkPoint::new(*x, *y, 1.0)),
        [x, y, c] => Ok(LandmarkPoint::new(*x, *y, *c)),
        _ => Err(format!("expected x,y or x,y,confidence, got {value:?}")),
    }
}

fn load_config(path: Option<&PathBuf>, profile: Option<ProfileArg>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(profile
            .map(|p| Config::for_profile(p.into()))
            .unwrap_or_default()),
    }
}

fn run_replay(mut config: Config, input: PathBuf, policy: Option<PolicyArg>) -> Result<()> {
    if let Some(policy) = policy {
        config.proximity.policy = policy.into();
    }

    let source = JsonlReplay::open(&input)
        .with_context(|| format!("failed to open recording {}", input.display()))?;

    let (frame_tx, frame_rx) = bounded(config.pipeline.channel_capacity);
    let (update_tx, update_rx) = unbounded();
    let holder = GestureStateHolder::with_listener(update_tx);

    let worker = start_classifier(&config, frame_rx, holder.clone());
    let feeder = start_replay(source, frame_tx);

    let sent = feeder
        .join()
        .map_err(|_| anyhow!("replay thread panicked"))?
        .context("replay failed")?;
    let stats = worker
        .join()
        .map_err(|_| anyhow!("classifier worker panicked"))?;

    for update in update_rx.try_iter() {
        match update {
            GestureUpdate::Proximity {
                sequence,
                state,
                distance,
            } => match distance {
                Some(d) => println!("#{sequence:<6} {} (distance {d:.4})", state.status_text()),
                None => println!("#{sequence:<6} {}", state.status_text()),
            },
            GestureUpdate::Mouth {
                sequence,
                open,
                ratio,
            } => {
                let label = if open { "Mouth Open" } else { "Mouth Closed" };
                match ratio {
                    Some(r) => println!("#{sequence:<6} {label} (ratio {r:.3})"),
                    None => println!("#{sequence:<6} {label}"),
                }
            }
        }
    }

    let last = holder.current();
    println!(
        "{sent} frames replayed: {} processed, {} declined, {} skipped, {} out of order, {} transitions",
        stats.processed, stats.declined, stats.skipped, stats.out_of_order, stats.transitions
    );
    println!(
        "final state: {} ({})",
        last.state.status_text(),
        last.state.status_color()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Replay {
            input,
            profile,
            policy,
        } => {
            let config = load_config(cli.config.as_ref(), profile)?;
            run_replay(config, input, policy)
        }
        Commands::Classify {
            a,
            b,
            distance_threshold,
            confidence_threshold,
            profile,
        } => {
            let config = load_config(cli.config.as_ref(), Some(profile))?;
            let distance_threshold =
                distance_threshold.unwrap_or(config.proximity.distance_threshold);
            let confidence_threshold =
                confidence_threshold.unwrap_or(config.proximity.confidence_threshold);

            match classify(&a, &b, confidence_threshold, distance_threshold) {
                Some(result) => println!(
                    "{} (distance {:.4}, threshold {distance_threshold})",
                    if result.is_close { "close" } else { "not close" },
                    result.distance
                ),
                None => println!("declined: confidence below {confidence_threshold}"),
            }
            Ok(())
        }
        Commands::Config { profile } => {
            let config = load_config(cli.config.as_ref(), profile)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
