use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use inline_image::config::{ConfigError, SizingConfig};
use inline_image::data::{BlockData, Tune};
use inline_image::geometry::Dimensions;
use inline_image::host::RecordingHost;
use inline_image::input::{Edge, Point};
use inline_image::surface::{MemorySurface, Surface};
use inline_image::widget::{Action, WidgetCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read script {path}: {source}")]
    ReadScript { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Parser, Debug)]
#[command(name = "inline-image", about = "Replay inline image sizing interactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an interaction script and print every emitted action.
    Replay(ReplayArgs),
    /// Print the effective sizing config.
    Config {
        /// Read overrides from `INLINE_IMAGE_*` environment variables.
        #[arg(long)]
        env: bool,
    },
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Path to a JSON script.
    script: PathBuf,

    /// Start from `INLINE_IMAGE_*` environment config instead of the script's.
    #[arg(long)]
    env_config: bool,

    #[arg(long)]
    read_only: bool,

    /// Override the editor content width from the script.
    #[arg(long, env = "INLINE_IMAGE_CONTAINER_WIDTH")]
    container_width: Option<f64>,
}

/// An interaction script: the page the block lives on plus the input events.
#[derive(Debug, Deserialize)]
struct Script {
    natural: Dimensions,
    #[serde(default)]
    container_width: Option<f64>,
    #[serde(default)]
    max_rendered_width: Option<u32>,
    #[serde(default)]
    config: SizingConfig,
    #[serde(default)]
    data: BlockData,
    events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event {
    Load,
    LoadError,
    PointerDown {
        edge: Edge,
        x: f64,
        #[serde(default)]
        y: f64,
    },
    PointerMove {
        x: f64,
        #[serde(default)]
        y: f64,
    },
    PointerUp,
    ToggleTune {
        tune: Tune,
    },
    ApplyTune {
        tune: Tune,
        enabled: bool,
    },
    DialogWidth {
        value: String,
    },
    DialogHeight {
        value: String,
    },
    DialogApply,
    DialogCancel,
    /// Run deferred host calls, as the host's next turn would.
    Flush,
    /// The editor was resized.
    ContainerWidth {
        width: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
struct Step {
    step: usize,
    action: Action,
}

#[derive(Debug, Serialize)]
struct Outcome {
    data: BlockData,
    rendered: Dimensions,
    host: RecordingHost,
    pending_host_calls: usize,
}

struct Replay {
    steps: Vec<Step>,
    outcome: Outcome,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => run_replay(args),
        Command::Config { env } => {
            let config = if env { SizingConfig::from_env()? } else { SizingConfig::default() };
            print_json(&serde_json::to_value(config)?)
        }
    }
}

fn run_replay(args: ReplayArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.script)
        .map_err(|source| CliError::ReadScript { path: args.script.clone(), source })?;
    let mut script: Script = serde_json::from_str(&raw)?;

    let mut config = if args.env_config { SizingConfig::from_env()? } else { script.config };
    if args.read_only {
        config.read_only = true;
    }
    config.validate()?;
    if args.container_width.is_some() {
        script.container_width = args.container_width;
    }

    tracing::info!(events = script.events.len(), "replaying script");
    let replay = replay(script, config);
    for step in &replay.steps {
        println!("{}", serde_json::to_string(step)?);
    }
    print_json(&serde_json::to_value(&replay.outcome)?)
}

fn replay(script: Script, config: SizingConfig) -> Replay {
    let mut surface = MemorySurface::new(script.natural, script.container_width).with_config(&config);
    if let Some(max) = script.max_rendered_width {
        surface = surface.with_max_rendered_width(max);
    }
    let mut widget = WidgetCore::new(surface, RecordingHost::new(1, 0), config);
    widget.render(script.data);

    let mut steps = Vec::new();
    for (step, event) in script.events.into_iter().enumerate() {
        tracing::debug!(step, ?event, "event");
        let actions = dispatch(&mut widget, event);
        steps.extend(actions.into_iter().map(|action| Step { step, action }));
    }

    let outcome = Outcome {
        data: widget.data().clone(),
        rendered: widget.surface().rendered_size(),
        host: widget.host().clone(),
        pending_host_calls: widget.deferred().len(),
    };
    Replay { steps, outcome }
}

fn dispatch(widget: &mut WidgetCore<MemorySurface, RecordingHost>, event: Event) -> Vec<Action> {
    match event {
        Event::Load => widget.on_image_load(),
        Event::LoadError => {
            widget.on_image_load_error();
            Vec::new()
        }
        Event::PointerDown { edge, x, y } => widget.pointer_down(edge, Point::new(x, y)),
        Event::PointerMove { x, y } => widget.pointer_move(Point::new(x, y)),
        Event::PointerUp => widget.pointer_up(),
        Event::ToggleTune { tune } => widget.toggle_tune(tune),
        Event::ApplyTune { tune, enabled } => widget.apply_tune(tune, enabled),
        Event::DialogWidth { value } => {
            widget.dialog_width_input(&value);
            Vec::new()
        }
        Event::DialogHeight { value } => {
            widget.dialog_height_input(&value);
            Vec::new()
        }
        Event::DialogApply => widget.dialog_apply(),
        Event::DialogCancel => widget.dialog_cancel(),
        Event::Flush => {
            let ran = widget.flush_deferred();
            tracing::debug!(ran, "flushed deferred host calls");
            Vec::new()
        }
        Event::ContainerWidth { width } => {
            widget.surface_mut().set_container_width(width);
            Vec::new()
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
