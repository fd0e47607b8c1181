use crate::config::load_config;
use crate::placement::Placement;
use crate::placement::opacity::AnimationMode;
use crate::placement_dump::{FrameDump, PlacementDump, write_placement_dump};
use crate::scenario::{Scenario, parse_scenario};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "tilemark", version, about = "Symbol placement inspector for tiled map scenes")]
pub struct Args {
    /// Scenario file (.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output dump file (json). Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file (placement tuning knobs)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Number of place/commit/update cycles to simulate
    #[arg(long = "frames", default_value_t = 5)]
    pub frames: usize,

    /// Milliseconds between simulated frames
    #[arg(long = "frame-interval", default_value_t = 100)]
    pub frame_interval: u64,

    /// Override the scenario's animation mode
    #[arg(long = "mode", value_enum)]
    pub mode: Option<ModeArg>,

    /// Compute full collision debug geometry
    #[arg(long = "show-collision-boxes", default_value_t = false)]
    pub show_collision_boxes: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ModeArg {
    Continuous,
    Instant,
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    config.show_collision_boxes |= args.show_collision_boxes;

    let input = read_input(args.input.as_deref())?;
    let mut scenario = parse_scenario(&input)?;
    if let Some(mode) = args.mode {
        scenario.mode = match mode {
            ModeArg::Continuous => AnimationMode::Continuous,
            ModeArg::Instant => AnimationMode::Instant,
        };
    }

    let dump = simulate(&mut scenario, &config, args.frames, args.frame_interval);

    match args.output.as_deref() {
        Some(path) => write_placement_dump(path, &dump)?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, &dump)?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn simulate(
    scenario: &mut Scenario,
    config: &crate::config::PlacementConfig,
    frames: usize,
    frame_interval: u64,
) -> PlacementDump {
    let proj_matrix = scenario.view.projection_matrix();
    let mut previous = Placement::new(scenario.view, scenario.mode, config);
    let mut frame_dumps = Vec::with_capacity(frames);

    for frame in 0..frames {
        let now = Duration::from_millis(frame as u64 * frame_interval);
        let mut placement = Placement::new(scenario.view, scenario.mode, config);

        for layer in &mut scenario.layers {
            placement.place_layer(layer, &proj_matrix);
        }
        let placement_changed = placement.commit(&previous, now);
        for layer in &mut scenario.layers {
            placement.update_layer_opacities(layer);
        }
        placement.set_recent(now);

        log::info!(
            "frame {frame}: {} placements, {} fading, changed={placement_changed}",
            placement.placements.len(),
            placement.opacities.len(),
        );

        frame_dumps.push(FrameDump::from_placement(
            frame,
            now.as_millis() as u64,
            placement_changed,
            &placement,
        ));
        previous = placement;
    }

    PlacementDump {
        mode: match scenario.mode {
            AnimationMode::Continuous => "continuous".to_string(),
            AnimationMode::Instant => "instant".to_string(),
        },
        frames: frame_dumps,
        buckets: PlacementDump::bucket_dumps(&scenario.layers),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
