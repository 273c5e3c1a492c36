use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use ssgi::{
    CameraFrame, CommandList, FrameOutcome, MemoryBudget, RecordingHost, Settings, SsgiEffect,
    TargetAllocator, Unbounded,
};
use ssgiconfig::ConfigFile;
use tracing_subscriber::EnvFilter;

use crate::cli::PlanArgs;
use crate::paths::AppPaths;

const FIELD_OF_VIEW_DEGREES: f32 = 60.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Serialize)]
struct PlannedFrame<'a> {
    outcome: &'a FrameOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands: Option<&'a CommandList>,
}

pub fn plan(args: PlanArgs) -> Result<()> {
    let (config, source) = resolve_config(args.config.as_deref())?;
    match &source {
        Some(path) => tracing::info!(config = %path.display(), "loaded settings"),
        None => tracing::info!("using default settings"),
    }

    let requested = apply_overrides(config.to_settings(), &args);
    let settings = requested.clamped();
    if settings != requested {
        tracing::warn!("clamped out-of-range overrides into their documented ranges");
    }

    let budget_mib = args
        .budget_mib
        .or_else(|| config.memory_budget().map(|budget| budget.mib()));
    let allocator: Box<dyn TargetAllocator> = match budget_mib {
        Some(mib) => Box::new(MemoryBudget::from_mib(mib)),
        None => Box::new(Unbounded),
    };

    let mut effect = SsgiEffect::new(settings, allocator).with_clip_space(config.clip_space());
    let camera = CameraFrame::perspective_gl(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        args.size,
        NEAR_PLANE,
        FAR_PLANE,
    );
    let mut host = RecordingHost::new();
    let mut outcomes = Vec::with_capacity(args.frames as usize);
    for frame in 0..args.frames {
        let outcome = effect
            .render_frame(&camera, &mut host)
            .with_context(|| format!("failed to build frame {}", frame + 1))?;
        outcomes.push(outcome);
    }

    let recorded = host.frames();
    let mut submitted = recorded.iter();
    let planned: Vec<PlannedFrame<'_>> = outcomes
        .iter()
        .map(|outcome| PlannedFrame {
            outcome,
            commands: outcome
                .report()
                .and_then(|_| submitted.next())
                .map(|frame| &frame.commands),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    println!(
        "Settings: scale={} iterations={} radius={} mode={} clip={:?}",
        settings.resolution_scale,
        settings.filter_iterations,
        settings.filter_radius,
        settings.render_mode,
        effect.clip_space()
    );
    for frame in &planned {
        match frame.outcome {
            FrameOutcome::Submitted(report) => {
                println!(
                    "frame {} ({}): {} passes, {} commands, peak {} live / {} bytes",
                    report.frame_index,
                    report.extent,
                    report.passes,
                    report.commands,
                    report.usage.peak_live,
                    report.usage.peak_bytes
                );
                for command in frame.commands.into_iter().flatten() {
                    println!("  {command}");
                }
            }
            FrameOutcome::Skipped { reason } => println!("skipped: {reason:?}"),
        }
    }
    Ok(())
}

pub fn check(file: &Path) -> Result<()> {
    let config = ConfigFile::load(file)
        .with_context(|| format!("{} is not a valid settings file", file.display()))?;
    println!("{} is valid", file.display());
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn defaults() -> Result<()> {
    print!("{}", ConfigFile::default().to_toml_string()?);
    Ok(())
}

pub fn where_config() -> Result<()> {
    let paths = AppPaths::discover()?;
    let file = paths.config_file();
    println!("config dir:  {}", paths.config_dir().display());
    println!(
        "config file: {} ({})",
        file.display(),
        if file.is_file() { "present" } else { "missing" }
    );
    Ok(())
}

fn resolve_config(explicit: Option<&Path>) -> Result<(ConfigFile, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = ConfigFile::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }

    let candidate = AppPaths::discover()
        .map(|paths| paths.config_file())
        .ok()
        .filter(|path| path.is_file());
    match candidate {
        Some(path) => {
            let config = ConfigFile::load(&path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => Ok((ConfigFile::default(), None)),
    }
}

fn apply_overrides(mut settings: Settings, args: &PlanArgs) -> Settings {
    if let Some(iterations) = args.iterations {
        settings.filter_iterations = iterations;
    }
    if let Some(radius) = args.radius {
        settings.filter_radius = radius;
    }
    if let Some(scale) = args.scale {
        settings.resolution_scale = scale;
    }
    settings
}
