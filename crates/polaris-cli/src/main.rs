mod demo;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use polaris_audio::{ChannelLayout, Mixer};
use polaris_core::hash::hash_frame;
use polaris_core::{BackendKind, FrameBuffer, PolarisConfig};
use polaris_hal::{Capabilities, FrameStatus, Host};

use crate::demo::DemoCore;

const DEFAULT_CONFIG: &str = "polaris.toml";

#[derive(Parser)]
#[command(
    name = "polaris",
    version,
    about = "Polaris presentation bridge: headless compositor and audio runner"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in demo core headless and dump the last frame
    Run {
        /// Number of frames to run
        #[arg(long, default_value_t = 90)]
        frames: u64,

        /// Render backend, overriding the config file
        #[arg(long)]
        backend: Option<BackendArg>,

        /// Where to write the final frame
        #[arg(short, long, default_value = "frame.png")]
        out: PathBuf,

        /// Config file (default: ./polaris.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Play the mix on the default output device
        #[arg(long)]
        audio: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the capability table negotiated with engine cores
    Caps {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Cpu,
    Gpu,
    Auto,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cpu => BackendKind::Cpu,
            BackendArg::Gpu => BackendKind::Gpu,
            BackendArg::Auto => BackendKind::Auto,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    match cli.command {
        Commands::Run {
            frames,
            backend,
            out,
            config,
            audio,
        } => cmd_run(frames, backend, &out, config.as_deref(), audio),
        Commands::Config { config } => cmd_config(config.as_deref()),
        Commands::Caps { json } => cmd_caps(json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PolarisConfig> {
    match path {
        Some(path) => PolarisConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => PolarisConfig::load_from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("failed to load {DEFAULT_CONFIG}")),
        None => Ok(PolarisConfig::default()),
    }
}

fn cmd_run(
    frames: u64,
    backend: Option<BackendArg>,
    out: &Path,
    config_path: Option<&Path>,
    audio: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(backend) = backend {
        config.render.backend = backend.into();
    }

    let mut host = Host::new(&config).context("failed to create host")?;
    let mut sink = AudioSink::start(&host, &config, audio || config.audio.output == "rodio");
    let mut core = DemoCore::new(config.render.viewport(), frames, config.audio.sample_rate);

    println!(
        "▶ Running demo: {} frames at {}x{} on the {} backend",
        frames,
        config.render.viewport_width,
        config.render.viewport_height,
        host.render().backend_name()
    );
    let start = Instant::now();

    if host.init(&mut core)? == FrameStatus::Continue {
        loop {
            let status = host.run_frame(&mut core, &[])?;
            sink.pump();
            if status == FrameStatus::Exit {
                break;
            }
        }
    }
    host.shutdown(&mut core);

    let frame = host.read_frame().context("failed to read back the final frame")?;
    write_png(&frame, out)?;

    let elapsed = start.elapsed();
    println!("   ✓ {} frames in {:.2?}", host.frames(), elapsed);
    println!("   ✓ Uploads: {}", host.render().upload_count());
    if let Some(peak) = sink.peak() {
        println!("   ✓ Audio peak: {peak:.3}");
    }
    if !host.errors().is_empty() {
        println!("   ⚠ Engine errors captured: {}", host.errors().len());
    }
    println!("   ✓ Frame written to {}", out.display());
    println!("   Hash: {}", hash_frame(&frame));
    Ok(())
}

fn write_png(frame: &FrameBuffer, out: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer does not match its dimensions")?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
    }
    img.save(out)
        .with_context(|| format!("failed to write frame: {}", out.display()))?;
    Ok(())
}

fn cmd_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn cmd_caps(json: bool) -> Result<()> {
    let caps = Capabilities::HEADLESS;
    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }
    println!("Polaris capabilities");
    for (name, supported) in caps.table() {
        let mark = if supported { "✓" } else { "✗" };
        println!("   {mark} {name}");
    }
    Ok(())
}

/// Where the mix goes: the default device, or a headless drain that pulls
/// one frame's worth of samples per engine frame.
enum AudioSink {
    Headless {
        mixer: Mixer,
        buffer: Vec<f32>,
        peak: f32,
    },
    #[cfg(feature = "audio")]
    Device(polaris_audio::RodioOutput),
}

impl AudioSink {
    fn start(host: &Host, config: &PolarisConfig, device: bool) -> Self {
        let layout = ChannelLayout(config.audio.output_channels.max(1));
        if device {
            if let Some(sink) = Self::device(host, config, layout) {
                return sink;
            }
        }
        Self::headless(Mixer::new(host.audio(), layout, config.audio.max_block_frames), config)
    }

    #[cfg(feature = "audio")]
    fn device(host: &Host, config: &PolarisConfig, layout: ChannelLayout) -> Option<Self> {
        let mixer = Mixer::new(host.audio(), layout, config.audio.max_block_frames);
        match polaris_audio::RodioOutput::start(mixer, config.audio.sample_rate, config.audio.max_block_frames) {
            Ok(output) => Some(AudioSink::Device(output)),
            Err(e) => {
                tracing::warn!(error = %e, "no audio device, mixing headless");
                None
            }
        }
    }

    #[cfg(not(feature = "audio"))]
    fn device(_host: &Host, _config: &PolarisConfig, _layout: ChannelLayout) -> Option<Self> {
        tracing::warn!("built without the `audio` feature, mixing headless");
        None
    }

    fn headless(mixer: Mixer, config: &PolarisConfig) -> Self {
        // One 60 Hz frame of samples.
        let frames = (config.audio.sample_rate / 60).max(1) as usize;
        let len = frames * mixer.layout().channels();
        AudioSink::Headless {
            mixer,
            buffer: vec![0.0; len],
            peak: 0.0,
        }
    }

    fn pump(&mut self) {
        if let AudioSink::Headless { mixer, buffer, peak } = self {
            mixer.render(buffer);
            *peak = buffer.iter().fold(*peak, |p, s| p.max(s.abs()));
        }
    }

    fn peak(&self) -> Option<f32> {
        match self {
            AudioSink::Headless { peak, .. } => Some(*peak),
            #[cfg(feature = "audio")]
            AudioSink::Device(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "polaris", "run", "--frames", "5", "--backend", "cpu", "--out", "x.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { frames, backend, out, audio, .. } => {
                assert_eq!(frames, 5);
                assert!(matches!(backend, Some(BackendArg::Cpu)));
                assert_eq!(out, PathBuf::from("x.png"));
                assert!(!audio);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_png_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("frame.png");
        let frame = FrameBuffer::solid(4, 2, polaris_core::Color::WHITE);
        write_png(&frame, &out).unwrap();
        let img = image::open(&out).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [255, 255, 255, 255]);
    }
}
