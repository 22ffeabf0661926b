use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use voxdrive::actuator::serial::SerialActuator;
use voxdrive::audio::source::AudioSource;
use voxdrive::audio::wav::WavFileSource;
use voxdrive::cli::{Cli, Commands};
use voxdrive::command::resolver::CommandMapping;
use voxdrive::config::Config;
use voxdrive::session::{Session, SessionOptions};
use voxdrive::stream::types::RecognitionConfig;
use voxdrive::stream::ws::WsRecognitionChannel;
use voxdrive::{output, Result as VoxResult};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Grammar) => {
            print_grammar(cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxdrive",
                &mut std::io::stdout(),
            );
        }
        None => {
            if let Err(e) = run_session(cli).await {
                output::error(&e.to_string());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxdrive/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> VoxResult<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };
    Ok(config.with_env_overrides())
}

/// Run one streaming session end to end.
async fn run_session(cli: Cli) -> VoxResult<()> {
    let mut config = load_config(cli.config.as_deref())?;

    // CLI flags override the config file.
    if let Some(endpoint) = cli.endpoint {
        config.recognition.endpoint = endpoint;
    }
    if let Some(sample_rate) = cli.sample_rate {
        config.recognition.sample_rate = sample_rate;
    }
    if let Some(language) = cli.language {
        config.recognition.language = language;
    }
    if let Some(device) = cli.device {
        config.audio.device = Some(device);
    }

    let port = cli.port.ok_or_else(|| {
        voxdrive::VoxdriveError::ConfigInvalidValue {
            key: "port".to_string(),
            message: "a serial port is required (e.g. voxdrive /dev/ttyUSB0)".to_string(),
        }
    })?;

    let max_duration = match cli.duration {
        Some(duration) => duration,
        None => config.max_duration()?,
    };

    // Audio source: WAV file when requested, microphone otherwise. A file's
    // own sample rate wins over the configured one.
    let source: Box<dyn AudioSource> = match &cli.file {
        Some(path) => {
            let source = WavFileSource::open(path)?;
            config.recognition.sample_rate = source.sample_rate();
            Box::new(source)
        }
        None => open_microphone(&config)?,
    };

    let mapping = CommandMapping::with_overrides(&config.commands.phrases)?;

    // Init: the actuator opens before any network traffic; failure here
    // aborts with nothing to clean up.
    let actuator = SerialActuator::open(&port, &config.serial)?;

    let channel = WsRecognitionChannel::new(config.recognition.endpoint.clone());

    let options = SessionOptions {
        recognition: RecognitionConfig {
            sample_rate: config.recognition.sample_rate,
            encoding: config.recognition.encoding.clone(),
            language: config.recognition.language.clone(),
        },
        max_duration,
        port_label: port,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let session = Session::new(
        Box::new(channel),
        source,
        Box::new(actuator),
        mapping,
        options,
    );
    session.run().await
}

#[cfg(feature = "cpal-audio")]
fn open_microphone(config: &Config) -> VoxResult<Box<dyn AudioSource>> {
    use voxdrive::audio::capture::CpalAudioSource;
    let source = CpalAudioSource::new(
        config.audio.device.as_deref(),
        config.recognition.sample_rate,
    )?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "cpal-audio"))]
fn open_microphone(_config: &Config) -> VoxResult<Box<dyn AudioSource>> {
    Err(voxdrive::VoxdriveError::AudioCapture {
        message: "built without microphone support; use --file or rebuild with the cpal-audio feature"
            .to_string(),
    })
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = voxdrive::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    Err(anyhow::anyhow!(
        "built without microphone support; rebuild with the cpal-audio feature"
    ))
}

/// Print the active command grammar, overrides included.
fn print_grammar(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load_config(config_path).context("failed to load configuration")?;
    let mapping = CommandMapping::with_overrides(&config.commands.phrases)?;

    println!("Command grammar (first match wins):");
    for (phrase, code) in mapping.entries() {
        println!(
            "  {:<24} → {} ('{}')",
            format!("\"{}\"", phrase),
            code.name(),
            code.wire_byte() as char
        );
    }
    Ok(())
}
