//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (stderr; stdout is kept for `--stdout` results).
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] from disk (defaults on first run) plus env overrides.
//! 4. Create the tokio runtime and wire Ctrl-C to the shutdown token.
//! 5. `resident`: start the hotkey listener and run the [`Coordinator`].
//!    `once`: delegate to a resident, or run one session standalone.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use screen_to_text::{
    config::AppConfig,
    coordinator::{Collaborators, Coordinator, CoordinatorSettings},
    feedback::{LogPopup, LogTray},
    hotkey::{Hotkey, HotkeyListener},
    output::SystemClipboard,
    recognize::{ApiRecognizer, CommandGrabber, Recognizer},
    select::{CommandSelector, FixedSelector, Region, RegionSelector},
    session::{ClipboardTarget, ResultTarget, SessionExecutor, StdoutTarget},
    transport::{Delegation, DelegationClient},
};

const USAGE: &str = "\
usage: screen-to-text [resident]       run the resident (hotkey + loopback server)
       screen-to-text once [--stdout]  capture once, via the resident if one is running
       screen-to-text help             show this message
";

/// Depth of the hotkey mailbox.
const HOTKEY_MAILBOX: usize = 4;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Resident,
    Once { stdout: bool },
    Help,
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let words: Vec<&str> = args.iter().map(String::as_str).collect();

    match words.as_slice() {
        [] | ["resident"] => Ok(Command::Resident),
        ["once"] => Ok(Command::Once { stdout: false }),
        ["once", "--stdout"] => Ok(Command::Once { stdout: true }),
        ["help" | "-h" | "--help"] => Ok(Command::Help),
        _ => Err(format!("unrecognised arguments: {}", args.join(" "))),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn build_selector(config: &AppConfig) -> Result<Arc<dyn RegionSelector>> {
    match config.capture.region {
        Some(fixed) => {
            let region = Region::try_from(fixed).context("invalid capture.region")?;
            log::info!("capture: using fixed region {region}");
            Ok(Arc::new(FixedSelector(region)))
        }
        None => {
            let selector = CommandSelector::from_argv(&config.capture.select_command)
                .context("invalid capture.select_command")?;
            Ok(Arc::new(selector))
        }
    }
}

fn build_recognizer(config: &AppConfig) -> Arc<dyn Recognizer> {
    let grabber = Arc::new(CommandGrabber::new(config.capture.grab_command.clone()));
    Arc::new(ApiRecognizer::new(&config.api, grabber))
}

async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            log::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
        Err(e) => log::warn!("cannot listen for Ctrl-C: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

async fn run_resident(config: &AppConfig, shutdown: CancellationToken) -> Result<()> {
    let (hotkey_tx, hotkey_rx) = mpsc::channel(HOTKEY_MAILBOX);

    // Without a listener the hotkey mailbox simply never fires; delegated
    // requests still work.
    let _listener = match config.hotkey.key.parse::<Hotkey>() {
        Ok(hotkey) => HotkeyListener::start(hotkey, hotkey_tx)
            .map_err(|e| log::warn!("hotkey disabled: {e}"))
            .ok(),
        Err(e) => {
            log::warn!("hotkey disabled: {:?}: {e}", config.hotkey.key);
            None
        }
    };

    let coordinator = Coordinator::new(
        CoordinatorSettings::from_config(config),
        Collaborators {
            selector: build_selector(config)?,
            recognizer: build_recognizer(config),
            clipboard: Arc::new(SystemClipboard::new()),
            popup: Arc::new(LogPopup),
            tray: Arc::new(LogTray),
        },
    );

    coordinator
        .run(shutdown, hotkey_rx)
        .await
        .context("resident stopped")?;
    Ok(())
}

async fn run_once(config: &AppConfig, want_stdout: bool, shutdown: CancellationToken) -> Result<()> {
    let client = DelegationClient::from_config(&config.transport);

    match client.try_run_once(&shutdown, want_stdout).await {
        Delegation::Delivered(text) => {
            if want_stdout {
                StdoutTarget::new().on_success(&text).await?;
            } else {
                log::info!("once: resident copied the text to the clipboard");
            }
            return Ok(());
        }
        // A resident exists; running standalone now would start a second
        // session next to it.
        Delegation::Failed(e) => return Err(e).context("resident could not complete the capture"),
        Delegation::Cancelled => anyhow::bail!("cancelled before a resident was found"),
        Delegation::NoResident => log::debug!("once: no resident, running standalone"),
    }

    let executor = SessionExecutor::new(
        build_selector(config)?,
        build_recognizer(config),
        Arc::new(LogPopup),
        config.recognition.deadline(),
        config.recognition.hold(),
    );

    if want_stdout {
        executor.execute(&shutdown, &mut StdoutTarget::new()).await?;
    } else {
        let mut target = ClipboardTarget::new(Arc::new(SystemClipboard::new()));
        executor.execute(&shutdown, &mut target).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if command == Command::Help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = AppConfig::load();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    let shutdown = CancellationToken::new();
    rt.spawn(watch_ctrl_c(shutdown.clone()));

    let result = rt.block_on(async {
        match command {
            Command::Resident => run_resident(&config, shutdown).await,
            Command::Once { stdout } => run_once(&config, stdout, shutdown).await,
            Command::Help => Ok(()),
        }
    });

    // Abandoned recognitions may still be running; do not wait for them.
    rt.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("screen-to-text: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
