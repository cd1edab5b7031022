use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigManager, POLL_RATE_RANGE};
use crate::control_group::{sample_gate_envelope, ControlGroup};
use crate::engine::{InputUpdate, PollingEngine};

#[derive(Subcommand, Clone)]
pub enum AuxDriverTask {
    ValidateConfig,
    /// Print every group's settings and bindings as YAML.
    ListSettings,
    /// Print the configured gate next to the default input envelope.
    ShowGate {
        #[arg(long, help = "Group key as written in the profile.")]
        group: String,
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u16).range(1..=3600),
        help = "Number of evenly spaced angles.")]
        steps: u16,
    },
}

fn sanitize_cfg_file_path(cfg_file_path: &std::path::Path) -> Result<()> {
    if !cfg_file_path.exists() {
        let e = format!(
            "Profile is not found at {}, current dir is {}.\n\
            Please specify proper location of the profile via -c command line option.\n\
            ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~",
            cfg_file_path.to_str().unwrap_or("Empty file path..."),
            std::env::current_dir()?
                .to_str()
                .unwrap_or("Unknown current working dir...")
        );
        log::error!("{e}");

        if cfg_file_path.is_relative() {
            log::warn!(
                "NB: You have specified relative profile path, it is resolved against the \
                current working dir. Pass a full path with -c <full path to your profile>."
            );
        }
        bail!("Config file not found.");
    }
    Ok(())
}

fn load_config(cfg_file_path: &Path, debug: bool) -> Result<ConfigManager> {
    let mut config_manager = ConfigManager::new(cfg_file_path, debug)?;
    config_manager.load()?;
    Ok(config_manager)
}

fn log_validation_errors(errors: &[String]) {
    error!("Configuration errors:");
    for error in errors {
        error!("> {}", error);
    }
}

pub async fn run_aux_task(aux_task: &AuxDriverTask, cfg_file_path: &Path, debug: bool) -> Result<()> {
    sanitize_cfg_file_path(cfg_file_path)?;
    let config_manager = load_config(cfg_file_path, debug)?;

    match aux_task {
        AuxDriverTask::ValidateConfig => {
            let errors = config_manager.validate()?;
            if errors.is_empty() {
                info!("Configuration is valid.");
            } else {
                log_validation_errors(&errors);
                bail!("Configuration validation failed");
            }
        }
        AuxDriverTask::ListSettings => {
            let controller = config_manager.build_controller()?;
            for (key, group) in controller.groups() {
                println!("{}", format!("# {key} ({}, {})", group.name(), group.kind()).bold());
                let listing = GroupListing::new(group.as_ref());
                print!("{}", serde_yaml::to_string(&listing)?);
            }
        }
        AuxDriverTask::ShowGate { group, steps } => {
            let controller = config_manager.build_controller()?;
            let Some(control_group) = controller.group(group) else {
                bail!(
                    "No enabled group '{group}' in the profile (known: {})",
                    controller
                        .groups()
                        .map(|(k, _)| k)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            };
            println!(
                "{}",
                format!(
                    "{} gate of '{}' at {} angles",
                    control_group.gate_shape(),
                    control_group.name(),
                    steps
                )
                .bold()
            );
            println!("{:>8} {:>10} {:>10}", "angle", "gate", "default");
            for point in sample_gate_envelope(control_group.as_ref(), usize::from(*steps)) {
                println!(
                    "{:>8.1} {:>10.4} {:>10.4}",
                    point.angle_deg, point.configured, point.default
                );
            }
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct GroupListing {
    gate: String,
    settings: Vec<crate::numeric_setting::SettingInfo>,
    references: Vec<crate::control_group::ReferenceInfo>,
}

impl GroupListing {
    fn new(group: &dyn ControlGroup) -> Self {
        Self {
            gate: group.gate_shape().to_string(),
            settings: group.settings().iter().map(|s| s.info()).collect(),
            references: group.reference_infos(),
        }
    }
}

fn watch_config_file(cfg_file_path: &std::path::Path) -> Result<mpsc::Receiver<()>> {
    use notify_debouncer_full::{new_debouncer, DebounceEventResult};

    let (tx, rx) = mpsc::channel(1);
    let mut debouncer = new_debouncer(
        std::time::Duration::from_millis(500),
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.blocking_send(());
                        break;
                    }
                }
            }
            Err(e) => error!("Config file watch error: {:?}", e),
        },
    )?;

    debouncer.watch(
        cfg_file_path,
        notify_debouncer_full::notify::RecursiveMode::NonRecursive,
    )?;

    std::mem::forget(debouncer);

    Ok(rx)
}

/// Reads `input=value` lines from stdin until EOF or cancellation. Runs on a plain
/// thread so a pending read never holds up shutdown.
fn spawn_stdin_feeder(sender: mpsc::UnboundedSender<InputUpdate>, stop_token: CancellationToken) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if stop_token.is_cancelled() {
                return;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read input feed: {e}");
                    return;
                }
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<InputUpdate>() {
                Ok(update) => {
                    if sender.send(update).is_err() {
                        return;
                    }
                }
                Err(e) => warn!("{e:#}"),
            }
        }
        info!("Input feed closed, holding last values.");
    });
}

pub async fn run_polling_engine(
    cfg_file_path: &Path,
    no_hot_reload: bool,
    debug: bool,
    poll_rate_hz: Option<u32>,
) -> Result<()> {
    sanitize_cfg_file_path(cfg_file_path)?;

    let mut config_watcher = if !no_hot_reload {
        Some(watch_config_file(cfg_file_path)?)
    } else {
        None
    };

    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let feeder_stop_token = CancellationToken::new();
    spawn_stdin_feeder(update_tx, feeder_stop_token.clone());

    let mut config_manager = load_config(cfg_file_path, debug)?;
    let mut previous_engine: Option<PollingEngine> = None;

    'engine_restart: loop {
        if debug {
            log::debug!("Building controller from profile.");
        }

        let errors = config_manager.validate()?;
        if !errors.is_empty() {
            log_validation_errors(&errors);
            bail!("Configuration validation failed");
        }
        let controller = config_manager
            .build_controller()
            .context("Failed to build controller from profile")?;
        if let Some(previous) = previous_engine.take() {
            let carried = controller
                .inputs()
                .adopt_values(previous.controller().inputs());
            if debug {
                log::debug!("Carried {carried} input values over from the previous profile.");
            }
        }

        let rate = match poll_rate_hz {
            Some(rate) => POLL_RATE_RANGE.clamp(rate),
            None => config_manager.poll_rate_hz(),
        };
        let mut engine = PollingEngine::new(controller, rate, debug);

        {
            let groups = engine.group_count();
            if groups == 0 {
                warn!("----");
                warn!("No enabled groups found - nothing to poll, spinning in vain.");
                warn!("Please configure groups in the profile and we'll catch up with hot-reload.");
                warn!("----");
            }
            info!("Active groups: {}", groups);
            info!(
                "Declared inputs: {}",
                engine.controller().inputs().names().collect::<Vec<_>>().join(", ")
            );
        }

        info!("Starting polling engine.");

        if !no_hot_reload {
            info!(
                "{} {}.",
                "Hot-reload on profile change is active".magenta().bold(),
                "(disable with --no-hot-reload)"
            );
        }

        info!("{}", "Feed inputs as 'name=value' lines on stdin.".cyan());
        info!("{}", "Press Ctrl+C to stop.".green().bold());
        info!("{}", "=".repeat(50));

        'current_run: loop {
            #[rustfmt::skip]
            tokio::select! {
                result = engine.run(&mut update_rx) => { result? }
                _ = async {
                    match config_watcher.as_mut() {
                        Some(rx) => { let _ = rx.recv().await; }
                        None => std::future::pending().await,
                    };
                } => {
                    let reloaded = load_config(cfg_file_path, debug).and_then(|candidate| {
                        let errors = candidate.validate()?;
                        if errors.is_empty() {
                            Ok(candidate)
                        } else {
                            log_validation_errors(&errors);
                            bail!("Configuration validation failed")
                        }
                    });

                    match reloaded {
                        Ok(candidate) => config_manager = candidate,
                        Err(e) => {
                            log::error!("\n---\n!!! Configuration load failed while trying to hot-reload.");
                            log::error!("The error was: \n {:?} \n", e);
                            log::warn!("Running with previous (valid) configuration.");
                            continue 'current_run;
                        }
                    }

                    info!("Configuration validated. Restarting polling engine with new configuration.");
                    previous_engine = Some(engine);
                    continue 'engine_restart;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, going to terminate. Stopping polling engine.");
                    feeder_stop_token.cancel();
                    info!("Cleanup complete, terminating immediately.");
                    return Ok(())
                }
            }
        }
    }
}
