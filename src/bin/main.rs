use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = reshaper_lib::config::APP_NAME)]
#[command(bin_name = reshaper_lib::config::APP_COMMAND_NAME)]
#[command(author = reshaper_lib::config::APP_AUTHORS)]
#[command(version = reshaper_lib::config::APP_VERSION_STR)]
#[command(about = reshaper_lib::config::APP_ABOUT, long_about = reshaper_lib::config::APP_LONG_ABOUT)]
struct Cli {
    #[arg(short, long, default_value = reshaper_lib::config::APP_DEFAULT_CONFIG_FILE,
    help = "Path to the profile, including filename.")]
    cfg_file_path: std::path::PathBuf,
    #[arg(long, default_value = reshaper_lib::config::APP_DEFAULT_NO_HOT_RELOAD, help = "Disable automatic engine reload on profile change.")]
    no_hot_reload: bool,
    #[arg(
        short,
        long,
        help = "Enable debug information output (settings applied, input writes)."
    )]
    debug: bool,
    #[arg(
        short = 'u',
        long,
        help = "Polling rate in Hz, overrides global.poll_rate_hz of the profile."
    )]
    poll_rate: Option<u32>,
    #[arg(long, default_value = reshaper_lib::config::APP_DEFAULT_MAX_LOG_LEVEL, help = "Limit max log level.")]
    log_level: String,

    #[command(subcommand)]
    aux_task: Option<reshaper_lib::driver::AuxDriverTask>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .filter_module("notify", log::LevelFilter::Warn)
        .filter_module("notify_debouncer_full", log::LevelFilter::Warn)
        .init();
    log::info!("------------====--=-=--=--==--====-=-=--==-=--===-=---=------------");
    log::info!("Starting {}.", reshaper_lib::config::APP_LONG_NAME);
    log::info!("Re-run with -h if any help required.");
    if cli.debug {
        log::debug!("General debug output enabled.");
    }
    log::info!("------------====--=-=--=--==--====-=-=--==-=--===-=---=------------");

    if let Some(ref aux_task) = cli.aux_task {
        return reshaper_lib::driver::run_aux_task(aux_task, &cli.cfg_file_path, cli.debug).await;
    }

    reshaper_lib::driver::run_polling_engine(
        &cli.cfg_file_path,
        cli.no_hot_reload,
        cli.debug,
        cli.poll_rate,
    )
    .await
}
