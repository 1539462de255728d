use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autobackup::config::Config;
use autobackup::environment::SystemEnvironment;
use autobackup::logging::{self, *};
use autobackup::pipeline::UploadPipeline;
use autobackup::scanner::{ExtensionFilter, Scanner};
use autobackup::scheduler::{CycleReport, Scheduler, TriggerResult};
use autobackup::status::LogStatus;
use autobackup::store::{StateStore, StoreHandle, STATE_DB_NAME, STORE_WAIT};
use autobackup::transfer::HttpTransfer;
use autobackup::types::Settings;
use autobackup::utils::wait_for_shutdown;

fn build_scheduler(
	config: &Config,
	store: impl Into<StoreHandle>,
) -> Result<Arc<Scheduler>, Box<dyn Error>> {
	let transfer = HttpTransfer::new(&config.remote)?;
	let scheduler = Scheduler::new(
		store,
		Scanner::from_config(config)?,
		UploadPipeline::from_config(&config.upload),
		Arc::new(transfer),
	)
	.with_environment(Arc::new(SystemEnvironment::new(config.trigger.assume_network)))
	.with_reporter(Arc::new(LogStatus))
	.with_trigger_config(config.trigger.clone());
	Ok(Arc::new(scheduler))
}

/// Render an epoch-millisecond timestamp relative to now
fn format_ago(ms: u64) -> String {
	let then = std::time::UNIX_EPOCH + Duration::from_millis(ms);
	match std::time::SystemTime::now().duration_since(then) {
		Ok(d) if d.as_secs() < 120 => format!("{}s ago", d.as_secs()),
		Ok(d) if d.as_secs() < 7200 => format!("{} min ago", d.as_secs() / 60),
		Ok(d) => format!("{} h ago", d.as_secs() / 3600),
		Err(_) => "in the future".to_string(),
	}
}

/// The agent opens the state store only while it uses it, so the other
/// commands can reach it between cycles.
async fn cmd_run(config: &Config) -> Result<(), Box<dyn Error>> {
	let handle = StoreHandle::on_demand(&config.state_dir, STORE_WAIT);
	let settings = handle.acquire().await?.settings()?;
	let interval = Duration::from_millis(settings.scan_interval_ms.max(0) as u64);
	let scheduler = build_scheduler(config, handle)?;

	scheduler.register_periodic(interval);
	info!("Agent running, press Ctrl-C to stop");
	wait_for_shutdown().await;

	info!("Stopping, waiting for the current file to finish");
	scheduler.shutdown().await;
	Ok(())
}

async fn cmd_once(config: &Config, store: Arc<StateStore>) -> Result<(), Box<dyn Error>> {
	let scheduler = build_scheduler(config, store)?;

	let stopper = Arc::clone(&scheduler);
	let signal_task = tokio::spawn(async move {
		wait_for_shutdown().await;
		info!("Stop requested, finishing the current file");
		stopper.stop();
	});

	let result = scheduler.trigger().await;
	signal_task.abort();

	match result? {
		TriggerResult::Coalesced => eprintln!("A backup cycle is already running"),
		TriggerResult::Finished(CycleReport::Skipped(reason)) => eprintln!("Skipped: {}", reason),
		TriggerResult::Finished(CycleReport::Completed { outcome, .. }) => {
			println!("{}", outcome);
			for failure in &outcome.failures {
				println!("  {} ({}): {}", failure.path.display(), failure.kind, failure.reason);
			}
		}
	}
	Ok(())
}

fn cmd_scan(config: &Config, store: &StateStore) -> Result<(), Box<dyn Error>> {
	let settings = store.settings()?;
	let uploaded = store.fingerprints()?;
	let scanner = Scanner::from_config(config)?;
	let filter = ExtensionFilter::from_categories(&settings.categories);

	let report = scanner.scan(&filter, |fingerprint| uploaded.contains(fingerprint));
	for candidate in &report.candidates {
		let category = candidate.category.map(|c| c.to_string()).unwrap_or_default();
		println!("{}\t{}\t{}", candidate.size, category, candidate.path.display());
	}
	eprintln!(
		"{} new, {} already uploaded, {} not matching ({} weak fingerprints)",
		report.stats.candidates,
		report.stats.already_uploaded,
		report.stats.filtered_out,
		report.stats.weak_fingerprints
	);
	Ok(())
}

fn cmd_status(config: &Config, store: &StateStore, json: bool) -> Result<(), Box<dyn Error>> {
	let identity = store.identity()?;
	let settings = store.settings()?;
	let uploaded = store.fingerprint_count()?;
	let last_scan = store.last_scan()?;

	if json {
		let value = serde_json::json!({
			"deviceId": identity,
			"uploadedCount": uploaded,
			"lastScanMs": last_scan,
			"settings": settings,
			"monitoredDirs": config.monitored_dirs,
			"endpoint": config.remote.upload_url(),
		});
		println!("{}", serde_json::to_string_pretty(&value)?);
		return Ok(());
	}

	println!("Device ID:      {}", identity);
	println!("Uploaded files: {}", uploaded);
	match last_scan {
		Some(ms) => println!("Last scan:      {}", format_ago(ms)),
		None => println!("Last scan:      never"),
	}
	println!("Endpoint:       {}", config.remote.upload_url());
	for (key, value) in settings.to_entries() {
		println!("  {} = {}", key, value);
	}
	for dir in &config.monitored_dirs {
		println!("  watching {}", dir.display());
	}
	Ok(())
}

fn cmd_set(store: &StateStore, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
	let mut settings = store.settings()?;
	settings
		.apply(key, value)
		.map_err(|e| format!("{} (known keys: {})", e, Settings::keys().join(", ")))?;
	store.set_settings(&settings)?;
	println!("{} = {}", key, value);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("autobackup")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Background backup agent")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(clap::value_parser!(PathBuf))
				.help("Config file (default: ~/.autobackup/config.toml)"),
		)
		.subcommand(Command::new("run").about("Run periodic backups until interrupted"))
		.subcommand(Command::new("once").about("Run one backup cycle now"))
		.subcommand(Command::new("scan").about("List files that would be uploaded"))
		.subcommand(
			Command::new("status")
				.about("Show device identity, settings and upload count")
				.arg(Arg::new("json").long("json").action(ArgAction::SetTrue).help("JSON output")),
		)
		.subcommand(
			Command::new("reset").about("Forget uploaded files so everything is sent again"),
		)
		.subcommand(
			Command::new("set")
				.about("Change a setting")
				.arg(Arg::new("key").required(true))
				.arg(Arg::new("value").required(true)),
		)
		.get_matches();

	let config = Config::load(matches.get_one::<PathBuf>("config").map(|p| p.as_path()))?;
	logging::init_tracing(&config.log_level);
	if let Some(("run", _)) = matches.subcommand() {
		return cmd_run(&config).await;
	}

	let db_path = config.state_dir.join(STATE_DB_NAME);
	let store = Arc::new(StateStore::open_waiting(&db_path, STORE_WAIT).await?);

	match matches.subcommand() {
		Some(("once", _)) => cmd_once(&config, store).await?,
		Some(("scan", _)) => cmd_scan(&config, &store)?,
		Some(("status", sub)) => cmd_status(&config, &store, sub.get_flag("json"))?,
		Some(("reset", _)) => {
			let removed = store.clear_fingerprints()?;
			println!("Forgot {} uploaded file(s)", removed);
		}
		Some(("set", sub)) => {
			let key = sub.get_one::<String>("key").ok_or("set: key required")?;
			let value = sub.get_one::<String>("value").ok_or("set: value required")?;
			cmd_set(&store, key, value)?;
		}
		_ => {}
	}

	Ok(())
}

// vim: ts=4
