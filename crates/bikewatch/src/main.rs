//! `bikewatch` - CLI for the stolen bike registry
//!
//! This binary provides the command-line interface for registering bikes,
//! reporting thefts, recording recoveries, and curating recovery displays.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveTime, Utc};
use clap::Parser;

use bikewatch::cli::{
    AlertCommand, BikeCommand, Cli, Command, ConfigCommand, DisplayCommand, OutputFormat,
    RecoverArgs, StolenCommand,
};
use bikewatch::model::{RecoveryDisplay, TSV_HEADER};
use bikewatch::recovery::{parse_timestamp, RecoveryReport};
use bikewatch::{
    init_logging, Config, EffectDispatcher, Error, LogNotifier, PathRenderer, RecordScope,
    RecoveryService, Storage,
};

/// Exit status for a referenced record that does not exist.
const EXIT_NOT_FOUND: u8 = 2;
/// Exit status for database failures.
const EXIT_STORAGE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|cause| cause.downcast_ref::<Error>()) {
        Some(err) if err.is_not_found() => EXIT_NOT_FOUND,
        Some(err) if err.is_storage_error() => EXIT_STORAGE,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Bike(bike_cmd) => handle_bike(&mut open_storage(&config)?, bike_cmd),
        Command::Stolen(stolen_cmd) => {
            handle_stolen(&mut open_storage(&config)?, &config, stolen_cmd).await
        }
        Command::Alert(alert_cmd) => handle_alert(&mut open_storage(&config)?, &config, alert_cmd),
        Command::Display(display_cmd) => handle_display(&mut open_storage(&config)?, display_cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_bike(storage: &mut Storage, cmd: BikeCommand) -> Result<()> {
    match cmd {
        BikeCommand::Register(args) => {
            let bike = storage.register_bike(&args.to_new_bike())?;
            println!("Registered bike {} ({})", bike.id, bike.title());
        }
        BikeCommand::Show { id, format } => {
            let bike = storage
                .get_bike(id)?
                .ok_or(Error::BikeNotFound(id))?;
            let photos = storage.photos(id)?;
            let records = storage.stolen_records_for_bike(id)?;
            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({
                    "bike": bike,
                    "photos": photos,
                    "stolen_records": records,
                }));
            }
            println!("Bike {}: {}", bike.id, bike.title());
            println!("  Serial:  {}", bike.serial_number);
            println!("  Status:  {}", bike.status);
            if let Some(record_id) = bike.current_stolen_record_id {
                println!("  Current stolen record: {record_id}");
            }
            println!("  Photos:  {}", photos.len());
            for photo in &photos {
                let visibility = if photo.is_private { " (private)" } else { "" };
                println!("    [{}] {}{visibility}", photo.id, photo.path);
            }
            println!("  Stolen records: {}", records.len());
            for record in &records {
                let state = if record.current { "current" } else { "recovered" };
                println!("    [{}] {state}", record.id);
            }
        }
        BikeCommand::PhotoAdd {
            bike_id,
            path,
            private,
        } => {
            let photo = storage.add_photo(bike_id, &path, private)?;
            println!("Added photo {} to bike {bike_id}", photo.id);
        }
        BikeCommand::PhotoRemove { photo_id } => {
            if storage.remove_photo(photo_id)? {
                println!("Removed photo {photo_id}");
            } else {
                println!("Photo {photo_id} not found");
            }
        }
    }
    Ok(())
}

async fn handle_stolen(storage: &mut Storage, config: &Config, cmd: StolenCommand) -> Result<()> {
    match cmd {
        StolenCommand::Report(args) => {
            let date_stolen = args
                .date_stolen
                .as_deref()
                .map(|input| parse_timestamp(input, None, config.default_timezone()))
                .transpose()
                .context("invalid --date-stolen")?;
            let record = storage.report_stolen(args.bike_id, args.to_new_record(date_stolen))?;
            println!(
                "Reported bike {} stolen, record {}",
                args.bike_id, record.id
            );
        }
        StolenCommand::Recover(args) => handle_recover(storage, config, &args).await?,
        StolenCommand::Status { id, format } => {
            let derived = storage.display_status(id)?;
            if format == OutputFormat::Json {
                return print_json(&derived);
            }
            let source = if derived.is_overridden() {
                " (curated)"
            } else {
                ""
            };
            println!("{}{source}", derived.status());
        }
        StolenCommand::Promote { id } => {
            let record = storage.promote_to_current(id)?;
            println!(
                "Record {} is now current for bike {}",
                record.id,
                record.bike_id.unwrap_or_default()
            );
        }
        StolenCommand::Detach { id } => {
            storage.detach_bike(id)?;
            println!("Detached record {id} from its bike");
        }
        StolenCommand::Override { id, status } => {
            storage.set_display_override(id, status.into())?;
            println!("{}", storage.display_status(id)?.status());
        }
        StolenCommand::PoliceReport {
            id,
            number,
            department,
        } => {
            let record =
                storage.update_police_report(id, number.as_deref(), department.as_deref())?;
            let tsved = if record.tsved_at.is_some() {
                "unchanged"
            } else {
                "pending export"
            };
            println!("Updated police report for record {id} ({tsved})");
        }
        StolenCommand::RecoveryLink { id } => {
            println!("{}", storage.find_or_create_recovery_link_token(id)?);
        }
        StolenCommand::Displayable {
            unposted,
            limit,
            format,
        } => {
            let scope = if unposted {
                RecordScope::RecoveryUnposted
            } else {
                RecordScope::Displayable
            };
            let records = storage.list_stolen_records(scope, limit)?;
            if format == OutputFormat::Json {
                return print_json(&records);
            }
            for record in &records {
                let status = storage.display_status(record.id)?.status();
                let recovered_at = record
                    .recovered_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!("{}\t{recovered_at}\t{status}", record.id);
            }
        }
        StolenCommand::Tsv { scope, mark, limit } => {
            let now = Utc::now();
            let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            let records = storage.list_stolen_records(scope.scope(day_start), limit)?;

            println!("{TSV_HEADER}");
            let mut exported = Vec::with_capacity(records.len());
            for record in &records {
                let Some(bike_id) = record.bike_id else {
                    continue;
                };
                let Some(bike) = storage.get_bike(bike_id)? else {
                    continue;
                };
                println!("{}", record.tsv_row(&bike));
                exported.push(record.id);
            }
            if mark {
                storage.mark_tsved(&exported, now)?;
            }
        }
    }
    Ok(())
}

async fn handle_recover(storage: &mut Storage, config: &Config, args: &RecoverArgs) -> Result<()> {
    let report = match &args.report {
        Some(path) => read_report(path)?,
        None => args.to_report(),
    };

    let dispatcher = EffectDispatcher::spawn(Arc::new(LogNotifier), &config.notifications);
    let outcome = RecoveryService::new(storage, &dispatcher, config.default_timezone())
        .record(args.id, &report);
    let stats = dispatcher.shutdown().await;
    let outcome = outcome?;

    let recovered_at = outcome
        .stolen_record
        .recovered_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();
    println!("Recorded recovery of record {} at {recovered_at}", args.id);
    if stats.delivered + stats.failed > 0 {
        println!(
            "Notifications: {} delivered, {} failed",
            stats.delivered, stats.failed
        );
    }
    Ok(())
}

fn read_report(path: &Path) -> Result<RecoveryReport> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading report from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?
    };
    serde_json::from_str(&text).context("parsing recovery report")
}

fn handle_alert(storage: &mut Storage, config: &Config, cmd: AlertCommand) -> Result<()> {
    match cmd {
        AlertCommand::Promote {
            stolen_record_id,
            status,
            user_id,
        } => {
            let alert = storage.create_theft_alert(stolen_record_id, status.into(), user_id)?;
            println!(
                "Created theft alert {} ({}) for record {stolen_record_id}",
                alert.id, alert.status
            );
        }
        AlertCommand::SetStatus { alert_id, status } => {
            let alert = storage.set_theft_alert_status(alert_id, status.into())?;
            println!("Theft alert {} is {}", alert.id, alert.status);
        }
        AlertCommand::Image {
            stolen_record_id,
            photo_id,
        } => {
            let renderer = PathRenderer::from_config(&config.alert_images);
            match storage.generate_alert_image(stolen_record_id, photo_id, &renderer)? {
                Some(image) => println!("{}", image.path),
                None => println!("No alert image for record {stolen_record_id}"),
            }
            if storage.theft_alert_missing_photo(stolen_record_id)? {
                println!("Warning: active theft alert has no photo");
            }
        }
    }
    Ok(())
}

fn handle_display(storage: &mut Storage, cmd: DisplayCommand) -> Result<()> {
    match cmd {
        DisplayCommand::Create {
            stolen_record_id,
            quote,
            quote_by,
            date,
            link,
        } => {
            let now = Utc::now();
            let mut display = match stolen_record_id {
                Some(id) => storage.recovery_display_from_record(id)?,
                None => RecoveryDisplay::new(now),
            };
            if quote.is_some() {
                display.quote = quote;
            }
            if quote_by.is_some() {
                display.quote_by = quote_by;
            }
            if link.is_some() {
                display.link = link;
            }
            if date.is_some() {
                display.set_time(date.as_deref(), now);
            }
            let created = storage.create_recovery_display(&display)?;
            println!(
                "Created recovery display {}",
                created.id.unwrap_or_default()
            );
        }
        DisplayCommand::Show { id } => {
            let display = storage
                .get_recovery_display(id)?
                .ok_or(Error::RecoveryDisplayNotFound(id))?;
            print_json(&display)?;
        }
        DisplayCommand::Delete { id } => {
            storage.delete_recovery_display(id)?;
            println!("Deleted recovery display {id}");
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    if json {
        return print_json(&serde_json::json!({
            "database_path": storage.path(),
            "bikes": stats.total_bikes,
            "current_stolen_records": stats.current_stolen_records,
            "recovered_records": stats.recovered_records,
            "recovery_displays": stats.recovery_displays,
            "db_size_bytes": stats.db_size_bytes,
        }));
    }
    println!("bikewatch status");
    println!("----------------");
    println!("Database:          {}", storage.path().display());
    println!("Bikes:             {}", stats.total_bikes);
    println!("Stolen (current):  {}", stats.current_stolen_records);
    println!("Recovered:         {}", stats.recovered_records);
    println!("Recovery displays: {}", stats.recovery_displays);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                return print_json(config);
            }
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Storage]");
            println!("  Database path:      {}", config.database_path().display());
            println!();
            println!("[Recovery]");
            println!("  Default timezone:   {}", config.recovery.default_timezone);
            println!();
            println!("[Notifications]");
            println!("  Enabled:            {}", config.notifications.enabled);
            println!(
                "  Admin recipients:   {}",
                config.notifications.admin_recipients.join(", ")
            );
            println!("  Queue capacity:     {}", config.notifications.queue_capacity);
            println!();
            println!("[Alert images]");
            println!("  Output dir:         {}", config.alert_images.output_dir);
            println!(
                "  Extensions:         {}",
                config.alert_images.allowed_extensions.join(", ")
            );
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_not_found() {
        let err = anyhow::Error::from(Error::StolenRecordNotFound(7));
        assert_eq!(exit_status(&err), EXIT_NOT_FOUND);

        let wrapped = Err::<(), _>(Error::BikeNotFound(1))
            .context("showing bike")
            .unwrap_err();
        assert_eq!(exit_status(&wrapped), EXIT_NOT_FOUND);
    }

    #[test]
    fn test_exit_status_storage() {
        let err = anyhow::Error::from(Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        });
        assert_eq!(exit_status(&err), EXIT_STORAGE);
    }

    #[test]
    fn test_exit_status_other() {
        assert_eq!(exit_status(&anyhow::anyhow!("bad report")), 1);
        assert_eq!(exit_status(&anyhow::Error::from(Error::internal("boom"))), 1);
    }
}
