use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use excel_merger::domain::errors::ErrorCode;
use excel_merger::domain::presets::Preset;
use excel_merger::infra::logging::{init_logging, LogConfig};
use excel_merger::infra::profile::json_store::{read_profile_file, JsonProfileStore};
use excel_merger::infra::xlsx::reader::CalamineOpener;
use excel_merger::infra::xlsx::writer::XlsxSink;
use excel_merger::platform::desktop::worker::spawn_merge;
use excel_merger::usecase::ports::profile_store::{ProfileError, ProfileStore};
use excel_merger::usecase::ports::spreadsheet::{SheetIoError, SourceOpener, SpreadsheetSink};
use excel_merger::usecase::services::analyze_service::BaseAnalyzer;
use excel_merger::{
    ConfigError, MergeError, MergeRequest, MergeResult, Profile, ProfileSettings,
    SheetMergeConfig,
};

const PROGRESS_CAPACITY: usize = 64;

/// Merge sheets of several Excel workbooks into one.
#[derive(Parser)]
#[command(name = "excel-merger", author, version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write a JSON log file to the per-user data dir
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge the selected sheets of the base file and additional files
    Merge(MergeArgs),
    /// List sheets of a workbook
    Sheets { file: PathBuf },
    /// Show the header titles of a sheet
    Headers {
        file: PathBuf,
        sheet: String,
        #[arg(long, default_value_t = 1)]
        header_row: usize,
    },
    /// Print the first data rows of a sheet as CSV
    Preview {
        file: PathBuf,
        sheet: String,
        #[arg(long, default_value_t = 1)]
        header_row: usize,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Manage saved profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args)]
struct MergeArgs {
    /// Workbook whose header rows are copied to the output
    #[arg(long)]
    base: PathBuf,

    /// Additional workbook, repeatable
    #[arg(long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Saved profile name
    #[arg(long, conflicts_with = "profile_file")]
    profile: Option<String>,

    /// Profile JSON file
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Sheet to merge as NAME or NAME:HEADER_ROW, repeatable
    #[arg(long = "sheet", value_name = "NAME[:ROW]")]
    sheets: Vec<String>,

    #[command(flatten)]
    preset: PresetArgs,

    /// Header text marking the key column
    #[arg(long)]
    key_marker: Option<String>,

    /// Output workbook
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct PresetArgs {
    /// Preset to apply on the base file sheets (marketplace)
    #[arg(long)]
    preset: Option<String>,

    /// Brand kept by the preset's template filter, repeatable
    #[arg(long = "brand", value_name = "VALUE", requires = "preset")]
    brands: Vec<String>,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List saved profiles
    List,
    /// Print a profile as JSON
    Show { name: String },
    /// Delete a profile
    Delete { name: String },
    /// Copy a profile file into the profile directory
    Import { path: PathBuf },
    /// Copy a profile into a directory
    Export { name: String, dir: PathBuf },
    /// Create a profile from a base file
    Init {
        name: String,
        #[arg(long)]
        base: PathBuf,
        #[command(flatten)]
        preset: PresetArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.to_string(),
        console: cli.verbose,
        file_dir: None,
    };
    if cli.log_file {
        match log_config.clone().with_default_file_dir() {
            Ok(config) => log_config = config,
            Err(err) => eprintln!("warning: {err:#}"),
        }
    }
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("warning: {err:#}");
            None
        }
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<MergeError>() {
            Some(err.code())
        } else if let Some(err) = cause.downcast_ref::<SheetIoError>() {
            Some(err.code())
        } else if let Some(err) = cause.downcast_ref::<ProfileError>() {
            Some(err.code())
        } else {
            cause.downcast_ref::<ConfigError>().map(ConfigError::code)
        }
    })
}

fn report_error(err: &anyhow::Error) {
    match error_code(err) {
        Some(code) => {
            eprintln!("[{}] {err:#}", code.code());
            eprintln!("{}", code.user_message());
        }
        None => eprintln!("error: {err:#}"),
    }
}

fn run(command: Command) -> Result<()> {
    let opener: Arc<dyn SourceOpener> = Arc::new(CalamineOpener::new());
    let analyzer = BaseAnalyzer::new(Arc::clone(&opener));

    match command {
        Command::Merge(args) => run_merge(opener, &analyzer, args),
        Command::Sheets { file } => {
            for name in analyzer.sheet_names(&file)? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Headers {
            file,
            sheet,
            header_row,
        } => {
            let header = analyzer.headers(&file, &sheet, header_row)?;
            for (idx, title) in header.iter().enumerate() {
                println!("{}\t{title}", idx + 1);
            }
            Ok(())
        }
        Command::Preview {
            file,
            sheet,
            header_row,
            rows,
        } => {
            let (header, data) = analyzer.preview(&file, &sheet, header_row, rows)?;
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(io::stdout());
            writer
                .write_record(&header)
                .context("failed to write csv header")?;
            for row in &data {
                writer.write_record(row).context("failed to write csv row")?;
            }
            writer.flush().context("failed to flush csv output")?;
            Ok(())
        }
        Command::Profile(command) => run_profile(&analyzer, command),
    }
}

fn parse_sheet_spec(spec: &str) -> Result<SheetMergeConfig> {
    let (name, header_row) = match spec.rsplit_once(':') {
        Some((name, row)) => {
            let row = row
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid header row in sheet spec: {spec}"))?;
            (name, row)
        }
        None => (spec, 1),
    };
    let config = SheetMergeConfig::new(name.trim(), header_row);
    config.validate()?;
    Ok(config)
}

fn preset_configs(
    analyzer: &BaseAnalyzer,
    base: &Path,
    args: &PresetArgs,
) -> Result<Option<BTreeMap<String, SheetMergeConfig>>> {
    let Some(name) = &args.preset else {
        return Ok(None);
    };
    let preset = Preset::by_name(name, args.brands.clone())
        .ok_or_else(|| anyhow!("unknown preset: {name}"))?;

    let mut configs = analyzer.default_sheet_configs(base)?;
    analyzer.apply_preset(base, &mut configs, &preset)?;
    Ok(Some(configs))
}

fn run_merge(
    opener: Arc<dyn SourceOpener>,
    analyzer: &BaseAnalyzer,
    args: MergeArgs,
) -> Result<()> {
    let (mut configs, settings) = if let Some(name) = &args.profile {
        let profile = JsonProfileStore::open_default()?.load(name)?;
        (profile.sheet_configs(), profile.settings)
    } else if let Some(path) = &args.profile_file {
        let profile = read_profile_file(path)?;
        (profile.sheet_configs(), profile.settings)
    } else {
        (BTreeMap::new(), ProfileSettings::default())
    };

    if let Some(preset) = preset_configs(analyzer, &args.base, &args.preset)? {
        configs.extend(preset);
    }
    for spec in &args.sheets {
        let config = parse_sheet_spec(spec)?;
        configs.insert(config.sheet_name.clone(), config);
    }
    if configs.is_empty() {
        bail!(MergeError::NoEnabledSheets);
    }

    let mut request = MergeRequest::new(args.base.clone(), args.files.clone());
    request.sheet_configs = configs;
    if let Some(marker) = &args.key_marker {
        request = request.with_key_marker(marker.clone());
    }

    let job = spawn_merge(opener, request, XlsxSink::new(), PROGRESS_CAPACITY)?;
    for update in job.progress().iter() {
        eprintln!("[{}/{}] {}", update.current, update.total, update.message);
    }
    let (result, mut sink) = job.wait()?;

    sink.save(&args.output)?;
    info!(output = %args.output.display(), "merge output saved");

    print_summary(&result, &args.output, &settings);
    Ok(())
}

fn print_summary(result: &MergeResult, output: &Path, settings: &ProfileSettings) {
    println!("saved {}", output.display());
    println!(
        "files: {}, sheets: {}, rows: {}, took {:.2?}",
        result.processed_files, result.processed_sheets, result.total_rows, result.duration
    );
    for (sheet, stat) in &result.sheet_stats {
        println!(
            "  {sheet}: {} rows from {} files",
            stat.rows_merged, stat.files_count
        );
    }
    if settings.show_warnings && !result.warnings.is_empty() {
        println!("warnings:");
        for warning in &result.warnings {
            println!("  {warning}");
        }
    }
}

fn run_profile(analyzer: &BaseAnalyzer, command: ProfileCommand) -> Result<()> {
    let store = JsonProfileStore::open_default()?;

    match command {
        ProfileCommand::List => {
            for info in store.list()? {
                if info.is_corrupt {
                    println!("{}\t(corrupt)", info.file_name);
                    continue;
                }
                let updated = info
                    .updated_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{} sheets\t{updated}",
                    info.file_name, info.name, info.base_file, info.sheets_count
                );
            }
        }
        ProfileCommand::Show { name } => {
            let profile = store.load(&name)?;
            let json =
                serde_json::to_string_pretty(&profile).context("failed to serialize profile")?;
            println!("{json}");
        }
        ProfileCommand::Delete { name } => {
            store.delete(&name)?;
            println!("deleted {name}");
        }
        ProfileCommand::Import { path } => {
            let profile = store.import(&path)?;
            println!("imported {}", profile.profile_name);
        }
        ProfileCommand::Export { name, dir } => {
            let dest = store.export(&name, &dir)?;
            println!("exported to {}", dest.display());
        }
        ProfileCommand::Init { name, base, preset } => {
            let configs = match preset_configs(analyzer, &base, &preset)? {
                Some(configs) => configs,
                None => analyzer.default_sheet_configs(&base)?,
            };

            let mut profile = Profile::new(name.clone());
            profile.base_file_name = base
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("base path has no file name: {}", base.display()))?;
            for config in configs.into_values() {
                profile.add_sheet(config);
            }

            let path = store.save(&mut profile, &name)?;
            println!("saved {}", path.display());
        }
    }
    Ok(())
}
