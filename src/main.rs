use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

mod calculus;
mod calendar;
mod config;
mod error;
mod extraction;
mod logging;
mod models;
mod report;
mod state;
mod store;

use crate::calendar::WorkingCalendar;
use crate::config::TrackerConfig;
use crate::extraction::{DocumentKind, Extraction, ImagePayload, SidecarService};
use crate::state::{AppState, SettingsUpdate, SubjectUpdate};
use crate::store::{FileStore, KeyValueStore, MemoryStore};

#[derive(Parser)]
#[command(name = "attendance-tracker", version)]
#[command(about = "Per-subject attendance tracker with goal projections", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the persisted records (falls back to ATTENDANCE_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Evaluate as of this date instead of today.
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Run the command without writing any changes.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-subject and overall attendance
    Status,
    /// Write a markdown report
    Report {
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
        /// Absence screenshots to include in the leave analysis
        #[arg(long, num_args = 1..)]
        leaves: Vec<PathBuf>,
    },
    /// Add a subject using the individual goal unless one is given
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        attended: Option<u32>,
        #[arg(long)]
        total: Option<u32>,
        #[arg(long)]
        goal: Option<f64>,
    },
    /// Edit fields of an existing subject
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        attended: Option<u32>,
        #[arg(long)]
        total: Option<u32>,
        #[arg(long)]
        goal: Option<f64>,
    },
    /// Delete a subject
    Remove { id: String },
    /// Change goals or the semester end date
    Settings {
        #[arg(long)]
        individual_goal: Option<f64>,
        #[arg(long)]
        aggregate_goal: Option<f64>,
        #[arg(long)]
        semester_end: Option<NaiveDate>,
    },
    /// Export subjects, settings and timetable as JSON
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace all data with a previously exported JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Append subjects from a CSV file (name,attended,total[,goal])
    ImportCsv {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Reset subjects, settings and timetable to defaults
    Clear,
    /// Apply analysis results for screenshots (responses captured as <stem>.json)
    Analyze {
        #[arg(long, value_enum)]
        kind: DocumentKind,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Count working days until a date (defaults to the semester end)
    Calendar {
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Persist the dark mode preference
    DarkMode {
        #[arg(value_enum)]
        mode: Toggle,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TrackerConfig::resolve(cli.data_dir, cli.today);
    let calendar = WorkingCalendar::new(config.today);
    let mut file_store = FileStore::new(&config.data_dir);
    let mut state = AppState::load(&file_store, config.today)
        .with_context(|| format!("failed to load data from {}", config.data_dir.display()))?;

    let changed = execute(cli.command, &mut state, &calendar)?;

    if changed {
        let mut scratch = MemoryStore::default();
        let store: &mut dyn KeyValueStore = if cli.dry_run {
            &mut scratch
        } else {
            &mut file_store
        };
        state.save(store).context("failed to save attendance data")?;
        if cli.dry_run {
            println!("Dry run: changes not saved.");
        }
    }

    Ok(())
}

/// Apply one command; returns whether the state changed.
fn execute(
    command: Commands,
    state: &mut AppState,
    calendar: &WorkingCalendar,
) -> anyhow::Result<bool> {
    match command {
        Commands::Status => {
            print_status(state, calendar);
            Ok(false)
        }
        Commands::Report { out, leaves } => {
            let tally =
                (!leaves.is_empty()).then(|| extraction::analyze_leaves(&SidecarService, &leaves));
            let report = report::build_report(state, calendar, tally.as_ref());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
            Ok(false)
        }
        Commands::Add {
            name,
            attended,
            total,
            goal,
        } => {
            let id = state.add_subject(name).id.clone();
            let subject = state.update_subject(
                &id,
                SubjectUpdate {
                    name: None,
                    attended,
                    total,
                    goal,
                },
            )?;
            println!("Added {} ({}).", subject.name, subject.id);
            Ok(true)
        }
        Commands::Update {
            id,
            name,
            attended,
            total,
            goal,
        } => {
            let subject = state.update_subject(
                &id,
                SubjectUpdate {
                    name,
                    attended,
                    total,
                    goal,
                },
            )?;
            println!(
                "Updated {}: {}/{} goal {}%.",
                subject.name, subject.attended, subject.total, subject.goal
            );
            Ok(true)
        }
        Commands::Remove { id } => {
            let removed = state.delete_subject(&id)?;
            println!("Removed {}.", removed.name);
            Ok(true)
        }
        Commands::Settings {
            individual_goal,
            aggregate_goal,
            semester_end,
        } => {
            state.update_settings(SettingsUpdate {
                individual_goal,
                aggregate_goal,
                semester_end_date: semester_end,
            })?;
            let settings = &state.data.settings;
            println!(
                "Individual goal {}%, aggregate goal {}%, semester ends {}.",
                settings.individual_goal, settings.aggregate_goal, settings.semester_end_date
            );
            Ok(true)
        }
        Commands::Export { out } => {
            let json = state.export_json()?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported {} subjects to {}.", state.subjects().len(), out.display());
            Ok(false)
        }
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            state
                .import_json(&text)
                .with_context(|| format!("invalid file format: {}", file.display()))?;
            println!("Imported {} subjects.", state.subjects().len());
            Ok(true)
        }
        Commands::ImportCsv { csv } => {
            let reader = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let inserted = state.import_csv(reader)?;
            println!("Inserted {inserted} subjects from {}.", csv.display());
            Ok(true)
        }
        Commands::Clear => {
            state.clear(calendar.today());
            println!("All data cleared.");
            Ok(true)
        }
        Commands::Analyze { kind, images } => analyze(kind, &images, state),
        Commands::Calendar { until } => {
            let end = until.unwrap_or(state.data.settings.semester_end_date);
            let remaining = calendar.remaining_working_days(end);
            println!(
                "{remaining} working days from {} through {end}.",
                calendar.today()
            );
            let holidays: Vec<String> = calendar.holidays().iter().map(|d| d.to_string()).collect();
            println!("Holidays: {}", holidays.join(", "));
            println!("Sundays and third Saturdays are also off.");
            Ok(false)
        }
        Commands::DarkMode { mode } => {
            state.dark_mode = matches!(mode, Toggle::On);
            println!("Dark mode {}.", if state.dark_mode { "on" } else { "off" });
            Ok(true)
        }
    }
}

fn analyze(kind: DocumentKind, images: &[PathBuf], state: &mut AppState) -> anyhow::Result<bool> {
    if kind == DocumentKind::Leaves {
        let tally = extraction::analyze_leaves(&SidecarService, images);
        println!(
            "Leaves across {} screenshots: {} co-curricular, {} medical.",
            images.len(),
            tally.cocurricular,
            tally.medical
        );
        if let Some(count) = tally.attendance {
            println!("Reported attendance: {}/{}.", count.attended, count.total);
        }
        match calculus::potential_attendance(state.subjects(), &tally) {
            Some(p) => println!(
                "If approved: {:.1}% -> {:.1}% (+{:.1} points).",
                p.current, p.potential, p.improvement
            ),
            None => println!("Add subjects to see the potential impact."),
        }
        return Ok(false);
    }

    let mut changed = false;
    for path in images {
        let image = ImagePayload::from_path(path)?;
        let result = extraction::analyze_document(&SidecarService, kind, &image)
            .with_context(|| format!("failed to analyze {}", path.display()))?;
        match result {
            Extraction::Timetable(timetable) => {
                println!("Timetable with {} days loaded.", timetable.schedule.len());
                state.set_timetable(timetable);
                changed = true;
            }
            Extraction::Attendance(attendance) if attendance.subjects.is_empty() => {
                println!(
                    "No subjects found in {}. Try a clearer screenshot.",
                    path.display()
                );
            }
            Extraction::Attendance(attendance) => {
                let added = state.import_extracted_subjects(&attendance);
                println!("Added {added} subjects from {}.", path.display());
                changed = true;
            }
            Extraction::Leaves(_) => bail!("unexpected leave extraction for {kind}"),
        }
    }
    Ok(changed)
}

fn print_status(state: &AppState, calendar: &WorkingCalendar) {
    let settings = &state.data.settings;
    let summaries =
        report::summarize_subjects(state.subjects(), calendar, settings.semester_end_date);

    if summaries.is_empty() {
        println!("No subjects tracked yet.");
        return;
    }

    for summary in summaries.iter() {
        println!(
            "- {} [{}] {}/{} ({:.1}%) goal {}%: {} | can miss {}",
            summary.name,
            summary.id,
            summary.attended,
            summary.total,
            summary.percentage,
            summary.goal,
            report::subject_message(&summary.projection),
            summary.bunking_buffer
        );
    }

    let aggregate = state.aggregate();
    let projection = calculus::project_goal(
        aggregate.attended,
        aggregate.total,
        settings.aggregate_goal,
        calendar,
        settings.semester_end_date,
    );
    println!(
        "Overall {}/{} ({:.1}%) goal {}%: {}",
        aggregate.attended,
        aggregate.total,
        aggregate.percentage,
        settings.aggregate_goal,
        report::aggregate_message(&projection)
    );
}
