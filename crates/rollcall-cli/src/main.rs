use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rollcall_core::{DecisionEngine, FaceDetector, FrameSource, LbpExtractor, TemplateRecognizer, UserId};
use rollcall_store::Database;

mod config;
mod report;
mod session;
mod source;

use config::Config;
use report::{ReportExporter, ReportFormat};
use source::{FullFrameDetector, ImageDirSource};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance logger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user and enroll face samples
    Register {
        /// Unique roll number / ID
        #[arg(long)]
        roll: String,
        /// Full name
        #[arg(long)]
        name: String,
        /// Directory of face images to enroll as samples
        #[arg(long)]
        samples: Option<PathBuf>,
    },
    /// Run an attendance session over a directory of captured frames
    Run {
        /// Directory of frames (stand-in for a webcam feed)
        #[arg(long)]
        frames: PathBuf,
    },
    /// List registered users
    Users,
    /// Show attendance records for a date (defaults to today)
    Today {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate a report file
    Report {
        #[command(subcommand)]
        scope: ReportScope,
    },
    /// Per-user totals of days present
    Stats,
    /// Rebuild face templates from enrolled samples
    Train,
}

#[derive(Subcommand)]
enum ReportScope {
    /// One day's records
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "csv")]
        format: ReportFormat,
    },
    /// Every record
    Full {
        #[arg(long, value_enum, default_value = "csv")]
        format: ReportFormat,
    },
    /// One user's history
    User {
        /// Roll number of the user
        roll: String,
        #[arg(long, value_enum, default_value = "csv")]
        format: ReportFormat,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Register {
            roll,
            name,
            samples,
        } => register(&config, &roll, &name, samples.as_deref()),
        Commands::Run { frames } => run_attendance(&config, &frames),
        Commands::Users => list_users(&config),
        Commands::Today { date } => show_day(&config, date.unwrap_or_else(today)),
        Commands::Report { scope } => generate_report(&config, scope),
        Commands::Stats => show_stats(&config),
        Commands::Train => train(&config),
    }
}

fn register(config: &Config, roll: &str, name: &str, samples: Option<&Path>) -> Result<()> {
    let roll = roll.trim();
    let name = name.trim();
    if !valid_roll_number(roll) {
        bail!("roll number must not be empty");
    }
    if !valid_name(name) {
        bail!("name must be at least 2 characters");
    }

    let mut db = Database::open(&config.db_path)?;
    let user_id = db.add_user(roll, name)?;
    println!("registered {name} (roll {roll}) as user {user_id}");

    match samples {
        Some(dir) => {
            let captured = enroll_samples(&db, user_id, dir, config.sample_count)?;
            let summary = db.rebuild_templates()?;
            println!(
                "enrolled {captured} samples; templates rebuilt for {} users",
                summary.users
            );
        }
        None => {
            println!("no samples directory given; enroll images later and run `rollcall train`");
        }
    }
    Ok(())
}

/// Enroll up to `sample_count` face samples from images in a directory.
fn enroll_samples(
    db: &Database,
    user_id: UserId,
    dir: &Path,
    sample_count: usize,
) -> Result<usize> {
    let mut source = ImageDirSource::open(dir)?;
    let mut detector = FullFrameDetector;
    let extractor = LbpExtractor::default();

    let mut captured = 0;
    while captured < sample_count {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        for face in detector.detect(&frame)? {
            if captured >= sample_count {
                break;
            }
            db.add_face_sample(user_id, &extractor.extract(&frame.crop(&face)))?;
            captured += 1;
        }
    }
    if captured == 0 {
        bail!("no usable face images found in {}", dir.display());
    }
    Ok(captured)
}

fn run_attendance(config: &Config, frames: &Path) -> Result<()> {
    let mut db = Database::open(&config.db_path)?;
    let templates = db.load_templates()?;
    if templates.is_empty() {
        bail!("no trained face templates; register users with samples or run `rollcall train`");
    }
    tracing::info!(
        templates = templates.len(),
        threshold = config.recognition_threshold,
        "starting attendance session"
    );

    let mut source = ImageDirSource::open(frames)?;
    if source.is_empty() {
        bail!("no image frames found in {}", frames.display());
    }
    let mut adapter = TemplateRecognizer::new(FullFrameDetector, templates);
    let mut engine = DecisionEngine::new(config.recognition_threshold);

    let summary = session::run_session(&mut source, &mut adapter, &mut engine, &mut db)?;

    println!(
        "session ended: {} frames, {} marked, {} unknown sightings",
        summary.frames,
        summary.marked.len(),
        summary.unknown_sightings
    );
    for user_id in &summary.marked {
        if let Some(user) = db.user_by_id(*user_id)? {
            println!("  marked: {} ({})", user.name, user.roll_number);
        }
    }
    Ok(())
}

fn list_users(config: &Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let users = db.users()?;
    if users.is_empty() {
        println!("no users registered yet");
        return Ok(());
    }
    println!("{:<6} {:<15} {:<30}", "ID", "Roll Number", "Name");
    for user in users {
        println!("{:<6} {:<15} {:<30}", user.id, user.roll_number, user.name);
    }
    Ok(())
}

fn show_day(config: &Config, date: NaiveDate) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let rows = db.report_rows_for_date(date)?;
    if rows.is_empty() {
        println!("no attendance records for {date}");
        return Ok(());
    }
    println!("attendance for {date}");
    println!("{:<15} {:<25} {:<10} {:<10}", "Roll Number", "Name", "Time", "Status");
    for row in rows {
        println!(
            "{:<15} {:<25} {:<10} {:<10}",
            row.roll_number,
            row.name,
            row.time.format("%H:%M:%S"),
            row.status.as_str()
        );
    }
    Ok(())
}

fn generate_report(config: &Config, scope: ReportScope) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let exporter = ReportExporter::new(&config.reports_dir);

    let (stem, rows, format) = match scope {
        ReportScope::Daily { date, format } => {
            let date = date.unwrap_or_else(today);
            (
                format!("attendance_{date}"),
                db.report_rows_for_date(date)?,
                format,
            )
        }
        ReportScope::Full { format } => (
            format!("attendance_full_{}", timestamp()),
            db.report_rows_all()?,
            format,
        ),
        ReportScope::User { roll, format } => {
            let Some(user) = db.user_by_roll(&roll)? else {
                bail!("no user with roll number {roll}");
            };
            (
                format!("attendance_{}_{}", user.roll_number, timestamp()),
                db.report_rows_for_user(user.id)?,
                format,
            )
        }
    };

    if rows.is_empty() {
        println!("no attendance records to export");
        return Ok(());
    }
    let path = exporter.write(&stem, &rows, format)?;
    println!("report written: {} ({} rows)", path.display(), rows.len());
    Ok(())
}

fn show_stats(config: &Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let users = db.users()?;
    if users.is_empty() {
        println!("no users registered yet");
        return Ok(());
    }
    println!("{:<15} {:<25} {:<12}", "Roll Number", "Name", "Days Present");
    for user in users {
        let days = db.attendance_count(user.id)?;
        println!("{:<15} {:<25} {:<12}", user.roll_number, user.name, days);
    }
    Ok(())
}

fn train(config: &Config) -> Result<()> {
    let mut db = Database::open(&config.db_path)?;
    let summary = db.rebuild_templates()?;
    if summary.users == 0 {
        bail!("no face samples enrolled; register users with --samples first");
    }
    println!(
        "trained templates for {} users from {} samples",
        summary.users, summary.samples
    );
    Ok(())
}

fn valid_roll_number(roll: &str) -> bool {
    !roll.trim().is_empty()
}

fn valid_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_roll_number_validation() {
        assert!(valid_roll_number("R1"));
        assert!(!valid_roll_number(""));
        assert!(!valid_roll_number("   "));
    }

    #[test]
    fn test_name_validation() {
        assert!(valid_name("Al"));
        assert!(valid_name("Alice Johnson"));
        assert!(!valid_name("A"));
        assert!(!valid_name(" x "));
    }

    #[test]
    fn test_enroll_samples_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let img = image::GrayImage::from_fn(32, 32, |x, y| {
                image::Luma([((x + y + i) % 2 * 255) as u8])
            });
            img.save(dir.path().join(format!("face_{i}.png"))).unwrap();
        }

        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("R1", "Alice").unwrap();

        // Capped at sample_count even with more images available.
        let captured = enroll_samples(&db, user, dir.path(), 3).unwrap();
        assert_eq!(captured, 3);
        assert_eq!(db.sample_count(user).unwrap(), 3);
    }

    #[test]
    fn test_enroll_samples_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("R1", "Alice").unwrap();
        assert!(enroll_samples(&db, user, dir.path(), 3).is_err());
    }
}
