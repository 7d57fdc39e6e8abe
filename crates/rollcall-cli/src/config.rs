use std::path::PathBuf;

/// Application configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory report files are written to.
    pub reports_dir: PathBuf,
    /// Distance threshold for a positive identification (0–100, lower is
    /// stricter; a score exactly at the threshold counts as identified).
    pub recognition_threshold: f32,
    /// Face samples captured per registration.
    pub sample_count: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let reports_dir = std::env::var("ROLLCALL_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("attendance_reports"));

        Self {
            db_path,
            reports_dir,
            // Tunables, not validated constants: override per deployment.
            recognition_threshold: env_f32("ROLLCALL_RECOGNITION_THRESHOLD", 70.0),
            sample_count: env_usize("ROLLCALL_SAMPLE_COUNT", 30),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
