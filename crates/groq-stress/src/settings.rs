use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser};
use groq_client::ModelId;

/// Command line settings for a stress run.
#[derive(Parser, Debug, Clone)]
#[command(name = "groq-stress", version, about = "Rate-limited stress test for the Groq API")]
pub struct Settings {
    /// Requests dispatched per second by each load test.
    #[arg(short, long, default_value_t = 10)]
    pub rate: u32,
    /// How long each load test dispatches requests (`5s`, `500ms`, `2m`, or plain seconds).
    #[arg(short, long, default_value = "5s", value_parser = parse_duration)]
    pub duration: Duration,
    /// Per-request HTTP timeout.
    #[arg(short, long, default_value = "3s", value_parser = parse_duration)]
    pub timeout: Duration,
    /// Optional cap on concurrently running requests per load test.
    #[arg(long)]
    pub max_in_flight: Option<usize>,
    /// API base URL.
    #[arg(long, default_value = groq_client::config::DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Model used by the completion and retrieve cases.
    #[arg(short, long, default_value = ModelId::LLAMA3_70B)]
    pub model: String,
    /// Print one JSON object per result instead of text blocks.
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub log: LogSettings,
}

/// Logging flags; each falls back to an environment variable.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Log filter (`info`, `debug`, `groq_client=trace,info`); `RUST_LOG` is used when unset.
    #[arg(long = "log-level", env = "GROQ_STRESS_LOG_LEVEL")]
    pub level: Option<String>,
    /// Write logs as JSON lines to this file instead of stderr.
    #[arg(long = "log-json", env = "GROQ_STRESS_JSON_LOG_PATH")]
    pub json_path: Option<PathBuf>,
    /// Disable logging entirely.
    #[arg(long = "no-log", env = "GROQ_STRESS_NO_LOG")]
    pub disabled: bool,
}

impl Settings {
    /// Loads `.env` from the working directory, then parses the process
    /// arguments, so variables from the file feed the env fallbacks.
    pub fn load() -> Self {
        Self::load_from(None, std::env::args_os())
    }

    /// Like [`Settings::load`] with an explicit env file and arguments.
    /// Variables already set in the process win over the file.
    pub fn load_from<I, T>(env_file: Option<&Path>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let _ = match env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        Self::parse_from(args)
    }

    pub fn model_id(&self) -> ModelId {
        ModelId::new(self.model.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::parse_from(["groq-stress"])
    }
}

/// Parses `500ms`, `5s`, `2m`, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (number, unit) = match raw.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration `{raw}`"))?;
    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        other => return Err(format!("unknown duration unit `{other}` in `{raw}`")),
    };
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration `{raw}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("3"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn defaults_reproduce_fixed_run() {
        let settings = Settings::default();
        assert_eq!(settings.rate, 10);
        assert_eq!(settings.duration, Duration::from_secs(5));
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.max_in_flight, None);
        assert_eq!(settings.model_id(), ModelId::llama3_70b());
        assert!(!settings.json);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::parse_from([
            "groq-stress",
            "--rate",
            "25",
            "--duration",
            "250ms",
            "--max-in-flight",
            "8",
            "--model",
            ModelId::GEMMA_7B,
            "--json",
        ]);
        assert_eq!(settings.rate, 25);
        assert_eq!(settings.duration, Duration::from_millis(250));
        assert_eq!(settings.max_in_flight, Some(8));
        assert_eq!(settings.model, ModelId::GEMMA_7B);
        assert!(settings.json);
    }

    #[test]
    fn env_file_feeds_log_settings() {
        let path = std::env::temp_dir().join(format!("groq-stress-{}.env", std::process::id()));
        std::fs::write(&path, "GROQ_STRESS_JSON_LOG_PATH=from-env-file/stress.jsonl\n")
            .expect("write env file");
        let settings = Settings::load_from(Some(&path), ["groq-stress"]);
        let _ = std::fs::remove_file(&path);
        assert_eq!(
            settings.log.json_path,
            Some(PathBuf::from("from-env-file/stress.jsonl"))
        );
    }

    #[test]
    fn log_flags_parse() {
        let settings = Settings::parse_from([
            "groq-stress",
            "--log-level",
            "debug",
            "--log-json",
            "logs/stress.jsonl",
            "--no-log",
        ]);
        assert_eq!(settings.log.level.as_deref(), Some("debug"));
        assert_eq!(settings.log.json_path, Some(PathBuf::from("logs/stress.jsonl")));
        assert!(settings.log.disabled);
    }
}
