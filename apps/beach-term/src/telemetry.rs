pub mod logging {
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::str::FromStr;
    use std::sync::OnceLock;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn as_str(self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    impl FromStr for LogLevel {
        type Err = InitError;

        fn from_str(raw: &str) -> Result<Self, Self::Err> {
            match raw.trim().to_ascii_lowercase().as_str() {
                "error" => Ok(LogLevel::Error),
                "warn" | "warning" => Ok(LogLevel::Warn),
                "info" => Ok(LogLevel::Info),
                "debug" => Ok(LogLevel::Debug),
                "trace" => Ok(LogLevel::Trace),
                other => Err(InitError::Configure(format!("unknown log level '{other}'"))),
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    impl LogConfig {
        /// `BEACH_TERM_LOG_LEVEL` and `BEACH_TERM_LOG_FILE`; unknown levels fall
        /// back to the default.
        pub fn from_env() -> Self {
            let level = std::env::var("BEACH_TERM_LOG_LEVEL")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default();
            let file = std::env::var("BEACH_TERM_LOG_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from);
            Self { level, file }
        }
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    static INIT: OnceLock<()> = OnceLock::new();
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Later calls are no-ops.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if INIT.get().is_some() {
            return Ok(());
        }

        inner_init(config)?;
        INIT.set(()).ok();
        Ok(())
    }

    fn inner_init(config: &LogConfig) -> Result<(), InitError> {
        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(build_env_filter(config.level))
            .with_level(true)
            .with_target(config.level >= LogLevel::Debug)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| InitError::Configure(err.to_string()))?;

        let _ = GUARD.set(guard);
        Ok(())
    }

    fn build_env_filter(level: LogLevel) -> EnvFilter {
        if let Ok(filter) = std::env::var("BEACH_TERM_LOG_FILTER") {
            return EnvFilter::new(filter);
        }
        EnvFilter::new(default_filter_for(level))
    }

    fn default_filter_for(level: LogLevel) -> String {
        match level {
            // Session chatter stays ours; dependencies stay at info.
            LogLevel::Debug | LogLevel::Trace => {
                format!("info,beach_term={},transport_bus={}", level.as_str(), level.as_str())
            }
            _ => level.as_str().to_string(),
        }
    }

}
