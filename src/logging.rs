use std::{env, fmt::Display};

use colored::Colorize;
use log::{Level, LevelFilter};

/// External crates only log warnings and errors
const EXTERNAL_LEVEL: LevelFilter = LevelFilter::Warn;

pub fn init_logger() {
    let local_level = local_level(env::var("PARLOR_DEBUG").ok().as_deref());

    fern::Dispatch::new()
        .format(|out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}{}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S%.3f").to_string().bright_black(),
                target,
                module_hint(record.level(), record.target()),
                message
            ))
        })
        .filter(move |meta| {
            let target = Target::from_str(meta.target());

            if target.is_local() {
                meta.level() <= local_level
            } else {
                meta.level() <= EXTERNAL_LEVEL
            }
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

/// The most verbose level parlor's own crates log at.
/// `PARLOR_DEBUG` enables debug lines, or trace lines when set to "trace".
fn local_level(debug: Option<&str>) -> LevelFilter {
    match debug.map(str::trim) {
        None => LevelFilter::Info,
        Some(value) if value.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        Some(_) => LevelFilter::Debug,
    }
}

/// Debug lines come from deep inside a crate, so they name the module they came from
fn module_hint(level: Level, target: &str) -> String {
    if level < Level::Debug {
        return String::new();
    }

    match target.split_once("::") {
        Some((_, module)) => format!("{} ", format!("[{}]", module).as_str().bright_black()),
        None => String::new(),
    }
}

enum Target {
    External(String),
    Server,
    Collab,
    Mesh,
    Core,
    Main,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let module = str.split("::").next().unwrap_or_default();

        match module {
            "parlor" => Self::Main,
            "parlor_core" => Self::Core,
            "parlor_server" => Self::Server,
            "parlor_collab" => Self::Collab,
            "parlor_mesh" => Self::Mesh,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
            Target::Mesh => "MESH".bright_cyan(),
            Target::Core => "CORE".blue(),
            Target::Main => "PARLOR".bright_white(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".bright_black().to_string(),
    }
}
