//! Moodlet CLI - Terminal Moodle Client
//!
//! Browse enrolled courses interactively, or list and download course
//! materials from scripts.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use moodlet_core::{courses, materials, Course, Credentials, Material, MaterialKind, Session};
use moodlet_tui::config::Config;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const PASSWORD_ENV: &str = "MOODLET_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "moodlet")]
#[command(author, version, about = "A terminal client for Moodle course materials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Moodle site root, overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Moodle username; the password is read from MOODLET_PASSWORD
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Output format: plain, json
    #[arg(short, long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive client
    Browse,

    /// List enrolled courses
    Courses,

    /// List the materials of a course
    Materials {
        /// Numeric course id
        course_id: String,
    },

    /// List the contents of a folder
    Folder {
        /// Folder URL, absolute or relative to the site root
        url: String,
    },

    /// List the private files area
    Files,

    /// Download a resource through the logged-in session
    Download {
        /// Resource URL, absolute or relative to the site root
        url: String,

        /// Name used to derive the saved filename
        #[arg(long)]
        name: Option<String>,

        /// Target directory or file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a saved Moodle page from stdin
    Parse {
        /// Page type: course, folder, courses, files
        kind: PageKind,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Plain,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" | "txt" => Ok(OutputFormat::Plain),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PageKind {
    Course,
    Folder,
    Courses,
    Files,
}

impl std::str::FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "course" | "materials" => Ok(PageKind::Course),
            "folder" => Ok(PageKind::Folder),
            "courses" | "dashboard" => Ok(PageKind::Courses),
            "files" => Ok(PageKind::Files),
            _ => Err(format!("Unknown page type: {}", s)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let browsing = matches!(cli.command, None | Some(Commands::Browse));

    // Set up logging
    if cli.verbose {
        init_logging(browsing)?;
    }

    let mut config = Config::load()?;
    if let Some(base_url) = &cli.base_url {
        config.apply("base_url", base_url)?;
    }

    match cli.command {
        None | Some(Commands::Browse) => {
            moodlet_tui::run(config, cli.username).await?;
        }
        Some(Commands::Courses) => {
            let session = login(&config, cli.username).await?;
            let courses = session.list_courses().await?;
            print_courses(&courses, cli.format)?;
        }
        Some(Commands::Materials { course_id }) => {
            let session = login(&config, cli.username).await?;
            let materials = session.course_materials(&course_id).await?;
            print_materials(&materials, cli.format)?;
        }
        Some(Commands::Folder { url }) => {
            let session = login(&config, cli.username).await?;
            let materials = session.folder_contents(&url).await?;
            print_materials(&materials, cli.format)?;
        }
        Some(Commands::Files) => {
            let session = login(&config, cli.username).await?;
            let files = session.private_files().await?;
            print_materials(&files, cli.format)?;
        }
        Some(Commands::Download { url, name, output }) => {
            let session = login(&config, cli.username).await?;
            let target = match output {
                Some(path) => Target::from_arg(path),
                None => Target::Dir(config.download_dir()),
            };
            run_download(&session, &url, name, target).await?;
        }
        Some(Commands::Parse { kind }) => {
            run_parse(kind, cli.format)?;
        }
    }

    Ok(())
}

/// The TUI owns the terminal, so its logs go to a file
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match Config::log_path().filter(|_| to_file) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
    Ok(())
}

async fn login(config: &Config, username: Option<String>) -> Result<Session> {
    let Some(username) = username.or_else(|| config.session.last_username.clone()) else {
        bail!("No username given; pass --username or set one in the config file");
    };
    let password = std::env::var(PASSWORD_ENV)
        .with_context(|| format!("Set {} to log in as {}", PASSWORD_ENV, username))?;

    let session = Session::with_config(config.to_client_config())?;
    session.login(&Credentials::new(username, password)).await?;
    Ok(session)
}

/// Name for a resource given only its URL
fn name_from_url(url: &str) -> String {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.ends_with(".php"))
        .unwrap_or("download")
        .to_string()
}

/// Where a download is written
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// Under the suggested filename
    Dir(PathBuf),
    File(PathBuf),
}

impl Target {
    fn from_arg(path: PathBuf) -> Self {
        if path.is_dir() || path.to_string_lossy().ends_with('/') {
            Target::Dir(path)
        } else {
            Target::File(path)
        }
    }
}

async fn run_download(
    session: &Session,
    url: &str,
    name: Option<String>,
    target: Target,
) -> Result<()> {
    let name = name.unwrap_or_else(|| name_from_url(url));
    let material = Material::new(name, url, MaterialKind::File);
    let download = session.download(&material).await?;

    let path = match target {
        Target::Dir(dir) => download.save_to(&dir).await?,
        Target::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &download.bytes).await?;
            path
        }
    };

    info!("Saved {} from {}", path.display(), download.url);
    println!("{}", path.display());
    Ok(())
}

fn run_parse(kind: PageKind, format: OutputFormat) -> Result<()> {
    let mut html = String::new();
    io::stdin().read_to_string(&mut html)?;

    match kind {
        PageKind::Course => print_materials(&materials::parse_materials(&html), format),
        PageKind::Folder => print_materials(&materials::parse_folder(&html), format),
        PageKind::Files => print_materials(&materials::parse_private_files(&html), format),
        PageKind::Courses => print_courses(&courses::parse_courses(&html), format),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_courses(courses: &[Course], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&courses)?,
        OutputFormat::Plain => {
            for course in courses {
                println!("{}\t{}", course.id, course.name);
            }
        }
    }
    Ok(())
}

fn print_materials(materials: &[Material], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&materials)?,
        OutputFormat::Plain => {
            for material in materials {
                println!("{}\t{}\t{}", material.kind, material.name, material.url);
            }
        }
    }
    Ok(())
}
