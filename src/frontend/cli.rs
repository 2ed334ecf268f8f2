//! `purec` command line
//!
//! Compiles a directory tree of `.pure` files. The directory layout gives
//! the source ids: `<root>/model/domain.pure` becomes `/model/domain.pure`,
//! so its first directory names the repository.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::PureError;
use crate::frontend::config::{CompilerConfig, CONFIG_FILE_NAME};
use crate::incremental::IncrementalCompiler;
use crate::infrastructure::{init_logging, LogConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "purec", version, about = "Compile and validate Pure model sources")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; defaults to the nearest pure.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile every source under a directory and report the first error
    Check {
        root: PathBuf,
        /// Validate every element, not only the affected ones
        #[arg(long)]
        full: bool,
    },
    /// Compile and print the model graph as JSON
    Dump { root: PathBuf },
    /// Write a default pure.toml into a directory
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

pub struct Cli {
    args: CliArgs,
}

impl Cli {
    pub fn new(args: CliArgs) -> Self {
        Self { args }
    }

    pub fn run(&self) -> Result<i32, String> {
        match &self.args.command {
            Command::Check { root, full } => {
                let config = self.load_config(root)?.with_full_validation(*full);
                let (count, result) = compile_tree(root, config)?;
                match result {
                    Ok(_) => {
                        self.print_success(&format!("Compiled {} source{}, no errors found", count, plural(count)));
                        Ok(0)
                    }
                    Err(error) => {
                        self.print_error(&error.to_string());
                        Ok(1)
                    }
                }
            }
            Command::Dump { root } => {
                let config = self.load_config(root)?;
                let (_, result) = compile_tree(root, config)?;
                match result {
                    Ok(compiler) => {
                        let json = compiler.serialize().map_err(|e| e.to_string())?;
                        println!("{}", json);
                        Ok(0)
                    }
                    Err(error) => {
                        self.print_error(&error.to_string());
                        Ok(1)
                    }
                }
            }
            Command::Init { dir } => {
                let path = dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    return Err(format!("{} already exists", path.display()));
                }
                fs::write(&path, CompilerConfig::generate_default())
                    .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                self.print_success(&format!("Created {}", path.display()));
                Ok(0)
            }
        }
    }

    fn load_config(&self, root: &Path) -> Result<CompilerConfig, String> {
        match &self.args.config {
            Some(path) => CompilerConfig::load(path),
            None => Ok(CompilerConfig::discover(root)),
        }
    }

    fn log_config(&self) -> LogConfig {
        let level = match self.args.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };
        LogConfig::new().with_level(level).with_format(self.args.log_format)
    }

    fn print_error(&self, msg: &str) {
        if self.args.no_color {
            eprintln!("{}", msg);
        } else {
            eprintln!("\x1b[31m{}\x1b[0m", msg);
        }
    }

    fn print_success(&self, msg: &str) {
        if self.args.no_color {
            println!("{}", msg);
        } else {
            println!("\x1b[32m{}\x1b[0m", msg);
        }
    }
}

/// Stage every `.pure` file under `root` and compile them as one batch.
pub fn compile_tree(root: &Path, config: CompilerConfig) -> Result<(usize, Result<IncrementalCompiler, PureError>), String> {
    let sources = collect_sources(root)?;
    let mut compiler = IncrementalCompiler::new(config).map_err(|e| e.to_string())?;
    for (id, text) in &sources {
        compiler.create_source(id, text).map_err(|e| e.to_string())?;
    }
    let result = compiler.compile().map(|_| compiler);
    Ok((sources.len(), result))
}

/// `(source id, text)` for every `.pure` file under `root`, in path order.
pub fn collect_sources(root: &Path) -> Result<Vec<(String, String)>, String> {
    if !root.is_dir() {
        return Err(format!("Path not found: {}", root.display()));
    }
    let pattern = format!("{}/**/*.pure", root.display());
    let mut sources = Vec::new();

    for entry in glob::glob(&pattern).map_err(|e| format!("Glob pattern error: {}", e))? {
        let path = entry.map_err(|e| format!("Error accessing path: {}", e))?;
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(root).map_err(|e| e.to_string())?;
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .fold(String::new(), |mut id, part| {
                id.push('/');
                id.push_str(&part);
                id
            });
        let text = fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        sources.push((id, text));
    }

    sources.sort();
    Ok(sources)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Entry point for the `purec` binary; returns the process exit code.
pub fn cli_main() -> Result<i32, String> {
    let cli = Cli::new(CliArgs::parse());
    let _guard = init_logging(cli.log_config());
    cli.run()
}
