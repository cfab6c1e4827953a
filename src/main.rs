use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use depcov::cli::{cmd_attribute, cmd_combined, cmd_graph, load_run_config};
use depcov::config::Overrides;
use depcov::extract::Format;
use depcov::graph::GraphOptions;
use depcov::report::Style;

/// depcov: attribute code coverage to the dependencies that produced it.
#[derive(Parser)]
#[command(name = "depcov", version, about)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by the attribution commands.
#[derive(Args)]
struct RunArgs {
    /// Path to the resolved dependency lockfile (JSON).
    #[arg(long)]
    manifest: PathBuf,

    /// Local Maven repository holding dependency jars (default: ~/.m2/repository).
    #[arg(long)]
    local_repo: Option<PathBuf>,

    /// Compiled project classes directory, scanned for project packages.
    #[arg(long)]
    project_classes: Vec<PathBuf>,

    /// A package owned by the project itself.
    #[arg(long = "project-package")]
    project_packages: Vec<String>,

    /// Keep test-scoped dependencies in the graph.
    #[arg(long)]
    include_test_deps: bool,

    /// Output style.
    #[arg(long, value_enum)]
    style: Option<Style>,

    /// Config file (default: ./.depcov.json if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            local_repo: self.local_repo.clone(),
            project_classes: self.project_classes.clone(),
            project_packages: self.project_packages.clone(),
            include_test_dependencies: self.include_test_deps,
            style: self.style,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Attribute one coverage report to the project's dependencies.
    Attribute {
        #[command(flatten)]
        run: RunArgs,

        /// The coverage report (JaCoCo index.html or jacoco.xml).
        #[arg(long)]
        report: PathBuf,

        /// Override format detection (html, xml).
        #[arg(long)]
        format: Option<String>,
    },

    /// Attribute an XML report and an HTML report in one run.
    Combined {
        #[command(flatten)]
        run: RunArgs,

        /// JaCoCo XML report.
        #[arg(long)]
        xml_report: PathBuf,

        /// JaCoCo HTML index.
        #[arg(long)]
        html_report: PathBuf,
    },

    /// Print the dependency graph with each node's output paths.
    Graph {
        /// Path to the resolved dependency lockfile (JSON).
        #[arg(long)]
        manifest: PathBuf,

        /// Keep test-scoped dependencies in the graph.
        #[arg(long)]
        include_test_deps: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "depcov=debug" } else { "depcov=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = match cli.command {
        Commands::Attribute {
            run,
            report,
            format,
        } => {
            let format = format.as_deref().map(str::parse::<Format>).transpose()?;
            let config =
                load_run_config(run.manifest.clone(), run.config.as_deref(), run.overrides())?;
            cmd_attribute(&config, &report, format)?
        }
        Commands::Combined {
            run,
            xml_report,
            html_report,
        } => {
            let config =
                load_run_config(run.manifest.clone(), run.config.as_deref(), run.overrides())?;
            cmd_combined(&config, &xml_report, &html_report)?
        }
        Commands::Graph {
            manifest,
            include_test_deps,
        } => {
            let options = GraphOptions {
                skip_test_dependencies: !include_test_deps,
            };
            cmd_graph(&manifest, &options)?
        }
    };
    print!("{output}");
    Ok(())
}
