//! Recipe CLI - resolve and install httpd build recipes
//!
//! Usage:
//!   recipe list                          List recipes
//!   recipe info <recipe>                 Show options and dependencies
//!   recipe resolve <recipe> [flags]      Print the resolved build configuration
//!   recipe layout <recipe>               Print the install layout
//!   recipe plist <recipe> [flags]        Print the launchd property list
//!   recipe install <recipe> [flags]      Patch, build and install from a source tree

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use httpd_recipes::build::{BuildStep, ProcessBuildStep};
use httpd_recipes::config::Config;
use httpd_recipes::deps::Necessity;
use httpd_recipes::notice::ConsoleNotices;
use httpd_recipes::options::RequestedOptions;
use httpd_recipes::resolver::{resolve, Host};
use httpd_recipes::util::command_line;
use httpd_recipes::{lifecycle, output, recipes, ResolveError, ResolvedBuildConfiguration};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recipe")]
#[command(about = "Build-configuration resolver for Apache httpd recipes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Install root
    #[arg(short, long, global = true, env = "HTTPD_RECIPES_ROOT")]
    root: Option<PathBuf>,

    /// Override the detected OS version (e.g. 10.12 or sierra)
    #[arg(long, global = true)]
    os_version: Option<String>,

    /// Override command-line tools detection
    #[arg(long, global = true)]
    toolchain: Option<bool>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
struct OptionArgs {
    /// Enable an option (repeatable)
    #[arg(long = "with", value_name = "OPTION")]
    with: Vec<String>,

    /// Disable a default option (repeatable)
    #[arg(long = "without", value_name = "OPTION")]
    without: Vec<String>,

    /// Raw option flags: `with-ldap`, `without-nghttp2`, `mpm-event`
    flags: Vec<String>,
}

impl OptionArgs {
    fn request(&self) -> RequestedOptions {
        let mut request = RequestedOptions::parse_flags(&self.flags);
        request.enable.extend(self.with.iter().cloned());
        request.disable.extend(self.without.iter().cloned());
        request
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available recipes
    List,

    /// Show recipe options and dependencies
    Info {
        /// Recipe name
        recipe: String,
    },

    /// Resolve a recipe and print the build configuration
    Resolve {
        /// Recipe name
        recipe: String,

        #[command(flatten)]
        options: OptionArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the install layout
    Layout {
        /// Recipe name
        recipe: String,
    },

    /// Print the service property list
    Plist {
        /// Recipe name
        recipe: String,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Patch, build and install from an unpacked source tree
    Install {
        /// Recipe name
        recipe: String,

        #[command(flatten)]
        options: OptionArgs,

        /// Unpacked source directory
        #[arg(short, long)]
        source_dir: Option<PathBuf>,

        /// Print the build steps without running anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            let validation = e
                .downcast_ref::<ResolveError>()
                .is_some_and(ResolveError::is_validation);
            ExitCode::from(if validation { 2 } else { 1 })
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.merge(Config {
        root: cli.root.clone(),
        platform: httpd_recipes::config::PlatformOverrides {
            os_version: cli.os_version.clone(),
            toolchain: cli.toolchain,
        },
        ..Default::default()
    });
    if !config.root().is_absolute() {
        anyhow::bail!("Install root must be absolute: {}", config.root().display());
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::List => list_recipes(),
        Commands::Info { recipe } => show_info(recipe),
        Commands::Layout { recipe } => {
            let config = load_config(&cli)?;
            let recipe = recipes::find(recipe)?;
            let layout = httpd_recipes::layout::generate(
                &recipe.layout,
                &config.root(),
                &recipe.package_id(),
            )?;
            if recipe.layout.file_name.is_some() {
                print!("{}", httpd_recipes::layout::render_layout_file(&recipe.layout, &layout));
                println!();
            }
            for (role, path) in &layout.roles {
                println!("{:<16} {}", role.bold(), path.display());
            }
            for (alias, target) in &layout.aliases {
                println!("{:<16} {}", alias.bold(), format!("-> {}", target).dimmed());
            }
            Ok(())
        }
        Commands::Resolve { recipe, options, json } => {
            let config = load_config(&cli)?;
            let resolved = resolve_recipe(&config, recipe, options)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            } else {
                print_resolved(&resolved);
            }
            Ok(())
        }
        Commands::Plist { recipe, options } => {
            let config = load_config(&cli)?;
            let resolved = resolve_recipe(&config, recipe, options)?;
            let service = resolved
                .service
                .as_ref()
                .with_context(|| format!("{} has no service", resolved.package.name))?;
            print!("{}", service.to_plist());
            Ok(())
        }
        Commands::Install {
            recipe,
            options,
            source_dir,
            dry_run,
        } => {
            let config = load_config(&cli)?;
            let resolved = resolve_recipe(&config, recipe, options)?;
            let source_dir = source_dir
                .clone()
                .or_else(|| config.source_dir.clone());

            if *dry_run {
                let source_dir = source_dir.unwrap_or_else(|| PathBuf::from("."));
                print_resolved(&resolved);
                output::info("dry run, nothing is patched, built or installed");
                output::sub_action("build steps");
                let mut step = ProcessBuildStep::new(true);
                step.run(&source_dir, &resolved.build)?;
                step.run(&source_dir, &resolved.install)?;
                return Ok(());
            }

            let source_dir = source_dir.context(
                "No source directory: pass --source-dir or set source_dir in the config",
            )?;
            if !source_dir.is_dir() {
                anyhow::bail!("Source directory not found: {}", source_dir.display());
            }
            let mut step = ProcessBuildStep::new(false);
            lifecycle::install(&resolved, &source_dir, &mut step, &mut ConsoleNotices)
                .with_context(|| format!("Failed to install {}", resolved.package.name))?;
            Ok(())
        }
    }
}

fn resolve_recipe(
    config: &Config,
    name: &str,
    options: &OptionArgs,
) -> Result<ResolvedBuildConfiguration> {
    let recipe = recipes::find(name)?;
    let platform = config
        .platform()
        .context("Cannot determine the OS version; pass --os-version")?;
    let lookup = config.lookup();
    let host = Host {
        platform,
        lookup: &lookup,
        root: config.root(),
        jobs: config.jobs(),
    };
    let resolved = resolve(&recipe, &options.request(), &host, &mut ConsoleNotices)?;
    Ok(resolved)
}

fn print_resolved(resolved: &ResolvedBuildConfiguration) {
    output::action(&format!(
        "{} {} (macOS {})",
        resolved.package.name, resolved.package.version, resolved.platform.os_version
    ));

    output::sub_action("options");
    if resolved.options.is_empty() {
        output::detail("(none)");
    }
    for option in &resolved.options {
        output::detail(option);
    }

    output::sub_action("dependencies");
    for dep in &resolved.dependencies {
        println!("     {:<10} {}", dep.slot, dep.prefix_path.display().dimmed());
    }

    output::sub_action("configure");
    println!("     {}", command_line("./configure", &resolved.configure_args));

    if !resolved.patches.is_empty() {
        output::sub_action("patches");
        for rule in resolved.patches.rules() {
            output::detail(&format!(
                "{}: {:?} -> {:?}",
                rule.target_file, rule.search, rule.replace
            ));
        }
    }

    if let Some(service) = &resolved.service {
        let start = if service.auto_start { "starts at boot" } else { "manual start" };
        output::sub_action(&format!("service {} ({})", service.label, start));
    }

    for caveat in &resolved.caveats {
        output::caveat(caveat);
    }
}

fn list_recipes() -> Result<()> {
    for recipe in recipes::all() {
        let status = format!("{} {}", recipe.version, recipe.description);
        output::list_item(&recipe.name, &status, false);
    }
    Ok(())
}

fn show_info(name: &str) -> Result<()> {
    let recipe = recipes::find(name)?;
    let registry = recipe.registry()?;

    println!("{:<12} {}", "Name:".bold(), recipe.name.bold().cyan());
    println!("{:<12} {}", "Version:".bold(), recipe.version.green());
    println!("{:<12} {}", "Description:".bold(), recipe.description);
    println!("{:<12} {}", "Homepage:".bold(), recipe.homepage);
    if !recipe.conflicts_with.is_empty() {
        println!("{:<12} {}", "Conflicts:".bold(), recipe.conflicts_with.join(", "));
    }
    println!();

    println!("{}", "Options:".bold());
    for option in registry.iter() {
        match &option.deprecated_alias_of {
            Some(target) => println!(
                "  {:<24} {}",
                format!("--with-{}", option.name).dimmed(),
                format!("deprecated, use --with-{}", target).dimmed()
            ),
            None => {
                let flag = if option.default {
                    format!("--without-{}", option.name)
                } else {
                    format!("--with-{}", option.name)
                };
                println!("  {:<24} {}", flag.cyan(), option.description);
            }
        }
    }
    println!();

    println!("{}", "Dependencies:".bold());
    for slot in &recipe.slots {
        let kind = match slot.necessity {
            Necessity::Required => "required",
            Necessity::WhenSelected => "when selected",
            Necessity::Optional => "optional",
        };
        let providers: Vec<String> = slot.candidates.iter().map(|c| c.provider.name()).collect();
        println!(
            "  {:<10} {} {}",
            slot.name,
            providers.join(" | "),
            format!("({})", kind).dimmed()
        );
    }

    Ok(())
}
