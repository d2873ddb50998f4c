use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use package_catalog::catalog::{
    CatalogSnapshot, CatalogSynchronizer, DiskCache, PackageRecord, SyncOptions,
};
use package_catalog::config::{self, CatalogConfig};
use package_catalog::history::InstallHistory;
use package_catalog::host::{ProjectInventory, ProjectManifest};
use package_catalog::registry::NpmRegistry;
use package_catalog::search::{FilterKind, PackageSearcher, SearchCriteria, SortMethod, Toggle};

#[derive(Parser)]
#[command(name = "package-catalog")]
#[command(version, about = "Browse, search and install registry packages for a project")]
struct Cli {
    /// Project directory
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Configuration file [default: <data dir>/config.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr as well as the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronize the catalog with the project and the registry
    Sync {
        /// Refresh from the registry even if the cache is populated
        #[arg(long)]
        force: bool,
    },
    /// Search the catalog
    Search(SearchArgs),
    /// Show one package
    Info {
        name: String,
        /// Version to show instead of the default one
        #[arg(long)]
        version: Option<String>,
    },
    /// Add a package to the project manifest
    Install {
        name: String,
        /// Defaults to the package's default version
        version: Option<String>,
    },
    /// Add a package from a folder on disk
    InstallLocal {
        /// Path to the package's package.json
        path: PathBuf,
    },
    /// Remove a package from the project manifest
    Uninstall { name: String },
    /// List the registry namespaces a package may need
    Namespaces { name: String },
}

#[derive(Args)]
struct SearchArgs {
    /// Search terms, all must match unless one matches a title or name exactly
    terms: Vec<String>,

    #[arg(long, default_value = "title", value_parser = clap::value_parser!(SortMethod))]
    sort: SortMethod,

    /// Only installed packages
    #[arg(long)]
    installed: bool,
    /// Only direct dependencies
    #[arg(long)]
    direct: bool,
    /// Only indirect dependencies
    #[arg(long)]
    indirect: bool,
    /// Only packages with an upgrade available
    #[arg(long)]
    upgradable: bool,
    /// Include unsupported packages
    #[arg(long)]
    unsupported: bool,
    /// Only packages with samples
    #[arg(long)]
    examples: bool,

    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    author: Vec<String>,
    #[arg(long)]
    category: Vec<String>,
    /// direct, indirect, embedded or local
    #[arg(long)]
    source: Vec<String>,
}

/// Log to a JSON-lines file in the data directory, and to stderr when verbose.
///
/// The returned guard flushes the file writer when dropped.
fn initialize_tracing(verbose: bool) -> anyhow::Result<WorkerGuard> {
    let data_dir = config::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let file_appender = tracing_appender::rolling::never(&data_dir, config::LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(verbose.then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();

    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = initialize_tracing(cli.verbose)?;

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let config = CatalogConfig::load(&config_path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli, config))
}

async fn run(cli: Cli, config: CatalogConfig) -> anyhow::Result<()> {
    let registry = NpmRegistry::new(&config.registry.url)?;
    let host = ProjectInventory::open(&cli.project, config.host.engine_version)?;
    let manifest = ProjectManifest::new(&cli.project, config.registry.scope_match.clone());
    let history = Arc::new(InstallHistory::open(&config::history_path())?);

    let sync = CatalogSynchronizer::new(
        Arc::new(registry),
        Arc::new(host),
        DiskCache::new(config.cache.directory()),
        manifest,
        SyncOptions::from(&config),
    )
    .with_observer(history.clone());

    match cli.command {
        Command::Sync { force } => {
            let snapshot = sync.query(force).await?;
            print_warnings(&snapshot);
            println!(
                "{} packages, {} installed",
                snapshot.records().len(),
                snapshot.installed_packages().count()
            );
        }
        Command::Search(args) => {
            let snapshot = sync.query(false).await?;
            print_warnings(&snapshot);

            let criteria = build_criteria(args, &snapshot);
            let ordering = history.install_orders().unwrap_or_else(|e| {
                warn!("Failed to read install history: {}", e);
                HashMap::new()
            });
            let results = PackageSearcher::new().filter_packages(&snapshot, &criteria, &ordering);
            for record in results.iter() {
                print_summary(&snapshot, record);
            }
        }
        Command::Info { name, version } => {
            let snapshot = sync.query(false).await?;
            let Some(record) = snapshot.record(&name) else {
                bail!("Package not found in catalog: {}", name);
            };
            print_info(&snapshot, record, version.as_deref())?;
        }
        Command::Install { name, version } => {
            let version = match version {
                Some(version) => version,
                None => {
                    let snapshot = sync.query(false).await?;
                    snapshot
                        .record(&name)
                        .and_then(|r| r.default_version())
                        .map(|v| v.version().to_string())
                        .with_context(|| format!("Package not found in catalog: {}", name))?
                }
            };
            sync.install(&name, &version, true).await?;
            println!("Installed {}@{}", name, version);
        }
        Command::InstallLocal { path } => {
            sync.install_local(&path, true).await?;
            println!("Installed package from {:?}", path);
        }
        Command::Uninstall { name } => {
            sync.uninstall(&name, true).await?;
            println!("Uninstalled {}", name);
        }
        Command::Namespaces { name } => {
            let snapshot = sync.query(false).await?;
            for namespace in snapshot.transitive_namespaces_of(&name).iter() {
                println!("{}", namespace);
            }
        }
    }

    Ok(())
}

fn build_criteria(args: SearchArgs, snapshot: &Arc<CatalogSnapshot>) -> SearchCriteria {
    let mut criteria = SearchCriteria::new();
    criteria.update_filters_using_package_list(snapshot);

    for term in &args.terms {
        criteria.add_search_term(term);
    }
    criteria.set_sort_method(args.sort);
    criteria.set_toggle(Toggle::OnlyInstalled, args.installed);
    criteria.set_toggle(Toggle::OnlyDirect, args.direct);
    criteria.set_toggle(Toggle::OnlyIndirect, args.indirect);
    criteria.set_toggle(Toggle::UpgradeAvailable, args.upgradable);
    criteria.set_toggle(Toggle::ShowUnsupported, args.unsupported);
    criteria.set_toggle(Toggle::ContainsExamples, args.examples);

    for (kind, ids) in [
        (FilterKind::Tags, &args.tags),
        (FilterKind::Author, &args.author),
        (FilterKind::Category, &args.category),
        (FilterKind::Source, &args.source),
    ] {
        for id in ids {
            if !criteria.set_keyword_enabled(kind, id, true) {
                warn!("No package has {} '{}'", kind, id);
            }
        }
    }

    info!("Searching with {} active tags", criteria.active_tags().len());
    criteria
}

fn print_warnings(snapshot: &CatalogSnapshot) {
    for warning in snapshot.warnings() {
        eprintln!("warning: {}", warning);
    }
}

fn print_summary(snapshot: &CatalogSnapshot, record: &PackageRecord) {
    let Some(default) = record.default_version() else {
        return;
    };
    let state = match snapshot.installed(record.name()) {
        Some(installed) => match &installed.upgrade_version {
            Some(upgrade) => format!(
                "  [{} {} -> {}]",
                installed.source, installed.installed_version, upgrade
            ),
            None => format!("  [{} {}]", installed.source, installed.installed_version),
        },
        None => String::new(),
    };
    println!(
        "{}@{}  {}{}",
        record.name(),
        default.version(),
        default.title(),
        state
    );
}

fn print_info(
    snapshot: &CatalogSnapshot,
    record: &PackageRecord,
    version: Option<&str>,
) -> anyhow::Result<()> {
    let info = match version {
        Some(version) => snapshot.version_info(record.name(), version)?,
        None => record
            .default_version()
            .with_context(|| format!("{} has no default version", record.name()))?,
    };

    println!("{} ({})", info.title(), record.name());
    println!("version:    {}", info.version());
    if let Some(published) = info.date_published() {
        println!("published:  {}", published.format("%Y-%m-%d"));
    }
    println!("engine:     {}", info.engine_version());
    if !info.author().is_empty() {
        println!("author:     {}", info.author());
    }
    if !info.category().is_empty() {
        println!("category:   {}", info.category());
    }
    if !info.keywords().is_empty() {
        println!("keywords:   {}", info.keywords().join(", "));
    }
    if record.is_deprecated() {
        println!("deprecated: yes");
    }
    if let Some(installed) = snapshot.installed(record.name()) {
        println!(
            "installed:  {} ({})",
            installed.installed_version, installed.source
        );
        if let Some(upgrade) = &installed.upgrade_version {
            println!("upgrade:    {}", upgrade);
        }
    }
    for dependency in info.dependencies() {
        println!("depends on: {} {}", dependency.name, dependency.version_range);
    }
    if !info.description().is_empty() {
        println!();
        println!("{}", info.description());
    }

    let versions: Vec<&str> = record.versions().iter().map(|v| v.version()).collect();
    println!();
    println!("versions:   {}", versions.join(", "));
    Ok(())
}
