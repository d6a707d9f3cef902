use clap::Parser;
use data_router::{
    load_config, load_manifest, resolve_match_stack, HandlerSet, RouteTable, RouterConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "route-check")]
#[command(about = "Validate a route manifest and inspect how paths match", long_about = None)]
struct Cli {
    /// Route manifest (TOML)
    manifest: PathBuf,

    /// Router configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve a path against the table; repeatable
    #[arg(short = 'm', long = "match", value_name = "PATH")]
    matches: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => RouterConfig::default(),
    };

    let table = match load_manifest(&cli.manifest)
        .and_then(|manifest| manifest.build(&HandlerSet::lenient(), &config))
    {
        Ok(table) => table,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    print_table(&table);

    for path in &cli.matches {
        match resolve_match_stack(&table, path) {
            Some(stack) => {
                println!("\n{path}");
                for entry in &stack {
                    println!(
                        "  {}{} \"{}\"",
                        "  ".repeat(entry.depth),
                        entry.route.id,
                        entry.pathname
                    );
                }
                let mut params: Vec<_> = stack
                    .params()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                if !params.is_empty() {
                    params.sort();
                    println!("  params: {}", params.join(", "));
                }
            }
            None => println!("\n{path}\n  (no match, 404)"),
        }
    }

    ExitCode::SUCCESS
}

fn print_table(table: &RouteTable) {
    println!("{} routes, {} branches", table.len(), table.branches().len());
    for branch in table.branches() {
        println!(
            "  {:>4}  {:<32} {}",
            branch.score,
            branch.pattern,
            branch
                .route_ids
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(" > ")
        );
    }

    if !table.collisions().is_empty() {
        println!("\ncollisions:");
        for collision in table.collisions() {
            println!("  {collision}");
        }
    }
}
