//! rowkit: filter compiler CLI
//!
//! # Usage
//!
//! ```bash
//! # Compile a filter to a WHERE clause
//! rowkit compile "[envId=1][name~hur]" --dialect mysql
//!
//! # Full statement with positional placeholders
//! rowkit compile "[id:(1,2,3)][^!name]" --table device --expand
//!
//! # Turn a driver error into field errors
//! rowkit translate "Duplicate entry 'x' for key 'PRIMARY'" --dialect mysql
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rowkit::prelude::*;
use rowkit::transpiler::named;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowkit")]
#[command(version)]
#[command(about = "Compile rowkit filters to dialect SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    rowkit compile '[envId=1][name~hur | name=null][^name]'
    rowkit compile '[id:(1,2)]' --table device --expand --dialect mysql
    rowkit explain '![price=1.5..9.99]'
    rowkit translate 'Duplicate entry \"a\" for key \"article_key_UNIQUE\"' --dialect mysql")]
struct Cli {
    /// SQL dialect (postgres, mysql); defaults to the configured one
    #[arg(short, long, global = true)]
    dialect: Option<Dialect>,

    /// Configuration file instead of the discovered rowkit.toml
    #[arg(short, long, global = true, env = "ROWKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter expression
    Compile {
        filter: String,

        /// Render a full SELECT against this table
        #[arg(short, long)]
        table: Option<String>,

        /// Rewrite named parameters to positional placeholders
        #[arg(short, long)]
        expand: bool,

        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        offset: Option<u64>,

        #[arg(short, long, value_enum, default_value = "sql")]
        format: OutputFormat,
    },
    /// Show how a filter parses and what each dialect makes of it
    Explain { filter: String },
    /// Translate a constraint-violation message into field errors
    Translate { message: String },
    /// Show the filter syntax reference
    Syntax,
}

/// A raw driver message, as the translators see errors.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DriverMessage(String);

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_logging(&config, cli.verbose);

    let dialect = cli.dialect.unwrap_or(config.database.dialect);
    match cli.command {
        Commands::Compile {
            filter,
            table,
            expand,
            limit,
            offset,
            format,
        } => compile(dialect, &filter, table.as_deref(), expand, (limit, offset), format),
        Commands::Explain { filter } => explain(&filter),
        Commands::Translate { message } => translate(dialect, &message),
        Commands::Syntax => {
            show_syntax();
            Ok(())
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rowkit=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn compile(
    dialect: Dialect,
    filter: &str,
    table: Option<&str>,
    expand: bool,
    (limit, offset): (Option<u64>, Option<u64>),
    format: OutputFormat,
) -> Result<()> {
    let query = rowkit::parse(filter).with_context(|| format!("in filter '{}'", filter))?;
    let compiler = QueryCompiler::for_dialect(dialect);
    let compiled = compiler.compile(&query)?;

    let mut sql = match table {
        Some(table) => format!(
            "SELECT * FROM {}{}{}",
            compiler.generator().quote_identifier(table),
            compiled.where_sql(),
            compiled.order_sql()
        ),
        None => compiled.where_clause.clone(),
    };
    if table.is_some() {
        sql.push_str(&compiler.generator().limit_offset(limit, offset));
    }

    let (sql, params): (String, Vec<(String, Value)>) = if expand {
        let (sql, values) = named::expand(&sql, &compiled.params, compiler.generator())?;
        let params = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (compiler.generator().placeholder(i + 1), v))
            .collect();
        (sql, params)
    } else {
        (sql, compiled.params.clone())
    };

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "dialect": dialect.to_string(),
                "sql": sql,
                "orderBy": compiled.order_by,
                "params": params.iter().map(|(n, v)| serde_json::json!({ "name": n, "value": v })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Sql => {
            if sql.is_empty() {
                println!("{}", "(no conditions)".dimmed());
            } else {
                println!("{}", sql.white());
            }
            if table.is_none() && !compiled.order_by.is_empty() {
                println!("{} {}", "ORDER BY".dimmed(), compiled.order_by.white());
            }
            if !params.is_empty() {
                println!();
                println!("{}", "Bindings:".cyan());
                for (name, value) in &params {
                    let name = if expand { name.clone() } else { format!(":{}", name) };
                    println!("  {} = {}", name, value.to_string().yellow());
                }
            }
        }
    }
    Ok(())
}

fn explain(filter: &str) -> Result<()> {
    println!("{} {}", "Filter:".dimmed(), filter.yellow());
    println!();

    let query = rowkit::parse(filter)?;
    println!("{}", "Parsed Structure:".green().bold());
    if !query.restrictions.is_empty() {
        println!("  {}", "Restrictions:".dimmed());
        for r in &query.restrictions {
            println!("    • {} {}", format!("[{}]", r.kind()).cyan(), r.to_string().white());
        }
    }
    if !query.disjunctions.is_empty() {
        println!("  {}", "Disjunctions:".dimmed());
        for d in &query.disjunctions {
            let prefix = if d.negated { "NOT any of" } else { "any of" };
            println!("    • {}", prefix.cyan());
            for q in &d.queries {
                println!("        ({})", q.to_string().white());
            }
        }
    }
    if !query.order_by.is_empty() {
        println!("  {}", "Order:".dimmed());
        for o in &query.order_by {
            println!("    • {} {:?}", o.field.white(), o.direction);
        }
    }

    for dialect in [Dialect::MySQL, Dialect::Postgres] {
        println!();
        println!("{}", format!("{}:", dialect).green().bold());
        match QueryCompiler::for_dialect(dialect).compile(&query) {
            Ok(compiled) => {
                println!("  {}{}", compiled.where_clause.white(), compiled.order_sql().white());
                for (name, value) in &compiled.params {
                    println!("    :{} = {}", name, value.to_string().yellow());
                }
            }
            Err(e) => println!("  {} {}", "Compile Error:".red().bold(), e),
        }
    }
    Ok(())
}

fn translate(dialect: Dialect, message: &str) -> Result<()> {
    let error = DriverMessage(message.to_string());
    match dialect.translator().translate(&error) {
        Some(errors) => {
            println!("{}", "Validation errors:".green().bold());
            for e in errors.errors() {
                println!("  {} {}", e.field.cyan(), e.code.to_string().white());
            }
        }
        None => println!("{}", format!("Not a constraint violation for {}", dialect).dimmed()),
    }
    Ok(())
}

fn show_syntax() {
    println!("{}", "rowkit filter syntax".cyan().bold());
    println!();

    let symbols = [
        ("[..]", "Cage", "Cages are AND'd", "a AND b"),
        ("&", "And", "AND inside a cage", "AND"),
        ("|", "Or", "OR of AND-groups", "(a OR b)"),
        ("![..]", "Not", "Negate a cage", "NOT (...)"),
        ("=  !=", "Equals", "Equality, null aware", "= / IS NULL"),
        ("~  !~", "Contains", "Substring match", "LIKE '%v%'"),
        ("> >= < <=", "Range", "Open range", "> / BETWEEN"),
        ("=a..b", "Between", "Inclusive range", "BETWEEN a AND b"),
        (":(..)", "In", "Set membership", "IN (...)"),
        ("^  ^!", "Sort", "Ascending / descending", "ORDER BY"),
        ("@ts", "Timestamp", "RFC 3339 value", "'2024-01-01T..'"),
    ];

    println!(
        "{:12} {:10} {:24} {}",
        "Symbol".white().bold(),
        "Name".white().bold(),
        "Meaning".white().bold(),
        "SQL".white().bold()
    );
    println!("{}", "─".repeat(70).dimmed());

    for (symbol, name, meaning, sql) in symbols {
        println!("{:12} {:10} {:24} {}", symbol.cyan().bold(), name.yellow(), meaning.white(), sql.dimmed());
    }
}
