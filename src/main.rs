// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

// Use library instead of local modules
use dre_ledger::ledger_file::parse_entry_date;
use dre_ledger::{
    format_brl, Choice, CsvLedgerFile, DreConfig, DreError, EntryForm, LedgerStore, Session,
};

#[derive(Parser)]
#[command(name = "dre-ledger")]
#[command(version, about = "Ledger entries and hierarchical DRE rollup reports")]
struct Cli {
    /// Path to configuration file (default: ./dre-ledger.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,

    /// Print the DRE rollup over the committed ledger
    Report {
        /// Rollup depth: levels 1..=N are shown
        #[arg(short, long)]
        level: Option<i64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List ledger rows with their row ids
    Entries,

    /// Post one entry and save it immediately
    Add {
        /// Entry date (YYYY-MM-DD or DD/MM/YYYY), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        cost_center: String,

        #[arg(long)]
        account: String,

        /// Hierarchy key (sk_hierarquia_dre)
        #[arg(long)]
        hierarchy: String,

        /// Signed amount, e.g. 1234.56 or -1.234,56
        #[arg(long, allow_hyphen_values = true)]
        balance: String,
    },

    /// Delete ledger rows by row id (see `entries`)
    Delete {
        #[arg(required = true)]
        row_ids: Vec<usize>,
    },

    /// Create an empty ledger file with the expected header
    Init,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        if let Some(dre) = err.downcast_ref::<DreError>() {
            eprintln!("❌ {}", dre.user_message());
        } else {
            eprintln!("❌ Error");
        }
        eprintln!("   {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DreConfig::load(cli.config.as_deref())?;

    let command = cli.command.unwrap_or(Command::Tui);
    if !matches!(command, Command::Tui) {
        telemetry::init_stderr(&config.log_filter)?;
    }

    match command {
        Command::Tui => run_ui_mode(&config),
        Command::Report { level, json } => run_report(&config, level, json),
        Command::Entries => run_entries(&config),
        Command::Add {
            date,
            cost_center,
            account,
            hierarchy,
            balance,
        } => run_add(&config, date, &cost_center, &account, &hierarchy, &balance),
        Command::Delete { row_ids } => run_delete(&config, row_ids),
        Command::Init => run_init(&config),
    }
}

fn run_report(config: &DreConfig, level: Option<i64>, json: bool) -> Result<()> {
    let level = level.unwrap_or(config.default_level);
    if level < 1 {
        return Err(anyhow!("--level must be at least 1"));
    }

    let mut session = Session::open(config)?;
    let report = session.report_to_depth(level);

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("📊 DRE - níveis 1 a {}", level);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for row in &report.rows {
        let label = format!("{}{}", row.indent(), row.group_label);
        println!("{:<40} {:>20}", label, format_brl(row.total_balance));
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if report.unmatched_entries > 0 {
        println!("⚠️  {} lançamento(s) fora da hierarquia", report.unmatched_entries);
    }
    if report.malformed_entries > 0 {
        println!("⚠️  {} lançamento(s) com saldo inválido", report.malformed_entries);
    }
    if report.overflowed_entries > 0 {
        println!("⚠️  {} lançamento(s) excedem o limite numérico do total", report.overflowed_entries);
    }

    Ok(())
}

fn open_store(config: &DreConfig) -> Result<LedgerStore> {
    Ok(LedgerStore::open(CsvLedgerFile::new(&config.ledger_path))?)
}

fn run_entries(config: &DreConfig) -> Result<()> {
    let store = open_store(config)?;

    println!("📒 {} ({} lançamentos)", store.location(), store.len());
    println!(
        "{:>5}  {:<10}  {:<12}  {:<12}  {:<10}  {:>18}  {}",
        "#", "Data", "Hierarquia", "Conta", "C. Custo", "Saldo", "Descrição"
    );
    for row in store.effective_view() {
        let balance = match row.entry.balance.amount() {
            Some(value) => format_brl(value),
            None => format!("⚠️ {}", row.entry.balance.to_canonical()),
        };
        println!(
            "{:>5}  {:<10}  {:<12}  {:<12}  {:<10}  {:>18}  {}",
            row.row_id,
            row.entry.date.format("%d/%m/%Y"),
            row.entry.hierarchy_key,
            row.entry.account_code,
            row.entry.cost_center_code,
            balance,
            row.entry.account_label,
        );
    }

    Ok(())
}

fn run_add(
    config: &DreConfig,
    date: Option<String>,
    cost_center: &str,
    account: &str,
    hierarchy: &str,
    balance: &str,
) -> Result<()> {
    let date = match date {
        Some(raw) => parse_entry_date(&raw).ok_or_else(|| anyhow!("invalid date '{}'", raw))?,
        None => chrono::Local::now().date_naive(),
    };

    let mut form = EntryForm::new(date);
    form.select_cost_center(Choice::from_option(cost_center));
    form.select_account(Choice::from_option(account));
    form.select_hierarchy(Choice::from_option(hierarchy));
    form.set_balance_text(balance)
        .map_err(|e| DreError::Validation(vec![e]))?;

    let mut session = Session::open(config)?;
    if !session.catalog().contains_key(account, hierarchy) {
        println!("⚠️  ({}, {}) não existe na hierarquia; o valor não entra na DRE", account, hierarchy);
    }

    let id = session.post_and_commit(&form)?;
    info!(entry_id = %id, "Entry added from CLI");

    println!("✅ Valor lançado: {} em {}", format_brl(form.balance), session.store().location());
    Ok(())
}

fn run_delete(config: &DreConfig, row_ids: Vec<usize>) -> Result<()> {
    let mut store = open_store(config)?;
    let ids: BTreeSet<usize> = row_ids.into_iter().collect();

    let deleted = store.delete_by_row_ids(&ids)?;
    if deleted == 0 {
        println!("ℹ️  Nenhuma linha corresponde aos ids informados");
    } else {
        println!("🗑️  {} linha(s) excluída(s), {} restante(s)", deleted, store.len());
    }
    Ok(())
}

fn run_init(config: &DreConfig) -> Result<()> {
    let file = CsvLedgerFile::new(&config.ledger_path);
    if file.create_if_missing()? {
        println!("✅ Ledger criado: {}", file.path().display());
    } else {
        println!("ℹ️  Ledger já existe: {}", file.path().display());
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &DreConfig) -> Result<()> {
    let _guard = telemetry::init_file(&config.log_dir, &config.log_filter)?;

    println!("🖥️  Loading DRE Ledger UI...\n");

    let session = Session::open(config)
        .with_context(|| format!("Failed to open {}", config.ledger_path.display()))?;

    println!(
        "✓ Loaded {} hierarchy rows, {} ledger rows",
        session.catalog().len(),
        session.store().len()
    );

    let mut app = ui::App::new(session, config.level_options.clone(), config.default_level_index());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &DreConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: dre-ledger report");
    std::process::exit(1);
}
