// memgrid CLI - headless access to versioned chat tables

mod exit_codes;
mod sheet_ops;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use memgrid_config::settings::ConfigError;
use memgrid_engine::edit::Side;
use memgrid_engine::error::{GridError, StoreError};
use memgrid_engine::sheet::SheetKind;
use memgrid_io::error::IoError;

use exit_codes::{EXIT_ERROR, EXIT_NOT_FOUND, EXIT_REJECTED, EXIT_SUCCESS, EXIT_USAGE};
use sheet_ops::{ExportFormat, NewSheet, ShowArgs, Structural, Workspace};

#[derive(Parser)]
#[command(name = "mgrid")]
#[command(about = "Versioned memory tables for chat sessions (headless)")]
#[command(version)]
struct Cli {
    /// SQLite store to use instead of the configured one
    #[arg(long, global = true, env = "MEMGRID_STORE")]
    store: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sheet and print its uid
    #[command(after_help = "\
Examples:
  mgrid new People --cols 3 --rows 2
  mgrid new Schema --template --cols 4
  mgrid new 'People (chat 7)' --from-template Schema")]
    New {
        name: String,

        /// Columns, row-header column included
        #[arg(long)]
        cols: Option<usize>,

        /// Rows, header row included
        #[arg(long)]
        rows: Option<usize>,

        /// Create a header-only template
        #[arg(long)]
        template: bool,

        /// Instantiate from a stored template (uid or name)
        #[arg(long, value_name = "TEMPLATE")]
        from_template: Option<String>,

        /// Which edits the sheet accepts
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Only send rows mentioned in recent chat turns
        #[arg(long)]
        trigger_send: bool,
    },

    /// List stored sheets (uid, name, last update)
    List,

    /// Print the prompt text for a sheet
    Show {
        sheet: String,

        /// Table index to print in the title
        #[arg(long)]
        index: Option<usize>,

        /// Chat history file, one turn per line, most recent last
        #[arg(long)]
        chat: Option<PathBuf>,

        /// Override the sheet's trigger-send depth
        #[arg(long, allow_hyphen_values = true)]
        depth: Option<i64>,

        #[arg(long)]
        no_note: bool,

        #[arg(long)]
        no_rules: bool,
    },

    /// Print one attribute of the cell at ADDRESS
    Get {
        sheet: String,
        address: String,

        #[arg(long, default_value = "value")]
        attr: String,
    },

    /// Set one attribute of the cell at ADDRESS (creates a new cell version)
    Set {
        sheet: String,
        address: String,
        value: String,

        #[arg(long, default_value = "value")]
        attr: String,
    },

    /// Insert a row next to the cell at ADDRESS
    InsertRow {
        sheet: String,
        address: String,

        /// Insert above instead of below
        #[arg(long)]
        before: bool,
    },

    /// Insert a column next to the cell at ADDRESS
    InsertCol {
        sheet: String,
        address: String,

        /// Insert left instead of right
        #[arg(long)]
        before: bool,
    },

    /// Delete the row of the cell at ADDRESS
    DeleteRow { sheet: String, address: String },

    /// Delete the column of the cell at ADDRESS
    DeleteCol { sheet: String, address: String },

    /// Reset a sheet's content (not available yet)
    Clear { sheet: String },

    /// Write a sheet to a file
    Export {
        sheet: String,

        #[arg(long, short = 't', value_enum)]
        to: FormatArg,

        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Import a CSV/TSV file or a JSON snapshot and print the new uid
    Import {
        input: PathBuf,

        #[arg(long)]
        name: Option<String>,
    },

    /// Apply <tableEdit> commands read from stdin
    #[command(after_help = "\
Table indices in the commands refer to the sheets in the order given.

Example:
  echo '<tableEdit>insertRow(0, {\"0\":\"Alice\"})</tableEdit>' | mgrid apply People")]
    Apply {
        #[arg(required = true)]
        sheets: Vec<String>,
    },

    /// Show every version of the cell at ADDRESS, oldest first
    History { sheet: String, address: String },

    /// Drop history unreachable from the grid and from stored pieces
    Compact { sheet: String },

    /// Per-turn layout snapshots
    #[command(subcommand)]
    Piece(PieceCommands),

    /// Delete a sheet and its pieces
    Delete { sheet: String },
}

#[derive(Subcommand)]
enum PieceCommands {
    /// Record the current layout under PIECE_ID
    Save { sheet: String, piece_id: String },

    /// Reinstate the layout recorded under PIECE_ID
    Restore { sheet: String, piece_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Free,
    Dynamic,
    Fixed,
    Static,
}

impl From<KindArg> for SheetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Free => SheetKind::Free,
            KindArg::Dynamic => SheetKind::Dynamic,
            KindArg::Fixed => SheetKind::Fixed,
            KindArg::Static => SheetKind::Static,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Tsv,
    Json,
    Snapshot,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Tsv => ExportFormat::Tsv,
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Snapshot => ExportFormat::Snapshot,
        }
    }
}

fn side(before: bool) -> Side {
    if before {
        Side::Before
    } else {
        Side::After
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut ws = Workspace::open(cli.store, cli.config)?;

    match cli.command {
        Commands::New { name, cols, rows, template, from_template, kind, trigger_send } => sheet_ops::cmd_new(
            &mut ws,
            NewSheet {
                name,
                cols,
                rows,
                template,
                from_template,
                kind: kind.map(SheetKind::from),
                trigger_send,
            },
        ),
        Commands::List => sheet_ops::cmd_list(&ws),
        Commands::Show { sheet, index, chat, depth, no_note, no_rules } => sheet_ops::cmd_show(
            &ws,
            ShowArgs { key: sheet, index, chat, depth, no_note, no_rules },
        ),
        Commands::Get { sheet, address, attr } => sheet_ops::cmd_get(&ws, &sheet, &address, &attr),
        Commands::Set { sheet, address, value, attr } => sheet_ops::cmd_set(&mut ws, &sheet, &address, &attr, &value),
        Commands::InsertRow { sheet, address, before } => {
            sheet_ops::cmd_structural(&mut ws, &sheet, &address, Structural::InsertRow(side(before)))
        }
        Commands::InsertCol { sheet, address, before } => {
            sheet_ops::cmd_structural(&mut ws, &sheet, &address, Structural::InsertColumn(side(before)))
        }
        Commands::DeleteRow { sheet, address } => {
            sheet_ops::cmd_structural(&mut ws, &sheet, &address, Structural::DeleteRow)
        }
        Commands::DeleteCol { sheet, address } => {
            sheet_ops::cmd_structural(&mut ws, &sheet, &address, Structural::DeleteColumn)
        }
        Commands::Clear { sheet } => sheet_ops::cmd_clear(&mut ws, &sheet),
        Commands::Export { sheet, to, output } => sheet_ops::cmd_export(&ws, &sheet, to.into(), &output),
        Commands::Import { input, name } => sheet_ops::cmd_import(&mut ws, &input, name),
        Commands::Apply { sheets } => sheet_ops::cmd_apply(&mut ws, &sheets),
        Commands::History { sheet, address } => sheet_ops::cmd_history(&ws, &sheet, &address),
        Commands::Compact { sheet } => sheet_ops::cmd_compact(&mut ws, &sheet),
        Commands::Piece(PieceCommands::Save { sheet, piece_id }) => {
            sheet_ops::cmd_piece_save(&mut ws, &sheet, &piece_id)
        }
        Commands::Piece(PieceCommands::Restore { sheet, piece_id }) => {
            sheet_ops::cmd_piece_restore(&mut ws, &sheet, &piece_id)
        }
        Commands::Delete { sheet } => sheet_ops::cmd_delete(&mut ws, &sheet),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn error(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REJECTED, message: msg.into(), hint: None }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NOT_FOUND, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<GridError> for CliError {
    fn from(err: GridError) -> Self {
        match &err {
            GridError::NotImplemented(_) => {
                CliError::error(err.to_string()).with_hint("this operation has no defined behavior yet")
            }
            GridError::UnknownCell(_) => CliError::not_found(err.to_string()),
            _ => CliError::error(err.to_string()),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::error(err.to_string())
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Grid(e) => e.into(),
            IoError::NoSuchTable { .. } => CliError::not_found(err.to_string()),
            other => CliError::error(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::error(err.to_string()).with_hint("fix or remove the settings file")
    }
}
