use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "nw", about = concat!("nw v", env!("CARGO_PKG_VERSION"), " - per-note text width for markdown vaults"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault-dir", global = true)]
    pub vault_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a vault in the current directory
    Init(InitArgs),
    /// Make a note the active note and resolve its width
    Open(OpenArgs),
    /// Forget the active note
    Close,
    /// Show the active note, its width, and the width settings
    Status,
    /// Change the width of the active note
    Set(WidthArgs),
    /// Change the default note width
    Default(WidthArgs),
    /// Change the width of every note
    All(WidthArgs),
    /// Feed text typed into the width box, as a live edit
    Input(InputArgs),
    /// Read or change settings
    Config(ConfigCmd),
    /// Reorder the width sources
    Priority(PriorityArgs),
    /// Validate notes against the width database
    Check(CheckArgs),
    /// Print the style rule for a width
    Style(StyleArgs),
    /// Follow the active note and re-resolve on changes
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Rewrite settings.toml even if .notewidth/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Width command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct OpenArgs {
    /// Note to open (absolute, relative to cwd, or relative to the vault)
    pub note: String,
    #[command(flatten)]
    pub editor: EditorArgs,
}

#[derive(Args)]
pub struct WidthArgs {
    /// Width in percent; values outside 0-100 are clamped
    #[arg(allow_hyphen_values = true)]
    pub width: i64,
}

#[derive(Args)]
pub struct InputArgs {
    /// Raw text, read like a lenient number box ("120" becomes 100, "abc" becomes 0)
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

/// Editor geometry for printing a style rule alongside a width.
#[derive(Args, Default)]
pub struct EditorArgs {
    /// Editor width in pixels
    #[arg(long, requires = "char_width")]
    pub editor_width: Option<f64>,
    /// Width of one character in pixels
    #[arg(long, requires = "editor_width")]
    pub char_width: Option<f64>,
}

// ---------------------------------------------------------------------------
// Settings args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print every setting
    List,
    /// Print one setting
    Get {
        key: String,
    },
    /// Change one setting
    Set {
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

#[derive(Args)]
pub struct PriorityArgs {
    /// Source to move: saved or yaml
    pub source: String,
    pub direction: Direction,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// Maintenance args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CheckArgs {
    /// Delete database records no note links to
    #[arg(long)]
    pub prune: bool,
}

#[derive(Args)]
pub struct StyleArgs {
    /// Width in percent (default: the current width)
    #[arg(long, allow_hyphen_values = true)]
    pub width: Option<i64>,
    /// Editor width in pixels
    #[arg(long)]
    pub editor_width: f64,
    /// Width of one character in pixels
    #[arg(long)]
    pub char_width: f64,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long)]
    pub timeout: Option<u64>,
    #[command(flatten)]
    pub editor: EditorArgs,
}
