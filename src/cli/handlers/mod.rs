mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

/// Global override for the vault directory (set by -C flag)
static VAULT_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::lock::FileLock;
use crate::io::settings_io;
use crate::io::state::{self, SessionState};
use crate::io::store::WidthStore;
use crate::io::vault_io::{self, VaultError};
use crate::io::watcher::{VaultEvent, VaultWatcher};
use crate::model::note::{FrontMatter, Note};
use crate::model::settings::SourceKind;
use crate::model::vault::Vault;
use crate::model::width::Width;
use crate::ops::bulk::{self, Progress};
use crate::ops::commands::{self, CommandError};
use crate::ops::resolver::{Resolution, Resolver};
use crate::ops::scheduler::{EDIT_DELAY, EventHandler, Run};
use crate::ops::{check, style};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Longest the watch loop sleeps when nothing is scheduled.
const WATCH_IDLE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;

    if let Some(ref dir) = cli.vault_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        if let Ok(mut guard) = VAULT_DIR_OVERRIDE.lock() {
            guard.replace(abs);
        }
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args, &start_dir()?),

        // Width commands
        Commands::Open(args) => cmd_open(args, json),
        Commands::Close => cmd_close(),
        Commands::Status => cmd_status(json),
        Commands::Set(args) => cmd_set(args, json),
        Commands::Default(args) => cmd_default(args, json),
        Commands::All(args) => cmd_all(args, json),
        Commands::Input(args) => cmd_input(args, json),

        // Settings
        Commands::Config(args) => cmd_config(args, json),
        Commands::Priority(args) => cmd_priority(args, json),

        // Maintenance
        Commands::Check(args) => cmd_check(args, json),
        Commands::Style(args) => cmd_style(args, json),
        Commands::Watch(args) => cmd_watch(args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_dir() -> Result<PathBuf, VaultError> {
    let over = VAULT_DIR_OVERRIDE.lock().ok().and_then(|guard| guard.clone());
    match over {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().map_err(VaultError::IoError),
    }
}

fn load_vault_cwd() -> Result<Vault, VaultError> {
    let root = vault_io::discover_vault(&start_dir()?)?;
    vault_io::load_vault(&root)
}

fn read_state(vault: &Vault) -> SessionState {
    state::read_session_state(&vault.data_dir).unwrap_or_default()
}

/// Load the active note, if there is one and it still exists.
fn active_note(vault: &Vault, session: &SessionState) -> Option<Note> {
    let rel = session.active_note.as_ref()?;
    match vault_io::read_note(&vault.root, Path::new(rel)) {
        Ok(note) => Some(note),
        Err(e) => {
            warn!(note = %rel, error = %e, "active note could not be read");
            None
        }
    }
}

fn note_label(note: &Note) -> String {
    note.path().to_string_lossy().into_owned()
}

fn style_for(width: Width, editor: &EditorArgs) -> Option<String> {
    match (editor.editor_width, editor.char_width) {
        (Some(editor_px), Some(char_px)) => style::style_rule(width, editor_px, char_px),
        _ => None,
    }
}

fn print_resolution(note: &str, resolution: &Resolution, style: Option<String>, json: bool) -> CmdResult {
    if json {
        let out = ResolutionJson {
            note: note.to_string(),
            resolution,
            style,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_resolution(note, resolution, style.as_deref()));
    }
    Ok(())
}

/// Persist `width_percentage` (and optionally `default_note_width`) to settings.toml.
fn save_widths(vault: &Vault) -> Result<(), VaultError> {
    let (_, mut doc) = settings_io::read_settings(&vault.data_dir)?;
    settings_io::set_width_percentage(&mut doc, vault.settings.width_percentage);
    settings_io::set_default_note_width(&mut doc, vault.settings.default_note_width);
    settings_io::write_settings(&vault.data_dir, &doc)
}

/// Record the width applied to the active note.
fn remember_width(vault: &Vault, session: &mut SessionState, width: Width) {
    if session.active_note.is_none() {
        return;
    }
    session.last_width = Some(width);
    if let Err(e) = state::write_session_state(&vault.data_dir, session) {
        warn!(error = %e, "could not write session state");
    }
}

/// Install a Ctrl-C handler that raises the returned flag.
fn cancel_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }
    flag
}

/// Progress bar for bulk operations, counting in percent.
struct BarProgress {
    bar: ProgressBar,
    done: f64,
}

impl BarProgress {
    fn new(message: &'static str, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(100)
        };
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message);
        BarProgress { bar, done: 0.0 }
    }
}

impl Progress for BarProgress {
    fn advance(&mut self, percent: f64) {
        self.done += percent;
        self.bar.set_position(self.done.round().clamp(0.0, 100.0) as u64);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Width command handlers
// ---------------------------------------------------------------------------

fn cmd_open(args: OpenArgs, json: bool) -> CmdResult {
    let vault = load_vault_cwd()?;
    let _lock = FileLock::acquire_default(&vault.data_dir)?;
    let cwd = std::env::current_dir()?;
    let rel = vault_io::resolve_note_path(&vault.root, &cwd, &args.note)?;
    let mut note = vault_io::read_note(&vault.root, &rel)?;
    let mut store = WidthStore::open(&vault.data_dir);

    let mut session = read_state(&vault);
    session.activate(&note_label(&note), Utc::now());

    let mut sink = |width: Width| debug!(%width, "applying width");
    let Some(resolution) = commands::open_note(
        &vault.settings,
        Some(&mut note as &mut dyn FrontMatter),
        &mut store,
        &mut sink,
    ) else {
        return Ok(());
    };

    vault_io::save_note(&vault.root, &mut note)?;
    store.close()?;
    remember_width(&vault, &mut session, resolution.width);

    let style = style_for(resolution.width, &args.editor);
    print_resolution(&note_label(&note), &resolution, style, json)
}

fn cmd_close() -> CmdResult {
    let vault = load_vault_cwd()?;
    let mut session = read_state(&vault);
    session.clear();
    state::write_session_state(&vault.data_dir, &session)?;
    Ok(())
}

fn cmd_status(json: bool) -> CmdResult {
    let vault = load_vault_cwd()?;
    let session = read_state(&vault);
    let store = WidthStore::open(&vault.data_dir);
    let settings = &vault.settings;

    let status = StatusJson {
        active_note: session.active_note.clone(),
        activated_at: session.activated_at.map(|t| t.to_rfc3339()),
        last_width: session.last_width,
        width_percentage: settings.width_percentage,
        default_note_width: settings.default_note_width,
        yaml_key: settings.yaml_key.clone(),
        sources: source_list(settings),
        records: store.len(),
        database_writable: store.is_persistent(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }
    Ok(())
}

fn cmd_set(args: WidthArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    let _lock = FileLock::acquire_default(&vault.data_dir)?;
    let mut session = read_state(&vault);
    let mut note = active_note(&vault, &session).ok_or(CommandError::NoActiveNote)?;
    let mut store = WidthStore::open(&vault.data_dir);

    let mut sink = |width: Width| debug!(%width, "applying width");
    let resolution = commands::change_note_width(
        &mut vault.settings,
        Width::clamped(args.width),
        Some(&mut note as &mut dyn FrontMatter),
        &mut store,
        &mut sink,
    )?;

    vault_io::save_note(&vault.root, &mut note)?;
    store.close()?;
    save_widths(&vault)?;
    remember_width(&vault, &mut session, resolution.width);

    print_resolution(&note_label(&note), &resolution, None, json)
}

fn cmd_default(args: WidthArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    let _lock = FileLock::acquire_default(&vault.data_dir)?;
    let width = commands::change_default_note_width(&mut vault.settings, Width::clamped(args.width))?;
    save_widths(&vault)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&WidthJson { width })?);
    } else {
        println!("default note width: {}%", width);
    }
    Ok(())
}

fn cmd_all(args: WidthArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    let _lock = FileLock::acquire_default(&vault.data_dir)?;
    let notes = vault_io::list_notes(&vault.root)?;
    let mut store = WidthStore::open(&vault.data_dir);
    let width = Width::clamped(args.width);

    let cancel = cancel_flag();
    let mut progress = BarProgress::new("changing note widths", json);
    let report = bulk::change_all_note_width(
        &vault.root,
        &notes,
        &mut vault.settings,
        &mut store,
        width,
        &cancel,
        &mut progress,
    );

    store.close()?;
    save_widths(&vault)?;
    let mut session = read_state(&vault);
    remember_width(&vault, &mut session, width);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_bulk(&report, width));
    }
    Ok(())
}

fn cmd_input(args: InputArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    if !vault.settings.enable_text_input {
        return Err("text input is disabled (enable_text_input = false)".into());
    }
    let _lock = FileLock::acquire_default(&vault.data_dir)?;
    let mut session = read_state(&vault);

    let mut handler = EventHandler::default();
    let now = Instant::now();
    let (width, scheduled) = handler.on_text_input(now, &mut vault.settings, &args.text);
    save_widths(&vault)?;

    let mut resolved = None;
    if scheduled
        && let Some(mut note) = active_note(&vault, &session)
    {
        let mut store = WidthStore::open(&vault.data_dir);
        for run in handler.poll(now + EDIT_DELAY) {
            let mut sink = |width: Width| debug!(%width, "applying width");
            if let Some(resolution) = Resolver::new(&vault.settings).resolve(
                run.trigger(),
                Some(&mut note as &mut dyn FrontMatter),
                &mut store,
                &mut sink,
            ) {
                resolved = Some(resolution);
            }
        }
        vault_io::save_note(&vault.root, &mut note)?;
        store.close()?;
        if let Some(resolution) = &resolved {
            remember_width(&vault, &mut session, resolution.width);
            return print_resolution(&note_label(&note), resolution, None, json);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&WidthJson { width })?);
    } else {
        println!("width: {}%", width);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings handlers
// ---------------------------------------------------------------------------

fn cmd_config(args: ConfigCmd, json: bool) -> CmdResult {
    let vault = load_vault_cwd()?;
    match args.action {
        ConfigAction::List => {
            if json {
                println!("{}", serde_json::to_string_pretty(&vault.settings)?);
            } else {
                print!("{}", toml::to_string(&vault.settings)?);
            }
        }
        ConfigAction::Get { key } => {
            let value = settings_io::get_setting(&vault.settings, &key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let _lock = FileLock::acquire_default(&vault.data_dir)?;
            let (_, mut doc) = settings_io::read_settings(&vault.data_dir)?;
            let updated = settings_io::set_setting(&mut doc, &key, &value)?;
            settings_io::write_settings(&vault.data_dir, &doc)?;

            let old_key = &vault.settings.yaml_key;
            if key == "yaml_key" && *old_key != updated.yaml_key {
                let notes = vault_io::list_notes(&vault.root)?;
                let cancel = cancel_flag();
                let mut progress = BarProgress::new("renaming front-matter key", json);
                let report = bulk::rename_yaml_key_in_all_notes(
                    &vault.root,
                    &notes,
                    old_key,
                    &updated.yaml_key,
                    &cancel,
                    &mut progress,
                );
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!(
                        "renamed {} to {} in {} note(s)",
                        old_key,
                        updated.yaml_key,
                        report.changed.len()
                    );
                    for note in &report.skipped {
                        println!("  skipped {} (could not read or write it)", note.display());
                    }
                }
            }
            let shown = settings_io::get_setting(&updated, &key)?;
            if !json {
                println!("{} = {}", key, shown);
            }
        }
    }
    Ok(())
}

fn cmd_priority(args: PriorityArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    let kind = SourceKind::parse_source(&args.source)
        .ok_or_else(|| format!("unknown source '{}' (use saved or yaml)", args.source))?;
    let _lock = FileLock::acquire_default(&vault.data_dir)?;

    let list = &mut vault.settings.priority_list;
    let moved = match args.direction {
        Direction::Up => list.move_up(kind),
        Direction::Down => list.move_down(kind),
    };
    if moved {
        let (_, mut doc) = settings_io::read_settings(&vault.data_dir)?;
        settings_io::set_priority_list(&mut doc, list);
        settings_io::write_settings(&vault.data_dir, &doc)?;
    }

    let sources = source_list(&vault.settings);
    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
    } else {
        if !moved {
            println!("{} is already {}", kind, match args.direction {
                Direction::Up => "first",
                Direction::Down => "last",
            });
        }
        for source in &sources {
            println!("{}. {}", source.priority, source.label);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance handlers
// ---------------------------------------------------------------------------

fn cmd_check(args: CheckArgs, json: bool) -> CmdResult {
    let vault = load_vault_cwd()?;
    let _lock = if args.prune {
        Some(FileLock::acquire_default(&vault.data_dir)?)
    } else {
        None
    };
    let notes = vault_io::list_notes(&vault.root)?;
    let mut store = WidthStore::open(&vault.data_dir);
    let result = check::check_vault(&vault.root, &notes, &vault.settings, &store)?;

    let pruned = if args.prune {
        let count = check::prune_orphans(&mut store, &result);
        store.flush()?;
        count
    } else {
        0
    };

    if json {
        let out = PruneJson {
            check: &result,
            pruned,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_check(&result));
        if args.prune {
            println!("pruned {} orphaned record(s)", pruned);
        }
    }
    Ok(())
}

fn cmd_style(args: StyleArgs, json: bool) -> CmdResult {
    let width = match args.width {
        Some(w) => Width::clamped(w),
        None => load_vault_cwd()?.settings.width_percentage,
    };
    let rule = style::style_rule(width, args.editor_width, args.char_width)
        .ok_or("character width must be a positive number")?;
    if json {
        let out = serde_json::json!({ "width": width, "style": rule });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", rule);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

fn is_own_write(vault: &Vault, own_write: Option<&(PathBuf, String)>) -> bool {
    let Some((rel, written)) = own_write else {
        return false;
    };
    std::fs::read_to_string(vault.note_path(rel)).is_ok_and(|content| content == *written)
}

fn cmd_watch(args: WatchArgs, json: bool) -> CmdResult {
    let mut vault = load_vault_cwd()?;
    let watcher = VaultWatcher::start(&vault.root)?;
    let stop = cancel_flag();
    let deadline = args.timeout.map(|s| Instant::now() + Duration::from_secs(s));

    let mut handler = EventHandler::default();
    let mut store = WidthStore::open(&vault.data_dir);
    let mut session = read_state(&vault);
    let mut current = session.active_note.clone();
    // Content this loop last wrote, so its own saves don't re-trigger it
    let mut own_write: Option<(PathBuf, String)> = None;
    if let Some(note) = &current {
        handler.on_active_note_changed(Instant::now(), PathBuf::from(note));
    }

    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }
        let wait = handler
            .next_deadline()
            .map_or(WATCH_IDLE, |d| d.saturating_duration_since(now).min(WATCH_IDLE));

        if let Some(first) = watcher.wait(wait) {
            let mut events = vec![first];
            events.extend(watcher.poll());
            for event in events {
                match event {
                    VaultEvent::SessionChanged => {
                        session = read_state(&vault);
                        if session.active_note != current {
                            current = session.active_note.clone();
                            match &current {
                                Some(note) => handler.on_active_note_changed(Instant::now(), PathBuf::from(note)),
                                None => handler.cancel_all(),
                            }
                        }
                    }
                    VaultEvent::SettingsChanged => match settings_io::read_settings(&vault.data_dir) {
                        Ok((settings, _)) => {
                            vault.settings = settings;
                            if let Some(note) = &current {
                                handler.on_active_note_changed(Instant::now(), PathBuf::from(note));
                            }
                        }
                        Err(e) => warn!(error = %e, "ignoring unreadable settings"),
                    },
                    VaultEvent::NotesChanged(paths) => {
                        if let Some(note) = &current
                            && paths.iter().any(|p| p == Path::new(note))
                            && !is_own_write(&vault, own_write.as_ref())
                        {
                            handler.on_active_note_changed(Instant::now(), PathBuf::from(note));
                        }
                    }
                }
            }
        }

        for run in handler.poll(Instant::now()) {
            let Run::Activate(rel) = &run else {
                continue;
            };
            let _lock = FileLock::acquire_default(&vault.data_dir)?;
            // Other nw processes may have bound notes or switched notes since
            store.reload();
            session = read_state(&vault);
            if session.active_note.as_deref().map(Path::new) != Some(rel.as_path()) {
                continue;
            }
            let mut note = match vault_io::read_note(&vault.root, rel) {
                Ok(note) => note,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable note");
                    continue;
                }
            };
            let mut sink = |width: Width| debug!(%width, "applying width");
            let Some(resolution) = Resolver::new(&vault.settings).resolve(
                run.trigger(),
                Some(&mut note as &mut dyn FrontMatter),
                &mut store,
                &mut sink,
            ) else {
                continue;
            };
            if vault_io::save_note(&vault.root, &mut note)? {
                own_write = Some((note.path().to_path_buf(), note.content().to_string()));
            }
            store.flush()?;
            remember_width(&vault, &mut session, resolution.width);

            let style = style_for(resolution.width, &args.editor);
            if json {
                let out = ResolutionJson {
                    note: note_label(&note),
                    resolution: &resolution,
                    style,
                };
                println!("{}", serde_json::to_string(&out)?);
            } else {
                println!("{}", format_resolution(&note_label(&note), &resolution, style.as_deref()));
            }
        }
    }

    store.close()?;
    Ok(())
}
