use crate::audio::{AudioDevice, NullDevice, RodioDevice};
use crate::catalog::Catalog;
use crate::config;
use crate::keymap::{Action, Keymap};
use crate::library;
use crate::lyrics::{self, LyricCue};
use crate::model::{Mood, Playlist};
use crate::player::Player;
use crate::ui;
use anyhow::{Result, bail};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(100);
const REDRAW_EVERY: Duration = Duration::from_millis(33);

#[derive(Debug, Default, Clone)]
pub struct AppOptions {
    pub catalog: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub playlist: Option<String>,
    pub mood: Option<Mood>,
}

/// Picks the playlist to play: a scanned folder wins, then an explicit
/// playlist id, then the first playlist matching the mood.
pub fn choose_playlist(catalog: &Catalog, options: &AppOptions, mood: Mood) -> Result<Playlist> {
    if let Some(folder) = options.folder.as_deref() {
        return Ok(library::scan_folder(folder, mood));
    }
    if let Some(id) = options.playlist.as_deref() {
        let Some(playlist) = catalog.playlist(id) else {
            bail!("playlist {id} is not in the catalog");
        };
        return Ok(playlist.clone());
    }
    match catalog.for_mood(mood) {
        Some(playlist) => Ok(playlist.clone()),
        None => bail!("catalog is empty; pass --folder or --catalog"),
    }
}

fn open_device() -> Box<dyn AudioDevice> {
    match RodioDevice::new() {
        Ok(device) => Box::new(device),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "no audio output; continuing silent");
            Box::new(NullDevice::new())
        }
    }
}

/// Lyric cue for the current track: a sidecar file when there is one,
/// otherwise the built-in text for the mood.
struct LyricSlot {
    key: Option<(String, Mood)>,
    cue: LyricCue,
}

impl LyricSlot {
    fn new() -> Self {
        Self {
            key: None,
            cue: lyrics::cue_for(Mood::default()),
        }
    }

    fn line<'a>(&'a mut self, player: &Player) -> Option<&'a str> {
        let track = player.current_track()?;
        let key = (track.id.clone(), player.mood());
        if self.key.as_ref() != Some(&key) {
            self.cue = match lyrics::load_for_track(track) {
                Ok(Some(cue)) => cue,
                Ok(None) => lyrics::cue_for(player.mood()),
                Err(err) => {
                    tracing::warn!(track = %track.id, error = %format!("{err:#}"), "lyrics unreadable");
                    lyrics::cue_for(player.mood())
                }
            };
            self.key = Some(key);
        }
        let state = player.state();
        self.cue.line_for(state.elapsed, state.duration)
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let mut settings = config::load_settings()?;
    if let Some(mood) = options.mood {
        settings.mood = mood;
    }
    let catalog_path = match options.catalog.clone() {
        Some(path) => path,
        None => config::default_catalog_path()?,
    };
    let catalog = config::load_catalog(&catalog_path)?;
    let playlist = choose_playlist(&catalog, &options, settings.mood)?;

    let mut player = Player::new(playlist, open_device(), &settings, Instant::now());

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut player);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    player.store_settings(&mut settings);
    player.teardown();
    let save_result = config::save_settings(&settings);
    result?;
    save_result?;
    Ok(())
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    player: &mut Player,
) -> Result<()> {
    let keymap = Keymap::new();
    let mut lyric = LyricSlot::new();
    let mut message = String::new();
    let mut areas = ui::AppLayout::default();
    let mut scroll = ui::TrackScroll::default();
    let mut last_draw: Option<Instant> = None;

    loop {
        let now = Instant::now();
        player.tick(now);
        if let Some(failure) = player.failure() {
            message = format!("{failure}");
        }

        if last_draw.is_none_or(|at| now.duration_since(at) >= REDRAW_EVERY) {
            let size = terminal.size()?;
            areas = ui::layout(Rect::new(0, 0, size.width, size.height), player.is_expanded());
            let (w, h) = ui::canvas_size(areas.visual);
            player.resize_visualizer(w, h);

            let line = lyric.line(player).map(str::to_string);
            terminal.draw(|frame| ui::draw(frame, player, &scroll, line.as_deref(), &message))?;
            last_draw = Some(now);
        }

        let wait = player
            .next_deadline()
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(REDRAW_EVERY);
        if !event::poll(wait)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if is_quit(key) {
                    return Ok(());
                }
                let (action, host_default) = route_key(&keymap, key);
                if let Some(action) = action {
                    tracing::trace!(?action, "key");
                    message.clear();
                    player.apply(action);
                }
                let visible = ui::track_rows(areas.tracks);
                if host_default && let Some(step) = list_step(key, visible) {
                    scroll.scroll_by(step, player.current_index(), visible, player.playlist().len());
                    last_draw = None;
                }
            }
            Event::Mouse(mouse) => handle_mouse(player, mouse, areas.tracks, &scroll),
            Event::Resize(_, _) => last_draw = None,
            _ => {}
        }
    }
}

fn is_quit(key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

/// The player action for `key`, and whether the host still applies its own
/// handling (list paging) to it.
fn route_key(keymap: &Keymap, key: KeyEvent) -> (Option<Action>, bool) {
    match keymap.resolve(key) {
        Some(outcome) => (Some(outcome.action), !outcome.prevent_default),
        None => (None, key.kind == KeyEventKind::Press),
    }
}

/// Track list paging for keys the player leaves alone.
fn list_step(key: KeyEvent, visible_rows: usize) -> Option<isize> {
    let page = isize::try_from(visible_rows.max(1)).unwrap_or(1);
    match key.code {
        KeyCode::Up => Some(-1),
        KeyCode::Down => Some(1),
        KeyCode::PageUp => Some(-page),
        KeyCode::PageDown => Some(page),
        _ => None,
    }
}

fn handle_mouse(player: &mut Player, mouse: MouseEvent, tracks: Rect, scroll: &ui::TrackScroll) {
    if !point_in_rect(mouse.column, mouse.row, tracks) {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(index) = ui::track_at(
                tracks,
                mouse.row,
                scroll,
                player.current_index(),
                player.playlist().len(),
            ) {
                player.select(index);
            }
        }
        MouseEventKind::ScrollDown => player.next(),
        MouseEventKind::ScrollUp => player.previous(),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;
    use crossterm::event::KeyEventState;

    fn playlist(id: &str, mood: Mood) -> Playlist {
        Playlist {
            id: id.to_string(),
            title: id.to_string(),
            mood,
            tracks: vec![Track {
                id: format!("{id}-1"),
                title: String::from("One"),
                artist: String::from("Artist"),
                duration: None,
                source: PathBuf::from("one.mp3"),
                cover: None,
            }],
        }
    }

    #[test]
    fn playlist_choice_prefers_id_then_mood() {
        let catalog = Catalog::new(vec![
            playlist("calm", Mood::Neutral),
            playlist("storm", Mood::Angry),
        ]);
        let by_mood = choose_playlist(&catalog, &AppOptions::default(), Mood::Angry)
            .expect("mood playlist");
        assert_eq!(by_mood.id, "storm");

        let options = AppOptions {
            playlist: Some(String::from("calm")),
            ..AppOptions::default()
        };
        let by_id = choose_playlist(&catalog, &options, Mood::Angry).expect("id playlist");
        assert_eq!(by_id.id, "calm");

        let missing = AppOptions {
            playlist: Some(String::from("nope")),
            ..AppOptions::default()
        };
        assert!(choose_playlist(&catalog, &missing, Mood::Happy).is_err());
        assert!(choose_playlist(&Catalog::default(), &AppOptions::default(), Mood::Happy).is_err());
    }

    #[test]
    fn folder_option_scans_instead_of_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.mp3"), b"not really audio").expect("write");
        let options = AppOptions {
            folder: Some(dir.path().to_path_buf()),
            ..AppOptions::default()
        };
        let chosen = choose_playlist(&Catalog::default(), &options, Mood::Sad).expect("scan");
        assert_eq!(chosen.mood, Mood::Sad);
        assert_eq!(chosen.tracks.len(), 1);
    }

    #[test]
    fn quit_keys() {
        let key = |code, modifiers| KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        assert!(is_quit(key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(is_quit(key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!is_quit(key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn claimed_navigation_keys_skip_list_paging() {
        let keymap = Keymap::new();
        let key = |code, modifiers| KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        };

        let (action, host) = route_key(&keymap, key(KeyCode::Up, KeyModifiers::NONE));
        assert_eq!(action, Some(Action::VolumeUp));
        assert!(!host);

        let (action, host) = route_key(&keymap, key(KeyCode::Char('n'), KeyModifiers::NONE));
        assert_eq!(action, Some(Action::Next));
        assert!(host);
        assert_eq!(list_step(key(KeyCode::Char('n'), KeyModifiers::NONE), 4), None);

        let (action, host) = route_key(&keymap, key(KeyCode::Down, KeyModifiers::CONTROL));
        assert_eq!(action, None);
        assert!(host);
        assert_eq!(list_step(key(KeyCode::Down, KeyModifiers::CONTROL), 4), Some(1));
        assert_eq!(list_step(key(KeyCode::PageUp, KeyModifiers::NONE), 4), Some(-4));

        let release = KeyEvent {
            kind: KeyEventKind::Release,
            ..key(KeyCode::PageDown, KeyModifiers::NONE)
        };
        assert_eq!(route_key(&keymap, release), (None, false));
    }

    #[test]
    fn point_in_rect_excludes_far_edges() {
        let rect = Rect::new(2, 2, 3, 3);
        assert!(point_in_rect(2, 2, rect));
        assert!(!point_in_rect(5, 2, rect));
        assert!(!point_in_rect(0, 0, Rect::default()));
    }
}
