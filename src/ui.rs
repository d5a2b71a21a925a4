use crate::model::{Mood, RepeatMode, TransportStatus};
use crate::player::Player;
use crate::visualizer::PixelBuffer;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE: &str = "moodtune  ";

#[derive(Clone, Copy)]
struct MoodPalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
}

fn palette(mood: Mood) -> MoodPalette {
    match mood {
        Mood::Happy => MoodPalette {
            bg: Color::Rgb(34, 21, 44),
            panel_bg: Color::Rgb(51, 29, 68),
            panel_alt_bg: Color::Rgb(66, 38, 86),
            border: Color::Rgb(245, 146, 208),
            text: Color::Rgb(255, 233, 250),
            muted: Color::Rgb(224, 173, 219),
            accent: Color::Rgb(255, 214, 102),
            alert: Color::Rgb(255, 199, 150),
            selected_bg: Color::Rgb(90, 49, 114),
        },
        Mood::Sad => MoodPalette {
            bg: Color::Rgb(10, 15, 24),
            panel_bg: Color::Rgb(19, 29, 43),
            panel_alt_bg: Color::Rgb(24, 38, 58),
            border: Color::Rgb(69, 121, 176),
            text: Color::Rgb(214, 228, 248),
            muted: Color::Rgb(149, 173, 204),
            accent: Color::Rgb(100, 160, 230),
            alert: Color::Rgb(249, 174, 88),
            selected_bg: Color::Rgb(34, 55, 82),
        },
        Mood::Neutral => MoodPalette {
            bg: Color::Rgb(0, 0, 0),
            panel_bg: Color::Rgb(8, 8, 8),
            panel_alt_bg: Color::Rgb(15, 15, 15),
            border: Color::Rgb(74, 74, 74),
            text: Color::Rgb(242, 242, 242),
            muted: Color::Rgb(150, 150, 150),
            accent: Color::Rgb(100, 203, 184),
            alert: Color::Rgb(235, 176, 97),
            selected_bg: Color::Rgb(26, 26, 26),
        },
        Mood::Anxious => MoodPalette {
            bg: Color::Rgb(7, 8, 23),
            panel_bg: Color::Rgb(18, 16, 44),
            panel_alt_bg: Color::Rgb(27, 25, 61),
            border: Color::Rgb(108, 107, 205),
            text: Color::Rgb(227, 225, 252),
            muted: Color::Rgb(167, 165, 210),
            accent: Color::Rgb(188, 164, 255),
            alert: Color::Rgb(255, 189, 121),
            selected_bg: Color::Rgb(40, 37, 86),
        },
        Mood::Angry => MoodPalette {
            bg: Color::Rgb(16, 2, 2),
            panel_bg: Color::Rgb(30, 6, 7),
            panel_alt_bg: Color::Rgb(44, 10, 11),
            border: Color::Rgb(176, 38, 38),
            text: Color::Rgb(245, 214, 214),
            muted: Color::Rgb(188, 133, 133),
            accent: Color::Rgb(255, 92, 92),
            alert: Color::Rgb(255, 171, 83),
            selected_bg: Color::Rgb(72, 17, 19),
        },
    }
}

/// Screen regions for one frame. `tracks` and `lyrics` are empty when the
/// visualizer is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppLayout {
    pub header: Rect,
    pub tracks: Rect,
    pub visual: Rect,
    pub lyrics: Rect,
    pub timeline: Rect,
    pub footer: Rect,
}

pub fn layout(area: Rect, expanded: bool) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    if expanded {
        return AppLayout {
            header: vertical[0],
            visual: vertical[1],
            timeline: vertical[2],
            footer: vertical[3],
            ..AppLayout::default()
        };
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(vertical[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(4)])
        .split(body[1]);

    AppLayout {
        header: vertical[0],
        tracks: body[0],
        visual: side[0],
        lyrics: side[1],
        timeline: vertical[2],
        footer: vertical[3],
    }
}

/// Pixel size the visualizer should render at for `area`: one column per
/// cell, two rows per cell (half blocks), borders excluded.
pub fn canvas_size(area: Rect) -> (usize, usize) {
    let inner = inner_rect(area);
    (usize::from(inner.width), usize::from(inner.height) * 2)
}

/// First list row shown so that `current` stays visible.
pub fn list_offset(current: usize, visible_rows: usize) -> usize {
    if visible_rows == 0 {
        return 0;
    }
    current.saturating_sub(visible_rows - 1)
}

/// Rows of the track list paged away from the current track. Following
/// resumes as soon as the current index moves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackScroll {
    top: Option<(usize, usize)>,
}

impl TrackScroll {
    pub fn offset(&self, current: usize, visible_rows: usize, len: usize) -> usize {
        match self.top {
            Some((top, anchor)) if anchor == current => top.min(len.saturating_sub(visible_rows)),
            _ => list_offset(current, visible_rows),
        }
    }

    pub fn scroll_by(&mut self, rows: isize, current: usize, visible_rows: usize, len: usize) {
        let from = self.offset(current, visible_rows, len);
        let top = from
            .saturating_add_signed(rows)
            .min(len.saturating_sub(visible_rows));
        self.top = Some((top, current));
    }
}

/// Rows the track panel shows inside its border.
pub fn track_rows(tracks: Rect) -> usize {
    usize::from(inner_rect(tracks).height)
}

/// Track index under terminal row `y` of the track panel, if any.
pub fn track_at(
    tracks: Rect,
    y: u16,
    scroll: &TrackScroll,
    current: usize,
    len: usize,
) -> Option<usize> {
    let inner = inner_rect(tracks);
    if inner.height == 0 || y < inner.y || y >= inner.y.saturating_add(inner.height) {
        return None;
    }
    let offset = scroll.offset(current, usize::from(inner.height), len);
    let index = offset + usize::from(y - inner.y);
    (index < len).then_some(index)
}

pub fn draw(
    frame: &mut Frame,
    player: &Player,
    scroll: &TrackScroll,
    lyric: Option<&str>,
    message: &str,
) {
    let colors = palette(player.mood());
    let areas = layout(frame.area(), player.is_expanded());
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    draw_header(frame, player, areas.header, &colors);
    if !player.is_expanded() {
        draw_tracks(frame, player, scroll, areas.tracks, &colors);
        draw_lyrics(frame, lyric, areas.lyrics, &colors);
    }
    draw_visual(frame, player, areas.visual, &colors);
    draw_timeline(frame, player, areas.timeline, &colors);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "space play, shift+arrows skip, arrows seek/vol, m mute, l like, s shuffle, r repeat, tab mood, f expand, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(message, Style::default().fg(colors.text)),
    ]))
    .block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, areas.footer);
}

fn draw_header(frame: &mut Frame, player: &Player, area: Rect, colors: &MoodPalette) {
    let status_color = match player.status() {
        TransportStatus::Playing => colors.accent,
        TransportStatus::Transitioning => colors.alert,
        TransportStatus::Paused | TransportStatus::Stopped => colors.muted,
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ({})", player.playlist().title, player.playlist().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Mood {}", player.mood().label()),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(player.status().label(), Style::default().fg(status_color)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(player.device_name(), Style::default().fg(colors.muted)),
    ]))
    .block(panel_block(
        "Status",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(header, area);
}

fn draw_tracks(
    frame: &mut Frame,
    player: &Player,
    scroll: &TrackScroll,
    area: Rect,
    colors: &MoodPalette,
) {
    let current = player.current_index();
    let items: Vec<ListItem> = player
        .playlist()
        .tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if index == current && player.state().is_playing() {
                "  > "
            } else {
                "    "
            };
            let like = if player.is_liked(&track.id) { "♥ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(like, Style::default().fg(colors.alert)),
                Span::styled(track.title.as_str(), Style::default().fg(colors.text)),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let offset = scroll.offset(current, track_rows(area), items.len());
    let mut state = ListState::default()
        .with_offset(offset)
        .with_selected((!items.is_empty()).then_some(current));

    let list = List::new(items)
        .block(panel_block(
            "Tracks",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_lyrics(frame: &mut Frame, lyric: Option<&str>, area: Rect, colors: &MoodPalette) {
    let text = Paragraph::new(Span::styled(
        lyric.unwrap_or("-"),
        Style::default()
            .fg(colors.text)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .block(panel_block(
        "Lyrics",
        colors.panel_alt_bg,
        colors.text,
        colors.border,
    ))
    .wrap(Wrap { trim: true });
    frame.render_widget(text, area);
}

fn draw_visual(frame: &mut Frame, player: &Player, area: Rect, colors: &MoodPalette) {
    let block = panel_block(
        "Visualizer",
        colors.panel_alt_bg,
        colors.text,
        colors.border,
    );
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let lines = half_block_lines(
        player.visualizer().surface(),
        usize::from(inner.width),
        usize::from(inner.height),
    );
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Packs two pixel rows into each terminal row with `▀`: the foreground is
/// the top pixel, the background the bottom one.
pub fn half_block_lines(buffer: &PixelBuffer, cols: usize, rows: usize) -> Vec<Line<'static>> {
    let color_at = |x: usize, y: usize| {
        buffer
            .pixel(x, y)
            .map(|[r, g, b, _]| Color::Rgb(r, g, b))
            .unwrap_or(Color::Reset)
    };

    (0..rows)
        .map(|row| {
            let spans: Vec<Span<'static>> = (0..cols)
                .map(|col| {
                    Span::styled(
                        "▀",
                        Style::default()
                            .fg(color_at(col, row * 2))
                            .bg(color_at(col, row * 2 + 1)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_timeline(frame: &mut Frame, player: &Player, area: Rect, colors: &MoodPalette) {
    let timeline = Paragraph::new(Line::from(vec![
        Span::styled(timeline_text(player, 26, 10), Style::default().fg(colors.text)),
        Span::styled("  ", Style::default()),
        Span::styled(pulse_dots(&player.visualizer().pulse()), Style::default().fg(colors.accent)),
    ]))
    .block(panel_block(
        "Timeline",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(timeline, area);
}

fn timeline_text(player: &Player, timeline_bar_width: usize, volume_bar_width: usize) -> String {
    let state = player.state();
    let ratio = state.duration.and_then(|duration| {
        let total = duration.as_secs_f64();
        (total > 0.0).then_some((state.elapsed.as_secs_f64() / total).clamp(0.0, 1.0))
    });
    let volume = if state.muted { 0.0 } else { state.volume };
    let volume_percent = (volume * 100.0).round() as u16;
    let repeat = match state.repeat {
        RepeatMode::None => "off",
        RepeatMode::All => "all",
        RepeatMode::One => "one",
    };

    format!(
        "{} / {} {}  |  Vol {} {:>3}%{}  |  Shuffle {}  Repeat {}",
        format_duration(state.elapsed),
        state
            .duration
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(f64::from(volume)), volume_bar_width),
        volume_percent,
        if state.muted { " muted" } else { "" },
        if state.shuffle { "on" } else { "off" },
        repeat,
    )
}

fn pulse_dots(pulse: &[u8]) -> String {
    pulse
        .iter()
        .map(|level| match level {
            0..=63 => '·',
            64..=127 => '∙',
            128..=191 => '•',
            _ => '●',
        })
        .collect()
}

fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
