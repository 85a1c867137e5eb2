//! Terminal rendering for the interactive dashboard.
//!
//! Pure presentation: every draw works from a cloned [`DashboardState`]
//! received over the controller's watch channel.

use std::io;
use std::sync::Arc;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    prelude::{Backend, Frame},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
};
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::stats::nearest_rank;

use super::controller::DashboardController;
use super::state::{DashboardState, History, RunStatus};

const DISTRIBUTION_BUCKETS: usize = 5;
const DISTRIBUTION_BAR_WIDTH: usize = 30;
const STATUS_BAR_WIDTH: usize = 20;

pub struct Ui;

pub trait UiActions {
    /// Initializes the terminal for UI rendering.
    ///
    /// # Errors
    ///
    /// Returns an error when terminal setup fails.
    fn setup_terminal() -> AppResult<Terminal<CrosstermBackend<io::Stdout>>>;
    fn cleanup();
    fn render<B: Backend>(terminal: &mut Terminal<B>, state: &DashboardState);
}

impl UiActions for Ui {
    fn setup_terminal() -> AppResult<Terminal<CrosstermBackend<io::Stdout>>> {
        enable_raw_mode()?;
        if let Err(err) = execute!(io::stdout(), EnterAlternateScreen) {
            disable_raw_mode().ok();
            return Err(err.into());
        }

        let backend = CrosstermBackend::new(io::stdout());
        match Terminal::new(backend) {
            Ok(mut terminal) => {
                if let Err(err) = terminal.clear() {
                    Self::cleanup();
                    return Err(err.into());
                }
                Ok(terminal)
            }
            Err(err) => {
                Self::cleanup();
                Err(err.into())
            }
        }
    }

    fn cleanup() {
        disable_raw_mode().ok();
        execute!(io::stdout(), LeaveAlternateScreen).ok();
    }

    fn render<B: Backend>(terminal: &mut Terminal<B>, state: &DashboardState) {
        if let Err(err) = terminal.draw(|f| draw_frame(f, state)) {
            eprintln!("Failed to render dashboard: {}", err);
        }
    }
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        Ui::cleanup();
    }
}

#[must_use]
pub fn spawn_render_task(controller: &Arc<DashboardController>) -> JoinHandle<()> {
    let mut updates_rx = controller.subscribe_updates();
    let mut shutdown_rx = controller.subscribe_shutdown();
    tokio::spawn(async move {
        let mut terminal = match Ui::setup_terminal() {
            Ok(terminal) => terminal,
            Err(err) => {
                eprintln!("Failed to setup terminal: {}", err);
                return;
            }
        };
        let _guard = TerminalGuard;

        loop {
            tokio::select! {
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                res = updates_rx.changed() => {
                    if res.is_ok() {
                        let state = updates_rx.borrow_and_update().clone();
                        Ui::render(&mut terminal, &state);
                    } else {
                        break;
                    }
                }
            }
        }
    })
}

pub fn draw_frame<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(u16::try_from(DISTRIBUTION_BUCKETS).unwrap_or(5) + 2),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(f.size());

    let [header, progress, stats_line, charts, histogram, breakdown, controls] = chunks.as_ref()
    else {
        return;
    };

    render_header(f, state, *header);
    render_progress(f, state, *progress);
    render_stats_line(f, state, *stats_line);
    render_charts(f, state, *charts);
    render_histogram(f, state, *histogram);
    render_breakdown(f, state, *breakdown);
    render_controls(f, state, *controls);
}

fn status_indicator(status: RunStatus) -> (&'static str, Color, &'static str) {
    match status {
        RunStatus::Running => ("▶", Color::Green, "Running"),
        RunStatus::Paused => ("⏸", Color::Yellow, "Paused"),
        RunStatus::Completed => ("✓", Color::Cyan, "Complete"),
        RunStatus::Stopped => ("⏹", Color::Red, "Stopped"),
    }
}

fn render_header<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let (symbol, color, label) = status_indicator(state.status);
    let lines = vec![
        Line::from(vec![
            Span::styled("Load Test: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(state.target.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("   "),
            Span::styled(
                format!("{} {}", symbol, label),
                Style::default().fg(color),
            ),
        ]),
        Line::from(Span::styled(
            format!(
                "Requests: {} | Concurrency: {}",
                state.total_requests, state.concurrency
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn render_progress<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let ratio = if state.total_requests > 0 {
        (state.completed as f64 / state.total_requests as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .label(format!(
            "{}/{} ({:.1}%)",
            state.completed,
            state.total_requests,
            ratio * 100.0
        ))
        .ratio(ratio);
    f.render_widget(gauge, area);
}

fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else {
        let mins = (seconds / 60.0).floor();
        format!("{}m {:.0}s", mins, seconds - mins * 60.0)
    }
}

fn eta_text(state: &DashboardState, elapsed: f64) -> String {
    if state.completed == 0 || state.completed >= state.total_requests || elapsed <= 0.0 {
        return "-".to_owned();
    }
    let rate = state.completed as f64 / elapsed;
    format_time((state.total_requests - state.completed) as f64 / rate)
}

fn render_stats_line<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let elapsed = state.elapsed_secs();
    let error_style = if state.error_count > 0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };
    let line = Line::from(vec![
        Span::raw(format!("Elapsed: {}", format_time(elapsed))),
        Span::raw(format!(" | ETA: {}", eta_text(state, elapsed))),
        Span::styled(
            format!(" | RPS: {:.1}", state.overall_rps()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!(" | Avg: {:.0}ms", state.avg_latency_ms()),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(format!(" | Errors: {}", state.error_count), error_style),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn chart_points(history: &History) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(index, sample)| (index as f64, sample))
        .collect()
}

fn render_series_chart<B: Backend>(
    f: &mut Frame<'_, B>,
    title: &str,
    points: &[(f64, f64)],
    color: Color,
    area: Rect,
) {
    let y_max = points
        .iter()
        .map(|&(_, y)| y)
        .fold(1.0_f64, f64::max)
        .ceil();
    let x_max = (points.len().saturating_sub(1) as f64).max(1.0);

    let datasets = vec![
        Dataset::default()
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(points),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().title(title.to_owned()).borders(Borders::ALL))
        .x_axis(Axis::default().bounds([0.0, x_max]))
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{:.0}", y_max)),
                ])
                .labels_alignment(Alignment::Center),
        );
    f.render_widget(chart, area);
}

fn render_charts<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let [rps_area, latency_area] = columns.as_ref() else {
        return;
    };

    render_series_chart(
        f,
        "Request Rate (req/s)",
        &chart_points(&state.rps_history),
        Color::Green,
        *rps_area,
    );
    render_series_chart(
        f,
        "Latency (ms)",
        &chart_points(&state.latency_history),
        Color::Magenta,
        *latency_area,
    );
}

struct DistributionBucket {
    label: String,
    count: u64,
}

fn distribution_buckets(durations_ms: &[f64]) -> Vec<DistributionBucket> {
    if durations_ms.is_empty() {
        return Vec::new();
    }

    let mut sorted = durations_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let min = sorted.first().copied().unwrap_or(0.0);
    let max = sorted.last().copied().unwrap_or(0.0);

    if (max - min).abs() < f64::EPSILON {
        return vec![DistributionBucket {
            label: format!("{:.0}ms", min),
            count: sorted.len() as u64,
        }];
    }

    let bucket_size = (max - min) / DISTRIBUTION_BUCKETS as f64;
    let mut counts = vec![0u64; DISTRIBUTION_BUCKETS];
    for duration in &sorted {
        let index = (((duration - min) / bucket_size) as usize).min(DISTRIBUTION_BUCKETS - 1);
        if let Some(slot) = counts.get_mut(index) {
            *slot += 1;
        }
    }

    counts
        .iter()
        .enumerate()
        .map(|(index, &count)| {
            let start = min + index as f64 * bucket_size;
            DistributionBucket {
                label: format!("{:.0}-{:.0}ms", start, start + bucket_size),
                count,
            }
        })
        .collect()
}

fn bar_spans(count: u64, max_count: u64, width: usize, color: Color) -> Vec<Span<'static>> {
    let filled = if max_count > 0 {
        ((count as f64 / max_count as f64) * width as f64).round() as usize
    } else {
        0
    };
    let filled = filled.min(width);
    vec![
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled(
            "░".repeat(width - filled),
            Style::default().fg(Color::DarkGray),
        ),
    ]
}

fn render_histogram<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let buckets = distribution_buckets(&state.durations_ms);
    let total: u64 = buckets.iter().map(|bucket| bucket.count).sum();

    let mut lines = Vec::with_capacity(buckets.len().max(1));
    if buckets.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No data yet...",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        let max_count = buckets.iter().map(|bucket| bucket.count).max().unwrap_or(0);
        let label_width = buckets
            .iter()
            .map(|bucket| bucket.label.len())
            .max()
            .unwrap_or(0);
        for bucket in &buckets {
            let percentage = if total > 0 {
                bucket.count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let mut spans = vec![Span::styled(
                format!("{:<width$} ", bucket.label, width = label_width),
                Style::default().fg(Color::DarkGray),
            )];
            spans.extend(bar_spans(
                bucket.count,
                max_count,
                DISTRIBUTION_BAR_WIDTH,
                Color::Green,
            ));
            spans.push(Span::raw(format!(" {} ({:.1}%)", bucket.count, percentage)));
            lines.push(Line::from(spans));
        }
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Latency Distribution")
            .borders(Borders::TOP),
    );
    f.render_widget(paragraph, area);
}

fn status_class_counts(state: &DashboardState) -> [(&'static str, Color, u64); 4] {
    let mut classes = [
        ("2xx", Color::Green, 0u64),
        ("3xx", Color::Yellow, 0u64),
        ("4xx", Color::Red, 0u64),
        ("5xx", Color::LightRed, 0u64),
    ];
    for (&code, &count) in &state.status_codes {
        let index = match code {
            200..=299 => 0,
            300..=399 => 1,
            400..=499 => 2,
            500..=u16::MAX => 3,
            0..=199 => continue,
        };
        if let Some(slot) = classes.get_mut(index) {
            slot.2 += count;
        }
    }
    classes
}

fn render_breakdown<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let [status_area, percentile_area] = columns.as_ref() else {
        return;
    };

    let classes = status_class_counts(state);
    let max_count = classes.iter().map(|&(_, _, count)| count).max().unwrap_or(0);
    let mut status_lines = Vec::new();
    for (label, color, count) in classes {
        if count == 0 {
            continue;
        }
        let mut spans = vec![Span::styled(
            format!("{} ", label),
            Style::default().fg(color),
        )];
        spans.extend(bar_spans(count, max_count, STATUS_BAR_WIDTH, color));
        spans.push(Span::raw(format!(" {}", count)));
        status_lines.push(Line::from(spans));
    }
    if status_lines.is_empty() {
        status_lines.push(Line::from(Span::styled(
            "  No data yet...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(
        Paragraph::new(status_lines).block(
            Block::default()
                .title("Status Codes")
                .borders(Borders::TOP),
        ),
        *status_area,
    );

    let mut sorted = state.durations_ms.clone();
    sorted.sort_by(f64::total_cmp);
    let percentile_lines = if sorted.is_empty() {
        vec![Line::from(Span::styled(
            "  No data yet...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        [
            (50u8, Color::Cyan),
            (75, Color::Cyan),
            (90, Color::Yellow),
            (99, Color::Red),
        ]
        .iter()
        .map(|&(percentile, color)| {
            let value = nearest_rank(&sorted, percentile).unwrap_or(0.0);
            Line::from(vec![
                Span::styled(
                    format!("p{}: ", percentile),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:.0}ms", value), Style::default().fg(color)),
            ])
        })
        .collect()
    };
    f.render_widget(
        Paragraph::new(percentile_lines).block(
            Block::default()
                .title("Percentiles")
                .borders(Borders::TOP),
        ),
        *percentile_area,
    );
}

fn render_controls<B: Backend>(f: &mut Frame<'_, B>, state: &DashboardState, area: Rect) {
    let pause_label = if state.status == RunStatus::Paused {
        "Resume"
    } else {
        "Pause"
    };
    let reset_label = if state.status == RunStatus::Completed {
        "Repeat"
    } else {
        "Reset Stats"
    };
    let line = Line::from(vec![
        Span::styled("[Space] ", Style::default().fg(Color::DarkGray)),
        Span::raw(pause_label),
        Span::styled("  [+/-] ", Style::default().fg(Color::DarkGray)),
        Span::raw("Concurrency"),
        Span::styled("  [r] ", Style::default().fg(Color::DarkGray)),
        Span::raw(reset_label),
        Span::styled("  [q] ", Style::default().fg(Color::DarkGray)),
        Span::raw("Quit"),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use ratatui::backend::TestBackend;

    fn sample_state() -> DashboardState {
        let mut state = DashboardState::new("http://localhost:8080/api".to_owned(), 100, 10);
        state.completed = 42;
        state.success_count = 40;
        state.error_count = 2;
        state.durations_ms = vec![12.0, 20.0, 31.0, 44.0, 80.0, 120.0];
        state.status_codes.insert(200, 40);
        state.status_codes.insert(500, 2);
        for sample in 0..30 {
            state.rps_history.push(f64::from(sample));
            state.latency_history.push(f64::from(sample) * 2.0);
        }
        state
    }

    #[test]
    fn dashboard_render_does_not_panic() -> AppResult<()> {
        let backend = TestBackend::new(100, 32);
        let mut terminal =
            Terminal::new(backend).map_err(|err| AppError::Terminal(err.to_string()))?;
        let state = sample_state();
        terminal
            .draw(|f| draw_frame(f, &state))
            .map_err(|err| AppError::Terminal(err.to_string()))?;
        Ok(())
    }

    #[test]
    fn render_survives_a_tiny_terminal_and_empty_state() -> AppResult<()> {
        let backend = TestBackend::new(20, 6);
        let mut terminal =
            Terminal::new(backend).map_err(|err| AppError::Terminal(err.to_string()))?;
        let state = DashboardState::new("http://localhost".to_owned(), 0, 1);
        terminal
            .draw(|f| draw_frame(f, &state))
            .map_err(|err| AppError::Terminal(err.to_string()))?;
        Ok(())
    }

    #[test]
    fn distribution_buckets_cover_the_sample_range() {
        let buckets = distribution_buckets(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(buckets.len(), DISTRIBUTION_BUCKETS);
        let total: u64 = buckets.iter().map(|bucket| bucket.count).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn identical_durations_collapse_to_one_bucket() {
        let buckets = distribution_buckets(&[25.0, 25.0, 25.0]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.first().map(|b| b.count), Some(3));
    }

    #[test]
    fn status_classes_group_by_hundreds() {
        let state = sample_state();
        let classes = status_class_counts(&state);
        assert_eq!(classes.first().map(|c| c.2), Some(40));
        assert_eq!(classes.last().map(|c| c.2), Some(2));
    }
}
