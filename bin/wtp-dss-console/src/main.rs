//! ---
//! dss_section: "12-operator-console"
//! dss_subsection: "binary"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Terminal viewer host for the decision support panel."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::info;
use wtp_dss_common::config::AppConfig;
use wtp_dss_common::logging::init_tracing;
use wtp_dss_panel::display::{LiveSection, PanelView, CONNECTING_PLACEHOLDER};
use wtp_dss_panel::{
    DecisionPanel, DecisionSupportProvider, ElementId, PanelFactory, Rgb, SceneViewer,
    StagePanelLocation, ViewerContext, WidgetProvider,
};

const DEFAULT_CONFIG: &str = "configs/panel.toml";
const STAGE_ID: &str = "plant-overview";
const STAGE_USAGE: &str = "general";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Water-treatment plant viewer with the decision support panel"
)]
struct Cli {
    /// Configuration file (falls back to WTP_DSS_CONFIG, then configs/panel.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Plant elements shown in the viewer, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "raw-water-intake,flash-mixer,flocculation-basin,clarifier-1,clarifier-2,filter-a,filter-b,clearwell"
    )]
    elements: Vec<String>,
    /// Redraw interval in milliseconds
    #[arg(long, default_value_t = 250)]
    tick: u64,
}

struct App {
    scene: Arc<SceneViewer>,
    elements: Vec<ElementId>,
    cursor: usize,
    panel: DecisionPanel,
    widget_label: String,
}

impl App {
    fn current(&self) -> Option<&ElementId> {
        self.elements.get(self.cursor)
    }

    fn next(&mut self) {
        if self.cursor + 1 < self.elements.len() {
            self.cursor += 1;
        }
    }

    fn previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn toggle_current(&self) {
        if let Some(id) = self.current() {
            self.scene.toggle(id);
        }
    }

    fn pending_alert(&self) -> Option<String> {
        self.scene.alerts().into_iter().next()
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::from_path(path),
        None => Ok(AppConfig::load_with_source(&[DEFAULT_CONFIG])?.config),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    config.logging.stdout = false;
    init_tracing("wtp-dss-console", &config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let _runtime_guard = runtime.enter();

    let factory = Arc::new(PanelFactory::from_config(&config)?);
    let provider = DecisionSupportProvider::new(factory);
    let widget = provider
        .provide_widgets(STAGE_ID, STAGE_USAGE, StagePanelLocation::Right, None)
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("provider {} offered no right-hand widget", provider.id()))?;

    let elements: Vec<ElementId> = cli
        .elements
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(ElementId::from)
        .collect();
    let scene = Arc::new(SceneViewer::new(elements.clone()));
    let panel = widget
        .content
        .activate(Some(ViewerContext::from_scene(scene.clone())))?;
    info!(widget = %widget.id, elements = elements.len(), "console host started");

    let mut app = App {
        scene,
        elements,
        cursor: 0,
        panel,
        widget_label: widget.label,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(cli.tick.max(50)));
    cleanup_terminal(&mut terminal)?;
    app.panel.deactivate();
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
    Ok(())
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw_ui(frame, app))?;
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_input(app, key) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns `true` when the operator asked to quit.
fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // A pending alert blocks every other interaction until dismissed.
    if app.pending_alert().is_some() {
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
            app.scene.take_alerts();
        }
        return false;
    }
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Down | KeyCode::Char('j') => app.next(),
        KeyCode::Up | KeyCode::Char('k') => app.previous(),
        KeyCode::Char(' ') => app.toggle_current(),
        KeyCode::Char('c') => app.scene.clear_selection(),
        KeyCode::Left | KeyCode::Char('h') => {
            app.panel.decrement_dosage();
        }
        KeyCode::Right | KeyCode::Char('l') => {
            app.panel.increment_dosage();
        }
        KeyCode::Enter => {
            // Fire and forget; the panel state picks up the answer.
            drop(app.panel.spawn_scenario());
        }
        KeyCode::Char('v') => {
            app.panel.reapply_visualization();
        }
        _ => {}
    }
    false
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn draw_ui(frame: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(frame.size());
    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(layout[0]);

    draw_scene(frame, app, main[0]);
    draw_panel(frame, &app.widget_label, &app.panel.view(), main[1]);

    let help = Paragraph::new(
        "↑/↓ move  space select  c clear  ←/→ dosage  enter run  v repaint  esc dismiss  q quit",
    )
    .style(Style::default().fg(Color::Gray));
    frame.render_widget(help, layout[1]);

    if let Some(message) = app.pending_alert() {
        draw_alert(frame, &message);
    }
}

fn draw_scene(frame: &mut Frame, app: &App, area: Rect) {
    let overrides = app.scene.overrides();
    let items: Vec<ListItem> = app
        .elements
        .iter()
        .map(|id| {
            let marker = if app.scene.is_selected(id) { "[x]" } else { "[ ]" };
            let swatch = match overrides.get(id) {
                Some(color) => Span::styled("■■", Style::default().fg(to_color(*color))),
                None => Span::raw("  "),
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{marker} ")),
                swatch,
                Span::raw(format!(" {id}")),
            ]))
        })
        .collect();
    let mut state = ListState::default();
    if !app.elements.is_empty() {
        state.select(Some(app.cursor));
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Plant Model"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_panel(frame: &mut Frame, title: &str, view: &PanelView, area: Rect) {
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        "Live Plant Status",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    match &view.live {
        LiveSection::Connecting => lines.push(Line::from(Span::styled(
            CONNECTING_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))),
        LiveSection::Readings { lines: readings } => {
            for reading in readings {
                lines.push(Line::from(format!("{}: {}", reading.label, reading.value)));
            }
        }
    }
    if let Some(marker) = &view.telemetry_error {
        lines.push(Line::from(Span::styled(
            format!("({marker})"),
            Style::default().fg(Color::Yellow),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "What-If Simulator",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(view.dosage_label()));
    if let Some(result) = &view.result {
        let accent = Style::default().fg(to_color(result.theme.accent()));
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Predicted Effluent: {}", result.turbidity)));
        lines.push(Line::from(format!("Daily Chemical Cost: {}", result.cost)));
        lines.push(Line::from(vec![
            Span::raw("Status: "),
            Span::styled(result.status.clone(), accent.add_modifier(Modifier::BOLD)),
        ]));
    }
    if let Some(err) = &view.scenario_error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if !view.visualization {
        lines.push(Line::from(Span::styled(
            "(viewport colouring disabled)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(Span::styled(
            title.to_owned(),
            Style::default().fg(Color::Cyan),
        )))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_alert(frame: &mut Frame, message: &str) {
    let area = centered(frame.size(), 50, 5);
    frame.render_widget(Clear, area);
    let alert = Paragraph::new(vec![
        Line::from(message.to_owned()),
        Line::from(Span::styled(
            "press esc to dismiss",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Alert")
            .border_style(Style::default().fg(Color::Red)),
    )
    .wrap(Wrap { trim: true });
    frame.render_widget(alert, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
