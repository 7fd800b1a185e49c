use std::{
    collections::VecDeque,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use luminary_core::{
    ControlCommand, Engine, EnginePhase, EpochReport, FrameBudgeter, FrameBuffer, GridGeometry,
    Pattern, PhaseTimings, RenderSink, Scene, Swatch,
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend, TestBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use serde::Serialize;
use supports_color::{ColorLevel, Stream, on_cached};
use tracing::info;

use crate::{
    BatchStats, CommandDrain, CommandSubmit, SharedEngine,
    renderer::{Renderer, RendererContext},
};

const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 360;
const HEADLESS_SIZE: (u16, u16) = (100, 40);
const EVENT_LOG_CAPACITY: usize = 8;
const SIDEBAR_WIDTH: u16 = 38;
/// Initialization epochs between progress redraws.
const PROGRESS_REDRAW_EPOCHS: u64 = 16;

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn run(&self, ctx: RendererContext) -> Result<()> {
        if std::env::var_os("LUMINARY_TERMINAL_HEADLESS").is_some() {
            let report = self.run_headless(ctx)?;
            info!(
                target: "luminary::terminal",
                frames = report.summary.frame_count,
                rendered_frames = report.summary.rendered_frames,
                final_epoch = report.summary.final_epoch,
                total_dirty = report.summary.total_dirty,
                max_dirty = report.summary.max_dirty,
                mean_compute_us = report.summary.mean_compute_us,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = run_event_loop(&mut terminal, ctx);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }
}

fn run_event_loop<B: Backend>(terminal: &mut Terminal<B>, ctx: RendererContext) -> Result<()> {
    let mut app = TerminalApp::new(ctx, true)?;

    loop {
        let polled = app.step(terminal, poll_key)?;
        if let Some(key) = polled.transpose()?.flatten()
            && app.handle_key(key)
        {
            break;
        }
    }

    Ok(())
}

fn poll_key(timeout: Duration) -> io::Result<Option<KeyEvent>> {
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key));
    }
    Ok(None)
}

impl TerminalRenderer {
    fn run_headless(&self, ctx: RendererContext) -> Result<HeadlessReport> {
        let (width, height) = HEADLESS_SIZE;
        let mut terminal =
            Terminal::new(TestBackend::new(width, height)).context("failed to build test backend")?;
        let mut app = TerminalApp::new(ctx, false)?;
        let mut report = HeadlessReport::new(&app.snapshot);
        let frames = self.headless_frame_budget();

        for _ in 0..frames {
            app.step(&mut terminal, |_| ())?;
            report.record(&app.snapshot);
        }

        report.finalize();

        if let Some(path) = report_file_path_from_env() {
            report.write_json(&path).with_context(|| {
                format!("failed to write headless report to {}", path.display())
            })?;
        }

        Ok(report)
    }

    fn headless_frame_budget(&self) -> usize {
        std::env::var("LUMINARY_TERMINAL_HEADLESS_FRAMES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(MAX_HEADLESS_FRAMES))
            .unwrap_or(DEFAULT_HEADLESS_FRAMES)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Menu {
    #[default]
    Actions,
    Scenes,
}

impl Menu {
    const fn label(self) -> &'static str {
        match self {
            Menu::Actions => "actions",
            Menu::Scenes => "scenes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyAction {
    Quit,
    Menu(Menu),
    Command(ControlCommand),
    Ignored,
}

fn map_key(menu: Menu, key: KeyEvent, press_target: usize) -> KeyAction {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Char('q'), _) | (KeyCode::Char('Q'), _) => KeyAction::Quit,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,
        (KeyCode::Char('a'), _) => KeyAction::Menu(Menu::Actions),
        (KeyCode::Char('s'), _) => KeyAction::Menu(Menu::Scenes),
        (KeyCode::Char(ch), _) => match menu {
            Menu::Actions => match ch {
                'c' => KeyAction::Command(ControlCommand::ChangeColor),
                'f' => KeyAction::Command(ControlCommand::CenteredRainbow { extended: false }),
                'F' => KeyAction::Command(ControlCommand::CenteredRainbow { extended: true }),
                '1'..='5' => KeyAction::Command(ControlCommand::PetalRainbow {
                    petal: ch as u32 - '1' as u32,
                }),
                'p' => KeyAction::Command(ControlCommand::Press { xy: press_target }),
                _ => KeyAction::Ignored,
            },
            Menu::Scenes => ch
                .to_digit(10)
                .and_then(Scene::from_index)
                .map_or(KeyAction::Ignored, |scene| {
                    KeyAction::Command(ControlCommand::SetScene(scene))
                }),
        },
        _ => KeyAction::Ignored,
    }
}

fn describe(command: &ControlCommand) -> String {
    match command {
        ControlCommand::ChangeColor => "change color".to_string(),
        ControlCommand::CenteredRainbow { extended: false } => "centered rainbow".to_string(),
        ControlCommand::CenteredRainbow { extended: true } => {
            "centered rainbow (extended)".to_string()
        }
        ControlCommand::PetalRainbow { petal } => format!("rainbow on petal {}", petal + 1),
        ControlCommand::SetScene(scene) => format!("scene {scene}"),
        ControlCommand::Press { xy } => format!("press {xy}"),
        ControlCommand::Spark { xy, color } => format!("spark {xy} color {color}"),
        ControlCommand::Channel(frame) => format!("channel frame {}", frame.sequence),
    }
}

struct TerminalApp {
    engine: SharedEngine,
    command_drain: CommandDrain,
    command_submit: CommandSubmit,
    budgeter: FrameBudgeter,
    grid: FrameBuffer,
    geometry: GridGeometry,
    palette: Palette,
    menu: Menu,
    press_target: usize,
    watch_xy: usize,
    snapshot: Snapshot,
    event_log: VecDeque<String>,
}

impl TerminalApp {
    fn new(ctx: RendererContext, paced: bool) -> Result<Self> {
        let (geometry, budgeter, watch_xy, snapshot) = {
            let engine = ctx
                .engine
                .lock()
                .map_err(|_| anyhow!("engine mutex poisoned"))?;
            let geometry = *engine.topology().geometry();
            let config = engine.config();
            let budgeter = if paced {
                FrameBudgeter::new(config.budget(), config.timing_smoothing)
            } else {
                FrameBudgeter::unpaced(config.budget(), config.timing_smoothing)
            };
            let watch_xy = engine.petal_source(2);
            let snapshot = Snapshot::capture(&engine, &EpochReport::default(), watch_xy);
            (geometry, budgeter, watch_xy, snapshot)
        };
        Ok(Self {
            engine: Arc::clone(&ctx.engine),
            command_drain: Arc::clone(&ctx.command_drain),
            command_submit: Arc::clone(&ctx.command_submit),
            budgeter,
            grid: FrameBuffer::new(geometry.cell_count()),
            press_target: geometry.index(
                geometry.floor_cols / 2,
                geometry.band_rows() + geometry.floor_rows / 2,
            ),
            geometry,
            palette: Palette::detect(),
            menu: Menu::default(),
            watch_xy,
            snapshot,
            event_log: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        })
    }

    /// Run one epoch, then let the budgeter poll with `poll` and sleep.
    fn step<B: Backend, R>(
        &mut self,
        terminal: &mut Terminal<B>,
        poll: impl FnOnce(Duration) -> R,
    ) -> Result<Option<R>> {
        let started = Instant::now();
        let report = self.run_epoch(terminal)?;
        let (_, polled) = self.budgeter.settle(started, &report, poll);
        self.snapshot.timings = *self.budgeter.timings();
        Ok(polled)
    }

    fn run_epoch<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<EpochReport> {
        let engine = Arc::clone(&self.engine);
        let mut engine = engine
            .lock()
            .map_err(|_| anyhow!("engine mutex poisoned"))?;
        let input = (self.command_drain.as_ref())(&mut *engine);

        let screen = Screen {
            geometry: &self.geometry,
            palette: &self.palette,
            snapshot: &self.snapshot,
            menu: self.menu,
            events: &self.event_log,
        };
        let mut sink = TerminalSink {
            terminal,
            grid: &mut self.grid,
            screen,
            error: None,
        };
        let report = engine.run_epoch(&mut sink);
        if let Some(err) = sink.error.take() {
            return Err(err).context("failed to draw frame");
        }

        let timings = self.snapshot.timings;
        self.snapshot = Snapshot::capture(&engine, &report, self.watch_xy);
        self.snapshot.timings = timings;
        self.snapshot.input = input;
        drop(engine);

        if !report.rendered && report.epoch % PROGRESS_REDRAW_EPOCHS == 0 {
            let screen = self.screen();
            let grid = &self.grid;
            terminal
                .draw(|frame| screen.draw(frame, grid))
                .context("failed to draw progress")?;
        }
        Ok(report)
    }

    fn screen(&self) -> Screen<'_> {
        Screen {
            geometry: &self.geometry,
            palette: &self.palette,
            snapshot: &self.snapshot,
            menu: self.menu,
            events: &self.event_log,
        }
    }

    /// Returns true when the key asks to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match map_key(self.menu, key, self.press_target) {
            KeyAction::Quit => return true,
            KeyAction::Menu(menu) => {
                self.menu = menu;
                self.push_event(format!("menu: {}", menu.label()));
            }
            KeyAction::Command(command) => {
                let label = describe(&command);
                if (self.command_submit.as_ref())(command) {
                    self.push_event(label);
                } else {
                    self.push_event(format!("dropped: {label}"));
                }
            }
            KeyAction::Ignored => {}
        }
        false
    }

    fn push_event(&mut self, message: String) {
        if self.event_log.len() == EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log
            .push_back(format!("#{} {message}", self.snapshot.epoch));
    }
}

/// Render sink that dedups through a frame buffer and redraws the terminal
/// on flush.
struct TerminalSink<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    grid: &'a mut FrameBuffer,
    screen: Screen<'a>,
    error: Option<io::Error>,
}

impl<B: Backend> RenderSink for TerminalSink<'_, B> {
    fn draw_cell(&mut self, index: usize, swatch: Swatch, state_key: u32) {
        self.grid.draw_cell(index, swatch, state_key);
    }

    fn flush(&mut self, epoch: u64) -> usize {
        let dirty = self.grid.flush(epoch);
        let grid = &*self.grid;
        let screen = &self.screen;
        if let Err(err) = self.terminal.draw(|frame| screen.draw(frame, grid)) {
            self.error.get_or_insert(err);
        }
        dirty
    }
}

struct Screen<'a> {
    geometry: &'a GridGeometry,
    palette: &'a Palette,
    snapshot: &'a Snapshot,
    menu: Menu,
    events: &'a VecDeque<String>,
}

impl Screen<'_> {
    fn draw(&self, frame: &mut Frame<'_>, grid: &FrameBuffer) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(frame.area());

        self.draw_header(frame, outer[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(SIDEBAR_WIDTH)])
            .split(outer[1]);

        self.draw_grid(frame, body[0], grid);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(11),
                Constraint::Length(9),
                Constraint::Min(3),
            ])
            .split(body[1]);

        self.draw_stats(frame, sidebar[0]);
        self.draw_menu(frame, sidebar[1]);
        self.draw_events(frame, sidebar[2]);
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let snapshot = self.snapshot;
        let phase = match snapshot.initializing {
            Some(percent) => Span::styled(
                format!(" INITIALIZING {percent:>3}% "),
                self.palette.initializing_style(),
            ),
            None => Span::styled(" RUNNING ", self.palette.running_style()),
        };
        let line = Line::from(vec![
            phase,
            Span::raw("  "),
            Span::styled("Epoch ", self.palette.header_style()),
            Span::raw(format!("{:>8}", snapshot.epoch)),
            Span::raw("  "),
            Span::styled("Scene ", self.palette.header_style()),
            Span::styled(snapshot.scene.to_string(), self.palette.accent_style()),
            Span::raw("  "),
            Span::styled("Menu ", self.palette.header_style()),
            Span::raw(self.menu.label()),
        ]);
        let paragraph = Paragraph::new(line).block(
            Block::default()
                .title(self.palette.title("Luminary"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_grid(&self, frame: &mut Frame<'_>, area: Rect, grid: &FrameBuffer) {
        let geometry = self.geometry;
        let title = format!("Display {}×{}", geometry.cols(), geometry.rows());
        let block = Block::default()
            .title(self.palette.title(title))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let cols = geometry.cols() as usize;
        let rows = geometry.rows() as usize;
        let width = inner.width as usize;
        let height = inner.height as usize;
        // Each terminal row shows two grid rows via the upper half block.
        let mut lines = Vec::with_capacity(height);
        for sy in 0..height {
            let top = (2 * sy) * rows / (2 * height);
            let bottom = (2 * sy + 1) * rows / (2 * height);
            let spans: Vec<Span<'static>> = (0..width)
                .map(|sx| {
                    let gx = sx * cols / width;
                    let style = Style::default()
                        .fg(self.cell_color(grid, gx, top))
                        .bg(self.cell_color(grid, gx, bottom));
                    Span::styled("▀", style)
                })
                .collect();
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn cell_color(&self, grid: &FrameBuffer, x: usize, y: usize) -> Color {
        let (x, y) = (x as u32, y as u32);
        if !self.geometry.is_active(x, y) {
            return Color::Reset;
        }
        self.palette
            .swatch_color(grid.swatch(self.geometry.index(x, y)))
    }

    fn draw_stats(&self, frame: &mut Frame<'_>, area: Rect) {
        let snapshot = self.snapshot;
        let timings = &snapshot.timings;
        let ms = |us: f64| us / 1000.0;
        let watch = &snapshot.watch;
        let lines = vec![
            Line::from(vec![
                Span::styled("Dirty ", self.palette.header_style()),
                Span::raw(format!("{:>5}", snapshot.dirty)),
                Span::raw("  "),
                Span::styled("Sparks ", self.palette.header_style()),
                Span::raw(format!("{:>4}", snapshot.lit_sparks)),
            ]),
            Line::from(vec![
                Span::styled("Rate ", self.palette.header_style()),
                Span::raw(format!("{:>6.1} Hz", timings.hz())),
            ]),
            Line::from(format!(
                "compute {:>5.2}  draw  {:>5.2}",
                ms(timings.compute_us),
                ms(timings.draw_us)
            )),
            Line::from(format!(
                "refresh {:>5.2}  wait  {:>5.2}",
                ms(timings.refresh_us),
                ms(timings.wait_us)
            )),
            Line::from(format!(
                "sleep   {:>5.2}  total {:>5.2}",
                ms(timings.sleep_us),
                ms(timings.total_us)
            )),
            Line::from(vec![
                Span::styled("Watch ", self.palette.header_style()),
                Span::raw(format!("#{} {}", watch.xy, watch.pattern)),
            ]),
            Line::from(format!(
                "life {:>6}  wave {:>7}",
                watch.lifetime, watch.wave
            )),
            Line::from(format!("tone {:>2}  hue {:>2}", watch.tone, watch.rainbow)),
            Line::from(vec![
                Span::styled("Channel rejects ", self.palette.header_style()),
                Span::raw(snapshot.channel_rejected.to_string()),
            ]),
            Line::from(format!(
                "input {:>3}  merged {:>3}",
                snapshot.input.applied, snapshot.input.coalesced
            )),
        ];
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(self.palette.title("Stats (ms)"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_menu(&self, frame: &mut Frame<'_>, area: Rect) {
        let lines: Vec<Line<'static>> = match self.menu {
            Menu::Actions => vec![
                Line::raw(" c    change color"),
                Line::raw(" f/F  centered rainbow (F extends)"),
                Line::raw(" 1-5  rainbow on petal"),
                Line::raw(" p    press floor center"),
                Line::raw(" s    scenes menu"),
                Line::raw(" q    quit"),
            ],
            Menu::Scenes => {
                let mut lines: Vec<Line<'static>> = Scene::ALL
                    .iter()
                    .enumerate()
                    .map(|(index, scene)| {
                        let marker = if *scene == self.snapshot.scene { '*' } else { ' ' };
                        let line = format!("{marker}{index}    {scene}");
                        if *scene == self.snapshot.scene {
                            Line::styled(line, self.palette.accent_style())
                        } else {
                            Line::raw(line)
                        }
                    })
                    .collect();
                lines.push(Line::raw(" a    actions menu"));
                lines.push(Line::raw(" q    quit"));
                lines
            }
        };
        let title = format!("Menu: {}", self.menu.label());
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(self.palette.title(title))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_events(&self, frame: &mut Frame<'_>, area: Rect) {
        let items: Vec<ListItem<'_>> = self
            .events
            .iter()
            .rev()
            .map(|event| ListItem::new(event.as_str()))
            .collect();
        let block = Block::default()
            .title(self.palette.title("Input"))
            .borders(Borders::ALL);
        frame.render_widget(List::new(items).block(block), area);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct Watch {
    xy: usize,
    lifetime: i32,
    pattern: String,
    wave: i32,
    tone: i32,
    rainbow: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
struct Snapshot {
    epoch: u64,
    initializing: Option<u8>,
    scene: Scene,
    rendered: bool,
    dirty: usize,
    lit_sparks: usize,
    channel_rejected: u64,
    input: BatchStats,
    timings: PhaseTimings,
    watch: Watch,
}

impl Snapshot {
    fn capture(engine: &Engine, report: &EpochReport, watch_xy: usize) -> Self {
        let control = engine.control().current()[watch_xy];
        let pattern = Pattern::from_directive(control.directive0)
            .map_or_else(|| format!("directive {}", control.directive0), |p| p.to_string());
        Self {
            epoch: engine.epoch(),
            initializing: match engine.phase() {
                EnginePhase::Initializing { percent } => Some(percent),
                EnginePhase::Running => None,
            },
            scene: engine.scene(),
            rendered: report.rendered,
            dirty: report.dirty,
            lit_sparks: engine
                .sparks()
                .current()
                .iter()
                .filter(|cell| cell.is_lit())
                .count(),
            channel_rejected: engine.channel().rejected(),
            input: BatchStats::default(),
            timings: PhaseTimings::default(),
            watch: Watch {
                xy: watch_xy,
                lifetime: control.orth,
                pattern,
                wave: engine.waves().current()[watch_xy].orth,
                tone: engine.tone()[watch_xy],
                rainbow: engine.rainbow().current()[watch_xy],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HeadlessReport {
    initial: FrameStats,
    frames: Vec<FrameStats>,
    summary: ReportSummary,
}

impl HeadlessReport {
    fn new(initial_snapshot: &Snapshot) -> Self {
        Self {
            initial: FrameStats::from_snapshot(initial_snapshot),
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, snapshot: &Snapshot) {
        self.frames.push(FrameStats::from_snapshot(snapshot));
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from(&self.initial, &self.frames);
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct FrameStats {
    epoch: u64,
    rendered: bool,
    dirty: usize,
    lit_sparks: usize,
    scene: Scene,
    input: BatchStats,
    compute_us: f64,
    total_us: f64,
}

impl FrameStats {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            epoch: snapshot.epoch,
            rendered: snapshot.rendered,
            dirty: snapshot.dirty,
            lit_sparks: snapshot.lit_sparks,
            scene: snapshot.scene,
            input: snapshot.input,
            compute_us: snapshot.timings.compute_us,
            total_us: snapshot.timings.total_us,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct ReportSummary {
    frame_count: usize,
    rendered_frames: usize,
    final_epoch: u64,
    total_dirty: usize,
    max_dirty: usize,
    mean_compute_us: f64,
    final_scene: Scene,
}

impl ReportSummary {
    fn from(initial: &FrameStats, frames: &[FrameStats]) -> Self {
        let Some(last) = frames.last() else {
            return Self {
                final_epoch: initial.epoch,
                final_scene: initial.scene,
                ..Self::default()
            };
        };
        let frame_count = frames.len();
        Self {
            frame_count,
            rendered_frames: frames.iter().filter(|frame| frame.rendered).count(),
            final_epoch: last.epoch,
            total_dirty: frames.iter().map(|frame| frame.dirty).sum(),
            max_dirty: frames.iter().map(|frame| frame.dirty).max().unwrap_or(0),
            mean_compute_us: frames.iter().map(|frame| frame.compute_us).sum::<f64>()
                / frame_count as f64,
            final_scene: last.scene,
        }
    }
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os("LUMINARY_TERMINAL_HEADLESS_REPORT").and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn initializing_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    fn running_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn swatch_color(&self, swatch: Swatch) -> Color {
        let [r, g, b] = swatch.rgb();
        match self.level {
            Some(level) if level.has_16m => Color::Rgb(r, g, b),
            Some(level) if level.has_256 => Color::Indexed(ansi256(r, g, b)),
            _ => basic_color(swatch),
        }
    }
}

/// Nearest entry of the 6×6×6 color cube.
fn ansi256(r: u8, g: u8, b: u8) -> u8 {
    let level = |c: u8| ((u16::from(c) * 5 + 127) / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

fn basic_color(swatch: Swatch) -> Color {
    const BRIGHT: [Color; 12] = [
        Color::Magenta,
        Color::LightMagenta,
        Color::LightMagenta,
        Color::LightRed,
        Color::LightRed,
        Color::LightYellow,
        Color::LightGreen,
        Color::LightGreen,
        Color::LightCyan,
        Color::Cyan,
        Color::LightBlue,
        Color::Blue,
    ];
    const DIM: [Color; 12] = [
        Color::Blue,
        Color::Magenta,
        Color::Magenta,
        Color::Red,
        Color::Red,
        Color::Yellow,
        Color::Green,
        Color::Green,
        Color::Cyan,
        Color::Cyan,
        Color::Blue,
        Color::Blue,
    ];
    match swatch {
        Swatch::Rainbow(c) => BRIGHT[usize::from(c) % BRIGHT.len()],
        Swatch::Dark(c) => DIM[usize::from(c) % DIM.len()],
        Swatch::Grey(_) => Color::Gray,
        Swatch::DarkGrey(_) => Color::DarkGray,
        Swatch::Black => Color::Black,
    }
}
