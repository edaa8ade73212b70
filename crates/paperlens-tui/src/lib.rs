use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use paperlens_core::{DiagramView, SessionView};
use paperlens_gateway::SessionCommand;
use paperlens_schema::{Provenance, Stage};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::{mpsc, watch};

const PANEL_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Stage(Stage),
    Preview,
    Diagram,
}

impl Panel {
    const ORDER: [Panel; PANEL_COUNT] = [
        Panel::Stage(Stage::Initial),
        Panel::Stage(Stage::Expanding),
        Panel::Stage(Stage::Focused),
        Panel::Stage(Stage::Final),
        Panel::Preview,
        Panel::Diagram,
    ];

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|panel| *panel == self)
            .unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % PANEL_COUNT]
    }
}

struct App {
    view: SessionView,
    focus: Panel,
    scroll_offset: [usize; PANEL_COUNT],
    should_quit: bool,
    pending: Option<SessionCommand>,
}

impl App {
    fn new(view: SessionView) -> Self {
        Self {
            view,
            focus: Panel::Stage(Stage::Initial),
            scroll_offset: [0; PANEL_COUNT],
            should_quit: false,
            pending: None,
        }
    }

    fn apply_view(&mut self, view: SessionView) {
        if view.run != self.view.run {
            self.scroll_offset = [0; PANEL_COUNT];
        }
        self.view = view;
    }

    fn on_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('a') => {
                if self.view.document_id.is_some() {
                    self.pending = Some(SessionCommand::StartAnalysis);
                }
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
            }
            KeyCode::Up => {
                let idx = self.focus.index();
                self.scroll_offset[idx] = self.scroll_offset[idx].saturating_sub(1);
            }
            KeyCode::Down => {
                let idx = self.focus.index();
                let max = self.panel_lines(self.focus).len();
                if self.scroll_offset[idx] < max.saturating_sub(1) {
                    self.scroll_offset[idx] += 1;
                }
            }
            _ => {}
        }
    }

    fn take_command(&mut self) -> Option<SessionCommand> {
        self.pending.take()
    }

    fn panel_lines(&self, panel: Panel) -> Vec<String> {
        match panel {
            Panel::Stage(stage) => self.stage_lines(stage),
            Panel::Preview => vec![self.view.preview.clone()],
            Panel::Diagram => diagram_lines(self.view.diagram.as_ref()),
        }
    }

    fn stage_lines(&self, stage: Stage) -> Vec<String> {
        let lines: Vec<String> = self
            .view
            .items
            .iter()
            .filter(|item| item.stage == stage)
            .map(|item| {
                let marker = match item.provenance {
                    Provenance::Transient => "…",
                    Provenance::Final => "",
                };
                format!("{} {}{}: {}", item.icon, item.title, marker, item.content)
            })
            .collect();
        if lines.is_empty() {
            vec!["Nothing here yet".into()]
        } else {
            lines
        }
    }
}

fn diagram_lines(diagram: Option<&DiagramView>) -> Vec<String> {
    let Some(diagram) = diagram else {
        return vec!["Diagram appears once the structured result arrives".into()];
    };
    if diagram.is_empty() {
        return vec!["No framework map or flow chart in this result".into()];
    }

    let mut lines = Vec::new();
    if diagram.total_nodes > 0 {
        lines.push(format!(
            "Framework ({}/{} nodes)",
            diagram.nodes.len(),
            diagram.total_nodes
        ));
        for placed in &diagram.nodes {
            lines.push(format!("  [{}] {}", placed.row + 1, placed.node.label));
        }
        for link in &diagram.links {
            match &link.label {
                Some(label) => lines.push(format!("  {} → {} ({label})", link.from, link.to)),
                None => lines.push(format!("  {} → {}", link.from, link.to)),
            }
        }
    }
    if diagram.total_steps > 0 {
        lines.push(format!(
            "{} ({}/{} steps)",
            diagram.flow_title.as_deref().unwrap_or("Flow"),
            diagram.steps.len(),
            diagram.total_steps
        ));
        for (i, step) in diagram.steps.iter().enumerate() {
            match &step.detail {
                Some(detail) => lines.push(format!("  {}. {} - {detail}", i + 1, step.name)),
                None => lines.push(format!("  {}. {}", i + 1, step.name)),
            }
        }
    }
    lines
}

/// Run the dashboard until the user quits or the session driver stops.
pub async fn run_tui(
    views: watch::Receiver<SessionView>,
    commands: mpsc::Sender<SessionCommand>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(views.borrow().clone());
    let run_result = run_app(&mut terminal, &mut app, views, commands);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut views: watch::Receiver<SessionView>,
    commands: mpsc::Sender<SessionCommand>,
) -> Result<()> {
    loop {
        match views.has_changed() {
            Ok(true) => app.apply_view(views.borrow_and_update().clone()),
            Ok(false) => {}
            Err(_) => {
                tracing::debug!("session driver stopped, leaving dashboard");
                break;
            }
        }

        terminal.draw(|frame| ui(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key.code);
                }
            }
        }

        if let Some(command) = app.take_command() {
            if let Err(err) = commands.try_send(command) {
                tracing::warn!(error = %err, "failed to forward command to session");
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, main_layout[0], &app.view);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_layout[1]);

    let stage_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(rows[0]);

    let bottom_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);

    let colors = [Color::Cyan, Color::Yellow, Color::Magenta, Color::Green];
    for ((stage, area), color) in Stage::ALL.into_iter().zip(stage_cols.iter()).zip(colors) {
        let panel = Panel::Stage(stage);
        render_list_panel(
            frame,
            *area,
            &format!(" {} {} ", stage.icon(), stage.label()),
            &app.stage_lines(stage),
            app.scroll_offset[panel.index()],
            app.focus == panel,
            color,
        );
    }

    render_preview(frame, bottom_cols[0], app);

    render_list_panel(
        frame,
        bottom_cols[1],
        " Diagram ",
        &diagram_lines(app.view.diagram.as_ref()),
        app.scroll_offset[Panel::Diagram.index()],
        app.focus == Panel::Diagram,
        Color::Blue,
    );

    let key = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let hint = Style::default().fg(Color::DarkGray);
    let spans = vec![
        Span::styled(" [q]", key),
        Span::styled(" quit ", hint),
        Span::styled("[a]", key),
        Span::styled(" analyze ", hint),
        Span::styled("[Tab]", key),
        Span::styled(" focus ", hint),
        Span::styled("[↑↓]", key),
        Span::styled(" scroll ", hint),
        Span::styled(
            format!("| paperlens v{} ", env!("CARGO_PKG_VERSION")),
            hint,
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), main_layout[2]);
}

fn render_header(frame: &mut Frame, area: Rect, view: &SessionView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let gauge = Gauge::default()
        .block(Block::default().title(" Progress ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(view.progress.min(100)))
        .label(format!("{}%", view.progress));
    frame.render_widget(gauge, cols[0]);

    let title = match &view.document_id {
        Some(id) => format!(" Paper {id} "),
        None => " Paper ".to_string(),
    };
    let headline = Paragraph::new(Line::from(Span::styled(
        view.headline().to_string(),
        Style::default().fg(Color::White),
    )))
    .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(headline, cols[1]);
}

fn render_preview(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == Panel::Preview;
    let border_style = if focused {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let text = if app.view.finalized {
        format!(
            "Structured result: {}/{} items shown",
            app.view.items.len(),
            app.view.item_total
        )
    } else if app.view.preview.is_empty() {
        "Waiting for streamed analysis...".to_string()
    } else {
        app.view.preview.clone()
    };
    let scroll = app.scroll_offset[Panel::Preview.index()].min(u16::MAX as usize) as u16;
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .scroll((scroll, 0))
        .block(
            Block::default()
                .title(" Live preview ")
                .borders(Borders::ALL)
                .border_style(border_style),
        );
    frame.render_widget(paragraph, area);
}

fn render_list_panel(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    items: &[String],
    scroll_offset: usize,
    focused: bool,
    color: Color,
) {
    let border_style = if focused {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let visible: Vec<ListItem> = items
        .iter()
        .skip(scroll_offset)
        .map(|item| {
            let style = if focused {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Line::from(Span::styled(item.as_str(), style)))
        })
        .collect();

    let list = List::new(visible).block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(border_style),
    );

    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use paperlens_core::{project, AppConfig, Session};
    use paperlens_schema::{
        ConnectionState, DisplayItem, FrameworkMap, GraphLink, GraphNode, InboundEvent,
        ResultPayload,
    };
    use ratatui::backend::TestBackend;

    use super::*;

    fn item(id: &str, stage: Stage, provenance: Provenance) -> DisplayItem {
        DisplayItem {
            id: id.into(),
            stage,
            icon: stage.icon().into(),
            title: format!("Title {id}"),
            content: format!("content of {id}"),
            provenance,
        }
    }

    fn view_with_document() -> SessionView {
        SessionView {
            document_id: Some("paper-1".into()),
            connection: ConnectionState::Open,
            status: "Calling model...".into(),
            ..Default::default()
        }
    }

    #[test]
    fn items_land_in_their_stage_panel() {
        let mut app = App::new(SessionView::default());
        let mut view = view_with_document();
        view.items = vec![
            item("stream-0", Stage::Initial, Provenance::Transient),
            item("stream-1", Stage::Expanding, Provenance::Transient),
            item("stream-4", Stage::Initial, Provenance::Transient),
        ];
        app.apply_view(view);

        let initial = app.stage_lines(Stage::Initial);
        assert_eq!(initial.len(), 2);
        assert!(initial[0].contains("content of stream-0"));
        assert!(initial[1].contains("content of stream-4"));
        assert_eq!(app.stage_lines(Stage::Final), vec!["Nothing here yet".to_string()]);
    }

    #[test]
    fn analyze_key_needs_a_document() {
        let mut app = App::new(SessionView::default());
        app.on_key(KeyCode::Char('a'));
        assert_eq!(app.take_command(), None);

        app.apply_view(view_with_document());
        app.on_key(KeyCode::Char('a'));
        assert_eq!(app.take_command(), Some(SessionCommand::StartAnalysis));
        assert_eq!(app.take_command(), None);
    }

    #[test]
    fn tab_cycles_every_panel() {
        let mut app = App::new(SessionView::default());
        let mut seen = vec![app.focus];
        for _ in 0..PANEL_COUNT {
            app.on_key(KeyCode::Tab);
            seen.push(app.focus);
        }
        assert_eq!(seen.first(), seen.last());
        assert_eq!(seen[4], Panel::Preview);
        assert_eq!(seen[5], Panel::Diagram);
    }

    #[test]
    fn scroll_is_bounded_and_resets_on_new_run() {
        let mut app = App::new(SessionView::default());
        let mut view = view_with_document();
        view.items = (0..3)
            .map(|i| item(&format!("pd-{i}"), Stage::Initial, Provenance::Final))
            .collect();
        app.apply_view(view.clone());

        for _ in 0..10 {
            app.on_key(KeyCode::Down);
        }
        assert_eq!(app.scroll_offset[0], 2);
        app.on_key(KeyCode::Up);
        assert_eq!(app.scroll_offset[0], 1);

        view.run += 1;
        app.apply_view(view);
        assert_eq!(app.scroll_offset[0], 0);
    }

    #[test]
    fn diagram_lists_only_visible_links() {
        let payload = ResultPayload {
            framework_map: Some(FrameworkMap {
                nodes: vec![
                    GraphNode {
                        id: "a".into(),
                        label: "Encoder".into(),
                        kind: None,
                    },
                    GraphNode {
                        id: "b".into(),
                        label: "Decoder".into(),
                        kind: None,
                    },
                ],
                links: vec![GraphLink {
                    from: "a".into(),
                    to: "b".into(),
                    label: Some("feeds".into()),
                }],
            }),
            ..Default::default()
        };

        let partial = diagram_lines(Some(&project(&payload, 1, 4)));
        assert!(partial.iter().any(|line| line.contains("Encoder")));
        assert!(!partial.iter().any(|line| line.contains("→")));

        let full = diagram_lines(Some(&project(&payload, 4, 4)));
        assert!(full.iter().any(|line| line.contains("a → b (feeds)")));
        assert_eq!(diagram_lines(None).len(), 1);
    }

    #[test]
    fn renders_headline_and_items() {
        let mut session = Session::new(&AppConfig::default());
        session.attach_document("paper-1");
        session.set_connection(ConnectionState::Open);
        session.apply(InboundEvent::ResultFinal {
            payload: Some(ResultPayload {
                title: Some("Sparse Attention".into()),
                ..Default::default()
            }),
        });
        session.tick_reveal();

        let app = App::new(session.view());
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal.draw(|frame| ui(frame, &app)).unwrap();

        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(rendered.contains("Structured analysis complete."));
        assert!(rendered.contains("Sparse Attention"));
        assert!(rendered.contains("paper-1"));
    }
}
