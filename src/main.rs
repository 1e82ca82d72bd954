use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use ipl_score::artifacts::{self, ArtifactBundle};
use ipl_score::config;
use ipl_score::form::{Field, FormState, Outcome};
use ipl_score::teams;

struct App {
    bundle: Option<&'static ArtifactBundle>,
    load_error: Option<String>,
    form: Option<FormState>,
    should_quit: bool,
}

impl App {
    fn new() -> Self {
        match artifacts::global_bundle() {
            Ok(bundle) => {
                let mut form = FormState::new(bundle);
                form.push_log(format!(
                    "[INFO] loaded bundle {} ({} teams, {} venues)",
                    bundle.bundle_id,
                    bundle.team_encoder.len(),
                    bundle.venue_encoder.len()
                ));
                Self {
                    bundle: Some(bundle),
                    load_error: None,
                    form: Some(form),
                    should_quit: false,
                }
            }
            Err(err) => Self {
                bundle: None,
                load_error: Some(format!("{err:#}")),
                form: None,
                should_quit: false,
            },
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            self.should_quit = true;
            return;
        }
        // Without a bundle the only thing left to do is quit.
        let (Some(bundle), Some(form)) = (self.bundle, self.form.as_mut()) else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => form.focus_next(),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => form.focus_prev(),
            KeyCode::Char('l') | KeyCode::Right => form.adjust(1),
            KeyCode::Char('h') | KeyCode::Left => form.adjust(-1),
            KeyCode::Char('+') | KeyCode::PageUp => form.adjust(10),
            KeyCode::Char('-') | KeyCode::PageDown => form.adjust(-10),
            KeyCode::Char('p') | KeyCode::Enter => form.submit(bundle),
            KeyCode::Char('?') => form.help_overlay = !form.help_overlay,
            _ => {}
        }
    }
}

fn main() -> io::Result<()> {
    config::load_dotenv();

    // Load before touching the terminal so a slow read never shows a blank screen.
    let mut app = App::new();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    if let Some(err) = &app.load_error {
        eprintln!("[WARN] predictor disabled: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app.bundle))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match (app.bundle, app.form.as_ref()) {
        (Some(bundle), Some(form)) => render_form(frame, chunks[1], bundle, form),
        _ => render_not_ready(frame, chunks[1], app.load_error.as_deref().unwrap_or("unknown error")),
    }

    let footer = Paragraph::new(footer_text(app.form.is_some()))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.form.as_ref().is_some_and(|f| f.help_overlay) {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(bundle: Option<&ArtifactBundle>) -> String {
    let title = "AI-BASED IPL SCORE PREDICTION";
    let detail = match bundle {
        Some(b) => format!(
            "Bundle {} | trained {} | {} train rows | RMSE {:.2}",
            b.bundle_id, b.meta.generated_at, b.meta.train_rows, b.meta.rmse
        ),
        None => "No model loaded".to_string(),
    };
    format!("  (o)  {title}\n  /|\\  {detail}")
}

fn footer_text(ready: bool) -> String {
    if ready {
        "j/k/↑/↓ Field | h/l/←/→ Adjust | +/- ×10 | Enter/p Predict | ? Help | q Quit".to_string()
    } else {
        "q Quit".to_string()
    }
}

fn render_not_ready(frame: &mut Frame, area: Rect, err: &str) {
    let text = vec![
        Line::from(Span::styled(
            "System Not Ready",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("The model bundle could not be loaded, so no predictions are available."),
        Line::from(Span::styled(err.to_string(), Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from("System not ready: run `cargo run --bin train`"),
    ];
    let popup = centered_rect(70, 50, area);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Error").borders(Borders::ALL));
    frame.render_widget(paragraph, popup);
}

fn render_form(frame: &mut Frame, area: Rect, bundle: &ArtifactBundle, form: &FormState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Min(5),
            Constraint::Length(4),
            Constraint::Length(5),
        ])
        .split(area);

    render_versus(frame, rows[0], form);

    let inputs = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(rows[1]);

    let setup = field_lines(form, &[Field::BatTeam, Field::BowlTeam, Field::Venue]);
    frame.render_widget(
        Paragraph::new(setup).block(Block::default().title("Match Setup").borders(Borders::ALL)),
        inputs[0],
    );

    let status = field_lines(form, &[Field::Runs, Field::Wickets, Field::Overs, Field::Balls]);
    frame.render_widget(
        Paragraph::new(status)
            .block(Block::default().title("Live Match Status").borders(Borders::ALL)),
        inputs[1],
    );

    let recent = if form.recent_form_enabled() {
        field_lines(form, &[Field::RunsLast5, Field::WicketsLast5])
    } else {
        vec![Line::from(Span::styled(
            "Match is in early stages (< 5 overs). Recent form ignored.",
            Style::default().fg(Color::DarkGray),
        ))]
    };
    frame.render_widget(
        Paragraph::new(recent)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("Recent Form (Last 5 Overs)").borders(Borders::ALL)),
        inputs[2],
    );

    render_outcome(frame, rows[2], rows[3], form);

    let footer_note = format!(
        "Random forest · {} trees · seed {} · {} teams · {} venues",
        bundle.model.trees().len(),
        bundle.model.config().seed,
        bundle.team_encoder.len(),
        bundle.venue_encoder.len()
    );
    let console = Paragraph::new(console_text(form))
        .block(Block::default().title(footer_note).borders(Borders::ALL));
    frame.render_widget(console, rows[4]);
}

fn render_versus(frame: &mut Frame, area: Rect, form: &FormState) {
    let bat = teams::badge(form.bat_team());
    let bowl = teams::badge(form.bowl_team());
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(10),
            Constraint::Percentage(45),
        ])
        .split(area);

    let side = |short: String, color: Color, name: &str| {
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("[ {short} ]"),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(name.to_string()),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
    };
    frame.render_widget(side(bat.short, bat.color, form.bat_team()), cols[0]);
    let vs = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "VS",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(vs, cols[1]);
    frame.render_widget(side(bowl.short, bowl.color, form.bowl_team()), cols[2]);
}

fn field_lines(form: &FormState, fields: &[Field]) -> Vec<Line<'static>> {
    fields
        .iter()
        .map(|field| {
            let focused = *field == form.focus;
            let prefix = if focused { "> " } else { "  " };
            let style = if focused {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{prefix}{}: {}", field.label(), field_value(form, *field)),
                style,
            ))
        })
        .collect()
}

fn field_value(form: &FormState, field: Field) -> String {
    match field {
        Field::BatTeam => form.bat_team().to_string(),
        Field::BowlTeam => form.bowl_team().to_string(),
        Field::Venue => form.venue().to_string(),
        Field::Runs => form.runs.to_string(),
        Field::Wickets => form.wickets.to_string(),
        Field::Overs => form.overs.to_string(),
        Field::Balls => form.balls.to_string(),
        Field::RunsLast5 => form.runs_last_5.to_string(),
        Field::WicketsLast5 => form.wickets_last_5.to_string(),
    }
}

fn render_outcome(frame: &mut Frame, result_area: Rect, metrics_area: Rect, form: &FormState) {
    match &form.outcome {
        Outcome::Empty => {
            let hint = Paragraph::new("Set the match state and press Enter to predict the final score")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Projected Score").borders(Borders::ALL));
            frame.render_widget(hint, result_area);
        }
        Outcome::Rejected(msg) => {
            let err = Paragraph::new(Line::from(Span::styled(
                msg.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(Block::default().title("Projected Score").borders(Borders::ALL));
            frame.render_widget(err, result_area);
        }
        Outcome::Forecast(forecast) => {
            let text = vec![
                Line::from(Span::styled(
                    "PROJECTED SCORE",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    forecast.predicted.to_string(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
                Line::from(format!(
                    "Expected Range: {} - {}",
                    forecast.range.lower, forecast.range.upper
                )),
            ];
            let result = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Green)));
            frame.render_widget(result, result_area);

            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(33),
                    Constraint::Percentage(34),
                    Constraint::Percentage(33),
                ])
                .split(metrics_area);
            let m = &forecast.metrics;
            render_metric(frame, cells[0], "Current Run Rate", &m.current_run_rate_label());
            render_metric(frame, cells[1], "Projected (at CRR)", &m.projected_label());
            render_metric(
                frame,
                cells[2],
                &format!("RPO Required (to reach {})", forecast.predicted),
                &m.required_run_rate_label(),
            );
        }
    }
}

fn render_metric(frame: &mut Frame, area: Rect, label: &str, value: &str) {
    let metric = Paragraph::new(Line::from(Span::styled(
        value.to_string(),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().title(label.to_string()).borders(Borders::ALL));
    frame.render_widget(metric, area);
}

fn console_text(form: &FormState) -> String {
    if form.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = form.logs.len().saturating_sub(3);
    form.logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "IPL Score Predictor - Help",
        "",
        "Fields:",
        "  j/k or ↑/↓   Move between fields",
        "  h/l or ←/→   Change value / team / venue",
        "  + / -        Change by 10",
        "",
        "Actions:",
        "  Enter / p    Predict final score",
        "  ?            Toggle help",
        "  q / Esc      Quit",
        "",
        "Recent form is only used after 5 overs.",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
