use anyhow::Result;
use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dre_ledger::ledger_file::parse_entry_date;
use dre_ledger::{
    format_brl, levels_up_to, Choice, DreError, DreReport, EntryForm, EntryId, Session,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::BTreeSet;
use std::io;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Report,
    Entries,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Report => Page::Entries,
            Page::Entries => Page::Report,
        }
    }

    pub fn previous(&self) -> Self {
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Report => "Validar DRE",
            Page::Entries => "Editar Lançamentos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    fn error(err: &DreError) -> Self {
        warn!(error = %err, "Operation failed");
        Notice {
            kind: NoticeKind::Error,
            text: err.user_message(),
        }
    }
}

// ============================================================================
// ENTRY FORM OVERLAY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Date,
    CostCenter,
    Account,
    Hierarchy,
    Balance,
}

impl FormField {
    const ALL: [FormField; 5] = [
        FormField::Date,
        FormField::CostCenter,
        FormField::Account,
        FormField::Hierarchy,
        FormField::Balance,
    ];

    fn label(&self) -> &str {
        match self {
            FormField::Date => "Data",
            FormField::CostCenter => "Centro de Custo",
            FormField::Account => "Conta Contábil",
            FormField::Hierarchy => "Hierarquia DRE",
            FormField::Balance => "Saldo",
        }
    }

    fn step(&self, forward: bool) -> Self {
        let index = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        let len = Self::ALL.len();
        let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
        Self::ALL[next]
    }
}

pub struct FormState {
    pub form: EntryForm,
    pub field: FormField,
    pub date_input: String,
    pub balance_input: String,
    /// Quick-entry form on the report page saves immediately
    pub commit_on_submit: bool,
}

impl FormState {
    fn new(date: NaiveDate, commit_on_submit: bool) -> Self {
        FormState {
            form: EntryForm::new(date),
            field: FormField::CostCenter,
            date_input: date.format("%d/%m/%Y").to_string(),
            balance_input: String::new(),
            commit_on_submit,
        }
    }

    fn text_input(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Date => Some(&mut self.date_input),
            FormField::Balance => Some(&mut self.balance_input),
            _ => None,
        }
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct App {
    pub session: Session,
    pub level_options: Vec<i64>,
    pub level_index: usize,
    pub current_page: Page,
    pub report_state: TableState,
    pub entries_state: TableState,
    pub selected: BTreeSet<EntryId>,
    pub form: Option<FormState>,
    pub notice: Option<Notice>,
    today: NaiveDate,
}

impl App {
    pub fn new(session: Session, level_options: Vec<i64>, level_index: usize) -> Self {
        let mut report_state = TableState::default();
        report_state.select(Some(0));

        let mut entries_state = TableState::default();
        if !session.store().is_empty() {
            entries_state.select(Some(0));
        }

        let level_index = level_index.min(level_options.len().saturating_sub(1));

        Self {
            session,
            level_options,
            level_index,
            current_page: Page::Report,
            report_state,
            entries_state,
            selected: BTreeSet::new(),
            form: None,
            notice: None,
            today: Local::now().date_naive(),
        }
    }

    pub fn current_level(&self) -> i64 {
        self.level_options.get(self.level_index).copied().unwrap_or(1)
    }

    pub fn report(&mut self) -> DreReport {
        let levels = levels_up_to(self.current_level());
        self.session.report(&levels).clone()
    }

    pub fn next_level(&mut self) {
        if !self.level_options.is_empty() {
            self.level_index = (self.level_index + 1) % self.level_options.len();
        }
    }

    pub fn previous_level(&mut self) {
        if !self.level_options.is_empty() {
            let len = self.level_options.len();
            self.level_index = (self.level_index + len - 1) % len;
        }
    }

    pub fn select_level(&mut self, level: i64) {
        if let Some(index) = self.level_options.iter().position(|&l| l == level) {
            self.level_index = index;
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn entry_count(&self) -> usize {
        self.session.store().len()
    }

    pub fn next(&mut self) {
        let len = self.entry_count();
        if len == 0 {
            return;
        }
        let i = match self.entries_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.entries_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.entry_count();
        if len == 0 {
            return;
        }
        let i = match self.entries_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.entries_state.select(Some(i));
    }

    /// Stable id of the row under the cursor
    pub fn cursor_entry(&self) -> Option<EntryId> {
        let row = self.entries_state.selected()?;
        self.session.store().effective_view().get(row).map(|r| r.id)
    }

    pub fn toggle_selection(&mut self) {
        if let Some(id) = self.cursor_entry() {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.entry_count();
        match self.entries_state.selected() {
            _ if len == 0 => self.entries_state.select(None),
            Some(i) if i >= len => self.entries_state.select(Some(len - 1)),
            None => self.entries_state.select(Some(0)),
            _ => {}
        }
    }

    /// Delete the marked entries, or the one under the cursor when nothing is marked.
    pub fn delete_selected(&mut self) {
        let ids: Vec<EntryId> = if self.selected.is_empty() {
            self.cursor_entry().into_iter().collect()
        } else {
            self.selected.iter().copied().collect()
        };
        if ids.is_empty() {
            return;
        }

        match self.session.delete_entries(&ids) {
            Ok(deleted) => {
                self.selected.clear();
                self.clamp_cursor();
                self.notice = Some(Notice::info(format!("{} lançamento(s) excluído(s).", deleted)));
            }
            Err(err) => self.notice = Some(Notice::error(&err)),
        }
    }

    pub fn save_pending(&mut self) {
        match self.session.commit() {
            Ok(0) => self.notice = Some(Notice::info("Nenhum lançamento pendente.")),
            Ok(saved) => {
                self.notice = Some(Notice::info(format!("{} lançamento(s) salvo(s).", saved)))
            }
            Err(err) => self.notice = Some(Notice::error(&err)),
        }
    }

    pub fn discard_pending(&mut self) {
        let discarded = self.session.discard_staging();
        self.selected.retain(|id| self.session.store().find(*id).is_some());
        self.clamp_cursor();
        self.notice = Some(Notice::info(format!("{} lançamento(s) descartado(s).", discarded)));
    }

    pub fn reload(&mut self) {
        let result = self
            .session
            .reload_catalog()
            .and_then(|_| self.session.reload_ledger());
        match result {
            Ok(()) => {
                self.selected.clear();
                self.clamp_cursor();
                self.notice = Some(Notice::info("Dados recarregados."));
            }
            Err(err) => self.notice = Some(Notice::error(&err)),
        }
    }

    pub fn open_form(&mut self, commit_on_submit: bool) {
        self.form = Some(FormState::new(self.today, commit_on_submit));
    }

    /// Cycle the option list of the focused selector.
    fn cycle_option(&mut self, forward: bool) {
        let catalog = self.session.catalog();
        let state = match self.form.as_mut() {
            Some(state) => state,
            None => return,
        };

        let (options, current) = match state.field {
            FormField::CostCenter => (EntryForm::cost_center_options(catalog), state.form.cost_center()),
            FormField::Account => (EntryForm::account_options(catalog), state.form.account()),
            FormField::Hierarchy => (state.form.hierarchy_options(catalog), state.form.hierarchy()),
            _ => return,
        };

        let index = options.iter().position(|o| o == current.display()).unwrap_or(0);
        let len = options.len();
        let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
        let choice = Choice::from_option(&options[next]);

        match state.field {
            FormField::CostCenter => state.form.select_cost_center(choice),
            FormField::Account => state.form.select_account(choice),
            FormField::Hierarchy => state.form.select_hierarchy(choice),
            _ => {}
        }
    }

    pub fn submit_form(&mut self) {
        let state = match self.form.as_mut() {
            Some(state) => state,
            None => return,
        };

        match parse_entry_date(&state.date_input) {
            Some(date) => state.form.date = date,
            None => {
                self.notice = Some(Notice {
                    kind: NoticeKind::Error,
                    text: "Data inválida. Use DD/MM/AAAA.".to_string(),
                });
                return;
            }
        }

        let balance_text = if state.balance_input.trim().is_empty() { "0" } else { state.balance_input.as_str() };
        if let Err(err) = state.form.set_balance_text(balance_text) {
            self.notice = Some(Notice::error(&DreError::Validation(vec![err])));
            return;
        }

        let commit = state.commit_on_submit;
        let result = if commit {
            self.session.post_and_commit(&state.form)
        } else {
            self.session.post_entry(&state.form)
        };

        match result {
            Ok(_) => {
                self.form = None;
                self.clamp_cursor();
                self.notice = Some(Notice::info(if commit {
                    "Valor lançado e salvo."
                } else {
                    "Lançamento adicionado. Pressione 's' para salvar."
                }));
            }
            Err(err) => {
                if !err.is_validation() {
                    self.form = None;
                    self.clamp_cursor();
                }
                self.notice = Some(Notice::error(&err));
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let state = match self.form.as_mut() {
            Some(state) => state,
            None => return,
        };

        match key.code {
            KeyCode::Esc => self.form = None,
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => state.field = state.field.step(true),
            KeyCode::BackTab | KeyCode::Up => state.field = state.field.step(false),
            KeyCode::Right => self.cycle_option(true),
            KeyCode::Left => self.cycle_option(false),
            KeyCode::Backspace => {
                if let Some(input) = state.text_input() {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = state.text_input() {
                    input.push(c);
                }
            }
            _ => {}
        }
    }

    /// Apply one key press. Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.form.is_some() {
            self.handle_form_key(key);
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('n') => self.open_form(self.current_page == Page::Report),
            KeyCode::Char('r') => self.reload(),
            _ => match self.current_page {
                Page::Report => self.handle_report_key(key),
                Page::Entries => self.handle_entries_key(key),
            },
        }
        false
    }

    fn handle_report_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Right | KeyCode::Char('+') => self.next_level(),
            KeyCode::Left | KeyCode::Char('-') => self.previous_level(),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.select_level(i64::from(c.to_digit(10).unwrap_or(0)))
            }
            _ => {}
        }
    }

    fn handle_entries_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Home => self.entries_state.select(Some(0)),
            KeyCode::End => {
                let len = self.entry_count();
                if len > 0 {
                    self.entries_state.select(Some(len - 1));
                }
            }
            KeyCode::Char(' ') => self.toggle_selection(),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
            KeyCode::Char('s') => self.save_pending(),
            KeyCode::Char('x') => self.discard_pending(),
            _ => {}
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Report => render_report(f, chunks[1], app),
        Page::Entries => render_entries(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);

    if app.form.is_some() {
        render_form(f, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Report, Page::Entries].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Lançamentos: {}", app.session.store().committed_len()),
        Style::default().fg(Color::White),
    ));

    let pending = app.session.pending_count();
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Pendentes: {}", pending),
        Style::default().fg(if pending > 0 { Color::Yellow } else { Color::DarkGray }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

const EMPTY_REPORT_MESSAGE: &str = "⚠️ Nenhum dado encontrado para os níveis selecionados.";

fn render_report(f: &mut Frame, area: Rect, app: &mut App) {
    let report = app.report();
    let level = app.current_level();

    let rows = report.rows.iter().map(|row| {
        let color = if row.total_balance.is_sign_negative() && !row.total_balance.is_zero() {
            Color::Red
        } else {
            Color::Green
        };
        let style = if row.level_id == 1 {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        Row::new(vec![
            Cell::from(format!("{}{}", row.indent(), row.group_label)).style(style),
            Cell::from(row.level_id.to_string()),
            Cell::from(format_brl(row.total_balance)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let mut title = format!(" DRE - nível 1 a {} ", level);
    let skipped = report.malformed_entries + report.overflowed_entries;
    if report.unmatched_entries > 0 || skipped > 0 {
        title.push_str(&format!(
            "(fora da hierarquia: {}, saldo inválido: {}) ",
            report.unmatched_entries, skipped
        ));
    }

    if report.is_empty() {
        let notice = Paragraph::new(EMPTY_REPORT_MESSAGE)
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(notice, area);
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Min(40),
            Constraint::Length(6),
            Constraint::Length(22),
        ],
    )
    .header(header_row(&["Grupo", "Nível", "Saldo"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, &mut app.report_state);
}

fn render_entries(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .session
        .store()
        .effective_view()
        .into_iter()
        .map(|row| {
            let mark = if app.selected.contains(&row.id) { "[x]" } else { "[ ]" };
            let status = if row.staged {
                Cell::from("Pendente").style(Style::default().fg(Color::Yellow))
            } else {
                Cell::from("")
            };
            let balance = match row.entry.balance.amount() {
                Some(value) => Cell::from(format_brl(value)),
                None => Cell::from(row.entry.balance.to_canonical()).style(Style::default().fg(Color::Red)),
            };

            Row::new(vec![
                Cell::from(mark),
                Cell::from(row.row_id.to_string()),
                Cell::from(row.entry.date.format("%d/%m/%Y").to_string()),
                Cell::from(row.entry.hierarchy_key.clone()),
                Cell::from(row.entry.account_code.clone()),
                Cell::from(truncate(&row.entry.account_label, 28)),
                Cell::from(row.entry.cost_center_code.clone()),
                balance,
                status,
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(11),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(9),
        ],
    )
    .header(header_row(&[
        "", "#", "Data", "Hierarquia", "Conta", "Descrição", "C. Custo", "Saldo", "",
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Lançamentos ({} marcados) ", app.selected.len())),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.entries_state);
}

fn key_hint(spans: &mut Vec<Span<'static>>, key: &'static str, action: &'static str) {
    spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(action));
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans: Vec<Span<'static>> = vec![];

    if let Some(notice) = &app.notice {
        let color = match notice.kind {
            NoticeKind::Info => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        status_spans.push(Span::styled(format!(" {} ", notice.text), Style::default().fg(color)));
        status_spans.push(Span::raw("| "));
    }

    if app.form.is_some() {
        key_hint(&mut status_spans, "Tab/↑↓", " Campo | ");
        key_hint(&mut status_spans, "←/→", " Opção | ");
        key_hint(&mut status_spans, "Enter", " Lançar | ");
        key_hint(&mut status_spans, "Esc", " Cancelar");
    } else {
        match app.current_page {
            Page::Report => {
                key_hint(&mut status_spans, "←/→", " Nível | ");
                key_hint(&mut status_spans, "n", " Lançar valor | ");
            }
            Page::Entries => {
                key_hint(&mut status_spans, "Espaço", " Marcar | ");
                key_hint(&mut status_spans, "d", " Excluir | ");
                key_hint(&mut status_spans, "s", " Salvar | ");
                key_hint(&mut status_spans, "x", " Descartar | ");
                key_hint(&mut status_spans, "n", " Novo | ");
            }
        }
        key_hint(&mut status_spans, "Tab", " Página | ");
        key_hint(&mut status_spans, "r", " Recarregar | ");
        status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Sair"));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_form(f: &mut Frame, app: &App) {
    let state = match &app.form {
        Some(state) => state,
        None => return,
    };

    let area = centered_rect(60, 14, f.size());
    let form = &state.form;

    let values: Vec<(FormField, String)> = vec![
        (FormField::Date, format!("{}_", state.date_input)),
        (FormField::CostCenter, format!("◀ {} ▶", form.cost_center().display())),
        (FormField::Account, format!("◀ {} ▶", form.account().display())),
        (FormField::Hierarchy, format!("◀ {} ▶", form.hierarchy().display())),
        (FormField::Balance, format!("{}_", state.balance_input)),
    ];

    let mut content = vec![Line::from("")];
    for (field, value) in values {
        let focused = field == state.field;
        let label_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let value_style = if focused {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };

        content.push(Line::from(vec![
            Span::raw(if focused { " → " } else { "   " }),
            Span::styled(format!("{:<16}", field.label()), label_style),
            Span::styled(value, value_style),
        ]));
        content.push(Line::from(""));
    }

    let title = if state.commit_on_submit {
        " Lançar valor (salva imediatamente) "
    } else {
        " Novo lançamento (pendente) "
    };

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(Clear, area);
    f.render_widget(panel, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
