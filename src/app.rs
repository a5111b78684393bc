// ============================================================================
// APP - Screen state and event handling for the terminal UI
// ============================================================================
//
// SCREENS:
// 1. SignIn      - Named account or guest
// 2. Frameworks  - Pick a reflection template
// 3. Editor      - One text area per schema field, Ctrl+S saves
// 4. History     - Month calendar, statistics, records of the selected day
// 5. Detail      - A single record in schema order, edit or delete
// ============================================================================

use std::time::Instant;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{error, info, warn};
use tui_textarea::{CursorMove, Input, Key, TextArea};

use crate::calendar::{MonthlyCalendarData, build_monthly_calendar_at, shift_month};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::export::export_month;
use crate::journal::{Draft, Journal, SaveFailed, SaveStatus};
use crate::session::{AutoRefresh, start_auto_refresh};
use crate::store::FileStore;
use crate::validation::ValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    Frameworks,
    Editor,
    History,
    Detail,
}

/// One text area per schema field, in schema order.
pub struct FieldEditor {
    pub field_id: String,
    pub textarea: TextArea<'static>,
}

pub struct App {
    pub config: AppConfig,
    pub ctx: AppContext,
    pub store: FileStore,
    pub journal: Option<Journal>,
    refresher: Option<AutoRefresh>,
    pub screen: Screen,
    pub today: NaiveDate,

    // Sign-in
    pub sign_in_name: String,
    pub sign_in_error: Option<String>,

    // Framework selection
    pub framework_idx: usize,

    // Editor
    pub draft: Option<Draft>,
    pub field_editors: Vec<FieldEditor>,
    pub focused_field: usize,
    pub validation: Option<ValidationResult>,
    return_screen: Screen,

    // History
    pub calendar_year: i32,
    pub calendar_month: u32,
    pub selected_date: NaiveDate,
    pub calendar: Option<MonthlyCalendarData>,

    // Detail
    pub detail_record_id: Option<String>,
    pub confirm_delete: bool,

    // Popups
    pub show_error_popup: bool,
    pub error_message: String,
    pub show_success_popup: bool,
    pub success_message: String,

    // UI areas for mouse support
    pub calendar_day_rects: Vec<(NaiveDate, Rect)>,
    pub framework_items: Vec<(usize, Rect)>,
    pub field_rects: Vec<(usize, Rect)>,
    pub day_record_items: Vec<(usize, Rect)>,
}

impl App {
    pub fn new(config: AppConfig, mut ctx: AppContext, store: FileStore) -> Self {
        let today = Local::now().date_naive();
        let restored = ctx.init().is_some();
        let mut app = Self {
            config,
            ctx,
            store,
            journal: None,
            refresher: None,
            screen: Screen::SignIn,
            today,
            sign_in_name: String::new(),
            sign_in_error: None,
            framework_idx: 0,
            draft: None,
            field_editors: Vec::new(),
            focused_field: 0,
            validation: None,
            return_screen: Screen::Frameworks,
            calendar_year: today.year(),
            calendar_month: today.month(),
            selected_date: today,
            calendar: None,
            detail_record_id: None,
            confirm_delete: false,
            show_error_popup: false,
            error_message: String::new(),
            show_success_popup: false,
            success_message: String::new(),
            calendar_day_rects: Vec::new(),
            framework_items: Vec::new(),
            field_rects: Vec::new(),
            day_record_items: Vec::new(),
        };
        if restored {
            app.enter_signed_in();
        }
        app
    }

    /// Remaining session lifetime for the status bar.
    pub fn session_expires_in(&mut self) -> Option<i64> {
        self.ctx.auth_client().expires_in_seconds()
    }

    pub fn on_tick(&mut self, now: Instant) {
        let today = Local::now().date_naive();
        if today != self.today {
            self.today = today;
            self.refresh_calendar();
        }
        if let Some(refresher) = self.refresher.as_mut() {
            refresher.tick(now, self.ctx.auth_client());
        }
    }

    /// Stop background work and persist the allow-listed auth state.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(mut refresher) = self.refresher.take() {
            refresher.stop();
        }
        self.ctx.teardown()
    }

    fn enter_signed_in(&mut self) {
        let Some(user) = self.ctx.user().cloned() else {
            return;
        };
        match Journal::load(&self.store, &user.id) {
            Ok(journal) => {
                self.framework_idx = journal
                    .active_frameworks()
                    .iter()
                    .position(|f| f.id == self.config.default_framework)
                    .unwrap_or(0);
                self.journal = Some(journal);
                self.refresher = Some(start_auto_refresh(self.config.refresh_before_expiry_minutes));
                self.screen = Screen::Frameworks;
                self.refresh_calendar();
            }
            Err(e) => {
                error!("Could not load reflections: {}", e);
                self.show_error(&format!("Could not load reflections: {e}"));
            }
        }
    }

    fn sign_out(&mut self) {
        if let Some(mut refresher) = self.refresher.take() {
            refresher.stop();
        }
        if let Err(e) = self.ctx.sign_out() {
            warn!("Sign out: {:#}", e);
        }
        self.journal = None;
        self.draft = None;
        self.field_editors.clear();
        self.calendar = None;
        self.screen = Screen::SignIn;
    }

    pub fn show_error(&mut self, message: &str) {
        self.show_error_popup = true;
        self.error_message = message.to_string();
    }

    fn show_success(&mut self, message: &str) {
        self.show_success_popup = true;
        self.success_message = message.to_string();
    }

    pub fn refresh_calendar(&mut self) {
        self.calendar = self.journal.as_ref().map(|journal| {
            build_monthly_calendar_at(
                self.calendar_year,
                self.calendar_month,
                journal.records(),
                journal.frameworks(),
                self.today,
                self.config.week_start,
            )
        });
    }

    fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
        if date.year() != self.calendar_year || date.month() != self.calendar_month {
            self.calendar_year = date.year();
            self.calendar_month = date.month();
            self.refresh_calendar();
        }
    }

    fn shift_calendar_month(&mut self, delta: i32) {
        let (year, month) = shift_month(self.calendar_year, self.calendar_month, delta);
        self.calendar_year = year;
        self.calendar_month = month;
        let day = self.selected_date.day().min(28);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            self.selected_date = date;
        }
        self.refresh_calendar();
    }

    /// Ids of the records on the selected day, newest first.
    pub fn selected_day_record_ids(&self) -> Vec<String> {
        self.journal
            .as_ref()
            .map(|j| j.records_on(self.selected_date).iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------------

    fn open_editor(&mut self, draft: Draft, return_screen: Screen) {
        let Some(framework) = self.journal.as_ref().and_then(|j| j.framework(&draft.framework_id)) else {
            self.show_error("This reflection uses a framework that no longer exists.");
            return;
        };
        self.field_editors = framework
            .ordered_fields()
            .into_iter()
            .map(|field| {
                let value = draft.values.get(&field.id).cloned().unwrap_or_default();
                let lines: Vec<String> = value.split('\n').map(str::to_string).collect();
                let mut textarea = TextArea::new(lines);
                textarea.move_cursor(CursorMove::Bottom);
                textarea.move_cursor(CursorMove::End);
                FieldEditor {
                    field_id: field.id.clone(),
                    textarea,
                }
            })
            .collect();
        self.focused_field = 0;
        self.validation = None;
        self.draft = Some(draft);
        self.return_screen = return_screen;
        if let Some(journal) = self.journal.as_mut() {
            journal.status = SaveStatus::Idle;
        }
        self.screen = Screen::Editor;
    }

    fn sync_focused_field(&mut self) {
        let (Some(draft), Some(editor)) = (self.draft.as_mut(), self.field_editors.get(self.focused_field)) else {
            return;
        };
        draft
            .values
            .insert(editor.field_id.clone(), editor.textarea.lines().join("\n"));
    }

    fn shift_draft_date(&mut self, days: i64) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        // The date of a saved record is fixed.
        if draft.record_id.is_some() {
            return;
        }
        if let Some(date) = draft.date.checked_add_signed(chrono::Duration::days(days)) {
            draft.date = date;
        }
    }

    fn save_draft(&mut self) {
        self.sync_focused_field();
        let (Some(journal), Some(draft)) = (self.journal.as_mut(), self.draft.as_ref()) else {
            return;
        };
        match journal.save(&mut self.store, draft) {
            Ok(saved) => {
                info!("Saved reflection {} ({})", saved.record.id, saved.record.date);
                self.validation = None;
                let date = saved.record.parsed_date().unwrap_or(self.today);
                // Keep editing the stored record from now on.
                if let Some(draft) = self.draft.as_mut() {
                    draft.record_id = Some(saved.record.id.clone());
                }
                self.select_date(date);
                self.refresh_calendar();
                self.show_success(if saved.created { "Reflection saved." } else { "Reflection updated." });
            }
            Err(SaveFailed::Invalid(result)) => {
                self.validation = Some(result);
            }
            Err(e) => {
                self.show_error(&format!("{e}\n\nYour text is still in the editor."));
            }
        }
    }

    fn close_editor(&mut self) {
        self.draft = None;
        self.field_editors.clear();
        self.validation = None;
        self.screen = self.return_screen;
    }

    // ------------------------------------------------------------------------
    // Key handling
    // ------------------------------------------------------------------------

    /// Returns `true` when the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(true);
        }

        if self.show_error_popup || self.show_success_popup {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.show_error_popup = false;
                self.show_success_popup = false;
                self.error_message.clear();
                self.success_message.clear();
            }
            return Ok(false);
        }

        match self.screen {
            Screen::SignIn => Ok(self.handle_sign_in_key(key)),
            Screen::Frameworks => Ok(self.handle_frameworks_key(key)),
            Screen::Editor => {
                self.handle_editor_key(key);
                Ok(false)
            }
            Screen::History => {
                self.handle_history_key(key);
                Ok(false)
            }
            Screen::Detail => {
                self.handle_detail_key(key);
                Ok(false)
            }
        }
    }

    fn handle_sign_in_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Backspace => {
                self.sign_in_name.pop();
            }
            KeyCode::Enter => {
                let name = self.sign_in_name.trim().to_string();
                let result = if name.is_empty() {
                    self.ctx.sign_in_guest().map_err(|e| format!("{e:#}"))
                } else {
                    self.ctx.sign_in(&name).map_err(|e| e.to_string())
                };
                match result {
                    Ok(_) => {
                        self.sign_in_error = None;
                        self.sign_in_name.clear();
                        self.enter_signed_in();
                    }
                    Err(e) => self.sign_in_error = Some(e),
                }
            }
            KeyCode::Char(c) if !c.is_control() && self.sign_in_name.chars().count() < 40 => {
                self.sign_in_name.push(c);
            }
            _ => {}
        }
        false
    }

    fn handle_frameworks_key(&mut self, key: KeyEvent) -> bool {
        let count = self.journal.as_ref().map(|j| j.active_frameworks().len()).unwrap_or(0);
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => self.framework_idx = self.framework_idx.saturating_sub(1),
            KeyCode::Down if self.framework_idx + 1 < count => self.framework_idx += 1,
            KeyCode::Enter => self.open_selected_framework(),
            KeyCode::Char('h') | KeyCode::Tab => {
                self.refresh_calendar();
                self.screen = Screen::History;
            }
            KeyCode::Char('o') => self.sign_out(),
            _ => {}
        }
        false
    }

    fn open_selected_framework(&mut self) {
        let Some(framework) = self
            .journal
            .as_ref()
            .and_then(|j| j.active_frameworks().get(self.framework_idx).map(|f| (*f).clone()))
        else {
            return;
        };
        let draft = Draft::new(&framework, self.selected_date);
        self.open_editor(draft, Screen::Frameworks);
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => return self.save_draft(),
            KeyCode::Char('p') if ctrl => return self.shift_draft_date(-1),
            KeyCode::Char('n') if ctrl => return self.shift_draft_date(1),
            KeyCode::Esc => return self.close_editor(),
            KeyCode::Tab => {
                self.sync_focused_field();
                if !self.field_editors.is_empty() {
                    self.focused_field = (self.focused_field + 1) % self.field_editors.len();
                }
                return;
            }
            KeyCode::BackTab => {
                self.sync_focused_field();
                if !self.field_editors.is_empty() {
                    self.focused_field =
                        (self.focused_field + self.field_editors.len() - 1) % self.field_editors.len();
                }
                return;
            }
            _ => {}
        }

        // Forward everything else to the focused text area
        let input = Input {
            key: match key.code {
                KeyCode::Char(c) => Key::Char(c),
                KeyCode::Enter => Key::Enter,
                KeyCode::Backspace => Key::Backspace,
                KeyCode::Delete => Key::Delete,
                KeyCode::Left => Key::Left,
                KeyCode::Right => Key::Right,
                KeyCode::Up => Key::Up,
                KeyCode::Down => Key::Down,
                KeyCode::Home => Key::Home,
                KeyCode::End => Key::End,
                KeyCode::PageUp => Key::PageUp,
                KeyCode::PageDown => Key::PageDown,
                _ => Key::Null,
            },
            ctrl,
            alt: key.modifiers.contains(KeyModifiers::ALT),
        };
        if let Some(editor) = self.field_editors.get_mut(self.focused_field) {
            editor.textarea.input(input);
        }
        self.sync_focused_field();
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.screen = Screen::Frameworks,
            KeyCode::Left => self.step_selected_day(-1),
            KeyCode::Right => self.step_selected_day(1),
            KeyCode::Up => self.step_selected_day(-7),
            KeyCode::Down => self.step_selected_day(7),
            KeyCode::PageUp | KeyCode::Char('<') => self.shift_calendar_month(-1),
            KeyCode::PageDown | KeyCode::Char('>') => self.shift_calendar_month(1),
            KeyCode::Char('t') => self.select_date(self.today),
            KeyCode::Char('n') => self.screen = Screen::Frameworks,
            KeyCode::Char('x') => self.export_current_month(),
            KeyCode::Enter => self.open_day_record(0),
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                self.open_day_record(c as usize - '1' as usize);
            }
            _ => {}
        }
    }

    fn step_selected_day(&mut self, days: i64) {
        if let Some(date) = self.selected_date.checked_add_signed(chrono::Duration::days(days)) {
            self.select_date(date);
        }
    }

    fn open_day_record(&mut self, idx: usize) {
        if let Some(id) = self.selected_day_record_ids().get(idx) {
            self.detail_record_id = Some(id.clone());
            self.confirm_delete = false;
            self.screen = Screen::Detail;
        }
    }

    fn export_current_month(&mut self) {
        let Some(journal) = self.journal.as_ref() else {
            return;
        };
        let result = self.config.export_dir().and_then(|dir| {
            export_month(
                &dir,
                self.calendar_year,
                self.calendar_month,
                journal.records(),
                journal.frameworks(),
            )
        });
        match result {
            Ok(path) => self.show_success(&format!("Exported to {}", path.display())),
            Err(e) => {
                error!("Export failed: {:#}", e);
                self.show_error(&format!("Export failed: {e:#}"));
            }
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        if self.confirm_delete {
            match key.code {
                KeyCode::Char('y') => self.delete_detail_record(),
                _ => self.confirm_delete = false,
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.screen = Screen::History,
            KeyCode::Char('d') => self.confirm_delete = true,
            KeyCode::Char('e') => self.edit_detail_record(),
            _ => {}
        }
    }

    fn edit_detail_record(&mut self) {
        let Some(record) = self
            .detail_record_id
            .as_deref()
            .and_then(|id| self.journal.as_ref().and_then(|j| j.record(id)))
            .cloned()
        else {
            return;
        };
        let date = record.parsed_date().unwrap_or(self.selected_date);
        self.open_editor(Draft::from_record(&record, date), Screen::Detail);
    }

    fn delete_detail_record(&mut self) {
        self.confirm_delete = false;
        let (Some(journal), Some(id)) = (self.journal.as_mut(), self.detail_record_id.clone()) else {
            return;
        };
        match journal.delete(&mut self.store, &id) {
            Ok(()) => {
                self.detail_record_id = None;
                self.screen = Screen::History;
                self.refresh_calendar();
                self.show_success("Reflection deleted.");
            }
            Err(e) => {
                error!("Delete failed: {}", e);
                self.show_error(&format!("Could not delete: {e}"));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mouse handling
    // ------------------------------------------------------------------------

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        if self.show_error_popup || self.show_success_popup {
            return;
        }
        match self.screen {
            Screen::Frameworks => {
                if let Some(idx) = find_clicked_item(mouse, &self.framework_items) {
                    if idx == self.framework_idx {
                        self.open_selected_framework();
                    } else {
                        self.framework_idx = idx;
                    }
                }
            }
            Screen::Editor => {
                if let Some(idx) = find_clicked_item(mouse, &self.field_rects) {
                    self.sync_focused_field();
                    self.focused_field = idx;
                }
            }
            Screen::History => {
                let clicked_day = self
                    .calendar_day_rects
                    .iter()
                    .find(|(_, rect)| inside_rect(mouse, *rect))
                    .map(|(date, _)| *date);
                if let Some(date) = clicked_day {
                    self.select_date(date);
                } else if let Some(idx) = find_clicked_item(mouse, &self.day_record_items) {
                    self.open_day_record(idx);
                }
            }
            Screen::SignIn | Screen::Detail => {}
        }
    }
}

pub fn inside_rect(mouse: MouseEvent, rect: Rect) -> bool {
    mouse.row >= rect.y
        && mouse.row < rect.y + rect.height
        && mouse.column >= rect.x
        && mouse.column < rect.x + rect.width
}

// Helper: Find clicked item index from mouse event
fn find_clicked_item(mouse: MouseEvent, items: &[(usize, Rect)]) -> Option<usize> {
    items
        .iter()
        .find(|(_, rect)| inside_rect(mouse, *rect))
        .map(|(idx, _)| *idx)
}
