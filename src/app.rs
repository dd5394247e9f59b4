use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use crate::apply::ApplyResult;
use crate::config::Settings;
use crate::profile::DisplayProfile;
use crate::service::ProfileService;
use crate::topology::DisplayApi;

/// Keys pressed within this window after an apply are not taken as an answer.
const INPUT_GRACE: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub enum Overlay {
    None,
    Confirm {
        countdown_start: Instant,
        duration: Duration,
        ready_for_input: bool,
    },
    Save {
        input: String,
    },
    Delete {
        name: String,
    },
}

pub struct App {
    pub profiles: Vec<DisplayProfile>,
    pub selected: usize,
    pub overlay: Overlay,
    pub status_msg: String,
    pub missing: Vec<String>,
    confirm_duration: Duration,
}

impl App {
    pub fn new(profiles: Vec<DisplayProfile>, confirm_duration: Duration) -> Self {
        let status_msg = if profiles.is_empty() {
            "No saved profiles yet, press 's' to save the current layout".to_string()
        } else {
            format!("{} profile(s)", profiles.len())
        };
        App {
            profiles,
            selected: 0,
            overlay: Overlay::None,
            status_msg,
            missing: Vec::new(),
            confirm_duration,
        }
    }

    pub fn selected_profile(&self) -> Option<&DisplayProfile> {
        self.profiles.get(self.selected)
    }

    fn run_loop<A: DisplayApi>(
        &mut self,
        service: &ProfileService<A>,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<()> {
        loop {
            terminal.draw(|f| crate::ui::draw(f, self))?;
            self.tick(service);

            let poll_timeout = match &self.overlay {
                Overlay::Confirm { .. } => Duration::from_millis(100),
                _ => Duration::from_millis(250),
            };

            if event::poll(poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && !self.handle_key(service, key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Advance the confirm countdown, reverting once it runs out.
    pub fn tick<A: DisplayApi>(&mut self, service: &ProfileService<A>) {
        if let Overlay::Confirm { countdown_start, duration, ready_for_input } = &mut self.overlay {
            let elapsed = countdown_start.elapsed();
            if !*ready_for_input && elapsed >= INPUT_GRACE {
                *ready_for_input = true;
            }
            if elapsed >= *duration {
                self.revert(service);
                self.status_msg = format!("Timeout, {}", self.status_msg);
            }
        }
    }

    /// Returns false when the app should quit.
    pub fn handle_key<A: DisplayApi>(&mut self, service: &ProfileService<A>, key: KeyEvent) -> bool {
        match &self.overlay {
            Overlay::Confirm { .. } => {
                self.handle_confirm_key(service, key);
                return true;
            }
            Overlay::Save { .. } => {
                self.handle_save_key(service, key);
                return true;
            }
            Overlay::Delete { .. } => {
                self.handle_delete_key(service, key);
                return true;
            }
            Overlay::None => {}
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected + 1 < self.profiles.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Enter => self.apply_selected(service),
            KeyCode::Char('s') => {
                self.overlay = Overlay::Save { input: String::new() };
            }
            KeyCode::Char('d') => {
                if let Some(profile) = self.selected_profile() {
                    self.overlay = Overlay::Delete {
                        name: profile.name.clone(),
                    };
                }
            }
            KeyCode::Char('u') => {
                let outcome = service.revert();
                self.show_result(&ApplyResult::from(&outcome));
            }
            KeyCode::Char('r') => {
                self.reload(service);
                self.status_msg = format!("Reloaded {} profile(s)", self.profiles.len());
            }
            _ => {}
        }
        true
    }

    pub fn reload<A: DisplayApi>(&mut self, service: &ProfileService<A>) {
        match service.list() {
            Ok(profiles) => self.profiles = profiles,
            Err(e) => {
                warn!(error = %e, "failed to reload profiles");
                self.status_msg = format!("Error reading profiles: {}", e);
            }
        }
        self.selected = self.selected.min(self.profiles.len().saturating_sub(1));
    }

    fn show_result(&mut self, result: &ApplyResult) {
        self.status_msg = if result.success {
            result.message.clone()
        } else {
            format!("Error: {}", result.message)
        };
        self.missing = result.missing.clone();
    }

    // --- Apply ---

    fn apply_selected<A: DisplayApi>(&mut self, service: &ProfileService<A>) {
        let Some(name) = self.selected_profile().map(|p| p.name.clone()) else {
            self.status_msg = "No profile selected".to_string();
            return;
        };

        info!(profile = %name, "applying profile from tui");
        let result = ApplyResult::from(&service.apply_by_name(&name));
        self.show_result(&result);

        if result.success {
            self.overlay = Overlay::Confirm {
                countdown_start: Instant::now(),
                duration: self.confirm_duration,
                ready_for_input: false,
            };
        }
    }

    fn handle_confirm_key<A: DisplayApi>(&mut self, service: &ProfileService<A>, key: KeyEvent) {
        let Overlay::Confirm { ready_for_input: true, .. } = &self.overlay else {
            return;
        };

        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char(' ') | KeyCode::Enter => {
                self.overlay = Overlay::None;
                self.status_msg = "Configuration kept".to_string();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.revert(service),
            _ => {}
        }
    }

    fn revert<A: DisplayApi>(&mut self, service: &ProfileService<A>) {
        self.overlay = Overlay::None;
        let result = ApplyResult::from(&service.revert());
        if result.success {
            self.status_msg = "changes reverted".to_string();
            self.missing = result.missing;
        } else {
            self.show_result(&result);
        }
    }

    // --- Save / delete ---

    fn handle_save_key<A: DisplayApi>(&mut self, service: &ProfileService<A>, key: KeyEvent) {
        let Overlay::Save { input } = &mut self.overlay else {
            return;
        };

        match key.code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter if !input.trim().is_empty() => {
                let name = input.trim().to_string();
                self.overlay = Overlay::None;
                match service.save_current(&name, "") {
                    Ok(profile) => {
                        self.status_msg = format!("Saved profile: {} ({})", name, profile.summary());
                        self.reload(service);
                        if let Some(idx) = self.profiles.iter().position(|p| p.name == name) {
                            self.selected = idx;
                        }
                    }
                    Err(e) => self.status_msg = format!("Error saving: {}", e),
                }
            }
            KeyCode::Esc => self.overlay = Overlay::None,
            _ => {}
        }
    }

    fn handle_delete_key<A: DisplayApi>(&mut self, service: &ProfileService<A>, key: KeyEvent) {
        let Overlay::Delete { name } = &self.overlay else {
            return;
        };
        let name = name.clone();

        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.overlay = Overlay::None;
                self.status_msg = match service.delete(&name) {
                    Ok(true) => format!("Deleted profile: {}", name),
                    Ok(false) => format!("Profile '{}' was already gone", name),
                    Err(e) => format!("Error deleting: {}", e),
                };
                self.reload(service);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.overlay = Overlay::None;
            }
            _ => {}
        }
    }
}

/// Take over the terminal and run the profile manager until the user quits.
pub fn run<A: DisplayApi>(service: &ProfileService<A>, settings: &Settings) -> Result<()> {
    let profiles = service.list().context("failed to read saved profiles")?;
    let mut app = App::new(profiles, Duration::from_secs(settings.confirm_timeout_secs));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = app.run_loop(service, &mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
