use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::session::{HistoryView, Session};
use crate::ui;
use crate::ui::images::ImagePanes;
use crate::ui::upload_dialog::UploadDialog;

/// Crop keys move or resize by this share of the image, in percent.
const CROP_STEP_PERCENT: i64 = 5;
const FINE_ROTATION: i32 = 1;
const COARSE_ROTATION: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Uploading,
    History,
    ConfirmClear,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// Work that runs the model. It is deferred by one frame so the busy
/// message is on screen while the call blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Upload(PathBuf),
    Apply,
}

pub struct App {
    pub config: Config,
    pub session: Session,
    pub mode: AppMode,
    pub should_quit: bool,
    pub status: Option<StatusMessage>,
    pub upload_dialog: Option<UploadDialog>,
    pub history: Option<HistoryView>,
    pub images: ImagePanes,
    pub pending: Option<PendingAction>,
    // Full terminal clear before the next draw, so stale graphics from
    // removed image panes do not linger
    pub clear_on_next_render: bool,
}

impl App {
    pub fn new(config: Config, session: Session) -> Self {
        let images = ImagePanes::new(config.preview.protocol);
        Self {
            config,
            session,
            mode: AppMode::Normal,
            should_quit: false,
            status: None,
            upload_dialog: None,
            history: None,
            images,
            pending: None,
            clear_on_next_render: false,
        }
    }

    pub async fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            if self.clear_on_next_render {
                terminal.clear()?;
                self.clear_on_next_render = false;
            }

            terminal.draw(|frame| ui::render(frame, self))?;

            if let Some(action) = self.pending.take() {
                self.run_pending(action);
                continue;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Queue an upload to run after the next frame.
    pub fn request_upload(&mut self, path: PathBuf) {
        self.set_status(
            StatusKind::Info,
            format!("Removing background from {}...", path.display()),
        );
        self.pending = Some(PendingAction::Upload(path));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.mode {
            AppMode::Help => {
                self.mode = if self.history.is_some() {
                    AppMode::History
                } else {
                    AppMode::Normal
                };
                Ok(())
            }
            AppMode::Uploading => self.handle_upload_key(key),
            AppMode::ConfirmClear => self.handle_confirm_clear_key(key),
            AppMode::History => self.handle_history_key(key),
            AppMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.mode = AppMode::Help,
            KeyCode::Char('o') => {
                let initial = self
                    .session
                    .upload()
                    .and_then(|u| u.path.parent())
                    .map(|p| format!("{}/", p.display()));
                self.upload_dialog = Some(UploadDialog::new(
                    initial,
                    self.config.upload.extensions.clone(),
                ));
                self.mode = AppMode::Uploading;
            }
            KeyCode::Left => self.rotate(if shift { COARSE_ROTATION } else { FINE_ROTATION }),
            KeyCode::Right => self.rotate(if shift { -COARSE_ROTATION } else { -FINE_ROTATION }),
            KeyCode::Char('[') => self.rotate(COARSE_ROTATION),
            KeyCode::Char(']') => self.rotate(-COARSE_ROTATION),
            KeyCode::Char('h') => self.edit_crop(|s| s.nudge_crop(-CROP_STEP_PERCENT, 0)),
            KeyCode::Char('l') => self.edit_crop(|s| s.nudge_crop(CROP_STEP_PERCENT, 0)),
            KeyCode::Char('k') => self.edit_crop(|s| s.nudge_crop(0, -CROP_STEP_PERCENT)),
            KeyCode::Char('j') => self.edit_crop(|s| s.nudge_crop(0, CROP_STEP_PERCENT)),
            KeyCode::Char('H') => self.edit_crop(|s| s.resize_crop(-CROP_STEP_PERCENT, 0)),
            KeyCode::Char('L') => self.edit_crop(|s| s.resize_crop(CROP_STEP_PERCENT, 0)),
            KeyCode::Char('K') => self.edit_crop(|s| s.resize_crop(0, -CROP_STEP_PERCENT)),
            KeyCode::Char('J') => self.edit_crop(|s| s.resize_crop(0, CROP_STEP_PERCENT)),
            KeyCode::Char('r') => self.edit_crop(|s| s.reset_edits()),
            KeyCode::Enter => {
                if self.session.upload().is_some() {
                    self.set_status(StatusKind::Info, "Removing background...");
                    self.pending = Some(PendingAction::Apply);
                } else {
                    self.set_status(StatusKind::Error, "No image uploaded");
                }
            }
            KeyCode::Char('d') => self.download_result(),
            KeyCode::Char('v') => self.view_history(),
            KeyCode::Char('x') => self.mode = AppMode::ConfirmClear,
            KeyCode::Esc => self.status = None,
            _ => {}
        }

        Ok(())
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('v') | KeyCode::Esc => self.close_history(),
            KeyCode::Char('e') => self.download_history(),
            _ => {
                self.handle_normal_key(key)?;
                // Keys that open a dialog switch the mode themselves
                if self.mode == AppMode::Normal && self.history.is_some() {
                    self.mode = AppMode::History;
                }
            }
        }
        Ok(())
    }

    fn handle_upload_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(dialog) = self.upload_dialog.as_mut() else {
            self.mode = AppMode::Normal;
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => {
                self.upload_dialog = None;
                self.restore_mode();
            }
            KeyCode::Enter => {
                let path = dialog.path();
                self.upload_dialog = None;
                self.restore_mode();
                match path {
                    Some(path) => self.request_upload(path),
                    None => self.set_status(StatusKind::Error, "No file chosen"),
                }
            }
            KeyCode::Char(c) => dialog.handle_char(c),
            KeyCode::Backspace => dialog.backspace(),
            KeyCode::Delete => dialog.delete(),
            KeyCode::Left => dialog.move_cursor_left(),
            KeyCode::Right => dialog.move_cursor_right(),
            KeyCode::Home => dialog.move_cursor_home(),
            KeyCode::End => dialog.move_cursor_end(),
            _ => {}
        }
        Ok(())
    }

    fn handle_confirm_clear_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => self.clear_history(),
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => self.restore_mode(),
            _ => {}
        }
        Ok(())
    }

    fn restore_mode(&mut self) {
        self.mode = if self.history.is_some() {
            AppMode::History
        } else {
            AppMode::Normal
        };
    }

    pub fn run_pending(&mut self, action: PendingAction) {
        let result = match action {
            PendingAction::Upload(ref path) => self.session.load_upload(path).map(|o| o.record.clone()),
            PendingAction::Apply => self.session.apply().map(|o| o.record.clone()),
        };

        match result {
            Ok(record) => {
                self.set_status(
                    StatusKind::Success,
                    format!(
                        "{} → {}",
                        record.original_name, record.processed_filename
                    ),
                );
                if self.history.is_some() {
                    self.refresh_history();
                }
            }
            Err(e) => {
                tracing::error!(action = ?action, error = ?e, "Processing failed");
                self.set_status(StatusKind::Error, format!("{:#}", e));
            }
        }

        self.refresh_images();
    }

    fn rotate(&mut self, delta: i32) {
        self.edit_crop(|s| s.rotate_by(delta));
    }

    /// Apply a staged edit and refresh the left-hand preview.
    fn edit_crop(&mut self, f: impl FnOnce(&mut Session)) {
        if self.session.upload().is_none() {
            return;
        }
        f(&mut self.session);
        self.refresh_edited();
    }

    fn refresh_edited(&mut self) {
        match self.session.preview_edit() {
            Ok(preview) => self.images.set_edited(preview),
            Err(e) => self.set_status(StatusKind::Error, format!("{:#}", e)),
        }
    }

    fn refresh_images(&mut self) {
        self.refresh_edited();
        let output = self.session.outcome().map(|o| o.processed.output.clone());
        self.images.set_processed(output);
        self.clear_on_next_render = true;
    }

    fn download_result(&mut self) {
        match self.session.download_result(&self.config.download.dir) {
            Ok(path) => self.set_status(StatusKind::Success, format!("Saved {}", path.display())),
            Err(e) => self.set_status(StatusKind::Error, format!("{:#}", e)),
        }
    }

    fn download_history(&mut self) {
        match self.session.download_history(&self.config.download.dir) {
            Ok(path) => self.set_status(StatusKind::Success, format!("Saved {}", path.display())),
            Err(e) => self.set_status(StatusKind::Error, format!("{:#}", e)),
        }
    }

    fn view_history(&mut self) {
        if self.history.is_some() {
            self.close_history();
            return;
        }

        self.refresh_history();
        if self.history.is_some() {
            self.mode = AppMode::History;
        }
    }

    /// Reload the log and gallery. An empty log closes the panel.
    fn refresh_history(&mut self) {
        match self.session.view_history() {
            Ok(HistoryView::Empty) => {
                self.history = None;
                self.images.clear_gallery();
                self.set_status(StatusKind::Error, "No history found!");
            }
            Ok(view) => {
                if let HistoryView::Table { ref gallery, .. } = view {
                    self.images.load_gallery(gallery);
                }
                self.history = Some(view);
            }
            Err(e) => self.set_status(StatusKind::Error, format!("{:#}", e)),
        }
        self.clear_on_next_render = true;
    }

    fn close_history(&mut self) {
        self.history = None;
        self.images.clear_gallery();
        self.mode = AppMode::Normal;
        self.clear_on_next_render = true;
    }

    fn clear_history(&mut self) {
        match self.session.clear_history() {
            Ok(removed) => {
                tracing::info!(removed, "History cleared by user");
                self.set_status(StatusKind::Success, "History cleared!");
            }
            Err(e) => {
                tracing::error!(error = ?e, "Clearing history failed");
                self.set_status(StatusKind::Error, format!("{:#}", e));
            }
        }
        self.close_history();
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageProtocol;
    use crate::history::HistoryStore;
    use crate::pipeline::tests::{sample_image, Broken, HalfAlpha};
    use crate::pipeline::BackgroundRemover;
    use tempfile::{tempdir, TempDir};

    fn app_in(dir: &TempDir, remover: Box<dyn BackgroundRemover>) -> App {
        let mut config = Config::default();
        config.preview.protocol = ImageProtocol::None;
        config.history.log_path = dir.path().join("history_log.txt");
        config.history.blob_dir = dir.path().join("history");
        config.download.dir = dir.path().join("downloads");

        let store = HistoryStore::new(&config.history);
        store.ensure_blob_dir().unwrap();
        let session = Session::new(&config, store, remover);
        App::new(config, session)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn upload(app: &mut App, dir: &TempDir, name: &str) {
        let path = dir.path().join(name);
        sample_image(16, 12).save(&path).unwrap();

        press(app, KeyCode::Char('o'));
        assert_eq!(app.mode, AppMode::Uploading);
        type_text(app, &path.display().to_string());
        press(app, KeyCode::Enter);

        assert_eq!(app.pending, Some(PendingAction::Upload(path)));
        let action = app.pending.take().unwrap();
        app.run_pending(action);
    }

    #[test]
    fn test_upload_flow() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(HalfAlpha));

        upload(&mut app, &dir, "cat.png");

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Success);
        assert!(app.images.edited.is_some());
        assert_eq!(app.images.processed.as_ref().unwrap().dimensions, (16, 12));
        assert_eq!(app.session.store().load().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_removal_reports_error() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(Broken));

        upload(&mut app, &dir, "cat.png");

        let status = app.status.clone().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.contains("model unavailable"));
        assert!(app.images.processed.is_none());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_rotation_keys_stage_edits() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(HalfAlpha));
        upload(&mut app, &dir, "cat.png");

        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Char('['));
        assert_eq!(app.session.params().unwrap().rotation_degrees, 16);
        assert!(app.session.has_pending_edits());

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.pending, Some(PendingAction::Apply));
        app.run_pending(PendingAction::Apply);
        assert!(!app.session.has_pending_edits());
        assert_eq!(app.session.store().load().unwrap().len(), 2);
    }

    #[test]
    fn test_view_history_empty_shows_error() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(HalfAlpha));

        press(&mut app, KeyCode::Char('v'));

        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.history.is_none());
        assert_eq!(app.status.as_ref().unwrap().text, "No history found!");
    }

    #[test]
    fn test_history_download_and_clear() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(HalfAlpha));
        upload(&mut app, &dir, "cat.png");

        press(&mut app, KeyCode::Char('v'));
        assert_eq!(app.mode, AppMode::History);
        assert_eq!(app.images.gallery.len(), 1);

        press(&mut app, KeyCode::Char('e'));
        assert!(dir.path().join("downloads/removal_history.csv").exists());

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.mode, AppMode::ConfirmClear);
        press(&mut app, KeyCode::Char('y'));

        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.history.is_none());
        assert_eq!(app.status.as_ref().unwrap().text, "History cleared!");
        assert!(app.session.store().load().unwrap().is_empty());
    }

    #[test]
    fn test_download_without_result() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir, Box::new(HalfAlpha));

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);

        upload(&mut app, &dir, "cat.png");
        press(&mut app, KeyCode::Char('d'));
        assert!(dir.path().join("downloads/background_removed.png").exists());
    }
}
