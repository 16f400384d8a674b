mod dialogs;
mod editor;
mod history_panel;
pub mod images;
mod status_bar;
pub mod upload_dialog;

use ratatui::{prelude::*, widgets::Paragraph};

use crate::app::{App, AppMode};

/// Redraw the whole screen from the app state.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(3), // Edit controls
            Constraint::Min(0),    // Images (+ history sidebar)
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let title = Paragraph::new(Line::from(Span::styled(
        " Background Remover with History & Editing ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(title, main_chunks[0]);

    editor::render_controls(frame, app, main_chunks[1]);

    if app.history.is_some() {
        let content = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(main_chunks[2]);
        editor::render_images(frame, app, content[0]);
        history_panel::render(frame, app, content[1]);
    } else {
        editor::render_images(frame, app, main_chunks[2]);
    }

    status_bar::render(frame, app, main_chunks[3]);

    match app.mode {
        AppMode::Uploading => {
            if let Some(ref dialog) = app.upload_dialog {
                upload_dialog::render(frame, dialog, area);
            }
        }
        AppMode::ConfirmClear => dialogs::render_confirm_clear(frame, area),
        AppMode::Help => dialogs::render_help(frame, area),
        AppMode::Normal | AppMode::History => {}
    }
}
