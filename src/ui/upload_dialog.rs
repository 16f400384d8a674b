use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use std::path::PathBuf;

/// Path prompt used to pick the image to upload.
pub struct UploadDialog {
    pub input: String,
    /// Cursor position in characters
    pub cursor: usize,
    pub extensions: Vec<String>,
}

impl UploadDialog {
    pub fn new(initial: Option<String>, extensions: Vec<String>) -> Self {
        let input = initial.unwrap_or_default();
        let cursor = input.chars().count();
        Self {
            input,
            cursor,
            extensions,
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    pub fn handle_char(&mut self, c: char) {
        let idx = self.byte_index();
        self.input.insert(idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index();
            self.input.remove(idx);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let idx = self.byte_index();
            self.input.remove(idx);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// The entered path, with surrounding quotes (from drag and drop) removed
    /// and a leading `~` expanded.
    pub fn path(&self) -> Option<PathBuf> {
        let trimmed = self.input.trim().trim_matches(|c| c == '\'' || c == '"');
        if trimmed.is_empty() {
            return None;
        }

        if let Some(rest) = trimmed.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return Some(home.join(rest));
            }
        }

        Some(PathBuf::from(trimmed))
    }
}

pub fn render(frame: &mut Frame, dialog: &UploadDialog, area: Rect) {
    let dialog_width = 70.min(area.width.saturating_sub(4));
    let dialog_height = 8.min(area.height.saturating_sub(2));

    let x = area.x + (area.width.saturating_sub(dialog_width)) / 2;
    let y = area.y + (area.height.saturating_sub(dialog_height)) / 2;
    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Choose an image ");
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Length(3), // Input
            Constraint::Length(1), // Hints
        ])
        .margin(1)
        .split(dialog_area);

    let label = Paragraph::new(format!("Path ({}):", dialog.extensions.join(", ")))
        .style(Style::default().fg(Color::Cyan))
        .wrap(Wrap { trim: true });
    frame.render_widget(label, chunks[0]);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = input_block.inner(chunks[1]);
    frame.render_widget(input_block, chunks[1]);

    // Scroll so the cursor stays visible
    let available = inner.width.max(1) as usize;
    let scroll = dialog.cursor.saturating_sub(available - 1);
    let visible: String = dialog.input.chars().skip(scroll).take(available).collect();
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::White).bg(Color::DarkGray)),
        inner,
    );
    frame.set_cursor_position(Position::new(
        inner.x + (dialog.cursor - scroll) as u16,
        inner.y,
    ));

    let hints = Line::from(vec![
        Span::styled("[Enter] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("Upload"),
        Span::raw("    "),
        Span::styled("[Esc] ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw("Cancel"),
    ]);
    frame.render_widget(Paragraph::new(hints).alignment(Alignment::Center), chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog(initial: &str) -> UploadDialog {
        UploadDialog::new(Some(initial.to_string()), vec!["png".to_string()])
    }

    #[test]
    fn test_editing_multibyte_input() {
        let mut d = dialog("caf");
        d.handle_char('é');
        d.handle_char('.');
        assert_eq!(d.input, "café.");

        d.move_cursor_left();
        d.backspace();
        assert_eq!(d.input, "caf.");

        d.move_cursor_home();
        d.delete();
        assert_eq!(d.input, "af.");
        d.move_cursor_end();
        assert_eq!(d.cursor, 3);
    }

    #[test]
    fn test_path_strips_quotes() {
        assert_eq!(dialog("  '/tmp/my cat.png' ").path(), Some(PathBuf::from("/tmp/my cat.png")));
        assert_eq!(dialog("\"/tmp/a.png\"").path(), Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(dialog("   ").path(), None);
    }

    #[test]
    fn test_path_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(dialog("~/a.png").path(), Some(home.join("a.png")));
        }
    }
}
