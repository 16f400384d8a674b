use ratatui::{prelude::*, widgets::Paragraph};

use crate::app::{App, StatusKind};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(ref status) = app.status {
        let (icon, fg) = match status.kind {
            StatusKind::Info => ("…", Color::Yellow),
            StatusKind::Success => ("✔", Color::Green),
            StatusKind::Error => ("⚠", Color::Red),
        };
        let line = Line::from(Span::styled(
            format!(" {} {} ", icon, status.text),
            Style::default().fg(fg).bg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let source = app
        .session
        .upload()
        .map(|u| u.path.display().to_string())
        .unwrap_or_else(|| "no image".to_string());

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", source),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ),
        Span::styled(
            " o:open ⏎:apply d:download v:history ?:help q:quit ",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
