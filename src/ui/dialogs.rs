use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render_help(frame: &mut Frame, area: Rect) {
    let dialog_area = centered(area, 56, 27);
    frame.render_widget(Clear, dialog_area);

    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
        ))
    };

    let help_text = vec![
        heading("Image"),
        Line::from(""),
        Line::from("  o          Choose an image to upload"),
        Line::from("  ← / →      Rotate 1°"),
        Line::from("  [ / ]      Rotate 15°"),
        Line::from("  h j k l    Move crop box"),
        Line::from("  H / L      Narrow / widen crop box"),
        Line::from("  K / J      Shorten / lengthen crop box"),
        Line::from("  r          Reset crop and rotation"),
        Line::from("  Enter      Remove background with current edits"),
        Line::from("  d          Download result (background_removed.png)"),
        Line::from(""),
        heading("History"),
        Line::from(""),
        Line::from("  v          View / hide history"),
        Line::from("  e          Download history (removal_history.csv)"),
        Line::from("  x          Clear history"),
        Line::from(""),
        heading("General"),
        Line::from(""),
        Line::from("  ?          Show this help"),
        Line::from("  q          Quit"),
        Line::from(""),
        Line::from(Span::styled("Press any key to close", Style::default().fg(Color::DarkGray))),
    ];

    let paragraph = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help "),
    );
    frame.render_widget(paragraph, dialog_area);
}

pub fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let dialog_area = centered(area, 56, 8);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Clear History ");
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .margin(1)
        .split(dialog_area);

    let message = Paragraph::new("Delete the history log and every stored result image?")
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    frame.render_widget(message, chunks[0]);

    let buttons = Line::from(vec![
        Span::styled("  [Enter/y] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("Yes"),
        Span::raw("    "),
        Span::styled("[Esc/n] ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw("No"),
    ]);
    frame.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), chunks[1]);
}
