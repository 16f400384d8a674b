use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use crate::app::App;
use crate::session::HistoryView;
use crate::ui::images;

pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let records = match app.history {
        Some(HistoryView::Table { ref records, .. }) => records.clone(),
        _ => return,
    };

    let gallery_len = app.images.gallery.len() as u32;
    let constraints: Vec<Constraint> = if gallery_len == 0 {
        vec![Constraint::Min(5), Constraint::Length(1)]
    } else {
        let mut c = vec![Constraint::Percentage(40)];
        c.extend((0..gallery_len).map(|_| Constraint::Ratio(1, gallery_len)));
        c.push(Constraint::Length(1));
        c
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_table(frame, &records, chunks[0]);

    for (pane, chunk) in app.images.gallery.iter_mut().zip(chunks[1..].iter()) {
        images::render_pane(frame, Some(pane), "", "", *chunk);
    }

    let hints = Paragraph::new(Line::from(vec![
        Span::styled(" e", Style::default().fg(Color::Cyan)),
        Span::raw(":download csv "),
        Span::styled("v", Style::default().fg(Color::Cyan)),
        Span::raw(":close "),
        Span::styled("x", Style::default().fg(Color::Cyan)),
        Span::raw(":clear"),
    ]))
    .style(Style::default().fg(Color::DarkGray));
    if let Some(last) = chunks.last() {
        frame.render_widget(hints, *last);
    }
}

fn render_table(frame: &mut Frame, records: &[crate::history::HistoryRecord], area: Rect) {
    let header = Row::new(vec![
        Cell::from("Timestamp"),
        Cell::from("Original Image"),
        Cell::from("Processed Image"),
    ])
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    // Newest rows are at the bottom of the log; show the tail when it does not fit
    let visible = area.height.saturating_sub(3) as usize;
    let skip = records.len().saturating_sub(visible);
    let rows = records[skip..].iter().map(|r| {
        Row::new(vec![
            Cell::from(r.timestamp.clone()),
            Cell::from(r.original_name.clone()),
            Cell::from(r.processed_filename.clone()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(19),
            Constraint::Fill(1),
            Constraint::Fill(1),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" History ({}) ", records.len())),
    );

    frame.render_widget(table, area);
}
