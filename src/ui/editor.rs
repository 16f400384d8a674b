use ratatui::{
    prelude::*,
    widgets::{Block, Borders, LineGauge, Paragraph},
};

use crate::app::App;
use crate::pipeline::{MAX_ROTATION, MIN_ROTATION};
use crate::ui::images;

/// Rotation slider and crop summary.
pub fn render_controls(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let params = app.session.params().copied();
    let rotation = params.map_or(0, |p| p.rotation_degrees);
    let ratio = f64::from(rotation - MIN_ROTATION) / f64::from(MAX_ROTATION - MIN_ROTATION);

    let gauge = LineGauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Rotate Image (°) "),
        )
        .filled_style(Style::default().fg(Color::Cyan))
        .label(format!("{:>4}°", rotation))
        .ratio(ratio.clamp(0.0, 1.0));
    frame.render_widget(gauge, chunks[0]);

    let crop_text = match (params, app.session.upload()) {
        (Some(p), Some(upload)) => {
            let mut spans = vec![Span::raw(format!(
                "{}x{} at ({}, {}) of {}x{}",
                p.crop.width,
                p.crop.height,
                p.crop.x,
                p.crop.y,
                upload.image.width(),
                upload.image.height()
            ))];
            if app.session.has_pending_edits() {
                spans.push(Span::styled(
                    "  ● Enter to apply",
                    Style::default().fg(Color::Yellow),
                ));
            }
            Line::from(spans)
        }
        _ => Line::from(Span::styled(
            "Press o to choose an image",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let crop = Paragraph::new(crop_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Crop "),
    );
    frame.render_widget(crop, chunks[1]);
}

/// Edited image and result side by side.
pub fn render_images(frame: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    images::render_pane(
        frame,
        app.images.edited.as_mut(),
        "Edited Image",
        "No image uploaded",
        chunks[0],
    );
    images::render_pane(
        frame,
        app.images.processed.as_mut(),
        "Background Removed",
        "Nothing processed yet",
        chunks[1],
    );
}
