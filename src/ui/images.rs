//! Terminal image panes for the edited image, the result and the history gallery.

use image::DynamicImage;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::path::PathBuf;

use crate::config::ImageProtocol;
use crate::history::HistoryRecord;

/// One renderable image and its caption.
pub struct ImagePane {
    pub caption: String,
    pub dimensions: (u32, u32),
    protocol: Option<StatefulProtocol>,
}

pub struct ImagePanes {
    picker: Option<Picker>,
    pub edited: Option<ImagePane>,
    pub processed: Option<ImagePane>,
    pub gallery: Vec<ImagePane>,
}

impl ImagePanes {
    pub fn new(protocol: ImageProtocol) -> Self {
        Self {
            picker: Self::create_picker(protocol),
            edited: None,
            processed: None,
            gallery: Vec::new(),
        }
    }

    fn create_picker(protocol: ImageProtocol) -> Option<Picker> {
        match protocol {
            ImageProtocol::None => None,
            _ => Picker::from_query_stdio().ok(),
        }
    }

    fn pane(&mut self, caption: String, image: DynamicImage) -> ImagePane {
        let dimensions = (image.width(), image.height());
        let protocol = self
            .picker
            .as_mut()
            .map(|picker| picker.new_resize_protocol(image));
        ImagePane {
            caption,
            dimensions,
            protocol,
        }
    }

    pub fn set_edited(&mut self, image: Option<DynamicImage>) {
        self.edited = image.map(|img| self.pane("Edited Image".to_string(), img));
    }

    pub fn set_processed(&mut self, image: Option<DynamicImage>) {
        self.processed = image.map(|img| self.pane("Background Removed".to_string(), img));
    }

    /// Load the history thumbnails. Files that fail to decode are skipped.
    pub fn load_gallery(&mut self, items: &[(HistoryRecord, PathBuf)]) {
        self.gallery.clear();
        for (record, path) in items {
            match image::open(path) {
                Ok(img) => {
                    let pane = self.pane(record.processed_filename.clone(), img);
                    self.gallery.push(pane);
                }
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to load history image");
                }
            }
        }
    }

    pub fn clear_gallery(&mut self) {
        self.gallery.clear();
    }
}

/// Draw `pane` inside a bordered block titled with its caption, or a hint when empty.
pub fn render_pane(frame: &mut Frame, pane: Option<&mut ImagePane>, title: &str, empty_hint: &str, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", pane.as_ref().map_or(title, |p| p.caption.as_str())));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match pane {
        Some(ImagePane {
            protocol: Some(protocol),
            ..
        }) => {
            let image = StatefulImage::new(None).resize(Resize::Fit(None));
            frame.render_stateful_widget(image, inner, protocol);
        }
        Some(pane) => {
            let (w, h) = pane.dimensions;
            let text = Paragraph::new(format!("{}x{}\n(image preview unavailable)", w, h))
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(text, inner);
        }
        None => {
            let text = Paragraph::new(empty_hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(text, inner);
        }
    }
}
