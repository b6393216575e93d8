//! Text rendering of board state

use std::fmt;

use super::BoardState;
use crate::persistence::HistoryEntry;

pub const TITLE: &str = "AI Comic Creator";
pub const LOADING: &str = "Creating your comic...";
pub const PLACEHOLDER: &str = "Generating image...";
pub const UNKNOWN_DATE: &str = "unknown date";

/// Comic creator view of a board
pub struct ComicView<'a>(pub &'a BoardState);

impl fmt::Display for ComicView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0;
        writeln!(f, "{}", TITLE)?;

        if let Some(error) = &state.error {
            writeln!(f, "\n! {}", error)?;
        }

        if state.loading {
            writeln!(f, "\n{}", LOADING)?;
        }

        for (index, panel) in state.panels.iter().enumerate() {
            writeln!(f, "\n[Panel {}]", index + 1)?;
            writeln!(f, "  {}", panel.image_url.as_deref().unwrap_or(PLACEHOLDER))?;
            writeln!(f, "  {}", panel.caption)?;
        }

        if !state.history.is_empty() {
            writeln!(f, "\nHistory: {} saved images", state.history.len())?;
        }

        Ok(())
    }
}

/// History view of a list of stored images
pub struct HistoryView<'a>(pub &'a [HistoryEntry]);

impl fmt::Display for HistoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} - History", TITLE)?;

        for entry in self.0 {
            writeln!(f, "\n{}", entry.prompt)?;
            writeln!(f, "  {}", entry.image_url)?;
            match (entry.created_date(), entry.created_at.as_deref()) {
                (Some(date), _) => writeln!(f, "  {}", date.format("%Y-%m-%d"))?,
                (None, Some(raw)) => writeln!(f, "  {}", raw)?,
                (None, None) => writeln!(f, "  {}", UNKNOWN_DATE)?,
            }
        }

        Ok(())
    }
}

/// Render the comic creator view
pub fn render_comic(state: &BoardState) -> String {
    ComicView(state).to_string()
}

/// Render the history view
pub fn render_history(history: &[HistoryEntry]) -> String {
    HistoryView(history).to_string()
}
