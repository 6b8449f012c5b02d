//! Capture session state
//!
//! Owned by the pipeline and handed by reference to each stage. Holds the
//! last enumeration snapshot and the (one-shot) selection.

use crate::types::{CaptureSource, Handle, SourceId};

/// State shared by the stages of one capture chain
#[derive(Debug)]
pub struct CaptureSession {
    handle: Handle,
    sources: Vec<CaptureSource>,
    selected: Option<SourceId>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            handle: Handle::new(),
            sources: Vec::new(),
            selected: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Sources from the last enumeration
    pub fn sources(&self) -> &[CaptureSource] {
        &self.sources
    }

    /// Replace the enumeration snapshot
    ///
    /// Ids from an older enumeration are meaningless afterwards, so any
    /// selection is cleared.
    pub fn replace_sources(&mut self, sources: Vec<CaptureSource>) {
        self.sources = sources;
        self.selected = None;
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: &SourceId) -> Option<&CaptureSource> {
        self.sources.iter().find(|s| &s.id == id)
    }

    /// Record the selection
    ///
    /// Returns false, leaving the current selection untouched, when `id` is
    /// not part of the last enumeration.
    pub fn set_selected(&mut self, id: SourceId) -> bool {
        if !self.contains(&id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn selected(&self) -> Option<&SourceId> {
        self.selected.as_ref()
    }

    pub fn selected_source(&self) -> Option<&CaptureSource> {
        self.selected.as_ref().and_then(|id| self.find(id))
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceKind, Thumbnail};

    fn source(id: &str) -> CaptureSource {
        CaptureSource {
            id: SourceId::new(id),
            name: id.to_uppercase(),
            kind: SourceKind::Window,
            thumbnail: Thumbnail {
                data_uri: String::new(),
                width: 1,
                height: 1,
            },
        }
    }

    #[test]
    fn test_unknown_selection_leaves_state_unchanged() {
        let mut session = CaptureSession::new();
        session.replace_sources(vec![source("w1"), source("w2")]);

        assert!(session.set_selected(SourceId::new("w2")));
        assert!(!session.set_selected(SourceId::new("w9")));
        assert_eq!(session.selected().map(|s| s.as_str()), Some("w2"));
    }

    #[test]
    fn test_replace_sources_clears_selection() {
        let mut session = CaptureSession::new();
        session.replace_sources(vec![source("w1")]);
        session.set_selected(SourceId::new("w1"));

        session.replace_sources(vec![source("w1")]);
        assert!(session.selected().is_none());
    }
}
