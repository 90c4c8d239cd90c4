//! Rendering seam for the control thread

use crate::protocol::TransferBuffer;

pub const STEM_MIME_TYPE: &str = "audio/wav";

/// One separated stem ready to play or save
#[derive(Debug)]
pub struct StemArtifact {
    pub name: String,
    /// Suggested download name, `<name>.wav`
    pub file_name: String,
    pub mime: &'static str,
    pub data: TransferBuffer,
}

impl StemArtifact {
    pub fn new(name: impl Into<String>, data: TransferBuffer) -> Self {
        let name = name.into();
        Self {
            file_name: format!("{}.wav", name),
            name,
            mime: STEM_MIME_TYPE,
            data,
        }
    }
}

/// What the controller drives: a status line, a progress indicator and
/// the list of stems
pub trait ControlView {
    fn set_status(&mut self, text: &str);

    /// `fraction` is in `0.0..=1.0`
    fn show_progress(&mut self, fraction: f64);

    fn hide_progress(&mut self);

    fn clear_stems(&mut self);

    fn show_stems(&mut self, stems: Vec<StemArtifact>);
}
