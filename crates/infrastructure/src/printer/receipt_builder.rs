use domain::printer::{DEFAULT_FONT_SIZE, MAX_DENSITY, PaperType};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Largest character magnification ESC/POS accepts on either axis
const MAX_MAGNIFICATION: u16 = 8;

/// Builds ESC/POS byte streams for one print job
#[derive(Debug, Default)]
pub struct ReceiptBuilder {
    buffer: Vec<u8>,
}

impl ReceiptBuilder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn initialize(mut self) -> Self {
        // ESC @
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    /// Print density, clamped to 0..=15
    pub fn density(mut self, density: u8) -> Self {
        // GS ( K pL pH fn m
        let level = density.min(MAX_DENSITY);
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x4B, 0x02, 0x00, 0x31, level]);
        self
    }

    /// Character size from a point size; the default size prints at 1x
    pub fn text_size(mut self, font_size: u16) -> Self {
        // GS ! n: high nibble width, low nibble height
        let factor = (font_size / DEFAULT_FONT_SIZE).clamp(1, MAX_MAGNIFICATION) as u8 - 1;
        self.buffer.extend_from_slice(&[GS, 0x21, (factor << 4) | factor]);
        self
    }

    pub fn align_center(mut self) -> Self {
        // ESC a 1
        self.buffer.extend_from_slice(&[ESC, 0x61, 0x01]);
        self
    }

    pub fn align_left(mut self) -> Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 0x00]);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.buffer.extend_from_slice(text.as_bytes());
        self
    }

    pub fn text_line(mut self, text: &str) -> Self {
        self.buffer.extend_from_slice(text.as_bytes());
        self.buffer.push(LF);
        self
    }

    pub fn feed(mut self, lines: u8) -> Self {
        // ESC d n
        self.buffer.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    pub fn cut(mut self) -> Self {
        // GS V 66 0: feed to cut position and cut
        self.buffer.extend_from_slice(&[GS, 0x56, 66, 0]);
        self
    }

    /// Advance to the next label start on gap or black-mark stock
    pub fn next_label(mut self) -> Self {
        // GS FF
        self.buffer.extend_from_slice(&[GS, 0x0C]);
        self
    }

    /// End of job for the loaded paper stock
    pub fn finish(self, paper_type: PaperType) -> Self {
        match paper_type {
            PaperType::Continuous => self.feed(4).cut(),
            PaperType::Gap | PaperType::Mark => self.next_label(),
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
