//! Single-byte code pages for receipt text.
//!
//! Thermal printers render text through an 8-bit character table selected
//! with `ESC t n`. Text is encoded one byte per `char`; characters the table
//! can't show are replaced with `?` instead of failing the job.

use serde::Deserialize;

/// Byte written for characters the code page can't represent.
pub const REPLACEMENT: u8 = b'?';

/// Character tables supported for receipt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePage {
    /// US / PC437, the power-on default of most ESC/POS printers.
    Pc437,
    /// Cyrillic #2 / PC866.
    Pc866,
    /// Windows Cyrillic.
    Wpc1251,
    /// Windows Latin-1.
    Wpc1252,
}

impl Default for CodePage {
    fn default() -> Self {
        CodePage::Pc437
    }
}

impl CodePage {
    /// `n` for the `ESC t n` select command.
    pub fn selector(self) -> u8 {
        match self {
            Self::Pc437 => 0,
            Self::Pc866 => 17,
            Self::Wpc1251 => 46,
            Self::Wpc1252 => 16,
        }
    }

    /// Whether printers start up with this page already selected.
    pub fn is_printer_default(self) -> bool {
        self == Self::Pc437
    }

    /// Map a single character to its byte in this page.
    pub fn encode_char(self, c: char) -> Option<u8> {
        if c.is_ascii() {
            return Some(c as u8);
        }
        match self {
            Self::Pc437 => PC437_HIGH
                .iter()
                .position(|&h| h == c)
                .map(|i| 0x80 + i as u8),
            Self::Pc866 => encode_with(encoding_rs::IBM866, c),
            Self::Wpc1251 => encode_with(encoding_rs::WINDOWS_1251, c),
            Self::Wpc1252 => encode_with(encoding_rs::WINDOWS_1252, c),
        }
    }
}

fn encode_with(encoding: &'static encoding_rs::Encoding, c: char) -> Option<u8> {
    let mut tmp = [0u8; 4];
    let (bytes, _, had_errors) = encoding.encode(c.encode_utf8(&mut tmp));
    match (had_errors, &*bytes) {
        (false, [b]) => Some(*b),
        _ => None,
    }
}

/// Encode `text` for the printer, one byte per character.
pub fn encode_text(text: &str, page: CodePage) -> Vec<u8> {
    text.chars()
        .map(|c| page.encode_char(c).unwrap_or(REPLACEMENT))
        .collect()
}

/// Upper half (0x80..=0xFF) of code page 437.
const PC437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode_text("TOTAL: 700\n", CodePage::Pc437), b"TOTAL: 700\n".to_vec());
    }

    #[test]
    fn pc437_high_half() {
        assert_eq!(encode_text("é£½█", CodePage::Pc437), vec![0x82, 0x9C, 0xAB, 0xDB]);
    }

    #[test]
    fn unmappable_is_replaced_not_dropped() {
        let text = "Caf€ 中文 ok";
        let out = encode_text(text, CodePage::Pc437);
        assert_eq!(out.len(), text.chars().count());
        assert_eq!(out, b"Caf? ?? ok".to_vec());
    }

    #[test]
    fn windows_pages() {
        assert_eq!(encode_text("€", CodePage::Wpc1252), vec![0x80]);
        assert_eq!(encode_text("Ж", CodePage::Wpc1251), vec![0xC6]);
        assert_eq!(encode_text("Ж", CodePage::Pc866), vec![0x86]);
        assert_eq!(encode_text("Ж", CodePage::Wpc1252), vec![REPLACEMENT]);
    }

    #[test]
    fn selectors() {
        assert!(CodePage::default().is_printer_default());
        assert_eq!(CodePage::Wpc1252.selector(), 16);
    }
}
