//! # Printer Code Page
//!
//! The MP-4000 prints and reports text in Code Page 437. Outgoing text is
//! converted one character per byte, so field widths in characters and in
//! bytes always agree. ASCII (U+0000–U+007F) passes through unchanged.
//! Characters outside the code page are replaced with `?`.

/// Unicode characters for bytes 0x80–0xFF.
const HIGH_HALF: [char; 128] = [
    // 0x80: accented Latin
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    // 0x90: accented Latin, currency
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    // 0xA0: Spanish, fractions
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    // 0xB0: shades, box drawing
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    // 0xD0: box drawing, blocks
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    // 0xE0: Greek, math
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    // 0xF0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

/// Encode `text` for the printer, one byte per character.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

/// Decode printer text. Every byte maps to exactly one character.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| decode_byte(b)).collect()
}

fn encode_char(ch: char) -> u8 {
    if ch.is_ascii() {
        return ch as u8;
    }
    match HIGH_HALF.iter().position(|&c| c == ch) {
        Some(index) => 0x80 + index as u8,
        None => {
            log::warn!(
                "unmapped character '{}' (U+{:04X}), replacing with '?'",
                ch,
                ch as u32
            );
            b'?'
        }
    }
}

fn decode_byte(byte: u8) -> char {
    if byte < 0x80 {
        char::from(byte)
    } else {
        HIGH_HALF[usize::from(byte - 0x80)]
    }
}
