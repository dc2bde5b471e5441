//! Text thumbnails: the opening characters of a document drawn on a white card.

use {
    font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts},
    image::{DynamicImage, Rgb, RgbImage},
};

/// Characters of the document shown on the card.
pub const DEFAULT_PREVIEW_CHARS: usize = 50;

/// Card size in pixels.
pub const DEFAULT_CARD_SIZE: (u32, u32) = (150, 200);

const MARGIN: u32 = 8;
const GLYPH_SCALE: u32 = 2;
const GLYPH_SIZE: u32 = 8 * GLYPH_SCALE;
const LINE_HEIGHT: u32 = GLYPH_SIZE + 2;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GREY: Rgb<u8> = Rgb([160, 160, 160]);

/// First `max_chars` characters of `data`, or `None` when it is not UTF-8.
#[must_use]
pub fn preview_text(data: &[u8], max_chars: usize) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    Some(text.chars().take(max_chars).collect())
}

/// Thumbnail for a plain-text attachment.
///
/// Non-UTF-8 input gets [`document_icon`] instead of an error.
#[must_use]
pub fn text_thumbnail(data: &[u8], max_chars: usize, (width, height): (u32, u32)) -> DynamicImage {
    let card = match preview_text(data, max_chars) {
        Some(text) => render_text(&text, width, height),
        None => document_icon(width, height),
    };
    DynamicImage::ImageRgb8(card)
}

/// Draw wrapped black text on a white card. Lines past the bottom edge are dropped.
#[must_use]
pub fn render_text(text: &str, width: u32, height: u32) -> RgbImage {
    let mut card = RgbImage::from_pixel(width, height, WHITE);
    let columns = (width.saturating_sub(2 * MARGIN) / GLYPH_SIZE).max(1) as usize;

    let mut y = MARGIN;
    for line in wrap(text, columns) {
        if y + GLYPH_SIZE > height {
            break;
        }
        let mut x = MARGIN;
        for ch in line.chars() {
            draw_glyph(&mut card, glyph(ch), x, y, BLACK);
            x += GLYPH_SIZE;
        }
        y += LINE_HEIGHT;
    }
    card
}

/// A page outline with a folded corner and a few ruled lines.
#[must_use]
pub fn document_icon(width: u32, height: u32) -> RgbImage {
    let mut card = RgbImage::from_pixel(width, height, WHITE);
    let (left, top) = (width / 5, height / 8);
    let (right, bottom) = (width - width / 5, height - height / 8);
    let fold = (right - left) / 4;

    for x in left..=right - fold {
        card.put_pixel(x, top, GREY);
    }
    for x in left..=right {
        card.put_pixel(x, bottom, GREY);
    }
    for y in top..=bottom {
        card.put_pixel(left, y, GREY);
    }
    for y in top + fold..=bottom {
        card.put_pixel(right, y, GREY);
    }
    for i in 0..=fold {
        card.put_pixel(right - fold + i, top + i, GREY);
        card.put_pixel(right - fold, top + i, GREY);
        card.put_pixel(right - fold + i, top + fold, GREY);
    }

    let mut y = top + fold + 12;
    while y + 12 < bottom {
        for x in left + 10..right - 10 {
            card.put_pixel(x, y, GREY);
        }
        y += 14;
    }
    card
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or_default()
}

fn draw_glyph(card: &mut RgbImage, rows: [u8; 8], x: u32, y: u32, color: Rgb<u8>) {
    for (row, bits) in (0u32..).zip(rows) {
        for col in 0..8u32 {
            // bit 0 is the leftmost pixel
            if bits >> col & 1 == 0 {
                continue;
            }
            for dy in 0..GLYPH_SCALE {
                for dx in 0..GLYPH_SCALE {
                    let (px, py) = (x + col * GLYPH_SCALE + dx, y + row * GLYPH_SCALE + dy);
                    if px < card.width() && py < card.height() {
                        card.put_pixel(px, py, color);
                    }
                }
            }
        }
    }
}

/// Greedy word wrap at `columns` characters. Words longer than a line are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut len = 0;

        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(columns) {
                let needed = if len == 0 { piece.len() } else { len + 1 + piece.len() };
                if needed > columns && len > 0 {
                    lines.push(std::mem::take(&mut line));
                    len = 0;
                }
                if len > 0 {
                    line.push(' ');
                    len += 1;
                }
                line.extend(piece);
                len += piece.len();
            }
        }
        lines.push(line);
    }
    lines
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, image::GenericImageView};

    fn has_ink(img: &RgbImage, x0: u32, y0: u32, w: u32, h: u32) -> bool {
        (y0..y0 + h).any(|y| (x0..x0 + w).any(|x| img.get_pixel(x, y) != &WHITE))
    }

    #[test]
    fn preview_truncates_to_char_count() {
        let text = "é".repeat(80);
        let preview = preview_text(text.as_bytes(), DEFAULT_PREVIEW_CHARS).unwrap();
        assert_eq!(preview.chars().count(), 50);
        assert_eq!(preview_text(b"short", 50).unwrap(), "short");
    }

    #[test]
    fn invalid_utf8_has_no_preview() {
        assert!(preview_text(&[0xff, 0xfe, 0x00], 50).is_none());
    }

    #[test]
    fn card_has_requested_size() {
        let thumb = text_thumbnail(b"Hello world", 50, DEFAULT_CARD_SIZE);
        assert_eq!(thumb.dimensions(), (150, 200));
    }

    #[test]
    fn text_is_drawn_from_the_top_left() {
        let card = render_text("A", 150, 200);
        assert!(has_ink(&card, MARGIN, MARGIN, GLYPH_SIZE, GLYPH_SIZE));
        assert!(!has_ink(&card, MARGIN + GLYPH_SIZE, MARGIN, 150 - MARGIN - GLYPH_SIZE, 200 - MARGIN));
    }

    #[test]
    fn blank_text_is_a_blank_card() {
        let card = render_text("   \n  ", 150, 200);
        assert!(!has_ink(&card, 0, 0, 150, 200));
    }

    #[test]
    fn non_utf8_gets_document_icon() {
        let thumb = text_thumbnail(&[0xc3, 0x28, 0xa0], 50, DEFAULT_CARD_SIZE).to_rgb8();
        assert_eq!(thumb, document_icon(150, 200));
        assert!(has_ink(&thumb, 0, 0, 150, 200));
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("the quick brown fox", 9), vec!["the quick", "brown fox"]);
        assert_eq!(wrap("one\n\ntwo", 8), vec!["one", "", "two"]);
    }

    #[test]
    fn splits_words_longer_than_a_line() {
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("ab cdefgh", 4), vec!["ab", "cdef", "gh"]);
    }
}
