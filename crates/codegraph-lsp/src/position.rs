// ABOUTME: Byte-offset <-> UTF-16 LSP position conversion. LSP counts line breaks
// ABOUTME: by '\n' and characters within a line by UTF-16 code units, not bytes.

/// A 0-based line / UTF-16-character position, the unit LSP itself speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LspPosition {
    pub line: u32,
    pub character: u32,
}

/// Precomputed line-start byte offsets for a source file, so repeated lookups
/// (one per reference site) don't each re-scan from the start of the file.
#[derive(Debug, Clone)]
pub struct LspPositionIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LspPositionIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                let next = idx.saturating_add(1);
                if next <= text.len() {
                    line_starts.push(next);
                }
            }
        }
        Self { text, line_starts }
    }

    pub fn position_for_byte_offset(&self, byte_offset: u32) -> LspPosition {
        let target = (byte_offset as usize).min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&target) {
            Ok(i) => i,
            Err(insert) => insert.saturating_sub(1),
        };
        let line_start = *self.line_starts.get(line_idx).unwrap_or(&0);

        let mut character: u32 = 0;
        for (idx, ch) in self.text[line_start..].char_indices() {
            let abs = line_start.saturating_add(idx);
            if abs >= target {
                break;
            }
            character += ch.encode_utf16(&mut [0u16; 2]).len() as u32;
        }

        LspPosition { line: line_idx as u32, character }
    }

    /// 1-based line to the byte offset of its first character, for the
    /// coordinator's public API which speaks in the core crate's 1-based lines.
    pub fn byte_offset_for_line_column(&self, line_1based: u32, column_1based: u32) -> u32 {
        let line_idx = line_1based.saturating_sub(1) as usize;
        let Some(&line_start) = self.line_starts.get(line_idx) else {
            return self.text.len() as u32;
        };
        let mut remaining = column_1based.saturating_sub(1);
        let mut offset = line_start;
        for ch in self.text[line_start..].chars() {
            if ch == '\n' || remaining == 0 {
                break;
            }
            offset += ch.len_utf8();
            remaining -= 1;
        }
        offset as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_offsets_map_to_utf16_positions_across_multibyte_text() {
        let text = "a🙂b\nc";
        let index = LspPositionIndex::new(text);
        assert_eq!(index.position_for_byte_offset(0), LspPosition { line: 0, character: 0 });
        // '🙂' is 4 bytes, 2 utf-16 code units.
        let after_emoji = 1 + '🙂'.len_utf8() as u32;
        assert_eq!(index.position_for_byte_offset(after_emoji), LspPosition { line: 0, character: 3 });
        let after_newline = text.find('\n').unwrap() as u32 + 1;
        assert_eq!(index.position_for_byte_offset(after_newline), LspPosition { line: 1, character: 0 });
    }

    #[test]
    fn line_column_round_trips_to_byte_offset() {
        let text = "fn a() {}\nfn b() {}\n";
        let index = LspPositionIndex::new(text);
        let offset = index.byte_offset_for_line_column(2, 4);
        assert_eq!(&text[offset as usize..offset as usize + 1], "b");
    }
}
