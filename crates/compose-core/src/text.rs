use std::ops::Range;

/// UTF-16 views over `str`.
///
/// Canonical offsets are counted in UTF-16 code units, the unit every host
/// text widget reports selections in. All conversions clamp: an offset past
/// the end maps to the end, and an offset inside a surrogate pair rounds down
/// to the start of that scalar.
pub trait Utf16Ext {
    fn len_utf16(&self) -> usize;
    fn utf16_to_byte(&self, offset_utf16: usize) -> usize;
    fn byte_to_utf16(&self, offset: usize) -> usize;
    fn clamp_utf16(&self, offset_utf16: usize) -> usize;
    fn slice_utf16(&self, range: Range<usize>) -> &str;
    fn char_before_utf16(&self, offset_utf16: usize) -> Option<char>;
    fn char_after_utf16(&self, offset_utf16: usize) -> Option<char>;
}

impl Utf16Ext for str {
    fn len_utf16(&self) -> usize {
        self.chars().map(char::len_utf16).sum()
    }

    fn utf16_to_byte(&self, offset_utf16: usize) -> usize {
        let mut units = 0usize;
        for (ix, ch) in self.char_indices() {
            let next = units + ch.len_utf16();
            if next > offset_utf16 {
                return ix;
            }
            units = next;
        }
        self.len()
    }

    fn byte_to_utf16(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.len());
        while offset > 0 && !self.is_char_boundary(offset) {
            offset -= 1;
        }
        self[..offset].len_utf16()
    }

    #[inline]
    fn clamp_utf16(&self, offset_utf16: usize) -> usize {
        self.byte_to_utf16(self.utf16_to_byte(offset_utf16))
    }

    fn slice_utf16(&self, range: Range<usize>) -> &str {
        let start = self.utf16_to_byte(range.start);
        let end = self.utf16_to_byte(range.end).max(start);
        &self[start..end]
    }

    fn char_before_utf16(&self, offset_utf16: usize) -> Option<char> {
        self[..self.utf16_to_byte(offset_utf16)].chars().next_back()
    }

    fn char_after_utf16(&self, offset_utf16: usize) -> Option<char> {
        self[self.utf16_to_byte(offset_utf16)..].chars().next()
    }
}
