use std::fmt::Write;

pub struct GenCtx<'a> {
    pub indentation: String,
    pub out: &'a mut String,
}

impl<'a> GenCtx<'a> {
    pub fn new(out: &'a mut String) -> GenCtx<'a> {
        GenCtx {
            indentation: String::new(),
            out,
        }
    }

    #[inline]
    pub fn push_indent(&mut self) { self.indentation.push('\t'); }

    #[inline]
    pub fn pop_indent(&mut self) { self.indentation.pop(); }

    /// Writes `text` as a comment block, one `//` line per line of text
    pub fn comment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        for line in text.lines() {
            if line.is_empty() {
                appendln!(self.out, "{}//", self.indentation);
            } else {
                appendln!(self.out, "{}// {}", self.indentation, line);
            }
        }
    }
}
