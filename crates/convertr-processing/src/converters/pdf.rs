//! Just enough PDF object writing to emit simple image and text documents

/// Letter size in points
pub(crate) const PAGE_WIDTH: u32 = 612;
pub(crate) const PAGE_HEIGHT: u32 = 792;

pub(crate) struct PdfBuilder {
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Allocate an object number to be filled in later with [`PdfBuilder::set`]
    pub fn reserve(&mut self) -> usize {
        self.objects.push(Vec::new());
        self.objects.len()
    }

    pub fn set(&mut self, id: usize, body: impl Into<Vec<u8>>) {
        if let Some(slot) = id.checked_sub(1).and_then(|i| self.objects.get_mut(i)) {
            *slot = body.into();
        }
    }

    pub fn add(&mut self, body: impl Into<Vec<u8>>) -> usize {
        self.objects.push(body.into());
        self.objects.len()
    }

    /// Add a stream object. `entries` are extra dictionary entries; `/Length` is appended.
    pub fn add_stream(&mut self, entries: &str, data: &[u8]) -> usize {
        let mut body = format!("<< {} /Length {} >>\nstream\n", entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.add(body)
    }

    /// Wrap `page_ids` in a page tree and catalog, then serialize with an xref table
    pub fn finish(mut self, pages_id: usize, page_ids: &[usize]) -> Vec<u8> {
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();
        self.set(
            pages_id,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_ids.len()
            ),
        );
        let catalog_id = self.add(format!("<< /Type /Catalog /Pages {pages_id} 0 R >>"));

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(self.objects.len());
        for (index, body) in self.objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let size = self.objects.len() + 1;
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root {catalog_id} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
            )
            .as_bytes(),
        );
        out
    }
}

/// Escape a line for use inside a PDF literal string. Non-ASCII becomes `?`.
pub(crate) fn escape_text(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\t' => escaped.push_str("    "),
            c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut pdf = PdfBuilder::new();
        let pages = pdf.reserve();
        let page = pdf.add(format!("<< /Type /Page /Parent {pages} 0 R >>"));
        let out = pdf.finish(pages, &[page]);
        let text = String::from_utf8_lossy(&out).into_owned();

        let xref_at = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref_at..]
            .lines()
            .skip(3)
            .take(3)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert!(text[entries[0]..].starts_with("1 0 obj"));
        assert!(text[entries[1]..].starts_with("2 0 obj"));
        assert!(text[entries[2]..].starts_with("3 0 obj"));
        assert!(text.contains("/Kids [2 0 R] /Count 1"));
        assert!(text.contains("/Root 3 0 R"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_text("café"), "caf?");
    }
}
