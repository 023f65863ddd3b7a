//! Markdown to markup conversion.

use pulldown_cmark::{html, Options, Parser};

/// Markdown processor with the extensions enabled for site content
pub struct MarkdownProcessor {
    options: Options,
}

impl MarkdownProcessor {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        // No smart punctuation: quotes inside template tags must stay straight

        Self { options }
    }

    /// Convert a markdown body (front matter already removed) to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, parser);
        html_output
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let processor = MarkdownProcessor::new();
        let html = processor.render("# Hello World\n\nThis is a **test**.");
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<strong>test</strong>"));
    }

    #[test]
    fn test_tables() {
        let processor = MarkdownProcessor::new();
        let md = r#"
| Header 1 | Header 2 |
|----------|----------|
| Cell 1   | Cell 2   |
"#;
        let html = processor.render(md);
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>Header 1</th>"));
    }

    #[test]
    fn test_template_tags_survive() {
        let processor = MarkdownProcessor::new();
        let html = processor.render("Hello {{ name }}\n\n{% include \"partials/nav.html\" %}\n");
        assert!(html.contains("{{ name }}"));
        assert!(html.contains("{% include \"partials/nav.html\" %}"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let processor = MarkdownProcessor::new();
        let html = processor.render("<div class=\"note\">kept</div>\n");
        assert!(html.contains("<div class=\"note\">kept</div>"));
    }
}
