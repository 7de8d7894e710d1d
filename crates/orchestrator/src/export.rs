//! Rendering of the current draft into the export formats.

use scribe_core::{Draft, ExportFormat, ExportMetadata, ExportRequest, ExportResponse};

pub fn render(draft: &Draft, request: &ExportRequest) -> ExportResponse {
    let content = match request.format {
        ExportFormat::Markdown => draft.content_markdown.clone(),
        ExportFormat::Html => html_document(draft),
        ExportFormat::Wordpress => wordpress_blocks(draft),
    };

    let metadata = request.include_metadata.then(|| ExportMetadata {
        seo_title: draft.seo_title.clone(),
        meta_description: draft.meta_description.clone(),
        faq_schema: draft.faq_schema.clone(),
        word_count: draft.word_count,
        version: draft.version,
    });

    ExportResponse {
        format: request.format,
        content,
        metadata,
    }
}

fn body_html(draft: &Draft) -> String {
    draft
        .content_html
        .clone()
        .unwrap_or_else(|| markdown_to_html(&draft.content_markdown))
}

fn html_document(draft: &Draft) -> String {
    let title = draft.seo_title.as_deref().unwrap_or("Draft");
    let mut head = format!("<title>{}</title>", escape_html(title));
    if let Some(description) = &draft.meta_description {
        head.push_str(&format!(
            "<meta name=\"description\" content=\"{}\">",
            escape_html(description)
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\">{}</head>\n<body>\n{}</body>\n</html>\n",
        head,
        body_html(draft)
    )
}

fn wordpress_blocks(draft: &Draft) -> String {
    format!("<!-- wp:html -->\n{}<!-- /wp:html -->\n", body_html(draft))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Minimal block-level conversion: ATX headings, `-`/`*` lists and paragraphs.
/// Inline markup is escaped, not interpreted.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut in_list = false;

    fn flush(html: &mut String, paragraph: &mut Vec<&str>) {
        if !paragraph.is_empty() {
            html.push_str(&format!("<p>{}</p>\n", escape_html(&paragraph.join(" "))));
            paragraph.clear();
        }
    }

    for line in markdown.lines() {
        let trimmed = line.trim();
        let item = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "));

        if item.is_none() && in_list {
            html.push_str("</ul>\n");
            in_list = false;
        }

        if trimmed.is_empty() {
            flush(&mut html, &mut paragraph);
        } else if let Some(item) = item {
            flush(&mut html, &mut paragraph);
            if !in_list {
                html.push_str("<ul>\n");
                in_list = true;
            }
            html.push_str(&format!("<li>{}</li>\n", escape_html(item.trim())));
        } else if let Some((level, text)) = heading(trimmed) {
            flush(&mut html, &mut paragraph);
            html.push_str(&format!("<h{0}>{1}</h{0}>\n", level, escape_html(text)));
        } else {
            paragraph.push(trimmed);
        }
    }

    flush(&mut html, &mut paragraph);
    if in_list {
        html.push_str("</ul>\n");
    }
    html
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) {
        line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{DraftContent, FaqEntry};
    use uuid::Uuid;

    fn draft(markdown: &str) -> Draft {
        let mut draft = Draft::from_content(Uuid::new_v4(), DraftContent::markdown(markdown));
        draft.version = 2;
        draft.seo_title = Some("SEO title".to_string());
        draft.meta_description = Some("Meta".to_string());
        draft
    }

    #[test]
    fn test_markdown_to_html() {
        let html = markdown_to_html("# Title\n\nFirst line\nsecond line\n\n- one\n- two\n\n## <Next>");
        assert_eq!(
            html,
            "<h1>Title</h1>\n<p>First line second line</p>\n<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n<h2>&lt;Next&gt;</h2>\n"
        );
    }

    #[test]
    fn test_hash_without_space_is_text() {
        assert_eq!(markdown_to_html("#hashtag"), "<p>#hashtag</p>\n");
    }

    #[test]
    fn test_markdown_export_is_verbatim() {
        let response = render(
            &draft("# Hello"),
            &ExportRequest {
                format: ExportFormat::Markdown,
                include_metadata: false,
            },
        );
        assert_eq!(response.content, "# Hello");
        assert!(response.metadata.is_none());
    }

    #[test]
    fn test_html_export_prefers_stored_html() {
        let mut stored = draft("# Hello");
        stored.content_html = Some("<h1>Stored</h1>\n".to_string());

        let response = render(
            &stored,
            &ExportRequest {
                format: ExportFormat::Html,
                include_metadata: true,
            },
        );
        assert!(response.content.contains("<h1>Stored</h1>"));
        assert!(response.content.contains("<title>SEO title</title>"));

        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.meta_description.as_deref(), Some("Meta"));
        assert!(metadata.faq_schema.is_none());
    }

    #[test]
    fn test_metadata_carries_faq() {
        let mut stored = draft("# Hello");
        stored.faq_schema = Some(vec![FaqEntry::new("What is it?", "A greeting.")]);

        let with_metadata = render(
            &stored,
            &ExportRequest {
                format: ExportFormat::Markdown,
                include_metadata: true,
            },
        );
        let faq = with_metadata.metadata.unwrap().faq_schema.unwrap();
        assert_eq!(faq[0].question, "What is it?");

        let without = render(&stored, &ExportRequest::default());
        assert!(without.metadata.is_none());
    }

    #[test]
    fn test_wordpress_export() {
        let response = render(
            &draft("Plain <b>text</b>"),
            &ExportRequest {
                format: ExportFormat::Wordpress,
                include_metadata: false,
            },
        );
        assert!(response.content.starts_with("<!-- wp:html -->"));
        assert!(response.content.contains("Plain &lt;b&gt;text&lt;/b&gt;"));
    }
}
