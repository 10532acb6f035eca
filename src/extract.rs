use tracing::debug;

use crate::error::ExtractError;

/// Extract plain text from PDF bytes, bounded by `max_chars`.
///
/// Pages are visited in order; a page that fails to yield text contributes
/// nothing. Once the running total reaches `max_chars` the remaining pages
/// are not parsed at all, and the final string is hard-truncated to exactly
/// `max_chars` characters.
pub fn extract_text(bytes: &[u8], max_chars: usize) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)?;

    let mut pages = Vec::new();
    let mut total = 0usize;
    for page_number in doc.get_pages().keys() {
        let text = doc.extract_text(&[*page_number]).unwrap_or_default();
        if !text.trim().is_empty() {
            total += text.chars().count();
            pages.push(text);
        }
        if total >= max_chars {
            debug!(page_number, total, "character budget reached, skipping trailing pages");
            break;
        }
    }

    let full = pages.join("\n\n");
    if full.trim().is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(full.chars().take(max_chars).collect())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a minimal PDF with one page per entry in `pages`. An empty
    /// entry produces a page with no text operations.
    pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_all_pages() {
        let bytes = pdf_with_pages(&["Erste Seite", "Zweite Seite"]);
        let text = extract_text(&bytes, 25_000).unwrap();
        assert!(text.contains("Erste Seite"));
        assert!(text.contains("Zweite Seite"));
    }

    #[test]
    fn truncates_at_budget() {
        let long = "a".repeat(500);
        let bytes = pdf_with_pages(&[&long]);
        let text = extract_text(&bytes, 100).unwrap();
        assert_eq!(text.chars().count(), 100);
    }

    #[test]
    fn skips_trailing_pages_once_budget_reached() {
        let filler = "x".repeat(200);
        let bytes = pdf_with_pages(&[&filler, "NACHZUEGLER"]);
        let text = extract_text(&bytes, 50).unwrap();
        assert_eq!(text.chars().count(), 50);
        assert!(!text.contains("NACHZUEGLER"));
    }

    #[test]
    fn blank_page_does_not_abort() {
        let bytes = pdf_with_pages(&["", "Inhalt nach Leerseite"]);
        let text = extract_text(&bytes, 25_000).unwrap();
        assert!(text.contains("Inhalt nach Leerseite"));
    }

    #[test]
    fn no_text_anywhere_is_an_error() {
        let bytes = pdf_with_pages(&["", ""]);
        assert!(matches!(
            extract_text(&bytes, 25_000),
            Err(ExtractError::NoText)
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(matches!(
            extract_text(b"not a pdf at all", 25_000),
            Err(ExtractError::Parse(_))
        ));
    }
}
