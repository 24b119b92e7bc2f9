//! Detail page field extraction

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Containers that hold the document body, in order of preference
const BODY_SELECTORS: &[&str] = &["div.trs_editor_view", "#jyb_xs_content", "div.moe-detail-box"];

/// Fields pulled from a document's detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub doc_number: Option<String>,
    pub department: Option<String>,
    /// Absolute URL of the first linked PDF
    pub pdf_link: Option<String>,
    pub body_text: String,
}

/// Extracts the archive fields from a detail page
///
/// The title comes from `<h1>`, falling back to `<title>`. Department and
/// document number are read from the disclosure table (`table.xxgk_table`,
/// cells 2 and 5). A page without a recognizable body container is an error.
pub fn extract_detail_fields(html: &str, base_url: &Url) -> Result<DetailFields, String> {
    let document = Html::parse_document(html);

    let body = BODY_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .ok_or_else(|| "no document body found".to_string())?;

    let title = first_text(&document, "h1").or_else(|| first_text(&document, "title"));

    let cells: Vec<String> = Selector::parse("table.xxgk_table td")
        .map(|selector| document.select(&selector).map(|td| element_text(&td)).collect())
        .unwrap_or_default();
    let cell = |idx: usize| cells.get(idx).cloned().filter(|s| !s.is_empty());

    Ok(DetailFields {
        title,
        department: cell(2),
        doc_number: cell(5),
        pdf_link: find_pdf_link(&document, base_url),
        body_text: element_text(&body),
    })
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|s| !s.is_empty())
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_pdf_link(document: &Html, base_url: &Url) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base_url.join(href.trim()).ok())
        .find(|url| {
            (url.scheme() == "http" || url.scheme() == "https")
                && url.path().to_ascii_lowercase().ends_with(".pdf")
        })
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.org/srcsite/A02/202401/t20240105_1.html").unwrap()
    }

    #[test]
    fn test_extracts_all_fields() {
        let html = r#"
            <html><head><title>站点标题</title></head><body>
              <table class="xxgk_table">
                <tr><td>索引号</td><td>360A02-01</td><td>教育部办公厅</td></tr>
                <tr><td>2024-01-05</td><td>文号</td><td>教发〔2024〕1号</td></tr>
              </table>
              <h1> 关于加强学校管理的通知 </h1>
              <div class="trs_editor_view"><p>第一条</p><p>第二条</p>
                <a href="./P020240105.PDF">附件</a></div>
            </body></html>"#;

        let fields = extract_detail_fields(html, &base()).unwrap();
        assert_eq!(fields.title.as_deref(), Some("关于加强学校管理的通知"));
        assert_eq!(fields.department.as_deref(), Some("教育部办公厅"));
        assert_eq!(fields.doc_number.as_deref(), Some("教发〔2024〕1号"));
        assert_eq!(
            fields.pdf_link.as_deref(),
            Some("http://example.org/srcsite/A02/202401/P020240105.PDF")
        );
        assert_eq!(fields.body_text, "第一条 第二条 附件");
    }

    #[test]
    fn test_fallback_body_and_title() {
        let html = r#"<html><head><title>Fallback</title></head>
            <body><div id="jyb_xs_content">text</div></body></html>"#;

        let fields = extract_detail_fields(html, &base()).unwrap();
        assert_eq!(fields.title.as_deref(), Some("Fallback"));
        assert!(fields.doc_number.is_none());
        assert!(fields.pdf_link.is_none());
    }

    #[test]
    fn test_missing_body_is_error() {
        let html = "<html><body><h1>Only a heading</h1></body></html>";
        assert!(extract_detail_fields(html, &base()).is_err());
    }
}
