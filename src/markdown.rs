//! Conversion of Alchemy richtext HTML into markdown.

use regex::Regex;

/// Converts a richtext HTML fragment to markdown.
///
/// Covers the tags the exhibition credit bodies actually use: headings,
/// paragraphs, breaks, lists, emphasis, links and inline images.
/// Anything left over is stripped, except `<cite>` elements, which are
/// kept verbatim because the Contentful rendering relies on them.
pub fn from_html(html: &str) -> String {
    let mut md = String::from(html);

    for i in (1..=6).rev() {
        md = md.replace(&format!("<h{i}>"), &format!("\n{} ", "#".repeat(i)));
        md = md.replace(&format!("</h{i}>"), "\n");
    }
    md = md.replace("<p>", "\n\n").replace("</p>", "\n");
    md = md
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    md = md.replace("<ul>", "\n").replace("</ul>", "\n");
    md = md.replace("<ol>", "\n").replace("</ol>", "\n");
    md = md.replace("<li>", "- ").replace("</li>", "\n");
    for tag in ["strong", "b"] {
        md = md.replace(&format!("<{tag}>"), "**");
        md = md.replace(&format!("</{tag}>"), "**");
    }
    for tag in ["em", "i"] {
        md = md.replace(&format!("<{tag}>"), "*");
        md = md.replace(&format!("</{tag}>"), "*");
    }

    let anchors = Regex::new(r#"<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap();
    md = anchors.replace_all(&md, "[$2]($1)").to_string();

    let images = Regex::new(r#"<img[^>]*src="([^"]*)"[^>]*/?>"#).unwrap();
    md = images.replace_all(&md, "![]($1)").to_string();

    // Strip whatever markup is left, keeping <cite> as-is.
    let leftovers = Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap();
    md = leftovers
        .replace_all(&md, |caps: &regex::Captures<'_>| {
            if caps[1].eq_ignore_ascii_case("cite") {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .to_string();

    md.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Markdown image embed for a Contentful asset file URL.
///
/// Contentful serves protocol-relative URLs; the embed pins https.
pub fn image_embed(url: &str) -> String {
    format!("![](https:{url})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_emphasis() {
        assert_eq!(from_html("<i>b</i>"), "*b*");
        assert_eq!(from_html("<em>b</em>"), "*b*");
        assert_eq!(from_html("<strong>loud</strong>"), "**loud**");
    }

    #[test]
    fn converts_headings_and_paragraphs() {
        assert_eq!(from_html("<h2>Lenders</h2>"), "\n## Lenders\n");
        assert_eq!(from_html("<p>text</p>"), "\n\ntext\n");
    }

    #[test]
    fn converts_lists() {
        assert_eq!(from_html("<ul><li>a</li><li>b</li></ul>"), "\n- a\n- b\n\n");
    }

    #[test]
    fn converts_anchors_and_images() {
        assert_eq!(
            from_html(r#"<a href="https://example.org">museum</a>"#),
            "[museum](https://example.org)"
        );
        assert_eq!(
            from_html(r#"<img src="https://example.org/x.jpg"/>"#),
            "![](https://example.org/x.jpg)"
        );
    }

    #[test]
    fn keeps_cite_elements() {
        assert_eq!(
            from_html("<cite>Water Lilies</cite>, 1906"),
            "<cite>Water Lilies</cite>, 1906"
        );
    }

    #[test]
    fn strips_unknown_tags_and_decodes_entities() {
        assert_eq!(from_html(r#"<span class="x">a &amp; b</span>"#), "a & b");
    }

    #[test]
    fn image_embed_pins_https() {
        assert_eq!(
            image_embed("//images.ctfassets.net/s/a.jpg"),
            "![](https://images.ctfassets.net/s/a.jpg)"
        );
    }
}
