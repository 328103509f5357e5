//! HTML pages: the crawl forms and the discovery results.

use axum::{response::Html, routing::get, Router};

use crate::token::LinkIssuer;

/// Extensions the server offers crawl forms for.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "gif", "webm", "png"];

/// Value prefilled in the crawl form.
const DEFAULT_SOURCE: &str = "https://vine.co/channels/comedy";

/// Routes for the crawl forms.
pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { Html(source_form("/extrict/mp4")) }))
        .route("/gif", get(|| async { Html(source_form("/extrict/gif")) }))
        .route("/webm", get(|| async { Html(source_form("/extrict/webm")) }))
        .route("/png", get(|| async { Html(source_form("/extrict/png")) }))
}

/// MIME type used for the preview `<video>` element.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "mp4" => "video/mp4",
        "gif" => "image/gif",
        "webm" => "video/webm",
        "mp3" => "audio/mp3",
        _ => "application/octet-stream",
    }
}

/// Form asking for a page to crawl; posts to `action`.
pub fn source_form(action: &str) -> String {
    format!(
        r#"
<html>
    <title>Extract videos from a link</title>
    <body>
        <form action="{action}" method="POST">
            <label name="uri_label">URI with media of extensions mp4, gif, webm to crawl </label>
            <input name="uri" value="{source}"></input>
            <br />
            <button type="submit">Submit</button>
        </form>
    </body>
</html>
"#,
        action = escape(action),
        source = escape(DEFAULT_SOURCE),
    )
}

/// Results page for one crawl: a preview and a signed download link per hit.
pub fn results_page(source: &str, extension: &str, hits: &[String], issuer: &LinkIssuer) -> String {
    let mut page = String::from("<html>\n    <body>\n");

    if hits.is_empty() {
        page.push_str(&format!(
            "        <p>No hits found for &quot;{}&quot;</p>\n",
            escape(source)
        ));
    } else {
        let plurality = if hits.len() == 1 { "hit" } else { "hits" };
        page.push_str(&format!(
            "        <h4>{} {} for </h4> <a href=\"{src}\">{src}</a>\n        <br />\n",
            hits.len(),
            plurality,
            src = escape(source),
        ));

        let content_type = mime_for_extension(extension);
        for hit in hits {
            page.push_str(&format!(
                r#"
        <video width="70%" controls>
            <source src="{src}" type="{content_type}">{name}</source>
        </video>
        <br />
        <a href="{link}">Download</a>
        <br />
        <br />
"#,
                src = escape(hit),
                name = escape(&crate::relay::headers::basename(hit)),
                link = escape(&issuer.issue_link(hit)),
            ));
        }
    }

    page.push_str("        <a href=\"/\">Go back</a>\n    </body>\n</html>\n");
    page
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
