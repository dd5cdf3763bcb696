// Static player page rendered into exported archives

use std::fmt::Write;

use crate::error::{AppError, AppResult};
use crate::models::Adventure;

/// Renders the self-contained `index.html` of an export
pub trait PlayerRenderer: Send + Sync {
    fn render_player_page(&self, adventure: &Adventure) -> AppResult<String>;
}

/// Scripts loaded by the offline player, in load order
const PLAYER_SCRIPTS: [&str; 7] = [
    "static/js/markdown-it.min.js",
    "static/js/markdownhelper.js",
    "static/js/aventyr.model.js",
    "static/js/aventyr.props.js",
    "static/js/aventyr.viewer.js",
    "static/js/aventyr.scrollytell.js",
    "static/js/aventyr.player.js",
];

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Archive paths are relative, so `/upload/...` references become `upload/...`
fn render_error(e: std::fmt::Error) -> AppError {
    AppError::ArchiveError(format!("Failed to render player page: {}", e))
}

fn relative_url(url: &str) -> &str {
    url.strip_prefix('/').unwrap_or(url)
}

#[derive(Debug, Clone, Default)]
pub struct StaticPlayerPage;

impl StaticPlayerPage {
    pub fn new() -> Self {
        Self
    }

    fn font_faces(adventure: &Adventure) -> AppResult<String> {
        let mut css = String::new();
        for (i, font) in adventure.props.fields().font_list.iter().enumerate() {
            if font.is_empty() {
                continue;
            }
            writeln!(
                css,
                "        @font-face {{ font-family: \"ps-font-{}\"; src: url(\"{}\"); }}",
                i,
                escape_html(relative_url(font))
            )
            .map_err(render_error)?;
        }
        Ok(css)
    }
}

impl PlayerRenderer for StaticPlayerPage {
    fn render_player_page(&self, adventure: &Adventure) -> AppResult<String> {
        // `</` would end the script element early
        let data = serde_json::to_string(adventure)
            .map_err(|e| AppError::ArchiveError(format!("Failed to encode adventure: {}", e)))?
            .replace("</", "<\\/");

        let title = escape_html(&adventure.title);
        let mut html = String::new();
        write!(
            html,
            r#"<!DOCTYPE html>
<html lang="sv">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <meta name="description" content="{description}">
    <link rel="icon" href="static/favicon.ico">
    <link rel="stylesheet" href="static/css/ps_fonts.css">
    <link rel="stylesheet" href="static/css/ps.css">
    <style>
{fonts}    </style>
</head>
<body>
    <main id="player" data-editable="false">
        <h1 class="ps-title">{title}</h1>
    </main>
    <script id="adventure-data" type="application/json">{data}</script>
"#,
            title = title,
            description = escape_html(&adventure.description),
            fonts = Self::font_faces(adventure)?,
            data = data,
        )
        .map_err(render_error)?;

        for script in PLAYER_SCRIPTS {
            writeln!(html, "    <script src=\"{}\"></script>", script).map_err(render_error)?;
        }
        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Props;

    #[test]
    fn test_page_embeds_escaped_adventure() {
        let adventure = Adventure {
            title: "Draken & <jag>".to_string(),
            description: "</script><b>".to_string(),
            props: Props::from_raw(r#"{"font_list":["/upload/abc/font.woff"]}"#),
            ..Default::default()
        };
        let html = StaticPlayerPage::new().render_player_page(&adventure).unwrap();

        assert!(html.contains("<title>Draken &amp; &lt;jag&gt;</title>"));
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("url(\"upload/abc/font.woff\")"));
        assert!(html.contains("static/js/aventyr.player.js"));
        assert!(html.contains("static/css/ps.css"));
    }

    #[test]
    fn test_every_font_and_script_is_written() {
        let adventure = Adventure {
            props: Props::from_raw(r#"{"font_list":["/upload/abc/a.woff","","/upload/abc/c.ttf"]}"#),
            ..Default::default()
        };
        let html = StaticPlayerPage::new().render_player_page(&adventure).unwrap();

        assert_eq!(html.matches("@font-face").count(), 2);
        assert!(html.contains("\"ps-font-0\"; src: url(\"upload/abc/a.woff\")"));
        assert!(html.contains("\"ps-font-2\"; src: url(\"upload/abc/c.ttf\")"));
        assert_eq!(html.matches("<script src=").count(), PLAYER_SCRIPTS.len());
        assert!(html.ends_with("</body>\n</html>\n"));
    }
}
