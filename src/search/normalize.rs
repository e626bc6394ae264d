//! Content normalizer - rendered HTML to plain searchable text / 页面内容转纯文本
//!
//! Two passes:
//! 1. ammonia (html5ever) parses the body the way a browser would, drops
//!    everything but block elements and removes `script` / `style` contents
//!    / 按浏览器规则解析 HTML，只保留块级元素
//! 2. quick-xml walks the cleaned markup, decodes entities and turns block
//!    boundaries into word breaks / 解码实体，块元素分隔
//!
//! Whitespace runs collapse to a single space and the result is trimmed.

use std::collections::HashSet;

use ammonia::Builder;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Elements whose content is never visible / 不可见元素
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template", "noscript"];

/// Elements that break words when rendered / 块级元素
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "hr", "li", "ul", "ol", "dl", "dt", "dd", "h1", "h2", "h3", "h4", "h5",
    "h6", "table", "tr", "td", "th", "blockquote", "pre", "section", "article", "header", "footer",
    "figure", "figcaption",
];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed markup near byte {position}: {source}")]
    Markup {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
}

/// Convert page body to plain text / 页面正文转纯文本
pub fn normalize(body: &str) -> Result<String, NormalizeError> {
    let cleaned = Builder::empty()
        .add_tags(BLOCK_ELEMENTS)
        .clean_content_tags(HIDDEN_ELEMENTS.iter().copied().collect::<HashSet<_>>())
        .clean(body)
        .to_string();

    text_of(&cleaned)
}

fn is_block(name: &[u8]) -> bool {
    BLOCK_ELEMENTS.iter().any(|n| n.as_bytes().eq_ignore_ascii_case(name))
}

/// Visible text of cleaned markup / 提取文本
fn text_of(markup: &str) -> Result<String, NormalizeError> {
    let mut reader = Reader::from_str(markup);
    // void elements such as <br> are serialized without a closing tag
    reader.check_end_names(false);
    reader.trim_text(false);

    let mut text = String::with_capacity(markup.len());

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if is_block(e.local_name().as_ref()) {
                    text.push(' ');
                }
            }
            Ok(Event::End(e)) => {
                if is_block(e.local_name().as_ref()) {
                    text.push(' ');
                }
            }
            Ok(Event::Text(e)) => match e.unescape() {
                Ok(t) => text.push_str(&t),
                Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => {
                return Err(NormalizeError::Markup {
                    position: reader.buffer_position(),
                    source,
                });
            }
        }
    }

    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}
