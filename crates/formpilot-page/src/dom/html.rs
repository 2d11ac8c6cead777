//! Tolerant HTML fragment parser.
//!
//! Good enough for application forms and test fixtures: tags, quoted and bare
//! attributes, void elements, comments, doctype, raw-text `<script>`/`<style>`
//! and the common character references. Mismatched end tags close up to the
//! nearest open element with the same name and are otherwise ignored.

use std::collections::BTreeMap;

use super::{Document, NodeId, Style};
use crate::{Error, Result};

pub(super) fn parse(html: &str) -> Result<Document> {
    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = vec![doc.root()];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if html[i..].starts_with("<!--") {
            let end = html[i + 4..]
                .find("-->")
                .ok_or_else(|| Error::Html("unclosed comment".into()))?;
            i += 4 + end + 3;
            continue;
        }

        if html[i..].starts_with("<!") || html[i..].starts_with("<?") {
            let end = html[i..]
                .find('>')
                .ok_or_else(|| Error::Html("unclosed declaration".into()))?;
            i += end + 1;
            continue;
        }

        if bytes[i] == b'<' && html[i..].starts_with("</") {
            let (tag, next) = parse_end_tag(html, i)?;
            i = next;
            if let Some(pos) = stack
                .iter()
                .rposition(|&n| n != doc.root() && doc.tag(n) == Some(tag.as_str()))
            {
                stack.truncate(pos);
            }
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;

            let parent = *stack.last().unwrap_or(&doc.root());
            let style = style_for(&tag, &attrs);
            let node = doc.append_element(parent, &tag, attrs, style, None);

            if matches!(tag.as_str(), "script" | "style" | "textarea" | "title") {
                let close = find_end_tag(html, i, &tag)
                    .ok_or_else(|| Error::Html(format!("unclosed <{}>", tag)))?;
                let body = &html[i..close];
                if !body.is_empty() {
                    doc.append_text(node, decode_entities(body));
                }
                let (_, after) = parse_end_tag(html, close)?;
                i = after;
                continue;
            }

            if !self_closing && !is_void(&tag) {
                stack.push(node);
            }
            continue;
        }

        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        let text = &html[start..i];
        if !text.is_empty() {
            let parent = *stack.last().unwrap_or(&doc.root());
            doc.append_text(parent, decode_entities(text));
        }
    }

    doc.init_form_state();
    Ok(doc)
}

/// Style facts from markup alone.
fn style_for(tag: &str, attrs: &BTreeMap<String, String>) -> Style {
    let mut style = attrs
        .get("style")
        .map(|css| Style::from_inline(css))
        .unwrap_or_default();
    if attrs.contains_key("hidden") || (tag == "dialog" && !attrs.contains_key("open")) {
        style.display_none = true;
    }
    if tag == "input"
        && attrs
            .get("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        style.display_none = true;
    }
    style
}

fn parse_start_tag(
    html: &str,
    at: usize,
) -> Result<(String, BTreeMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();

    let mut attrs = BTreeMap::new();
    loop {
        skip_ws(bytes, &mut i);
        match bytes.get(i) {
            None => return Err(Error::Html(format!("unclosed start tag <{}>", tag))),
            Some(b'>') => {
                i += 1;
                return Ok((tag, attrs, false, i));
            }
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                return Ok((tag, attrs, true, i));
            }
            Some(b'/') => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && is_name_char(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            // Stray character inside a tag; skip it.
            i += html[i..].chars().next().map_or(1, char::len_utf8);
            continue;
        }
        let name = html[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };
        attrs.entry(name).or_insert(value);
    }
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String> {
    let bytes = html.as_bytes();
    match bytes.get(*i) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let start = *i + 1;
            let len = html[start..]
                .find(quote as char)
                .ok_or_else(|| Error::Html("unclosed attribute value".into()))?;
            *i = start + len + 1;
            Ok(decode_entities(&html[start..start + len]))
        }
        _ => {
            let start = *i;
            while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
                *i += 1;
            }
            Ok(decode_entities(&html[start..*i]))
        }
    }
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    let start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = html[start..i].to_ascii_lowercase();
    let close = html[i..]
        .find('>')
        .ok_or_else(|| Error::Html(format!("unclosed end tag </{}>", tag)))?;
    Ok((tag, i + close + 1))
}

fn find_end_tag(html: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{}", tag);
    html[from..]
        .to_ascii_lowercase()
        .find(&needle)
        .map(|pos| from + pos)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&s| s <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_and_void() {
        let doc = parse(
            r#"<!DOCTYPE html><form id="f"><label>Name <input name=n value="x"></label><br></form>"#,
        )
        .unwrap();
        let form = doc.by_id("f").unwrap();
        let label = doc.element_children(form).next().unwrap();
        assert_eq!(doc.tag(label), Some("label"));
        let input = doc.element_children(label).next().unwrap();
        assert_eq!(doc.attr(input, "name"), Some("n"));
        assert_eq!(doc.value(input), Some("x"));
        // <br> is a sibling of the label, not its child
        assert_eq!(doc.element_children(form).count(), 2);
    }

    #[test]
    fn test_parse_boolean_attrs_and_entities() {
        let doc = parse(r#"<input id="c" type="checkbox" checked required><p id="p">Fish &amp; Chips&#33;</p>"#)
            .unwrap();
        let c = doc.by_id("c").unwrap();
        assert!(doc.checked(c));
        assert!(doc.has_attr(c, "required"));
        assert_eq!(doc.text(doc.by_id("p").unwrap()), "Fish & Chips!");
    }

    #[test]
    fn test_parse_textarea_raw_text() {
        let doc = parse("<textarea id=\"t\">\nHello <b>there</b></textarea><input id=\"after\">").unwrap();
        let t = doc.by_id("t").unwrap();
        assert_eq!(doc.value(t), Some("Hello <b>there</b>"));
        assert!(doc.by_id("after").is_some());
    }

    #[test]
    fn test_closed_dialog_is_hidden() {
        let doc = parse(r#"<dialog id="d"><input id="i"></dialog><dialog id="o" open></dialog>"#).unwrap();
        assert!(!doc.is_visible(doc.by_id("d").unwrap()));
        assert!(doc.is_visible(doc.by_id("o").unwrap()));
    }

    #[test]
    fn test_unclosed_comment_fails() {
        assert!(parse("<div><!-- never closed").is_err());
    }
}
