//! MediaWiki markup to plain paragraphs.
//!
//! Good enough for corpus building, not a renderer: templates, tables,
//! references and media are dropped, links collapse to their label, and every
//! surviving paragraph ends up on its own line.

use regex::Regex;
use std::sync::OnceLock;

static RE_COMMENT: OnceLock<Regex> = OnceLock::new();
static RE_REF_SELF_CLOSING: OnceLock<Regex> = OnceLock::new();
static RE_REF: OnceLock<Regex> = OnceLock::new();
static RE_DROPPED_BLOCKS: OnceLock<Vec<Regex>> = OnceLock::new();
static RE_EXTERNAL_LINK: OnceLock<Regex> = OnceLock::new();
static RE_EXTERNAL_BARE: OnceLock<Regex> = OnceLock::new();
static RE_HTML_TAG: OnceLock<Regex> = OnceLock::new();
static RE_MAGIC_WORD: OnceLock<Regex> = OnceLock::new();
static RE_LIST_MARKER: OnceLock<Regex> = OnceLock::new();
static RE_SPACES: OnceLock<Regex> = OnceLock::new();

/// Tags whose content is never prose.
const DROPPED_TAGS: &[&str] = &[
    "math",
    "chem",
    "gallery",
    "timeline",
    "score",
    "syntaxhighlight",
    "source",
    "pre",
    "imagemap",
    "graph",
];

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Convert wikitext to plain text, one paragraph per line.
pub fn to_plain_text(wikitext: &str) -> String {
    let text = cached(&RE_COMMENT, r"(?s)<!--.*?-->").replace_all(wikitext, "");
    let text = cached(&RE_REF_SELF_CLOSING, r"(?i)<ref[^>]*/>").replace_all(&text, "");
    let text = cached(&RE_REF, r"(?is)<ref[^>]*>.*?</ref\s*>").replace_all(&text, "");

    let mut text = text.into_owned();
    let blocks = RE_DROPPED_BLOCKS.get_or_init(|| {
        DROPPED_TAGS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
            .collect()
    });
    for re in blocks {
        text = re.replace_all(&text, "").into_owned();
    }

    let text = strip_nested(&text, "{{", "}}");
    let text = strip_nested(&text, "{|", "|}");
    let text = internal_links(&text);

    let text = cached(&RE_EXTERNAL_LINK, r"\[(?:https?:)?//[^\s\]]+\s+([^\]]*)\]")
        .replace_all(&text, "$1");
    let text = cached(&RE_EXTERNAL_BARE, r"\[(?:https?:)?//[^\s\]]+\]").replace_all(&text, "");
    let text = cached(&RE_HTML_TAG, r"</?[A-Za-z][^>]*>").replace_all(&text, "");
    let text = cached(&RE_MAGIC_WORD, r"__[A-Z]+__").replace_all(&text, "");
    let text = text.replace("'''", "").replace("''", "");
    let text = decode_entities(&text);

    let list_marker = cached(&RE_LIST_MARKER, r"^[*#:;]+\s*");
    let spaces = cached(&RE_SPACES, r"\s+");

    let mut paragraphs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_structural(line) {
            continue;
        }
        let line = list_marker.replace(line, "");
        let line = spaces.replace_all(line.trim(), " ");
        if !line.is_empty() {
            paragraphs.push(line.into_owned());
        }
    }
    paragraphs.join("\n")
}

/// Headings, rules and leftover table rows.
fn is_structural(line: &str) -> bool {
    (line.starts_with('=') && line.ends_with('='))
        || line.starts_with("----")
        || line.starts_with('|')
        || line.starts_with('!')
}

/// Remove `open ... close` spans, honouring nesting. Unbalanced closers are dropped.
fn strip_nested(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut rest = text;
    while !rest.is_empty() {
        if rest.starts_with(open) {
            depth += 1;
            rest = &rest[open.len()..];
        } else if rest.starts_with(close) {
            depth = depth.saturating_sub(1);
            rest = &rest[close.len()..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                if depth == 0 {
                    out.push(c);
                }
            }
            rest = chars.as_str();
        }
    }
    out
}

/// Labels nested deeper than this are dropped.
const MAX_LINK_NESTING: usize = 16;

/// `[[target|label]]` becomes `label`, `[[target]]` becomes `target`.
/// Links into another namespace (files, categories, interwiki) vanish, along
/// with any links nested in their captions.
fn internal_links(text: &str) -> String {
    links_at_level(text, 0)
}

fn links_at_level(text: &str, level: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        rest = &rest[start + 2..];

        let mut depth = 1usize;
        let mut end = None;
        let mut i = 0;
        let bytes = rest.as_bytes();
        while i + 1 < bytes.len() {
            if bytes[i] == b'[' && bytes[i + 1] == b'[' {
                depth += 1;
                i += 2;
            } else if bytes[i] == b']' && bytes[i + 1] == b']' {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        let Some(end) = end else {
            // unterminated link: keep the rest as text
            out.push_str(rest);
            return out;
        };
        let inner = &rest[..end];
        rest = &rest[end + 2..];

        let (target, label) = inner.split_once('|').unwrap_or((inner, inner));
        if is_namespaced(target) || level >= MAX_LINK_NESTING {
            continue;
        }
        out.push_str(&links_at_level(label, level + 1));
    }
    out.push_str(rest);
    out
}

/// `File:x.png`, `Category:Foo`, `de:Ort`; not `Star Wars: Episode IV`.
fn is_namespaced(target: &str) -> bool {
    target
        .trim_start_matches(':')
        .split_once(':')
        .is_some_and(|(ns, _)| !ns.is_empty() && !ns.contains(' '))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_collapse_to_labels() {
        assert_eq!(
            to_plain_text("The [[United States|US]] and [[Canada]] border."),
            "The US and Canada border."
        );
    }

    #[test]
    fn nested_link_labels_resolve() {
        assert_eq!(internal_links("a [[Map|see [[b]] here]] z"), "a see b here z");
    }

    #[test]
    fn absurd_link_nesting_is_cut_off() {
        let deep = format!("x {}y{} z", "[[".repeat(20_000), "]]".repeat(20_000));
        assert_eq!(internal_links(&deep), "x  z");
    }

    #[test]
    fn namespaced_links_disappear() {
        let text = "Intro [[File:Map.png|thumb|A [[map]] of it]] text [[Category:Places]] [[de:Ort]]";
        assert_eq!(to_plain_text(text), "Intro text");
    }

    #[test]
    fn templates_tables_and_refs_are_dropped() {
        let text = "{{Infobox\n| name = {{nested|x}}\n}}\n'''Paris''' is big.<ref name=a>{{cite web}}</ref><ref name=b/>\n{| class=\"wikitable\"\n|-\n| cell\n|}\nEnd.";
        assert_eq!(to_plain_text(text), "Paris is big.\nEnd.");
    }

    #[test]
    fn headings_and_list_markers() {
        let text = "== History ==\n* first point\n# second point\n\n----\nBody.";
        assert_eq!(to_plain_text(text), "first point\nsecond point\nBody.");
    }

    #[test]
    fn external_links_keep_their_label() {
        assert_eq!(
            to_plain_text("See [https://example.org the site] or [https://example.org]."),
            "See the site or ."
        );
    }

    #[test]
    fn comments_math_and_entities() {
        let text = "a<!-- hidden -->b <math>x^2</math>c&nbsp;d &amp; e";
        assert_eq!(to_plain_text(text), "ab c d & e");
    }
}
