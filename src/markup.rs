// ✍️ Markup Converter - HTML entry bodies → Markdown
// A fixed chain of regex rewrites, then the data-driven RuleSet.
// Pure: the same fragment always converts to the same Markdown.
//
// Tables are left as HTML.

use crate::rules::RuleSet;
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in markup pattern is valid")
}

// ============================================================================
// PATTERNS
// ============================================================================
// Closing tags show up escaped in some exports (`<\/em>`), hence `<\\*/+`.

/// (pattern, replacement) applied in order
static INLINE_REPLACEMENTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // A trailing &nbsp; renders after the styled text, so it moves outside the marker
        (
            re(r"<(em|i)>(?P<content>.*?)(?P<nbsp>&nbsp;)*<\\*/+(em|i)>"),
            "*${content}*${nbsp}",
        ),
        (
            re(r"<(strong|b)>(?P<content>.*?)(?P<nbsp>&nbsp;)*<\\*/+(strong|b)>"),
            "**${content}**${nbsp}",
        ),
        (
            re(r"<(del)>(?P<content>.*?)(?P<nbsp>&nbsp;)*<\\*/+(del)>"),
            "~~${content}~~${nbsp}",
        ),
        (
            re(r"(<span[^>]*style[^>]*underline[^>]*>)(?P<text>.*?\w.*?)(<\\?/span>)"),
            "*${text}*",
        ),
        (re(r"<h1>"), "\n# "),
        (re(r"<h2>"), "\n## "),
        (re(r"<h3>"), "\n##### "),
        (re(r"&nbsp;"), " "),
    ]
});

static INLINE_REMOVALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"<p\s.*?>"),
        re(r"<(\\?/)?p>"),
        re(r"<(\\?/)?h\d+>"),
        re(r"<(\\?/)?del>"),
        re(r"<(\\?/)?span\s?.*?>"),
    ]
});

static ORDERED_LIST: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)(<ol>)(\s*)(.*?)(<\\*/+ol>)"));

static UNORDERED_LIST: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?s)(?P<opening_tag><ul.*?>)(?P<newline>\s*)(?P<contents>.*?)(<\\*/+ul>)")
});

static TASK_LIST_OPENING: LazyLock<Regex> = LazyLock::new(|| re(r#"<ul\s*class=\\?"task\\?">"#));

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| re(r"(<li(\s[^>]*)?>)(?P<contents>.*?)(<\\*/+li>)(?P<newline>\s*)"));

static CHECKED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| re(r#"<li data-checked=\\?"true\\?">"#));

static UNCHECKED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| re(r"<li(\s[^>]*)?>"));

static LIST_ITEM_CLOSE: LazyLock<Regex> = LazyLock::new(|| re(r"<\\*/+li>"));

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| re(r"<br\s*\\?/?>"));

static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)(<blockquote>)(?P<contents>.*?)(<\\*/+blockquote>)"));

static HORIZONTAL_RULE: LazyLock<Regex> = LazyLock::new(|| re(r"<hr( dir.*?)?>"));

static WEBLINK: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"(?s)<a\s+href=\\?"(?P<link>[^"\\]*)\\?"[^>]*>(?P<display_text>.*?)<\\*/+a>"#)
});

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| re(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);"));

// ============================================================================
// CONVERTER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MarkdownConverter {
    rules: RuleSet,
    convert_links: bool,
}

impl MarkdownConverter {
    pub fn new(rules: RuleSet) -> Self {
        MarkdownConverter {
            rules,
            convert_links: false,
        }
    }

    /// Builder pattern: rewrite `<a href>` into `[text](url)`
    pub fn with_links(mut self, convert_links: bool) -> Self {
        self.convert_links = convert_links;
        self
    }

    /// Convert one entry body
    pub fn convert(&self, html: &str) -> String {
        let text = convert_simple(html);
        let text = convert_lists(&text);
        let text = convert_line_breaks(&text);
        let text = self.rules.apply(&text);
        let text = convert_quote_blocks(&text);
        let text = convert_horizontal_rules(&text);
        let text = if self.convert_links {
            convert_weblinks(&text)
        } else {
            text
        };

        // Last, so decoded `<` can never be read as markup
        decode_entities(&text)
    }
}

/// One-shot conversion without link rewriting
pub fn html_to_markdown(html: &str, rules: &RuleSet) -> String {
    MarkdownConverter::new(rules.clone()).convert(html)
}

// ============================================================================
// RULE CHAIN
// ============================================================================

/// 1:1 inline replacements, then drop leftover tags
pub fn convert_simple(text: &str) -> String {
    let mut text = text.to_string();

    for (pattern, replacement) in INLINE_REPLACEMENTS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    for pattern in INLINE_REMOVALS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    text
}

/// Ordered, unordered and task lists
///
/// Blocks are rewritten one at a time: each rewrite shifts the offsets of
/// every later block, so the text is searched again after each one.
pub fn convert_lists(text: &str) -> String {
    let mut text = text.to_string();

    while let Some((range, replacement)) = next_ordered_list(&text) {
        text.replace_range(range, &replacement);
    }

    while let Some((range, replacement)) = next_unordered_list(&text) {
        text.replace_range(range, &replacement);
    }

    text
}

/// First `<ol>` block and its numbered replacement
///
/// Text between items is kept as is.
fn next_ordered_list(text: &str) -> Option<(Range<usize>, String)> {
    let caps = ORDERED_LIST.captures(text)?;
    let whole = caps.get(0)?;

    let mut number = 0;
    let items = LIST_ITEM.replace_all(&caps[3], |item: &Captures| {
        number += 1;
        format!("\n{}. {}{}", number, &item["contents"], &item["newline"])
    });

    Some((whole.range(), format!("{}{}", &caps[2], items)))
}

/// First `<ul>` block (plain or task list) and its replacement
fn next_unordered_list(text: &str) -> Option<(Range<usize>, String)> {
    let caps = UNORDERED_LIST.captures(text)?;
    let whole = caps.get(0)?;
    let start = caps.name("newline").map_or(whole.start(), |m| m.start());
    let end = caps.name("contents").map_or(whole.end(), |m| m.end());
    let body = &text[start..end];

    let body = if TASK_LIST_OPENING.is_match(&caps["opening_tag"]) {
        let body = CHECKED_ITEM.replace_all(body, "\n- [X] ");
        UNCHECKED_ITEM.replace_all(&body, "\n- [ ] ").into_owned()
    } else {
        UNCHECKED_ITEM.replace_all(body, "\n- ").into_owned()
    };

    Some((whole.range(), LIST_ITEM_CLOSE.replace_all(&body, "").into_owned()))
}

pub fn convert_line_breaks(text: &str) -> String {
    LINE_BREAK.replace_all(text, "\n").into_owned()
}

/// Prefix quoted lines with `> `
///
/// The empty segment before a leading newline and after a trailing newline
/// is not a line of the quote.
pub fn convert_quote_blocks(text: &str) -> String {
    let mut text = text.to_string();

    while let Some((range, quoted)) = next_blockquote(&text) {
        text.replace_range(range, &quoted);
    }

    text
}

fn next_blockquote(text: &str) -> Option<(Range<usize>, String)> {
    let caps = BLOCKQUOTE.captures(text)?;
    let whole = caps.get(0)?;
    Some((whole.range(), quote_lines(&caps["contents"])))
}

fn quote_lines(contents: &str) -> String {
    let segments: Vec<&str> = contents.split('\n').collect();
    let last = segments.len() - 1;

    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let is_edge = (i == 0 || (i == last && last > 0)) && segment.is_empty();
            if is_edge {
                segment.to_string()
            } else {
                format!("> {}", segment)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn convert_horizontal_rules(text: &str) -> String {
    HORIZONTAL_RULE.replace_all(text, "\n---").into_owned()
}

pub fn convert_weblinks(text: &str) -> String {
    WEBLINK
        .replace_all(text, "[${display_text}](${link})")
        .into_owned()
}

/// Decode the entities Journey-style exports produce, in a single pass
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => " ".to_string(),
                _ => decode_numeric(name).unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

/// `#39` / `#x27` → the character, `None` for invalid code points
fn decode_numeric(name: &str) -> Option<String> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(|c| c.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
