//! The djot dialect: a small built-in reader plus the same fold-based
//! rendering model as [`crate::markdown`].
//!
//! No djot parser is pulled in; this module carries a line-oriented reader
//! for the subset the dialect's tree can express. Anything it does not
//! recognize degrades to literal text, never to an error.
//!
//! ## Recognized blocks
//!
//! ```text
//! {#id .class key="value"}     attribute line, attaches to the next block
//! # Heading                    levels 1..=6, single line
//! ``` lang                     code fence; `=format` info makes a RawBlock
//! ::: name                     div, closed by a line of colons
//! ---  /  * * *                thematic break (one marker kind, 3+)
//! - item                       flat bullet list (`-`, `*`, `+`)
//! [name]: /url                 reference definition
//! [^name]: text                footnote definition (consumed, not kept)
//! anything else                paragraph, ended by a blank line
//! ```
//!
//! Blocks are separated by blank lines; nothing interrupts a paragraph.
//! Lists are flat and tight: items hold one synthesized paragraph, indented
//! continuation lines join it, and a change of marker starts a new list.
//!
//! ## Recognized inlines
//!
//! `_emphasis_`, `*strong*`, `` `verbatim` `` (any fence length, implicit
//! close at end of input), math as `$` or `$$` followed by a verbatim span,
//! `[text](url)`, `[text][name]` and collapsed `[text][]`, `[text]{attrs}` spans,
//! `![alt](url)` images, `[^name]` footnote references, `\`-escapes
//! (`\␠` is a non-breaking space, `\` at end of line a hard break).
//!
//! ## Attributes and references
//!
//! Attributes are carried as a sorted string map ([`Attrs`]); `.class`
//! tokens concatenate, everything else overwrites. An attribute line before
//! a reference definition is stored in
//! [`Document::reference_attributes`] and merged into every link that
//! resolves through that reference at render time. Unresolved references
//! degrade to the `#<slug>` / `back-to-<slug>` anchor pair exactly as in
//! the Markdown dialect.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::mem;

use maud::{Escaper, Markup, PreEscaped, html};

use crate::frontmatter::{self, MetadataError};
use crate::markdown::LinkTarget;
use crate::route;

/// djot attributes: id, classes, and free-form key/value pairs, kept sorted
/// so rendered output is deterministic.
pub type Attrs = BTreeMap<String, String>;

// ============================================================================
// Document model
// ============================================================================

/// A parsed djot document. `references` maps reference names to URLs;
/// `reference_attributes` carries the attribute lines written above
/// reference definitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub references: HashMap<String, String>,
    pub reference_attributes: HashMap<String, Attrs>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph { attrs: Attrs, content: Vec<Inline> },
    Heading { attrs: Attrs, level: u8, content: Vec<Inline> },
    CodeBlock { attrs: Attrs, language: Option<String>, text: String },
    Div { attrs: Attrs, content: Vec<Block> },
    /// A `=format` fence; the text passes through rendering untouched.
    RawBlock(String),
    ThematicBreak,
    UnorderedList { attrs: Attrs, marker: ListMarker, items: Vec<Vec<Block>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Code(String),
    Link { attrs: Attrs, content: Vec<Inline>, destination: Destination },
    Image { attrs: Attrs, content: Vec<Inline>, destination: Destination },
    Span { attrs: Attrs, text: String },
    MathInline(String),
    MathDisplay(String),
    /// A footnote reference; the default renderer emits nothing for it.
    Footnote(String),
    NonBreakingSpace,
    HardBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Url(String),
    Reference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Dash,
    Star,
    Plus,
}

// ============================================================================
// Block parsing
// ============================================================================

impl Document {
    /// Parse djot into a tree. Parsing never fails.
    pub fn parse(text: &str) -> Document {
        let mut parser = Parser {
            references: HashMap::new(),
            reference_attributes: HashMap::new(),
        };
        let lines: Vec<&str> = text.lines().collect();
        let blocks = parser.parse_blocks(&lines);
        Document {
            blocks,
            references: parser.references,
            reference_attributes: parser.reference_attributes,
        }
    }
}

struct Parser {
    references: HashMap<String, String>,
    reference_attributes: HashMap<String, Attrs>,
}

impl Parser {
    fn parse_blocks(&mut self, lines: &[&str]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut attrs = Attrs::new();
        let mut pos = 0;
        while pos < lines.len() {
            let line = lines[pos];
            let trimmed = line.trim();
            if trimmed.is_empty() {
                pos += 1;
                continue;
            }
            if let Some(parsed) = attr_line(trimmed) {
                merge_attrs(&mut attrs, &parsed);
                pos += 1;
                continue;
            }
            if let Some((level, rest)) = heading_line(trimmed) {
                blocks.push(Block::Heading {
                    attrs: mem::take(&mut attrs),
                    level,
                    content: parse_inlines(rest),
                });
                pos += 1;
                continue;
            }
            // Before the list check: `* * *` is a break, `* x` an item.
            if thematic_break_line(trimmed) {
                attrs.clear();
                blocks.push(Block::ThematicBreak);
                pos += 1;
                continue;
            }
            if let Some((run, info)) = fence_line(trimmed) {
                let (block, next) = self.fence(lines, pos, run, info, mem::take(&mut attrs));
                blocks.push(block);
                pos = next;
                continue;
            }
            if let Some(class) = div_line(trimmed) {
                let (block, next) = self.div(lines, pos, class, mem::take(&mut attrs));
                blocks.push(block);
                pos = next;
                continue;
            }
            if trimmed.starts_with("[^") && trimmed.contains("]:") {
                attrs.clear();
                pos = skip_footnote_definition(lines, pos);
                continue;
            }
            if let Some((name, url)) = reference_definition(trimmed) {
                if !attrs.is_empty() {
                    self.reference_attributes.insert(name.clone(), mem::take(&mut attrs));
                }
                self.references.insert(name, url);
                pos += 1;
                continue;
            }
            if let Some(marker) = list_marker(line) {
                let (block, next) = self.list(lines, pos, marker, mem::take(&mut attrs));
                blocks.push(block);
                pos = next;
                continue;
            }
            let mut end = pos;
            while end < lines.len() && !lines[end].trim().is_empty() {
                end += 1;
            }
            blocks.push(Block::Paragraph {
                attrs: mem::take(&mut attrs),
                content: parse_inlines(&lines[pos..end].join("\n")),
            });
            pos = end;
        }
        blocks
    }

    fn fence(
        &mut self,
        lines: &[&str],
        open: usize,
        run: usize,
        info: &str,
        attrs: Attrs,
    ) -> (Block, usize) {
        let mut end = open + 1;
        while end < lines.len() && !fence_close(lines[end].trim(), run) {
            end += 1;
        }
        let mut text = String::new();
        for line in &lines[open + 1..end] {
            text.push_str(line);
            text.push('\n');
        }
        let next = if end < lines.len() { end + 1 } else { end };
        match info.strip_prefix('=') {
            Some(_format) => (Block::RawBlock(text), next),
            None => {
                let language = if info.is_empty() { None } else { Some(info.to_string()) };
                (Block::CodeBlock { attrs, language, text }, next)
            }
        }
    }

    fn div(&mut self, lines: &[&str], open: usize, class: &str, mut attrs: Attrs) -> (Block, usize) {
        if !class.is_empty() {
            append_class(&mut attrs, class);
        }
        let mut end = open + 1;
        let mut depth = 0usize;
        while end < lines.len() {
            let trimmed = lines[end].trim();
            if div_close(trimmed) {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if div_line(trimmed).is_some_and(|class| !class.is_empty()) {
                depth += 1;
            }
            end += 1;
        }
        let content = self.parse_blocks(&lines[open + 1..end]);
        let next = if end < lines.len() { end + 1 } else { end };
        (Block::Div { attrs, content }, next)
    }

    fn list(
        &mut self,
        lines: &[&str],
        mut pos: usize,
        marker: ListMarker,
        attrs: Attrs,
    ) -> (Block, usize) {
        let mut items = Vec::new();
        while pos < lines.len() {
            let Some(rest) = lines[pos]
                .strip_prefix(marker.as_char())
                .and_then(|rest| rest.strip_prefix(' '))
            else {
                break;
            };
            let mut item = rest.to_string();
            pos += 1;
            while pos < lines.len()
                && !lines[pos].trim().is_empty()
                && lines[pos].starts_with("  ")
            {
                item.push('\n');
                item.push_str(lines[pos].trim_start());
                pos += 1;
            }
            items.push(vec![Block::Paragraph {
                attrs: Attrs::new(),
                content: parse_inlines(&item),
            }]);
        }
        (Block::UnorderedList { attrs, marker, items }, pos)
    }
}

fn skip_footnote_definition(lines: &[&str], open: usize) -> usize {
    let mut pos = open + 1;
    while pos < lines.len() && (lines[pos].starts_with(' ') || lines[pos].starts_with('\t')) {
        pos += 1;
    }
    pos
}

fn heading_line(trimmed: &str) -> Option<(u8, &str)> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = trimmed[level..].strip_prefix(' ')?;
    Some((level as u8, rest))
}

fn thematic_break_line(trimmed: &str) -> bool {
    let mut markers = 0;
    let mut kind = None;
    for ch in trimmed.chars() {
        match ch {
            ' ' | '\t' => {}
            '-' | '*' => {
                if *kind.get_or_insert(ch) != ch {
                    return false;
                }
                markers += 1;
            }
            _ => return false,
        }
    }
    markers >= 3
}

fn fence_line(trimmed: &str) -> Option<(usize, &str)> {
    let run = trimmed.chars().take_while(|c| *c == '`').count();
    if run < 3 {
        return None;
    }
    let info = trimmed[run..].trim();
    if info.contains('`') {
        return None;
    }
    Some((run, info))
}

fn fence_close(trimmed: &str, run: usize) -> bool {
    trimmed.len() >= run && trimmed.chars().all(|c| c == '`')
}

fn div_line(trimmed: &str) -> Option<&str> {
    let run = trimmed.chars().take_while(|c| *c == ':').count();
    if run < 3 {
        return None;
    }
    let rest = trimmed[run..].trim();
    if rest.contains(':') {
        return None;
    }
    Some(rest)
}

fn div_close(trimmed: &str) -> bool {
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == ':')
}

fn reference_definition(trimmed: &str) -> Option<(String, String)> {
    let rest = trimmed.strip_prefix('[')?;
    let close = rest.find("]:")?;
    let name = &rest[..close];
    if name.is_empty() || name.contains('[') || name.contains(']') {
        return None;
    }
    Some((name.to_string(), rest[close + 2..].trim().to_string()))
}

fn list_marker(line: &str) -> Option<ListMarker> {
    match line.as_bytes() {
        [b'-', b' ', ..] => Some(ListMarker::Dash),
        [b'*', b' ', ..] => Some(ListMarker::Star),
        [b'+', b' ', ..] => Some(ListMarker::Plus),
        _ => None,
    }
}

impl ListMarker {
    fn as_char(self) -> char {
        match self {
            ListMarker::Dash => '-',
            ListMarker::Star => '*',
            ListMarker::Plus => '+',
        }
    }
}

// ============================================================================
// Inline parsing
// ============================================================================

fn parse_inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    let mut pos = 0;
    while pos < text.len() {
        let Some(ch) = text[pos..].chars().next() else { break };
        match ch {
            '\\' => match text[pos + 1..].chars().next() {
                Some('\n') => {
                    flush(&mut buffer, &mut out);
                    out.push(Inline::HardBreak);
                    pos += 2;
                }
                Some(' ') => {
                    flush(&mut buffer, &mut out);
                    out.push(Inline::NonBreakingSpace);
                    pos += 2;
                }
                Some(next) if next.is_ascii_punctuation() => {
                    buffer.push(next);
                    pos += 1 + next.len_utf8();
                }
                _ => {
                    buffer.push('\\');
                    pos += 1;
                }
            },
            '_' | '*' => match closed_span(text, pos, ch) {
                Some((start, end)) => {
                    flush(&mut buffer, &mut out);
                    let content = parse_inlines(&text[start..end]);
                    out.push(if ch == '_' {
                        Inline::Emphasis(content)
                    } else {
                        Inline::Strong(content)
                    });
                    pos = end + 1;
                }
                None => {
                    buffer.push(ch);
                    pos += 1;
                }
            },
            '`' => {
                let (content, after) = verbatim_span(text, pos);
                flush(&mut buffer, &mut out);
                out.push(Inline::Code(content));
                pos = after;
            }
            '$' => {
                let dollars = if text[pos..].starts_with("$$") { 2 } else { 1 };
                if text[pos + dollars..].starts_with('`') {
                    let (content, after) = verbatim_span(text, pos + dollars);
                    flush(&mut buffer, &mut out);
                    out.push(if dollars == 2 {
                        Inline::MathDisplay(content)
                    } else {
                        Inline::MathInline(content)
                    });
                    pos = after;
                } else {
                    buffer.push('$');
                    pos += 1;
                }
            }
            '[' => match bracket_construct(text, pos, false) {
                Some((node, after)) => {
                    flush(&mut buffer, &mut out);
                    out.push(node);
                    pos = after;
                }
                None => {
                    buffer.push('[');
                    pos += 1;
                }
            },
            '!' if text[pos + 1..].starts_with('[') => {
                match bracket_construct(text, pos + 1, true) {
                    Some((node, after)) => {
                        flush(&mut buffer, &mut out);
                        out.push(node);
                        pos = after;
                    }
                    None => {
                        buffer.push('!');
                        pos += 1;
                    }
                }
            }
            _ => {
                buffer.push(ch);
                pos += ch.len_utf8();
            }
        }
    }
    flush(&mut buffer, &mut out);
    out
}

fn flush(buffer: &mut String, out: &mut Vec<Inline>) {
    if !buffer.is_empty() {
        out.push(Inline::Text(mem::take(buffer)));
    }
}

/// Find the closing marker for `_..._` or `*...*`: the opener must not be
/// followed by whitespace, the closer not preceded by it, content non-empty.
/// Returns the content byte range.
fn closed_span(text: &str, open: usize, marker: char) -> Option<(usize, usize)> {
    let start = open + marker.len_utf8();
    let mut prev: Option<char> = None;
    for (offset, ch) in text[start..].char_indices() {
        if offset == 0 && (ch.is_whitespace() || ch == marker) {
            return None;
        }
        if offset > 0 && ch == marker && prev.is_some_and(|p| !p.is_whitespace()) {
            return Some((start, start + offset));
        }
        prev = Some(ch);
    }
    None
}

/// A backtick run and its contents. An unclosed run extends to the end of
/// the input, matching djot's implicit close.
fn verbatim_span(text: &str, open: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut run = 0;
    while bytes.get(open + run) == Some(&b'`') {
        run += 1;
    }
    let start = open + run;
    let mut pos = start;
    while pos < text.len() {
        if bytes[pos] == b'`' {
            let mut end = pos;
            while end < text.len() && bytes[end] == b'`' {
                end += 1;
            }
            if end - pos == run {
                return (text[start..pos].to_string(), end);
            }
            pos = end;
        } else {
            pos += 1;
        }
    }
    (text[start..].to_string(), text.len())
}

fn bracket_construct(text: &str, open: usize, image: bool) -> Option<(Inline, usize)> {
    if !image && text[open..].starts_with("[^") {
        let close = text[open + 2..].find(']')? + open + 2;
        let name = &text[open + 2..close];
        if name.is_empty() || name.contains('[') {
            return None;
        }
        return Some((Inline::Footnote(name.to_string()), close + 1));
    }
    let close = matching_bracket(text, open)?;
    let content = parse_inlines(&text[open + 1..close]);
    let mut pos = close + 1;
    let destination = match text[pos..].chars().next() {
        Some('(') => {
            let end = text[pos + 1..].find(')')? + pos + 1;
            let url = text[pos + 1..end].trim().to_string();
            pos = end + 1;
            Destination::Url(url)
        }
        Some('[') => {
            let end = text[pos + 1..].find(']')? + pos + 1;
            let name = text[pos + 1..end].trim();
            let name =
                if name.is_empty() { text_content(&content) } else { name.to_string() };
            pos = end + 1;
            Destination::Reference(name)
        }
        Some('{') if !image => {
            let (attrs, after) = attr_group(text, pos)?;
            return Some((Inline::Span { attrs, text: text_content(&content) }, after));
        }
        _ => return None,
    };
    let (attrs, pos) = match attr_group(text, pos) {
        Some((attrs, after)) => (attrs, after),
        None => (Attrs::new(), pos),
    };
    let node = if image {
        Inline::Image { attrs, content, destination }
    } else {
        Inline::Link { attrs, content, destination }
    };
    Some((node, pos))
}

fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================================
// Attributes
// ============================================================================

/// A line that consists of exactly one `{...}` group.
fn attr_line(trimmed: &str) -> Option<Attrs> {
    if !trimmed.starts_with('{') {
        return None;
    }
    let end = find_group_end(trimmed, 0)?;
    if end != trimmed.len() - 1 {
        return None;
    }
    parse_attr_body(&trimmed[1..end])
}

/// A `{...}` group starting at `at`; returns the attributes and the position
/// after the closing brace.
fn attr_group(text: &str, at: usize) -> Option<(Attrs, usize)> {
    if !text[at..].starts_with('{') {
        return None;
    }
    let end = find_group_end(text, at)?;
    let attrs = parse_attr_body(&text[at + 1..end])?;
    Some((attrs, end + 1))
}

/// Closing brace of a group, skipping quoted values.
fn find_group_end(text: &str, at: usize) -> Option<usize> {
    let mut in_quotes = false;
    for (offset, ch) in text[at..].char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(at + offset),
            _ => {}
        }
    }
    None
}

/// `#id`, `.class`, `key=value`, `key="quoted value"` and `%comments%`.
/// Malformed input yields `None` and the caller falls back to literal text.
fn parse_attr_body(body: &str) -> Option<Attrs> {
    let mut attrs = Attrs::new();
    let mut pos = 0;
    while pos < body.len() {
        let Some(ch) = body[pos..].chars().next() else { break };
        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }
        match ch {
            '#' => {
                let (word, after) = take_word(body, pos + 1);
                if word.is_empty() {
                    return None;
                }
                attrs.insert("id".to_string(), word.to_string());
                pos = after;
            }
            '.' => {
                let (word, after) = take_word(body, pos + 1);
                if word.is_empty() {
                    return None;
                }
                append_class(&mut attrs, word);
                pos = after;
            }
            '%' => match body[pos + 1..].find('%') {
                Some(end) => pos = pos + 1 + end + 1,
                None => pos = body.len(),
            },
            _ => {
                let (key, after) = take_word(body, pos);
                if key.is_empty() || !body[after..].starts_with('=') {
                    return None;
                }
                let value_start = after + 1;
                if body[value_start..].starts_with('"') {
                    let end = body[value_start + 1..].find('"')? + value_start + 1;
                    attrs.insert(key.to_string(), body[value_start + 1..end].to_string());
                    pos = end + 1;
                } else {
                    let (value, after) = take_word(body, value_start);
                    attrs.insert(key.to_string(), value.to_string());
                    pos = after;
                }
            }
        }
    }
    Some(attrs)
}

fn take_word(text: &str, from: usize) -> (&str, usize) {
    let mut end = from;
    for (offset, ch) in text[from..].char_indices() {
        if ch.is_whitespace() || "{}#.%=\"".contains(ch) {
            break;
        }
        end = from + offset + ch.len_utf8();
    }
    (&text[from..end], end)
}

fn append_class(attrs: &mut Attrs, class: &str) {
    match attrs.get_mut("class") {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(class);
        }
        None => {
            attrs.insert("class".to_string(), class.to_string());
        }
    }
}

/// `class` values concatenate, every other key overwrites.
fn merge_attrs(into: &mut Attrs, from: &Attrs) {
    for (key, value) in from {
        if key == "class" {
            append_class(into, value);
        } else {
            into.insert(key.clone(), value.clone());
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// One callback per node kind, post-order like the Markdown renderer. Block,
/// link, image, and span callbacks additionally receive the node's
/// attributes; resolved reference links arrive with their reference's
/// attributes already merged in.
pub struct Renderer<V> {
    pub paragraph: Box<dyn Fn(&Attrs, Vec<V>) -> V>,
    pub heading: Box<dyn Fn(&Attrs, u8, Vec<V>) -> V>,
    pub code_block: Box<dyn Fn(&Attrs, Option<&str>, &str) -> V>,
    pub div: Box<dyn Fn(&Attrs, Vec<V>) -> V>,
    pub raw_block: Box<dyn Fn(&str) -> V>,
    pub thematic_break: Box<dyn Fn() -> V>,
    pub unordered_list: Box<dyn Fn(&Attrs, ListMarker, Vec<V>) -> V>,
    pub list_item: Box<dyn Fn(Vec<V>) -> V>,
    pub text: Box<dyn Fn(&str) -> V>,
    pub emphasis: Box<dyn Fn(Vec<V>) -> V>,
    pub strong: Box<dyn Fn(Vec<V>) -> V>,
    pub code: Box<dyn Fn(&str) -> V>,
    pub link: Box<dyn Fn(&Attrs, &LinkTarget, Vec<V>) -> V>,
    /// `(attrs, target, alt)`.
    pub image: Box<dyn Fn(&Attrs, &LinkTarget, &str) -> V>,
    pub span: Box<dyn Fn(&Attrs, &str) -> V>,
    pub math_inline: Box<dyn Fn(&str) -> V>,
    pub math_display: Box<dyn Fn(&str) -> V>,
    pub footnote: Box<dyn Fn(&str) -> V>,
    pub non_breaking_space: Box<dyn Fn() -> V>,
    pub hard_break: Box<dyn Fn() -> V>,
}

/// Strip frontmatter, parse, and fold in one call.
pub fn render<V>(document: &str, renderer: &Renderer<V>) -> Vec<V> {
    let document = Document::parse(frontmatter::content(document));
    render_document(&document, renderer)
}

/// Like [`render`], but parse the frontmatter first and let the caller build
/// the renderer from it.
pub fn render_with_metadata<V, F>(document: &str, renderer: F) -> Result<Vec<V>, MetadataError>
where
    F: FnOnce(&toml::Table) -> Renderer<V>,
{
    let metadata = frontmatter::metadata(document)?;
    let renderer = renderer(&metadata);
    Ok(render(document, &renderer))
}

/// Fold an already-parsed document, one `V` per top-level block.
pub fn render_document<V>(document: &Document, renderer: &Renderer<V>) -> Vec<V> {
    document.blocks.iter().map(|block| render_block(block, document, renderer)).collect()
}

fn render_block<V>(block: &Block, document: &Document, renderer: &Renderer<V>) -> V {
    let blocks = |content: &Vec<Block>| -> Vec<V> {
        content.iter().map(|b| render_block(b, document, renderer)).collect()
    };
    match block {
        Block::Paragraph { attrs, content } => {
            (renderer.paragraph)(attrs, render_inlines(content, document, renderer))
        }
        Block::Heading { attrs, level, content } => {
            (renderer.heading)(attrs, *level, render_inlines(content, document, renderer))
        }
        Block::CodeBlock { attrs, language, text } => {
            (renderer.code_block)(attrs, language.as_deref(), text)
        }
        Block::Div { attrs, content } => (renderer.div)(attrs, blocks(content)),
        Block::RawBlock(text) => (renderer.raw_block)(text),
        Block::ThematicBreak => (renderer.thematic_break)(),
        Block::UnorderedList { attrs, marker, items } => {
            let items = items.iter().map(|item| (renderer.list_item)(blocks(item))).collect();
            (renderer.unordered_list)(attrs, *marker, items)
        }
    }
}

fn render_inlines<V>(content: &[Inline], document: &Document, renderer: &Renderer<V>) -> Vec<V> {
    content.iter().map(|inline| render_inline(inline, document, renderer)).collect()
}

fn render_inline<V>(inline: &Inline, document: &Document, renderer: &Renderer<V>) -> V {
    match inline {
        Inline::Text(text) => (renderer.text)(text),
        Inline::Emphasis(content) => {
            (renderer.emphasis)(render_inlines(content, document, renderer))
        }
        Inline::Strong(content) => (renderer.strong)(render_inlines(content, document, renderer)),
        Inline::Code(code) => (renderer.code)(code),
        Inline::Link { attrs, content, destination } => {
            let (attrs, target) = resolve(attrs, destination, document);
            (renderer.link)(&attrs, &target, render_inlines(content, document, renderer))
        }
        Inline::Image { attrs, content, destination } => {
            let (attrs, target) = resolve(attrs, destination, document);
            (renderer.image)(&attrs, &target, &text_content(content))
        }
        Inline::Span { attrs, text } => (renderer.span)(attrs, text),
        Inline::MathInline(text) => (renderer.math_inline)(text),
        Inline::MathDisplay(text) => (renderer.math_display)(text),
        Inline::Footnote(name) => (renderer.footnote)(name),
        Inline::NonBreakingSpace => (renderer.non_breaking_space)(),
        Inline::HardBreak => (renderer.hard_break)(),
    }
}

/// Render-time reference resolution. Resolved references contribute their
/// stored attributes, with the node's own attributes taking precedence;
/// unresolved names degrade to the in-page anchor pair.
fn resolve(attrs: &Attrs, destination: &Destination, document: &Document) -> (Attrs, LinkTarget) {
    match destination {
        Destination::Url(url) => (
            attrs.clone(),
            LinkTarget { href: url.clone(), title: None, id: None },
        ),
        Destination::Reference(name) => match document.references.get(name) {
            Some(url) => {
                let mut merged =
                    document.reference_attributes.get(name).cloned().unwrap_or_default();
                merge_attrs(&mut merged, attrs);
                (merged, LinkTarget { href: url.clone(), title: None, id: None })
            }
            None => {
                let slug = route::slug(name);
                (
                    attrs.clone(),
                    LinkTarget {
                        href: format!("#{slug}"),
                        title: None,
                        id: Some(format!("back-to-{slug}")),
                    },
                )
            }
        },
    }
}

/// Flatten inline nodes to their readable text. Spans and math contribute
/// their verbatim text, footnote references nothing, a non-breaking space
/// its character.
pub fn text_content(content: &[Inline]) -> String {
    let mut out = String::new();
    push_text_content(content, &mut out);
    out
}

fn push_text_content(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(text)
            | Inline::Code(text)
            | Inline::Span { text, .. }
            | Inline::MathInline(text)
            | Inline::MathDisplay(text) => out.push_str(text),
            Inline::Emphasis(content)
            | Inline::Strong(content)
            | Inline::Link { content, .. }
            | Inline::Image { content, .. } => push_text_content(content, out),
            Inline::NonBreakingSpace => out.push('\u{a0}'),
            Inline::HardBreak => out.push(' '),
            Inline::Footnote(_) => {}
        }
    }
}

// ============================================================================
// Default HTML renderer
// ============================================================================

/// Plain semantic HTML via [`maud`]. Attributes are emitted in sorted key
/// order; math is wrapped the way djot's own HTML output does it
/// (`span.math` with `\(..\)` or `\[..\]` delimiters).
pub fn default_renderer() -> Renderer<Markup> {
    Renderer {
        paragraph: Box::new(|attrs, content| element("p", attrs, content)),
        heading: Box::new(|attrs, level, content| {
            let tag = match level {
                1 => "h1",
                2 => "h2",
                3 => "h3",
                4 => "h4",
                5 => "h5",
                _ => "h6",
            };
            element(tag, attrs, content)
        }),
        code_block: Box::new(|attrs, language, text| {
            let class = language.map(|language| format!("language-{language}"));
            element("pre", attrs, vec![html! { code class=[class] { (text) } }])
        }),
        div: Box::new(|attrs, content| element("div", attrs, content)),
        raw_block: Box::new(|text| PreEscaped(text.to_string())),
        thematic_break: Box::new(|| html! { hr; }),
        unordered_list: Box::new(|attrs, _marker, items| element("ul", attrs, items)),
        list_item: Box::new(|content| html! { li { (fragment(content)) } }),
        text: Box::new(|text| html! { (text) }),
        emphasis: Box::new(|content| html! { em { (fragment(content)) } }),
        strong: Box::new(|content| html! { strong { (fragment(content)) } }),
        code: Box::new(|code| html! { code { (code) } }),
        link: Box::new(|attrs, target, content| {
            let mut merged = attrs.clone();
            merged.insert("href".to_string(), target.href.clone());
            if let Some(id) = &target.id {
                merged.insert("id".to_string(), id.clone());
            }
            element("a", &merged, content)
        }),
        image: Box::new(|attrs, target, alt| {
            let mut merged = attrs.clone();
            merged.insert("src".to_string(), target.href.clone());
            merged.insert("alt".to_string(), alt.to_string());
            if let Some(id) = &target.id {
                merged.insert("id".to_string(), id.clone());
            }
            void_element("img", &merged)
        }),
        span: Box::new(|attrs, text| element("span", attrs, vec![html! { (text) }])),
        math_inline: Box::new(|text| {
            html! { span class="math inline" { "\\(" (text) "\\)" } }
        }),
        math_display: Box::new(|text| {
            html! { span class="math display" { "\\[" (text) "\\]" } }
        }),
        footnote: Box::new(|_| PreEscaped(String::new())),
        non_breaking_space: Box::new(|| PreEscaped("&nbsp;".to_string())),
        hard_break: Box::new(|| html! { br; }),
    }
}

/// An element with caller-supplied attribute names, which `html!` cannot
/// splice. Names and values go through [`maud::Escaper`].
fn element(tag: &str, attrs: &Attrs, children: Vec<Markup>) -> Markup {
    let mut out = String::new();
    out.push('<');
    out.push_str(tag);
    push_attrs(&mut out, attrs);
    out.push('>');
    for child in children {
        out.push_str(&child.into_string());
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    PreEscaped(out)
}

fn void_element(tag: &str, attrs: &Attrs) -> Markup {
    let mut out = String::new();
    out.push('<');
    out.push_str(tag);
    push_attrs(&mut out, attrs);
    out.push('>');
    PreEscaped(out)
}

fn push_attrs(out: &mut String, attrs: &Attrs) {
    for (key, value) in attrs {
        out.push(' ');
        let _ = Escaper::new(out).write_str(key);
        out.push_str("=\"");
        let _ = Escaper::new(out).write_str(value);
        out.push('"');
    }
}

fn fragment(children: Vec<Markup>) -> Markup {
    html! {
        @for child in children { (child) }
    }
}
