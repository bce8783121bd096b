//! The Markdown dialect: parse to a tree, fold the tree to any output type.
//!
//! [`pulldown_cmark`] produces a flat event stream; this module assembles it
//! into a recursive [`Block`]/[`Inline`] tree so rendering can be expressed
//! as one post-order fold. Rendering is driven by a [`Renderer<V>`], a table
//! with one callback per node kind producing a caller-chosen output type
//! `V`. [`default_renderer`] targets [`maud::Markup`], but nothing in the
//! fold cares what `V` is.
//!
//! ```text
//! &str ──parse──▶ Document { blocks, references }
//!                     │
//!                     │  fold, children first
//!                     ▼
//!            Renderer<V> callbacks ──▶ Vec<V>   (one V per top-level block)
//! ```
//!
//! ## Reference links
//!
//! Reference-style links and images keep their reference *name* in the tree
//! ([`Destination::Reference`]); the document carries a name → target table.
//! Resolution happens at render time, so the same tree can be folded against
//! an amended table. A name missing from the table degrades to an in-page
//! anchor pair: `href="#<slug>"` with `id="back-to-<slug>"`, letting a
//! document link forward to a `[name]` occurrence elsewhere and back. It is
//! never an error.
//!
//! ## What the parser recognizes
//!
//! CommonMark plus the strikethrough extension and GitHub-style alerts
//! (`> [!NOTE]` and friends). Emphasis/strong marker characters, ordered
//! list delimiter style, and unordered bullet style are recovered from the
//! source text so a renderer can reproduce them.

use std::collections::HashMap;
use std::ops::Range;

use maud::{Markup, PreEscaped, html};
use pulldown_cmark::{
    BlockQuoteKind, BrokenLink, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options,
    Parser, Tag,
};

use crate::frontmatter::{self, MetadataError};
use crate::route;

// ============================================================================
// Document model
// ============================================================================

/// A parsed Markdown document: the block tree plus the reference table
/// collected from reference-style links and images.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub references: HashMap<String, Reference>,
}

/// Target of a reference definition, keyed by reference name in
/// [`Document::references`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub destination: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    HorizontalBreak,
    Heading { level: u8, content: Vec<Inline> },
    /// `info` is the first word of the fence info string (the language);
    /// `full_info` is the whole string. Indented and bare fenced blocks have
    /// neither.
    CodeBlock { info: Option<String>, full_info: Option<String>, text: String },
    HtmlBlock(String),
    Paragraph(Vec<Inline>),
    BlockQuote(Vec<Block>),
    Alert { level: AlertLevel, content: Vec<Block> },
    /// `items` holds the block children of each list item. Tight items are
    /// normalized to a single synthesized paragraph, so renderers never see
    /// bare inline children.
    OrderedList { items: Vec<Vec<Block>>, start: u64, style: OrderedStyle },
    UnorderedList { items: Vec<Vec<Block>>, style: UnorderedStyle },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    CodeSpan(String),
    Emphasis { marker: EmphasisMarker, content: Vec<Inline> },
    Strong { marker: EmphasisMarker, content: Vec<Inline> },
    StrikeThrough(Vec<Inline>),
    Link { content: Vec<Inline>, title: Option<String>, destination: Destination },
    Image { content: Vec<Inline>, title: Option<String>, destination: Destination },
    UriAutolink(String),
    EmailAutolink(String),
    HtmlInline(String),
    Text(String),
    HardBreak,
    SoftBreak,
}

/// Where a link or image points: directly at a URL, or at a named reference
/// resolved against [`Document::references`] at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Url(String),
    Reference(String),
}

/// GitHub-style alert kinds, parsed from `> [!NOTE]` blockquotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmphasisMarker {
    Star,
    Underscore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedStyle {
    /// `1.`
    Dot,
    /// `1)`
    Paren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnorderedStyle {
    Dash,
    Star,
    Plus,
}

// ============================================================================
// Parsing: event stream → tree
// ============================================================================

impl Document {
    /// Parse Markdown into a tree. Parsing never fails; anything the parser
    /// does not recognize comes through as literal text.
    pub fn parse(text: &str) -> Document {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_GFM;
        let parser = Parser::new_with_broken_link_callback(text, options, Some(keep_broken_links));
        let mut events = parser.into_offset_iter();
        let mut builder = TreeBuilder { source: text, references: HashMap::new() };
        let blocks = builder.collect_blocks(&mut events);
        Document { blocks, references: builder.references }
    }
}

/// Keep unresolved reference links in the event stream instead of dropping
/// them to literal text. They surface as `LinkType::*Unknown` events and end
/// up as [`Destination::Reference`] nodes with no table entry.
fn keep_broken_links<'a>(_link: BrokenLink<'a>) -> Option<(CowStr<'a>, CowStr<'a>)> {
    Some((CowStr::Borrowed(""), CowStr::Borrowed("")))
}

struct TreeBuilder<'a> {
    source: &'a str,
    references: HashMap<String, Reference>,
}

type Spanned<'a> = (Event<'a>, Range<usize>);

impl<'a> TreeBuilder<'a> {
    /// Collect blocks until the enclosing container ends (or the stream runs
    /// out). Loose inline events, as pulldown emits for tight list items,
    /// accumulate into a synthesized paragraph.
    fn collect_blocks<I>(&mut self, events: &mut I) -> Vec<Block>
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let mut blocks = Vec::new();
        let mut pending: Vec<Inline> = Vec::new();
        while let Some((event, range)) = events.next() {
            match event {
                Event::Start(tag) => match tag {
                    Tag::Paragraph => {
                        flush(&mut pending, &mut blocks);
                        blocks.push(Block::Paragraph(self.collect_inlines(events)));
                    }
                    Tag::Heading { level, .. } => {
                        flush(&mut pending, &mut blocks);
                        blocks.push(Block::Heading {
                            level: heading_level(level),
                            content: self.collect_inlines(events),
                        });
                    }
                    Tag::BlockQuote(kind) => {
                        flush(&mut pending, &mut blocks);
                        let content = self.collect_blocks(events);
                        blocks.push(match kind {
                            Some(kind) => Block::Alert { level: alert_level(kind), content },
                            None => Block::BlockQuote(content),
                        });
                    }
                    Tag::CodeBlock(kind) => {
                        flush(&mut pending, &mut blocks);
                        blocks.push(self.code_block(kind, events));
                    }
                    Tag::HtmlBlock => {
                        flush(&mut pending, &mut blocks);
                        blocks.push(Block::HtmlBlock(self.html_block(events)));
                    }
                    Tag::List(start) => {
                        flush(&mut pending, &mut blocks);
                        blocks.push(self.list(start, range.start, events));
                    }
                    Tag::Item => {
                        // Items normally arrive inside a list scope; recover
                        // by splicing the content in place.
                        flush(&mut pending, &mut blocks);
                        let mut item = self.collect_blocks(events);
                        blocks.append(&mut item);
                    }
                    tag @ (Tag::Emphasis
                    | Tag::Strong
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. }) => {
                        if let Some(node) = self.inline_container(tag, range.start, events) {
                            pending.push(node);
                        }
                    }
                    _ => self.skip_container(events),
                },
                Event::End(_) => {
                    flush(&mut pending, &mut blocks);
                    return blocks;
                }
                Event::Rule => {
                    flush(&mut pending, &mut blocks);
                    blocks.push(Block::HorizontalBreak);
                }
                other => self.push_inline(&mut pending, other),
            }
        }
        flush(&mut pending, &mut blocks);
        blocks
    }

    /// Collect inline nodes until the enclosing container's end event, which
    /// is consumed.
    fn collect_inlines<I>(&mut self, events: &mut I) -> Vec<Inline>
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let mut inlines = Vec::new();
        while let Some((event, range)) = events.next() {
            match event {
                Event::End(_) => break,
                Event::Start(tag) => {
                    if let Some(node) = self.inline_container(tag, range.start, events) {
                        inlines.push(node);
                    }
                }
                other => self.push_inline(&mut inlines, other),
            }
        }
        inlines
    }

    fn push_inline(&mut self, out: &mut Vec<Inline>, event: Event<'a>) {
        match event {
            Event::Text(text) => push_text(out, &text),
            Event::Code(code) => out.push(Inline::CodeSpan(code.to_string())),
            Event::Html(html) | Event::InlineHtml(html) => {
                out.push(Inline::HtmlInline(html.to_string()));
            }
            Event::SoftBreak => out.push(Inline::SoftBreak),
            Event::HardBreak => out.push(Inline::HardBreak),
            _ => {}
        }
    }

    fn inline_container<I>(&mut self, tag: Tag<'a>, at: usize, events: &mut I) -> Option<Inline>
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        match tag {
            Tag::Emphasis => Some(Inline::Emphasis {
                marker: self.emphasis_marker(at),
                content: self.collect_inlines(events),
            }),
            Tag::Strong => Some(Inline::Strong {
                marker: self.emphasis_marker(at),
                content: self.collect_inlines(events),
            }),
            Tag::Strikethrough => Some(Inline::StrikeThrough(self.collect_inlines(events))),
            Tag::Link { link_type, dest_url, title, id } => {
                let content = self.collect_inlines(events);
                Some(match link_type {
                    // Autolinks carry their text as their only child.
                    LinkType::Autolink => Inline::UriAutolink(text_content(&content)),
                    LinkType::Email => Inline::EmailAutolink(text_content(&content)),
                    _ => Inline::Link {
                        content,
                        title: non_empty(&title),
                        destination: self.destination(link_type, &dest_url, &title, &id),
                    },
                })
            }
            Tag::Image { link_type, dest_url, title, id } => {
                let content = self.collect_inlines(events);
                Some(Inline::Image {
                    content,
                    title: non_empty(&title),
                    destination: self.destination(link_type, &dest_url, &title, &id),
                })
            }
            _ => {
                self.skip_container(events);
                None
            }
        }
    }

    /// Record resolved reference-style targets in the table; point the node
    /// at the reference name either way.
    fn destination(
        &mut self,
        link_type: LinkType,
        dest_url: &str,
        title: &str,
        id: &str,
    ) -> Destination {
        match link_type {
            LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut => {
                self.references.insert(
                    id.to_string(),
                    Reference { destination: dest_url.to_string(), title: non_empty(title) },
                );
                Destination::Reference(id.to_string())
            }
            LinkType::ReferenceUnknown
            | LinkType::CollapsedUnknown
            | LinkType::ShortcutUnknown => Destination::Reference(id.to_string()),
            _ => Destination::Url(dest_url.to_string()),
        }
    }

    fn code_block<I>(&mut self, kind: CodeBlockKind<'a>, events: &mut I) -> Block
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let (info, full_info) = match kind {
            CodeBlockKind::Fenced(info) if !info.is_empty() => {
                let full = info.to_string();
                let first = full.split_whitespace().next().unwrap_or("").to_string();
                (Some(first), Some(full))
            }
            _ => (None, None),
        };
        let mut text = String::new();
        for (event, _) in events.by_ref() {
            match event {
                Event::Text(chunk) => text.push_str(&chunk),
                Event::End(_) => break,
                _ => {}
            }
        }
        Block::CodeBlock { info, full_info, text }
    }

    fn html_block<I>(&mut self, events: &mut I) -> String
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let mut text = String::new();
        for (event, _) in events.by_ref() {
            match event {
                Event::Html(chunk) | Event::Text(chunk) => text.push_str(&chunk),
                Event::End(_) => break,
                _ => {}
            }
        }
        text
    }

    fn list<I>(&mut self, start: Option<u64>, at: usize, events: &mut I) -> Block
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let mut items = Vec::new();
        while let Some((event, _)) = events.next() {
            match event {
                Event::Start(Tag::Item) => items.push(self.collect_blocks(events)),
                Event::End(_) => break,
                _ => {}
            }
        }
        match start {
            Some(start) => {
                Block::OrderedList { items, start, style: self.ordered_style(at) }
            }
            None => Block::UnorderedList { items, style: self.unordered_style(at) },
        }
    }

    /// Consume a container this dialect does not represent, children and
    /// all.
    fn skip_container<I>(&mut self, events: &mut I)
    where
        I: Iterator<Item = Spanned<'a>>,
    {
        let mut depth = 1usize;
        for (event, _) in events.by_ref() {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    // The event stream does not say which marker character the author used,
    // but the span offsets point straight at it.

    fn emphasis_marker(&self, at: usize) -> EmphasisMarker {
        match self.source.as_bytes().get(at) {
            Some(b'_') => EmphasisMarker::Underscore,
            _ => EmphasisMarker::Star,
        }
    }

    fn unordered_style(&self, at: usize) -> UnorderedStyle {
        match self.source.as_bytes().get(self.skip_indent(at)) {
            Some(b'*') => UnorderedStyle::Star,
            Some(b'+') => UnorderedStyle::Plus,
            _ => UnorderedStyle::Dash,
        }
    }

    fn ordered_style(&self, at: usize) -> OrderedStyle {
        let bytes = self.source.as_bytes();
        let mut pos = self.skip_indent(at);
        while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(b')') => OrderedStyle::Paren,
            _ => OrderedStyle::Dot,
        }
    }

    /// Nested list spans can open on the item's indentation rather than its
    /// marker.
    fn skip_indent(&self, at: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut pos = at;
        while bytes.get(pos).is_some_and(|b| *b == b' ' || *b == b'\t') {
            pos += 1;
        }
        pos
    }
}

fn flush(pending: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
    if !pending.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(pending)));
    }
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() { None } else { Some(text.to_string()) }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alert_level(kind: BlockQuoteKind) -> AlertLevel {
    match kind {
        BlockQuoteKind::Note => AlertLevel::Note,
        BlockQuoteKind::Tip => AlertLevel::Tip,
        BlockQuoteKind::Important => AlertLevel::Important,
        BlockQuoteKind::Warning => AlertLevel::Warning,
        BlockQuoteKind::Caution => AlertLevel::Caution,
    }
}

// ============================================================================
// Rendering: tree → Vec<V>
// ============================================================================

/// A resolved link or image target, handed to the [`Renderer`] callbacks.
///
/// `id` is populated only when a reference could not be resolved: the target
/// becomes the `#<slug>` anchor and the element itself carries
/// `back-to-<slug>` so the two ends can point at each other.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTarget {
    pub href: String,
    pub title: Option<String>,
    pub id: Option<String>,
}

/// One callback per node kind. Children arrive already rendered, in source
/// order; string payloads arrive borrowed.
///
/// There is no partial table: constructing a `Renderer` spells out every
/// variant, so adding a node kind to the dialect is a compile error in every
/// renderer until it decides what to do.
pub struct Renderer<V> {
    pub horizontal_break: Box<dyn Fn() -> V>,
    pub heading: Box<dyn Fn(u8, Vec<V>) -> V>,
    /// `(info, full_info, text)` as on [`Block::CodeBlock`].
    pub code_block: Box<dyn Fn(Option<&str>, Option<&str>, &str) -> V>,
    pub html_block: Box<dyn Fn(&str) -> V>,
    pub paragraph: Box<dyn Fn(Vec<V>) -> V>,
    pub block_quote: Box<dyn Fn(Vec<V>) -> V>,
    pub alert: Box<dyn Fn(AlertLevel, Vec<V>) -> V>,
    /// `(items, start, style)`; each element of `items` is a fully rendered
    /// list item.
    pub ordered_list: Box<dyn Fn(Vec<V>, u64, OrderedStyle) -> V>,
    pub unordered_list: Box<dyn Fn(Vec<V>, UnorderedStyle) -> V>,
    pub list_item: Box<dyn Fn(Vec<V>) -> V>,
    pub code_span: Box<dyn Fn(&str) -> V>,
    pub emphasis: Box<dyn Fn(EmphasisMarker, Vec<V>) -> V>,
    pub strong: Box<dyn Fn(EmphasisMarker, Vec<V>) -> V>,
    pub strike_through: Box<dyn Fn(Vec<V>) -> V>,
    pub link: Box<dyn Fn(&LinkTarget, Vec<V>) -> V>,
    /// `(target, alt)`; alt text is the flattened content.
    pub image: Box<dyn Fn(&LinkTarget, &str) -> V>,
    pub uri_autolink: Box<dyn Fn(&str) -> V>,
    pub email_autolink: Box<dyn Fn(&str) -> V>,
    pub html_inline: Box<dyn Fn(&str) -> V>,
    pub text: Box<dyn Fn(&str) -> V>,
    pub hard_break: Box<dyn Fn() -> V>,
    pub soft_break: Box<dyn Fn() -> V>,
}

/// Strip frontmatter, parse, and fold in one call.
///
/// Frontmatter is only stripped here, never parsed; a document whose
/// frontmatter is malformed TOML still renders.
pub fn render<V>(document: &str, renderer: &Renderer<V>) -> Vec<V> {
    let document = Document::parse(frontmatter::content(document));
    render_document(&document, renderer)
}

/// Like [`render`], but parse the frontmatter first and let the caller build
/// the renderer from it. A document without frontmatter yields an empty
/// table.
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
    document
        .blocks
        .iter()
        .map(|block| render_block(block, &document.references, renderer))
        .collect()
}

fn render_block<V>(
    block: &Block,
    references: &HashMap<String, Reference>,
    renderer: &Renderer<V>,
) -> V {
    let blocks = |content: &Vec<Block>| -> Vec<V> {
        content.iter().map(|b| render_block(b, references, renderer)).collect()
    };
    match block {
        Block::HorizontalBreak => (renderer.horizontal_break)(),
        Block::Heading { level, content } => {
            (renderer.heading)(*level, render_inlines(content, references, renderer))
        }
        Block::CodeBlock { info, full_info, text } => {
            (renderer.code_block)(info.as_deref(), full_info.as_deref(), text)
        }
        Block::HtmlBlock(html) => (renderer.html_block)(html),
        Block::Paragraph(content) => {
            (renderer.paragraph)(render_inlines(content, references, renderer))
        }
        Block::BlockQuote(content) => (renderer.block_quote)(blocks(content)),
        Block::Alert { level, content } => (renderer.alert)(*level, blocks(content)),
        Block::OrderedList { items, start, style } => {
            let items = items.iter().map(|item| (renderer.list_item)(blocks(item))).collect();
            (renderer.ordered_list)(items, *start, *style)
        }
        Block::UnorderedList { items, style } => {
            let items = items.iter().map(|item| (renderer.list_item)(blocks(item))).collect();
            (renderer.unordered_list)(items, *style)
        }
    }
}

fn render_inlines<V>(
    content: &[Inline],
    references: &HashMap<String, Reference>,
    renderer: &Renderer<V>,
) -> Vec<V> {
    content.iter().map(|inline| render_inline(inline, references, renderer)).collect()
}

fn render_inline<V>(
    inline: &Inline,
    references: &HashMap<String, Reference>,
    renderer: &Renderer<V>,
) -> V {
    match inline {
        Inline::CodeSpan(code) => (renderer.code_span)(code),
        Inline::Emphasis { marker, content } => {
            (renderer.emphasis)(*marker, render_inlines(content, references, renderer))
        }
        Inline::Strong { marker, content } => {
            (renderer.strong)(*marker, render_inlines(content, references, renderer))
        }
        Inline::StrikeThrough(content) => {
            (renderer.strike_through)(render_inlines(content, references, renderer))
        }
        Inline::Link { content, title, destination } => {
            let target = resolve(destination, title.as_deref(), references);
            (renderer.link)(&target, render_inlines(content, references, renderer))
        }
        Inline::Image { content, title, destination } => {
            let target = resolve(destination, title.as_deref(), references);
            (renderer.image)(&target, &text_content(content))
        }
        Inline::UriAutolink(url) => (renderer.uri_autolink)(url),
        Inline::EmailAutolink(address) => (renderer.email_autolink)(address),
        Inline::HtmlInline(html) => (renderer.html_inline)(html),
        Inline::Text(text) => (renderer.text)(text),
        Inline::HardBreak => (renderer.hard_break)(),
        Inline::SoftBreak => (renderer.soft_break)(),
    }
}

fn resolve(
    destination: &Destination,
    title: Option<&str>,
    references: &HashMap<String, Reference>,
) -> LinkTarget {
    match destination {
        Destination::Url(url) => LinkTarget {
            href: url.clone(),
            title: title.map(str::to_string),
            id: None,
        },
        Destination::Reference(name) => match references.get(name) {
            Some(reference) => LinkTarget {
                href: reference.destination.clone(),
                title: reference.title.clone(),
                id: None,
            },
            None => {
                let slug = route::slug(name);
                LinkTarget {
                    href: format!("#{slug}"),
                    title: None,
                    id: Some(format!("back-to-{slug}")),
                }
            }
        },
    }
}

/// Flatten inline nodes to their readable text: structure is dropped,
/// images contribute their alt text, breaks become single spaces.
pub fn text_content(content: &[Inline]) -> String {
    let mut out = String::new();
    push_text_content(content, &mut out);
    out
}

fn push_text_content(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(text) | Inline::CodeSpan(text) => out.push_str(text),
            Inline::Emphasis { content, .. }
            | Inline::Strong { content, .. }
            | Inline::StrikeThrough(content)
            | Inline::Link { content, .. }
            | Inline::Image { content, .. } => push_text_content(content, out),
            Inline::UriAutolink(text) | Inline::EmailAutolink(text) => out.push_str(text),
            Inline::HardBreak | Inline::SoftBreak => out.push(' '),
            Inline::HtmlInline(_) => {}
        }
    }
}

// ============================================================================
// Default HTML renderer
// ============================================================================

/// Plain semantic HTML via [`maud`]. Marker styles are accepted and ignored;
/// unresolved references come out as the documented anchor pair.
pub fn default_renderer() -> Renderer<Markup> {
    Renderer {
        horizontal_break: Box::new(|| html! { hr; }),
        heading: Box::new(|level, content| {
            let content = fragment(content);
            match level {
                1 => html! { h1 { (content) } },
                2 => html! { h2 { (content) } },
                3 => html! { h3 { (content) } },
                4 => html! { h4 { (content) } },
                5 => html! { h5 { (content) } },
                _ => html! { h6 { (content) } },
            }
        }),
        code_block: Box::new(|info, _full_info, text| match info {
            Some(language) => html! {
                pre { code class={ "language-" (language) } { (text) } }
            },
            None => html! { pre { code { (text) } } },
        }),
        html_block: Box::new(|html| PreEscaped(html.to_string())),
        paragraph: Box::new(|content| html! { p { (fragment(content)) } }),
        block_quote: Box::new(|content| html! { blockquote { (fragment(content)) } }),
        alert: Box::new(|level, content| {
            let class = match level {
                AlertLevel::Note => "alert-note",
                AlertLevel::Tip => "alert-tip",
                AlertLevel::Important => "alert-important",
                AlertLevel::Warning => "alert-warning",
                AlertLevel::Caution => "alert-caution",
            };
            html! { blockquote class=(class) { (fragment(content)) } }
        }),
        ordered_list: Box::new(|items, start, _style| {
            let start = (start != 1).then_some(start);
            html! { ol start=[start] { (fragment(items)) } }
        }),
        unordered_list: Box::new(|items, _style| html! { ul { (fragment(items)) } }),
        list_item: Box::new(|content| html! { li { (fragment(content)) } }),
        code_span: Box::new(|code| html! { code { (code) } }),
        emphasis: Box::new(|_marker, content| html! { em { (fragment(content)) } }),
        strong: Box::new(|_marker, content| html! { strong { (fragment(content)) } }),
        strike_through: Box::new(|content| html! { s { (fragment(content)) } }),
        link: Box::new(|target, content| {
            html! {
                a href=(target.href)
                    title=[target.title.as_deref()]
                    id=[target.id.as_deref()] {
                    (fragment(content))
                }
            }
        }),
        image: Box::new(|target, alt| {
            html! {
                img src=(target.href)
                    alt=(alt)
                    title=[target.title.as_deref()]
                    id=[target.id.as_deref()];
            }
        }),
        uri_autolink: Box::new(|url| html! { a href=(url) { (url) } }),
        email_autolink: Box::new(|address| {
            html! { a href={ "mailto:" (address) } { (address) } }
        }),
        html_inline: Box::new(|html| PreEscaped(html.to_string())),
        text: Box::new(|text| html! { (text) }),
        hard_break: Box::new(|| html! { br; }),
        soft_break: Box::new(|| html! { "\n" }),
    }
}

fn fragment(children: Vec<Markup>) -> Markup {
    html! {
        @for child in children { (child) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_blocks(text: &str) -> Vec<Block> {
        Document::parse(text).blocks
    }

    fn to_html(text: &str) -> String {
        render(text, &default_renderer())
            .into_iter()
            .map(|markup| markup.into_string())
            .collect()
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn paragraph_with_merged_text() {
        let blocks = parse_blocks("Hello world");
        assert_eq!(blocks, vec![Block::Paragraph(vec![Inline::Text("Hello world".into())])]);
    }

    #[test]
    fn heading_levels() {
        let blocks = parse_blocks("# One\n\n### Three");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, content: vec![Inline::Text("One".into())] },
                Block::Heading { level: 3, content: vec![Inline::Text("Three".into())] },
            ]
        );
    }

    #[test]
    fn emphasis_markers_are_recovered_from_source() {
        let blocks = parse_blocks("*star* and _underscore_");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[0],
            Inline::Emphasis {
                marker: EmphasisMarker::Star,
                content: vec![Inline::Text("star".into())],
            }
        );
        assert_eq!(
            content[2],
            Inline::Emphasis {
                marker: EmphasisMarker::Underscore,
                content: vec![Inline::Text("underscore".into())],
            }
        );
    }

    #[test]
    fn strong_with_underscore_marker() {
        let blocks = parse_blocks("__bold__");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[0],
            Inline::Strong {
                marker: EmphasisMarker::Underscore,
                content: vec![Inline::Text("bold".into())],
            }
        );
    }

    #[test]
    fn strikethrough() {
        let blocks = parse_blocks("~~gone~~");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(content[0], Inline::StrikeThrough(vec![Inline::Text("gone".into())]));
    }

    #[test]
    fn code_span_and_breaks() {
        let blocks = parse_blocks("a `code` b\nc");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content,
            &vec![
                Inline::Text("a ".into()),
                Inline::CodeSpan("code".into()),
                Inline::Text(" b".into()),
                Inline::SoftBreak,
                Inline::Text("c".into()),
            ]
        );
    }

    #[test]
    fn hard_break() {
        let blocks = parse_blocks("a\\\nb");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(content[1], Inline::HardBreak);
    }

    #[test]
    fn fenced_code_block_info_words() {
        let blocks = parse_blocks("```rust no_run\nfn main() {}\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                info: Some("rust".into()),
                full_info: Some("rust no_run".into()),
                text: "fn main() {}\n".into(),
            }]
        );
    }

    #[test]
    fn bare_fence_has_no_info() {
        let blocks = parse_blocks("```\nplain\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock { info: None, full_info: None, text: "plain\n".into() }]
        );
    }

    #[test]
    fn indented_code_block_has_no_info() {
        let blocks = parse_blocks("    indented\n");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock { info: None, full_info: None, text: "indented\n".into() }]
        );
    }

    #[test]
    fn horizontal_break() {
        assert_eq!(parse_blocks("---"), vec![Block::HorizontalBreak]);
    }

    #[test]
    fn block_quote_nests_blocks() {
        let blocks = parse_blocks("> quoted\n>\n> more");
        assert_eq!(
            blocks,
            vec![Block::BlockQuote(vec![
                Block::Paragraph(vec![Inline::Text("quoted".into())]),
                Block::Paragraph(vec![Inline::Text("more".into())]),
            ])]
        );
    }

    #[test]
    fn alert_blockquotes() {
        let blocks = parse_blocks("> [!WARNING]\n> Mind the gap");
        assert_eq!(
            blocks,
            vec![Block::Alert {
                level: AlertLevel::Warning,
                content: vec![Block::Paragraph(vec![Inline::Text("Mind the gap".into())])],
            }]
        );
    }

    #[test]
    fn html_block_kept_verbatim() {
        let blocks = parse_blocks("<div>\nraw\n</div>");
        assert_eq!(blocks, vec![Block::HtmlBlock("<div>\nraw\n</div>".into())]);
    }

    #[test]
    fn inline_html_kept_verbatim() {
        let blocks = parse_blocks("before <b>bold</b> after");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(content[1], Inline::HtmlInline("<b>".into()));
    }

    #[test]
    fn tight_list_items_become_synthesized_paragraphs() {
        let blocks = parse_blocks("- one\n- two\n");
        assert_eq!(
            blocks,
            vec![Block::UnorderedList {
                items: vec![
                    vec![Block::Paragraph(vec![Inline::Text("one".into())])],
                    vec![Block::Paragraph(vec![Inline::Text("two".into())])],
                ],
                style: UnorderedStyle::Dash,
            }]
        );
    }

    #[test]
    fn unordered_marker_styles() {
        let star = parse_blocks("* a\n* b\n");
        let plus = parse_blocks("+ a\n+ b\n");
        assert!(matches!(star[0], Block::UnorderedList { style: UnorderedStyle::Star, .. }));
        assert!(matches!(plus[0], Block::UnorderedList { style: UnorderedStyle::Plus, .. }));
    }

    #[test]
    fn ordered_list_start_and_delimiter() {
        let blocks = parse_blocks("3) three\n4) four\n");
        assert!(matches!(
            blocks[0],
            Block::OrderedList { start: 3, style: OrderedStyle::Paren, .. }
        ));
        let blocks = parse_blocks("1. one\n2. two\n");
        assert!(matches!(blocks[0], Block::OrderedList { start: 1, style: OrderedStyle::Dot, .. }));
    }

    #[test]
    fn nested_list_inside_item() {
        let blocks = parse_blocks("- outer\n  - inner\n");
        let Block::UnorderedList { items, .. } = &blocks[0] else { panic!("expected list") };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0][0], Block::Paragraph(vec![Inline::Text("outer".into())]));
        assert!(matches!(items[0][1], Block::UnorderedList { .. }));
    }

    #[test]
    fn inline_link_with_title() {
        let blocks = parse_blocks("[text](https://example.com \"Title\")");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[0],
            Inline::Link {
                content: vec![Inline::Text("text".into())],
                title: Some("Title".into()),
                destination: Destination::Url("https://example.com".into()),
            }
        );
    }

    #[test]
    fn resolved_reference_link_populates_table() {
        let document = Document::parse("[docs][ref]\n\n[ref]: /docs \"The docs\"\n");
        let Block::Paragraph(content) = &document.blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[0],
            Inline::Link {
                content: vec![Inline::Text("docs".into())],
                title: Some("The docs".into()),
                destination: Destination::Reference("ref".into()),
            }
        );
        assert_eq!(
            document.references["ref"],
            Reference { destination: "/docs".into(), title: Some("The docs".into()) }
        );
    }

    #[test]
    fn unresolved_reference_survives_as_reference() {
        let document = Document::parse("See [chapter two][] for more.");
        let Block::Paragraph(content) = &document.blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[1],
            Inline::Link {
                content: vec![Inline::Text("chapter two".into())],
                title: None,
                destination: Destination::Reference("chapter two".into()),
            }
        );
        assert!(document.references.is_empty());
    }

    #[test]
    fn autolinks_classified_by_kind() {
        let blocks = parse_blocks("<https://example.com> <user@example.com>");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(content[0], Inline::UriAutolink("https://example.com".into()));
        assert_eq!(content[2], Inline::EmailAutolink("user@example.com".into()));
    }

    #[test]
    fn reference_image() {
        let document = Document::parse("![alt][pic]\n\n[pic]: /a.png\n");
        let Block::Paragraph(content) = &document.blocks[0] else { panic!("expected paragraph") };
        assert_eq!(
            content[0],
            Inline::Image {
                content: vec![Inline::Text("alt".into())],
                title: None,
                destination: Destination::Reference("pic".into()),
            }
        );
        assert_eq!(document.references["pic"].destination, "/a.png");
    }

    // ========================================================================
    // text_content
    // ========================================================================

    #[test]
    fn text_content_flattens_nested_structure() {
        let blocks = parse_blocks("plain *em __deep__* `code`");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(text_content(content), "plain em deep code");
    }

    #[test]
    fn text_content_uses_image_alt() {
        let blocks = parse_blocks("see ![a chart](/c.png) here");
        let Block::Paragraph(content) = &blocks[0] else { panic!("expected paragraph") };
        assert_eq!(text_content(content), "see a chart here");
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    #[test]
    fn default_renderer_basic_blocks() {
        let html = to_html("# Title\n\nSome *emphasis* here.");
        assert_eq!(html, "<h1>Title</h1><p>Some <em>emphasis</em> here.</p>");
    }

    #[test]
    fn default_renderer_escapes_text() {
        let html = to_html("a < b & c");
        assert_eq!(html, "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn default_renderer_code_block_language() {
        let html = to_html("```rust\nlet x = 1;\n```");
        assert_eq!(html, "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>");
    }

    #[test]
    fn default_renderer_resolves_reference_links() {
        let html = to_html("[docs][ref]\n\n[ref]: /docs\n");
        assert_eq!(html, "<p><a href=\"/docs\">docs</a></p>");
    }

    #[test]
    fn unresolved_reference_renders_anchor_pair() {
        let html = to_html("See [Chapter Two][].");
        assert_eq!(
            html,
            "<p>See <a href=\"#chapter-two\" id=\"back-to-chapter-two\">Chapter Two</a>.</p>"
        );
    }

    #[test]
    fn default_renderer_ordered_list_start() {
        let html = to_html("3. three\n4. four\n");
        assert_eq!(
            html,
            "<ol start=\"3\"><li><p>three</p></li><li><p>four</p></li></ol>"
        );
    }

    #[test]
    fn default_renderer_alert_class() {
        let html = to_html("> [!TIP]\n> Use a trailing slash");
        assert_eq!(
            html,
            "<blockquote class=\"alert-tip\"><p>Use a trailing slash</p></blockquote>"
        );
    }

    #[test]
    fn default_renderer_email_autolink() {
        let html = to_html("<user@example.com>");
        assert_eq!(
            html,
            "<p><a href=\"mailto:user@example.com\">user@example.com</a></p>"
        );
    }

    #[test]
    fn default_renderer_image_alt_is_flattened() {
        let html = to_html("![the *big* one](/pic.png)");
        assert_eq!(html, "<p><img src=\"/pic.png\" alt=\"the big one\"></p>");
    }

    // ========================================================================
    // Frontmatter-aware entry points
    // ========================================================================

    #[test]
    fn render_strips_frontmatter_without_parsing_it() {
        let html = to_html("---\nnot = = toml\n---\n# Body\n");
        assert_eq!(html, "<h1>Body</h1>");
    }

    #[test]
    fn render_with_metadata_builds_renderer_from_table() {
        let doc = "---\nprefix = \">> \"\n---\nhello\n";
        let rendered = render_with_metadata(doc, |metadata| {
            let prefix = metadata
                .get("prefix")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut renderer = string_renderer();
            renderer.text = Box::new(move |text| format!("{prefix}{text}"));
            renderer
        })
        .unwrap();
        assert_eq!(rendered, vec![">> hello".to_string()]);
    }

    #[test]
    fn render_with_metadata_reports_bad_toml() {
        let result = render_with_metadata("---\nnot = = toml\n---\nhello\n", |_| string_renderer());
        assert!(result.is_err());
    }

    // A minimal non-HTML renderer: flattens everything to plain strings.
    fn string_renderer() -> Renderer<String> {
        Renderer {
            horizontal_break: Box::new(String::new),
            heading: Box::new(|_, content| content.concat()),
            code_block: Box::new(|_, _, text| text.to_string()),
            html_block: Box::new(str::to_string),
            paragraph: Box::new(|content| content.concat()),
            block_quote: Box::new(|content| content.concat()),
            alert: Box::new(|_, content| content.concat()),
            ordered_list: Box::new(|items, _, _| items.concat()),
            unordered_list: Box::new(|items, _| items.concat()),
            list_item: Box::new(|content| content.concat()),
            code_span: Box::new(str::to_string),
            emphasis: Box::new(|_, content| content.concat()),
            strong: Box::new(|_, content| content.concat()),
            strike_through: Box::new(|content| content.concat()),
            link: Box::new(|_, content| content.concat()),
            image: Box::new(|_, alt| alt.to_string()),
            uri_autolink: Box::new(str::to_string),
            email_autolink: Box::new(str::to_string),
            html_inline: Box::new(str::to_string),
            text: Box::new(str::to_string),
            hard_break: Box::new(String::new),
            soft_break: Box::new(|| " ".to_string()),
        }
    }
}
