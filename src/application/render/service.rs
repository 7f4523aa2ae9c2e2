use std::{collections::HashSet, sync::Arc};

use ammonia::Builder as AmmoniaBuilder;
use tracing::debug;

use crate::domain::blocks::{Block, BlockTag, ListKind, Span};

use super::registry::{MarkContext, TransformRegistry};
use super::transforms::escape_text;
use super::types::{RenderOutput, RenderService};

const SOURCE: &str = "pressroom::render";

/// Renders block trees through a [`TransformRegistry`], then runs the result
/// through an HTML sanitizer.
pub struct BlockRenderer {
    registry: Arc<TransformRegistry>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl BlockRenderer {
    pub fn new(registry: TransformRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            sanitizer: build_sanitizer(),
        }
    }

    fn render_block(&self, block: &Block, unrecognized: &mut Vec<BlockTag>) -> String {
        let tag = block.tag();
        let inner = if block.is_text() {
            self.render_spans(block)
        } else {
            String::new()
        };

        if let Some(transform) = self.registry.block(&tag) {
            return transform(block, &inner);
        }

        debug!(
            target = SOURCE,
            tag = %tag,
            key = block.key.as_deref().unwrap_or_default(),
            "no transform registered; using fallback"
        );
        let html = if block.is_text() {
            format!("<p>{inner}</p>")
        } else {
            format!(
                "<div data-block-type=\"{}\"></div>",
                super::transforms::escape_attribute(tag.as_str())
            )
        };
        unrecognized.push(tag);
        html
    }

    fn render_spans(&self, block: &Block) -> String {
        block
            .children
            .iter()
            .map(|span| self.render_span(block, span))
            .collect()
    }

    fn render_span(&self, block: &Block, span: &Span) -> String {
        let mut html = escape_text(&span.text).replace('\n', "<br>");

        // The first mark ends up outermost.
        for mark in span.marks.iter().rev() {
            let ctx = MarkContext {
                mark,
                definition: block.mark_def(mark),
            };
            match self.registry.mark(ctx.kind()) {
                Some(transform) => html = transform(&ctx, &html),
                None => debug!(
                    target = SOURCE,
                    mark = ctx.kind(),
                    "no transform registered for mark; leaving text unmarked"
                ),
            }
        }

        html
    }
}

impl RenderService for BlockRenderer {
    fn render(&self, blocks: &[Block]) -> RenderOutput {
        let mut html = String::new();
        let mut unrecognized = Vec::new();
        let mut lists = ListStack::default();

        for block in blocks {
            match block.list_kind() {
                Some(kind) => {
                    let inner = self.render_spans(block);
                    lists.push_item(&mut html, kind, block.level.unwrap_or(1), &inner);
                }
                None => {
                    lists.close_all(&mut html);
                    html.push_str(&self.render_block(block, &mut unrecognized));
                }
            }
        }
        lists.close_all(&mut html);

        RenderOutput {
            html: self.sanitizer.clean(&html).to_string(),
            unrecognized,
        }
    }
}

/// Open lists, innermost last. Every open list has an unclosed `<li>`.
#[derive(Default)]
struct ListStack {
    open: Vec<ListKind>,
}

impl ListStack {
    fn push_item(&mut self, html: &mut String, kind: ListKind, level: u8, inner: &str) {
        let level = usize::from(level.max(1));

        while self.open.len() > level {
            self.close_one(html);
        }

        if self.open.len() == level {
            if self.open.last() == Some(&kind) {
                html.push_str("</li>");
            } else {
                self.close_one(html);
            }
        }

        while self.open.len() < level {
            html.push_str(list_open(kind));
            self.open.push(kind);
        }

        html.push_str("<li>");
        html.push_str(inner);
    }

    fn close_one(&mut self, html: &mut String) {
        if let Some(kind) = self.open.pop() {
            html.push_str("</li>");
            html.push_str(list_close(kind));
        }
    }

    fn close_all(&mut self, html: &mut String) {
        while !self.open.is_empty() {
            self.close_one(html);
        }
    }
}

fn list_open(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Bullet => "<ul>",
        ListKind::Number => "<ol>",
    }
}

fn list_close(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Bullet => "</ul>",
        ListKind::Number => "</ol>",
    }
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "img",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "span",
        "strong",
        "u",
        "ul",
    ]);
    builder.tags(tags);
    builder.add_generic_attributes(&["class"]);
    builder.add_generic_attribute_prefixes(&["data-"]);
    builder.add_tag_attributes("img", &["alt", "loading"]);
    builder.url_schemes(HashSet::from(["http", "https", "mailto"]));

    builder
}
