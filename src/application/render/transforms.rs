//! Standard block and mark transforms.

use crate::domain::blocks::Block;
use crate::infra::images::ImageUrlBuilder;

use super::registry::{MarkContext, TransformRegistry};

pub(crate) fn install_defaults(registry: &mut TransformRegistry, images: ImageUrlBuilder) {
    registry.register_block("normal", |_block, inner| format!("<p>{inner}</p>"));

    // h1..h3 share one visual style.
    for tag in ["h1", "h2", "h3"] {
        registry.register_block(tag, |_block, inner| {
            format!("<h2 class=\"post-heading\">{inner}</h2>")
        });
    }
    for tag in ["h4", "h5", "h6"] {
        registry.register_block(tag, move |_block, inner| format!("<{tag}>{inner}</{tag}>"));
    }

    registry.register_block("blockquote", |_block, inner| {
        format!("<blockquote class=\"post-quote\">{inner}</blockquote>")
    });

    registry.register_block("image", move |block, _inner| image(&images, block));

    registry.register_block("code", |block, _inner| {
        let code = block.field_str("code").unwrap_or_default();
        match block.field_str("language").filter(|lang| !lang.is_empty()) {
            Some(language) => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_attribute(language),
                escape_text(code)
            ),
            None => format!("<pre><code>{}</code></pre>", escape_text(code)),
        }
    });

    registry.register_mark("link", link);
    registry.register_mark("strong", |_ctx, inner| format!("<strong>{inner}</strong>"));
    registry.register_mark("em", |_ctx, inner| format!("<em>{inner}</em>"));
    registry.register_mark("code", |_ctx, inner| format!("<code>{inner}</code>"));
    registry.register_mark("underline", |_ctx, inner| format!("<u>{inner}</u>"));
    registry.register_mark("strike-through", |_ctx, inner| format!("<s>{inner}</s>"));
}

fn image(images: &ImageUrlBuilder, block: &Block) -> String {
    let Some(src) = block.asset_ref().and_then(|asset| images.asset_url(asset)) else {
        return String::new();
    };
    let alt = block.field_str("alt").unwrap_or_default();

    let mut html = format!(
        "<figure class=\"post-image\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\">",
        escape_attribute(&src),
        escape_attribute(alt)
    );
    if let Some(caption) = block.field_str("caption").filter(|c| !c.is_empty()) {
        html.push_str("<figcaption>");
        html.push_str(&escape_text(caption));
        html.push_str("</figcaption>");
    }
    html.push_str("</figure>");
    html
}

/// Anchors keep their href and child text. Unsafe or missing hrefs render the
/// children as plain text.
fn link(ctx: &MarkContext<'_>, inner: &str) -> String {
    match ctx.definition.and_then(|def| def.href()).filter(|href| is_safe_href(href)) {
        Some(href) => format!(
            "<a href=\"{}\" class=\"post-link\">{inner}</a>",
            escape_attribute(href.trim())
        ),
        None => inner.to_string(),
    }
}

pub(crate) fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() {
        return false;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
    {
        return true;
    }

    // Relative: no scheme before the first path, query or fragment delimiter.
    let head = href.split(['/', '?', '#']).next().unwrap_or_default();
    !head.contains(':')
}

pub(crate) fn escape_text(value: &str) -> String {
    ammonia::clean_text(value)
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}
