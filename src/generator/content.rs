//! Content tree resolution for rich-text documents.
//!
//! `template` nodes hold a placeholder expression in `attrs.id`. Resolving a
//! tree turns each of them into a `text` node carrying the evaluated value.
//! The resolved tree holds plain text; HTML escaping happens in
//! [`render_html`].

use serde_json::{Map, Value};

use super::mustache;
use crate::models::ContentNode;

const TEMPLATE_NODE: &str = "template";
const TEXT_NODE: &str = "text";
const TEMPLATE_ATTRS: [&str; 2] = ["id", "label"];

/// Evaluates a placeholder expression (`{{tenant.name}}`) against `context`.
pub fn evaluate(expression: &str, context: &Value) -> String {
    mustache::render(expression, context)
}

/// Returns a copy of `node` with every `template` node replaced by text.
///
/// Children are resolved before their parent. Resolving an already resolved
/// tree returns it unchanged.
pub fn resolve_contents(node: &ContentNode, context: &Value) -> ContentNode {
    let content = node
        .content
        .as_ref()
        .map(|children| children.iter().map(|child| resolve_contents(child, context)).collect());

    if node.kind != TEMPLATE_NODE {
        return ContentNode {
            kind: node.kind.clone(),
            text: node.text.clone(),
            attrs: node.attrs.clone(),
            content,
            marks: node.marks.clone(),
        };
    }

    let mut text = node
        .attr_str("id")
        .map(|expression| evaluate(expression, context))
        .unwrap_or_default();
    // the editor rejects empty text nodes
    if text.is_empty() {
        text = " ".to_string();
    }

    ContentNode {
        kind: TEXT_NODE.to_string(),
        text: Some(text),
        attrs: strip_template_attrs(node.attrs.as_ref()),
        content,
        marks: node.marks.clone(),
    }
}

fn strip_template_attrs(attrs: Option<&Map<String, Value>>) -> Option<Map<String, Value>> {
    let mut attrs = attrs?.clone();
    for name in TEMPLATE_ATTRS {
        attrs.remove(name);
    }
    (!attrs.is_empty()).then_some(attrs)
}

/// Serializes a content tree to HTML. Every text value is escaped.
pub fn render_html(node: &ContentNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_children(node: &ContentNode, out: &mut String) {
    for child in node.content.iter().flatten() {
        write_node(child, out);
    }
}

fn write_block(tag: &str, node: &ContentNode, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    if let Some(align) = node.attr_str("textAlign").filter(|a| *a != "left") {
        out.push_str(" style=\"text-align: ");
        out.push_str(&tera::escape_html(align));
        out.push('"');
    }
    out.push('>');
    write_children(node, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_node(node: &ContentNode, out: &mut String) {
    match node.kind.as_str() {
        "doc" => write_children(node, out),
        "paragraph" => write_block("p", node, out),
        "heading" => {
            let level = node
                .attrs
                .as_ref()
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            write_block(&format!("h{}", level), node, out);
        }
        "bulletList" => write_block("ul", node, out),
        "orderedList" => write_block("ol", node, out),
        "listItem" => write_block("li", node, out),
        "blockquote" => write_block("blockquote", node, out),
        "table" => write_block("table", node, out),
        "tableRow" => write_block("tr", node, out),
        "tableHeader" => write_block("th", node, out),
        "tableCell" => write_block("td", node, out),
        "hardBreak" => out.push_str("<br>"),
        "horizontalRule" => out.push_str("<hr>"),
        TEXT_NODE | TEMPLATE_NODE => write_text(node, out),
        _ => write_children(node, out),
    }
}

fn write_text(node: &ContentNode, out: &mut String) {
    let text = match node.kind.as_str() {
        TEMPLATE_NODE => node.attr_str("label").unwrap_or_default(),
        _ => node.text.as_deref().unwrap_or_default(),
    };

    let marks: Vec<(String, String)> = node
        .marks
        .iter()
        .flatten()
        .filter_map(mark_tags)
        .collect();

    for (open, _) in &marks {
        out.push_str(open);
    }
    out.push_str(&tera::escape_html(text));
    for (_, close) in marks.iter().rev() {
        out.push_str(close);
    }
}

fn mark_tags(mark: &Value) -> Option<(String, String)> {
    let tag = match mark.get("type")?.as_str()? {
        "bold" => "strong",
        "italic" => "em",
        "underline" => "u",
        "strike" => "s",
        "code" => "code",
        "link" => {
            let href = mark
                .get("attrs")
                .and_then(|a| a.get("href"))
                .and_then(Value::as_str)
                .unwrap_or("#");
            return Some((
                format!("<a href=\"{}\">", tera::escape_html(href)),
                "</a>".to_string(),
            ));
        }
        _ => return None,
    };
    Some((format!("<{}>", tag), format!("</{}>", tag)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> ContentNode {
        serde_json::from_value(json!({
            "type": "doc",
            "content": [{
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "Dear "},
                    {"type": "template", "attrs": {"id": "{{tenant.name}}", "label": "Tenant name"}},
                    {"type": "text", "text": ", your rent is "},
                    {
                        "type": "template",
                        "attrs": {"id": "{{properties.total.rentAmount}}", "label": "Rent"},
                        "marks": [{"type": "bold"}]
                    },
                    {"type": "template", "attrs": {"id": "{{tenant.missing}}"}}
                ]
            }]
        }))
        .unwrap()
    }

    fn context() -> Value {
        json!({
            "tenant": {"name": "Jane O'Hara"},
            "properties": {"total": {"rentAmount": "$300.00"}}
        })
    }

    fn collect_kinds(node: &ContentNode, kinds: &mut Vec<String>) {
        kinds.push(node.kind.clone());
        for child in node.content.iter().flatten() {
            collect_kinds(child, kinds);
        }
    }

    #[test]
    fn test_template_nodes_become_text() {
        let resolved = resolve_contents(&tree(), &context());
        let paragraph = &resolved.content.as_ref().unwrap()[0];
        let children = paragraph.content.as_ref().unwrap();

        assert_eq!(children[1].kind, "text");
        assert_eq!(children[1].text.as_deref(), Some("Jane O'Hara"));
        assert!(children[1].attrs.is_none());
        assert_eq!(children[3].text.as_deref(), Some("$300.00"));
        assert_eq!(children[3].marks, Some(vec![json!({"type": "bold"})]));
        assert_eq!(children[4].text.as_deref(), Some(" "));

        let mut kinds = Vec::new();
        collect_kinds(&resolved, &mut kinds);
        assert!(!kinds.iter().any(|k| k == "template"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let ctx = context();
        let once = resolve_contents(&tree(), &ctx);
        let twice = resolve_contents(&once, &ctx);
        assert_eq!(once, twice);
        assert_eq!(ctx, context());
    }

    #[test]
    fn test_other_attributes_survive() {
        let node: ContentNode = serde_json::from_value(json!({
            "type": "template",
            "attrs": {"id": "{{tenant.name}}", "label": "x", "color": "red"}
        }))
        .unwrap();
        let resolved = resolve_contents(&node, &context());
        assert_eq!(resolved.attr_str("color"), Some("red"));
        assert_eq!(resolved.attr_str("id"), None);
    }

    #[test]
    fn test_render_html_escapes_values() {
        let ctx = json!({
            "tenant": {"name": "<script>alert('x')</script>"},
            "properties": {"total": {"rentAmount": "$300.00"}}
        });
        let html = render_html(&resolve_contents(&tree(), &ctx));

        assert!(html.starts_with("<p>Dear &lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<strong>$300.00</strong>"));
    }

    #[test]
    fn test_render_html_structure() {
        let node: ContentNode = serde_json::from_value(json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2, "textAlign": "center"},
                 "content": [{"type": "text", "text": "Lease"}]},
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "one"}]}
                    ]}
                ]},
                {"type": "hardBreak"}
            ]
        }))
        .unwrap();

        assert_eq!(
            render_html(&node),
            "<h2 style=\"text-align: center\">Lease</h2><ul><li><p>one</p></li></ul><br>"
        );
    }
}
