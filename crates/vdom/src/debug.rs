use crate::tree::{NodeId, NodeKind, VTree};
use crate::types::{Content, Value};
use std::collections::BTreeMap;
use std::fmt::Write;

pub fn first_styles(style: &BTreeMap<crate::types::Name, Value>) -> String {
    let mut out = String::new();
    for (i, (k, v)) in style.iter().take(3).enumerate() {
        if i != 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, "{k}: {};", v.to_text().as_deref().unwrap_or(""));
    }
    out
}

/// Indented one-line-per-node outline of a live tree, capped at `cap` nodes.
pub fn outline_from_tree(tree: &VTree, cap: usize) -> Vec<String> {
    struct IndentGuard<'a> {
        indent: &'a mut String,
        step: usize,
    }

    impl Drop for IndentGuard<'_> {
        fn drop(&mut self) {
            let new_len = self.indent.len() - self.step;
            self.indent.truncate(new_len);
        }
    }

    fn push_preview(out: &mut String, s: &str, max_chars: usize) {
        let mut truncated = false;
        for (i, ch) in s.chars().enumerate() {
            if i == max_chars {
                truncated = true;
                break;
            }
            out.push(if ch == '\n' { ' ' } else { ch });
        }
        if truncated {
            out.push('…');
        }
    }

    const INDENT_STEP: &str = "  ";
    const PREVIEW_CHARS: usize = 40;

    fn walk(
        tree: &VTree,
        id: NodeId,
        indent: &mut String,
        out: &mut Vec<String>,
        left: &mut usize,
    ) {
        if *left == 0 {
            return;
        }
        *left -= 1;
        let Some(node) = tree.get(id) else {
            out.push(format!("{indent}<stale {id}>"));
            return;
        };
        let mut line = String::with_capacity(indent.len() + 64);
        line.push_str(indent);
        match &node.kind {
            NodeKind::Root { child, .. } => {
                let _ = write!(line, "#root in {}", tree.container());
                out.push(line);
                indent.push_str(INDENT_STEP);
                let guard = IndentGuard {
                    indent,
                    step: INDENT_STEP.len(),
                };
                walk(tree, *child, &mut *guard.indent, out, left);
            }
            NodeKind::Component { desc, child } => {
                line.push('[');
                line.push_str(desc.component.name());
                if let Some(key) = &desc.key {
                    let _ = write!(line, " key={key}");
                }
                line.push(']');
                out.push(line);
                indent.push_str(INDENT_STEP);
                let guard = IndentGuard {
                    indent,
                    step: INDENT_STEP.len(),
                };
                walk(tree, *child, &mut *guard.indent, out, left);
            }
            NodeKind::Element { desc, children } => {
                line.push('<');
                line.push_str(&desc.tag);
                if let Some(key) = &desc.key {
                    let _ = write!(line, " key={key}");
                }
                if let Some(class) = &desc.class {
                    line.push_str(r#" class=""#);
                    line.push_str(class);
                    line.push('"');
                }
                line.push('>');
                let styl = first_styles(&desc.style);
                if !styl.is_empty() {
                    line.push_str("  /* ");
                    line.push_str(&styl);
                    line.push_str(" */");
                }
                if let Content::Text(text) = &desc.content {
                    line.push_str(" \"");
                    push_preview(&mut line, text.trim(), PREVIEW_CHARS);
                    line.push('"');
                }
                out.push(line);
                indent.push_str(INDENT_STEP);
                let guard = IndentGuard {
                    indent,
                    step: INDENT_STEP.len(),
                };
                for c in children {
                    walk(tree, *c, &mut *guard.indent, out, left);
                }
            }
            NodeKind::Placeholder => {
                line.push_str("<!-- placeholder -->");
                out.push(line);
            }
        }
    }

    let mut out = Vec::new();
    let mut indent = String::new();
    let mut left = cap;
    walk(tree, tree.root(), &mut indent, &mut out, &mut left);
    if left == 0 {
        out.push("…".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TargetId;
    use std::sync::Arc;

    #[test]
    fn outline_shows_tags_classes_and_text() {
        let mut tree = VTree::new(TargetId(1), TargetId(2));
        let mut li = crate::types::ElementDesc::new("li");
        li.class = Some(Arc::from("row"));
        li.content = Content::Text(Arc::from("  first row  "));
        let li = tree.alloc(
            NodeKind::Element {
                desc: Arc::new(li),
                children: Vec::new(),
            },
            TargetId(11),
        );
        let ul = tree.alloc(
            NodeKind::Element {
                desc: Arc::new(crate::types::ElementDesc::new("ul")),
                children: vec![li],
            },
            TargetId(10),
        );
        let root = tree.root();
        let placeholder = tree.slot_child(root).unwrap();
        tree.replace_child(root, 0, placeholder, ul).unwrap();

        let outline = outline_from_tree(&tree, 100);
        assert_eq!(
            outline,
            vec![
                "#root in t1".to_string(),
                "  <ul>".to_string(),
                "    <li class=\"row\"> \"first row\"".to_string(),
            ]
        );
    }

    #[test]
    fn outline_respects_the_cap() {
        let tree = VTree::new(TargetId(1), TargetId(2));
        let outline = outline_from_tree(&tree, 1);
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[1], "…");
    }
}
