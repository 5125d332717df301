use std::fmt::Write;

use client_core::ListView;

/// One line per item, numbered from 1. Placeholders show `…saving`, items
/// with a delete in flight show `Deleting...`, and an item whose checkbox is
/// disabled shows `-` instead of its state.
pub fn render(view: &ListView) -> String {
    let mut out = String::new();
    if view.items.is_empty() {
        out.push_str(if view.loading {
            "  loading…\n"
        } else {
            "  (no todos)\n"
        });
    }
    for (index, todo) in view.items.iter().enumerate() {
        let checkbox = match (view.can_toggle(todo), todo.completed) {
            (false, _) => "[-]",
            (true, true) => "[x]",
            (true, false) => "[ ]",
        };
        let _ = write!(out, "{:>3}. {checkbox} {}", index + 1, todo.title);
        if todo.is_placeholder() {
            out.push_str("  …saving");
        } else if view.is_deleting(&todo.id) {
            out.push_str("  Deleting...");
        }
        out.push('\n');
    }
    if view.create_pending {
        out.push_str("  (adding…)\n");
    }
    out.pop();
    out
}
