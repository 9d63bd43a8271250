//! Side-by-side HTML context diff of the two source variants.

use similar::{DiffOp, DiffTag, TextDiff};

/// Unchanged lines kept around each change.
const CONTEXT_LINES: usize = 5;

/// Render a context table comparing `old` and `new` line by line.
///
/// Columns are line number and text for each side. Removed lines carry
/// `diff_sub`, added lines `diff_add` and lines replaced in place
/// `diff_chg`, matching the classes of the page diff style.
pub fn context_table(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();

    let mut table = String::from("<table class=\"diff\" summary=\"Legends\">\n");
    table.push_str(&format!(
        "    <thead><tr><th colspan=\"2\" class=\"diff_header\">{}</th>\
         <th colspan=\"2\" class=\"diff_header\">{}</th></tr></thead>\n",
        escape(old_label),
        escape(new_label)
    ));

    let groups = diff.grouped_ops(CONTEXT_LINES);
    if groups.is_empty() {
        table.push_str(
            "    <tbody><tr><td></td><td>No Differences Found</td>\
             <td></td><td>No Differences Found</td></tr></tbody>\n",
        );
    }

    for group in &groups {
        table.push_str("    <tbody>\n");
        for op in group {
            push_op(&mut table, op, old_lines, new_lines);
        }
        table.push_str("    </tbody>\n");
    }

    table.push_str("</table>");
    table
}

fn push_op(table: &mut String, op: &DiffOp, old_lines: &[&str], new_lines: &[&str]) {
    let old_range = op.old_range();
    let new_range = op.new_range();

    let (old_class, new_class) = match op.tag() {
        DiffTag::Equal => (None, None),
        DiffTag::Delete => (Some("diff_sub"), None),
        DiffTag::Insert => (None, Some("diff_add")),
        DiffTag::Replace => (Some("diff_chg"), Some("diff_chg")),
    };

    let rows = old_range.len().max(new_range.len());
    for offset in 0..rows {
        let old_index = old_range.start + offset;
        let new_index = new_range.start + offset;

        let left = (old_index < old_range.end).then(|| (old_index, old_lines[old_index]));
        let right = (new_index < new_range.end).then(|| (new_index, new_lines[new_index]));

        // Unpaired lines of a replacement are plain removals or additions.
        let (left_class, right_class) = match (left, right, op.tag()) {
            (Some(_), None, DiffTag::Replace) => (Some("diff_sub"), None),
            (None, Some(_), DiffTag::Replace) => (None, Some("diff_add")),
            _ => (old_class, new_class),
        };

        table.push_str("        <tr>");
        push_cells(table, left, left_class);
        push_cells(table, right, right_class);
        table.push_str("</tr>\n");
    }
}

fn push_cells(table: &mut String, line: Option<(usize, &str)>, class: Option<&str>) {
    match line {
        Some((index, text)) => {
            let text = escape(text.trim_end_matches(['\n', '\r']));
            let text = match class {
                Some(class) => format!("<span class=\"{}\">{}</span>", class, text),
                None => text,
            };
            table.push_str(&format!(
                "<td class=\"diff_header\">{}</td><td nowrap=\"nowrap\">{}</td>",
                index + 1,
                text
            ));
        }
        None => table.push_str("<td class=\"diff_header\"></td><td nowrap=\"nowrap\"></td>"),
    }
}

/// HTML-escape a source line, keeping its spacing visible.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace(' ', "&nbsp;")
}
