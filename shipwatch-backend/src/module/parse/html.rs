//! DOM extraction for vessel detail pages
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];
const BLOCK_TAGS: [&str; 22] = [
    "p", "div", "br", "tr", "li", "ul", "ol", "table", "section", "article", "header", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "dt", "dd", "dl", "form",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector")
}

fn clean_cell(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_cell(&element.text().collect::<String>())
}

/// Collect label/value pairs from tables, definition lists and
/// `data-label` cells, in document order per kind.
pub fn extract_pairs(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut pairs = Vec::new();

    let row_sel = selector("table tr");
    let cell_sel = selector("th, td");
    for tr in document.select(&row_sel) {
        let cells: Vec<String> = tr.select(&cell_sel).map(|c| element_text(&c)).collect();
        if cells.len() < 2 {
            continue;
        }
        push_pair(&mut pairs, &cells[0], &cells[cells.len() - 1]);
    }

    let dl_sel = selector("dl");
    for dl in document.select(&dl_sel) {
        let mut label: Option<String> = None;
        for child in dl.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "dt" => label = Some(element_text(&child)),
                "dd" => {
                    if let Some(l) = label.take() {
                        push_pair(&mut pairs, &l, &element_text(&child));
                    }
                }
                _ => {}
            }
        }
    }

    let labelled_sel = selector("[data-label]");
    for el in document.select(&labelled_sel) {
        if let Some(label) = el.value().attr("data-label") {
            push_pair(&mut pairs, label, &element_text(&el));
        }
    }

    pairs
}

/// Push a pair, splitting combined cells such as
/// `Course / Speed` = `123.4° / 12.3 kn` into two pairs.
fn push_pair(pairs: &mut Vec<(String, String)>, label: &str, value: &str) {
    let label = label.trim().trim_end_matches(':').trim();
    let value = value.trim();
    if label.is_empty() || value.is_empty() {
        return;
    }

    let labels: Vec<&str> = label.split('/').map(str::trim).collect();
    let values: Vec<&str> = value.split('/').map(str::trim).collect();
    if labels.len() > 1 && labels.len() == values.len() {
        for (l, v) in labels.into_iter().zip(values) {
            if !l.is_empty() && !v.is_empty() {
                pairs.push((l.to_string(), v.to_string()));
            }
        }
        return;
    }

    pairs.push((label.to_string(), value.to_string()));
}

/// Visible text of a document, one block per line, scripts and styles removed.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    walk(document.root_element(), &mut raw);

    raw.lines()
        .map(clean_cell)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if is_block {
                    out.push('\n');
                } else if name == "td" || name == "th" {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
