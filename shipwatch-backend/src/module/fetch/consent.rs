//! Cookie/consent banner dismissal for the browser strategy.
//!
//! Three passes, most specific first: the Funding Choices dialog
//! (`fc-dialog-container`), generic consent widgets, then a text scan over
//! every clickable element. Not finding a banner is not an error.

use headless_chrome::Tab;
use regex::Regex;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

const FC_DIALOG: &str = ".fc-dialog-container";

const FC_SELECTORS: [&str; 7] = [
    ".fc-dialog-container button.fc-cta-consent",
    ".fc-dialog-container button.fc-primary-button",
    ".fc-dialog-container button.fc-button",
    ".fc-dialog-container button",
    ".fc-dialog-container input[type='button']",
    ".fc-dialog-container input[type='submit']",
    ".fc-dialog-container [role='button']",
];

const GENERIC_SELECTORS: [&str; 6] = [
    ".consent-agree",
    ".cookie-accept",
    ".gdpr-accept",
    ".privacy-accept",
    "#onetrust-accept-btn-handler",
    "button[mode='primary']",
];

const CLICKABLE: &str =
    "button, input[type='button'], input[type='submit'], [onclick], [role='button'], a[href^='#']";

/// Longer labels are page content, not a button.
const MAX_LABEL_LEN: usize = 40;

static CONSENT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(agree|accept|consent|allow|continue|ok)\b").expect("consent keyword pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ConsentOutcome {
    /// Clicked inside the Funding Choices dialog
    Dialog(String),
    /// Clicked a generic consent widget
    Generic(String),
    /// Clicked an element found by its label
    Keyword(String),
    NotFound,
}

/// Short, non-empty text that can be a control's caption
pub fn is_button_label(label: &str) -> bool {
    let label = label.trim();
    !label.is_empty() && label.chars().count() <= MAX_LABEL_LEN
}

/// Whether a button label reads like a consent action
pub fn is_consent_label(label: &str) -> bool {
    is_button_label(label) && CONSENT_LABEL.is_match(label)
}

/// Index of the first label `accept` takes
pub fn pick_label(labels: &[String], accept: impl Fn(&str) -> bool) -> Option<usize> {
    labels.iter().position(|label| accept(label))
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Shared enumeration of `candidates` under every `scope` root
fn candidates_js(scope: &str, candidates: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({scope})).flatMap(root => Array.from(root.querySelectorAll({candidates})))",
        scope = quote(scope),
        candidates = quote(candidates),
    )
}

/// JS evaluating to a JSON array with one label per candidate element;
/// hidden elements report an empty label so indices stay aligned.
pub fn build_labels_script(scope: &str, candidates: &str) -> String {
    format!(
        r#"(() => JSON.stringify({elements}.map(el => {{
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) return "";
    const label = ((el.innerText || "") + " " + (el.value || "")).trim();
    return label.length > {max} ? "" : label;
}})))()"#,
        elements = candidates_js(scope, candidates),
        max = MAX_LABEL_LEN,
    )
}

/// JS that clicks candidate `index`; evaluates to whether it existed.
pub fn build_click_nth_script(scope: &str, candidates: &str, index: usize) -> String {
    format!(
        r#"(() => {{
    const el = {elements}[{index}];
    if (!el) return false;
    el.scrollIntoView({{block: "center"}});
    el.click();
    return true;
}})()"#,
        elements = candidates_js(scope, candidates),
    )
}

/// Click the first element matching `selector`, falling back to a JS click
/// when the native one is intercepted by an overlay.
pub fn click_first(tab: &Tab, selector: &str) -> bool {
    let Ok(elements) = tab.find_elements(selector) else {
        return false;
    };
    for element in elements {
        if element.click().is_ok() {
            return true;
        }
        if element
            .call_js_fn("function() { this.click(); }", vec![], false)
            .is_ok()
        {
            return true;
        }
    }
    false
}

fn candidate_labels(tab: &Tab, scope: &str, candidates: &str) -> Vec<String> {
    let script = build_labels_script(scope, candidates);
    match tab.evaluate(&script, false) {
        Ok(result) => result
            .value
            .and_then(|v| v.as_str().and_then(|json| serde_json::from_str(json).ok()))
            .unwrap_or_default(),
        Err(e) => {
            tracing::debug!("Label scan failed: {}", e);
            Vec::new()
        }
    }
}

/// Click the first visible candidate whose label `accept` takes and
/// return that label.
pub fn click_by_text(
    tab: &Tab,
    scope: &str,
    candidates: &str,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    let labels = candidate_labels(tab, scope, candidates);
    let index = pick_label(&labels, accept)?;
    let script = build_click_nth_script(scope, candidates, index);
    match tab.evaluate(&script, false) {
        Ok(result) if result.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false) => {
            Some(labels[index].clone())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Click on '{}' failed: {}", labels[index], e);
            None
        }
    }
}

pub fn dismiss_consent(tab: &Tab, settle: Duration) -> ConsentOutcome {
    let outcome = find_and_click(tab);
    match &outcome {
        ConsentOutcome::NotFound => tracing::warn!("Could not find or handle consent banner"),
        other => {
            tracing::info!("Consent handled: {:?}", other);
            thread::sleep(settle);
        }
    }
    outcome
}

fn find_and_click(tab: &Tab) -> ConsentOutcome {
    let dialog_present = tab
        .find_elements(FC_DIALOG)
        .map(|found| !found.is_empty())
        .unwrap_or(false);

    if dialog_present {
        tracing::debug!("Found fc-dialog-container");
        if let Some(label) = click_by_text(tab, FC_DIALOG, CLICKABLE, is_consent_label) {
            return ConsentOutcome::Dialog(label);
        }
        for selector in FC_SELECTORS {
            if click_first(tab, selector) {
                return ConsentOutcome::Dialog(selector.to_string());
            }
        }
    }

    for selector in GENERIC_SELECTORS {
        if click_first(tab, selector) {
            return ConsentOutcome::Generic(selector.to_string());
        }
    }

    match click_by_text(tab, "body", CLICKABLE, is_consent_label) {
        Some(label) => ConsentOutcome::Keyword(label),
        None => ConsentOutcome::NotFound,
    }
}
