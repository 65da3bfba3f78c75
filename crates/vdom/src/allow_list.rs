//! Fixed allow-list of plain attributes and listener events.
//!
//! Both tables must stay sorted; lookups are binary searches.

const ATTRIBUTES: &[&str] = &[
    "accept",
    "action",
    "alt",
    "autocomplete",
    "autofocus",
    "checked",
    "cols",
    "colspan",
    "disabled",
    "download",
    "draggable",
    "for",
    "height",
    "hidden",
    "href",
    "id",
    "lang",
    "max",
    "maxlength",
    "method",
    "min",
    "multiple",
    "name",
    "placeholder",
    "readonly",
    "rel",
    "required",
    "role",
    "rows",
    "rowspan",
    "selected",
    "size",
    "span",
    "src",
    "step",
    "tabindex",
    "target",
    "title",
    "type",
    "value",
    "width",
];

const EVENTS: &[&str] = &[
    "blur",
    "change",
    "click",
    "contextmenu",
    "dblclick",
    "dragend",
    "dragenter",
    "dragleave",
    "dragover",
    "dragstart",
    "drop",
    "focus",
    "input",
    "keydown",
    "keypress",
    "keyup",
    "mousedown",
    "mouseenter",
    "mouseleave",
    "mousemove",
    "mouseout",
    "mouseover",
    "mouseup",
    "scroll",
    "submit",
    "wheel",
];

/// Property keys routed to dedicated description fields instead of `attrs`.
pub const SPECIAL_KEYS: &[&str] = &["class", "custom", "dataset", "key", "properties", "style"];

pub fn is_allowed_attribute(name: &str) -> bool {
    ATTRIBUTES.binary_search(&name).is_ok() || name.starts_with("aria-")
}

pub fn is_allowed_event(event: &str) -> bool {
    EVENTS.binary_search(&event).is_ok()
}

/// Maps a listener property key (`onclick`) to its event name (`click`) if the
/// event is allow-listed.
pub fn event_for_key(key: &str) -> Option<&str> {
    let event = key.strip_prefix("on")?;
    is_allowed_event(event).then_some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_sorted_and_unique() {
        for table in [ATTRIBUTES, EVENTS, SPECIAL_KEYS] {
            assert!(table.windows(2).all(|w| w[0] < w[1]), "unsorted: {table:?}");
        }
    }

    #[test]
    fn aria_prefix_is_allowed() {
        assert!(is_allowed_attribute("aria-label"));
        assert!(is_allowed_attribute("href"));
        assert!(!is_allowed_attribute("onclick"));
        assert!(!is_allowed_attribute("x-custom"));
    }

    #[test]
    fn event_keys_need_on_prefix() {
        assert_eq!(event_for_key("onclick"), Some("click"));
        assert_eq!(event_for_key("click"), None);
        assert_eq!(event_for_key("onfrobnicate"), None);
    }
}
