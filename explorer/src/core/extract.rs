//! Accessibility-tree parsing into deduplicated, identity-stable elements.
//!
//! Element ids come from stable UI attributes (resource id, class and size,
//! short content description, qualifying parent, sibling index), so the same
//! physical control keeps its id across rounds and sessions. Proximity of
//! bounding-box centers is the only deduplication key: the first node seen in
//! document order wins and later near-duplicates are dropped.

use std::collections::{BTreeSet, HashMap};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::core::element::{BoundingBox, Capability, Element};
use crate::error::ExploreError;

/// Content descriptions at or above this many characters are not part of the id.
const MAX_DESC_CHARS: usize = 20;

/// Tunables for element extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    /// Centers closer than or equal to this distance collapse into one element.
    pub min_dist: f64,
    /// Append the node's `index` attribute to disambiguate identical ids.
    pub append_sibling_index: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_dist: 30.0,
            append_sibling_index: true,
        }
    }
}

#[derive(Debug, Clone)]
struct RawNode {
    attrs: HashMap<String, String>,
}

impl RawNode {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn has(&self, capability: Capability) -> bool {
        self.attr(capability.attribute()) == Some("true")
    }

    fn qualifies(&self) -> bool {
        Capability::ALL.iter().any(|cap| self.has(*cap))
    }

    fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::parse(self.attr("bounds")?)
    }

    /// Id from the node's own attributes, without parent prefix or index.
    fn base_id(&self, bbox: &BoundingBox) -> String {
        let mut id = match self.attr("resource-id").filter(|rid| !rid.is_empty()) {
            Some(rid) => rid.replace(':', ".").replace('/', "_"),
            None => format!(
                "{}_{}_{}",
                self.attr("class").unwrap_or_default(),
                bbox.width(),
                bbox.height()
            ),
        };
        if let Some(desc) = self
            .attr("content-desc")
            .filter(|desc| !desc.is_empty() && desc.chars().count() < MAX_DESC_CHARS)
        {
            let desc = desc.replace('/', "_").replace(' ', "").replace(':', "_");
            id.push('_');
            id.push_str(&desc);
        }
        id
    }
}

/// Extract every node with `capability="true"`, in document order.
///
/// Blacklist filtering happens later in [`compose_candidates`]; this returns the
/// full deduplicated list for the capability.
pub fn extract_elements(
    xml: &str,
    capability: Capability,
    options: &ExtractOptions,
    round: u32,
) -> Result<Vec<Element>, ExploreError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<RawNode> = Vec::new();
    let mut accepted: Vec<Element> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let node = read_node(&start)?;
                visit(&node, path.last(), capability, options, round, &mut accepted);
                path.push(node);
            }
            Ok(Event::Empty(start)) => {
                let node = read_node(&start)?;
                visit(&node, path.last(), capability, options, round, &mut accepted);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ExploreError::MalformedUiTree(format!(
                    "at byte {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
    }

    debug!(
        capability = capability.attribute(),
        count = accepted.len(),
        "extracted elements"
    );
    Ok(accepted)
}

fn read_node(start: &BytesStart<'_>) -> Result<RawNode, ExploreError> {
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| ExploreError::MalformedUiTree(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ExploreError::MalformedUiTree(err.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(RawNode { attrs })
}

fn visit(
    node: &RawNode,
    parent: Option<&RawNode>,
    capability: Capability,
    options: &ExtractOptions,
    round: u32,
    accepted: &mut Vec<Element>,
) {
    if !node.has(capability) {
        return;
    }
    let Some(bbox) = node.bbox() else {
        debug!(bounds = ?node.attr("bounds"), "skipping node without usable bounds");
        return;
    };

    let mut id = node.base_id(&bbox);
    if let Some(parent) = parent.filter(|p| p.qualifies())
        && let Some(parent_bbox) = parent.bbox()
    {
        id = format!("{}_{}", parent.base_id(&parent_bbox), id);
    }
    if options.append_sibling_index
        && let Some(index) = node.attr("index")
    {
        id.push('_');
        id.push_str(index);
    }

    let candidate = Element {
        id,
        bbox,
        capability,
        discovered_round: round,
    };
    if accepted
        .iter()
        .any(|existing| existing.is_near(&candidate, options.min_dist))
    {
        debug!(id = %candidate.id, "dropping near-duplicate element");
        return;
    }
    accepted.push(candidate);
}

/// Build the round's candidate list: clickable elements first, then focusable
/// elements that do not overlap any extracted clickable element.
///
/// Blacklisted ids are excluded from both groups. Blacklisted clickables still
/// shadow nearby focusable elements.
pub fn compose_candidates(
    clickable: &[Element],
    focusable: &[Element],
    blacklist: &BTreeSet<String>,
    min_dist: f64,
) -> Vec<Element> {
    let mut candidates: Vec<Element> = clickable
        .iter()
        .filter(|elem| !blacklist.contains(&elem.id))
        .cloned()
        .collect();

    for elem in focusable {
        if blacklist.contains(&elem.id) {
            continue;
        }
        if clickable.iter().any(|c| c.is_near(elem, min_dist)) {
            continue;
        }
        candidates.push(elem.clone());
    }
    candidates
}

/// Extract both capability lists and compose the round's candidate list.
pub fn extract_candidates(
    xml: &str,
    blacklist: &BTreeSet<String>,
    options: &ExtractOptions,
    round: u32,
) -> Result<Vec<Element>, ExploreError> {
    let clickable = extract_elements(xml, Capability::Clickable, options, round)?;
    let focusable = extract_elements(xml, Capability::Focusable, options, round)?;
    Ok(compose_candidates(
        &clickable,
        &focusable,
        blacklist,
        options.min_dist,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::distance;

    fn no_index() -> ExtractOptions {
        ExtractOptions {
            min_dist: 30.0,
            append_sibling_index: false,
        }
    }

    fn wrap(body: &str) -> String {
        format!("<?xml version='1.0' encoding='UTF-8'?><hierarchy rotation=\"0\">{body}</hierarchy>")
    }

    #[test]
    fn resource_id_scenario() {
        let xml = wrap(
            r#"<node resource-id="com.app:id/btn" class="android.widget.Button" bounds="[10,20][110,70]" clickable="true" />"#,
        );
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].id, "com.app.id_btn");
        assert_eq!(elems[0].bbox, BoundingBox::new((10, 20), (110, 70)));
        assert_eq!(elems[0].capability, Capability::Clickable);
        assert_eq!(elems[0].discovered_round, 1);
    }

    #[test]
    fn same_resource_id_yields_same_id_across_rounds() {
        let xml = wrap(
            r#"<node index="2" resource-id="com.app:id/btn" class="Button" bounds="[10,20][110,70]" clickable="true" />"#,
        );
        let opts = ExtractOptions::default();
        let round_one = extract_elements(&xml, Capability::Clickable, &opts, 1).expect("r1");
        let round_nine = extract_elements(&xml, Capability::Clickable, &opts, 9).expect("r9");
        assert_eq!(round_one[0].id, "com.app.id_btn_2");
        assert_eq!(round_one[0].id, round_nine[0].id);
    }

    #[test]
    fn fallback_id_uses_class_and_size_plus_short_description() {
        let xml = wrap(
            r#"<node class="android.widget.ImageView" content-desc="Open nav: drawer" bounds="[0,0][48,40]" clickable="true" />"#,
        );
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        assert_eq!(elems[0].id, "android.widget.ImageView_48_40_Opennav_drawer");
    }

    #[test]
    fn long_description_is_not_appended() {
        let xml = wrap(
            r#"<node class="V" content-desc="a description that is far too long" bounds="[0,0][10,10]" clickable="true" />"#,
        );
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        assert_eq!(elems[0].id, "V_10_10");
    }

    #[test]
    fn qualifying_parent_prefixes_id() {
        let xml = wrap(
            r#"<node resource-id="app:id/row" class="L" bounds="[0,0][500,100]" clickable="true">
                 <node resource-id="app:id/star" class="I" bounds="[400,10][480,90]" focusable="true" />
               </node>"#,
        );
        let elems = extract_elements(&xml, Capability::Focusable, &no_index(), 1).expect("extract");
        assert_eq!(elems[0].id, "app.id_row_app.id_star");
    }

    #[test]
    fn non_qualifying_parent_does_not_prefix() {
        let xml = wrap(
            r#"<node resource-id="app:id/frame" class="F" bounds="[0,0][500,500]">
                 <node resource-id="app:id/ok" class="B" bounds="[0,0][100,100]" clickable="true" />
               </node>"#,
        );
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        assert_eq!(elems[0].id, "app.id_ok");
    }

    #[test]
    fn near_duplicates_are_dropped_first_wins() {
        let xml = wrap(
            r#"<node resource-id="app:id/outer" class="A" bounds="[0,0][100,100]" clickable="true">
                 <node resource-id="app:id/inner" class="B" bounds="[5,5][95,95]" clickable="true" />
               </node>
               <node resource-id="app:id/far" class="C" bounds="[300,300][400,400]" clickable="true" />"#,
        );
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        let ids: Vec<&str> = elems.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["app.id_outer", "app.id_far"]);
    }

    #[test]
    fn nodes_without_bounds_are_skipped() {
        let xml = wrap(r#"<node resource-id="app:id/x" clickable="true" />"#);
        let elems = extract_elements(&xml, Capability::Clickable, &no_index(), 1).expect("extract");
        assert!(elems.is_empty());
    }

    #[test]
    fn malformed_xml_is_reported() {
        let err = extract_elements("<hierarchy><node></hierarchy>", Capability::Clickable, &no_index(), 1)
            .unwrap_err();
        assert!(matches!(err, ExploreError::MalformedUiTree(_)));
    }

    #[test]
    fn candidates_put_clickable_first_and_drop_overlapping_focusable() {
        let xml = wrap(
            r#"<node resource-id="app:id/search" class="E" bounds="[0,0][200,100]" focusable="true" />
               <node resource-id="app:id/go" class="B" bounds="[0,0][200,100]" clickable="true" />
               <node resource-id="app:id/field" class="E" bounds="[0,500][200,600]" focusable="true" />"#,
        );
        let candidates =
            extract_candidates(&xml, &BTreeSet::new(), &no_index(), 1).expect("candidates");
        let ids: Vec<&str> = candidates.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["app.id_go", "app.id_field"]);
    }

    #[test]
    fn blacklisted_clickable_still_shadows_focusable() {
        let xml = wrap(
            r#"<node resource-id="app:id/go" class="B" bounds="[0,0][200,100]" clickable="true" />
               <node resource-id="app:id/search" class="E" bounds="[0,0][200,100]" focusable="true" />"#,
        );
        let blacklist = BTreeSet::from(["app.id_go".to_string()]);
        let candidates = extract_candidates(&xml, &blacklist, &no_index(), 1).expect("candidates");
        assert!(candidates.is_empty());
    }

    #[test]
    fn accepted_candidates_are_pairwise_farther_than_min_dist() {
        let mut body = String::new();
        for row in 0..12 {
            for col in 0..6 {
                let x = col * 23;
                let y = row * 37;
                let attr = if (row + col) % 2 == 0 { "clickable" } else { "focusable" };
                body.push_str(&format!(
                    r#"<node class="V" bounds="[{x},{y}][{},{}]" {attr}="true" />"#,
                    x + 40,
                    y + 40
                ));
            }
        }
        let opts = no_index();
        let candidates =
            extract_candidates(&wrap(&body), &BTreeSet::new(), &opts, 1).expect("candidates");
        assert!(candidates.len() > 1);
        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                assert!(distance(a.center(), b.center()) > opts.min_dist);
            }
        }
    }
}
