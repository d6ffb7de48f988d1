//! Path lookups over parsed XML documents.
//!
//! Paths are `/`-separated element steps. A step written `prefix:name`
//! matches an element in the namespace the prefix resolves to; a bare
//! `name` matches by local name alone.

use roxmltree::Node;

/// Resolution of path prefixes to namespace URIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespaces {
    base: Option<&'static str>,
}

impl Namespaces {
    /// Documents without namespaces.
    pub const NONE: Self = Self { base: None };

    /// Prefixes resolve to `{base}{prefix}`, as in ORCID's
    /// `http://www.orcid.org/ns/{prefix}`.
    pub const fn with_base(base: &'static str) -> Self {
        Self { base: Some(base) }
    }

    fn matches(&self, node: Node<'_, '_>, step: &str) -> bool {
        if !node.is_element() {
            return false;
        }
        let tag = node.tag_name();
        match step.split_once(':') {
            Some((prefix, local)) => {
                tag.name() == local
                    && match self.base {
                        Some(base) => tag
                            .namespace()
                            .and_then(|ns| ns.strip_prefix(base))
                            .is_some_and(|rest| rest == prefix),
                        None => false,
                    }
            }
            None => tag.name() == step,
        }
    }

    /// All elements reached from `node` through `path`, in document order.
    pub fn find_all<'a, 'i>(&self, node: Node<'a, 'i>, path: &str) -> Vec<Node<'a, 'i>> {
        let mut current = vec![node];
        for step in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|n| n.children().filter(move |c| self.matches(*c, step)))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// The first element reached from `node` through `path`.
    pub fn find<'a, 'i>(&self, node: Node<'a, 'i>, path: &str) -> Option<Node<'a, 'i>> {
        self.find_all(node, path).into_iter().next()
    }

    /// Text content of the first element at `path`.
    pub fn text(&self, node: Node<'_, '_>, path: &str) -> Option<String> {
        self.find(node, path)?.text().map(str::to_string)
    }

    /// Concatenated text of the first element at `path` and its
    /// descendants, for mixed content such as titles with markup.
    pub fn all_text(&self, node: Node<'_, '_>, path: &str) -> Option<String> {
        let element = self.find(node, path)?;
        Some(
            element
                .descendants()
                .filter(Node::is_text)
                .filter_map(|n| n.text())
                .collect(),
        )
    }

    /// Attribute of `node`, or of the first element at `path` when given.
    pub fn attribute(&self, node: Node<'_, '_>, attribute: &str, path: Option<&str>) -> Option<String> {
        let element = match path {
            Some(path) => self.find(node, path)?,
            None => node,
        };
        element.attribute(attribute).map(str::to_string)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ORCID: Namespaces = Namespaces::with_base("http://www.orcid.org/ns/");

    #[test]
    fn test_namespaced_paths() {
        let xml = r#"<record:record xmlns:record="http://www.orcid.org/ns/record"
            xmlns:common="http://www.orcid.org/ns/common"
            xmlns:person="http://www.orcid.org/ns/person">
          <common:orcid-identifier><common:path>0000-0001</common:path></common:orcid-identifier>
          <person:person><common:path>other</common:path></person:person>
        </record:record>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();
        assert_eq!(
            ORCID.text(root, "common:orcid-identifier/common:path").as_deref(),
            Some("0000-0001")
        );
        assert!(ORCID.find(root, "person:orcid-identifier").is_none());
        assert_eq!(ORCID.find_all(root, "person:person/common:path").len(), 1);
    }

    #[test]
    fn test_plain_paths_and_attributes() {
        let xml = r#"<grant lang="EN"><ref type="a"><n>1</n><n>2</n></ref><ref type="b"/></grant>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();
        let ns = Namespaces::NONE;
        assert_eq!(ns.attribute(root, "lang", None).as_deref(), Some("EN"));
        assert_eq!(ns.attribute(root, "type", Some("ref")).as_deref(), Some("a"));
        let texts: Vec<String> = ns
            .find_all(root, "ref/n")
            .iter()
            .filter_map(|n| n.text().map(str::to_string))
            .collect();
        assert_eq!(texts, vec!["1", "2"]);
        assert_eq!(ns.text(root, "missing/n"), None);
        assert_eq!(ns.find(root, "").map(|n| n.tag_name().name()), Some("grant"));
    }

    #[test]
    fn test_mixed_content() {
        let xml = "<p><title>Water <i>H<sub>2</sub>O</i> pump</title></p>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let ns = Namespaces::NONE;
        assert_eq!(ns.text(doc.root_element(), "title").as_deref(), Some("Water "));
        assert_eq!(
            ns.all_text(doc.root_element(), "title").as_deref(),
            Some("Water H2O pump")
        );
    }
}
