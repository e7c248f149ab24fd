//! Route and URL-alias queries over the content tree.
//!
//! A route compiles into a [`RouteQuery`]: a starting selection followed by
//! one child step per remaining URL segment. The query renders as the XPath
//! expression it stands for (useful in logs and diagnostics) and evaluates
//! directly against the indexed [`ContentTree`] with the same semantics:
//! the first match in document order wins.

use std::fmt;

use super::tree::{ContentTree, NodeIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteStart {
    /// The first top-level document, for an empty path without a start node.
    DefaultDocument,
    /// Any top-level document, optionally constrained by URL name.
    TopLevel { url_name: Option<String> },
    /// The document with this id, anywhere in the tree.
    Node { id: i32, url_name: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    start: RouteStart,
    steps: Vec<String>,
}

/// Build the query selecting the node addressed by `path` under `start_node_id`.
///
/// `path` must already be lower-cased. With `start_node_id == 0` and the top
/// level hidden, the top-level document is never named in the URL, so every
/// segment addresses a level below it.
pub fn route_query(start_node_id: i32, path: &str, hide_top_level_node: bool) -> RouteQuery {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        let start = if start_node_id > 0 {
            RouteStart::Node {
                id: start_node_id,
                url_name: None,
            }
        } else {
            RouteStart::DefaultDocument
        };
        return RouteQuery {
            start,
            steps: Vec::new(),
        };
    }

    let mut segments = segments.into_iter();
    let start = match (start_node_id, hide_top_level_node) {
        (0, true) => RouteStart::TopLevel { url_name: None },
        (0, false) => RouteStart::TopLevel {
            url_name: segments.next(),
        },
        (id, true) => RouteStart::Node { id, url_name: None },
        // The start node itself is named in the URL.
        (id, false) => RouteStart::Node {
            id,
            url_name: segments.next(),
        },
    };

    RouteQuery {
        start,
        steps: segments.collect(),
    }
}

/// XPath text of [`route_query`].
pub fn route_xpath(start_node_id: i32, path: &str, hide_top_level_node: bool) -> String {
    route_query(start_node_id, path, hide_top_level_node).to_string()
}

impl RouteQuery {
    pub(crate) fn evaluate(&self, tree: &ContentTree) -> Option<NodeIndex> {
        let mut selection: Vec<NodeIndex> = match &self.start {
            RouteStart::DefaultDocument => tree.top_level().first().copied().into_iter().collect(),
            RouteStart::TopLevel { url_name } => tree
                .top_level()
                .iter()
                .copied()
                .filter(|index| name_matches(tree, *index, url_name.as_deref()))
                .collect(),
            RouteStart::Node { id, url_name } => tree
                .index_of(*id)
                .filter(|index| name_matches(tree, *index, url_name.as_deref()))
                .into_iter()
                .collect(),
        };

        for step in &self.steps {
            if selection.is_empty() {
                return None;
            }
            selection = selection
                .iter()
                .flat_map(|index| tree.children(*index).iter().copied())
                .filter(|child| tree.node(*child).url_name == *step)
                .collect();
        }

        selection.first().copied()
    }
}

fn name_matches(tree: &ContentTree, index: NodeIndex, url_name: Option<&str>) -> bool {
    url_name.is_none_or(|name| tree.node(index).url_name == name)
}

impl fmt::Display for RouteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            RouteStart::DefaultDocument | RouteStart::TopLevel { url_name: None } => {
                f.write_str("/root/*[@isDoc]")?
            }
            RouteStart::TopLevel {
                url_name: Some(name),
            } => write!(f, "/root/*[@isDoc and @urlName={}]", literal(name))?,
            RouteStart::Node { id, url_name: None } => write!(f, "//*[@isDoc and @id={id}]")?,
            RouteStart::Node {
                id,
                url_name: Some(name),
            } => write!(
                f,
                "//*[@isDoc and @id={id} and @urlName={}]",
                literal(name)
            )?,
        }
        for step in &self.steps {
            write!(f, "/*[@isDoc and @urlName={}]", literal(step))?;
        }
        Ok(())
    }
}

/// Query for the first document carrying `alias` among its URL aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasQuery {
    root_id: Option<i32>,
    alias: String,
}

/// Build the alias query; `root_id <= 0` searches the whole tree.
pub fn url_alias_query(root_id: i32, alias: &str) -> AliasQuery {
    AliasQuery {
        root_id: (root_id > 0).then_some(root_id),
        alias: alias.trim_start_matches('/').to_string(),
    }
}

/// XPath text of [`url_alias_query`].
pub fn url_alias_xpath(root_id: i32, alias: &str) -> String {
    url_alias_query(root_id, alias).to_string()
}

impl AliasQuery {
    pub(crate) fn evaluate(&self, tree: &ContentTree) -> Option<NodeIndex> {
        let scope = match self.root_id {
            Some(id) => tree.descendants(tree.index_of(id)?),
            None => tree.document_order(),
        };
        scope
            .into_iter()
            .find(|index| tree.node(*index).matches_url_alias(&self.alias))
    }
}

impl fmt::Display for AliasQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let normalized = "concat(',',translate(@urlAlias,' ',''),',')";
        let exact = literal(&format!(",{},", self.alias));
        let slashed = literal(&format!(",/{},", self.alias));
        match self.root_id {
            Some(id) => write!(f, "//*[@isDoc and @id={id}]//*")?,
            None => f.write_str("//*")?,
        }
        write!(
            f,
            "[@isDoc and (contains({normalized},{exact}) or contains({normalized},{slashed}))]"
        )
    }
}

/// Quote a string as an XPath 1.0 literal.
fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::fixtures::node;

    fn tree() -> ContentTree {
        ContentTree::new(vec![
            node(1, -1, "home", 1),
            node(2, 1, "about", 2),
            node(3, 2, "team", 3),
            node(5, 1, "news", 2),
            node(7, -1, "about", 1),
            node(8, 7, "history", 2),
        ])
        .expect("tree")
    }

    fn resolve(start: i32, path: &str, hide: bool) -> Option<i32> {
        let tree = tree();
        route_query(start, path, hide)
            .evaluate(&tree)
            .map(|index| tree.node(index).id)
    }

    #[test]
    fn empty_path_selects_first_document_or_start_node() {
        assert_eq!(route_xpath(0, "/", true), "/root/*[@isDoc]");
        assert_eq!(resolve(0, "/", true), Some(1));
        assert_eq!(route_xpath(5, "/", true), "//*[@isDoc and @id=5]");
        assert_eq!(resolve(5, "/", true), Some(5));
        assert_eq!(resolve(5, "", false), Some(5));
    }

    #[test]
    fn hidden_top_level_leaves_first_level_unconstrained() {
        assert_eq!(
            route_xpath(0, "/about/team", true),
            "/root/*[@isDoc]/*[@isDoc and @urlName='about']/*[@isDoc and @urlName='team']"
        );
        assert_eq!(resolve(0, "/about/team", true), Some(3));
        // Children of later top-level nodes are searched too.
        assert_eq!(resolve(0, "/history", true), Some(8));
    }

    #[test]
    fn visible_top_level_names_the_first_segment() {
        assert_eq!(
            route_xpath(0, "/about/history", false),
            "/root/*[@isDoc and @urlName='about']/*[@isDoc and @urlName='history']"
        );
        assert_eq!(resolve(0, "/about/history", false), Some(8));
        assert_eq!(resolve(0, "/about/team", false), None);
    }

    #[test]
    fn start_node_scopes_the_path() {
        assert_eq!(
            route_xpath(1, "/about/team", true),
            "//*[@isDoc and @id=1]/*[@isDoc and @urlName='about']/*[@isDoc and @urlName='team']"
        );
        assert_eq!(resolve(1, "/about/team", true), Some(3));
        assert_eq!(
            route_xpath(7, "/about", false),
            "//*[@isDoc and @id=7 and @urlName='about']"
        );
        assert_eq!(resolve(7, "/about", false), Some(7));
        assert_eq!(resolve(7, "/about", true), None);
    }

    #[test]
    fn literals_survive_quotes() {
        assert_eq!(literal("plain"), "'plain'");
        assert_eq!(literal("it's"), "\"it's\"");
        assert_eq!(literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
    }

    #[test]
    fn alias_query_scopes_under_root() {
        let mut nodes = vec![
            node(1, -1, "home", 1),
            node(2, 1, "contact", 2),
            node(3, -1, "other", 1),
            node(4, 3, "contact", 2),
        ];
        nodes[1].url_alias = Some("reach-us".to_string());
        nodes[3].url_alias = Some("/reach-us".to_string());
        let tree = ContentTree::new(nodes).expect("tree");

        let anywhere = url_alias_query(0, "/reach-us").evaluate(&tree);
        assert_eq!(anywhere.map(|index| tree.node(index).id), Some(2));

        let scoped = url_alias_query(3, "reach-us").evaluate(&tree);
        assert_eq!(scoped.map(|index| tree.node(index).id), Some(4));

        assert!(url_alias_query(42, "reach-us").evaluate(&tree).is_none());
        assert!(url_alias_xpath(3, "reach-us").starts_with("//*[@isDoc and @id=3]//*[@isDoc and"));
    }
}
