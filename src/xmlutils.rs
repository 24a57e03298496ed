//! Permissive markup tokenizer.
//!
//! Epub content in the wild is frequently malformed, so this is
//! deliberately not a conformant XML parser: a single linear scan over
//! tag spans and text runs, an explicit open-element stack, and no
//! tag-name matching on close. Anything that doesn't look like a tag or
//! an attribute is skipped instead of raising an error.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Reserved tag marker for synthetic text nodes.
pub const TEXT_TAG: &str = "#text";

static TOKENS: OnceLock<Regex> = OnceLock::new();
static ATTRS: OnceLock<Regex> = OnceLock::new();

/// A node in the generic markup tree.
///
/// Tag and attribute names are case-folded to lowercase. Text runs are
/// stored as synthetic children tagged [`TEXT_TAG`] with `text` set;
/// element nodes keep `text` as [`None`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XMLNode {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<XMLNode>,
    pub text: Option<String>,
}

impl XMLNode {
    fn text_run(run: &str) -> Self {
        Self {
            name: TEXT_TAG.to_string(),
            text: Some(run.to_string()),
            ..Self::default()
        }
    }

    pub fn is_text(&self) -> bool {
        self.name == TEXT_TAG
    }

    /// Returns the attribute value, if declared.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// First node tagged `tag` in pre-order, including this node.
    pub fn find(&self, tag: &str) -> Option<&Self> {
        if self.name == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    /// All nodes tagged `tag` in pre-order, including this node.
    pub fn find_all<'a>(&'a self, tag: &str) -> Vec<&'a Self> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, found: &mut Vec<&'a Self>) {
        if self.name == tag {
            found.push(self);
        }
        for child in &self.children {
            child.collect(tag, found);
        }
    }

    /// Concatenates the direct text children, with whitespace runs
    /// collapsed to single spaces. Returns [`None`] when there is no
    /// text at all.
    pub fn get_text(&self) -> Option<String> {
        let text = self
            .children
            .iter()
            .filter(|child| child.is_text())
            .filter_map(|child| child.text.as_deref())
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");

        (!text.is_empty()).then_some(text)
    }
}

/// Tokenizes `content` into a tree, returning the first top-level
/// element or [`None`] when the buffer holds no element at all.
pub fn parse(content: &str) -> Option<XMLNode> {
    let content = content.replace("\r\n", "\n");
    let tokens = TOKENS.get_or_init(|| Regex::new("<[^>]*>|[^<]+").unwrap());

    let mut stack: Vec<XMLNode> = Vec::new();
    let mut root: Option<XMLNode> = None;

    for token in tokens.find_iter(&content) {
        let token = token.as_str();
        match token.strip_prefix('<') {
            // processing instructions, declarations and comments
            Some(tag) if tag.starts_with('?') || tag.starts_with('!') => {}
            // a close tag pops one level, whatever its name says
            Some(tag) if tag.starts_with('/') => close(&mut stack, &mut root),
            Some(tag) => {
                let inner = tag.trim_end_matches('>');
                let self_closing = inner.ends_with('/');
                let node = parse_tag(inner.trim_end_matches('/'));
                if self_closing {
                    attach(node, &mut stack, &mut root);
                } else {
                    stack.push(node);
                }
            }
            None => append_text(token, &mut stack),
        }
    }

    // unclosed elements at end of input still get attached
    while !stack.is_empty() {
        close(&mut stack, &mut root);
    }

    root
}

fn close(stack: &mut Vec<XMLNode>, root: &mut Option<XMLNode>) {
    // popping an empty stack is a no-op
    if let Some(node) = stack.pop() {
        attach(node, stack, root);
    }
}

fn attach(node: XMLNode, stack: &mut [XMLNode], root: &mut Option<XMLNode>) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    }
}

fn append_text(run: &str, stack: &mut [XMLNode]) {
    if run.trim().is_empty() {
        return;
    }
    let Some(parent) = stack.last_mut() else {
        return;
    };
    // adjacent runs at the same level merge into one text node
    if let Some(last) = parent.children.last_mut() {
        if last.is_text() {
            if let Some(text) = last.text.as_mut() {
                text.push_str(run);
            }
            return;
        }
    }
    parent.children.push(XMLNode::text_run(run));
}

fn parse_tag(inner: &str) -> XMLNode {
    let attrs_re = ATTRS.get_or_init(|| {
        Regex::new(r#"([^\s=/>'"]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    });

    let (name, rest) = inner
        .split_once(char::is_whitespace)
        .unwrap_or((inner, ""));

    let mut attrs = HashMap::new();
    for capture in attrs_re.captures_iter(rest) {
        let value = capture
            .get(2)
            .or_else(|| capture.get(3))
            .map_or("", |m| m.as_str());
        // duplicate attribute names: last one wins
        attrs.insert(capture[1].to_lowercase(), value.trim().to_string());
    }

    XMLNode {
        name: name.to_lowercase(),
        attrs,
        ..XMLNode::default()
    }
}
