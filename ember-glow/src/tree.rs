//! The local tree mirror and update-merge
//!
//! The consumer keeps one canonical tree per session: positional storage
//! under a root sentinel. Decoded responses arrive as a [`GlowRoot`] whose
//! fragments may be positional or qualified (absolute-path); `apply`
//! canonicalizes both into the same storage in a single pass and reports
//! every parameter value that changed.

use crate::element::{Children, Element, ElementKind};
use crate::function::InvocationResult;
use crate::path::Path;
use crate::stream::StreamEntry;
use ember_core::{EmberResult, Value};

/// A decoded top-level fragment: the provider's choice of form
#[derive(Debug, Clone, PartialEq)]
pub enum GlowFragment {
    /// Placed by parent containment from the root
    Positional(Element),
    /// Placed by its absolute numeric path
    Qualified(Path, Element),
}

impl GlowFragment {
    /// Canonical absolute path of the fragment's top element
    pub fn path(&self) -> Path {
        match self {
            GlowFragment::Positional(el) => Path::new(vec![el.number()]),
            GlowFragment::Qualified(path, _) => path.clone(),
        }
    }

    /// The fragment's top element
    pub fn element(&self) -> &Element {
        match self {
            GlowFragment::Positional(el) => el,
            GlowFragment::Qualified(_, el) => el,
        }
    }
}

/// A decoded Ember+ message root
#[derive(Debug, Clone, PartialEq)]
pub enum GlowRoot {
    /// Tree fragments (solicited or unsolicited)
    Elements(Vec<GlowFragment>),
    /// Reply to a function invocation
    InvocationResult(InvocationResult),
    /// Stream value updates
    Streams(Vec<StreamEntry>),
}

impl GlowRoot {
    /// Find the element at an absolute path within this message, if present
    pub fn find(&self, path: &Path) -> Option<&Element> {
        let fragments = match self {
            GlowRoot::Elements(fragments) => fragments,
            _ => return None,
        };
        for fragment in fragments {
            let base = fragment.path();
            if path.starts_with(&base) {
                let relative = Path::new(path.segments()[base.len()..].to_vec());
                if let Some(el) = fragment.element().get_by_path(&relative) {
                    return Some(el);
                }
            }
        }
        None
    }

    /// Check whether this message contains an element whose parent is `path`
    pub fn touches_child_of(&self, path: &Path) -> bool {
        let fragments = match self {
            GlowRoot::Elements(fragments) => fragments,
            _ => return false,
        };
        fragments.iter().any(|fragment| {
            let base = fragment.path();
            if base.parent().as_ref() == Some(path) || (path.is_root() && base.len() == 1) {
                return true;
            }
            // A deeper positional chain may carry the children inline
            if path.starts_with(&base) {
                let relative = Path::new(path.segments()[base.len()..].to_vec());
                return fragment
                    .element()
                    .get_by_path(&relative)
                    .map(|el| !el.children().is_empty())
                    .unwrap_or(false);
            }
            false
        })
    }
}

/// A parameter value that changed during a merge
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub path: Path,
    pub value: Value,
}

/// The root sentinel owning the session's tree
///
/// The root has no number and no identifier; its children are the
/// provider's top-level elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Root {
    children: Children,
}

impl Root {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// The top-level elements
    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Attach a top-level element, failing on a duplicate number
    pub fn add_child(&mut self, element: Element) -> EmberResult<()> {
        self.children.add(element)
    }

    /// Look up a top-level element by number
    pub fn get_child(&self, number: u32) -> Option<&Element> {
        self.children.get(number)
    }

    /// Walk an absolute dotted numeric path
    ///
    /// The empty path addresses the root itself and returns `None`; a miss
    /// anywhere along the walk returns `None`, never a partial result.
    pub fn get_by_path(&self, path: &Path) -> Option<&Element> {
        let (&first, rest) = path.segments().split_first()?;
        self.children
            .get(first)?
            .get_by_path(&Path::new(rest.to_vec()))
    }

    /// Drop the entire tree
    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// Merge a decoded message into the tree
    ///
    /// Scalar fields present in the fragment overwrite; absent fields are
    /// preserved. Children merge recursively by number; qualified fragments
    /// are canonicalized onto positional storage, materializing placeholder
    /// nodes for unknown ancestors. Returns every parameter value the merge
    /// changed, in visit order.
    pub fn apply(&mut self, root: &GlowRoot) -> Vec<ValueChange> {
        let mut changes = Vec::new();
        match root {
            GlowRoot::Elements(fragments) => {
                for fragment in fragments {
                    match fragment {
                        GlowFragment::Positional(el) => {
                            merge_into(&mut self.children, el, &Path::root(), &mut changes);
                        }
                        GlowFragment::Qualified(path, el) => {
                            let segments = path.segments();
                            let (_, ancestors) = match segments.split_last() {
                                Some(split) => split,
                                None => continue,
                            };
                            let mut children = &mut self.children;
                            let mut parent_path = Path::root();
                            for &segment in ancestors {
                                parent_path = parent_path.child(segment);
                                children = &mut Children::ensure_node(children, segment).children;
                            }
                            merge_into(children, el, &parent_path, &mut changes);
                        }
                    }
                }
            }
            GlowRoot::Streams(entries) => {
                for entry in entries {
                    apply_stream(&mut self.children, &Path::root(), entry, &mut changes);
                }
            }
            GlowRoot::InvocationResult(_) => {}
        }
        changes
    }
}

fn merge_into(
    children: &mut Children,
    fragment: &Element,
    parent_path: &Path,
    changes: &mut Vec<ValueChange>,
) {
    let path = parent_path.child(fragment.number());
    match children.get_mut(fragment.number()) {
        Some(existing) => merge_element(existing, fragment, &path, changes),
        None => {
            collect_values(fragment, &path, changes);
            // Number is unused here, so add cannot fail
            let _ = children.add(fragment.clone());
        }
    }
}

fn merge_element(existing: &mut Element, fragment: &Element, path: &Path, changes: &mut Vec<ValueChange>) {
    let same_kind = matches!(
        (&existing.kind, &fragment.kind),
        (ElementKind::Node(_), ElementKind::Node(_))
            | (ElementKind::Parameter(_), ElementKind::Parameter(_))
            | (ElementKind::Matrix(_), ElementKind::Matrix(_))
            | (ElementKind::Function(_), ElementKind::Function(_))
    );
    if !same_kind {
        // Kind changed at the same number: replace wholesale
        *existing = fragment.clone();
        collect_values(existing, path, changes);
        return;
    }

    match (&mut existing.kind, &fragment.kind) {
        (ElementKind::Node(a), ElementKind::Node(b)) => {
            merge_opt(&mut a.identifier, &b.identifier);
            merge_opt(&mut a.description, &b.description);
            merge_opt(&mut a.is_online, &b.is_online);
            merge_opt(&mut a.schema_identifiers, &b.schema_identifiers);
        }
        (ElementKind::Parameter(a), ElementKind::Parameter(b)) => {
            let value_changed = b.value.is_some() && a.value != b.value;
            merge_opt(&mut a.identifier, &b.identifier);
            merge_opt(&mut a.description, &b.description);
            merge_opt(&mut a.value, &b.value);
            merge_opt(&mut a.minimum, &b.minimum);
            merge_opt(&mut a.maximum, &b.maximum);
            merge_opt(&mut a.access, &b.access);
            merge_opt(&mut a.format, &b.format);
            merge_opt(&mut a.enumeration, &b.enumeration);
            merge_opt(&mut a.factor, &b.factor);
            merge_opt(&mut a.is_online, &b.is_online);
            merge_opt(&mut a.formula, &b.formula);
            merge_opt(&mut a.step, &b.step);
            merge_opt(&mut a.default, &b.default);
            merge_opt(&mut a.parameter_type, &b.parameter_type);
            merge_opt(&mut a.stream_identifier, &b.stream_identifier);
            merge_opt(&mut a.stream_descriptor, &b.stream_descriptor);
            if value_changed {
                if let Some(value) = &a.value {
                    changes.push(ValueChange {
                        path: path.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        (ElementKind::Matrix(a), ElementKind::Matrix(b)) => {
            merge_opt(&mut a.identifier, &b.identifier);
            merge_opt(&mut a.description, &b.description);
            merge_opt(&mut a.matrix_type, &b.matrix_type);
            merge_opt(&mut a.addressing_mode, &b.addressing_mode);
            merge_opt(&mut a.target_count, &b.target_count);
            merge_opt(&mut a.source_count, &b.source_count);
            merge_opt(&mut a.maximum_total_connects, &b.maximum_total_connects);
            merge_opt(&mut a.maximum_connects_per_target, &b.maximum_connects_per_target);
            merge_opt(&mut a.parameters_location, &b.parameters_location);
            merge_opt(&mut a.labels, &b.labels);
            merge_opt(&mut a.targets, &b.targets);
            merge_opt(&mut a.sources, &b.sources);
            for (target, connection) in &b.connections {
                a.connections.insert(*target, connection.clone());
            }
        }
        (ElementKind::Function(a), ElementKind::Function(b)) => {
            merge_opt(&mut a.identifier, &b.identifier);
            merge_opt(&mut a.description, &b.description);
            if !b.arguments.is_empty() {
                a.arguments = b.arguments.clone();
            }
            if !b.result.is_empty() {
                a.result = b.result.clone();
            }
        }
        _ => {}
    }

    for child in fragment.children.iter() {
        merge_into(&mut existing.children, child, path, changes);
    }
}

fn merge_opt<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if source.is_some() {
        *target = source.clone();
    }
}

/// Record the values of every parameter in a freshly inserted subtree
fn collect_values(element: &Element, path: &Path, changes: &mut Vec<ValueChange>) {
    if let ElementKind::Parameter(contents) = &element.kind {
        if let Some(value) = &contents.value {
            changes.push(ValueChange {
                path: path.clone(),
                value: value.clone(),
            });
        }
    }
    for child in element.children.iter() {
        collect_values(child, &path.child(child.number()), changes);
    }
}

fn apply_stream(
    children: &mut Children,
    base: &Path,
    entry: &StreamEntry,
    changes: &mut Vec<ValueChange>,
) {
    for element in children.iter_mut() {
        let path = base.child(element.number());
        if let ElementKind::Parameter(contents) = &mut element.kind {
            if contents.stream_identifier == Some(entry.stream_identifier) {
                let new_value = match (&contents.stream_descriptor, &entry.value) {
                    (Some(descriptor), Value::Octets(packet)) => descriptor.extract(packet),
                    _ => Some(entry.value.clone()),
                };
                if let Some(new_value) = new_value {
                    if contents.value.as_ref() != Some(&new_value) {
                        contents.value = Some(new_value.clone());
                        changes.push(ValueChange {
                            path: path.clone(),
                            value: new_value,
                        });
                    }
                }
            }
        }
        apply_stream(&mut element.children, &path, entry, changes);
    }
}
