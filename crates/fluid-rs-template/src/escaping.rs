//! The escaping interceptor.
//!
//! Runs once over a freshly sequenced tree and wraps every node whose output
//! must be HTML-escaped into an [`ComponentKind::Escaping`] node. Variable
//! lookups are wrapped when escaping is active at their position; helper
//! invocations are wrapped when their effective output escaping is on, no
//! helper in their inline chain already decides on escaping and no argument
//! value passes through a raw helper. Argument sub-trees are never touched.

use crate::component::{effective_escaping, Component, ComponentKind};
use crate::resolver::EscapingRole;

/// Inserts escaping nodes into a parsed tree.
///
/// `enabled` is the escaping mode of the template.
pub fn intercept(root: Component, enabled: bool) -> Component {
    process(root, enabled)
}

fn process(mut node: Component, enabled: bool) -> Component {
    match &node.kind {
        ComponentKind::ObjectAccessor { .. } => {
            if enabled {
                Component::escaping(node)
            } else {
                node
            }
        }
        ComponentKind::Invocation(_) | ComponentKind::Reference => {
            let effective = effective_escaping(node.escape_children, node.escape_output);
            let wrap = enabled
                && effective.output
                && matches!(node.kind, ComponentKind::Invocation(_))
                && chain_role(&node).is_none()
                && !raw_in_arguments(&node);
            let children_enabled = enabled && effective.children;
            node.map_children(|child| process(child, children_enabled));
            if wrap {
                Component::escaping(node)
            } else {
                node
            }
        }
        ComponentKind::Entry | ComponentKind::Section => {
            node.map_children(|child| process(child, enabled));
            node
        }
        _ => node,
    }
}

/// Returns the escaping role of the first helper found by following single
/// children down from `node`. Escaping nodes are passed through.
fn chain_role(node: &Component) -> Option<EscapingRole> {
    let mut current = node;
    loop {
        match &current.kind {
            ComponentKind::Escaping => {}
            ComponentKind::Invocation(invocation) => {
                let role = invocation
                    .descriptor
                    .as_ref()
                    .and_then(|descriptor| descriptor.escaping_role);
                if role.is_some() {
                    return role;
                }
            }
            _ => return None,
        }
        match current.children() {
            [only] => current = only,
            _ => return None,
        }
    }
}

/// Returns `true` if the value of any argument of `node` is produced by a
/// raw helper, looking through nested argument values as well.
fn raw_in_arguments(node: &Component) -> bool {
    node.arguments.iter().any(|(_, value)| raw_in_chain(value))
}

fn raw_in_chain(node: &Component) -> bool {
    match &node.kind {
        ComponentKind::Entry | ComponentKind::Escaping => node.children().iter().any(raw_in_chain),
        ComponentKind::Invocation(invocation) => {
            match invocation
                .descriptor
                .as_ref()
                .and_then(|descriptor| descriptor.escaping_role)
            {
                Some(EscapingRole::Raw) => true,
                Some(EscapingRole::Escape) => false,
                None => raw_in_arguments(node) || node.children().iter().any(raw_in_chain),
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::sequencer::sequence;

    fn intercepted(source: &str, enabled: bool) -> Component {
        let resolver = Resolver::new();
        let output = sequence(source, &resolver, enabled).unwrap();
        intercept(output.root, output.escaping_enabled)
    }

    fn is_escaping(node: &Component) -> bool {
        matches!(node.kind, ComponentKind::Escaping)
    }

    #[test]
    fn test_accessor_is_wrapped() {
        let root = intercepted("a {b} c", true);
        assert!(is_escaping(&root.children()[1]));
        assert!(matches!(
            root.children()[1].children()[0].kind,
            ComponentKind::ObjectAccessor { .. }
        ));
    }

    #[test]
    fn test_disabled_escaping() {
        let root = intercepted("a {b} c", false);
        assert!(!is_escaping(&root.children()[1]));

        let root = intercepted("{escaping off}{b}", true);
        assert!(!is_escaping(&root.children()[0]));
    }

    #[test]
    fn test_raw_disables_child_escaping() {
        let root = intercepted("{b -> f:format.raw()}", true);
        let raw = &root.children()[0];
        assert!(raw.as_invocation().is_some());
        assert!(!is_escaping(&raw.children()[0]));
    }

    #[test]
    fn test_section_children_are_processed() {
        let root = intercepted("<f:section name=\"s\">{b}</f:section>", true);
        assert!(is_escaping(&root.children()[0].children()[0]));
    }

    #[test]
    fn test_arguments_are_untouched() {
        let root = intercepted("{f:format.raw(value: b)}", true);
        let raw = &root.children()[0];
        assert!(matches!(
            raw.arguments.get("value").unwrap().kind,
            ComponentKind::ObjectAccessor { .. }
        ));
    }

    #[test]
    fn test_raw_argument_values() {
        let first = |source: &str| intercepted(source, true).children()[0].clone();

        let node = first("{f:format.htmlspecialchars(value: '{b -> f:format.raw()}')}");
        assert!(raw_in_arguments(&node));
        let node = first("<f:format.htmlspecialchars value=\"{b -> f:format.raw()}\" />");
        assert!(raw_in_arguments(&node));
        let node = first("{f:format.htmlspecialchars(value: 'x {b -> f:format.raw()}')}");
        assert!(raw_in_arguments(&node));
        let node = first(
            "{f:format.htmlspecialchars(value: '{f:format.htmlspecialchars(value: \"{b -> f:format.raw()}\") -> f:format.htmlspecialchars()}')}",
        );
        assert!(!raw_in_arguments(&node));
        let node = first(
            "{f:format.htmlspecialchars(value: '{f:if(condition: 1, then: \"{b -> f:format.raw()}\")}')}",
        );
        assert!(raw_in_arguments(&node));

        let node = first("{f:format.htmlspecialchars(value: b)}");
        assert!(!raw_in_arguments(&node));
        let node = first("{f:format.htmlspecialchars(value: '{b -> f:format.htmlspecialchars()}')}");
        assert!(!raw_in_arguments(&node));
    }

    #[test]
    fn test_chain_role_passes_through_escaping_nodes() {
        let root = intercepted("{b -> f:format.htmlspecialchars()}", true);
        let node = &root.children()[0];
        assert_eq!(chain_role(node), Some(EscapingRole::Escape));
        let wrapped = Component::escaping(node.clone());
        assert_eq!(chain_role(&wrapped), Some(EscapingRole::Escape));
        assert_eq!(chain_role(&Component::accessor("b")), None);
    }
}
