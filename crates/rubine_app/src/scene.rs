//! Loading systems declared in a scene graph.
//!
//! Hosts often keep system definitions as nodes of a tree (a folder of
//! modules, a scene hierarchy). [`SceneNode`] abstracts that tree; the
//! loaders walk it and register every [`SystemDefinition`] they find.

use std::sync::Arc;

use rubine_scheduler::{BoxedSystem, IntoSystem, Scheduler, System};
use rubine_world::{Entity, Store};

/// A system waiting to be registered on a named phase.
pub struct SystemDefinition<A: 'static> {
    name: Arc<str>,
    phase: Arc<str>,
    system: BoxedSystem<A>,
}

impl<A: 'static> SystemDefinition<A> {
    /// Defines `system` on `phase`, named after its callable.
    pub fn new<M>(phase: impl Into<Arc<str>>, system: impl IntoSystem<A, M>) -> Self {
        let system = system.into_system();
        Self {
            name: Arc::from(system.name()),
            phase: phase.into(),
            system: Arc::new(system),
        }
    }

    /// Overrides the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the phase name.
    #[must_use]
    pub fn phase(&self) -> &str {
        &self.phase
    }
}

impl<A: 'static> Clone for SystemDefinition<A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            phase: Arc::clone(&self.phase),
            system: Arc::clone(&self.system),
        }
    }
}

impl<A: 'static> core::fmt::Debug for SystemDefinition<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SystemDefinition")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// A node of a scene graph that may carry a system definition.
pub trait SceneNode<A: 'static> {
    /// Direct children, in order.
    fn children(&self) -> &[Self]
    where
        Self: Sized;

    /// The system this node defines, if any.
    fn definition(&self) -> Option<&SystemDefinition<A>>;
}

/// Plain in-memory scene node.
pub struct Node<A: 'static> {
    label: String,
    definition: Option<SystemDefinition<A>>,
    children: Vec<Node<A>>,
}

impl<A: 'static> Node<A> {
    /// Creates a node without a definition.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            definition: None,
            children: Vec::new(),
        }
    }

    /// Creates a node carrying `definition`.
    #[must_use]
    pub fn system(label: impl Into<String>, definition: SystemDefinition<A>) -> Self {
        Self {
            definition: Some(definition),
            ..Self::new(label)
        }
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: Node<A>) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<A: 'static> SceneNode<A> for Node<A> {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn definition(&self) -> Option<&SystemDefinition<A>> {
        self.definition.as_ref()
    }
}

fn register<A: 'static, S: Store>(
    scheduler: &Scheduler<A, S>,
    definition: &SystemDefinition<A>,
) -> Entity {
    scheduler.add_system(
        &definition.phase,
        Arc::clone(&definition.name),
        Arc::clone(&definition.system),
    )
}

/// Registers the definitions carried by the direct children of `parent`.
///
/// Returns the new systems in child order.
pub fn load_children<A: 'static, S: Store, N: SceneNode<A>>(
    scheduler: &Scheduler<A, S>,
    parent: &N,
) -> Vec<Entity> {
    let systems: Vec<Entity> = parent
        .children()
        .iter()
        .filter_map(<N as SceneNode<A>>::definition)
        .map(|definition| register(scheduler, definition))
        .collect();
    tracing::debug!(count = systems.len(), "loaded systems from children");
    systems
}

/// Registers the definitions carried anywhere below `parent`, depth-first
/// in pre-order. `parent`'s own definition is not loaded.
pub fn load_descendants<A: 'static, S: Store, N: SceneNode<A>>(
    scheduler: &Scheduler<A, S>,
    parent: &N,
) -> Vec<Entity> {
    let mut systems = Vec::new();
    let mut stack: Vec<&N> = parent.children().iter().rev().collect();

    while let Some(node) = stack.pop() {
        if let Some(definition) = node.definition() {
            systems.push(register(scheduler, definition));
        }
        stack.extend(node.children().iter().rev());
    }
    tracing::debug!(count = systems.len(), "loaded systems from descendants");
    systems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str) -> SystemDefinition<()> {
        SystemDefinition::new("Update", || {}).named(name)
    }

    #[test]
    fn children_skips_nodes_without_definitions() {
        let scheduler = Scheduler::<()>::new();
        let root = Node::new("root")
            .with_child(Node::system("a", definition("a")))
            .with_child(Node::new("folder").with_child(Node::system("deep", definition("deep"))))
            .with_child(Node::system("b", definition("b")));

        let loaded = load_children(&scheduler, &root);

        assert_eq!(loaded.len(), 2);
        assert_eq!(scheduler.system("deep"), None);
        assert_eq!(scheduler.system("a"), Some(loaded[0]));
    }

    #[test]
    fn descendants_load_in_pre_order() {
        let scheduler = Scheduler::<()>::new();
        let root = Node::system("root", definition("root"))
            .with_child(
                Node::system("a", definition("a"))
                    .with_child(Node::system("a1", definition("a1")))
                    .with_child(Node::system("a2", definition("a2"))),
            )
            .with_child(Node::system("b", definition("b")));

        let loaded = load_descendants(&scheduler, &root);

        let names: Vec<String> = loaded
            .iter()
            .filter_map(|id| scheduler.system_state(*id))
            .map(|state| state.name.to_string())
            .collect();
        assert_eq!(names, vec!["a", "a1", "a2", "b"]);

        let update = scheduler.phase_named("Update").unwrap();
        assert_eq!(scheduler.systems_in(update), loaded);
    }
}
