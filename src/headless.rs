//! An in-memory DOM for running widgets without a browser.
//!
//! It models just enough of the real thing: an element tree with attributes, classes and inline
//! styles, simple selectors (`tag`, `#id`, `.class`, compounds and comma lists), bubbling event
//! dispatch, custom element connection callbacks, and the swap library's two events.
//!
//! Like in a browser, a listener removed during dispatch doesn't run, and one added during
//! dispatch only sees later events.

use crate::{
	dom::{Callback, Dom, ListenScope},
	registry::{DefineError, ElementCallback, ElementCallbacks, ElementHost},
	redact,
	swap::{BeforeSwap, SwapCallback, SwapEvents, AFTER_SWAP, BEFORE_SWAP},
};
use hashbrown::HashMap;
use std::{
	cell::RefCell,
	collections::{BTreeMap, BTreeSet},
};
use tracing::{trace, trace_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(usize);

#[derive(Debug, Default)]
struct NodeData {
	tag: String,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	attributes: BTreeMap<String, String>,
	classes: BTreeSet<String>,
	styles: BTreeMap<String, String>,
}

struct Listener {
	node: NodeId,
	event: String,
	scope: ListenScope,
	callback: Callback,
}

struct SwapListener {
	event: String,
	callback: SwapCallback<NodeId>,
}

#[derive(Default)]
struct Tree {
	nodes: Vec<NodeData>,
	next_listener: usize,
	listeners: HashMap<ListenerId, Listener>,
	swap_listeners: HashMap<ListenerId, SwapListener>,
	definitions: HashMap<String, ElementCallbacks<NodeId>>,
}

impl Tree {
	fn node(&self, id: NodeId) -> &NodeData {
		&self.nodes[id.0]
	}

	fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
		&mut self.nodes[id.0]
	}

	fn next_listener_id(&mut self) -> ListenerId {
		let id = ListenerId(self.next_listener);
		self.next_listener += 1;
		id
	}

	fn ancestors_and_self(&self, id: NodeId) -> impl '_ + Iterator<Item = NodeId> {
		let mut next = Some(id);
		core::iter::from_fn(move || {
			let current = next?;
			next = self.node(current).parent;
			Some(current)
		})
	}

	fn is_connected(&self, id: NodeId) -> bool {
		self.ancestors_and_self(id).any(|ancestor| ancestor == HeadlessDom::DOCUMENT)
	}

	/// Pre-order, including `id`.
	fn subtree(&self, id: NodeId) -> Vec<NodeId> {
		let mut order = Vec::new();
		let mut stack = vec![id];
		while let Some(current) = stack.pop() {
			order.push(current);
			stack.extend(self.node(current).children.iter().rev());
		}
		order
	}

	/// Connection callbacks of defined elements in `id`'s subtree, in tree order.
	fn callbacks_in(&self, id: NodeId, connected: bool) -> Vec<(ElementCallback<NodeId>, NodeId)> {
		self.subtree(id)
			.into_iter()
			.filter_map(|node| {
				let callbacks = self.definitions.get(&self.node(node).tag)?;
				let callback = if connected { &callbacks.connected } else { &callbacks.disconnected };
				Some((callback.clone(), node))
			})
			.collect()
	}

	fn detach(&mut self, id: NodeId) {
		if let Some(parent) = self.node_mut(id).parent.take() {
			self.node_mut(parent).children.retain(|&child| child != id);
		}
	}
}

pub struct HeadlessDom {
	tree: RefCell<Tree>,
}

impl Default for HeadlessDom {
	fn default() -> Self {
		Self::new()
	}
}

impl HeadlessDom {
	const DOCUMENT: NodeId = NodeId(0);

	#[must_use]
	pub fn new() -> Self {
		let mut tree = Tree::default();
		tree.nodes.push(NodeData {
			tag: "#document".to_owned(),
			..NodeData::default()
		});
		Self { tree: RefCell::new(tree) }
	}

	#[must_use]
	pub fn document(&self) -> NodeId {
		Self::DOCUMENT
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str) -> NodeId {
		let mut tree = self.tree.borrow_mut();
		let id = NodeId(tree.nodes.len());
		tree.nodes.push(NodeData {
			tag: tag.to_ascii_lowercase(),
			..NodeData::default()
		});
		id
	}

	pub fn create_element_with_id(&self, tag: &str, id: &str) -> NodeId {
		let node = self.create_element(tag);
		self.set_attribute(&node, "id", id);
		node
	}

	/// Moves `child` to the end of `parent`'s children, running connection callbacks as needed.
	pub fn append_child(&self, parent: NodeId, child: NodeId) {
		let (disconnected, connected) = {
			let mut tree = self.tree.borrow_mut();
			let disconnected = if tree.is_connected(child) { tree.callbacks_in(child, false) } else { Vec::new() };
			tree.detach(child);
			tree.node_mut(child).parent = Some(parent);
			tree.node_mut(parent).children.push(child);
			let connected = if tree.is_connected(child) { tree.callbacks_in(child, true) } else { Vec::new() };
			(disconnected, connected)
		};
		for (callback, node) in disconnected.into_iter().chain(connected) {
			callback(&node);
		}
	}

	/// Detaches `node` from its parent, running disconnection callbacks as needed.
	pub fn remove(&self, node: NodeId) {
		let disconnected = {
			let mut tree = self.tree.borrow_mut();
			let disconnected = if tree.is_connected(node) { tree.callbacks_in(node, false) } else { Vec::new() };
			tree.detach(node);
			disconnected
		};
		for (callback, node) in disconnected {
			callback(&node);
		}
	}

	/// Replaces `target`'s children the way the swap library does, then fires the after-swap event on `target`.
	pub fn swap_inner(&self, target: NodeId, children: &[NodeId]) {
		let old_children = self.children(target);
		for child in old_children {
			self.remove(child);
		}
		for &child in children {
			self.append_child(target, child);
		}
		self.dispatch(target, AFTER_SWAP);
	}

	/// Dispatches a bubbling event at `target`.
	pub fn dispatch(&self, target: NodeId, event: &str) {
		let span = trace_span!("dispatch", ?target, event);
		let _enter = span.enter();

		let snapshot: Vec<(ListenerId, Callback)> = {
			let tree = self.tree.borrow();
			let path: Vec<NodeId> = tree.ancestors_and_self(target).collect();
			let mut listeners: Vec<_> = tree
				.listeners
				.iter()
				.filter(|(_, listener)| listener.event == event)
				.filter_map(|(&id, listener)| {
					let depth = path.iter().position(|&node| node == listener.node)?;
					if listener.scope == ListenScope::Node && depth != 0 {
						return None;
					}
					Some((depth, id, listener.callback.clone()))
				})
				.collect();
			listeners.sort_by_key(|&(depth, id, _)| (depth, id));
			listeners.into_iter().map(|(_, id, callback)| (id, callback)).collect()
		};

		for (id, callback) in snapshot {
			if self.tree.borrow().listeners.contains_key(&id) {
				callback();
			}
		}
	}

	pub fn click(&self, target: NodeId) {
		self.dispatch(target, "click");
	}

	pub fn submit(&self, form: NodeId) {
		self.dispatch(form, "submit");
	}

	/// [`HeadlessDom::before_swap_as`] with the default [`BEFORE_SWAP`] event name.
	pub fn before_swap(&self, status: u16, origin: Option<NodeId>) -> bool {
		self.before_swap_as(BEFORE_SWAP, status, origin)
	}

	/// Announces a response through the document-wide `event` the way the swap library does
	/// and returns whether it would be swapped in.
	///
	/// Initially, only successful responses other than `204 No Content` are swapped.
	pub fn before_swap_as(&self, event_name: &str, status: u16, origin: Option<NodeId>) -> bool {
		let mut event = BeforeSwap {
			status,
			should_swap: (200..400).contains(&status) && status != 204,
			origin,
		};
		let snapshot: Vec<(ListenerId, SwapCallback<NodeId>)> = self
			.tree
			.borrow()
			.swap_listeners
			.iter()
			.filter(|(_, listener)| listener.event == event_name)
			.map(|(&id, listener)| (id, listener.callback.clone()))
			.collect();
		for (id, callback) in snapshot {
			if self.tree.borrow().swap_listeners.contains_key(&id) {
				callback(&mut event);
			}
		}
		event.should_swap
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.tree.borrow().node(node).children.clone()
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		self.tree.borrow().node(node).attributes.get(name).cloned()
	}

	#[must_use]
	pub fn has_class(&self, node: NodeId, class: &str) -> bool {
		self.tree.borrow().node(node).classes.contains(class)
	}

	#[must_use]
	pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
		self.tree.borrow().node(node).styles.get(property).cloned()
	}

	#[must_use]
	pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
		self.tree.borrow().listeners.values().filter(|listener| listener.node == node && listener.event == event).count()
	}

	#[must_use]
	pub fn total_listeners(&self) -> usize {
		self.tree.borrow().listeners.len()
	}

	#[must_use]
	pub fn swap_listener_count(&self) -> usize {
		self.tree.borrow().swap_listeners.len()
	}
}

/// One compound selector, like `button#edit.primary`.
#[derive(Debug, Default, PartialEq, Eq)]
struct Compound<'a> {
	tag: Option<&'a str>,
	id: Option<&'a str>,
	classes: Vec<&'a str>,
}

impl<'a> Compound<'a> {
	fn parse(selector: &'a str) -> Self {
		let mut compound = Self::default();
		let mut rest = selector.trim();
		let end = rest.find(|c: char| c == '#' || c == '.').unwrap_or(rest.len());
		if end > 0 {
			compound.tag = Some(&rest[..end]);
		}
		rest = &rest[end..];
		while let Some(sigil) = rest.chars().next() {
			let end = rest[1..].find(|c: char| c == '#' || c == '.').map_or(rest.len(), |end| end + 1);
			let name = &rest[1..end];
			if sigil == '#' {
				compound.id = Some(name);
			} else {
				compound.classes.push(name);
			}
			rest = &rest[end..];
		}
		compound
	}

	fn matches(&self, node: &NodeData) -> bool {
		self.tag.map_or(true, |tag| tag.eq_ignore_ascii_case(&node.tag))
			&& self.id.map_or(true, |id| node.attributes.get("id").map(String::as_str) == Some(id))
			&& self.classes.iter().all(|&class| node.classes.contains(class))
	}
}

impl Dom for HeadlessDom {
	type Node = NodeId;
	type Listener = ListenerId;

	fn query(&self, root: &NodeId, selector: &str) -> Option<NodeId> {
		let alternatives: Vec<_> = selector.split(',').map(Compound::parse).collect();
		let tree = self.tree.borrow();
		let found = tree.subtree(*root).into_iter().skip(1).find(|&node| alternatives.iter().any(|compound| compound.matches(tree.node(node))));
		found
	}

	fn is_connected(&self, node: &NodeId) -> bool {
		self.tree.borrow().is_connected(*node)
	}

	fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
		self.tree.borrow().ancestors_and_self(*node).any(|candidate| candidate == *ancestor)
	}

	fn set_class(&self, node: &NodeId, class: &str, present: bool) {
		let mut tree = self.tree.borrow_mut();
		let classes = &mut tree.node_mut(*node).classes;
		if present {
			classes.insert(class.to_owned());
		} else {
			classes.remove(class);
		}
	}

	fn set_style(&self, node: &NodeId, property: &str, value: &str) {
		trace!("{:?}.style.{} = {}", node, property, redact(value));
		self.tree.borrow_mut().node_mut(*node).styles.insert(property.to_owned(), value.to_owned());
	}

	fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
		trace!("{:?}[{}] = {}", node, name, redact(value));
		let mut tree = self.tree.borrow_mut();
		let data = tree.node_mut(*node);
		if name == "class" {
			data.classes = value.split_whitespace().map(str::to_owned).collect();
		}
		data.attributes.insert(name.to_owned(), value.to_owned());
	}

	fn listen(&self, node: &NodeId, event: &str, scope: ListenScope, callback: Callback) -> ListenerId {
		let mut tree = self.tree.borrow_mut();
		let id = tree.next_listener_id();
		tree.listeners.insert(
			id,
			Listener {
				node: *node,
				event: event.to_owned(),
				scope,
				callback,
			},
		);
		id
	}

	fn unlisten(&self, listener: ListenerId) {
		let mut tree = self.tree.borrow_mut();
		if tree.listeners.remove(&listener).is_none() && tree.swap_listeners.remove(&listener).is_none() {
			trace!("{:?} was already removed.", listener);
		}
	}
}

impl SwapEvents for HeadlessDom {
	fn listen_before_swap(&self, event: &str, callback: SwapCallback<NodeId>) -> ListenerId {
		let mut tree = self.tree.borrow_mut();
		let id = tree.next_listener_id();
		tree.swap_listeners.insert(
			id,
			SwapListener {
				event: event.to_owned(),
				callback,
			},
		);
		id
	}
}

impl ElementHost for HeadlessDom {
	fn is_defined(&self, tag: &str) -> bool {
		self.tree.borrow().definitions.contains_key(&tag.to_ascii_lowercase())
	}

	fn define(&self, tag: &str, callbacks: ElementCallbacks<NodeId>) -> Result<(), DefineError> {
		let tag = tag.to_ascii_lowercase();
		let reject = |reason: &str| {
			Err(DefineError {
				tag: tag.clone(),
				reason: reason.to_owned(),
			})
		};
		if !tag.starts_with(|c: char| c.is_ascii_lowercase()) || !tag.contains('-') {
			return reject("not a valid custom element name");
		}
		if self.is_defined(&tag) {
			return reject("already defined");
		}

		// Upgrade elements that are already in the document.
		let upgraded = {
			let mut tree = self.tree.borrow_mut();
			tree.definitions.insert(tag.clone(), callbacks.clone());
			let existing: Vec<NodeId> = tree.subtree(Self::DOCUMENT).into_iter().filter(|&node| tree.node(node).tag == tag).collect();
			existing
		};
		for node in upgraded {
			(callbacks.connected)(&node);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{cell::Cell, rc::Rc};

	#[test]
	fn selectors() {
		let dom = HeadlessDom::new();
		let root = dom.create_element("div");
		let button = dom.create_element_with_id("button", "edit-button");
		dom.set_attribute(&button, "class", "primary wide");
		dom.append_child(root, button);

		assert_eq!(dom.query(&root, "#edit-button"), Some(button));
		assert_eq!(dom.query(&root, "BUTTON.primary"), Some(button));
		assert_eq!(dom.query(&root, "button#edit-button.wide.primary"), Some(button));
		assert_eq!(dom.query(&root, "#nope, .wide"), Some(button));
		assert_eq!(dom.query(&root, "button.narrow"), None);
		assert_eq!(dom.query(&root, "div"), None);
	}

	#[test]
	fn events_bubble_and_respect_scope() {
		let dom = HeadlessDom::new();
		let outer = dom.create_element("div");
		let inner = dom.create_element("span");
		dom.append_child(outer, inner);

		let hits = Rc::new(Cell::new(0));
		let count = |hits: &Rc<Cell<usize>>| -> Callback {
			let hits = Rc::clone(hits);
			Rc::new(move || hits.set(hits.get() + 1))
		};
		dom.listen(&outer, "click", ListenScope::Subtree, count(&hits));
		let strict = dom.listen(&outer, "click", ListenScope::Node, count(&hits));

		dom.click(inner);
		assert_eq!(hits.get(), 1);
		dom.click(outer);
		assert_eq!(hits.get(), 3);

		dom.unlisten(strict);
		dom.click(outer);
		assert_eq!(hits.get(), 4);
	}

	#[test]
	fn listeners_removed_during_dispatch_do_not_run() {
		let dom = Rc::new(HeadlessDom::new());
		let node = dom.create_element("div");
		let ran = Rc::new(Cell::new(false));
		let victim = Rc::new(Cell::new(None));

		let remover: Callback = {
			let dom = Rc::clone(&dom);
			let victim = Rc::clone(&victim);
			Rc::new(move || {
				if let Some(id) = victim.take() {
					dom.unlisten(id);
				}
			})
		};
		dom.listen(&node, "click", ListenScope::Subtree, remover);
		let flag = Rc::clone(&ran);
		victim.set(Some(dom.listen(&node, "click", ListenScope::Subtree, Rc::new(move || flag.set(true)))));

		dom.click(node);
		assert!(!ran.get());
	}

	#[test]
	fn connection_callbacks() {
		let dom = HeadlessDom::new();
		let log = Rc::new(RefCell::new(Vec::new()));
		let push = |what: &'static str| -> ElementCallback<NodeId> {
			let log = Rc::clone(&log);
			Rc::new(move |node: &NodeId| log.borrow_mut().push((what, *node)))
		};
		dom.define(
			"x-widget",
			ElementCallbacks {
				connected: push("connected"),
				disconnected: push("disconnected"),
			},
		)
		.unwrap();

		let wrapper = dom.create_element("div");
		let widget = dom.create_element("x-widget");
		dom.append_child(wrapper, widget);
		assert!(log.borrow().is_empty());

		dom.append_child(dom.document(), wrapper);
		dom.remove(wrapper);
		assert_eq!(*log.borrow(), vec![("connected", widget), ("disconnected", widget)]);
	}

	#[test]
	fn swap_inner_replaces_children_and_fires_after_swap() {
		let dom = HeadlessDom::new();
		let target = dom.create_element("div");
		dom.append_child(dom.document(), target);
		let old = dom.create_element("p");
		dom.append_child(target, old);

		let swapped = Rc::new(Cell::new(false));
		let flag = Rc::clone(&swapped);
		dom.listen(&target, AFTER_SWAP, ListenScope::Node, Rc::new(move || flag.set(true)));

		let new = dom.create_element("p");
		dom.swap_inner(target, &[new]);
		assert!(swapped.get());
		assert_eq!(dom.children(target), vec![new]);
		assert!(!dom.is_connected(&old));
	}

	#[test]
	fn default_swap_policy() {
		let dom = HeadlessDom::new();
		assert!(dom.before_swap(200, None));
		assert!(!dom.before_swap(204, None));
		assert!(!dom.before_swap(404, None));
	}

	#[test]
	fn before_swap_reaches_only_listeners_of_its_event() {
		let dom = HeadlessDom::new();
		let forced = Rc::new(Cell::new(0));
		let count = Rc::clone(&forced);
		dom.listen_before_swap(
			"app:beforeSwap",
			Rc::new(move |event: &mut BeforeSwap<NodeId>| {
				count.set(count.get() + 1);
				event.should_swap = true;
			}),
		);

		assert!(!dom.before_swap(404, None));
		assert!(dom.before_swap_as("app:beforeSwap", 404, None));
		assert_eq!(forced.get(), 1);
	}
}
