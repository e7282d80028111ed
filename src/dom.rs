//! The DOM-event abstraction widgets are written against.
//!
//! Backends provide node handles, scoped child queries and listener registration.
//! Listener callbacks take no arguments: anything a widget needs to know about an event
//! is decided when the listener is bound.

use core::fmt::{self, Debug, Display, Formatter};
use std::{error::Error, rc::Rc};
use tracing::warn;

/// A listener callback. Shared so backends can snapshot listeners before dispatching.
pub type Callback = Rc<dyn Fn()>;

/// Which events reach a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenScope {
	/// Events targeted at the node or bubbling up from any of its descendants.
	Subtree,
	/// Only events whose target is the node itself.
	Node,
}

pub trait Dom: 'static {
	/// A handle to an element. Equality is node identity.
	type Node: Clone + PartialEq + Debug + 'static;
	/// Proof of a registered listener, consumed by [`Dom::unlisten`].
	type Listener: Debug + 'static;

	/// Finds the first descendant of `root` (not `root` itself) that matches `selector`.
	fn query(&self, root: &Self::Node, selector: &str) -> Option<Self::Node>;

	fn is_connected(&self, node: &Self::Node) -> bool;

	/// Inclusive, like [***Node.contains***](https://developer.mozilla.org/en-US/docs/Web/API/Node/contains).
	fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

	fn set_class(&self, node: &Self::Node, class: &str, present: bool);
	fn set_style(&self, node: &Self::Node, property: &str, value: &str);
	fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

	fn listen(&self, node: &Self::Node, event: &str, scope: ListenScope, callback: Callback) -> Self::Listener;
	fn unlisten(&self, listener: Self::Listener);
}

/// An expected child role is absent from a widget's markup.
///
/// This is logged and the corresponding binding is skipped. It never crosses the widget boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingChildError {
	pub widget: &'static str,
	pub role: &'static str,
	pub selector: String,
}
impl Display for MissingChildError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "<{}> has no {} child matching {:?}", self.widget, self.role, self.selector)
	}
}
impl Error for MissingChildError {}

/// Locates a child of `root` by role.
///
/// # Errors
///
/// Iff no descendant of `root` matches `selector`.
pub fn locate<D: Dom + ?Sized>(dom: &D, root: &D::Node, widget: &'static str, role: &'static str, selector: &str) -> Result<D::Node, MissingChildError> {
	dom.query(root, selector).ok_or_else(|| MissingChildError {
		widget,
		role,
		selector: selector.to_owned(),
	})
}

/// Like [`locate`], but logs a missing child instead of returning the error.
pub fn locate_or_warn<D: Dom + ?Sized>(dom: &D, root: &D::Node, widget: &'static str, role: &'static str, selector: &str) -> Option<D::Node> {
	locate(dom, root, widget, role, selector).map_err(|error| warn!("{}; skipping its bindings.", error)).ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::headless::HeadlessDom;

	#[test]
	fn missing_child_is_reported_with_role_and_selector() {
		let dom = HeadlessDom::new();
		let root = dom.create_element("password-input-control");
		dom.append_child(dom.document(), root);

		let error = locate(&dom, &root, "password-input-control", "secret field", "#password").unwrap_err();
		assert_eq!(error.role, "secret field");
		assert_eq!(error.to_string(), r##"<password-input-control> has no secret field child matching "#password""##);
		assert_eq!(locate_or_warn(&dom, &root, "password-input-control", "secret field", "#password"), None);
	}

	#[test]
	fn locate_is_scoped_to_the_root() {
		let dom = HeadlessDom::new();
		let outside = dom.create_element_with_id("input", "password");
		dom.append_child(dom.document(), outside);
		let root = dom.create_element("div");
		dom.append_child(dom.document(), root);
		assert!(locate(&dom, &root, "div", "secret field", "#password").is_err());

		let inside = dom.create_element_with_id("input", "password");
		dom.append_child(root, inside);
		assert_eq!(locate(&dom, &root, "div", "secret field", "#password"), Ok(inside));
	}
}
