//! `<todo-detail>`: a read-only detail panel that flips into an edit form.
//!
//! The edit form is submitted by the swap library, which then replaces the form's content. The
//! widget flips back to the detail panel optimistically on submit and re-binds the form once the
//! replacement arrives.
//!
//! Deleting the record answers with `404 Not Found` and empty content. The swap library drops
//! error responses by default, so while bound, the widget forces swaps of such responses to
//! requests that originated inside it. That is what removes a deleted item from the page.

use crate::{
	dom::{locate_or_warn, Dom, ListenScope},
	lifecycle::{Bindable, Binding, Reaction},
	swap::{BeforeSwap, SwapEvents, AFTER_SWAP},
};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandableDetailConfig {
	pub details: String,
	pub edit_form: String,
	pub edit_button: String,
	pub cancel_button: String,
	pub delete_button: String,
	pub click_event: String,
	pub submit_event: String,
	/// Fired on the edit form when the swap library replaced (some of) its content.
	pub form_swap_event: String,
	/// Responses with these statuses are swapped in even though the swap library would drop them.
	pub force_swap_statuses: Vec<u16>,
}
impl Default for ExpandableDetailConfig {
	fn default() -> Self {
		Self {
			details: "#details".to_owned(),
			edit_form: "#edit-form".to_owned(),
			edit_button: "#edit-button".to_owned(),
			cancel_button: "#cancel-button".to_owned(),
			delete_button: "#delete-button".to_owned(),
			click_event: "click".to_owned(),
			submit_event: "submit".to_owned(),
			form_swap_event: AFTER_SWAP.to_owned(),
			force_swap_statuses: vec![404],
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailSlot {
	/// The detail panel, its edit affordance and the delete affordance.
	View,
	/// The edit form and its cancel affordance.
	Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailMessage {
	Edit,
	Cancel,
	Submit,
	FormReplaced,
}

#[derive(Debug, Clone)]
pub struct ExpandableDetail<N> {
	config: ExpandableDetailConfig,
	details: Option<N>,
	edit_form: Option<N>,
	edit_button: Option<N>,
	cancel_button: Option<N>,
	delete_button: Option<N>,
	editing: bool,
}

impl<N> Default for ExpandableDetail<N> {
	fn default() -> Self {
		Self::new(ExpandableDetailConfig::default())
	}
}

impl<N> ExpandableDetail<N> {
	pub const TAG: &'static str = "todo-detail";

	#[must_use]
	pub fn new(config: ExpandableDetailConfig) -> Self {
		Self {
			config,
			details: None,
			edit_form: None,
			edit_button: None,
			cancel_button: None,
			delete_button: None,
			editing: false,
		}
	}

	#[must_use]
	pub fn is_editing(&self) -> bool {
		self.editing
	}

	#[must_use]
	pub fn delete_button(&self) -> Option<&N> {
		self.delete_button.as_ref()
	}

	pub fn enter_edit_mode<D: Dom<Node = N>>(&mut self, dom: &D) {
		self.editing = true;
		self.render(dom);
	}

	pub fn exit_edit_mode<D: Dom<Node = N>>(&mut self, dom: &D) {
		self.editing = false;
		self.render(dom);
	}

	fn render<D: Dom<Node = N>>(&self, dom: &D) {
		let display = |shown| if shown { "block" } else { "none" };
		if let Some(details) = &self.details {
			dom.set_style(details, "display", display(!self.editing));
		}
		if let Some(edit_form) = &self.edit_form {
			dom.set_style(edit_form, "display", display(self.editing));
		}
	}
}

impl<D: SwapEvents> Bindable<D> for ExpandableDetail<D::Node> {
	type Slot = DetailSlot;
	type Message = DetailMessage;
	const TAG: &'static str = Self::TAG;

	fn discover(&mut self, dom: &D, root: &D::Node, slots: Option<&[DetailSlot]>) {
		let wants = |slot| slots.map_or(true, |slots| slots.contains(&slot));
		let config = &self.config;
		if wants(DetailSlot::View) {
			self.details = locate_or_warn(dom, root, Self::TAG, "detail panel", &config.details);
			self.edit_button = locate_or_warn(dom, root, Self::TAG, "edit affordance", &config.edit_button);
			self.delete_button = locate_or_warn(dom, root, Self::TAG, "delete affordance", &config.delete_button);
		}
		if wants(DetailSlot::Form) {
			self.edit_form = locate_or_warn(dom, root, Self::TAG, "edit form", &config.edit_form);
			self.cancel_button = locate_or_warn(dom, root, Self::TAG, "cancel affordance", &config.cancel_button);
		}
		if slots.is_some() {
			// Newly swapped-in panels follow the current mode.
			self.render(dom);
		}
	}

	fn reset(&mut self, dom: &D) {
		self.exit_edit_mode(dom);
	}

	fn bindings(&self) -> Vec<Binding<D::Node, DetailSlot, DetailMessage>> {
		let config = &self.config;
		let bind = |slot, node: &Option<D::Node>, event: &str, scope, message| {
			node.clone().map(|node| Binding {
				slot,
				node,
				event: event.to_owned(),
				scope,
				message,
			})
		};
		vec![
			bind(DetailSlot::View, &self.edit_button, config.click_event.as_str(), ListenScope::Subtree, DetailMessage::Edit),
			bind(DetailSlot::Form, &self.edit_form, config.submit_event.as_str(), ListenScope::Subtree, DetailMessage::Submit),
			bind(DetailSlot::Form, &self.edit_form, config.form_swap_event.as_str(), ListenScope::Subtree, DetailMessage::FormReplaced),
			bind(DetailSlot::Form, &self.cancel_button, config.click_event.as_str(), ListenScope::Subtree, DetailMessage::Cancel),
		]
		.into_iter()
		.flatten()
		.collect()
	}

	fn handle(&mut self, dom: &D, message: DetailMessage) -> Reaction<DetailSlot> {
		debug!("<{}> {:?}", Self::TAG, message);
		match message {
			DetailMessage::Edit => self.enter_edit_mode(dom),
			// Submission doesn't wait for the response. Its swap delivers fresh details.
			DetailMessage::Cancel | DetailMessage::Submit => self.exit_edit_mode(dom),
			DetailMessage::FormReplaced => return Reaction::Rediscover(&[DetailSlot::Form]),
		}
		Reaction::Stay
	}

	fn observes_swaps(&self) -> bool {
		!self.config.force_swap_statuses.is_empty()
	}

	fn before_swap(&self, dom: &D, root: &D::Node, event: &mut BeforeSwap<D::Node>) {
		if !self.config.force_swap_statuses.contains(&event.status) {
			return;
		}
		match &event.origin {
			Some(origin) if dom.contains(root, origin) => {
				if !event.should_swap {
					debug!("<{}> forces the swap of a {} response.", Self::TAG, event.status);
				}
				event.should_swap = true;
			}
			_ => trace!("<{}> ignores a {} response from elsewhere.", Self::TAG, event.status),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		headless::{HeadlessDom, NodeId},
		lifecycle::Widget,
		swap::{SwapBus, SwapConfig},
	};
	use std::rc::Rc;

	struct Fixture {
		dom: Rc<HeadlessDom>,
		widget: Widget<HeadlessDom, ExpandableDetail<NodeId>>,
		details: NodeId,
		edit_form: NodeId,
		edit_button: NodeId,
		cancel_button: NodeId,
		delete_button: NodeId,
	}

	fn fixture_with(bus: Option<Rc<SwapBus<HeadlessDom>>>) -> Fixture {
		let dom = bus.as_ref().map_or_else(|| Rc::new(HeadlessDom::new()), |bus| Rc::clone(bus.dom()));
		let bus = bus.unwrap_or_else(|| SwapBus::new(Rc::clone(&dom), SwapConfig::default()));

		let root = dom.create_element("todo-detail");
		let details = dom.create_element_with_id("div", "details");
		let edit_button = dom.create_element_with_id("button", "edit-button");
		let delete_button = dom.create_element_with_id("button", "delete-button");
		dom.append_child(details, edit_button);
		dom.append_child(details, delete_button);
		let edit_form = dom.create_element_with_id("form", "edit-form");
		let title = dom.create_element("input");
		dom.set_attribute(&title, "value", "Buy milk");
		let cancel_button = dom.create_element_with_id("button", "cancel-button");
		dom.append_child(edit_form, title);
		dom.append_child(edit_form, cancel_button);
		dom.append_child(root, details);
		dom.append_child(root, edit_form);
		dom.append_child(dom.document(), root);

		let widget = Widget::new(bus, root, ExpandableDetail::default());
		widget.on_attach();
		Fixture {
			dom,
			widget,
			details,
			edit_form,
			edit_button,
			cancel_button,
			delete_button,
		}
	}

	fn fixture() -> Fixture {
		fixture_with(None)
	}

	fn shown(f: &Fixture) -> (Option<String>, Option<String>) {
		(f.dom.style(f.details, "display"), f.dom.style(f.edit_form, "display"))
	}

	fn viewing() -> (Option<String>, Option<String>) {
		(Some("block".to_owned()), Some("none".to_owned()))
	}

	fn editing() -> (Option<String>, Option<String>) {
		(Some("none".to_owned()), Some("block".to_owned()))
	}

	#[test]
	fn starts_in_view_mode() {
		let f = fixture();
		assert_eq!(shown(&f), viewing());
		assert_eq!(f.widget.with_state(|state, _| state.delete_button().copied()), Some(f.delete_button));
	}

	#[test]
	fn edit_and_cancel() {
		let f = fixture();
		f.dom.click(f.edit_button);
		assert_eq!(shown(&f), editing());
		f.dom.click(f.cancel_button);
		assert_eq!(shown(&f), viewing());
	}

	#[test]
	fn submit_returns_to_details_before_any_response() {
		let f = fixture();
		f.dom.click(f.edit_button);
		f.dom.submit(f.edit_form);
		assert_eq!(shown(&f), viewing());
		assert!(!f.widget.with_state(|state, _| state.is_editing()));
	}

	#[test]
	fn toggling_leaves_form_content_alone() {
		let f = fixture();
		let title = f.dom.query(&f.edit_form, "input").unwrap();
		f.widget.with_state(|state, dom| {
			state.enter_edit_mode(dom);
			state.exit_edit_mode(dom);
		});
		assert_eq!(shown(&f), viewing());
		assert_eq!(f.dom.attribute(title, "value").as_deref(), Some("Buy milk"));
	}

	#[test]
	fn form_swap_rebinds_only_the_form() {
		let f = fixture();
		let fresh_cancel = f.dom.create_element_with_id("button", "cancel-button");
		f.dom.swap_inner(f.edit_form, &[fresh_cancel]);

		assert_eq!(f.dom.listener_count(f.cancel_button, "click"), 0);
		assert_eq!(f.dom.listener_count(fresh_cancel, "click"), 1);
		assert_eq!(f.dom.listener_count(f.edit_form, "submit"), 1);
		assert_eq!(f.dom.listener_count(f.edit_button, "click"), 1);
		// The bubbling after-swap event doesn't rebind the whole widget.
		assert_eq!(shown(&f), viewing());

		f.dom.click(f.edit_button);
		f.dom.click(fresh_cancel);
		assert_eq!(shown(&f), viewing());
	}

	#[test]
	fn form_swap_keeps_edit_mode() {
		let f = fixture();
		f.dom.click(f.edit_button);
		let fresh_cancel = f.dom.create_element_with_id("button", "cancel-button");
		f.dom.swap_inner(f.edit_form, &[fresh_cancel]);
		assert_eq!(shown(&f), editing());
	}

	#[test]
	fn not_found_from_inside_forces_the_swap() {
		let f = fixture();
		assert!(f.dom.before_swap(404, Some(f.delete_button)));
	}

	#[test]
	fn not_found_from_elsewhere_is_left_alone() {
		let f = fixture();
		let elsewhere = f.dom.create_element("button");
		f.dom.append_child(f.dom.document(), elsewhere);
		assert!(!f.dom.before_swap(404, Some(elsewhere)));
		assert!(!f.dom.before_swap(404, None));
	}

	#[test]
	fn other_error_statuses_are_left_alone() {
		let f = fixture();
		assert!(!f.dom.before_swap(500, Some(f.delete_button)));
	}

	#[test]
	fn detached_widgets_stop_forcing_swaps() {
		let f = fixture();
		f.widget.on_detach();
		assert_eq!(f.dom.swap_listener_count(), 0);
		assert!(!f.dom.before_swap(404, Some(f.delete_button)));
	}

	#[test]
	fn many_widgets_share_one_document_listener() {
		let dom = Rc::new(HeadlessDom::new());
		let bus = SwapBus::new(Rc::clone(&dom), SwapConfig::default());
		let first = fixture_with(Some(Rc::clone(&bus)));
		let second = fixture_with(Some(bus));
		assert_eq!(dom.swap_listener_count(), 1);

		second.widget.on_detach();
		assert_eq!(dom.swap_listener_count(), 1);
		assert!(dom.before_swap(404, Some(first.delete_button)));
		assert!(!dom.before_swap(404, Some(second.delete_button)));
	}
}
