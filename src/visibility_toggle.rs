//! `<password-input-control>`: a secret-entry field with a pair of eye icons.
//!
//! Exactly one icon is visible at a time. The closed eye is shown while the field is masked and
//! reveals it when clicked. The open eye is shown while the field is plain text and masks it
//! again when clicked.

use crate::{
	dom::{locate_or_warn, Dom, ListenScope},
	lifecycle::{Bindable, Binding, Reaction},
	swap::SwapEvents,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityToggleConfig {
	pub field: String,
	pub open_eye: String,
	pub closed_eye: String,
	pub hidden_class: String,
	pub click_event: String,
}
impl Default for VisibilityToggleConfig {
	fn default() -> Self {
		Self {
			field: "#password".to_owned(),
			open_eye: "#open-eye".to_owned(),
			closed_eye: "#closed-eye".to_owned(),
			hidden_class: "hidden".to_owned(),
			click_event: "click".to_owned(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleSlot {
	OpenEye,
	ClosedEye,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleMessage {
	Reveal,
	Conceal,
}

#[derive(Debug, Clone)]
pub struct VisibilityToggle<N> {
	config: VisibilityToggleConfig,
	field: Option<N>,
	open_eye: Option<N>,
	closed_eye: Option<N>,
	revealed: bool,
}

impl<N> Default for VisibilityToggle<N> {
	fn default() -> Self {
		Self::new(VisibilityToggleConfig::default())
	}
}

impl<N> VisibilityToggle<N> {
	pub const TAG: &'static str = "password-input-control";

	#[must_use]
	pub fn new(config: VisibilityToggleConfig) -> Self {
		Self {
			config,
			field: None,
			open_eye: None,
			closed_eye: None,
			revealed: false,
		}
	}

	#[must_use]
	pub fn is_revealed(&self) -> bool {
		self.revealed
	}

	/// Shows the field's content in plain text and swaps the closed eye for the open one.
	pub fn reveal<D: Dom<Node = N>>(&mut self, dom: &D) {
		self.revealed = true;
		self.render(dom);
	}

	/// Masks the field's content and swaps the open eye for the closed one.
	pub fn conceal<D: Dom<Node = N>>(&mut self, dom: &D) {
		self.revealed = false;
		self.render(dom);
	}

	fn render<D: Dom<Node = N>>(&self, dom: &D) {
		if let Some(field) = &self.field {
			dom.set_attribute(field, "type", if self.revealed { "text" } else { "password" });
		}
		if let Some(open_eye) = &self.open_eye {
			dom.set_class(open_eye, &self.config.hidden_class, !self.revealed);
		}
		if let Some(closed_eye) = &self.closed_eye {
			dom.set_class(closed_eye, &self.config.hidden_class, self.revealed);
		}
	}
}

impl<D: SwapEvents> Bindable<D> for VisibilityToggle<D::Node> {
	type Slot = ToggleSlot;
	type Message = ToggleMessage;
	const TAG: &'static str = Self::TAG;

	fn discover(&mut self, dom: &D, root: &D::Node, slots: Option<&[ToggleSlot]>) {
		let wants = |slot| slots.map_or(true, |slots| slots.contains(&slot));
		self.field = locate_or_warn(dom, root, Self::TAG, "secret field", &self.config.field);
		if wants(ToggleSlot::OpenEye) {
			self.open_eye = locate_or_warn(dom, root, Self::TAG, "open-eye affordance", &self.config.open_eye);
		}
		if wants(ToggleSlot::ClosedEye) {
			self.closed_eye = locate_or_warn(dom, root, Self::TAG, "closed-eye affordance", &self.config.closed_eye);
		}
	}

	fn reset(&mut self, dom: &D) {
		self.conceal(dom);
	}

	fn bindings(&self) -> Vec<Binding<D::Node, ToggleSlot, ToggleMessage>> {
		let click = |slot, node: &Option<D::Node>, message| {
			node.clone().map(|node| Binding {
				slot,
				node,
				event: self.config.click_event.clone(),
				scope: ListenScope::Subtree,
				message,
			})
		};
		click(ToggleSlot::ClosedEye, &self.closed_eye, ToggleMessage::Reveal)
			.into_iter()
			.chain(click(ToggleSlot::OpenEye, &self.open_eye, ToggleMessage::Conceal))
			.collect()
	}

	fn handle(&mut self, dom: &D, message: ToggleMessage) -> Reaction<ToggleSlot> {
		debug!("<{}> {:?}", Self::TAG, message);
		match message {
			ToggleMessage::Reveal => self.reveal(dom),
			ToggleMessage::Conceal => self.conceal(dom),
		}
		Reaction::Stay
	}
}
