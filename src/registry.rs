//! Custom element registration.
//!
//! Each tag is defined at most once per document. Defining an already-defined tag is a no-op,
//! whether this [`Registry`] or some other script defined it first.

use crate::{
	lifecycle::{Bindable, Lifecycle, Signal, Widget},
	swap::{SwapBus, SwapConfig, SwapEvents},
};
use core::fmt::{self, Debug, Display, Formatter};
use hashbrown::HashSet;
use std::{cell::RefCell, error::Error, rc::Rc};
use tracing::{debug, info, instrument, warn};

pub type ElementCallback<N> = Rc<dyn Fn(&N)>;

/// What the host calls when an element with a defined tag enters or leaves the document.
pub struct ElementCallbacks<N> {
	pub connected: ElementCallback<N>,
	pub disconnected: ElementCallback<N>,
}
impl<N> Clone for ElementCallbacks<N> {
	fn clone(&self) -> Self {
		Self {
			connected: Rc::clone(&self.connected),
			disconnected: Rc::clone(&self.disconnected),
		}
	}
}
impl<N> Debug for ElementCallbacks<N> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ElementCallbacks").finish_non_exhaustive()
	}
}

/// A [`SwapEvents`] DOM with a custom element registry.
pub trait ElementHost: SwapEvents {
	fn is_defined(&self, tag: &str) -> bool;

	/// # Errors
	///
	/// Iff the host rejects the definition, for example because `tag` isn't a valid custom element name
	/// or was already defined.
	fn define(&self, tag: &str, callbacks: ElementCallbacks<Self::Node>) -> Result<(), DefineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineError {
	pub tag: String,
	pub reason: String,
}
impl Display for DefineError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Could not define <{}>: {}", self.tag, self.reason)
	}
}
impl Error for DefineError {}

type Instances<N> = Rc<RefCell<Vec<(N, Rc<dyn Lifecycle>)>>>;

/// Maps live widget roots to their [`Widget`]s.
pub struct Registry<D: ElementHost> {
	bus: Rc<SwapBus<D>>,
	defined: RefCell<HashSet<String>>,
	instances: Instances<D::Node>,
}

impl<D: ElementHost> Debug for Registry<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("bus", &self.bus)
			.field("defined", &self.defined.borrow())
			.field("instances", &self.instances.borrow().len())
			.finish()
	}
}

impl<D: ElementHost> Registry<D> {
	#[must_use]
	pub fn new(dom: Rc<D>, config: SwapConfig) -> Self {
		Self {
			bus: SwapBus::new(dom, config),
			defined: RefCell::default(),
			instances: Rc::default(),
		}
	}

	#[must_use]
	pub fn bus(&self) -> &Rc<SwapBus<D>> {
		&self.bus
	}

	/// Defines [`Bindable::TAG`] with widgets created by `make`.
	///
	/// # Errors
	///
	/// See [`Registry::define_as`].
	pub fn define<B, F>(&self, make: F) -> Result<bool, DefineError>
	where
		B: Bindable<D>,
		F: 'static + Fn() -> B,
	{
		self.define_as(B::TAG, make)
	}

	/// Defines `tag` so that each element with it gets its own widget created by `make`.
	///
	/// Returns `Ok(false)` without doing anything if `tag` is already defined.
	///
	/// # Errors
	///
	/// Iff the host rejects the definition.
	#[instrument(skip(self, make))]
	pub fn define_as<B, F>(&self, tag: &str, make: F) -> Result<bool, DefineError>
	where
		B: Bindable<D>,
		F: 'static + Fn() -> B,
	{
		if self.defined.borrow().contains(tag) || self.bus.dom().is_defined(tag) {
			debug!("<{}> is already defined.", tag);
			return Ok(false);
		}

		let connected = {
			let bus = Rc::clone(&self.bus);
			let instances = Rc::clone(&self.instances);
			move |root: &D::Node| {
				let existing = instances.borrow().iter().find(|(node, _)| node == root).map(|(_, widget)| Rc::clone(widget));
				let widget = existing.unwrap_or_else(|| {
					let widget: Rc<dyn Lifecycle> = Rc::new(Widget::new(Rc::clone(&bus), root.clone(), make()));
					instances.borrow_mut().push((root.clone(), Rc::clone(&widget)));
					widget
				});
				widget.signal(Signal::Attach);
			}
		};

		let disconnected = {
			let instances = Rc::clone(&self.instances);
			move |root: &D::Node| {
				let widget = {
					let mut instances = instances.borrow_mut();
					match instances.iter().position(|(node, _)| node == root) {
						Some(index) => instances.swap_remove(index).1,
						None => return warn!("Disconnected element had no widget."),
					}
				};
				widget.signal(Signal::Detach);
			}
		};

		self.bus.dom().define(
			tag,
			ElementCallbacks {
				connected: Rc::new(connected),
				disconnected: Rc::new(disconnected),
			},
		)?;
		self.defined.borrow_mut().insert(tag.to_owned());
		info!("Defined <{}>.", tag);
		Ok(true)
	}

	#[must_use]
	pub fn instance_count(&self) -> usize {
		self.instances.borrow().len()
	}

	#[must_use]
	pub fn widget_for(&self, root: &D::Node) -> Option<Rc<dyn Lifecycle>> {
		self.instances.borrow().iter().find(|(node, _)| node == root).map(|(_, widget)| Rc::clone(widget))
	}
}
