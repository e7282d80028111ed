//! The consumed side of the swap library's event contract.
//!
//! The swap library announces each response with a document-wide *before swap* event whose
//! should-swap decision handlers may overwrite, and fires an *after swap* event on the element
//! whose descendants it just replaced.

use crate::dom::Dom;
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{debug, instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};

pub const BEFORE_SWAP: &str = "htmx:beforeSwap";
pub const AFTER_SWAP: &str = "htmx:afterSwap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
	pub before_swap_event: String,
	pub after_swap_event: String,
}
impl Default for SwapConfig {
	fn default() -> Self {
		Self {
			before_swap_event: BEFORE_SWAP.to_owned(),
			after_swap_event: AFTER_SWAP.to_owned(),
		}
	}
}

/// The mutable part of a before-swap event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeSwap<N> {
	/// HTTP status of the response about to be swapped in.
	pub status: u16,
	/// Whether the swap library will perform the swap. Handlers may overwrite this.
	pub should_swap: bool,
	/// The element that issued the request, if known.
	pub origin: Option<N>,
}

pub type SwapCallback<N> = Rc<dyn Fn(&mut BeforeSwap<N>)>;

/// A [`Dom`] that can deliver the swap library's document-wide before-swap event.
pub trait SwapEvents: Dom {
	fn listen_before_swap(&self, event: &str, callback: SwapCallback<Self::Node>) -> Self::Listener;
}

pub trait SwapObserver<D: Dom> {
	fn before_swap(&self, dom: &D, event: &mut BeforeSwap<D::Node>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fans the document-wide before-swap event out to every subscribed widget.
///
/// Exactly one document listener is installed while there is at least one subscriber,
/// and it's removed again when the last one unsubscribes.
pub struct SwapBus<D: SwapEvents> {
	dom: Rc<D>,
	config: SwapConfig,
	state: RefCell<BusState<D>>,
}

struct BusState<D: SwapEvents> {
	next_id: u64,
	subscribers: HashMap<SubscriptionId, Weak<dyn SwapObserver<D>>>,
	listener: Option<D::Listener>,
}

impl<D: SwapEvents> Debug for SwapBus<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("SwapBus")
			.field("config", &self.config)
			.field("subscribers", &state.subscribers.len())
			.field("listener", &state.listener)
			.finish()
	}
}

impl<D: SwapEvents> SwapBus<D> {
	#[must_use]
	pub fn new(dom: Rc<D>, config: SwapConfig) -> Rc<Self> {
		Rc::new(Self {
			dom,
			config,
			state: RefCell::new(BusState {
				next_id: 0,
				subscribers: HashMap::new(),
				listener: None,
			}),
		})
	}

	#[must_use]
	pub fn dom(&self) -> &Rc<D> {
		&self.dom
	}

	#[must_use]
	pub fn config(&self) -> &SwapConfig {
		&self.config
	}

	pub fn subscribe(self: &Rc<Self>, observer: Weak<dyn SwapObserver<D>>) -> SubscriptionId {
		let mut state = self.state.borrow_mut();
		let id = SubscriptionId(state.next_id);
		state.next_id += 1;
		state.subscribers.insert(id, observer);

		if state.listener.is_none() {
			let bus = Rc::downgrade(self);
			let callback: SwapCallback<D::Node> = Rc::new(move |event: &mut BeforeSwap<D::Node>| {
				if let Some(bus) = bus.upgrade() {
					bus.dispatch(event);
				}
			});
			state.listener = Some(self.dom.listen_before_swap(&self.config.before_swap_event, callback));
			debug!("Installed the document-wide {:?} listener.", self.config.before_swap_event);
		}
		trace!("{} swap subscriber(s).", state.subscribers.len());
		if STATIC_MAX_LEVEL >= Level::WARN && state.subscribers.len() >= 1000 {
			warn!(
				"There are {} swap subscribers.\n\
				This may point to widgets that are dropped without being detached.",
				state.subscribers.len()
			)
		}
		id
	}

	/// Safe to call with an id that was already unsubscribed.
	#[instrument(skip(self))]
	pub fn unsubscribe(&self, id: SubscriptionId) {
		let listener = {
			let mut state = self.state.borrow_mut();
			state.subscribers.remove(&id);
			trace!("{} swap subscriber(s).", state.subscribers.len());
			if state.subscribers.is_empty() {
				state.listener.take()
			} else {
				None
			}
		};
		if let Some(listener) = listener {
			self.dom.unlisten(listener);
			debug!("Removed the document-wide {:?} listener.", self.config.before_swap_event);
		}
	}

	/// Runs every live subscriber against `event`.
	pub fn dispatch(&self, event: &mut BeforeSwap<D::Node>) {
		let subscribers: Vec<_> = self.state.borrow().subscribers.values().cloned().collect();
		for subscriber in subscribers {
			if let Some(subscriber) = subscriber.upgrade() {
				subscriber.before_swap(&self.dom, event);
			}
		}
	}

	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.state.borrow().subscribers.len()
	}

	#[must_use]
	pub fn is_listening(&self) -> bool {
		self.state.borrow().listener.is_some()
	}
}
