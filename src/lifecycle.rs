//! The attach / rebind / detach contract shared by every widget.
//!
//! A widget's lifecycle is the two-state machine [`Phase`], driven by three [`Signal`]s.
//! [`transition`] is pure: it only names the [`Effect`]s, which [`Widget`] then performs.

use crate::{
	dom::{Callback, ListenScope},
	swap::{BeforeSwap, SubscriptionId, SwapBus, SwapEvents, SwapObserver},
};
use core::fmt::{self, Debug, Formatter};
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Unbound,
	Bound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
	/// The root node entered the document.
	Attach,
	/// The swap library replaced the root's descendants. The root itself persists.
	Replace,
	/// The root node left the document.
	Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
	/// Release every listener and swap subscription.
	Unbind,
	/// Locate children by role and restore the initial visual state.
	Discover,
	/// Register one listener per affordance.
	Bind,
}

const BIND: &[Effect] = &[Effect::Unbind, Effect::Discover, Effect::Bind];
const REBIND: &[Effect] = &[Effect::Unbind, Effect::Discover, Effect::Bind];
const UNBIND: &[Effect] = &[Effect::Unbind];
const NONE: &[Effect] = &[];

#[must_use]
pub fn transition(phase: Phase, signal: Signal) -> (Phase, &'static [Effect]) {
	match (phase, signal) {
		(Phase::Unbound, Signal::Attach) => (Phase::Bound, BIND),
		(Phase::Bound, Signal::Attach) | (Phase::Bound, Signal::Replace) => (Phase::Bound, REBIND),
		(Phase::Bound, Signal::Detach) => (Phase::Unbound, UNBIND),
		// Queued behind a detach.
		(Phase::Unbound, Signal::Replace) | (Phase::Unbound, Signal::Detach) => (Phase::Unbound, NONE),
	}
}

/// One listener a widget wants registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding<N, S, M> {
	pub slot: S,
	pub node: N,
	pub event: String,
	pub scope: ListenScope,
	pub message: M,
}

/// What the [`Widget`] should do after a widget handled a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction<S: 'static> {
	Stay,
	/// Re-locate and re-bind only the children in these slots.
	Rediscover(&'static [S]),
}

/// The per-widget-type half of the lifecycle.
///
/// Implementors hold their located children and toggle state. They never register listeners
/// themselves: they describe them through [`Bindable::bindings`] and react to the resulting
/// [`Bindable::Message`]s in [`Bindable::handle`].
pub trait Bindable<D: SwapEvents>: 'static {
	/// Groups of children that are located and bound together.
	type Slot: Copy + PartialEq + Debug + 'static;
	type Message: Copy + Debug + 'static;

	/// The widget's tag name, for logging and default registration.
	const TAG: &'static str;

	/// Locates the children of `slots`, or all of them if `slots` is [`None`].
	///
	/// Previously located children in those slots must be forgotten, since they may be detached.
	fn discover(&mut self, dom: &D, root: &D::Node, slots: Option<&[Self::Slot]>);

	/// Restores the initial visual state.
	fn reset(&mut self, dom: &D);

	/// At most one binding per affordance and event.
	fn bindings(&self) -> Vec<Binding<D::Node, Self::Slot, Self::Message>>;

	fn handle(&mut self, dom: &D, message: Self::Message) -> Reaction<Self::Slot>;

	/// Whether this widget wants [`Bindable::before_swap`] calls while bound.
	fn observes_swaps(&self) -> bool {
		false
	}

	#[allow(unused_variables)]
	fn before_swap(&self, dom: &D, root: &D::Node, event: &mut BeforeSwap<D::Node>) {}
}

/// Type-erased handle to a [`Widget`], as kept by the [`Registry`](crate::Registry).
pub trait Lifecycle {
	fn signal(&self, signal: Signal);
	fn phase(&self) -> Phase;
	fn listener_count(&self) -> usize;
}

/// Drives a [`Bindable`] through its [`Phase`]s.
///
/// Cloning produces another handle to the same instance.
pub struct Widget<D: SwapEvents, B: Bindable<D>>(Rc<RefCell<Host<D, B>>>);

impl<D: SwapEvents, B: Bindable<D>> Clone for Widget<D, B> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<D: SwapEvents, B: Bindable<D>> Debug for Widget<D, B> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.0.try_borrow() {
			Ok(host) => f
				.debug_struct("Widget")
				.field("tag", &B::TAG)
				.field("root", &host.root)
				.field("phase", &host.phase)
				.field("listeners", &host.listeners.len())
				.finish(),
			Err(_) => f.debug_struct("Widget").field("tag", &B::TAG).finish_non_exhaustive(),
		}
	}
}

struct Host<D: SwapEvents, B: Bindable<D>> {
	this: Weak<RefCell<Host<D, B>>>,
	dom: Rc<D>,
	bus: Rc<SwapBus<D>>,
	root: D::Node,
	phase: Phase,
	state: B,
	bound: bool,
	listeners: Vec<(B::Slot, D::Listener)>,
	replace_listener: Option<D::Listener>,
	subscription: Option<SubscriptionId>,
}

impl<D: SwapEvents, B: Bindable<D>> Widget<D, B> {
	/// Creates an [`Phase::Unbound`] widget. Nothing happens until [`Widget::on_attach`].
	#[must_use]
	pub fn new(bus: Rc<SwapBus<D>>, root: D::Node, state: B) -> Self {
		let host = Rc::new(RefCell::new(Host {
			this: Weak::new(),
			dom: Rc::clone(bus.dom()),
			bus,
			root,
			phase: Phase::Unbound,
			state,
			bound: false,
			listeners: Vec::new(),
			replace_listener: None,
			subscription: None,
		}));
		host.borrow_mut().this = Rc::downgrade(&host);
		Self(host)
	}

	#[instrument(skip(self), fields(tag = B::TAG))]
	pub fn signal(&self, signal: Signal) {
		let mut host = match self.0.try_borrow_mut() {
			Ok(host) => host,
			Err(_) => return warn!("Ignored {:?} delivered while the widget was busy.", signal),
		};
		host.signal(signal);
	}

	pub fn on_attach(&self) {
		self.signal(Signal::Attach);
	}

	pub fn on_external_replace(&self) {
		self.signal(Signal::Replace);
	}

	pub fn on_detach(&self) {
		self.signal(Signal::Detach);
	}

	/// Idempotent: does nothing while listeners are bound.
	///
	/// Only a [`Phase::Bound`] widget has located children to bind, so this is a no-op otherwise.
	pub fn bind_listeners(&self) {
		let mut host = self.0.borrow_mut();
		if host.phase != Phase::Bound {
			return debug!("Ignored bind_listeners() on an unbound <{}>.", B::TAG);
		}
		host.bind(None);
	}

	/// Safe to call when nothing is bound.
	pub fn unbind_listeners(&self) {
		self.0.borrow_mut().unbind(None);
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.0.borrow().phase
	}

	#[must_use]
	pub fn root(&self) -> D::Node {
		self.0.borrow().root.clone()
	}

	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.0.borrow().listeners.len()
	}

	/// Runs `f` against the widget state, e.g. to call its operations directly.
	pub fn with_state<R>(&self, f: impl FnOnce(&mut B, &D) -> R) -> R {
		let mut host = self.0.borrow_mut();
		let dom = Rc::clone(&host.dom);
		f(&mut host.state, &dom)
	}
}

impl<D: SwapEvents, B: Bindable<D>> Lifecycle for Widget<D, B> {
	fn signal(&self, signal: Signal) {
		Widget::signal(self, signal);
	}

	fn phase(&self) -> Phase {
		Widget::phase(self)
	}

	fn listener_count(&self) -> usize {
		Widget::listener_count(self)
	}
}

impl<D: SwapEvents, B: Bindable<D>> Host<D, B> {
	fn signal(&mut self, signal: Signal) {
		let (next, effects) = transition(self.phase, signal);
		if effects.is_empty() {
			debug!("{:?} has no effect while {:?}.", signal, self.phase);
		}
		for effect in effects {
			match effect {
				Effect::Unbind => self.unbind(None),
				Effect::Discover => {
					let dom = Rc::clone(&self.dom);
					self.state.discover(&dom, &self.root, None);
					self.state.reset(&dom);
				}
				Effect::Bind => self.bind(None),
			}
		}

		match (self.phase, next) {
			(Phase::Unbound, Phase::Bound) => self.listen_for_replace(),
			(Phase::Bound, Phase::Unbound) => {
				if let Some(listener) = self.replace_listener.take() {
					self.dom.unlisten(listener);
				}
			}
			_ => (),
		}
		if self.phase != next {
			debug!("<{}> {:?} -> {:?}", B::TAG, self.phase, next);
		}
		self.phase = next;
	}

	fn listen_for_replace(&mut self) {
		let this = self.this.clone();
		let callback: Callback = Rc::new(move || {
			if let Some(host) = this.upgrade() {
				match host.try_borrow_mut() {
					Ok(mut host) => host.signal(Signal::Replace),
					Err(_) => warn!("Ignored a re-entrant replacement of <{}>.", B::TAG),
				}
			}
		});
		let event = self.bus.config().after_swap_event.clone();
		self.replace_listener = Some(self.dom.listen(&self.root, &event, ListenScope::Node, callback));
	}

	/// Binds the listeners of `slots`, or all of them.
	fn bind(&mut self, slots: Option<&[B::Slot]>) {
		if slots.is_none() {
			if self.bound {
				return trace!("<{}> is already bound.", B::TAG);
			}
			self.bound = true;
		}

		let in_scope = |slot: &B::Slot| slots.map_or(true, |slots| slots.contains(slot));
		for binding in self.state.bindings().into_iter().filter(|binding| in_scope(&binding.slot)) {
			let callback = self.deliver_callback(binding.node.clone(), binding.message);
			let listener = self.dom.listen(&binding.node, &binding.event, binding.scope, callback);
			self.listeners.push((binding.slot, listener));
		}

		if slots.is_none() && self.state.observes_swaps() && self.subscription.is_none() {
			let observer: Weak<dyn SwapObserver<D>> = self.this.clone();
			self.subscription = Some(self.bus.subscribe(observer));
		}
		trace!("<{}> holds {} listener(s).", B::TAG, self.listeners.len());
	}

	/// Releases the listeners of `slots`, or all listeners and the swap subscription.
	fn unbind(&mut self, slots: Option<&[B::Slot]>) {
		let (released, kept): (Vec<_>, Vec<_>) = self
			.listeners
			.drain(..)
			.partition(|(slot, _)| slots.map_or(true, |slots| slots.contains(slot)));
		self.listeners = kept;
		for (_, listener) in released {
			self.dom.unlisten(listener);
		}

		if slots.is_none() {
			self.bound = false;
			if let Some(subscription) = self.subscription.take() {
				self.bus.unsubscribe(subscription);
			}
		}
		trace!("<{}> holds {} listener(s).", B::TAG, self.listeners.len());
	}

	fn deliver_callback(&self, node: D::Node, message: B::Message) -> Callback {
		let this = self.this.clone();
		Rc::new(move || {
			let host = match this.upgrade() {
				Some(host) => host,
				None => return,
			};
			let mut host = match host.try_borrow_mut() {
				Ok(host) => host,
				Err(_) => return warn!("Ignored re-entrant {:?} on <{}>.", message, B::TAG),
			};
			host.deliver(&node, message);
		})
	}

	fn deliver(&mut self, node: &D::Node, message: B::Message) {
		if self.phase != Phase::Bound || !self.dom.is_connected(&self.root) || !self.dom.contains(&self.root, node) {
			return warn!("Ignored {:?} from a node no longer in <{}>.", message, B::TAG);
		}

		let dom = Rc::clone(&self.dom);
		match self.state.handle(&dom, message) {
			Reaction::Stay => (),
			Reaction::Rediscover(slots) => {
				debug!("Rebinding {:?} of <{}>.", slots, B::TAG);
				self.unbind(Some(slots));
				self.state.discover(&dom, &self.root, Some(slots));
				self.bind(Some(slots));
			}
		}
	}
}

impl<D: SwapEvents, B: Bindable<D>> SwapObserver<D> for RefCell<Host<D, B>> {
	fn before_swap(&self, dom: &D, event: &mut BeforeSwap<D::Node>) {
		match self.try_borrow() {
			Ok(host) if host.phase == Phase::Bound => host.state.before_swap(dom, &host.root, event),
			Ok(_) => (),
			Err(_) => warn!("<{}> was busy during a before-swap event.", B::TAG),
		}
	}
}

impl<D: SwapEvents, B: Bindable<D>> Drop for Host<D, B> {
	fn drop(&mut self) {
		if self.phase == Phase::Bound {
			warn!("<{}> was dropped while bound; releasing its listeners.", B::TAG);
			self.unbind(None);
			if let Some(listener) = self.replace_listener.take() {
				self.dom.unlisten(listener);
			}
		}
	}
}
