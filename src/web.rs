//! The browser backend, on top of `web-sys`.
//!
//! Listener closures are owned by a thread-local map keyed by [`WebListener`] ids, so that
//! [`Dom::unlisten`] can remove the exact function that was added. Custom elements are defined
//! through a small JavaScript shim, since Rust can't extend `HTMLElement` directly.

use crate::{
	dom::{Callback, Dom, ListenScope},
	redact,
	registry::{DefineError, ElementCallbacks, ElementHost, Registry},
	swap::{BeforeSwap, SwapCallback, SwapConfig, SwapEvents},
	ExpandableDetail, VisibilityToggle,
};
use hashbrown::HashMap;
use js_sys::Reflect;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};
use tracing::{error, info, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};

#[wasm_bindgen(inline_js = r#"
export function custom_element_defined(tag) {
	return customElements.get(tag) !== undefined;
}

export function define_custom_element(tag, connected, disconnected) {
	customElements.define(tag, class extends HTMLElement {
		connectedCallback() { connected(this); }
		disconnectedCallback() { disconnected(this); }
	});
}
"#)]
extern "C" {
	fn custom_element_defined(tag: &str) -> bool;

	#[wasm_bindgen(catch)]
	fn define_custom_element(tag: &str, connected: &JsValue, disconnected: &JsValue) -> Result<(), JsValue>;
}

struct Published {
	target: web_sys::EventTarget,
	event: String,
	closure: Closure<dyn Fn(web_sys::Event)>,
}

thread_local! {
	static LISTENERS: RefCell<HashMap<u32, Published>> = RefCell::new(HashMap::new());
	static NEXT_LISTENER: Cell<u32> = Cell::new(0);
	static REGISTRY: RefCell<Option<Registry<WebDom>>> = RefCell::new(None);
}

/// Handle to an event listener added through [`WebDom`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WebListener(u32);

fn publish(target: &web_sys::EventTarget, event: &str, closure: Closure<dyn Fn(web_sys::Event)>) -> WebListener {
	if let Err(error) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
		error!("Failed to add event listener {:?}: {:?}", event, error);
	}
	let id = NEXT_LISTENER.with(|next| {
		let id = next.get();
		next.set(id.wrapping_add(1));
		id
	});
	LISTENERS.with(|listeners| {
		listeners.borrow_mut().insert(
			id,
			Published {
				target: target.clone(),
				event: event.to_owned(),
				closure,
			},
		)
	});
	trace!("Published listener {} for {:?}.", id, event);
	WebListener(id)
}

fn unpublish(WebListener(id): WebListener) {
	// Dropped outside of the borrow, since the closure may currently be running.
	let published = LISTENERS.with(|listeners| listeners.borrow_mut().remove(&id));
	match published {
		Some(Published { target, event, closure }) => {
			if let Err(error) = target.remove_event_listener_with_callback(&event, closure.as_ref().unchecked_ref()) {
				error!("Failed to remove event listener {:?}: {:?}", event, error);
			}
			trace!("Unpublished listener {} for {:?}.", id, event);
		}
		None => warn!("Listener {} was already unpublished.", id),
	}
}

#[derive(Debug, Clone)]
pub struct WebDom {
	document: web_sys::Document,
}

impl WebDom {
	/// [`None`] outside of a window with a document.
	#[must_use]
	pub fn new() -> Option<Self> {
		Some(Self {
			document: web_sys::window()?.document()?,
		})
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}
}

impl Dom for WebDom {
	type Node = web_sys::Element;
	type Listener = WebListener;

	fn query(&self, root: &web_sys::Element, selector: &str) -> Option<web_sys::Element> {
		match root.query_selector(selector) {
			Ok(found) => found,
			Err(error) => {
				error!("Invalid selector {:?}: {:?}", selector, error);
				None
			}
		}
	}

	fn is_connected(&self, node: &web_sys::Element) -> bool {
		node.is_connected()
	}

	fn contains(&self, ancestor: &web_sys::Element, node: &web_sys::Element) -> bool {
		let node: &web_sys::Node = node;
		ancestor.contains(Some(node))
	}

	fn set_class(&self, node: &web_sys::Element, class: &str, present: bool) {
		if let Err(error) = node.class_list().toggle_with_force(class, present) {
			error!("Failed to toggle class {:?}: {:?}", class, error);
		}
	}

	fn set_style(&self, node: &web_sys::Element, property: &str, value: &str) {
		let style = if let Some(element) = node.dyn_ref::<web_sys::HtmlElement>() {
			element.style()
		} else if let Some(element) = node.dyn_ref::<web_sys::SvgElement>() {
			element.style()
		} else {
			return warn!("<{}> has no inline style.", node.tag_name());
		};
		if let Err(error) = style.set_property(property, value) {
			error!("Failed to set style {:?} to {}: {:?}", property, redact(value), error);
		}
	}

	fn set_attribute(&self, node: &web_sys::Element, name: &str, value: &str) {
		if let Err(error) = node.set_attribute(name, value) {
			error!("Failed to set attribute {:?} to {}: {:?}", name, redact(value), error);
		}
	}

	fn listen(&self, node: &web_sys::Element, event: &str, scope: ListenScope, callback: Callback) -> WebListener {
		let own_target: web_sys::EventTarget = node.clone().into();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			if scope == ListenScope::Node && event.target().as_ref() != Some(&own_target) {
				return;
			}
			callback();
		}) as Box<dyn Fn(web_sys::Event)>);
		publish(node, event, closure)
	}

	fn unlisten(&self, listener: WebListener) {
		unpublish(listener);
	}
}

impl SwapEvents for WebDom {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn listen_before_swap(&self, event: &str, callback: SwapCallback<web_sys::Element>) -> WebListener {
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			let detail = match event.dyn_ref::<web_sys::CustomEvent>() {
				Some(event) => event.detail(),
				None => return warn!("Before-swap event without detail."),
			};
			let get = |target: &JsValue, key: &str| Reflect::get(target, &JsValue::from_str(key)).ok();

			let status = get(&detail, "xhr").and_then(|xhr| get(&xhr, "status")).and_then(|status| status.as_f64()).unwrap_or(0.0) as u16;
			let should_swap = get(&detail, "shouldSwap").and_then(|should_swap| should_swap.as_bool()).unwrap_or(false);
			let origin = get(&detail, "elt").and_then(|elt| elt.dyn_into::<web_sys::Element>().ok());

			let mut before_swap = BeforeSwap { status, should_swap, origin };
			callback(&mut before_swap);
			if before_swap.should_swap != should_swap {
				if let Err(error) = Reflect::set(&detail, &JsValue::from_str("shouldSwap"), &JsValue::from_bool(before_swap.should_swap)) {
					error!("Failed to override shouldSwap: {:?}", error);
				}
			}
		}) as Box<dyn Fn(web_sys::Event)>);
		publish(&self.document, event, closure)
	}
}

impl ElementHost for WebDom {
	fn is_defined(&self, tag: &str) -> bool {
		custom_element_defined(tag)
	}

	fn define(&self, tag: &str, callbacks: ElementCallbacks<web_sys::Element>) -> Result<(), DefineError> {
		let ElementCallbacks { connected, disconnected } = callbacks;
		// Owned by the element class from here on.
		let connected = Closure::wrap(Box::new(move |element: web_sys::Element| connected(&element)) as Box<dyn Fn(web_sys::Element)>).into_js_value();
		let disconnected = Closure::wrap(Box::new(move |element: web_sys::Element| disconnected(&element)) as Box<dyn Fn(web_sys::Element)>).into_js_value();
		define_custom_element(tag, &connected, &disconnected).map_err(|error| DefineError {
			tag: tag.to_owned(),
			reason: format!("{:?}", error),
		})
	}
}

/// Defines `<password-input-control>` and `<todo-detail>` for the rest of the page's lifetime.
///
/// Calling this again is a no-op.
///
/// # Errors
///
/// Iff there is no document, or the browser rejects one of the definitions.
#[wasm_bindgen]
pub fn install() -> Result<(), JsValue> {
	REGISTRY.with(|registry| {
		let mut registry = registry.borrow_mut();
		if registry.is_some() {
			info!("rebind-widgets is already installed.");
			return Ok(());
		}

		let dom = WebDom::new().ok_or_else(|| JsValue::from_str("rebind-widgets: No document found."))?;
		let installed = Registry::new(Rc::new(dom), SwapConfig::default());
		let to_js = |error: DefineError| JsValue::from_str(&error.to_string());
		installed.define(VisibilityToggle::default).map_err(to_js)?;
		installed.define(ExpandableDetail::default).map_err(to_js)?;
		*registry = Some(installed);
		Ok(())
	})
}
