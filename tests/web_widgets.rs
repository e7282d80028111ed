#![cfg(target_arch = "wasm32")]

use rebind_widgets::{
	swap::SwapConfig,
	web::WebDom,
	ExpandableDetail, Registry, VisibilityToggle,
};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Document, Element, Event, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn setup() -> (Document, Registry<WebDom>) {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let document = window().unwrap().document().unwrap();
	let registry = Registry::new(Rc::new(WebDom::new().unwrap()), SwapConfig::default());
	(document, registry)
}

fn mount(document: &Document, html: &str) -> Element {
	let container = document.create_element("div").unwrap();
	container.set_inner_html(html);
	document.body().unwrap().append_child(&container).unwrap();
	container
}

fn find(container: &Element, selector: &str) -> Element {
	container.query_selector(selector).unwrap().unwrap()
}

fn click(element: &Element) {
	element.dispatch_event(&Event::new("click").unwrap()).unwrap();
}

#[wasm_bindgen_test]
fn password_control_reveals_and_conceals() {
	let (document, registry) = setup();
	assert_eq!(registry.define_as("test-password-control", VisibilityToggle::default), Ok(true));
	assert_eq!(registry.define_as("test-password-control", VisibilityToggle::default), Ok(false));

	let container = mount(
		&document,
		r#"<test-password-control>
			<input id="password" type="password">
			<svg id="open-eye"></svg>
			<svg id="closed-eye"></svg>
		</test-password-control>"#,
	);
	let field = find(&container, "#password");
	let open_eye = find(&container, "#open-eye");
	let closed_eye = find(&container, "#closed-eye");
	assert_eq!(registry.instance_count(), 1);
	assert!(open_eye.class_list().contains("hidden"));

	click(&closed_eye);
	assert_eq!(field.get_attribute("type").as_deref(), Some("text"));
	assert!(closed_eye.class_list().contains("hidden"));
	assert!(!open_eye.class_list().contains("hidden"));

	click(&open_eye);
	assert_eq!(field.get_attribute("type").as_deref(), Some("password"));

	container.remove();
	assert_eq!(registry.instance_count(), 0);
}

#[wasm_bindgen_test]
fn todo_detail_toggles_and_rebinds_after_swap() {
	let (document, registry) = setup();
	assert_eq!(registry.define_as("test-todo-detail", ExpandableDetail::default), Ok(true));

	let container = mount(
		&document,
		r#"<test-todo-detail>
			<div id="details"><button id="edit-button">Edit</button><button id="delete-button">Delete</button></div>
			<form id="edit-form"><button type="button" id="cancel-button">Cancel</button></form>
		</test-todo-detail>"#,
	);
	let root = find(&container, "test-todo-detail");
	let details: HtmlElement = find(&container, "#details").dyn_into().unwrap();
	let edit_form: HtmlElement = find(&container, "#edit-form").dyn_into().unwrap();
	assert_eq!(edit_form.style().get_property_value("display").unwrap(), "none");

	click(&find(&container, "#edit-button"));
	assert_eq!(details.style().get_property_value("display").unwrap(), "none");
	assert_eq!(edit_form.style().get_property_value("display").unwrap(), "block");

	// What the swap library does for an inner swap of the whole item.
	root.set_inner_html(
		r#"<div id="details"><button id="edit-button">Edit</button></div>
		<form id="edit-form"><button type="button" id="cancel-button">Cancel</button></form>"#,
	);
	root.dispatch_event(&Event::new("htmx:afterSwap").unwrap()).unwrap();

	let edit_form: HtmlElement = find(&container, "#edit-form").dyn_into().unwrap();
	assert_eq!(edit_form.style().get_property_value("display").unwrap(), "none");
	click(&find(&container, "#edit-button"));
	assert_eq!(edit_form.style().get_property_value("display").unwrap(), "block");
	click(&find(&container, "#cancel-button"));
	assert_eq!(edit_form.style().get_property_value("display").unwrap(), "none");

	container.remove();
}
