//! Tests for the layered lookup in [`ScopeResolver`](super::ScopeResolver).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use crate::core::StrataError;
use crate::model::{DataObject, Item, Value};
use crate::properties::{GlobalProperties, PropertyMap, PropertyRegistries};
use crate::scope::{Layer, ScopeResolver};

fn page() -> Item {
    Arc::new(DataObject::from_json(json!({
        "Title": "Native",
        "Author": {
            "Name": "Ada",
            "Title": "Author page",
            "Address": { "City": "London" }
        },
        "Children": [
            { "Title": "One" },
            { "Title": "Two" }
        ]
    })))
}

fn with_globals(resolver: ScopeResolver, globals: GlobalProperties) -> ScopeResolver {
    resolver.with_registries(Arc::new(PropertyRegistries::default().with_global_provider(globals)))
}

#[test]
fn test_overlay_beats_item_field() {
    let overlay = PropertyMap::new().with_literal("Title", "Hello");
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "Hello");

    let injected = resolver.resolve("Title", &[], false).unwrap().unwrap();
    assert_eq!(injected.layer, Layer::Overlay);
    assert!(injected.obj.is_none());
}

#[test]
fn test_item_field_stops_search() {
    let underlay = PropertyMap::new().with_literal("Title", "Under").with_literal("Layout", "wide");
    let mut resolver = ScopeResolver::new(page(), PropertyMap::new(), underlay, None);

    assert!(resolver.resolve("Title", &[], true).unwrap().is_none());
    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "Native");
    assert_eq!(resolver.locally().xml_val("Layout", &[]).unwrap(), "wide");
}

#[test]
fn test_underlay_beats_global() {
    let globals = GlobalProperties::new().literal("SiteName", "Global site");

    let underlay = PropertyMap::new().with_literal("SiteName", "Local site");
    let mut resolver =
        with_globals(ScopeResolver::new(page(), PropertyMap::new(), underlay, None), globals.clone());
    assert_eq!(resolver.locally().xml_val("SiteName", &[]).unwrap(), "Local site");

    let mut resolver =
        with_globals(ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None), globals);
    assert_eq!(resolver.locally().xml_val("SiteName", &[]).unwrap(), "Global site");
    let injected = resolver.resolve("SiteName", &[], false).unwrap().unwrap();
    assert_eq!(injected.layer, Layer::Global);
}

#[test]
fn test_lazy_overlay_without_value_falls_through() {
    let overlay = PropertyMap::new().with_lazy("Title", |_| None);
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "Native");
}

#[test]
fn test_lazy_overlay_is_evaluated_per_lookup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let overlay = PropertyMap::new().with_lazy("Counter", move |_| {
        Some(Value::from(counter.fetch_add(1, Ordering::SeqCst) as i64))
    });
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    assert_eq!(resolver.locally().xml_val("Counter", &[]).unwrap(), "0");
    assert_eq!(resolver.locally().xml_val("Counter", &[]).unwrap(), "1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_lazy_global_receives_arguments() {
    let globals = GlobalProperties::new().lazy("Greet", |args| {
        let name = args.first().and_then(|arg| arg.as_str()).unwrap_or("nobody");
        Some(Value::from(format!("Hi {name}")))
    });
    let mut resolver =
        with_globals(ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None), globals);

    assert_eq!(resolver.locally().xml_val("Greet", &[json!("Bob")]).unwrap(), "Hi Bob");
    assert_eq!(resolver.locally().xml_val("Greet", &[]).unwrap(), "Hi nobody");
}

#[test]
fn test_global_without_value_is_rejected() {
    let globals = GlobalProperties::new().literal("Broken", serde_json::Value::Null);
    let mut resolver =
        with_globals(ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None), globals);

    let err = resolver.locally().xml_val("Broken", &[]).unwrap_err();
    assert!(matches!(err, StrataError::InvalidPropertySource { ref property } if property == "Broken"));
}

#[test]
fn test_overlay_without_value_is_rejected() {
    let overlay = PropertyMap::new().with_literal("Empty", serde_json::Value::Null);
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    let err = resolver.locally().has_value("Empty", &[]).unwrap_err();
    assert!(matches!(err, StrataError::InvalidPropertySource { .. }));
}

#[test]
fn test_has_value_uses_uncast_value() {
    let overlay = PropertyMap::new().with_literal("Zero", "0").with_literal("Flag", true);
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    assert!(!resolver.locally().has_value("Zero", &[]).unwrap());
    assert!(resolver.locally().has_value("Flag", &[]).unwrap());
    assert!(!resolver.locally().has_value("Missing", &[]).unwrap());
}

#[test]
fn test_injected_value_casting() {
    let overlay = PropertyMap::new()
        .with_literal("Markup", "<b>bold</b>")
        .with_entry("Trusted", crate::properties::SourceEntry::literal("<b>bold</b>").with_casting("HTMLText"));
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    assert_eq!(resolver.locally().xml_val("Markup", &[]).unwrap(), "&lt;b&gt;bold&lt;/b&gt;");
    assert_eq!(resolver.locally().xml_val("Trusted", &[]).unwrap(), "<b>bold</b>");
}

#[test]
fn test_iterator_properties_outside_loop() {
    let mut resolver = ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None);

    assert_eq!(resolver.locally().xml_val("Pos", &[]).unwrap(), "1");
    assert_eq!(resolver.locally().xml_val("TotalItems", &[]).unwrap(), "1");
    assert!(resolver.locally().has_value("First", &[]).unwrap());
    assert!(resolver.locally().has_value("Last", &[]).unwrap());
}

#[test]
fn test_iterator_properties_inside_loop() {
    let mut resolver = ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None);
    resolver.locally().obj("Children", &[]).unwrap();
    resolver.push_scope();

    let mut rendered = Vec::new();
    while resolver.next().is_some() {
        let title = resolver.locally().xml_val("Title", &[]).unwrap();
        let pos = resolver.locally().xml_val("Pos", &[]).unwrap();
        let parity = resolver.locally().xml_val("EvenOdd", &[]).unwrap();
        rendered.push(format!("{pos}:{title}:{parity}"));
    }
    resolver.pop_scope();

    assert_eq!(rendered, vec!["1:One:odd", "2:Two:even"]);
}

#[test]
fn test_overlay_relocates_into_blocks() {
    let overlay = PropertyMap::new().with_literal("Title", "Hello");
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    resolver.locally().obj("Children", &[]).unwrap();
    resolver.push_scope();

    // Inside the loop the overlay is parked on the frame the block came from
    assert!(resolver.overlay().is_empty());
    assert!(resolver.stored_overlay(0).is_some_and(|stored| stored.contains("Title")));

    assert_eq!(resolver.next(), Some(0));
    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "One");

    let up_title = resolver.locally().obj("Up", &[]).unwrap().xml_val("Title", &[]).unwrap();
    assert_eq!(up_title, "Hello");

    while resolver.next().is_some() {}
    resolver.pop_scope();

    assert!(resolver.overlay().contains("Title"));
    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "Hello");
}

#[test]
fn test_up_and_top_from_nested_blocks() {
    let overlay = PropertyMap::new().with_literal("Title", "Hello");
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    resolver.locally().obj("Author", &[]).unwrap();
    resolver.push_scope();
    resolver.locally().obj("Address", &[]).unwrap();
    resolver.push_scope();

    assert_eq!(resolver.locally().xml_val("City", &[]).unwrap(), "London");

    let up_title = resolver.locally().obj("Up", &[]).unwrap().xml_val("Title", &[]).unwrap();
    assert_eq!(up_title, "Author page");

    let top_title = resolver.locally().obj("Top", &[]).unwrap().xml_val("Title", &[]).unwrap();
    assert_eq!(top_title, "Hello");

    resolver.pop_scope();
    resolver.pop_scope();
    assert_eq!(resolver.locally().xml_val("Title", &[]).unwrap(), "Hello");
}

#[test]
fn test_up_at_top_fails() {
    let mut resolver = ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None);

    let err = resolver.locally().obj("Up", &[]).unwrap_err();
    assert!(matches!(err, StrataError::NoParentScope));
}

#[test]
fn test_injected_object_can_be_drilled_into() {
    let author = Arc::new(DataObject::from_json(json!({ "Name": "Grace" }))) as Item;
    let overlay = PropertyMap::new().with_literal("Guest", author);
    let mut resolver = ScopeResolver::new(page(), overlay, PropertyMap::new(), None);

    let name = resolver.locally().obj("Guest", &[]).unwrap().xml_val("Name", &[]).unwrap();
    assert_eq!(name, "Grace");
}

#[test]
fn test_inherited_resolver_keeps_loop_position() {
    let mut parent = ScopeResolver::new(page(), PropertyMap::new(), PropertyMap::new(), None);
    parent.locally().obj("Children", &[]).unwrap();
    parent.push_scope();
    parent.next();
    parent.next();

    let child_item = parent.current_item().unwrap();
    let mut child = ScopeResolver::new(child_item, PropertyMap::new(), PropertyMap::new(), Some(&parent));

    assert_eq!(child.locally().xml_val("Pos", &[]).unwrap(), "2");
    assert!(child.locally().has_value("Last", &[]).unwrap());
}
