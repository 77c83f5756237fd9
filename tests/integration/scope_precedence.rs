//! Integration tests for the lookup order of injected values

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata::core::StrataError;
use strata::model::{DataObject, Item, Value};
use strata::properties::{
    DuplicatePolicy, GlobalProperties, PropertyMap, PropertyRegistries, SourceEntry,
};
use strata::test_utils::TestEnvironment;

fn item(value: serde_json::Value) -> Item {
    Arc::new(DataObject::from_json(value))
}

fn globals() -> GlobalProperties {
    GlobalProperties::new()
        .literal("SiteName", "Strata")
        .literal("Title", "Global title")
        .lazy("Shout", |args| {
            let word = args.first().and_then(|arg| arg.as_str()).unwrap_or("hey");
            Some(Value::from(word.to_uppercase()))
        })
}

#[test]
fn test_full_precedence_chain() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Title")?;
    let engine = env.engine().with_registries(
        PropertyRegistries::standard(DuplicatePolicy::LastWins).with_global_provider(globals()),
    );

    let with_field = item(json!({ "Title": "Item title" }));
    let without_field = item(json!({}));
    let overlay = || PropertyMap::new().with_literal("Title", "Overlay title");
    let underlay = || PropertyMap::new().with_literal("Title", "Underlay title");

    let render = |root: &Item, overlay: PropertyMap, underlay: PropertyMap| {
        engine.render(&page, Arc::clone(root), overlay, underlay)
    };

    assert_eq!(render(&with_field, overlay(), underlay())?, "Overlay title");
    assert_eq!(render(&with_field, PropertyMap::new(), underlay())?, "Item title");
    assert_eq!(render(&without_field, PropertyMap::new(), underlay())?, "Underlay title");
    assert_eq!(render(&without_field, PropertyMap::new(), PropertyMap::new())?, "Global title");
    Ok(())
}

#[test]
fn test_iterator_properties_inside_loop() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template(
        "List.ss",
        "<% loop $Rows %>$Pos/$TotalItems:$EvenOdd<% if $Last %>.<% else %>,<% end_if %><% end_loop %>",
    )?;
    let engine = env.engine();

    let root = item(json!({ "Rows": [{}, {}, {}] }));
    let out = engine.render(&page, root, PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(out, "1/3:odd,2/3:even,3/3:odd.");
    Ok(())
}

#[test]
fn test_global_lazy_receives_arguments() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Shout('quiet') $Shout $SiteName")?;
    let engine = env.engine().with_registries(
        PropertyRegistries::standard(DuplicatePolicy::LastWins).with_global_provider(globals()),
    );

    let out = engine.render(&page, item(json!({})), PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(out, "QUIET HEY Strata");
    Ok(())
}

#[test]
fn test_lazy_overlay_is_evaluated_per_lookup() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Counter-$Counter")?;
    let engine = env.engine();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let overlay = PropertyMap::new().with_lazy("Counter", move |_| {
        Some(Value::from(counter.fetch_add(1, Ordering::SeqCst) as i64 + 1))
    });

    let out = engine.render(&page, item(json!({})), overlay, PropertyMap::new())?;
    assert_eq!(out, "1-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_null_global_is_invalid_source() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Broken")?;
    let engine = env.engine().with_registries(
        PropertyRegistries::standard(DuplicatePolicy::LastWins).with_global_provider(
            GlobalProperties::new().entry("Broken", SourceEntry::literal(serde_json::Value::Null)),
        ),
    );

    let err = engine
        .render(&page, item(json!({})), PropertyMap::new(), PropertyMap::new())
        .unwrap_err();
    assert!(matches!(err, StrataError::InvalidPropertySource { property } if property == "Broken"));
    Ok(())
}

#[test]
fn test_rejected_duplicate_global() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$SiteName")?;
    let engine = env.engine().with_registries(
        PropertyRegistries::standard(DuplicatePolicy::Reject)
            .with_global_provider(GlobalProperties::new().literal("SiteName", "One"))
            .with_global_provider(GlobalProperties::new().literal("SiteName", "Two")),
    );

    let err = engine
        .render(&page, item(json!({})), PropertyMap::new(), PropertyMap::new())
        .unwrap_err();
    assert!(matches!(err, StrataError::ConfigError { .. }));
    Ok(())
}

#[test]
fn test_up_at_top_level_fails() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Up.Title")?;
    let engine = env.engine();

    let err = engine
        .render(&page, item(json!({ "Title": "x" })), PropertyMap::new(), PropertyMap::new())
        .unwrap_err();
    assert!(matches!(err, StrataError::NoParentScope));
    Ok(())
}
