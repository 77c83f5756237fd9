//! Integration tests for rendering: includes, loops, partial cache blocks

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use strata::config::Environment;
use strata::model::{DataObject, FieldKind, Item};
use strata::properties::PropertyMap;
use strata::test_utils::TestEnvironment;

fn item(value: serde_json::Value) -> Item {
    Arc::new(DataObject::from_json(value))
}

#[test]
fn test_page_with_navigation_include() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_template(
        "Includes/Nav.ss",
        "<ul><% loop $Links %><li class=\"$FirstLast\">$Label</li><% end_loop %></ul>",
    )?;
    let page = env.write_template(
        "Page.ss",
        "<% include Nav %><h1>$Title</h1><% if $Body %><p>$Body</p><% else %><p>Empty</p><% end_if %>",
    )?;
    let engine = env.engine();

    let root = item(json!({
        "Title": "Home",
        "Links": [{ "Label": "One" }, { "Label": "Two" }, { "Label": "Three" }],
    }));
    let out = engine.render(&page, root, PropertyMap::new(), PropertyMap::new())?;

    assert_eq!(
        out,
        "<ul><li class=\"first\">One</li><li class=\"\">Two</li><li class=\"last\">Three</li></ul>\
         <h1>Home</h1><p>Empty</p>"
    );
    Ok(())
}

#[test]
fn test_include_falls_back_to_template_root() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_template("Footer.ss", "(c) $Year")?;
    let page = env.write_template("Page.ss", "<% include Footer Year=2026 %>")?;
    let engine = env.engine();

    let out = engine.render(&page, item(json!({})), PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(out, "(c) 2026");
    Ok(())
}

#[test]
fn test_with_block_and_up_navigation() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template(
        "Article.ss",
        "<% with $Author %>$Name writes for $Up.Site ($Top.Site)<% end_with %>",
    )?;
    let engine = env.engine();

    let root = item(json!({ "Site": "Gazette", "Author": { "Name": "Ada" } }));
    let out = engine.render(&page, root, PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(out, "Ada writes for Gazette (Gazette)");
    Ok(())
}

#[test]
fn test_html_fields_are_not_escaped() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Content|$Title")?;
    let engine = env.engine();

    let root: Item = Arc::new(
        DataObject::from_json(json!({ "Content": "<b>bold</b>", "Title": "<b>title</b>" }))
            .with_casting("Content", FieldKind::HtmlFragment),
    );
    let out = engine.render(&page, root, PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(out, "<b>bold</b>|&lt;b&gt;title&lt;/b&gt;");
    Ok(())
}

#[test]
fn test_cached_block_keyed_by_value() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "<% cached $ID %>$Title<% end_cached %>")?;
    let engine = env.engine();

    let render = |value: serde_json::Value| {
        engine.render(&page, item(value), PropertyMap::new(), PropertyMap::new())
    };

    assert_eq!(render(json!({ "ID": 1, "Title": "First" }))?, "First");
    assert_eq!(render(json!({ "ID": 1, "Title": "Changed" }))?, "First");
    assert_eq!(render(json!({ "ID": 2, "Title": "Second" }))?, "Second");
    assert_eq!(engine.block_store().len(), Some(2));

    engine.begin_request();
    assert!(engine.flush_cacheblock_cache(false));
    assert_eq!(engine.block_store().len(), Some(0));
    assert_eq!(render(json!({ "ID": 1, "Title": "Changed" }))?, "Changed");
    Ok(())
}

#[test]
fn test_debug_comments_wrap_includes() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_template("Includes/Part.ss", "part")?;
    let page = env.write_template("Page.ss", "[<% include Part %>]")?;
    let engine = env.engine_with(|config| {
        config.environment = Environment::Dev;
        config.source_file_comments = true;
    });

    let out = engine.render(&page, item(json!({})), PropertyMap::new(), PropertyMap::new())?;
    assert_eq!(
        out,
        "<!-- template templates/Page.ss -->[\
         <!-- template templates/Includes/Part.ss -->part<!-- end template templates/Includes/Part.ss -->\
         ]<!-- end template templates/Page.ss -->"
    );
    Ok(())
}
