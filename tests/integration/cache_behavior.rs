//! Integration tests for the compiled-template cache

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::thread;

use strata::cache::{CacheKey, TemplateCache};
use strata::core::StrataError;
use strata::model::{DataObject, Item};
use strata::properties::PropertyMap;
use strata::templating::{MarkupCompiler, TemplateEngine};
use strata::test_utils::TestEnvironment;

fn page_item() -> Item {
    Arc::new(DataObject::from_json(json!({ "Title": "Home" })))
}

fn render(engine: &TemplateEngine, template: &std::path::Path) -> Result<String> {
    Ok(engine.render(template, page_item(), PropertyMap::new(), PropertyMap::new())?)
}

#[test]
fn test_artifact_written_under_deterministic_key() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Layout/Page.ss", "<h1>$Title</h1>")?;
    let engine = env.engine();

    assert_eq!(render(&engine, &page)?, "<h1>Home</h1>");

    let key = engine.cache_key(&page);
    let expected = CacheKey::for_template(&page.canonicalize()?, &env.site_dir.canonicalize()?);
    assert_eq!(key, expected);

    let entry = engine.cache().entry_path(&key);
    assert!(entry.is_file());

    let artifact = std::fs::read_to_string(&entry)?;
    assert!(artifact.contains("\"op\""));
    Ok(())
}

#[test]
fn test_second_engine_reuses_artifact() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "$Title")?;

    render(&env.engine(), &page)?;
    let entry = env.engine().cache().entry_path(&env.engine().cache_key(&page));
    let first_modified = std::fs::metadata(&entry)?.modified()?;

    // A fresh engine over the same cache root must not rewrite the entry
    render(&env.engine(), &page)?;
    assert_eq!(std::fs::metadata(&entry)?.modified()?, first_modified);
    Ok(())
}

#[test]
fn test_modified_source_is_recompiled() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "old $Title")?;
    let engine = env.engine();

    assert_eq!(render(&engine, &page)?, "old Home");
    env.update_template("Page.ss", "new $Title")?;
    assert_eq!(render(&engine, &page)?, "new Home");
    Ok(())
}

#[test]
fn test_same_name_in_different_directories() -> Result<()> {
    let env = TestEnvironment::new()?;
    let a = env.write_template("a/b.ss", "first")?;
    let b = env.write_template("a.b.ss", "second")?;
    let engine = env.engine();

    assert_ne!(engine.cache_key(&a), engine.cache_key(&b));
    assert_eq!(render(&engine, &a)?, "first");
    assert_eq!(render(&engine, &b)?, "second");
    Ok(())
}

#[test]
fn test_unwritable_cache_reports_cache_write_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "x")?;
    let blocker = env.path().join("not-a-dir");
    std::fs::write(&blocker, "file")?;

    let engine = env.engine_with(|config| config.cache_root = blocker.clone());
    let err = engine
        .render(&page, page_item(), PropertyMap::new(), PropertyMap::new())
        .unwrap_err();
    assert!(matches!(err, StrataError::CacheWriteError { .. }), "got {err:?}");
    Ok(())
}

#[test]
fn test_flush_removes_cache_directory() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "x")?;
    let engine = env.engine();

    render(&engine, &page)?;
    let entry = engine.cache().entry_path(&engine.cache_key(&page));
    assert!(entry.exists());

    assert!(engine.flush_template_cache(false)?);
    assert!(!entry.exists());
    assert!(!engine.flush_template_cache(false)?);

    // Rendering after a flush compiles again
    assert_eq!(render(&engine, &page)?, "x");
    assert!(entry.exists());
    Ok(())
}

#[test]
fn test_concurrent_compiles_with_lock_agree() -> Result<()> {
    let env = TestEnvironment::new()?;
    let page = env.write_template("Page.ss", "<% loop $Items %>$Pos<% end_loop %>")?;
    let cache = Arc::new(
        TemplateCache::new(&env.cache_root, env.site_dir.clone()).with_compile_lock(true),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let page = page.clone();
            thread::spawn(move || cache.ensure_compiled(&page, "Page", false, &MarkupCompiler::new()))
        })
        .collect();

    let mut artifacts = Vec::new();
    let mut compiled = 0;
    for handle in handles {
        let entry = handle.join().expect("compile thread panicked")?;
        if entry.recompiled {
            compiled += 1;
        }
        artifacts.push(entry.artifact);
    }

    assert_eq!(compiled, 1);
    assert!(artifacts.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}
