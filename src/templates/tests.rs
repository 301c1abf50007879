//! Tests for the template engine

use super::*;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn base_context() -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("current_user", &Option::<String>::None);
    context.insert("year", &2024);
    context
}

#[test]
fn test_embedded_templates_load() {
    let engine = TemplateEngine::new(None).unwrap();

    for name in ["base.html", "error.html", "home.html", "article_detail.html", "partials/pagination.html"] {
        assert!(engine.has_template(name), "missing {}", name);
    }
    assert!(engine.override_path().is_none());
}

#[test]
fn test_home_renders_masthead() {
    let engine = TemplateEngine::new(None).unwrap();
    let mut context = base_context();
    context.insert("cards", &Vec::<String>::new());
    context.insert(
        "pager",
        &serde_json::json!({
            "page": 1,
            "total_pages": 0,
            "total": 0,
            "has_prev": false,
            "has_next": false,
            "query": "",
        }),
    );

    let html = engine.render("home.html", &context).unwrap();
    assert!(html.contains("The News Harbor"));
    assert!(html.contains("No articles have been published yet."));
}

#[test]
fn test_override_directory_replaces_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("info.html"), "<p>Custom about page</p>").unwrap();

    let engine = TemplateEngine::new(Some(dir.path())).unwrap();
    let html = engine.render("info.html", &base_context()).unwrap();
    assert_eq!(html, "<p>Custom about page</p>");
    assert_eq!(engine.override_path(), Some(dir.path()));

    // Files that are not overridden still come from the binary
    assert!(engine.has_template("home.html"));
}

#[test]
fn test_missing_override_directory_falls_back() {
    let dir = TempDir::new().unwrap();
    let engine = TemplateEngine::new(Some(dir.path().join("missing").as_path())).unwrap();
    assert!(engine.has_template("home.html"));
}

#[test]
fn test_gravatar_filter() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("avatar.html"), "{{ email | gravatar(size=80) | safe }}").unwrap();
    let engine = TemplateEngine::new(Some(dir.path())).unwrap();

    let mut context = TeraContext::new();
    context.insert("email", " Reader@Example.com ");
    let html = engine.render("avatar.html", &context).unwrap();

    let digest = format!("{:x}", md5::compute(b"reader@example.com"));
    assert_eq!(
        html,
        format!("https://www.gravatar.com/avatar/{}?s=80&d=identicon", digest)
    );
}

#[test]
fn test_render_missing_template() {
    let engine = TemplateEngine::new(None).unwrap();
    let result = engine.render("nope.html", &TeraContext::new());
    assert!(matches!(result, Err(TemplateError::NotFound(name)) if name == "nope.html"));
}

#[test]
fn test_render_with_fallback_uses_error_page() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.html"), "{{ missing.field }}").unwrap();
    let engine = TemplateEngine::new(Some(dir.path())).unwrap();

    let html = engine.render_with_fallback("broken.html", &base_context());
    assert!(html.contains("Something went wrong"));
    assert!(html.contains("The page could not be displayed."));
}

#[test]
fn test_simple_error_page_escapes() {
    let html = simple_error_page("<script>alert(1)</script>");
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>"));
}
