use adopta::template::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

fn ctx(pairs: &[(&str, TemplateValue)]) -> Context {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn render(source: &str, context: &Context) -> String {
    render_nodes(&parse_tokens(&tokenize_template(source)), context)
}

/// A throwaway template directory with the given files.
fn template_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("adopta-tpl-{}", uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();
    for (name, body) in files {
        std::fs::write(dir.join(name), body).unwrap();
    }
    dir
}

#[test]
fn test_tokenize_basic() {
    let tokens = tokenize_template("Hola, {{ name }}! {% if admin %}Admin{% endif %}");
    assert_eq!(tokens.len(), 6);
    match &tokens[1] {
        Token::Variable(var) => assert_eq!(var, "name"),
        _ => panic!("Expected variable token"),
    }
    match &tokens[3] {
        Token::Tag(tag) => assert_eq!(tag, "if admin"),
        _ => panic!("Expected tag token"),
    }
}

#[test]
fn test_parse_safe_filter() {
    let nodes = parse_tokens(&tokenize_template("{{ pins_json|safe }}{{ name }}"));
    match &nodes[0] {
        Node::Variable { name, safe } => {
            assert_eq!(name, "pins_json");
            assert!(safe);
        }
        _ => panic!("Expected variable node"),
    }
    match &nodes[1] {
        Node::Variable { safe, .. } => assert!(!safe),
        _ => panic!("Expected variable node"),
    }
}

#[test]
fn test_variables_are_escaped_unless_safe() {
    let c = ctx(&[("v", "<b>\"hi\" & 'bye'</b>".into())]);
    assert_eq!(
        render("{{ v }}", &c),
        "&lt;b&gt;&quot;hi&quot; &amp; &#x27;bye&#x27;&lt;/b&gt;"
    );
    assert_eq!(render("{{ v|safe }}", &c), "<b>\"hi\" & 'bye'</b>");
}

#[test]
fn test_missing_variable_renders_empty() {
    assert_eq!(render("[{{ nope.deeper }}]", &Context::new()), "[]");
}

#[test]
fn test_dotted_lookup_and_numbers() {
    let mut center = HashMap::new();
    center.insert("lat".to_string(), TemplateValue::Number(-32.8895));
    center.insert("zoom".to_string(), TemplateValue::Number(12.0));
    let c = ctx(&[("center", TemplateValue::Object(center))]);
    assert_eq!(render("{{ center.lat }}/{{ center.zoom }}", &c), "-32.8895/12");
}

#[test]
fn test_if_else_not_and_comparisons() {
    let c = ctx(&[
        ("status", "lost".into()),
        ("empty", TemplateValue::List(vec![])),
        ("flag", true.into()),
    ]);
    assert_eq!(render("{% if status == \"lost\" %}P{% else %}E{% endif %}", &c), "P");
    assert_eq!(render("{% if status != 'lost' %}P{% else %}E{% endif %}", &c), "E");
    assert_eq!(render("{% if not empty %}vacío{% endif %}", &c), "vacío");
    assert_eq!(render("{% if not flag %}x{% else %}y{% endif %}", &c), "y");
    assert_eq!(render("{% if missing %}x{% endif %}", &c), "");
}

#[test]
fn test_for_loop_over_objects() {
    let c = context_from(&serde_json::json!({
        "tiers": [
            {"title": "Cafecito", "amount": 1000},
            {"title": "Padrino", "amount": 10000},
        ]
    }))
    .unwrap();
    assert_eq!(
        render("{% for t in tiers %}{{ t.title }}={{ t.amount }};{% endfor %}", &c),
        "Cafecito=1000;Padrino=10000;"
    );
}

#[test]
fn test_context_from_struct() {
    #[derive(Serialize)]
    struct Page {
        title: &'static str,
        count: u32,
    }
    let c = context_from(&Page { title: "Refugios", count: 3 }).unwrap();
    assert_eq!(c["title"], TemplateValue::String("Refugios".into()));
    assert_eq!(c["count"], TemplateValue::Number(3.0));
}

#[test]
fn test_context_from_rejects_non_objects() {
    assert!(context_from(&vec![1, 2, 3]).is_err());
}

#[test]
fn test_extends_and_include() {
    let dir = template_dir(&[
        (
            "base.html",
            "<title>{% block title %}Base{% endblock %}</title><main>{% block content %}{% endblock %}</main>",
        ),
        ("_item.html", "<li>{{ item }}</li>"),
        (
            "page.html",
            "{% extends \"base.html\" %}{% block content %}<ul>{% for item in items %}{% include \"_item.html\" %}{% endfor %}</ul>{% endblock %}",
        ),
    ]);
    let c = context_from(&serde_json::json!({ "items": ["Luna", "Toby"] })).unwrap();

    let html = render_to_string(&dir, "page.html", &c).unwrap();
    assert_eq!(
        html,
        "<title>Base</title><main><ul><li>Luna</li><li>Toby</li></ul></main>"
    );
}

#[test]
fn test_recursive_include_is_cut_off() {
    let dir = template_dir(&[("loop.html", "x{% include \"loop.html\" %}")]);
    let err = render_to_string(&dir, "loop.html", &Context::new()).unwrap_err();
    assert!(err.contains("include depth"));
}

#[test]
fn test_missing_template_is_a_404_response() {
    let dir = template_dir(&[]);
    let templates = Templates::new(dir.clone());
    let resp = templates.render("nope.html", &Context::new());
    assert_eq!(resp.status_code, 404);
}

#[test]
fn test_tailwind_tag() {
    assert!(render("{% tailwind %}", &Context::new()).contains("cdn.tailwindcss.com"));
}
