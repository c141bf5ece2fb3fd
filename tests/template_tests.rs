//! Template loading and program-shape scenarios.

mod common;

use common::{evaluate, known};
use tessell::load_template;

#[tokio::test]
async fn json_programs_evaluate_like_yaml() {
    let text = r#"{
    "name": "test-json",
    "runtime": "yaml",
    "resources": {
        "res-a": {
            "type": "test:resource:type",
            "properties": {
                "foo": "oof"
            }
        },
        "comp-a": {
            "type": "test:component:type",
            "properties": {
                "foo": "${res-a.bar}"
            }
        }
    },
    "outputs": {
        "foo": "${res-a.bar}",
        "bar": "${res-a}"
    }
}"#;
    let (_, diags, orchestrator) = evaluate(text).await;
    assert!(!diags.has_errors(), "{}", diags);
    let foo = orchestrator.export_of("foo").expect("foo exported");
    assert_eq!(
        known(&foo),
        &tessell::PlainValue::String("oof".into())
    );
}

#[test]
fn top_level_fields_parse() {
    let text = "name: full\nnamespace: example\ndescription: a full template\nruntime: yaml\nconfiguration:\n  region:\n    type: string\n    default: us-west-2\nvariables:\n  v: 1\nresources:\n  r:\n    type: test:resource:type\noutputs:\n  o: ${v}\nsdks:\n  - name: docker\n    version: 4.0.0\ncomponents:\n  web:\n    inputs:\n      port:\n        type: integer\n";
    let (template, diags) = load_template("<stdin>", text);
    assert!(!diags.has_errors(), "{}", diags);
    let template = template.unwrap();
    assert_eq!(template.namespace.as_ref().unwrap().value, "example");
    assert_eq!(template.configuration.len(), 1);
    assert_eq!(template.sdks.len(), 1);
    assert_eq!(template.components.len(), 1);
}

#[test]
fn malformed_resources_reject_the_template() {
    let text = "runtime: yaml\nconfig: {}\nvariables:     {}\nresources:     {badResource}\noutputs:       {}";
    let (template, diags) = load_template("<stdin>", text);
    assert!(template.is_none());
    assert!(diags.has_errors());
    assert!(diags
        .to_string()
        .contains("resources.badResource must be an object"));
}

#[test]
fn empty_interpolation_rejects_the_template() {
    let text = "name: test-empty\nruntime: yaml\nvariables:\n  empty: ${}\n";
    let (template, diags) = load_template("<stdin>", text);
    assert!(template.is_none());
    assert!(diags
        .to_string()
        .contains("Property access expressions cannot be empty"));
}

#[tokio::test]
async fn duplicate_keys_are_each_reported() {
    let text = "name: t\nruntime: yaml\nconfiguration:\n  foo:\n    type: string\n  foo:\n    type: int\nvariables:\n  bar: 1\n  bar: 2\nresources:\n  res-a:\n    type: test:resource:type\n    properties:\n      foo: oof\n  res-a:\n    type: test:resource:type\n    properties:\n      foo: oof\n";
    let (_, diags, _) = evaluate(text).await;
    assert!(diags.has_errors());
    let rendered = diags.to_string();
    assert!(rendered.contains("found duplicate config foo"), "{}", rendered);
    assert!(rendered.contains("found duplicate variable bar"), "{}", rendered);
    assert!(rendered.contains("found duplicate resource res-a"), "{}", rendered);
    assert_eq!(diags.len(), 3, "{}", rendered);
}

#[tokio::test]
async fn name_collisions_blame_the_weaker_namespace() {
    let text = "name: t\nruntime: yaml\nconfiguration:\n  foo:\n    type: string\nvariables:\n  foo: 1\nresources:\n  foo:\n    type: test:resource:type\n    properties:\n      foo: oof\n";
    let (_, diags, _) = evaluate(text).await;
    assert!(diags.has_errors());
    let rendered = diags.to_string();
    assert!(
        rendered.contains("resource foo cannot have the same name as config foo"),
        "{}",
        rendered
    );
    assert!(
        rendered.contains("variable foo cannot have the same name as config foo"),
        "{}",
        rendered
    );
    assert_eq!(diags.len(), 2, "{}", rendered);
}

#[tokio::test]
async fn variable_collides_with_resource() {
    let text = "name: t\nruntime: yaml\nvariables:\n  foo: 1\nresources:\n  foo:\n    type: test:resource:type\n    properties:\n      foo: oof\n";
    let (_, diags, _) = evaluate(text).await;
    assert!(diags.has_errors());
    assert_eq!(diags.len(), 1);
    assert!(diags
        .to_string()
        .contains("variable foo cannot have the same name as resource foo"));
}

#[test]
fn resources_without_properties_are_fine() {
    let text = "name: t\nruntime: yaml\nresources:\n  res-a:\n    type: test:resource:type\n";
    let (template, diags) = load_template("<stdin>", text);
    assert!(!diags.has_errors(), "{}", diags);
    assert!(template.unwrap().resources[0].decl.properties.is_none());
}

#[test]
fn templates_merge_config_and_components() {
    let (base, diags) = load_template("<stdin>", "name: base\nconfig:\n  a:\n    type: string\n");
    assert!(!diags.has_errors());
    let (overlay, diags) =
        load_template("<overlay>", "config:\n  b:\n    type: string\ncomponents:\n  c:\n    inputs: {}\n");
    assert!(!diags.has_errors());

    let mut base = base.unwrap();
    base.merge(overlay.unwrap()).unwrap();
    assert_eq!(base.name.as_ref().unwrap().value, "base");
    assert_eq!(base.config.len(), 2);
    assert_eq!(base.components.len(), 1);
}

#[test]
fn non_canonical_casing_warns_but_parses() {
    let text = "Name: t\nResources:\n  r:\n    type: test:resource:type\n";
    let (template, diags) = load_template("<stdin>", text);
    assert!(!diags.has_errors(), "{}", diags);
    let rendered = diags.to_string();
    assert!(rendered.contains("unexpected casing: 'Name'"), "{}", rendered);
    assert!(rendered.contains("did you mean 'name'?"), "{}", rendered);
    let template = template.unwrap();
    assert_eq!(template.name.as_ref().unwrap().value, "t");
    assert_eq!(template.resources.len(), 1);
}
