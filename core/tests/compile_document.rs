use pretty_assertions::assert_eq;
use restplus_core::{
    marshal, merge, Api, AppError, Body, Field, HttpMethod, Model, ModelSource, Namespace,
    Operation, ParamDoc, ParamLocation, Resource, SecurityScheme,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn collect_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => out.push(reference),
                    _ => collect_refs(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        _ => {}
    }
}

fn pet_api() -> Api {
    let mut api = Api::default().with_authorization(
        "apikey",
        SecurityScheme::ApiKey {
            name: "X-API-KEY".into(),
            location: "header".into(),
            description: None,
        },
    );

    let mut ns = Namespace::new("pets")
        .with_path("/pets")
        .with_description("Pet store");
    let pet = ns.model(
        "Pet",
        [
            ("kind", Field::string().discriminator()),
            ("name", Field::string().required()),
        ],
    );
    let owner = ns.model("owner info", [("name", Field::string())]);
    let cat = ns.inherit(
        "Cat",
        vec![
            ModelSource::from(&pet),
            ModelSource::Fields(
                [("lives".to_string(), Field::integer().with_default(9))]
                    .into_iter()
                    .collect(),
            ),
        ],
    );
    let dog = ns.inherit(
        "Dog",
        vec![
            ModelSource::from(&pet),
            ModelSource::Fields(
                [("owner".to_string(), Field::nested(&owner))]
                    .into_iter()
                    .collect(),
            ),
        ],
    );
    let adoption = ns.model(
        "Adoption",
        [
            (
                "pet",
                Field::polymorph([("Cat", cat.clone()), ("Dog", dog.clone())]).unwrap(),
            ),
            ("notes", Field::list(Field::string())),
        ],
    );

    let collection = Resource::new("PetList")
        .with_operation(
            HttpMethod::Get,
            Operation::new()
                .with_docstring("List pets")
                .doc(ns.marshal_list_with(&pet, 200, Some("All pets"))),
        )
        .with_operation(
            HttpMethod::Post,
            Operation::new()
                .doc(ns.expect([Body::from(&adoption)]))
                .doc(ns.security(["apikey"])),
        );
    let item = Resource::new("PetItem")
        .doc(ns.param("id", ParamDoc::new(ParamLocation::Path).with_description("Pet id")))
        .with_operation(
            HttpMethod::Get,
            Operation::new().doc(ns.marshal_with(&dog, 200, None)),
        )
        .with_operation(HttpMethod::Delete, Operation::new().doc(ns.response(204, "Deleted", None)));
    ns.route("/", collection).unwrap();
    ns.route("/{id}", item).unwrap();
    api.add_namespace(ns).unwrap();

    let mut admin = Namespace::new("admin").with_path("/admin").internal();
    let audit = admin.model("Audit", [("event", Field::string())]);
    admin
        .route(
            "/audit",
            Resource::new("AuditLog").with_operation(
                HttpMethod::Get,
                Operation::new().doc(admin.marshal_list_with(&audit, 200, None)),
            ),
        )
        .unwrap();
    api.add_namespace(admin).unwrap();
    api
}

#[test]
fn test_clone_later_source_wins() {
    let a = Arc::new(Model::new("A", [("f", Field::string()), ("a", Field::boolean())]));
    let b = Arc::new(Model::new("B", [("f", Field::integer())]));
    let cloned = Model::cloned("C", &[ModelSource::from(&a), ModelSource::from(&b)]);

    assert!(cloned.parents().is_empty());
    assert_eq!(cloned.fields()["f"].schema()["type"], json!("integer"));
    assert_eq!(
        cloned.fields().keys().collect::<Vec<_>>(),
        vec!["f", "a"]
    );
}

#[test]
fn test_inherit_ancestors_and_all_of() {
    let root = Arc::new(Model::new("Root", [("id", Field::integer())]));
    let a = Arc::new(Model::inherit("A", vec![ModelSource::from(&root)]));
    let b = Arc::new(Model::new("B", [("b", Field::string())]));
    let child = Model::inherit(
        "Child",
        vec![
            ModelSource::from(&a),
            ModelSource::from(&b),
            ModelSource::Fields([("extra".to_string(), Field::boolean())].into_iter().collect()),
        ],
    );

    let ancestors: Vec<String> = child.ancestors().into_iter().collect();
    assert_eq!(ancestors, vec!["A", "B", "Root"]);
    assert_eq!(
        child.schema(),
        json!({
            "allOf": [
                {"$ref": "#/definitions/A"},
                {"$ref": "#/definitions/B"},
                {"type": "object", "properties": {"extra": {"type": "boolean"}}}
            ]
        })
    );
}

#[test]
fn test_merge_precedence() {
    assert_eq!(
        merge(&json!({"a": {"b": 1, "c": 2}}), &json!({"a": {"b": 9}})),
        json!({"a": {"b": 9, "c": 2}})
    );
    let x = json!({"a": {"b": [1, 2]}, "d": false});
    assert_eq!(merge(&x, &x), x);
}

#[test]
fn test_polymorph_common_ancestor() {
    let api = pet_api();
    let models = api.models();
    let kinds = [("Cat", models["Cat"].clone()), ("Dog", models["Dog"].clone())];
    let field = Field::polymorph(kinds).unwrap();
    assert_eq!(field.schema()["$ref"], json!("#/definitions/Pet"));

    let unrelated = Arc::new(Model::new("Rock", [("weight", Field::float())]));
    let err = Field::polymorph([("Cat", models["Cat"].clone()), ("Rock", unrelated)]).unwrap_err();
    assert!(matches!(err, AppError::Specs(_)));

    let other_root = Arc::new(Model::new("Other", [("x", Field::string())]));
    let both = Arc::new(Model::inherit(
        "Both",
        vec![
            ModelSource::from(&models["Pet"]),
            ModelSource::from(&other_root),
        ],
    ));
    let also_both = Arc::new(Model::inherit(
        "AlsoBoth",
        vec![
            ModelSource::from(&models["Pet"]),
            ModelSource::from(&other_root),
        ],
    ));
    let err = Field::polymorph([("a", both), ("b", also_both)]).unwrap_err();
    assert!(matches!(err, AppError::Specs(_)));
}

#[test]
fn test_path_parameter_is_documented() {
    let mut api = Api::default();
    let mut ns = Namespace::new("items");
    ns.route(
        "/items/{id}",
        Resource::new("Item").with_method(HttpMethod::Get),
    )
    .unwrap();
    api.add_namespace(ns).unwrap();

    let doc = api.schema(false).unwrap();
    assert_eq!(
        doc["paths"]["/items/{id}"]["parameters"],
        json!([{"name": "id", "in": "path", "required": true, "type": "string"}])
    );
}

#[test]
fn test_show_internal_only_adds_entries() {
    let mut api = pet_api();
    let public = api.schema(false).unwrap();
    let internal = api.schema(true).unwrap();

    assert!(public["paths"].get("/admin/audit").is_none());
    assert!(internal["paths"].get("/admin/audit").is_some());
    assert!(public["definitions"].get("Audit").is_none());
    assert!(internal["definitions"].get("Audit").is_some());

    for (path, item) in public["paths"].as_object().unwrap() {
        assert_eq!(&internal["paths"][path], item);
    }
    for (name, definition) in public["definitions"].as_object().unwrap() {
        assert_eq!(&internal["definitions"][name], definition);
    }
}

#[test]
fn test_undeclared_security_rejects_namespace() {
    let mut api = Api::default();
    let mut ns = Namespace::new("vault");
    ns.route(
        "/vault",
        Resource::new("Vault").doc(ns.security(["scheme_x"])).with_method(HttpMethod::Get),
    )
    .unwrap();

    let err = api.add_namespace(ns).unwrap_err();
    assert!(matches!(err, AppError::Security(_)));
    assert!(api.namespaces().is_empty());
}

#[test]
fn test_namespaces_sharing_a_name_are_both_kept() {
    let mut api = Api::default();
    let mut first = Namespace::new("a").with_path("/x");
    first.model("One", [("id", Field::integer())]);
    first
        .route("/one", Resource::new("One").with_method(HttpMethod::Get))
        .unwrap();
    let mut second = Namespace::new("a").with_path("/y");
    second.model("Two", [("id", Field::integer())]);
    second
        .route("/two", Resource::new("Two").with_method(HttpMethod::Get))
        .unwrap();

    api.add_namespace(first).unwrap();
    api.add_namespace(second).unwrap();

    assert_eq!(api.namespaces().len(), 2);
    assert!(api.models().contains_key("One"));
    assert!(api.models().contains_key("Two"));
    let doc = api.schema(false).unwrap();
    let paths: Vec<&String> = doc["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, ["/x/one", "/y/two"]);
    assert_eq!(doc["tags"], json!([{"name": "a"}]));
}

#[test]
fn test_every_reference_resolves() {
    let mut api = pet_api();
    for show_internal in [false, true] {
        let doc = api.schema(show_internal).unwrap();
        let definitions = doc["definitions"].as_object().unwrap();
        let mut refs = Vec::new();
        collect_refs(&doc, &mut refs);
        assert!(!refs.is_empty());
        for reference in refs {
            let key = reference
                .strip_prefix("#/definitions/")
                .unwrap_or_else(|| panic!("unexpected reference {}", reference));
            assert!(definitions.contains_key(key), "{} does not resolve", reference);
        }
    }
}

#[test]
fn test_pet_document_shape() {
    let mut api = pet_api();
    let doc = api.schema(false).unwrap();

    let definitions: Vec<&String> = doc["definitions"].as_object().unwrap().keys().collect();
    assert_eq!(
        definitions,
        vec!["Adoption", "Cat", "Dog", "OwnerInfo", "Pet"]
    );

    let list = &doc["paths"]["/pets"]["get"];
    assert_eq!(list["summary"], json!("List pets"));
    assert_eq!(
        list["responses"]["200"],
        json!({
            "description": "All pets",
            "schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}
        })
    );
    assert_eq!(doc["paths"]["/pets"]["post"]["security"], json!([{"apikey": []}]));
    assert_eq!(
        doc["paths"]["/pets/{id}"]["delete"]["responses"],
        json!({"204": {"description": "Deleted"}})
    );
    assert_eq!(doc["definitions"]["Pet"]["discriminator"], json!("kind"));
    assert_eq!(
        doc["tags"],
        json!([{"name": "pets", "description": "Pet store"}, {"name": "admin"}])
    );
}

#[test]
fn test_marshal_polymorph_and_defaults() {
    let api = pet_api();
    let models = api.models();
    let data = json!({
        "pet": {"kind": "Cat", "name": "Tom"},
        "notes": ["shy", "indoor"]
    });

    let rendered = marshal(&data, &models["Adoption"], None).unwrap();
    assert_eq!(
        rendered,
        json!({
            "pet": {"kind": "Cat", "name": "Tom", "lives": 9},
            "notes": ["shy", "indoor"]
        })
    );

    let unknown = json!({"pet": {"kind": "Fish", "name": "Nemo"}});
    let err = marshal(&unknown, &models["Adoption"], None).unwrap_err();
    assert!(matches!(err, AppError::Marshalling(_)));
}
