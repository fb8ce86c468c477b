use pretty_assertions::assert_eq;
use std::sync::Arc;

use entmeta_core::{
    AttributeConfig, AttributeKind, BundleMessageService, ClassDescriptor, EntityConfig,
    GlobalConfig, GroupDecl, ModelError, ModelFactory, PropertyDescriptor, ScalarType, SelectMode,
    SortDirection, StaticSource, Tristate, ValueType,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn prop(name: &str, declared: &str) -> PropertyDescriptor {
    PropertyDescriptor::new(name, declared)
}

fn region() -> ClassDescriptor {
    ClassDescriptor::entity("Region")
        .property(prop("id", "long").id())
        .property(prop("name", "string").main())
        .property(prop("parent", "Region"))
}

fn crm_source() -> StaticSource {
    StaticSource::new()
        .with_class(region())
        .with_class(
            ClassDescriptor::embeddable("Address")
                .property(prop("street", "string"))
                .property(prop("city", "string"))
                .property(prop("country", "Region")),
        )
        .with_class(ClassDescriptor::enumeration("Status", &["ACTIVE", "BLOCKED"]))
        .with_class(
            ClassDescriptor::entity("Order")
                .property(prop("id", "long").id())
                .property(prop("number", "string").main())
                .property(prop("customer", "Customer")),
        )
        .with_class(
            ClassDescriptor::entity("Customer")
                .property(prop("id", "long").id())
                .property(prop("name", "string").main().searchable())
                .property(prop("region", "Region"))
                .property(prop("address", "Address"))
                .property(prop("status", "Status"))
                .property(prop("balance", "decimal"))
                .property(prop("orders", "list<Order>"))
                .property(prop("tags", "list<string>"))
                .property(prop("active", "boolean"))
                .property(prop("createdAt", "datetime"))
                .property(prop("photo", "binary")),
        )
}

fn single(class: ClassDescriptor) -> ModelFactory {
    ModelFactory::new(StaticSource::new().with_class(class))
}

fn definition_message(err: ModelError) -> String {
    match err {
        ModelError::Definition { message, .. } => message,
        other => panic!("expected a definition error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

#[test]
fn customer_scenario() {
    let factory = ModelFactory::new(crm_source());
    let customer = factory.get_model("Customer").unwrap();

    let names: Vec<&str> = customer.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "name",
            "region",
            "address.street",
            "address.city",
            "address.country",
            "status",
            "balance",
            "orders",
            "tags",
            "active",
            "createdAt",
            "photo",
        ]
    );

    let name = customer.get_attribute_model("name").unwrap();
    assert_eq!(name.kind, AttributeKind::Basic);
    assert_eq!(name.value_type, ValueType::Scalar(ScalarType::String));
    assert!(name.searchable);
    assert!(name.main);

    let region = customer.get_attribute_model("region").unwrap();
    assert_eq!(region.kind, AttributeKind::Master);
    assert_eq!(region.select_mode, Some(SelectMode::Combo));
    let nested = region.nested_entity_model().unwrap();
    assert_eq!(nested.reference(), "Customer.region");
    assert_eq!(nested.entity_class(), "Region");

    let parent = customer.get_attribute_model("region.parent").unwrap();
    assert_eq!(parent.name, "parent");
    assert_eq!(parent.kind, AttributeKind::Master);
    assert_eq!(
        parent.nested_entity_model().unwrap().reference(),
        "Customer.region.parent"
    );
}

#[test]
fn type_based_and_global_defaults() {
    let factory = ModelFactory::new(crm_source());
    let customer = factory.get_model("Customer").unwrap();
    let attr = |name: &str| customer.get_attribute_model(name).unwrap();

    assert_eq!(attr("status").value_type, ValueType::Enum("Status".into()));
    assert_eq!(attr("status").kind, AttributeKind::Basic);
    assert_eq!(attr("status").select_mode, Some(SelectMode::Combo));

    assert_eq!(attr("balance").precision, Some(2));
    assert!(attr("balance").use_thousands_grouping);
    assert!(!attr("name").use_thousands_grouping);

    assert_eq!(attr("orders").kind, AttributeKind::Detail);
    assert_eq!(attr("orders").select_mode, Some(SelectMode::Lookup));
    assert!(!attr("orders").visible_in_grid);
    assert!(!attr("orders").sortable);

    assert_eq!(attr("tags").kind, AttributeKind::ElementCollection);
    assert_eq!(attr("tags").select_mode, Some(SelectMode::Token));
    assert!(attr("tags").nested_entity_model().is_none());

    assert!(attr("active").boolean_mode.is_some());
    assert_eq!(attr("createdAt").display_format.as_deref(), Some("dd-MM-yyyy HH:mm:ss"));
    assert_eq!(attr("createdAt").display_name(None), "Created at");
    assert_eq!(attr("photo").kind, AttributeKind::Lob);

    let name = attr("name");
    assert!(name.visible && name.visible_in_grid && name.editable && name.sortable);
    assert!(!name.read_only && !name.required);
}

#[test]
fn global_config_feeds_defaults() {
    let config = GlobalConfig {
        decimal_precision: 4,
        datetime_format: "yyyy-MM-dd'T'HH:mm".into(),
        search_case_sensitive: true,
        enum_select_mode: SelectMode::List,
        ..Default::default()
    };
    let factory = ModelFactory::builder(crm_source()).config(config).build();
    let customer = factory.get_model("Customer").unwrap();

    assert_eq!(customer.get_attribute_model("balance").unwrap().precision, Some(4));
    assert_eq!(
        customer.get_attribute_model("createdAt").unwrap().display_format.as_deref(),
        Some("yyyy-MM-dd'T'HH:mm")
    );
    assert!(customer.get_attribute_model("name").unwrap().search_case_sensitive);
    assert_eq!(
        customer.get_attribute_model("status").unwrap().select_mode,
        Some(SelectMode::List)
    );
}

#[test]
fn explicit_declarations_override_defaults() {
    let factory = single(
        ClassDescriptor::entity("Invoice")
            .property(prop("id", "long").id())
            .property(prop("total", "decimal").with(AttributeConfig {
                precision: Some(0),
                currency: true,
                use_thousands_grouping: Tristate::False,
                ..Default::default()
            }))
            .property(prop("reference", "string").with(AttributeConfig {
                display_name: Some("Invoice reference".into()),
                read_only: Tristate::True,
                visible_in_grid: Tristate::False,
                required: Tristate::True,
                ..Default::default()
            })),
    );
    let invoice = factory.get_model("Invoice").unwrap();

    let total = invoice.get_attribute_model("total").unwrap();
    assert_eq!(total.precision, Some(0));
    assert!(total.currency);
    assert!(!total.use_thousands_grouping);

    let reference = invoice.get_attribute_model("reference").unwrap();
    assert_eq!(reference.display_name(None), "Invoice reference");
    assert!(reference.read_only);
    assert!(!reference.editable);
    assert!(reference.visible);
    assert!(!reference.visible_in_grid);
    assert_eq!(invoice.required_attributes().len(), 1);
}

// ---------------------------------------------------------------------------
// Identity and invariants
// ---------------------------------------------------------------------------

#[test]
fn repeated_requests_share_one_instance() {
    let factory = ModelFactory::new(crm_source());
    let first = factory.get_model("Customer").unwrap();
    let second = factory.get_model("Customer").unwrap();
    let variant = factory.get_model_variant("Customer", "Customer").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &variant));
}

#[test]
fn named_variants_are_distinct_models() {
    let factory = ModelFactory::new(crm_source());
    let default = factory.get_model("Region").unwrap();
    let lookup = factory.get_model_variant("RegionLookup", "Region").unwrap();
    assert!(!Arc::ptr_eq(&default, &lookup));
    assert_eq!(lookup.reference(), "RegionLookup");
    assert_eq!(lookup.entity_class(), "Region");
}

#[test]
fn attribute_names_are_unique_and_addressable() {
    let factory = ModelFactory::new(crm_source());
    let customer = factory.get_model("Customer").unwrap();
    for attribute in customer.attributes() {
        let found = customer.get_attribute_model(&attribute.name).unwrap();
        assert_eq!(found.name, attribute.name);
    }

    let duplicate = single(
        ClassDescriptor::entity("Dup")
            .property(prop("id", "long").id())
            .property(prop("address.city", "string"))
            .property(prop("address", "Address")),
    );
    // Address is unknown in this source
    assert!(duplicate.get_model("Dup").unwrap_err().is_unsupported_type());
}

#[test]
fn flattened_name_clash_is_rejected() {
    let source = StaticSource::new()
        .with_class(ClassDescriptor::embeddable("Address").property(prop("city", "string")))
        .with_class(
            ClassDescriptor::entity("Dup")
                .property(prop("id", "long").id())
                .property(prop("address.city", "string"))
                .property(prop("address", "Address")),
        );
    let err = ModelFactory::new(source).get_model("Dup").unwrap_err();
    assert_eq!(definition_message(err), "duplicate attribute name \"address.city\"");
}

#[test]
fn main_attribute_cardinality() {
    let none = single(
        ClassDescriptor::entity("Plain")
            .property(prop("id", "long").id())
            .property(prop("label", "string")),
    );
    let plain = none.get_model("Plain").unwrap();
    assert!(plain.main_attribute().is_none());
    assert!(plain.display_property().is_none());

    let two = single(
        ClassDescriptor::entity("Twice")
            .property(prop("id", "long").id())
            .property(prop("a", "string").main())
            .property(prop("b", "string").main()),
    );
    let err = two.get_model("Twice").unwrap_err();
    assert_eq!(definition_message(err), "multiple main attributes: a, b");
}

#[test]
fn root_model_requires_an_id() {
    let factory = ModelFactory::new(
        StaticSource::new()
            .with_class(ClassDescriptor::entity("Note").property(prop("text", "text")))
            .with_class(
                ClassDescriptor::entity("Ticket")
                    .property(prop("id", "long").id())
                    .property(prop("note", "Note")),
            ),
    );

    let ticket = factory.get_model("Ticket").unwrap();
    assert_eq!(ticket.id_attribute().unwrap().name, "id");
    assert!(ticket.attributes().iter().all(|a| a.name != "id"));
    assert_eq!(ticket.get_attribute_model("id").unwrap().name, "id");
    // nested models do not need an id
    assert!(ticket.get_attribute_model("note.text").is_some());

    let err = factory.get_model("Note").unwrap_err();
    assert_eq!(definition_message(err), "class \"Note\" declares no id attribute");
}

#[test]
fn dotted_variant_names_are_still_roots() {
    let factory = ModelFactory::builder(
        StaticSource::new()
            .with_class(region())
            .with_class(ClassDescriptor::entity("NoId").property(prop("name", "string"))),
    )
    .config(GlobalConfig {
        max_nesting_depth: 1,
        ..Default::default()
    })
    .build();

    let err = factory.get_model_variant("crm.lookup", "NoId").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid model definition for crm.lookup (NoId): class \"NoId\" declares no id attribute"
    );

    let lookup = factory.get_model_variant("crm.region.lookup", "Region").unwrap();
    assert_eq!(lookup.depth(), 0);
    assert!(!lookup.is_leaf());
    let parent = lookup.get_attribute_model("parent").unwrap().nested_model().unwrap();
    assert_eq!(parent.reference(), "crm.region.lookup.parent");
    assert_eq!(parent.depth(), 1);
    assert!(parent.is_leaf());
}

#[test]
fn technical_version_slot() {
    let factory = single(
        ClassDescriptor::entity("Doc")
            .property(prop("id", "uuid").id())
            .property(prop("revision", "integer").with(AttributeConfig {
                version: true,
                ..Default::default()
            }))
            .property(prop("title", "string")),
    );
    let doc = factory.get_model("Doc").unwrap();
    assert_eq!(doc.version_attribute().unwrap().name, "revision");
    assert_eq!(doc.attributes().len(), 1);

    let twice = single(
        ClassDescriptor::entity("Doc")
            .property(prop("id", "uuid").id())
            .property(prop("key", "string").id()),
    );
    assert!(definition_message(twice.get_model("Doc").unwrap_err())
        .starts_with("more than one id attribute"));
}

// ---------------------------------------------------------------------------
// Cycles and depth
// ---------------------------------------------------------------------------

#[test]
fn self_reference_terminates_at_leaf() {
    let factory = single(region());
    let root = factory.get_model("Region").unwrap();
    assert!(!root.is_leaf());

    let mut model = root.get_attribute_model("parent").unwrap().nested_model().unwrap();
    assert_eq!(model.entity_class(), "Region");
    let mut depth = 1;
    while !model.is_leaf() {
        model = model.get_attribute_model("parent").unwrap().nested_model().unwrap();
        depth += 1;
    }
    assert_eq!(depth, 3);
    assert_eq!(model.reference(), "Region.parent.parent.parent");

    let parent = model.get_attribute_model("parent").unwrap();
    assert_eq!(parent.kind, AttributeKind::Master);
    assert!(parent.nested_entity_model().is_none());
}

#[test]
fn nesting_depth_is_configurable() {
    let config = GlobalConfig {
        max_nesting_depth: 1,
        ..Default::default()
    };
    let factory = ModelFactory::builder(StaticSource::new().with_class(region()))
        .config(config)
        .build();
    let root = factory.get_model("Region").unwrap();
    let nested = root.get_attribute_model("parent").unwrap().nested_model().unwrap();
    assert!(nested.is_leaf());
    assert_eq!(factory.cached_keys().len(), 2);
}

#[test]
fn explicit_self_variant_resolves_through_proxy() {
    let factory = single(
        ClassDescriptor::entity("Category")
            .property(prop("id", "long").id())
            .property(prop("name", "string").main())
            .property(prop("parent", "Category").with(AttributeConfig {
                nested_reference: Some("Category".into()),
                ..Default::default()
            })),
    );
    let category = factory.get_model("Category").unwrap();
    let parent = category.get_attribute_model("parent").unwrap();
    let handle = parent.nested_entity_model().unwrap();

    assert!(Arc::ptr_eq(&handle.resolve().unwrap(), &category));
    assert!(std::ptr::eq(parent.nested_model().unwrap(), category.as_ref()));
    assert_eq!(
        category.get_attribute_model("parent.parent.name").unwrap().name,
        "name"
    );
    assert_eq!(factory.cache_stats().size, 1);
}

#[test]
fn mutually_referencing_variants() {
    let factory = ModelFactory::new(
        StaticSource::new()
            .with_class(
                ClassDescriptor::entity("Employee")
                    .property(prop("id", "long").id())
                    .property(prop("department", "Department").with(AttributeConfig {
                        nested_reference: Some("Department".into()),
                        ..Default::default()
                    })),
            )
            .with_class(
                ClassDescriptor::entity("Department")
                    .property(prop("id", "long").id())
                    .property(prop("manager", "Employee").with(AttributeConfig {
                        nested_reference: Some("Employee".into()),
                        ..Default::default()
                    })),
            ),
    );

    let employee = factory.get_model("Employee").unwrap();
    let department = factory.get_model("Department").unwrap();
    let via_employee = employee
        .get_attribute_model("department")
        .unwrap()
        .nested_entity_model()
        .unwrap()
        .resolve()
        .unwrap();
    assert!(Arc::ptr_eq(&via_employee, &department));
    assert_eq!(factory.cache_stats().misses, 2);
}

fn failing_cycle() -> StaticSource {
    let via = |reference: &str| AttributeConfig {
        nested_reference: Some(reference.into()),
        ..Default::default()
    };
    StaticSource::new()
        .with_class(
            ClassDescriptor::entity("A")
                .property(prop("id", "long").id())
                .property(prop("x", "string").main())
                .property(prop("y", "string").main())
                .property(prop("b", "B").with(via("B"))),
        )
        .with_class(
            ClassDescriptor::entity("B")
                .property(prop("id", "long").id())
                .property(prop("name", "string").main())
                .property(prop("a", "A").with(via("A"))),
        )
}

#[test]
fn failing_cycle_outcome_is_order_independent() {
    let a_first = ModelFactory::new(failing_cycle());
    let a_then = a_first.get_model("A").unwrap_err();
    let b_after_a = a_first.get_model("B").unwrap_err();

    let b_first = ModelFactory::new(failing_cycle());
    let b_then = b_first.get_model("B").unwrap_err();
    let a_after_b = b_first.get_model("A").unwrap_err();

    let expected = "invalid model definition for A (A): multiple main attributes: x, y";
    assert_eq!(a_then.to_string(), expected);
    assert_eq!(b_after_a, a_then);
    assert_eq!(b_then, a_then);
    assert_eq!(a_after_b, a_then);
    assert_eq!(a_first.cache_stats().size, 2);
    assert_eq!(b_first.cache_stats().size, 2);
}

// ---------------------------------------------------------------------------
// Groups and order
// ---------------------------------------------------------------------------

#[test]
fn explicit_attribute_order() {
    let factory = single(
        ClassDescriptor::entity("Abc")
            .property(prop("id", "long").id())
            .property(prop("a", "string"))
            .property(prop("b", "string"))
            .property(prop("c", "string"))
            .with_config(EntityConfig {
                attribute_order: vec!["b".into(), "a".into(), "c".into()],
                ..Default::default()
            }),
    );
    let model = factory.get_model("Abc").unwrap();
    let order: Vec<(&str, usize)> = model
        .attributes()
        .iter()
        .map(|a| (a.name.as_str(), a.order))
        .collect();
    assert_eq!(order, vec![("b", 0), ("a", 1), ("c", 2)]);
    assert!(model.only_default_group());
    assert_eq!(model.groups()[0].key, "default");
    assert_eq!(model.groups()[0].attributes, vec!["b", "a", "c"]);
}

#[test]
fn declared_groups_and_lists() {
    let factory = single(
        ClassDescriptor::entity("Contact")
            .property(prop("id", "long").id())
            .property(prop("name", "string").main().searchable())
            .property(prop("email", "string").searchable())
            .property(prop("phone", "string"))
            .property(prop("notes", "text"))
            .with_config(EntityConfig {
                groups: vec![
                    GroupDecl::new("reach", &["phone", "email"]),
                    GroupDecl::new("general", &["name"]),
                ],
                grid_order: vec!["email".into()],
                search_order: vec!["email".into(), "name".into()],
                sort_order: vec!["-name".into(), "email".into()],
                ..Default::default()
            }),
    );
    let contact = factory.get_model("Contact").unwrap();

    let groups: Vec<(&str, Vec<String>)> = contact
        .groups()
        .iter()
        .map(|g| (g.key.as_str(), g.attributes.clone()))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("reach", vec!["email".to_string(), "phone".to_string()]),
            ("general", vec!["name".to_string()]),
            ("default", vec!["notes".to_string()]),
        ]
    );
    assert!(!contact.only_default_group());
    assert_eq!(contact.get_attribute_model("phone").unwrap().group, "reach");
    assert_eq!(contact.attributes_in_group("default").len(), 1);

    let grid: Vec<&str> = contact.grid_attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(grid, vec!["email", "name", "phone", "notes"]);
    let search: Vec<&str> = contact.search_attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(search, vec!["email", "name"]);

    let sort = contact.sort_order();
    assert_eq!(sort[0].attribute, "name");
    assert_eq!(sort[0].direction, SortDirection::Descending);
    assert_eq!(sort[1].direction, SortDirection::Ascending);
}

#[test]
fn conflicting_layout_is_a_definition_error() {
    let factory = single(
        ClassDescriptor::entity("Bad")
            .property(prop("id", "long").id())
            .property(prop("a", "string"))
            .with_config(EntityConfig {
                groups: vec![GroupDecl::new("one", &["a"]), GroupDecl::new("two", &["a"])],
                ..Default::default()
            }),
    );
    let err = factory.get_model("Bad").unwrap_err();
    assert_eq!(
        definition_message(err),
        "attribute \"a\" is assigned to both group \"one\" and group \"two\""
    );

    let sort = single(
        ClassDescriptor::entity("Bad")
            .property(prop("id", "long").id())
            .with_config(EntityConfig {
                sort_order: vec!["ghost".into()],
                ..Default::default()
            }),
    );
    assert_eq!(
        definition_message(sort.get_model("Bad").unwrap_err()),
        "sort order names unknown attribute \"ghost\""
    );
}

// ---------------------------------------------------------------------------
// Texts
// ---------------------------------------------------------------------------

#[test]
fn locale_texts_override_declared_fallbacks() {
    let messages = BundleMessageService::new("en")
        .with_bundle(
            "en",
            [
                ("Customer.name.displayName", "Client name"),
                ("Customer.displayName", "Client"),
                ("Region.name.displayName", "Region label"),
            ],
        )
        .with_bundle("nl", [("Customer.name.displayName", "Klantnaam")]);
    let factory = ModelFactory::builder(crm_source())
        .messages(Arc::new(messages))
        .build();
    let customer = factory.get_model("Customer").unwrap();

    let name = customer.get_attribute_model("name").unwrap();
    assert_eq!(name.display_name(None), "Client name");
    assert_eq!(name.display_name(Some("nl-BE")), "Klantnaam");
    assert_eq!(name.display_name(Some("fr")), "Client name");
    assert_eq!(customer.display_name(None), "Client");
    assert_eq!(customer.display_name_plural(None), "Customers");

    // nested reference falls back to the class-level key
    let region_name = customer.get_attribute_model("region.name").unwrap();
    assert_eq!(region_name.display_name(None), "Region label");

    // no message at all: declared or derived fallback, never a panic
    let street = customer.get_attribute_model("address.street").unwrap();
    assert_eq!(street.display_name(Some("de")), "Address street");
    assert_eq!(street.description(None), None);
}

// ---------------------------------------------------------------------------
// Embedding and inheritance
// ---------------------------------------------------------------------------

#[test]
fn embedded_properties_inherit_flags() {
    let source = StaticSource::new()
        .with_class(
            ClassDescriptor::embeddable("Audit")
                .property(prop("ref", "long").id())
                .property(prop("createdBy", "string"))
                .property(prop("note", "string").with(AttributeConfig {
                    visible: Tristate::True,
                    ..Default::default()
                })),
        )
        .with_class(
            ClassDescriptor::entity("Doc")
                .property(prop("id", "long").id())
                .property(prop("audit", "Audit").with(AttributeConfig {
                    visible: Tristate::False,
                    ..Default::default()
                })),
        );
    let doc = ModelFactory::new(source).get_model("Doc").unwrap();

    let names: Vec<&str> = doc.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["audit.createdBy", "audit.note"]);
    assert!(!doc.get_attribute_model("audit.createdBy").unwrap().visible);
    assert!(doc.get_attribute_model("audit.note").unwrap().visible);
}

#[test]
fn entity_marked_embedded_is_flattened() {
    let factory = ModelFactory::new(
        StaticSource::new()
            .with_class(region())
            .with_class(
                ClassDescriptor::entity("Person")
                    .property(prop("id", "long").id())
                    .property(prop("fullName", "string"))
                    .property(prop("region", "Region")),
            )
            .with_class(
                ClassDescriptor::entity("Contract")
                    .property(prop("id", "long").id())
                    .property(prop("signer", "Person").with(AttributeConfig {
                        embedded: true,
                        ..Default::default()
                    })),
            ),
    );
    let contract = factory.get_model("Contract").unwrap();
    // the embedded copy drops the technical id
    assert!(contract.get_attribute_model("signer.fullName").is_some());
    assert!(contract.get_attribute_model("signer.id").is_none());
    let region = contract.get_attribute_model("signer.region").unwrap();
    assert_eq!(region.kind, AttributeKind::Master);
    assert_eq!(
        region.nested_entity_model().unwrap().reference(),
        "Contract.signer.region"
    );
}

#[test]
fn inherited_properties_come_first() {
    let factory = ModelFactory::new(
        StaticSource::new()
            .with_class(
                ClassDescriptor::entity("Party")
                    .property(prop("id", "long").id())
                    .property(prop("name", "string").main())
                    .property(prop("email", "string")),
            )
            .with_class(
                ClassDescriptor::entity("Company")
                    .extends("Party")
                    .property(prop("vatNumber", "string"))
                    .property(prop("email", "string").with(AttributeConfig {
                        required: Tristate::True,
                        ..Default::default()
                    })),
            ),
    );
    let company = factory.get_model("Company").unwrap();
    let names: Vec<&str> = company.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["name", "vatNumber", "email"]);
    assert!(company.get_attribute_model("email").unwrap().required);
    assert_eq!(company.id_attribute().unwrap().name, "id");
    assert_eq!(company.display_name(None), "Company");
}

#[test]
fn ignored_properties_are_skipped() {
    let factory = single(
        ClassDescriptor::entity("Cached")
            .property(prop("id", "long").id())
            .property(prop("payload", "SomethingUnknown").with(AttributeConfig {
                ignore: true,
                ..Default::default()
            })),
    );
    assert!(factory.get_model("Cached").unwrap().attributes().is_empty());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn unsupported_types() {
    let unknown = single(
        ClassDescriptor::entity("Thing")
            .property(prop("id", "long").id())
            .property(prop("blob", "Whatever")),
    );
    let err = unknown.get_model("Thing").unwrap_err();
    assert_eq!(
        err,
        ModelError::UnsupportedAttributeType {
            key: entmeta_core::ModelKey::root("Thing"),
            attribute: "blob".into(),
            type_name: "Whatever".into(),
        }
    );

    let nested_collection = single(
        ClassDescriptor::entity("Thing")
            .property(prop("id", "long").id())
            .property(prop("matrix", "list<list<integer>>")),
    );
    assert!(nested_collection.get_model("Thing").unwrap_err().is_unsupported_type());

    let embedded_twice = ModelFactory::new(
        StaticSource::new()
            .with_class(ClassDescriptor::embeddable("Geo").property(prop("lat", "double")))
            .with_class(ClassDescriptor::embeddable("Address").property(prop("geo", "Geo")))
            .with_class(
                ClassDescriptor::entity("Site")
                    .property(prop("id", "long").id())
                    .property(prop("address", "Address")),
            ),
    );
    let err = embedded_twice.get_model("Site").unwrap_err();
    assert!(err.is_unsupported_type());
    assert!(err.to_string().contains("\"address.geo\""));
}

#[test]
fn contradicting_declarations() {
    let both = single(
        ClassDescriptor::entity("Form")
            .property(prop("id", "long").id())
            .property(prop("code", "string").with(AttributeConfig {
                read_only: Tristate::True,
                editable: Tristate::True,
                ..Default::default()
            })),
    );
    assert_eq!(
        definition_message(both.get_model("Form").unwrap_err()),
        "attribute \"code\" is declared both read-only and editable"
    );

    let percent_text = single(
        ClassDescriptor::entity("Form")
            .property(prop("id", "long").id())
            .property(prop("code", "string").with(AttributeConfig {
                percentage: true,
                ..Default::default()
            })),
    );
    assert!(percent_text.get_model("Form").unwrap_err().is_definition());
}

#[test]
fn failed_builds_poison_their_slot() {
    let factory = ModelFactory::new(
        StaticSource::new()
            .with_class(
                ClassDescriptor::entity("Broken")
                    .property(prop("id", "long").id())
                    .property(prop("a", "string").main())
                    .property(prop("b", "string").main()),
            )
            .with_class(
                ClassDescriptor::entity("Holder")
                    .property(prop("id", "long").id())
                    .property(prop("broken", "Broken")),
            ),
    );

    let first = factory.get_model("Broken").unwrap_err();
    let second = factory.get_model("Broken").unwrap_err();
    assert_eq!(first, second);

    let holder = factory.get_model("Holder").unwrap_err();
    assert_eq!(holder.key().reference, "Holder.broken");
    assert_eq!(factory.get_model("Holder").unwrap_err(), holder);

    let stats = factory.cache_stats();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.size, 3);
}
