use std::sync::{Arc, Barrier};
use std::thread;

use entmeta_core::{
    AttributeConfig, ClassDescriptor, EntityModel, ModelFactory, PropertyDescriptor, StaticSource,
};

const THREADS: usize = 16;

fn source() -> StaticSource {
    let variant = |reference: &str| AttributeConfig {
        nested_reference: Some(reference.to_string()),
        ..Default::default()
    };

    StaticSource::new()
        .with_class(
            ClassDescriptor::entity("Region")
                .property(PropertyDescriptor::new("id", "long").id())
                .property(PropertyDescriptor::new("name", "string").main())
                .property(PropertyDescriptor::new("parent", "Region")),
        )
        .with_class(
            ClassDescriptor::entity("Customer")
                .property(PropertyDescriptor::new("id", "long").id())
                .property(PropertyDescriptor::new("name", "string").main())
                .property(PropertyDescriptor::new("region", "Region"))
                .property(PropertyDescriptor::new("orders", "list<Order>")),
        )
        .with_class(
            ClassDescriptor::entity("Order")
                .property(PropertyDescriptor::new("id", "long").id())
                .property(PropertyDescriptor::new("customer", "Customer")),
        )
        .with_class(
            ClassDescriptor::entity("Employee")
                .property(PropertyDescriptor::new("id", "long").id())
                .property(
                    PropertyDescriptor::new("department", "Department")
                        .with(variant("Department")),
                ),
        )
        .with_class(
            ClassDescriptor::entity("Department")
                .property(PropertyDescriptor::new("id", "long").id())
                .property(PropertyDescriptor::new("manager", "Employee").with(variant("Employee"))),
        )
}

#[test]
fn concurrent_first_requests_share_one_build() {
    let factory = ModelFactory::new(source());
    let barrier = Barrier::new(THREADS);

    let models: Vec<Arc<EntityModel>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    factory.get_model("Customer").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));

    // one miss per key: no key was ever built twice
    let stats = factory.cache_stats();
    assert_eq!(stats.misses, stats.size);
    assert_eq!(stats.size, factory.cached_keys().len());
    assert!(stats.hits >= THREADS - 1);
}

#[test]
fn mutually_referencing_roots_do_not_deadlock() {
    for _ in 0..20 {
        let factory = ModelFactory::new(source());
        let barrier = Barrier::new(2);

        let (employee, department) = thread::scope(|s| {
            let employee = s.spawn(|| {
                barrier.wait();
                factory.get_model("Employee").unwrap()
            });
            let department = s.spawn(|| {
                barrier.wait();
                factory.get_model("Department").unwrap()
            });
            (employee.join().unwrap(), department.join().unwrap())
        });

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
}

#[test]
fn different_keys_build_in_parallel() {
    let factory = ModelFactory::new(source());
    let classes = ["Region", "Customer", "Order", "Employee", "Department"];

    thread::scope(|s| {
        for class in classes {
            let factory = factory.clone();
            s.spawn(move || {
                let model = factory.get_model(class).unwrap();
                assert_eq!(model.entity_class(), class);
            });
        }
    });

    for class in classes {
        let first = factory.get_model(class).unwrap();
        let again = factory.get_model(class).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
    let stats = factory.cache_stats();
    assert_eq!(stats.misses, stats.size);
}
