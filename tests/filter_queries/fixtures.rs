use std::sync::Arc;

use cellstore_core::edm::AssociationMultiplicity;
use cellstore_core::{
    CoreConfig, CoreEngine, CoreError, DocumentKey, DocumentStore, EdmType, EntityTypeSchema,
    InMemoryDocumentStore, InMemorySchema, PropertyDescriptor, QueryRequest,
};
use serde_json::{json, Map, Value};

/// 2020-01-01T00:00:00.000Z
pub const JAN_1_2020: i64 = 1_577_836_800_000;
pub const DAY_MS: i64 = 86_400_000;

pub struct Fixture {
    pub engine: CoreEngine<InMemorySchema>,
    pub store: InMemoryDocumentStore,
}

impl Fixture {
    /// Ten `SalesDetail` rows `s0..s9` (`decimal` is `number + 0.1`) plus two
    /// `Product` rows. `color` is dynamic and typed by its first write.
    pub fn sales() -> Self {
        let schema = InMemorySchema::new();
        schema.register(
            EntityTypeSchema::new("SalesDetail")
                .declare("number", EdmType::Int32)
                .declare("decimal", EdmType::Double)
                .declare("name", EdmType::String)
                .declare("flag", EdmType::Boolean)
                .declare("sold", EdmType::DateTime)
                .declare_list("tags", EdmType::Int32),
        );
        schema.register(
            EntityTypeSchema::new("Product")
                .with_property(PropertyDescriptor::new("", "label", EdmType::String).not_null())
                .with_property(
                    PropertyDescriptor::new("", "stock", EdmType::Int32).with_default(json!(0)),
                ),
        );
        schema.associate(
            "SalesDetail",
            AssociationMultiplicity::Many,
            "Product",
            AssociationMultiplicity::ZeroOrOne,
        );

        let store = InMemoryDocumentStore::new();
        for i in 0..10i64 {
            let mut row = json!({
                "number": i,
                "decimal": format!("{}.1", i).parse::<f64>().expect("decimal"),
                "name": format!("item{}", i),
                "flag": i % 2 == 0,
                "sold": JAN_1_2020 + i * DAY_MS,
                "tags": [i, i + 3],
            });
            if i % 2 == 0 {
                row["color"] = json!("red");
            }
            let row = object(row);
            schema.record_dynamic("SalesDetail", &row);
            store
                .write(&DocumentKey::new("SalesDetail", format!("s{}", i)), row, Some(0))
                .expect("seed row");
        }
        for (id, body) in [
            ("p1", json!({ "label": "widget" })),
            ("p2", json!({ "label": "gadget", "stock": 3 })),
        ] {
            let mut body = object(body);
            let missing = schema.apply_defaults("Product", &mut body).expect("known type");
            assert!(missing.is_empty(), "{:?}", missing);
            store
                .write(&DocumentKey::new("Product", id), body, None)
                .expect("seed product");
        }

        Fixture {
            engine: CoreEngine::new(Arc::new(schema), CoreConfig::default()),
            store,
        }
    }

    /// Ids matching a raw query string, in result order.
    pub fn ids(&self, entity_type: &str, raw: &str) -> Result<Vec<String>, CoreError> {
        let query = self.engine.parse_query_string(entity_type, raw)?;
        let page = self.store.execute(&query)?;
        Ok(page.ids().into_iter().map(str::to_string).collect())
    }

    /// Ids matching a `$filter` on `SalesDetail`.
    pub fn filter(&self, filter: &str) -> Result<Vec<String>, CoreError> {
        let request = QueryRequest::new().filter(filter);
        let query = self.engine.parse_query("SalesDetail", &request)?;
        let page = self.store.execute(&query)?;
        Ok(page.ids().into_iter().map(str::to_string).collect())
    }

    pub fn code(&self, filter: &str) -> &'static str {
        match self.filter(filter) {
            Ok(_) => "OK",
            Err(err) => err.code(),
        }
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
