//! Integration tests for command assembly
//!
//! - INSERT/UPDATE/DELETE text and parameter order
//! - Owned entities flattened with prefixes
//! - Missing keys and empty updates reported before any SQL is built
//! - Custom and spatial type handlers feeding parameter values

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use storm::{
    CommandDefinition, DescribeType, Entity, Expr, Storm, StormError, TypeDescriptor, TypeHandler,
    Value,
};

use common::{Address, AuditEntry, Membership, Person, Status, Ticket, init_tracing, person};

// ============================================================================
// Insert
// ============================================================================

#[test]
fn test_insert_binds_convention_key() {
    init_tracing();
    let storm = Storm::new();
    let command = storm.insert(&person()).unwrap();

    assert_eq!(
        command.sql,
        "INSERT INTO [Persons](id,FullName,status,nickname,address_street,address_city,address_zip)\n\
         VALUES (@id,@name,@status,@nickname,@address_street,@address_city,@address_zip);\n\
         SELECT @id;\n"
    );
    assert_eq!(
        command.parameters,
        vec![
            ("id".to_string(), Value::Int(7)),
            ("name".to_string(), Value::from("Ada Lovelace")),
            ("status".to_string(), Value::Int(1)),
            ("nickname".to_string(), Value::Null),
            ("address_street".to_string(), Value::from("12 St James's Square")),
            ("address_city".to_string(), Value::from("London")),
            ("address_zip".to_string(), Value::Null),
        ]
    );
}

#[test]
fn test_insert_returns_supplied_key() {
    let storm = Storm::new();
    let ticket = Ticket {
        id: 4,
        code: "T-100".to_string(),
    };
    let command = storm.insert(&ticket).unwrap();

    assert_eq!(
        command.sql,
        "INSERT INTO [Tickets](id,code)\nVALUES (@id,@code);\nSELECT @code;\n"
    );
    assert_eq!(command.parameter("code"), Some(&Value::from("T-100")));
}

/// Declared key, generated by the database under the default settings
#[derive(Entity)]
pub struct Voucher {
    #[key]
    pub number: i64,
    pub amount: i64,
}

#[test]
fn test_insert_with_generated_key() {
    let storm = Storm::new();
    let command = storm
        .insert(&Voucher {
            number: 0,
            amount: 500,
        })
        .unwrap();

    assert_eq!(
        command.sql,
        "INSERT INTO [Vouchers](amount)\nVALUES (@amount);\nSELECT SCOPE_IDENTITY();\n"
    );
    assert_eq!(command.parameters, vec![("amount".to_string(), Value::Int(500))]);
}

#[derive(Entity)]
pub struct Customer {
    pub id: i32,
    #[owned]
    pub shipping: Option<Address>,
}

#[test]
fn test_absent_owned_entity_binds_nulls() {
    let storm = Storm::new();
    let command = storm
        .insert(&Customer {
            id: 1,
            shipping: None,
        })
        .unwrap();

    assert_eq!(
        command.parameters,
        vec![
            ("id".to_string(), Value::Int(1)),
            ("shipping_street".to_string(), Value::Null),
            ("shipping_city".to_string(), Value::Null),
            ("shipping_zip".to_string(), Value::Null),
        ]
    );
}

// ============================================================================
// Update and delete
// ============================================================================

#[test]
fn test_update_sets_non_key_columns() {
    let storm = Storm::new();
    let mut ada = person();
    ada.status = Status::Retired;
    let command = storm.update(&ada).unwrap();

    assert_eq!(
        command.sql,
        "UPDATE [Persons]\n \
         SET\n\
         \t FullName = @name\n\
         \t,status = @status\n\
         \t,nickname = @nickname\n\
         \t,address_street = @address_street\n\
         \t,address_city = @address_city\n\
         \t,address_zip = @address_zip\n\
         WHERE [Persons].id = @id\n"
    );
    assert_eq!(command.parameter("status"), Some(&Value::Int(2)));
    assert_eq!(command.parameters.last(), Some(&("id".to_string(), Value::Int(7))));
}

#[test]
fn test_delete_with_composite_key() {
    let storm = Storm::new();
    let membership = Membership {
        group_id: 3,
        user_id: 9,
        role: "owner".to_string(),
    };
    let command = storm.delete(&membership).unwrap();

    assert_eq!(
        command.sql,
        "DELETE FROM [Memberships]\n\
         WHERE [Memberships].group_id = @group_id\n\
         AND [Memberships].user_id = @user_id\n"
    );
    assert_eq!(
        command.parameters,
        vec![
            ("group_id".to_string(), Value::Int(3)),
            ("user_id".to_string(), Value::Int(9)),
        ]
    );
}

#[test]
fn test_key_dependent_commands_require_key() {
    let storm = Storm::new();
    let entry = AuditEntry {
        message: "logged in".to_string(),
    };

    assert_matches!(
        storm.update(&entry),
        Err(StormError::MissingPrimaryKey { ref entity, ref operation })
            if entity == "AuditEntry" && operation == "update"
    );
    assert_matches!(storm.delete(&entry), Err(StormError::MissingPrimaryKey { .. }));
    assert_matches!(storm.insert(&entry), Err(StormError::MissingPrimaryKey { .. }));
}

/// Its only key is excluded from SQL
#[derive(Entity)]
pub struct Ghost {
    #[key]
    #[not_mapped]
    pub id: i32,
    pub name: String,
}

/// An `id` member that is not mapped cannot become the key
#[derive(Entity)]
pub struct Draft {
    #[not_mapped]
    pub id: i32,
    pub title: String,
}

#[test]
fn test_ignored_key_does_not_satisfy_key_requirement() {
    let storm = Storm::new();
    let ghost = Ghost {
        id: 1,
        name: "Casper".to_string(),
    };
    assert_matches!(
        storm.delete(&ghost),
        Err(StormError::MissingPrimaryKey { ref entity, .. }) if entity == "Ghost"
    );
    assert_matches!(storm.update(&ghost), Err(StormError::MissingPrimaryKey { .. }));

    let draft = Draft {
        id: 2,
        title: "untitled".to_string(),
    };
    assert_matches!(storm.delete(&draft), Err(StormError::MissingPrimaryKey { .. }));
}

/// Nothing left to SET once keys and generated columns are skipped
#[derive(Entity)]
pub struct Counter {
    #[key]
    pub id: i32,
    #[generated(on_insert_and_update)]
    pub touched: i64,
}

#[test]
fn test_update_without_settable_columns() {
    let storm = Storm::new();
    assert_matches!(
        storm.update(&Counter { id: 1, touched: 0 }),
        Err(StormError::NothingToUpdate { ref entity }) if entity == "Counter"
    );
    assert!(storm.delete(&Counter { id: 1, touched: 0 }).is_ok());
}

// ============================================================================
// Select
// ============================================================================

#[test]
fn test_select_with_predicate() {
    let storm = Storm::new();
    let predicate = Expr::subject::<Person>()
        .member::<String>("name")
        .starts_with(Expr::constant("Ada"));

    let command = storm.select::<Person>(Some(&predicate)).unwrap();
    assert_eq!(
        command.sql,
        "SELECT id, FullName, status, nickname, address_street, address_city, address_zip \
         FROM [Persons] WHERE (FullName LIKE @p0)"
    );
    assert_eq!(command.parameter("p0"), Some(&Value::from("Ada%")));
}

#[test]
fn test_select_without_emittable_predicate() {
    let storm = Storm::new();
    let command = storm
        .select::<Ticket>(Some(&Expr::unsupported("Method: Soundex")))
        .unwrap();
    assert_eq!(command.sql, "SELECT id, code FROM [Tickets]");
    assert!(command.parameters.is_empty());
}

#[test]
fn test_inline_literal_tokens() {
    let command = CommandDefinition {
        sql: "SELECT TOP {=Limit} * FROM [Tickets] WHERE code = @Code".to_string(),
        parameters: vec![
            ("Limit".to_string(), Value::Int(25)),
            ("Code".to_string(), Value::from("T-1")),
        ],
    }
    .with_inlined_literals();

    assert_eq!(command.sql, "SELECT TOP 25 * FROM [Tickets] WHERE code = @Code");
    assert_eq!(command.parameters, vec![("Code".to_string(), Value::from("T-1"))]);
}

// ============================================================================
// Type handlers
// ============================================================================

mod handlers {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Money {
        pub cents: i64,
        pub currency: &'static str,
    }

    impl DescribeType for Money {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::opaque::<Money>("billing::Money", |_, _| {
                Err(StormError::TypeHandler {
                    type_name: "billing::Money".to_string(),
                    reason: "no handler registered".to_string(),
                })
            })
        }
    }

    struct MoneyHandler;

    impl TypeHandler<Money> for MoneyHandler {
        fn serialize(&self, value: &Money) -> storm::Result<Value> {
            Ok(Value::Text(format!(
                "{}.{:02} {}",
                value.cents / 100,
                value.cents % 100,
                value.currency
            )))
        }

        fn deserialize(&self, _value: &Value) -> storm::Result<Money> {
            Err(StormError::TypeHandler {
                type_name: "billing::Money".to_string(),
                reason: "read-only in tests".to_string(),
            })
        }
    }

    pub struct SqlGeometry(pub String);

    impl DescribeType for SqlGeometry {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::opaque::<SqlGeometry>("sqltypes::SqlGeometry", |value, _| {
                value
                    .downcast_ref::<SqlGeometry>()
                    .map(|g| Value::Text(g.0.clone()))
                    .ok_or_else(|| StormError::TypeHandler {
                        type_name: "SqlGeometry".to_string(),
                        reason: "unexpected value".to_string(),
                    })
            })
        }
    }

    #[derive(Entity)]
    pub struct Product {
        pub id: i32,
        pub price: Money,
        pub footprint: SqlGeometry,
    }

    #[test]
    fn test_handler_values_are_bound() {
        let storm = Storm::new();
        assert!(storm.register_type_handler::<Money, _>(MoneyHandler));

        let product = Product {
            id: 1,
            price: Money {
                cents: 1250,
                currency: "EUR",
            },
            footprint: SqlGeometry("POLYGON((0 0, 1 0, 1 1, 0 0))".to_string()),
        };
        let command = storm.insert(&product).unwrap();

        assert_eq!(
            command.sql,
            "INSERT INTO [Products](id,price,footprint)\nVALUES (@id,@price,@footprint);\nSELECT @id;\n"
        );
        assert_eq!(command.parameter("price"), Some(&Value::from("12.50 EUR")));
        assert_eq!(
            command.parameter("footprint"),
            Some(&Value::Udt {
                udt_name: "geometry".to_string(),
                value: Box::new(Value::from("POLYGON((0 0, 1 0, 1 1, 0 0))")),
            })
        );
    }

    #[test]
    fn test_composite_without_handler_is_skipped() {
        let storm = Storm::new();
        let metadata = storm.resolve::<Product>().unwrap();
        assert!(metadata.property("price").is_none());
        assert!(metadata.property("footprint").is_some());
    }
}
