//! Schema description of entity types.
//!
//! These types are what `#[derive(Entity)]` emits: the declared members of a
//! struct in order, with their types and annotation attributes. Hand-written
//! implementations are equally valid.

use std::any::{Any, TypeId};

use super::model::GeneratedPolicy;
use crate::types::{DescribeType, TypeDescriptor};

/// A struct mapped to a table, or embedded in one as an owned entity.
///
/// Implemented by `#[derive(Entity)]`.
pub trait Entity: DescribeType {
    /// Declared members and annotations
    fn shape() -> EntityShape;

    /// Read a member by name; `None` for unknown or inaccessible members
    fn member(&self, name: &str) -> Option<&dyn Any>;
}

/// `#[entity(table = "..", schema = "..")]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAttribute {
    pub name: &'static str,
    pub schema: Option<&'static str>,
}

/// Annotations carried by a single member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberAttributes {
    pub key: bool,
    pub column: Option<&'static str>,
    pub generated: Option<GeneratedPolicy>,
    pub owned: bool,
    pub not_mapped: bool,
}

/// One declared member of an entity type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub ty: TypeDescriptor,
    pub readable: bool,
    pub writable: bool,
    pub attributes: MemberAttributes,
}

impl MemberDescriptor {
    pub fn new<T: DescribeType>(name: &'static str) -> Self {
        Self {
            name,
            ty: T::describe(),
            readable: true,
            writable: true,
            attributes: MemberAttributes::default(),
        }
    }

    pub fn key(mut self) -> Self {
        self.attributes.key = true;
        self
    }

    pub fn column(mut self, column: &'static str) -> Self {
        self.attributes.column = Some(column);
        self
    }

    pub fn generated(mut self, policy: GeneratedPolicy) -> Self {
        self.attributes.generated = Some(policy);
        self
    }

    pub fn owned(mut self) -> Self {
        self.attributes.owned = true;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.attributes.not_mapped = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Private fields: described, never mapped.
    pub fn inaccessible(mut self) -> Self {
        self.readable = false;
        self.writable = false;
        self
    }

    pub(crate) fn is_accessible(&self) -> bool {
        self.readable && self.writable
    }
}

/// Declared shape of an entity type.
#[derive(Debug, Clone)]
pub struct EntityShape {
    pub type_id: TypeId,
    pub name: &'static str,
    pub table: Option<TableAttribute>,
    pub members: Vec<MemberDescriptor>,
}

impl EntityShape {
    pub fn new<T: 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name,
            table: None,
            members: Vec::new(),
        }
    }

    pub fn table(mut self, name: &'static str, schema: Option<&'static str>) -> Self {
        self.table = Some(TableAttribute { name, schema });
        self
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let shape = EntityShape::new::<Invoice>("Invoice")
            .table("Invoices", Some("billing"))
            .member(MemberDescriptor::new::<i64>("number").key())
            .member(MemberDescriptor::new::<String>("customer").column("CustomerName"))
            .member(MemberDescriptor::new::<String>("secret").inaccessible());

        let names: Vec<&str> = shape.members.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["number", "customer", "secret"]);
        assert_eq!(shape.type_id, TypeId::of::<Invoice>());
        assert_eq!(shape.table.as_ref().and_then(|t| t.schema), Some("billing"));

        let customer = shape.find_member("customer").unwrap();
        assert_eq!(customer.attributes.column, Some("CustomerName"));
        assert!(customer.is_accessible());
        assert!(!shape.find_member("secret").unwrap().is_accessible());
    }

    #[test]
    fn test_read_only_is_not_accessible() {
        let member = MemberDescriptor::new::<i32>("total").read_only();
        assert!(member.readable);
        assert!(!member.is_accessible());
    }
}
