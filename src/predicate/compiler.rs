//! Predicate Compiler
//!
//! Walks a predicate tree and emits a parameterized SQL fragment. Parameters
//! are named `p0, p1, ...` in the order values are first bound and referenced
//! as `@pN` in the SQL text. Node kinds without SQL (unsupported nodes,
//! unbound slots) are dropped, and a combinator with one dropped side
//! collapses to the other side.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::expr::{BinaryOp, Expr};
use super::mapping::{PropertyMappings, TypeMappings, map_property_path};
use crate::types::Value;

/// Result of compiling a predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledPredicate {
    /// SQL fragment; empty when nothing was emittable
    pub sql: String,
    /// Bound parameters in binding order
    pub parameters: Vec<(String, Value)>,
}

impl CompiledPredicate {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// Compile a predicate with the given mappings.
pub fn compile(
    predicate: &Expr,
    mappings: &PropertyMappings,
    type_mappings: &TypeMappings,
) -> CompiledPredicate {
    let mut context = CompilationContext::new(mappings, type_mappings);
    let sql = context.compile(predicate);
    context.finish(sql)
}

/// Intermediate result of compiling one node.
#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    /// Finished SQL text
    Sql(String),
    /// Logical property path, mapped to a column when rendered
    Path(String),
    /// Name of a bound parameter
    Parameter(String),
    /// Literal null
    Null,
}

/// Per-compilation state: the parameter counter and bag.
pub struct CompilationContext<'a> {
    index: usize,
    parameters: Vec<(String, Value)>,
    mappings: &'a PropertyMappings,
    type_mappings: &'a TypeMappings,
}

impl<'a> CompilationContext<'a> {
    pub fn new(mappings: &'a PropertyMappings, type_mappings: &'a TypeMappings) -> Self {
        Self {
            index: 0,
            parameters: Vec::new(),
            mappings,
            type_mappings,
        }
    }

    /// Compile one node; `None` when it carries no SQL.
    pub fn compile(&mut self, node: &Expr) -> Option<String> {
        let fragment = self.fragment(node)?;
        self.render(fragment)
    }

    pub fn finish(self, sql: Option<String>) -> CompiledPredicate {
        CompiledPredicate {
            sql: sql.unwrap_or_default(),
            parameters: self.parameters,
        }
    }

    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.index);
        self.index += 1;
        let value = value.into_parameter();
        trace!(parameter = %name, value = ?value, "Bound predicate parameter");
        self.parameters.push((name.clone(), value));
        name
    }

    fn rewrite(&mut self, name: &str, f: impl FnOnce(&Value) -> Value) {
        if let Some((_, value)) = self.parameters.iter_mut().find(|(n, _)| n == name) {
            *value = f(value);
        }
    }

    /// Replace a scalar binding with an array-valued `<name>Array` binding.
    fn promote_to_array(&mut self, name: &str) -> String {
        let array_name = format!("{}Array", name);
        if let Some(position) = self.parameters.iter().position(|(n, _)| n == name) {
            let (_, value) = self.parameters.remove(position);
            let elements = Value::Array(value.into_elements());
            self.parameters.push((array_name.clone(), elements));
        }
        array_name
    }

    fn bind_array(&mut self, values: Value) -> String {
        let name = self.bind(Value::Array(values.into_elements()));
        self.promote_to_array(&name)
    }

    /// Bind every value in a quantifier body that does not depend on the
    /// element. Each expansion of the returned template then binds only the
    /// element itself.
    fn prebind(&mut self, node: &Expr) -> Expr {
        match node {
            Expr::Captured(captured) => self.prebind_value(captured.evaluate()),
            Expr::Constant(value) => self.prebind_value(value.clone()),
            Expr::Binary { op, left, right } => {
                let left = Box::new(self.prebind(left));
                let right = Box::new(self.prebind(right));
                Expr::Binary {
                    op: *op,
                    left,
                    right,
                }
            }
            Expr::Not(inner) => Expr::Not(Box::new(self.prebind(inner))),
            Expr::Convert(inner) => Expr::Convert(Box::new(self.prebind(inner))),
            Expr::Member { owner, name, ty } => Expr::Member {
                owner: Box::new(self.prebind(owner)),
                name: name.clone(),
                ty: ty.clone(),
            },
            Expr::StringMatch {
                method,
                receiver,
                argument,
            } => {
                let receiver = Box::new(self.prebind(receiver));
                let argument = match Self::evaluate(argument).map(Value::into_parameter) {
                    Some(value) if value.is_null() => Expr::Constant(Value::Null),
                    Some(value) => {
                        Expr::Parameter(self.bind(Value::Text(method.pattern(&value.to_string()))))
                    }
                    None => self.prebind(argument),
                };
                Expr::StringMatch {
                    method: *method,
                    receiver,
                    argument: Box::new(argument),
                }
            }
            Expr::CompareTo { receiver, argument } => {
                let receiver = Box::new(self.prebind(receiver));
                let argument = Box::new(self.prebind(argument));
                Expr::CompareTo { receiver, argument }
            }
            Expr::ContainedIn { collection, item } => {
                let item = Box::new(self.prebind(item));
                let collection = match Self::evaluate(collection) {
                    Some(values) => Expr::Parameter(self.bind_array(values)),
                    None => (**collection).clone(),
                };
                Expr::ContainedIn {
                    collection: Box::new(collection),
                    item,
                }
            }
            // A nested quantifier binds its own values when expanded
            Expr::Any { .. }
            | Expr::Subject(_)
            | Expr::Slot
            | Expr::Parameter(_)
            | Expr::Unsupported(_) => node.clone(),
        }
    }

    fn prebind_value(&mut self, value: Value) -> Expr {
        if value.is_null() {
            Expr::Constant(Value::Null)
        } else {
            Expr::Parameter(self.bind(value))
        }
    }

    fn render(&self, fragment: Fragment) -> Option<String> {
        match fragment {
            Fragment::Sql(sql) if sql.is_empty() => None,
            Fragment::Sql(sql) => Some(sql),
            Fragment::Path(path) if path.is_empty() => None,
            Fragment::Path(path) => Some(map_property_path(self.mappings, &path)),
            Fragment::Parameter(name) => Some(format!("@{}", name)),
            Fragment::Null => Some("NULL".to_string()),
        }
    }

    fn constant(&mut self, value: Value) -> Fragment {
        if value.is_null() {
            Fragment::Null
        } else {
            Fragment::Parameter(self.bind(value))
        }
    }

    fn fragment(&mut self, node: &Expr) -> Option<Fragment> {
        match node {
            Expr::Binary { op, left, right } if op.is_logical() => {
                let left = self.compile(left);
                let right = self.compile(right);
                match (left, right) {
                    (Some(left), Some(right)) => {
                        Some(Fragment::Sql(format!("({} {} {})", left, op, right)))
                    }
                    (Some(side), None) | (None, Some(side)) => Some(Fragment::Sql(side)),
                    (None, None) => None,
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.fragment(left);
                let right = self.fragment(right);
                self.comparison(*op, left, right)
            }
            Expr::Not(inner) => {
                let operand = self.compile(inner)?;
                Some(Fragment::Sql(format!("NOT({})", operand)))
            }
            Expr::Convert(inner) => self.fragment(inner),
            Expr::Member { owner, name, ty } => {
                if let Some(sql) = self.type_fragment(ty) {
                    return Some(Fragment::Sql(sql));
                }
                match self.fragment(owner) {
                    Some(Fragment::Path(path)) => Some(Fragment::Path(format!("{}.{}", path, name))),
                    Some(Fragment::Sql(sql)) => Some(Fragment::Sql(format!("{}.{}", sql, name))),
                    _ => {
                        debug!(member = %name, "Dropping member access on a non-path owner");
                        None
                    }
                }
            }
            Expr::Captured(captured) => Some(self.constant(captured.evaluate())),
            Expr::Constant(value) => Some(self.constant(value.clone())),
            Expr::Subject(ty) => Some(match self.type_fragment(ty) {
                Some(sql) => Fragment::Sql(sql),
                None => Fragment::Path(String::new()),
            }),
            Expr::StringMatch {
                method,
                receiver,
                argument,
            } => {
                let path = self.compile(receiver)?;
                if let Expr::Parameter(name) = &**argument {
                    return Some(Fragment::Sql(format!("({} LIKE @{})", path, name)));
                }
                match self.fragment(argument)? {
                    Fragment::Parameter(name) => {
                        self.rewrite(&name, |value| Value::Text(method.pattern(&value.to_string())));
                        Some(Fragment::Sql(format!("({} LIKE @{})", path, name)))
                    }
                    // No pattern can be built around null
                    Fragment::Null => Some(Fragment::Sql(format!("({} IS NULL)", path))),
                    other => {
                        let pattern = self.render(other)?;
                        Some(Fragment::Sql(format!("({} LIKE {})", path, pattern)))
                    }
                }
            }
            Expr::CompareTo { receiver, argument } => {
                let a = self.compile(receiver)?;
                let b = self.compile(argument)?;
                Some(Fragment::Sql(format!(
                    "(CASE WHEN {a} = {b} THEN 0 WHEN {a} > {b} THEN 1 ELSE -1 END)"
                )))
            }
            Expr::ContainedIn { collection, item } => {
                if let Expr::Parameter(name) = &**collection {
                    let path = self.compile(item)?;
                    return Some(Fragment::Sql(format!("({} IN @{})", path, name)));
                }
                let Some(values) = Self::evaluate(collection) else {
                    debug!("Dropping membership test over a non-captured collection");
                    return None;
                };
                let path = self.compile(item)?;
                let name = self.bind_array(values);
                Some(Fragment::Sql(format!("({} IN @{})", path, name)))
            }
            Expr::Any { source, body } => {
                let Some(values) = Self::evaluate(source) else {
                    debug!("Dropping quantifier over a non-captured collection");
                    return None;
                };
                let elements = values.into_elements();
                if elements.is_empty() {
                    return Some(Fragment::Sql("(1 = 0)".to_string()));
                }

                let template = self.prebind(body);
                let clauses: Vec<String> = elements
                    .into_iter()
                    .filter_map(|element| {
                        self.compile(&template.bind_slot(&Expr::Constant(element)))
                    })
                    .collect();
                if clauses.is_empty() {
                    return Some(Fragment::Sql("(1 = 0)".to_string()));
                }
                Some(Fragment::Sql(format!("({})", clauses.join(" OR "))))
            }
            Expr::Parameter(name) => Some(Fragment::Parameter(name.clone())),
            Expr::Slot => {
                debug!("Dropping unbound quantifier slot");
                None
            }
            Expr::Unsupported(description) => {
                debug!(node = %description, "Dropping unsupported predicate node");
                None
            }
        }
    }

    fn comparison(
        &mut self,
        op: BinaryOp,
        left: Option<Fragment>,
        right: Option<Fragment>,
    ) -> Option<Fragment> {
        let (Some(left), Some(right)) = (left, right) else {
            debug!(%op, "Dropping comparison with an empty operand");
            return None;
        };

        let null_test = match op {
            BinaryOp::Equal => Some("IS NULL"),
            BinaryOp::NotEqual => Some("IS NOT NULL"),
            _ => None,
        };

        if let Some(test) = null_test {
            let operand = match (&left, &right) {
                (operand, Fragment::Null) => Some(operand.clone()),
                (Fragment::Null, operand) => Some(operand.clone()),
                _ => None,
            };
            if let Some(operand) = operand {
                let operand = self.render(operand)?;
                return Some(Fragment::Sql(format!("({} {})", operand, test)));
            }
        }

        let left = self.render(left)?;
        let right = self.render(right)?;
        Some(Fragment::Sql(format!("({} {} {})", left, op, right)))
    }

    /// Literal fragment for a type listed in the type mappings
    fn type_fragment(&self, ty: &crate::types::TypeDescriptor) -> Option<String> {
        self.type_mappings
            .get(ty.id())
            .or_else(|| self.type_mappings.get(ty.data_type().id()))
            .map(str::to_string)
    }

    /// Concrete value of a captured or constant collection.
    fn evaluate(node: &Expr) -> Option<Value> {
        match node {
            Expr::Constant(value) => Some(value.clone()),
            Expr::Captured(captured) => Some(captured.evaluate()),
            Expr::Convert(inner) => Self::evaluate(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::DescribeType;

    struct Person;

    impl DescribeType for Person {
        fn describe() -> crate::types::TypeDescriptor {
            crate::types::TypeDescriptor::opaque::<Person>("Person", |_, _| Ok(Value::Null))
        }
    }

    fn person() -> Expr {
        Expr::subject::<Person>()
    }

    fn run(predicate: &Expr) -> CompiledPredicate {
        compile(predicate, &PropertyMappings::new(), &TypeMappings::new())
    }

    #[test]
    fn test_comparison_binds_parameters_in_order() {
        let predicate = person()
            .member::<i32>("Age")
            .gt(Expr::constant(18))
            .and(person().member::<String>("Name").eq(Expr::constant("Ann")));

        let compiled = run(&predicate);
        assert_eq!(compiled.sql, "((Age > @p0) AND (Name = @p1))");
        assert_eq!(
            compiled.parameters,
            vec![
                ("p0".to_string(), Value::Int(18)),
                ("p1".to_string(), Value::from("Ann")),
            ]
        );
    }

    #[test]
    fn test_null_comparisons() {
        let age = || person().member::<Option<i32>>("Age");
        assert_eq!(run(&age().eq(Expr::null())).sql, "(Age IS NULL)");
        assert_eq!(run(&age().ne(Expr::null())).sql, "(Age IS NOT NULL)");
        assert_eq!(run(&Expr::null().eq(age())).sql, "(Age IS NULL)");
        assert!(run(&age().eq(Expr::null())).parameters.is_empty());
    }

    #[test]
    fn test_string_patterns() {
        let name = || person().member::<String>("Name");

        let compiled = run(&name().contains(Expr::constant("x")));
        assert_eq!(compiled.sql, "(Name LIKE @p0)");
        assert_eq!(compiled.parameter("p0"), Some(&Value::from("%x%")));

        let compiled = run(&name().starts_with(Expr::constant("x")));
        assert_eq!(compiled.parameter("p0"), Some(&Value::from("x%")));

        let compiled = run(&name().ends_with(Expr::captured(|| "x")));
        assert_eq!(compiled.parameter("p0"), Some(&Value::from("%x")));
    }

    #[test]
    fn test_null_pattern_is_a_null_test() {
        let name = || person().member::<Option<String>>("Name");

        let compiled = run(&name().contains(Expr::null()));
        assert_eq!(compiled.sql, "(Name IS NULL)");
        assert!(compiled.parameters.is_empty());

        let compiled = run(&name().starts_with(Expr::captured(|| Option::<String>::None)));
        assert_eq!(compiled.sql, "(Name IS NULL)");
        assert!(compiled.parameters.is_empty());
    }

    #[test]
    fn test_compare_to() {
        let compiled = run(&person().member::<i32>("Rank").compare_to(Expr::constant(3)));
        assert_eq!(
            compiled.sql,
            "(CASE WHEN Rank = @p0 THEN 0 WHEN Rank > @p0 THEN 1 ELSE -1 END)"
        );
    }

    #[test]
    fn test_contained_in_promotes_to_array() {
        let ids = vec![4, 5];
        let predicate = person()
            .member::<i32>("Id")
            .is_in(Expr::captured(move || ids.clone()));

        let compiled = run(&predicate);
        assert_eq!(compiled.sql, "(Id IN @p0Array)");
        assert_eq!(
            compiled.parameters,
            vec![(
                "p0Array".to_string(),
                Value::Array(vec![Value::Int(4), Value::Int(5)])
            )]
        );
    }

    #[test]
    fn test_any_expands_per_element() {
        let predicate = Expr::any(
            Expr::constant(vec![1, 2, 3]),
            person().member::<i32>("Field").eq(Expr::slot()),
        );

        let compiled = run(&predicate);
        assert_eq!(
            compiled.sql,
            "((Field = @p0) OR (Field = @p1) OR (Field = @p2))"
        );
        let values: Vec<&Value> = compiled.parameters.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![&Value::Int(1), &Value::Int(2), &Value::Int(3)]);
    }

    #[test]
    fn test_any_binds_element_independent_values_once() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluations);
        let predicate = Expr::any(
            Expr::constant(vec![1, 2, 3]),
            person()
                .member::<i32>("Id")
                .eq(Expr::slot())
                .and(person().member::<String>("Name").eq(Expr::captured(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "Ada"
                }))),
        );

        let compiled = run(&predicate);
        assert_eq!(
            compiled.sql,
            "(((Id = @p1) AND (Name = @p0)) OR ((Id = @p2) AND (Name = @p0)) OR \
             ((Id = @p3) AND (Name = @p0)))"
        );
        assert_eq!(
            compiled.parameters,
            vec![
                ("p0".to_string(), Value::from("Ada")),
                ("p1".to_string(), Value::Int(1)),
                ("p2".to_string(), Value::Int(2)),
                ("p3".to_string(), Value::Int(3)),
            ]
        );
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_any_shares_patterns_and_arrays() {
        let predicate = Expr::any(
            Expr::constant(vec![1, 2]),
            person()
                .member::<i32>("Id")
                .eq(Expr::slot())
                .and(person().member::<String>("Name").contains(Expr::constant("x")))
                .and(person().member::<i32>("Rank").is_in(Expr::constant(vec![7, 8]))),
        );

        let compiled = run(&predicate);
        assert_eq!(
            compiled.sql,
            "((((Id = @p2) AND (Name LIKE @p0)) AND (Rank IN @p1Array)) OR \
             (((Id = @p3) AND (Name LIKE @p0)) AND (Rank IN @p1Array)))"
        );
        assert_eq!(compiled.parameter("p0"), Some(&Value::from("%x%")));
        assert_eq!(
            compiled.parameter("p1Array"),
            Some(&Value::Array(vec![Value::Int(7), Value::Int(8)]))
        );
        assert_eq!(compiled.parameters.len(), 4);
    }

    #[test]
    fn test_any_over_empty_sequence() {
        let predicate = Expr::any(
            Expr::constant(Vec::<i32>::new()),
            person().member::<i32>("Field").eq(Expr::slot()),
        );
        assert_eq!(run(&predicate).sql, "(1 = 0)");
    }

    #[test]
    fn test_unsupported_nodes_are_dropped() {
        let predicate = Expr::unsupported("Method call: Foo()")
            .and(person().member::<bool>("Active").eq(Expr::constant(true)));
        assert_eq!(run(&predicate).sql, "(Active = @p0)");

        let compiled = run(&Expr::unsupported("Lambda"));
        assert!(compiled.is_empty());
    }

    #[test]
    fn test_not_and_convert() {
        let predicate = !person().member::<i32>("Age").convert().lt(Expr::constant(3));
        assert_eq!(run(&predicate).sql, "NOT((Age < @p0))");
    }

    #[test]
    fn test_mappings_and_type_fragments() {
        struct Clock;
        impl DescribeType for Clock {
            fn describe() -> crate::types::TypeDescriptor {
                crate::types::TypeDescriptor::opaque::<Clock>("Clock", |_, _| Ok(Value::Null))
            }
        }

        let mut mappings = PropertyMappings::new().with_default_prefix("t");
        mappings.insert(".Address.City", "t.Address_City");
        let mut types = TypeMappings::new();
        types.insert::<Clock>("GETDATE()");

        let predicate = person()
            .member::<String>("Address")
            .member::<String>("City")
            .eq(Expr::constant("Oslo"))
            .and(person().member::<Clock>("Now").gt(person().member::<i32>("Created")));

        let compiled = compile(&predicate, &mappings, &types);
        assert_eq!(
            compiled.sql,
            "((t.Address_City = @p0) AND (GETDATE() > t.Created))"
        );
    }

    #[test]
    fn test_enum_values_bind_as_integers() {
        let status = Value::Enum {
            type_name: "Status".to_string(),
            value: 2,
        };
        let compiled = run(&person().member::<i32>("Status").eq(Expr::Constant(status)));
        assert_eq!(compiled.parameter("p0"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_deterministic() {
        let build = || {
            Expr::any(
                Expr::constant(vec!["a", "b"]),
                person().member::<String>("Tag").starts_with(Expr::slot()),
            )
            .or(person().member::<i32>("Id").is_in(Expr::constant(vec![1])))
        };
        assert_eq!(run(&build()), run(&build()));
    }
}
