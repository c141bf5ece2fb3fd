//! Typing of dotted/indexed property accesses.
//!
//! Walks a sequence of accessors against a root type. Union roots try every
//! branch: if all branches fail the same way the error says the root "could
//! be a type that does not support" the access; otherwise the successful
//! branch types are unioned.

use std::collections::BTreeMap;

use crate::ast::PropertyAccessor;
use crate::diags::suggestion::ExistingFieldFormatter;
use crate::schema::SchemaType;
use crate::type_checker::assignable::NotAssignable;

/// Error callback: receives `(summary, detail)` and owns diagnostic
/// placement. Implementations return the invalid type to thread back.
pub type SetError<'a> = &'a mut dyn FnMut(&str, &str) -> SchemaType;

/// Computes the type of `root` followed by `accessors`. `running_name` is
/// the textual form of the access so far, used in messages.
pub fn type_property_access(
    root: &SchemaType,
    running_name: &str,
    accessors: &[PropertyAccessor],
    set_error: SetError<'_>,
) -> SchemaType {
    let Some((accessor, rest)) = accessors.split_first() else {
        return root.clone();
    };

    if let SchemaType::Union(alternatives) = root.unwrap() {
        let mut possibilities: Vec<SchemaType> = Vec::new();
        let mut errors: Vec<NotAssignable> = Vec::new();
        for alternative in alternatives {
            let mut capture = |summary: &str, _detail: &str| {
                errors.push(
                    NotAssignable::new(summary).property(alternative.display_type()),
                );
                SchemaType::Invalid
            };
            let ty = type_property_access(alternative, running_name, accessors, &mut capture);
            if !ty.is_invalid() && !possibilities.contains(&ty) {
                possibilities.push(ty);
            }
        }
        if !errors.is_empty() {
            let op = match accessor {
                PropertyAccessor::Name(_) => "access",
                _ => "index",
            };
            let reason = NotAssignable::new(format!(
                "'{}' could be a type that does not support {}ing",
                running_name, op
            ))
            .because(errors);
            return set_error(
                &format!(
                    "Cannot {} into {} of type {}",
                    op,
                    running_name,
                    root.display_type()
                ),
                &reason.to_string(),
            );
        }
        return match possibilities.len() {
            0 => SchemaType::Invalid,
            1 => possibilities.into_iter().next().expect("length checked"),
            _ => SchemaType::Union(possibilities),
        };
    }

    match accessor {
        PropertyAccessor::Name(name) => {
            let mut properties: BTreeMap<String, SchemaType> = BTreeMap::new();
            match root.unwrap() {
                SchemaType::Object(object) => {
                    for property in &object.properties {
                        properties.insert(property.name.clone(), property.ty.clone());
                    }
                }
                SchemaType::Resource(resource) => {
                    for property in &resource.outputs {
                        properties.insert(property.name.clone(), property.ty.clone());
                    }
                    properties.insert("id".to_string(), SchemaType::String);
                    properties.insert("urn".to_string(), SchemaType::String);
                }
                SchemaType::Invalid => return SchemaType::Invalid,
                other => {
                    return set_error(
                        &format!(
                            "cannot access a property on '{}' (type {})",
                            running_name,
                            other.display_type()
                        ),
                        "Property access is only allowed on Resources and Objects",
                    );
                }
            }
            match properties.get(name) {
                Some(next) => type_property_access(
                    &next.clone(),
                    &format!("{}.{}", running_name, name),
                    rest,
                    set_error,
                ),
                None => {
                    let fmtr = ExistingFieldFormatter::new(
                        running_name.to_string(),
                        properties.keys().cloned().collect(),
                    )
                    .properties();
                    let (summary, detail) = fmtr.message_with_detail(name);
                    set_error(&summary, &detail)
                }
            }
        }
        PropertyAccessor::IntSubscript(index) => match root.unwrap() {
            SchemaType::Array(element) => type_property_access(
                element,
                &format!("{}[{}]", running_name, index),
                rest,
                set_error,
            ),
            SchemaType::Map(_) => set_error(
                &format!(
                    "Cannot index via number into '{}' (type {})",
                    running_name,
                    root.display_type()
                ),
                "Index via number is only allowed on Arrays",
            ),
            SchemaType::Invalid => SchemaType::Invalid,
            _ => set_error(
                &format!(
                    "Cannot index into '{}' (type {})",
                    running_name,
                    root.display_type()
                ),
                "Index property access is only allowed on Maps and Lists",
            ),
        },
        PropertyAccessor::StringSubscript(key) => match root.unwrap() {
            SchemaType::Map(element) => type_property_access(
                element,
                &format!("{}[{:?}]", running_name, key),
                rest,
                set_error,
            ),
            SchemaType::Array(_) => set_error(
                &format!(
                    "Cannot index via string into '{}' (type {})",
                    running_name,
                    root.display_type()
                ),
                "Index via string is only allowed on Maps",
            ),
            SchemaType::Invalid => SchemaType::Invalid,
            _ => set_error(
                &format!(
                    "Cannot index into '{}' (type {})",
                    running_name,
                    root.display_type()
                ),
                "Index property access is only allowed on Maps and Lists",
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectType, Property, ResourceType};

    fn run(root: &SchemaType, accessors: Vec<PropertyAccessor>) -> (SchemaType, Vec<String>) {
        let mut messages = Vec::new();
        let mut set_error = |summary: &str, detail: &str| {
            messages.push(format!("{}:{}", summary, detail));
            SchemaType::Invalid
        };
        let ty = type_property_access(root, "start", &accessors, &mut set_error);
        (ty, messages)
    }

    #[test]
    fn alternating_map_and_array_subscripts() {
        let root = SchemaType::map(SchemaType::array(SchemaType::Any));
        let (ty, errors) = run(
            &root,
            vec![
                PropertyAccessor::StringSubscript("foo".into()),
                PropertyAccessor::IntSubscript(7),
            ],
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(ty.display_type(), "any");
    }

    #[test]
    fn missing_resource_property_lists_candidates() {
        let mut resource = ResourceType::new("pkg:mod:Token");
        resource.outputs = vec![
            Property::new("fizz", SchemaType::String),
            Property::new("buzz", SchemaType::String),
        ];
        let root = SchemaType::Resource(resource);
        let (ty, errors) = run(&root, vec![PropertyAccessor::Name("fizzbuzz".into())]);
        assert!(ty.is_invalid());
        assert_eq!(
            errors,
            vec![
                "fizzbuzz does not exist on start:Existing properties are: buzz, fizz, id, urn"
                    .to_string()
            ]
        );
    }

    #[test]
    fn union_roots_union_their_results() {
        let root = SchemaType::Union(vec![
            SchemaType::array(SchemaType::String),
            SchemaType::array(SchemaType::Number),
        ]);
        let (ty, errors) = run(&root, vec![PropertyAccessor::IntSubscript(0)]);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(ty.display_type(), "Union<string, number>");
    }

    #[test]
    fn union_roots_report_each_failing_branch() {
        let root = SchemaType::Union(vec![
            SchemaType::array(SchemaType::String),
            SchemaType::map(SchemaType::Number),
            SchemaType::Object(ObjectType::anonymous(vec![Property::new(
                "foo",
                SchemaType::array(SchemaType::Any),
            )])),
        ]);
        let (ty, errors) = run(
            &root,
            vec![
                PropertyAccessor::Name("foo".into()),
                PropertyAccessor::StringSubscript("bar".into()),
            ],
        );
        assert!(ty.is_invalid());
        assert_eq!(errors.len(), 1);
        let message = &errors[0];
        assert!(
            message.contains("'start' could be a type that does not support accessing"),
            "{}",
            message
        );
        assert!(
            message.contains("cannot access a property on 'start' (type List<string>)"),
            "{}",
            message
        );
        assert!(
            message.contains("Cannot index via string into 'start.foo' (type List<any>)"),
            "{}",
            message
        );
    }

    #[test]
    fn synthetic_id_and_urn_are_strings() {
        let root = SchemaType::Resource(ResourceType::new("pkg:mod:Token"));
        let (ty, errors) = run(&root, vec![PropertyAccessor::Name("id".into())]);
        assert!(errors.is_empty());
        assert_eq!(ty, SchemaType::String);
    }

    #[test]
    fn string_index_into_array_is_an_error() {
        let root = SchemaType::array(SchemaType::String);
        let (_, errors) = run(&root, vec![PropertyAccessor::StringSubscript("k".into())]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Index via string is only allowed on Maps"));
    }
}
