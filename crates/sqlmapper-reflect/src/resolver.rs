//! Generic type-variable resolution.
//!
//! Given a declared type (possibly a variable, a parameterized application,
//! an array, or a wildcard), the type the member was looked up on, and the
//! type that declares the member, produce a fully concrete reference by
//! walking the source type's superclass and interface chain and translating
//! each level's arguments through the previous level's binding table.

use crate::error::{ReflectResult, ReflectionError};
use crate::schema::{FieldDescriptor, MethodDescriptor, TypeRef, TypeSchema, OBJECT};

/// Resolve a field's declared type against `src_type`.
pub fn resolve_field_type(
    field: &FieldDescriptor,
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<TypeRef> {
    resolve_type(&field.field_type, src_type, declared_by, schema)
}

/// Resolve a method's return type against `src_type`.
pub fn resolve_return_type(
    method: &MethodDescriptor,
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<TypeRef> {
    resolve_type(&method.return_type, src_type, declared_by, schema)
}

/// Resolve every parameter type of a method against `src_type`.
pub fn resolve_param_types(
    method: &MethodDescriptor,
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<Vec<TypeRef>> {
    method
        .param_types
        .iter()
        .map(|param| resolve_type(param, src_type, declared_by, schema))
        .collect()
}

fn resolve_type(
    type_ref: &TypeRef,
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<TypeRef> {
    match type_ref {
        TypeRef::Variable(name) => resolve_type_var(name, src_type, declared_by, schema),
        TypeRef::Parameterized { raw, args } => {
            resolve_parameterized(raw, args, src_type, declared_by, schema)
        }
        TypeRef::Array(component) => {
            let resolved = resolve_type(component, src_type, declared_by, schema)?;
            Ok(TypeRef::array(resolved))
        }
        TypeRef::Wildcard { lower, upper } => {
            let lower = resolve_bounds(lower, src_type, declared_by, schema)?;
            let upper = resolve_bounds(upper, src_type, declared_by, schema)?;
            Ok(TypeRef::Wildcard { lower, upper })
        }
        TypeRef::Concrete(_) => Ok(type_ref.clone()),
    }
}

fn resolve_parameterized(
    raw: &str,
    args: &[TypeRef],
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<TypeRef> {
    let resolved: ReflectResult<Vec<TypeRef>> = args
        .iter()
        .map(|arg| resolve_type(arg, src_type, declared_by, schema))
        .collect();
    Ok(TypeRef::parameterized(raw, resolved?))
}

fn resolve_bounds(
    bounds: &[TypeRef],
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<Vec<TypeRef>> {
    bounds
        .iter()
        .map(|bound| resolve_type(bound, src_type, declared_by, schema))
        .collect()
}

fn resolve_type_var(
    var: &str,
    src_type: &TypeRef,
    declared_by: &str,
    schema: &TypeSchema,
) -> ReflectResult<TypeRef> {
    let src_raw = match src_type {
        TypeRef::Concrete(name) => name.clone(),
        TypeRef::Parameterized { raw, .. } => raw.clone(),
        other => {
            return Err(ReflectionError::new(format!(
                "The source type must be concrete or parameterized, but was: {}",
                other
            )));
        }
    };

    if src_raw == declared_by {
        // The member is declared on the source itself: fall back to the
        // variable's first declared bound.
        let descriptor = schema.lookup(declared_by)?;
        let bound = descriptor
            .type_params
            .iter()
            .find(|param| param.name == var)
            .and_then(|param| param.bounds.first())
            .cloned();
        return Ok(bound.unwrap_or_else(|| TypeRef::concrete(OBJECT)));
    }

    let descriptor = schema.lookup(&src_raw)?;
    if let Some(superclass) = descriptor.superclass.clone() {
        if let Some(result) =
            scan_super_type(var, src_type, declared_by, &src_raw, &superclass, schema)?
        {
            return Ok(result);
        }
    }
    for interface in descriptor.interfaces.clone() {
        if let Some(result) =
            scan_super_type(var, src_type, declared_by, &src_raw, &interface, schema)?
        {
            return Ok(result);
        }
    }
    Ok(TypeRef::concrete(OBJECT))
}

fn scan_super_type(
    var: &str,
    src_type: &TypeRef,
    declared_by: &str,
    src_raw: &str,
    super_type: &TypeRef,
    schema: &TypeSchema,
) -> ReflectResult<Option<TypeRef>> {
    match super_type {
        TypeRef::Parameterized { raw, args } => {
            let parent_descriptor = schema.lookup(raw)?;
            let parent_vars: Vec<&str> = parent_descriptor
                .type_params
                .iter()
                .map(|param| param.name.as_str())
                .collect();
            let translated = if let TypeRef::Parameterized {
                args: src_args, ..
            } = src_type
            {
                translate_parent_type_vars(src_args, src_raw, args, schema)?
            } else {
                args.clone()
            };
            if declared_by == raw {
                for (i, parent_var) in parent_vars.iter().enumerate() {
                    if *parent_var == var {
                        if let Some(arg) = translated.get(i) {
                            return Ok(Some(arg.clone()));
                        }
                    }
                }
            }
            if schema.is_assignable(declared_by, raw) {
                let parent = TypeRef::parameterized(raw, translated);
                return resolve_type_var(var, &parent, declared_by, schema).map(Some);
            }
            Ok(None)
        }
        TypeRef::Concrete(name) if schema.is_assignable(declared_by, name) => {
            resolve_type_var(var, super_type, declared_by, schema).map(Some)
        }
        _ => Ok(None),
    }
}

/// Replace the parent's type-variable arguments with the source's actual
/// arguments, matched by declared position on the source type.
fn translate_parent_type_vars(
    src_args: &[TypeRef],
    src_raw: &str,
    parent_args: &[TypeRef],
    schema: &TypeSchema,
) -> ReflectResult<Vec<TypeRef>> {
    let src_descriptor = schema.lookup(src_raw)?;
    let mut translated = Vec::with_capacity(parent_args.len());
    for parent_arg in parent_args {
        match parent_arg {
            TypeRef::Variable(name) => {
                let position = src_descriptor
                    .type_params
                    .iter()
                    .position(|param| param.name == *name);
                match position.and_then(|i| src_args.get(i)) {
                    Some(actual) => translated.push(actual.clone()),
                    None => translated.push(parent_arg.clone()),
                }
            }
            other => translated.push(other.clone()),
        }
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TypeDescriptor, TypeParam};

    fn box_schema() -> TypeSchema {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("Box")
                .with_type_param(TypeParam::new("T"))
                .extends(TypeRef::concrete(OBJECT))
                .with_method(MethodDescriptor::new(
                    "get",
                    vec![],
                    TypeRef::variable("T"),
                )),
        );
        schema.register(
            TypeDescriptor::new("IntBox")
                .extends(TypeRef::parameterized("Box", vec![TypeRef::concrete("int")])),
        );
        schema
    }

    #[test]
    fn variable_resolves_through_superclass() {
        let schema = box_schema();
        let get = MethodDescriptor::new("get", vec![], TypeRef::variable("T"));
        let resolved =
            resolve_return_type(&get, &TypeRef::concrete("IntBox"), "Box", &schema).unwrap();
        assert_eq!(resolved, TypeRef::concrete("int"));
    }

    #[test]
    fn variable_on_declaring_type_falls_back_to_bound() {
        let schema = box_schema();
        let get = MethodDescriptor::new("get", vec![], TypeRef::variable("T"));
        let resolved =
            resolve_return_type(&get, &TypeRef::concrete("Box"), "Box", &schema).unwrap();
        assert_eq!(resolved, TypeRef::concrete(OBJECT));
    }

    #[test]
    fn resolution_translates_through_two_levels() {
        let mut schema = box_schema();
        // Middle<U> extends Box<U>; Leaf extends Middle<string>
        schema.register(
            TypeDescriptor::new("Middle")
                .with_type_param(TypeParam::new("U"))
                .extends(TypeRef::parameterized("Box", vec![TypeRef::variable("U")])),
        );
        schema.register(
            TypeDescriptor::new("Leaf").extends(TypeRef::parameterized(
                "Middle",
                vec![TypeRef::concrete("string")],
            )),
        );
        let get = MethodDescriptor::new("get", vec![], TypeRef::variable("T"));
        let resolved =
            resolve_return_type(&get, &TypeRef::concrete("Leaf"), "Box", &schema).unwrap();
        assert_eq!(resolved, TypeRef::concrete("string"));
    }

    #[test]
    fn parameterized_and_array_types_recurse() {
        let schema = box_schema();
        let list_of_t = MethodDescriptor::new(
            "all",
            vec![],
            TypeRef::parameterized("list", vec![TypeRef::variable("T")]),
        );
        let resolved =
            resolve_return_type(&list_of_t, &TypeRef::concrete("IntBox"), "Box", &schema).unwrap();
        assert_eq!(
            resolved,
            TypeRef::parameterized("list", vec![TypeRef::concrete("int")])
        );

        let array_of_t =
            MethodDescriptor::new("raw", vec![], TypeRef::array(TypeRef::variable("T")));
        let resolved =
            resolve_return_type(&array_of_t, &TypeRef::concrete("IntBox"), "Box", &schema).unwrap();
        assert_eq!(resolved, TypeRef::array(TypeRef::concrete("int")));
    }

    #[test]
    fn param_types_resolve_positionally() {
        let schema = box_schema();
        let set = MethodDescriptor::new(
            "set",
            vec![TypeRef::variable("T"), TypeRef::concrete("int")],
            TypeRef::concrete(OBJECT),
        );
        let resolved =
            resolve_param_types(&set, &TypeRef::concrete("IntBox"), "Box", &schema).unwrap();
        assert_eq!(
            resolved,
            vec![TypeRef::concrete("int"), TypeRef::concrete("int")]
        );
    }
}
