//! Procedural macros for Storm
//!
//! - `#[derive(Entity)]` - describe a struct's members and annotations
//! - `#[derive(SqlEnum)]` - map a fieldless enum to its discriminant

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, LitStr, Visibility, parse_macro_input};

/// Derive `storm::Entity` and `storm::DescribeType` for a struct with named
/// fields.
///
/// # Usage
///
/// ```ignore
/// #[derive(Entity)]
/// #[entity(table = "People", schema = "hr", rename_columns = "PascalCase")]
/// pub struct Person {
///     #[key]
///     #[generated(on_insert)]
///     pub id: i32,
///     #[column(name = "FullName")]
///     pub name: String,
///     #[owned]
///     pub address: Address,
///     #[not_mapped]
///     pub display: String,
///     cache: Option<String>, // not pub: never mapped
/// }
/// ```
#[proc_macro_derive(
    Entity,
    attributes(entity, key, column, generated, owned, not_mapped, read_only)
)]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `storm::DescribeType` and `From<E> for storm::Value` for a
/// fieldless `Copy` enum. Values bind as their discriminant.
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_sql_enum(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// ============================================================================
// Entity
// ============================================================================

#[derive(Default)]
struct ContainerAttrs {
    table: Option<LitStr>,
    schema: Option<LitStr>,
    rename_columns: Option<Case>,
}

#[derive(Default)]
struct FieldAttrs {
    key: bool,
    column: Option<LitStr>,
    generated: Option<TokenStream2>,
    owned: bool,
    not_mapped: bool,
    read_only: bool,
}

fn parse_case(lit: &LitStr) -> syn::Result<Case> {
    match lit.value().as_str() {
        "PascalCase" => Ok(Case::Pascal),
        "snake_case" => Ok(Case::Snake),
        "camelCase" => Ok(Case::Camel),
        "SCREAMING_SNAKE_CASE" => Ok(Case::UpperSnake),
        "kebab-case" => Ok(Case::Kebab),
        other => Err(syn::Error::new(
            lit.span(),
            format!("unsupported rename_columns style: {}", other),
        )),
    }
}

fn parse_container_attrs(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut attrs = ContainerAttrs::default();

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("schema") {
                attrs.schema = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("rename_columns") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.rename_columns = Some(parse_case(&lit)?);
            } else {
                return Err(meta.error("expected `table`, `schema` or `rename_columns`"));
            }
            Ok(())
        })?;
    }

    if let (None, Some(schema)) = (&attrs.table, &attrs.schema) {
        return Err(syn::Error::new(
            schema.span(),
            "`schema` requires `table` to be set as well",
        ));
    }

    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        let path = attr.path();
        if path.is_ident("key") {
            attrs.key = true;
        } else if path.is_ident("owned") {
            attrs.owned = true;
        } else if path.is_ident("not_mapped") {
            attrs.not_mapped = true;
        } else if path.is_ident("read_only") {
            attrs.read_only = true;
        } else if path.is_ident("column") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    attrs.column = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `name = \"...\"`"))
                }
            })?;
        } else if path.is_ident("generated") {
            attr.parse_nested_meta(|meta| {
                let policy = if meta.path.is_ident("none") {
                    quote!(None)
                } else if meta.path.is_ident("on_insert") {
                    quote!(OnInsert)
                } else if meta.path.is_ident("on_insert_and_update") {
                    quote!(OnInsertAndUpdate)
                } else {
                    return Err(meta.error("expected `none`, `on_insert` or `on_insert_and_update`"));
                };
                attrs.generated = Some(quote!(::storm::GeneratedPolicy::#policy));
                Ok(())
            })?;
        }
    }

    Ok(attrs)
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Entity can only be derived for structs",
            ));
        }
    };

    let container = parse_container_attrs(&input)?;
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = match (&container.table, &container.schema) {
        (Some(table), Some(schema)) => {
            quote!(.table(#table, ::core::option::Option::Some(#schema)))
        }
        (Some(table), None) => quote!(.table(#table, ::core::option::Option::None)),
        _ => quote!(),
    };

    let mut members = Vec::new();
    let mut readers = Vec::new();

    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let member_name = ident.unraw().to_string();
        let ty = &field.ty;
        let attrs = parse_field_attrs(field)?;
        let accessible = matches!(field.vis, Visibility::Public(_));

        let mut modifiers = Vec::new();
        if attrs.key {
            modifiers.push(quote!(.key()));
        }
        match (&attrs.column, container.rename_columns) {
            (Some(column), _) => modifiers.push(quote!(.column(#column))),
            (None, Some(case)) => {
                let column = member_name.to_case(case);
                if column != member_name {
                    modifiers.push(quote!(.column(#column)));
                }
            }
            (None, None) => {}
        }
        if let Some(policy) = &attrs.generated {
            modifiers.push(quote!(.generated(#policy)));
        }
        if attrs.owned {
            modifiers.push(quote!(.owned()));
        }
        if attrs.not_mapped {
            modifiers.push(quote!(.not_mapped()));
        }
        if attrs.read_only {
            modifiers.push(quote!(.read_only()));
        }
        if !accessible {
            modifiers.push(quote!(.inaccessible()));
        }

        members.push(quote! {
            .member(::storm::MemberDescriptor::new::<#ty>(#member_name) #(#modifiers)*)
        });

        if accessible {
            readers.push(quote! {
                #member_name => ::core::option::Option::Some(&self.#ident as &dyn ::core::any::Any),
            });
        }
    }

    Ok(quote! {
        impl #impl_generics ::storm::DescribeType for #name #ty_generics #where_clause {
            fn describe() -> ::storm::TypeDescriptor {
                ::storm::TypeDescriptor::record::<Self>(#name_str)
            }
        }

        impl #impl_generics ::storm::Entity for #name #ty_generics #where_clause {
            fn shape() -> ::storm::EntityShape {
                ::storm::EntityShape::new::<Self>(#name_str)
                    #table
                    #(#members)*
            }

            fn member(&self, name: &str) -> ::core::option::Option<&dyn ::core::any::Any> {
                match name {
                    #(#readers)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

// ============================================================================
// SqlEnum
// ============================================================================

fn expand_sql_enum(input: DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "SqlEnum can only be derived for enums",
        ));
    };

    if let Some(variant) = data.variants.iter().find(|v| !matches!(v.fields, Fields::Unit)) {
        return Err(syn::Error::new_spanned(
            variant,
            "SqlEnum variants cannot carry fields",
        ));
    }

    let name = &input.ident;
    let name_str = name.to_string();

    Ok(quote! {
        impl ::storm::DescribeType for #name {
            fn describe() -> ::storm::TypeDescriptor {
                ::storm::TypeDescriptor::enumeration::<Self>(
                    #name_str,
                    ::storm::types::encode_as::<Self>,
                )
            }
        }

        impl ::core::convert::From<#name> for ::storm::Value {
            fn from(value: #name) -> Self {
                ::storm::Value::Enum {
                    type_name: ::std::string::String::from(#name_str),
                    value: value as i64,
                }
            }
        }
    })
}
