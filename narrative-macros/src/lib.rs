//! Proc macros for structured-output schemas.
//!
//! Provides `#[derive(ResponseSchema)]` to generate the Gemini response schema
//! for a type directly from its definition, so the shape handed to the model
//! and the shape the engine deserializes cannot drift apart.
//!
//! # Example
//!
//! ```ignore
//! /// One scene of the story
//! #[derive(ResponseSchema)]
//! struct Beat {
//!     /// Sequential beat number
//!     beat_number: u32,
//!     /// Which act the beat belongs to
//!     act: Act,
//! }
//!
//! #[derive(ResponseSchema)]
//! enum Act {
//!     #[serde(rename = "Act 1")]
//!     One,
//!     #[serde(rename = "Act 2")]
//!     Two,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, Field, Fields, Lit, LitStr, Meta, Type};

/// Derive macro for `gemini::ResponseSchema`.
///
/// # Attributes
///
/// - `#[schema(rename = "...")]` or `#[serde(rename = "...")]` on fields and
///   unit variants - override the name used in the schema
/// - `#[schema(optional)]` on fields - leave the field out of `required`
///
/// Doc comments become `description` entries.
#[proc_macro_derive(ResponseSchema, attributes(schema))]
pub fn derive_response_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_response_schema(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_response_schema(input: DeriveInput) -> syn::Result<TokenStream2> {
    let type_name = &input.ident;
    let description = get_doc_comment(&input.attrs);

    let body = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(named) => expand_object(named.named.iter(), &description)?,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "ResponseSchema derive only supports structs with named fields",
                ))
            }
        },
        syn::Data::Enum(data) => {
            let mut values = Vec::new();
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "ResponseSchema derive only supports enums with unit variants",
                    ));
                }
                let value = get_rename(&variant.attrs)?.unwrap_or_else(|| variant.ident.to_string());
                values.push(value);
            }
            expand_string_enum(&values, &description)
        }
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input,
                "ResponseSchema derive does not support unions",
            ))
        }
    };

    Ok(quote! {
        impl gemini::ResponseSchema for #type_name {
            fn response_schema() -> serde_json::Value {
                #body
            }
        }
    })
}

fn expand_object<'a>(
    fields: impl Iterator<Item = &'a Field>,
    description: &str,
) -> syn::Result<TokenStream2> {
    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();
    let mut ordering = Vec::new();

    for field in fields {
        let field_name = get_field_name(field)?;
        let field_desc = get_doc_comment(&field.attrs);
        let field_type = &field.ty;
        let type_schema = type_to_schema(field_type);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                #[allow(unused_mut)]
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name.to_string(), property);
            }
        });

        if !is_field_optional(field)? && !is_option_type(field_type) {
            required_fields.push(field_name.clone());
        }
        ordering.push(field_name);
    }

    let desc_token = description_token(description);

    Ok(quote! {
        let mut properties = serde_json::Map::new();
        #(#property_tokens)*

        let required: Vec<&str> = vec![#(#required_fields),*];
        let ordering: Vec<&str> = vec![#(#ordering),*];

        #[allow(unused_mut)]
        let mut schema = serde_json::json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
            "propertyOrdering": ordering
        });
        #desc_token
        schema
    })
}

fn expand_string_enum(values: &[String], description: &str) -> TokenStream2 {
    let desc_token = description_token(description);
    quote! {
        let values: Vec<&str> = vec![#(#values),*];
        #[allow(unused_mut)]
        let mut schema = serde_json::json!({
            "type": "STRING",
            "enum": values
        });
        #desc_token
        schema
    }
}

fn description_token(description: &str) -> TokenStream2 {
    if description.is_empty() {
        quote! {}
    } else {
        quote! { schema["description"] = serde_json::json!(#description); }
    }
}

fn get_field_name(field: &Field) -> syn::Result<String> {
    if let Some(name) = get_rename(&field.attrs)? {
        return Ok(name);
    }
    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

/// Find a `rename = "..."` in either a `#[schema(...)]` or `#[serde(...)]` attribute.
fn get_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs {
        let is_schema = attr.path().is_ident("schema");
        if !is_schema && !attr.path().is_ident("serde") {
            continue;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let _content;
                syn::parenthesized!(_content in meta.input);
            }
            Ok(())
        });
        // Only our own attribute is reported; serde validates its own syntax.
        if is_schema {
            parsed?;
        }
    }
    Ok(rename)
}

fn is_field_optional(field: &Field) -> syn::Result<bool> {
    for attr in &field.attrs {
        if attr.path().is_ident("schema") {
            let mut optional = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("optional") {
                    optional = true;
                } else if meta.input.peek(syn::Token![=]) {
                    let _: syn::Expr = meta.value()?.parse()?;
                }
                Ok(())
            })?;
            if optional {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn get_doc_comment(attrs: &[Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn first_generic_argument(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Type::Path(type_path) = ty else {
        return quote! { serde_json::json!({}) };
    };
    let Some(segment) = type_path.path.segments.last() else {
        return quote! { serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "STRING"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "INTEGER"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "NUMBER"}) },
        "bool" => quote! { serde_json::json!({"type": "BOOLEAN"}) },
        "Option" => match first_generic_argument(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner);
                quote! {
                    {
                        let mut inner = #inner_schema;
                        inner["nullable"] = serde_json::json!(true);
                        inner
                    }
                }
            }
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match first_generic_argument(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner);
                quote! {
                    serde_json::json!({
                        "type": "ARRAY",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "ARRAY"}) },
        },
        // Anything else must describe itself.
        _ => quote! { <#ty as gemini::ResponseSchema>::response_schema() },
    }
}
